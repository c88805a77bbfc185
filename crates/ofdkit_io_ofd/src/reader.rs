//! Source table readers: xlsx workbooks and polars frames.
//!
//! Every cell is read as text without missing-value inference, so an empty
//! cell becomes `""` and a code such as `000001` keeps its leading zeros when
//! the workbook stores it as text.

use std::path::Path;

use calamine::{Data, DataType, Reader, Xlsx, open_workbook};
use log::debug;
use polars::prelude::{AnyValue, DataFrame};

use crate::spec::{OfdError, SpecOfdTable};
use crate::util::{derive_unique_headers, format_bool_cell_text, format_float_cell_text};

////////////////////////////////////////////////////////////////////////////////
// #region Xlsx

/// Read the first worksheet of `path`; the first row is the header.
pub fn read_xlsx_table(path: &Path) -> Result<SpecOfdTable, OfdError> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|err| OfdError::Xlsx(format!("Failed to open {}: {err}", path.display())))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| OfdError::Xlsx(format!("No worksheet found in {}", path.display())))?
        .map_err(|err| OfdError::Xlsx(format!("Failed to read {}: {err}", path.display())))?;

    // Leading empty columns still count as (unnamed) columns.
    let n_col_offset = range.start().map_or(0, |(_, n_col)| n_col as usize);
    let mut l_grid: Vec<Vec<String>> = range
        .rows()
        .map(|row| {
            std::iter::repeat_n(String::new(), n_col_offset)
                .chain(row.iter().map(derive_text_from_cell))
                .collect()
        })
        .collect();

    if l_grid.is_empty() {
        return Ok(SpecOfdTable::default());
    }
    let l_header = l_grid.remove(0);
    let table = SpecOfdTable {
        columns: derive_unique_headers(&l_header),
        rows: l_grid,
    };
    debug!(
        "Read {} rows x {} columns from {}",
        table.height(),
        table.width(),
        path.display()
    );
    Ok(table)
}

/// Header labels of the first worksheet.
pub fn read_xlsx_columns(path: &Path) -> Result<Vec<String>, OfdError> {
    read_xlsx_table(path).map(|table| table.columns)
}

fn derive_text_from_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(val) => val.clone(),
        Data::Int(val) => val.to_string(),
        Data::Float(val) => format_float_cell_text(*val),
        Data::Bool(val) => format_bool_cell_text(*val),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) if dt.time() == chrono::NaiveTime::MIN => dt.format("%Y-%m-%d").to_string(),
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => cell.to_string(),
        },
        Data::Error(_) => String::new(),
        other => other.to_string(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DataFrame

/// Convert a polars frame into a string table.
pub fn derive_table_from_dataframe(df: &DataFrame) -> Result<SpecOfdTable, OfdError> {
    let l_cols = df.get_columns();
    let columns: Vec<String> = df
        .get_column_names_str()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rows = vec![vec![String::new(); df.width()]; df.height()];
    for (idx_row, row) in rows.iter_mut().enumerate() {
        for (idx_col, cell) in row.iter_mut().enumerate() {
            let value = l_cols[idx_col].get(idx_row).map_err(|err| {
                OfdError::DataFrame(format!("Failed to read cell ({idx_row}, {idx_col}): {err}"))
            })?;
            *cell = derive_text_from_any_value(value);
        }
    }

    Ok(SpecOfdTable { columns, rows })
}

fn derive_text_from_any_value(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(val) => val.to_string(),
        AnyValue::StringOwned(val) => val.to_string(),
        AnyValue::Boolean(val) => format_bool_cell_text(val),
        AnyValue::Float32(val) => format_float_cell_text(val as f64),
        AnyValue::Float64(val) => format_float_cell_text(val),
        _ => value.to_string(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
