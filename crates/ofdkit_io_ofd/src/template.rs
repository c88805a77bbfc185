//! Input template workbook writer.

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::conf::{C_TEMPLATE_SHEET_DATA, C_TEMPLATE_SHEET_SCHEMA};
use crate::schema;
use crate::spec::{OfdError, SpecFieldSpec};

const N_WIDTH_COLUMN_MIN: usize = 8;
const N_WIDTH_COLUMN_MAX: usize = 60;
const N_WIDTH_COLUMN_PADDING: usize = 2;

/// Write an input template with one text column per field.
///
/// An empty `field_names` writes every schema field in schema order. The
/// `schema` sheet documents identifier, type class, byte length and decimal
/// places for each column.
pub fn write_xlsx_template<S: AsRef<str>>(path: &Path, field_names: &[S]) -> Result<(), OfdError> {
    let l_specs: Vec<&'static SpecFieldSpec> = if field_names.is_empty() {
        schema::TUP_OFD_FIELD_SCHEMA.iter().collect()
    } else {
        field_names
            .iter()
            .map(|name| schema::lookup(name.as_ref()))
            .collect::<Result<_, _>>()?
    };

    let mut workbook = Workbook::new();
    write_data_sheet(workbook.add_worksheet(), &l_specs).map_err(derive_xlsx_error)?;
    write_schema_sheet(workbook.add_worksheet(), &l_specs).map_err(derive_xlsx_error)?;
    workbook.save(path).map_err(derive_xlsx_error)?;
    Ok(())
}

fn write_data_sheet(
    worksheet: &mut Worksheet,
    l_specs: &[&'static SpecFieldSpec],
) -> Result<(), XlsxError> {
    let fmt_header = Format::new().set_bold().set_num_format("@");
    let fmt_text = Format::new().set_num_format("@");

    worksheet.set_name(C_TEMPLATE_SHEET_DATA)?;
    for (n_col, spec) in l_specs.iter().enumerate() {
        let n_col = cast_col_num(n_col)?;
        worksheet.write_string_with_format(0, n_col, spec.canonical_name, &fmt_header)?;
        worksheet.set_column_format(n_col, &fmt_text)?;
        worksheet.set_column_width(n_col, estimate_column_width(spec.canonical_name) as f64)?;
    }
    worksheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn write_schema_sheet(
    worksheet: &mut Worksheet,
    l_specs: &[&'static SpecFieldSpec],
) -> Result<(), XlsxError> {
    let fmt_header = Format::new().set_bold();

    worksheet.set_name(C_TEMPLATE_SHEET_SCHEMA)?;
    for (n_col, c_title) in ["name", "identifier", "type_class", "byte_length", "decimal_places"]
        .into_iter()
        .enumerate()
    {
        worksheet.write_string_with_format(0, n_col as u16, c_title, &fmt_header)?;
    }
    for (n_idx, spec) in l_specs.iter().enumerate() {
        let n_row = u32::try_from(n_idx + 1)
            .map_err(|_| XlsxError::ParameterError(format!("row index overflow: {n_idx}")))?;
        worksheet.write_string(n_row, 0, spec.canonical_name)?;
        worksheet.write_string(n_row, 1, spec.identifier)?;
        worksheet.write_string(n_row, 2, spec.type_class.as_str())?;
        worksheet.write_number(n_row, 3, spec.byte_length as f64)?;
        worksheet.write_number(n_row, 4, spec.decimal_places as f64)?;
    }
    worksheet.set_column_width(0, 36)?;
    worksheet.set_column_width(1, 28)?;
    worksheet.set_column_width(2, 14)?;
    worksheet.set_freeze_panes(1, 0)?;
    Ok(())
}

/// Display width of a header in Excel column units.
fn estimate_column_width(text: &str) -> usize {
    let n_ascii = text.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = text.chars().count().saturating_sub(n_ascii);
    let n_width = n_ascii + (n_non_ascii as f64 * 1.6).round() as usize + N_WIDTH_COLUMN_PADDING;
    n_width.clamp(N_WIDTH_COLUMN_MIN, N_WIDTH_COLUMN_MAX)
}

fn cast_col_num(value: usize) -> Result<u16, XlsxError> {
    u16::try_from(value).map_err(|_| XlsxError::ParameterError(format!("column index overflow: {value}")))
}

fn derive_xlsx_error(err: XlsxError) -> OfdError {
    OfdError::Xlsx(format!("xlsx write error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_xlsx_table;
    use crate::testing::TestDir;
    use calamine::{Data, Reader, Xlsx, open_workbook};

    #[test]
    fn template_round_trips_through_reader() {
        let tmp = TestDir::new();
        let path = tmp.path().join("template.xlsx");
        write_xlsx_template(&path, &["基金代码", "申请金额"]).expect("write template");

        let table = read_xlsx_table(&path).expect("read");
        assert_eq!(table.columns, vec!["基金代码", "申请金额"]);
        assert_eq!(table.height(), 0);

        let mut workbook: Xlsx<_> = open_workbook(&path).expect("open");
        assert_eq!(
            workbook.sheet_names(),
            vec![C_TEMPLATE_SHEET_DATA.to_string(), C_TEMPLATE_SHEET_SCHEMA.to_string()]
        );
        let range = workbook
            .worksheet_range(C_TEMPLATE_SHEET_SCHEMA)
            .expect("schema sheet");
        assert_eq!(range.height(), 3);
        assert_eq!(range.get((1, 1)), Some(&Data::String("FundCode".to_string())));
        assert_eq!(range.get((2, 2)), Some(&Data::String("numeric".to_string())));
        assert_eq!(range.get((2, 3)), Some(&Data::Float(16.0)));
    }

    #[test]
    fn template_defaults_to_whole_schema() {
        let tmp = TestDir::new();
        let path = tmp.path().join("all.xlsx");
        write_xlsx_template::<&str>(&path, &[]).expect("write template");
        let table = read_xlsx_table(&path).expect("read");
        assert_eq!(table.columns, schema::field_names());
    }

    #[test]
    fn template_rejects_unknown_field() {
        let tmp = TestDir::new();
        let path = tmp.path().join("bad.xlsx");
        let err = write_xlsx_template(&path, &["不存在的字段"]).expect_err("unknown");
        assert_eq!(err, OfdError::FieldNotFound("不存在的字段".to_string()));
        assert!(!path.exists());
    }

    #[test]
    fn estimate_column_width_is_clamped() {
        assert_eq!(estimate_column_width("ab"), N_WIDTH_COLUMN_MIN);
        assert_eq!(estimate_column_width("基金代码"), 8);
        assert_eq!(estimate_column_width("投资人在销售人处用于交易的资金帐号"), 29);
        assert_eq!(estimate_column_width(&"x".repeat(200)), N_WIDTH_COLUMN_MAX);
    }
}
