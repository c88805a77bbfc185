//! Stateless helper utilities used by the OFD kernel.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::conf::{
    C_OFD_FILE_NAME_PATTERN, C_OFD_FILE_NAME_TAG, C_OFD_OUTPUT_EXTENSION,
    N_OFD_FILE_NAME_SEGMENTS,
};
use crate::spec::{OfdError, SpecOfdFileLabel, SpecOfdTable};

////////////////////////////////////////////////////////////////////////////////
// #region FileLabel

/// Parse `OFD_<creator>_<receiver>_<YYYYMMDD>_<type>[.ext]`.
///
/// `label` may be a bare stem, a file name or a path; only the file stem is
/// inspected.
pub fn parse_source_file_label(label: &str) -> Result<SpecOfdFileLabel, OfdError> {
    let c_stem = Path::new(label)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| OfdError::invalid_label(label, "missing file stem"))?;

    let l_parts: Vec<&str> = c_stem.split('_').collect();
    if l_parts.len() != N_OFD_FILE_NAME_SEGMENTS {
        return Err(OfdError::invalid_label(
            label,
            format!(
                "expected {N_OFD_FILE_NAME_SEGMENTS} '_'-separated segments, got {}",
                l_parts.len()
            ),
        ));
    }
    if l_parts[0] != C_OFD_FILE_NAME_TAG {
        return Err(OfdError::invalid_label(
            label,
            format!("first segment must be {C_OFD_FILE_NAME_TAG:?}"),
        ));
    }
    if let Some(n_idx) = l_parts.iter().position(|part| part.is_empty()) {
        return Err(OfdError::invalid_label(
            label,
            format!("segment {} is empty", n_idx + 1),
        ));
    }

    let c_date = l_parts[3];
    if c_date.len() != 8 || !c_date.bytes().all(|b| b.is_ascii_digit()) {
        return Err(OfdError::invalid_label(
            label,
            "date segment must be 8 ASCII digits",
        ));
    }
    if NaiveDate::parse_from_str(c_date, "%Y%m%d").is_err() {
        return Err(OfdError::invalid_label(
            label,
            format!("date segment {c_date:?} is not a calendar date"),
        ));
    }

    Ok(SpecOfdFileLabel {
        stem: c_stem.to_string(),
        creator: l_parts[1].to_string(),
        receiver: l_parts[2].to_string(),
        date: c_date.to_string(),
        type_code: l_parts[4].to_string(),
    })
}

static RE_OFD_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(C_OFD_FILE_NAME_PATTERN).expect("C_OFD_FILE_NAME_PATTERN is a valid regex")
});

/// Upload-time name check (`OFD_*_*_<8 digits>_*.xlsx`).
pub fn check_file_name(name: &str) -> bool {
    RE_OFD_FILE_NAME.is_match(name)
}

/// `<stem>.TXT`
pub fn derive_output_file_name(file_label: &SpecOfdFileLabel) -> String {
    format!("{}.{C_OFD_OUTPUT_EXTENSION}", file_label.stem)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TableUtils

/// Validate that `columns` has no duplicated names.
pub fn validate_unique_columns(columns: &[String]) -> Result<(), OfdError> {
    if columns.len() == columns.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter(|(_, l_pos)| l_pos.len() > 1)
        .map(|(c_name, l_pos)| format!("{c_name:?} at indices {l_pos:?}"))
        .collect::<Vec<_>>()
        .join("; ");

    Err(OfdError::InvalidTable(format!(
        "Duplicate column names detected: {c_msg}"
    )))
}

/// Check that every row is as wide as the header.
pub fn validate_table_shape(table: &SpecOfdTable) -> Result<(), OfdError> {
    validate_unique_columns(&table.columns)?;
    let n_width = table.width();
    if let Some((n_idx, row)) = table
        .rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != n_width)
    {
        return Err(OfdError::InvalidTable(format!(
            "row {n_idx} has {} cells, header has {n_width}",
            row.len()
        )));
    }
    Ok(())
}

/// Make header labels non-empty and unique.
///
/// Blank labels become `Unnamed: <idx>`; repeats get `.1`, `.2`, ... suffixes.
pub fn derive_unique_headers<S: AsRef<str>>(raw_headers: &[S]) -> Vec<String> {
    let l_base: Vec<String> = raw_headers
        .iter()
        .enumerate()
        .map(|(n_idx, raw)| {
            let c_raw = raw.as_ref().trim();
            if c_raw.is_empty() {
                format!("Unnamed: {n_idx}")
            } else {
                c_raw.to_string()
            }
        })
        .collect();

    let mut set_used: BTreeSet<String> = BTreeSet::new();
    let mut dict_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut l_headers = Vec::with_capacity(l_base.len());
    for c_base in l_base {
        let mut c_header = c_base.clone();
        while set_used.contains(&c_header) {
            let n_count = dict_counts.entry(c_base.clone()).or_insert(0);
            *n_count += 1;
            c_header = format!("{c_base}.{n_count}");
        }
        set_used.insert(c_header.clone());
        l_headers.push(c_header);
    }
    l_headers
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellText

/// Text form of a numeric cell; integral values print without a fraction.
pub fn format_float_cell_text(num: f64) -> String {
    if num.is_finite() && num.fract() == 0.0 && num.abs() < 1e15 {
        return format!("{num:.0}");
    }
    num.to_string()
}

/// Text form of a boolean cell.
pub fn format_bool_cell_text(val: bool) -> String {
    if val { "True" } else { "False" }.to_string()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
