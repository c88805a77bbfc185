//! OFD document assembler and scoped file output.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info, warn};

use crate::conf::{
    C_OFD_HEADER_PLACEHOLDER, C_OFD_HEADER_TAG, C_OFD_LINE_END, C_OFD_TRAILER_TAG,
    C_OFD_VERSION, N_OFD_HEADER_BLANK_LINES, N_WIDTH_COLUMN_COUNT, N_WIDTH_ROW_COUNT,
};
use crate::encode::{
    EnumFieldEncodeStatus, SpecEncodedField, derive_blank_token, encode_field_checked,
    encode_text,
};
use crate::reader::read_xlsx_table;
use crate::report::{ReportOfd, ReportOfdBuilder};
use crate::schema;
use crate::spec::{
    EnumNumericOverflowRule, EnumUnresolvedColumnRule, OfdError, SpecColumnMapping,
    SpecFieldSpec, SpecOfdConvertOptions, SpecOfdDocument, SpecOfdFileLabel, SpecOfdTable,
};
use crate::util::{
    check_file_name, derive_output_file_name, parse_source_file_label, validate_table_shape,
};

/// One source column that makes it into the output.
#[derive(Debug, Clone, Copy)]
struct SpecOutputColumn<'a> {
    idx_col: usize,
    label: &'a str,
    spec: &'static SpecFieldSpec,
}

////////////////////////////////////////////////////////////////////////////////
// #region Convert

/// Convert a finalized table with default options.
pub fn convert(
    table: &SpecOfdTable,
    column_mapping: &SpecColumnMapping,
    source_file_label: &str,
) -> Result<SpecOfdDocument, OfdError> {
    convert_table_to_ofd(
        table,
        column_mapping,
        source_file_label,
        &SpecOfdConvertOptions::default(),
    )
    .map(|(document, _)| document)
}

/// Assemble the OFD document for `table`.
///
/// The file label is validated before anything else. Output columns keep
/// source order; columns without a known mapping target are dropped (or
/// rejected under [`EnumUnresolvedColumnRule::Error`]).
pub fn convert_table_to_ofd(
    table: &SpecOfdTable,
    column_mapping: &SpecColumnMapping,
    source_file_label: &str,
    options: &SpecOfdConvertOptions,
) -> Result<(SpecOfdDocument, ReportOfd), OfdError> {
    let file_label = parse_source_file_label(source_file_label)?;
    validate_table_shape(table)?;

    let mut builder = ReportOfdBuilder::default();
    let l_output_cols = plan_output_columns(table, column_mapping, options, &mut builder)?;
    builder.cnt_cols = l_output_cols.len() as u64;
    builder.fields_missing = derive_fields_missing(&l_output_cols);
    if !builder.fields_missing.is_empty() {
        debug!(
            "{} schema fields are not present in {}",
            builder.fields_missing.len(),
            file_label.stem
        );
        let c_msg = format!(
            "{} schema fields are absent from the output",
            builder.fields_missing.len()
        );
        builder.add_warning(c_msg);
    }

    let mut c_text = derive_header_text(&file_label, &l_output_cols, table.height());
    for (idx_row, row) in table.rows.iter().enumerate() {
        for col in &l_output_cols {
            let spec_encoded = encode_cell(&row[col.idx_col], col, idx_row, options, &mut builder)?;
            c_text.push_str(&spec_encoded.token);
        }
        c_text.push_str(C_OFD_LINE_END);
        builder.add_row();
    }
    c_text.push_str(C_OFD_TRAILER_TAG);

    let document = SpecOfdDocument {
        file_name: derive_output_file_name(&file_label),
        identifiers: l_output_cols
            .iter()
            .map(|col| col.spec.identifier.to_string())
            .collect(),
        n_rows: table.height(),
        content: encode_text(&c_text),
    };
    let report = builder.build();
    info!("{report} file={}", document.file_name);
    Ok((document, report))
}

fn plan_output_columns<'a>(
    table: &'a SpecOfdTable,
    column_mapping: &SpecColumnMapping,
    options: &SpecOfdConvertOptions,
    builder: &mut ReportOfdBuilder,
) -> Result<Vec<SpecOutputColumn<'a>>, OfdError> {
    let mut l_output_cols = Vec::with_capacity(table.width());
    for (idx_col, label) in table.columns.iter().enumerate() {
        let Some(field_name) = column_mapping.get(label) else {
            warn!("Column {label:?} has no field mapping; dropped");
            builder.add_dropped(label.as_str());
            continue;
        };
        let Ok(spec) = schema::lookup(field_name) else {
            warn!("Column {label:?} maps to unknown field {field_name:?}; dropped");
            builder.add_warning(format!(
                "Column {label:?} maps to unknown field {field_name:?}"
            ));
            builder.add_dropped(label.as_str());
            continue;
        };
        l_output_cols.push(SpecOutputColumn {
            idx_col,
            label: label.as_str(),
            spec,
        });
    }

    if options.rule_unresolved_column == EnumUnresolvedColumnRule::Error
        && !builder.cols_dropped.is_empty()
    {
        return Err(OfdError::UnresolvedColumns(builder.cols_dropped.clone()));
    }

    let mut dict_labels_by_field: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for col in &l_output_cols {
        dict_labels_by_field
            .entry(col.spec.canonical_name)
            .or_default()
            .push(col.label);
    }
    for col in &l_output_cols {
        let l_labels = &dict_labels_by_field[col.spec.canonical_name];
        if l_labels.len() > 1 {
            return Err(OfdError::DuplicateFieldMapping {
                field_name: col.spec.canonical_name.to_string(),
                labels: l_labels.iter().map(|label| label.to_string()).collect(),
            });
        }
    }

    Ok(l_output_cols)
}

fn derive_fields_missing(l_output_cols: &[SpecOutputColumn<'_>]) -> Vec<String> {
    let set_used: BTreeSet<&str> = l_output_cols
        .iter()
        .map(|col| col.spec.canonical_name)
        .collect();
    schema::field_names()
        .into_iter()
        .filter(|name| !set_used.contains(name))
        .map(str::to_string)
        .collect()
}

fn derive_header_text(
    file_label: &SpecOfdFileLabel,
    l_output_cols: &[SpecOutputColumn<'_>],
    n_rows: usize,
) -> String {
    let mut l_lines: Vec<String> = vec![
        C_OFD_HEADER_TAG.to_string(),
        C_OFD_VERSION.to_string(),
        file_label.creator.clone(),
        file_label.receiver.clone(),
        file_label.date.clone(),
        C_OFD_HEADER_PLACEHOLDER.to_string(),
        file_label.type_code.clone(),
    ];
    l_lines.extend(std::iter::repeat_n(String::new(), N_OFD_HEADER_BLANK_LINES));
    l_lines.push(format!(
        "{:0width$}",
        l_output_cols.len(),
        width = N_WIDTH_COLUMN_COUNT
    ));
    l_lines.extend(l_output_cols.iter().map(|col| col.spec.identifier.to_string()));
    l_lines.push(format!("{n_rows:0width$}", width = N_WIDTH_ROW_COUNT));

    let mut c_text = String::new();
    for c_line in l_lines {
        c_text.push_str(&c_line);
        c_text.push_str(C_OFD_LINE_END);
    }
    c_text
}

fn encode_cell(
    value: &str,
    col: &SpecOutputColumn<'_>,
    idx_row: usize,
    options: &SpecOfdConvertOptions,
    builder: &mut ReportOfdBuilder,
) -> Result<SpecEncodedField, OfdError> {
    let spec_encoded = match encode_field_checked(value, col.spec) {
        Ok(spec_encoded) => spec_encoded,
        Err(OfdError::EncodingOverflow {
            field_name,
            value,
            byte_length,
            n_digits,
            ..
        }) => match options.rule_numeric_overflow {
            EnumNumericOverflowRule::Error => {
                return Err(OfdError::EncodingOverflow {
                    field_name,
                    value,
                    byte_length,
                    n_digits,
                    row_idx: Some(idx_row),
                });
            }
            EnumNumericOverflowRule::Blank => {
                let c_msg = format!(
                    "Row {idx_row}, column {:?}: value {value:?} needs {n_digits} digits, width is {byte_length}; blank-filled",
                    col.label
                );
                warn!("{c_msg}");
                builder.add_warning(c_msg);
                builder.add_overflowed();
                return Ok(SpecEncodedField {
                    token: derive_blank_token(byte_length),
                    status: EnumFieldEncodeStatus::Blank,
                });
            }
        },
        Err(err) => return Err(err),
    };

    match spec_encoded.status {
        EnumFieldEncodeStatus::ParseFailed => {
            debug!(
                "Row {idx_row}, column {:?}: {value:?} is not numeric; blank-filled",
                col.label
            );
            builder.add_blanked();
        }
        EnumFieldEncodeStatus::Truncated => {
            debug!(
                "Row {idx_row}, column {:?}: truncated to {} bytes",
                col.label, col.spec.byte_length
            );
            builder.add_truncated();
        }
        EnumFieldEncodeStatus::Encoded | EnumFieldEncodeStatus::Blank => {}
    }
    Ok(spec_encoded)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FileOutput

static N_SCRATCH_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Scratch path unique per process and per call, so concurrent writes of the
/// same file name never share one `.part` file.
fn derive_scratch_path(dir_out: &Path, file_name: &str) -> PathBuf {
    let n_seq = N_SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
    dir_out.join(format!(".{file_name}.{}.{n_seq}.part", std::process::id()))
}

/// Scratch file removed on drop unless committed.
struct ScratchFileGuard {
    path: PathBuf,
    if_committed: bool,
}

impl ScratchFileGuard {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            if_committed: false,
        }
    }

    fn commit(mut self, path_dst: &Path) -> Result<(), OfdError> {
        fs::rename(&self.path, path_dst).map_err(|err| OfdError::io(path_dst, err))?;
        self.if_committed = true;
        Ok(())
    }
}

impl Drop for ScratchFileGuard {
    fn drop(&mut self) {
        if !self.if_committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Write `document` as `<dir_out>/<file_name>`, replacing any previous file.
///
/// Bytes go to a scratch file first and are renamed into place, so the
/// destination is never left half-written.
pub fn write_ofd_document(document: &SpecOfdDocument, dir_out: &Path) -> Result<PathBuf, OfdError> {
    fs::create_dir_all(dir_out).map_err(|err| OfdError::io(dir_out, err))?;

    let path_dst = dir_out.join(document.file_name());
    let guard = ScratchFileGuard::new(derive_scratch_path(dir_out, document.file_name()));
    fs::write(&guard.path, document.as_bytes()).map_err(|err| OfdError::io(&guard.path, err))?;
    guard.commit(&path_dst)?;

    debug!(
        "Wrote {} bytes to {}",
        document.as_bytes().len(),
        path_dst.display()
    );
    Ok(path_dst)
}

/// Read `file_in`, convert it and write `<stem>.TXT` into `dir_out`.
///
/// The file name is checked before the workbook is opened; nothing is written
/// on any error.
pub fn convert_xlsx_to_ofd_file(
    file_in: &Path,
    dir_out: &Path,
    column_mapping: &SpecColumnMapping,
    options: &SpecOfdConvertOptions,
) -> Result<(PathBuf, ReportOfd), OfdError> {
    let c_name = file_in
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    parse_source_file_label(c_name)?;
    if !check_file_name(c_name) {
        return Err(OfdError::invalid_label(c_name, "expected a .xlsx workbook"));
    }

    let table = read_xlsx_table(file_in)?;
    let (document, report) = convert_table_to_ofd(&table, column_mapping, c_name, options)?;
    let path_out = write_ofd_document(&document, dir_out)?;
    Ok((path_out, report))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestDir, write_xlsx_fixture};

    fn table(columns: &[&str], rows: &[&[&str]]) -> SpecOfdTable {
        SpecOfdTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    fn identity_mapping(labels: &[&str]) -> SpecColumnMapping {
        labels.iter().map(|label| (*label, *label)).collect()
    }

    #[test]
    fn convert_single_fund_code_row() {
        let table = table(&["基金代码"], &[&["000001"]]);
        let document = convert(
            &table,
            &identity_mapping(&["基金代码"]),
            "OFD_002_11_20230801_01.xlsx",
        )
        .expect("convert");

        assert_eq!(document.file_name(), "OFD_002_11_20230801_01.TXT");
        assert_eq!(document.identifiers(), ["FundCode".to_string()]);
        assert_eq!(document.n_rows(), 1);
        assert_eq!(
            document.text(),
            "OFDCFDAT\r\n22\r\n002\r\n11\r\n20230801\r\n00000000\r\n01\r\n\r\n\r\n\
             00000001\r\nFundCode\r\n0000000000000001\r\n000001\r\nOFDCFEND"
        );
        assert!(document.as_bytes().ends_with(b"OFDCFEND"));
    }

    #[test]
    fn convert_rejects_bad_label_first() {
        let table = table(&["基金代码"], &[&["000001"]]);
        let err = convert(&table, &identity_mapping(&["基金代码"]), "OFD_002_11.xlsx")
            .expect_err("bad label");
        assert!(matches!(err, OfdError::InvalidFileLabel { .. }));
    }

    #[test]
    fn convert_drops_and_reports_unmapped_columns() {
        let table = table(
            &["备注", "基金代码", "申请金额"],
            &[&["x", "000001", "123.4"], &["y", "000002", "abc"]],
        );
        let column_mapping: SpecColumnMapping =
            [("基金代码", "基金代码"), ("申请金额", "申请金额")].into_iter().collect();

        let (document, report) = convert_table_to_ofd(
            &table,
            &column_mapping,
            "OFD_002_11_20230801_01",
            &SpecOfdConvertOptions::default(),
        )
        .expect("convert");

        assert_eq!(report.cnt_rows, 2);
        assert_eq!(report.cnt_cols, 2);
        assert_eq!(report.cols_dropped, vec!["备注".to_string()]);
        assert_eq!(report.cnt_cells_blanked, 1);
        assert_eq!(report.fields_missing.len(), schema::field_names().len() - 2);
        assert!(!report.fields_missing.contains(&"基金代码".to_string()));

        let c_text = document.text();
        assert!(c_text.contains("\r\n00000002\r\nFundCode\r\nApplicationAmount\r\n"));
        assert!(c_text.contains("\r\n0000000000000002\r\n"));
        assert!(c_text.contains("\r\n0000010000000000012340\r\n"));
        assert!(c_text.contains(&format!("\r\n000002{}\r\n", " ".repeat(16))));
    }

    #[test]
    fn convert_strict_mode_rejects_unmapped_columns() {
        let table = table(&["备注", "基金代码"], &[&["x", "000001"]]);
        let options = SpecOfdConvertOptions {
            rule_unresolved_column: EnumUnresolvedColumnRule::Error,
            ..SpecOfdConvertOptions::default()
        };
        let err = convert_table_to_ofd(
            &table,
            &identity_mapping(&["基金代码"]),
            "OFD_002_11_20230801_01",
            &options,
        )
        .expect_err("strict");
        assert_eq!(err, OfdError::UnresolvedColumns(vec!["备注".to_string()]));
    }

    #[test]
    fn convert_unknown_mapping_target_is_dropped() {
        let table = table(&["代码"], &[&["000001"]]);
        let column_mapping: SpecColumnMapping = [("代码", "不存在的字段")].into_iter().collect();
        let (document, report) = convert_table_to_ofd(
            &table,
            &column_mapping,
            "OFD_002_11_20230801_01",
            &SpecOfdConvertOptions::default(),
        )
        .expect("convert");
        assert!(document.identifiers().is_empty());
        assert_eq!(report.cols_dropped, vec!["代码".to_string()]);
        assert!(document.text().contains("\r\n00000000\r\n0000000000000001\r\n\r\nOFDCFEND"));
    }

    #[test]
    fn convert_duplicate_field_mapping_is_fatal() {
        let table = table(&["基金代码", "产品代码"], &[&["000001", "000002"]]);
        let column_mapping: SpecColumnMapping =
            [("基金代码", "基金代码"), ("产品代码", "基金代码")].into_iter().collect();
        let err = convert(&table, &column_mapping, "OFD_002_11_20230801_01").expect_err("dup");
        assert_eq!(
            err,
            OfdError::DuplicateFieldMapping {
                field_name: "基金代码".to_string(),
                labels: vec!["基金代码".to_string(), "产品代码".to_string()],
            }
        );
    }

    #[test]
    fn convert_numeric_overflow_rules() {
        let table = table(&["申请金额"], &[&["1"], &["123456789012345678"]]);
        let column_mapping = identity_mapping(&["申请金额"]);

        let err = convert(&table, &column_mapping, "OFD_002_11_20230801_01").expect_err("overflow");
        assert!(matches!(
            err,
            OfdError::EncodingOverflow {
                row_idx: Some(1),
                byte_length: 16,
                ..
            }
        ));

        let options = SpecOfdConvertOptions {
            rule_numeric_overflow: EnumNumericOverflowRule::Blank,
            ..SpecOfdConvertOptions::default()
        };
        let (document, report) =
            convert_table_to_ofd(&table, &column_mapping, "OFD_002_11_20230801_01", &options)
                .expect("lenient");
        assert_eq!(report.cnt_cells_overflowed, 1);
        assert!(report.warnings.iter().any(|w| w.contains("blank-filled")));
        assert!(document.text().contains(&format!("\r\n{}\r\nOFDCFEND", " ".repeat(16))));
    }

    #[test]
    fn convert_records_have_exact_byte_width() {
        let table = table(
            &["投资人户名", "基金代码", "交易发生日期"],
            &[
                &["张三", "000001", "20230801"],
                &["很长的名字".repeat(30).as_str(), "0000012", ""],
            ],
        );
        let column_mapping = identity_mapping(&["投资人户名", "基金代码", "交易发生日期"]);
        let (document, report) = convert_table_to_ofd(
            &table,
            &column_mapping,
            "OFD_002_11_20230801_01",
            &SpecOfdConvertOptions::default(),
        )
        .expect("convert");
        assert_eq!(report.cnt_cells_truncated, 2);

        let n_width: usize = 200 + 6 + 8;
        let v_bytes = document.as_bytes();
        let l_lines: Vec<&[u8]> = v_bytes.split(|b| *b == b'\n').collect();
        // header(7) + blanks(2) + count + 3 identifiers + row count = 14 lines
        for line in &l_lines[14..16] {
            assert_eq!(line.len(), n_width + 1, "record + CR");
        }
    }

    #[test]
    fn convert_line_break_in_cell_keeps_one_line_per_record() {
        let table = table(&["基金代码", "通讯地址"], &[&["000001", "北京市\n朝阳区\r\n1号"]]);
        let column_mapping = identity_mapping(&["基金代码", "通讯地址"]);
        let document = convert(&table, &column_mapping, "OFD_002_11_20230801_01").expect("convert");

        let v_bytes = document.as_bytes();
        let l_lines: Vec<&[u8]> = v_bytes.split(|b| *b == b'\n').collect();
        // header(7) + blanks(2) + count + 2 identifiers + row count + record + trailer
        assert_eq!(l_lines.len(), 15);
        assert_eq!(l_lines[13].len(), 6 + 300 + 1, "record + CR");
        assert!(!l_lines[13][..306].contains(&b'\r'));
        assert_eq!(l_lines[14], b"OFDCFEND");
    }

    #[test]
    fn derive_scratch_path_is_unique_per_call() {
        let dir_out = Path::new("out");
        let path_a = derive_scratch_path(dir_out, "OFD_002_11_20230801_01.TXT");
        let path_b = derive_scratch_path(dir_out, "OFD_002_11_20230801_01.TXT");
        assert_ne!(path_a, path_b);
        assert_eq!(path_a.parent(), Some(dir_out));
        for path in [&path_a, &path_b] {
            let c_name = path.file_name().and_then(|name| name.to_str()).expect("name");
            assert!(c_name.starts_with(".OFD_002_11_20230801_01.TXT."));
            assert!(c_name.ends_with(".part"));
        }
    }

    #[test]
    fn write_ofd_document_replaces_target() {
        let tmp = TestDir::new();
        let table = table(&["基金代码"], &[&["000001"]]);
        let document = convert(
            &table,
            &identity_mapping(&["基金代码"]),
            "OFD_002_11_20230801_01",
        )
        .expect("convert");

        let dir_out = tmp.path().join("out");
        std::fs::create_dir_all(&dir_out).expect("mkdir");
        std::fs::write(dir_out.join("OFD_002_11_20230801_01.TXT"), "stale").expect("seed");

        let path_out = write_ofd_document(&document, &dir_out).expect("write");
        assert_eq!(std::fs::read(&path_out).expect("read"), document.as_bytes());
        let l_names: Vec<_> = std::fs::read_dir(&dir_out)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(l_names.len(), 1);
    }

    #[test]
    fn convert_xlsx_to_ofd_file_end_to_end() {
        let tmp = TestDir::new();
        let file_in = tmp.path().join("OFD_002_11_20230801_01.xlsx");
        write_xlsx_fixture(&file_in, &["基金代码", "备注"], &[&["000001", "x"]]);

        let dir_out = tmp.path().join("out");
        let (path_out, report) = convert_xlsx_to_ofd_file(
            &file_in,
            &dir_out,
            &identity_mapping(&["基金代码"]),
            &SpecOfdConvertOptions::default(),
        )
        .expect("convert xlsx");

        assert_eq!(path_out, dir_out.join("OFD_002_11_20230801_01.TXT"));
        assert_eq!(report.cols_dropped, vec!["备注".to_string()]);
        let v_bytes = std::fs::read(&path_out).expect("read");
        assert!(v_bytes.starts_with(b"OFDCFDAT\r\n"));
        assert!(v_bytes.ends_with(b"\r\n000001\r\nOFDCFEND"));
    }

    #[test]
    fn convert_xlsx_bad_name_writes_nothing() {
        let tmp = TestDir::new();
        let file_in = tmp.path().join("OFD_002_11.xlsx");
        write_xlsx_fixture(&file_in, &["基金代码"], &[&["000001"]]);

        let dir_out = tmp.path().join("out");
        let err = convert_xlsx_to_ofd_file(
            &file_in,
            &dir_out,
            &identity_mapping(&["基金代码"]),
            &SpecOfdConvertOptions::default(),
        )
        .expect_err("bad name");
        assert!(matches!(err, OfdError::InvalidFileLabel { .. }));
        assert!(!dir_out.exists());
    }
}
