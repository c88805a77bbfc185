//! Conversion report model and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

/// Counters and diagnostics for one conversion.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportOfd {
    /// Record lines written.
    pub cnt_rows: u64,
    /// Output columns (field directory entries).
    pub cnt_cols: u64,
    /// Numeric cells blank-filled because they did not parse.
    pub cnt_cells_blanked: u64,
    /// Character cells cut to their field width.
    pub cnt_cells_truncated: u64,
    /// Numeric cells blank-filled on overflow (lenient mode only).
    pub cnt_cells_overflowed: u64,
    /// Source columns left out of the output, in file order.
    pub cols_dropped: Vec<String>,
    /// Schema fields absent from the output, in schema order.
    pub fields_missing: Vec<String>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl ReportOfd {
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_rows".to_string(), self.cnt_rows);
        dict_counts.insert("cnt_cols".to_string(), self.cnt_cols);
        dict_counts.insert("cnt_cells_blanked".to_string(), self.cnt_cells_blanked);
        dict_counts.insert("cnt_cells_truncated".to_string(), self.cnt_cells_truncated);
        dict_counts.insert(
            "cnt_cells_overflowed".to_string(),
            self.cnt_cells_overflowed,
        );
        dict_counts.insert("cnt_cols_dropped".to_string(), self.cols_dropped.len() as u64);
        dict_counts.insert(
            "cnt_fields_missing".to_string(),
            self.fields_missing.len() as u64,
        );
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} rows={} cols={} dropped={} missing={} blanked={} truncated={} warnings={}",
            self.cnt_rows,
            self.cnt_cols,
            self.cols_dropped.len(),
            self.fields_missing.len(),
            self.cnt_cells_blanked + self.cnt_cells_overflowed,
            self.cnt_cells_truncated,
            self.warning_count()
        )
    }
}

impl fmt::Display for ReportOfd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[OFD]"))
    }
}

/// Mutable accumulator used while a document is assembled.
#[derive(Debug, Default, Clone)]
pub struct ReportOfdBuilder {
    /// See [`ReportOfd::cnt_rows`].
    pub cnt_rows: u64,
    /// See [`ReportOfd::cnt_cols`].
    pub cnt_cols: u64,
    /// See [`ReportOfd::cnt_cells_blanked`].
    pub cnt_cells_blanked: u64,
    /// See [`ReportOfd::cnt_cells_truncated`].
    pub cnt_cells_truncated: u64,
    /// See [`ReportOfd::cnt_cells_overflowed`].
    pub cnt_cells_overflowed: u64,
    /// See [`ReportOfd::cols_dropped`].
    pub cols_dropped: Vec<String>,
    /// See [`ReportOfd::fields_missing`].
    pub fields_missing: Vec<String>,
    /// See [`ReportOfd::warnings`].
    pub warnings: Vec<String>,
}

impl ReportOfdBuilder {
    pub fn add_row(&mut self) {
        self.cnt_rows += 1;
    }

    pub fn add_blanked(&mut self) {
        self.cnt_cells_blanked += 1;
    }

    pub fn add_truncated(&mut self) {
        self.cnt_cells_truncated += 1;
    }

    pub fn add_overflowed(&mut self) {
        self.cnt_cells_overflowed += 1;
    }

    /// Record a source column that will not be written.
    pub fn add_dropped(&mut self, label: impl Into<String>) {
        self.cols_dropped.push(label.into());
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: impl AsRef<str>) {
        self.warnings.push(warning.as_ref().to_string());
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportOfd {
        ReportOfd {
            cnt_rows: self.cnt_rows,
            cnt_cols: self.cnt_cols,
            cnt_cells_blanked: self.cnt_cells_blanked,
            cnt_cells_truncated: self.cnt_cells_truncated,
            cnt_cells_overflowed: self.cnt_cells_overflowed,
            cols_dropped: self.cols_dropped,
            fields_missing: self.fields_missing,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ReportOfd, ReportOfdBuilder};

    #[test]
    fn report_ofd_to_dict_and_format() {
        let mut builder = ReportOfdBuilder {
            cnt_cols: 3,
            ..ReportOfdBuilder::default()
        };
        builder.add_row();
        builder.add_row();
        builder.add_blanked();
        builder.add_overflowed();
        builder.add_truncated();
        builder.add_dropped("备注");
        builder.add_warning("w");
        let report: ReportOfd = builder.build();

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_rows"], 2);
        assert_eq!(dict_counts["cnt_cols"], 3);
        assert_eq!(dict_counts["cnt_cells_blanked"], 1);
        assert_eq!(dict_counts["cnt_cells_overflowed"], 1);
        assert_eq!(dict_counts["cnt_cols_dropped"], 1);
        assert_eq!(dict_counts["cnt_fields_missing"], 0);

        let txt = report.format("[OFD]");
        assert_eq!(
            txt,
            "[OFD] rows=2 cols=3 dropped=1 missing=0 blanked=2 truncated=1 warnings=1"
        );
        assert_eq!(report.to_string(), txt);
    }
}
