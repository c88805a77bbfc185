//! OFD field models, options and top-level error types.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

////////////////////////////////////////////////////////////////////////////////
// #region FieldModel

/// Underlying value class of one OFD field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumFieldTypeClass {
    /// Arbitrary text, bounded by byte length.
    Character,
    /// Text restricted to `0-9`, no decimal scaling.
    DigitString,
    /// Arithmetic value with implied decimal places.
    Numeric,
}

impl EnumFieldTypeClass {
    /// Stable lower-case name used by reports and the Python bridge.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::DigitString => "digit_string",
            Self::Numeric => "numeric",
        }
    }

    /// Whether values of this class are encoded by decimal convention.
    pub fn is_numeric_like(&self) -> bool {
        matches!(self, Self::Numeric | Self::DigitString)
    }
}

impl fmt::Display for EnumFieldTypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One canonical field of the OFD schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecFieldSpec {
    /// Human-readable schema key (spreadsheet header text).
    pub canonical_name: &'static str,
    /// Short code written to the output field directory.
    pub identifier: &'static str,
    /// Value class.
    pub type_class: EnumFieldTypeClass,
    /// Fixed output width in bytes (GB18030), never characters.
    pub byte_length: usize,
    /// Implied fractional digits; `0` for non-numeric classes.
    pub decimal_places: usize,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnMapping

/// Input column label -> canonical field name.
///
/// Entries are only ever inserted or overwritten; nothing is removed while a
/// resolve session owns the mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecColumnMapping {
    dict_label_to_field: BTreeMap<String, String>,
}

impl SpecColumnMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite one `label -> field_name` entry.
    pub fn insert(&mut self, label: impl Into<String>, field_name: impl Into<String>) {
        self.dict_label_to_field
            .insert(label.into(), field_name.into());
    }

    /// Canonical field name mapped to `label`.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.dict_label_to_field.get(label).map(String::as_str)
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.dict_label_to_field.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.dict_label_to_field.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict_label_to_field.is_empty()
    }

    /// Iterate `(label, field_name)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.dict_label_to_field
            .iter()
            .map(|(label, field_name)| (label.as_str(), field_name.as_str()))
    }

    /// Plain map view, used by the Python bridge.
    pub fn to_dict(&self) -> BTreeMap<String, String> {
        self.dict_label_to_field.clone()
    }
}

impl<K, V> FromIterator<(K, V)> for SpecColumnMapping
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut column_mapping = Self::new();
        for (label, field_name) in iter {
            column_mapping.insert(label, field_name);
        }
        column_mapping
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TableAndDocument

/// In-memory source table: header labels plus string rows.
///
/// Every row has exactly `columns.len()` cells; an empty string means "no value".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecOfdTable {
    /// Column labels in file order.
    pub columns: Vec<String>,
    /// Row-major cell text.
    pub rows: Vec<Vec<String>>,
}

impl SpecOfdTable {
    /// Number of data rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

/// Parsed `OFD_<creator>_<receiver>_<YYYYMMDD>_<type>` file label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecOfdFileLabel {
    /// File stem the label was parsed from.
    pub stem: String,
    /// Creator (sender) code.
    pub creator: String,
    /// Receiver code.
    pub receiver: String,
    /// Eight-digit transaction date.
    pub date: String,
    /// File type code.
    pub type_code: String,
}

/// Finished OFD output: GB18030 bytes plus the facts used to build them.
///
/// Write-once; no mutating accessors are exposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecOfdDocument {
    pub(crate) file_name: String,
    pub(crate) identifiers: Vec<String>,
    pub(crate) n_rows: usize,
    pub(crate) content: Vec<u8>,
}

impl SpecOfdDocument {
    /// Output file name (`<stem>.TXT`).
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Field identifiers in output column order.
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// Number of record lines.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Encoded document bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }

    /// Decode the document back to text.
    pub fn text(&self) -> String {
        let (c_text, _, _) = encoding_rs::GB18030.decode(&self.content);
        c_text.into_owned()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Behavior when a source column has no usable mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumUnresolvedColumnRule {
    /// Drop the column and list it in the report (default).
    #[default]
    Warn,
    /// Reject the whole document.
    Error,
}

/// Behavior when a numeric value needs more digits than the field width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumNumericOverflowRule {
    /// Abort conversion with [`OfdError::EncodingOverflow`] (default).
    #[default]
    Error,
    /// Blank-fill the field and record a warning.
    Blank,
}

/// Column resolver options.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecColumnResolveOptions {
    /// Minimum similarity ratio for a fuzzy suggestion.
    pub thr_fuzzy_cutoff: f64,
}

impl Default for SpecColumnResolveOptions {
    fn default() -> Self {
        Self {
            thr_fuzzy_cutoff: crate::conf::N_FUZZY_CUTOFF_DEFAULT,
        }
    }
}

/// Conversion options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecOfdConvertOptions {
    /// Unmapped source column policy.
    pub rule_unresolved_column: EnumUnresolvedColumnRule,
    /// Numeric overflow policy.
    pub rule_numeric_overflow: EnumNumericOverflowRule,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Top-level conversion errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfdError {
    /// Source file label does not follow `OFD_<creator>_<receiver>_<YYYYMMDD>_<type>`.
    InvalidFileLabel {
        /// Offending label.
        label: String,
        /// Which rule was violated.
        reason: String,
    },
    /// Canonical field name is not in the schema.
    FieldNotFound(String),
    /// Label is not part of the resolve session.
    UnknownColumnLabel(String),
    /// Label has no fuzzy suggestion to accept.
    NoSuggestion(String),
    /// Source columns without a usable mapping (strict mode).
    UnresolvedColumns(Vec<String>),
    /// Several source labels map onto the same canonical field.
    DuplicateFieldMapping {
        /// Canonical field name.
        field_name: String,
        /// Source labels mapped onto it.
        labels: Vec<String>,
    },
    /// Numeric digits exceed the declared byte length.
    EncodingOverflow {
        /// Canonical field name.
        field_name: String,
        /// Raw cell text.
        value: String,
        /// Declared width.
        byte_length: usize,
        /// Digits produced.
        n_digits: usize,
        /// Zero-based data row index, when known.
        row_idx: Option<usize>,
    },
    /// Malformed in-memory table.
    InvalidTable(String),
    /// Filesystem failure.
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error text.
        message: String,
    },
    /// Spreadsheet read/write failure.
    Xlsx(String),
    /// Polars frame conversion failure.
    DataFrame(String),
}

impl OfdError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid_label(label: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFileLabel {
            label: label.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for OfdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFileLabel { label, reason } => write!(
                f,
                "Invalid file name {label:?}: {reason} (expected OFD_<creator>_<receiver>_<YYYYMMDD>_<type>.xlsx)"
            ),
            Self::FieldNotFound(name) => write!(f, "Unknown OFD field: {name:?}"),
            Self::UnknownColumnLabel(label) => {
                write!(f, "Column label is not part of this session: {label:?}")
            }
            Self::NoSuggestion(label) => write!(f, "No suggestion to accept for {label:?}"),
            Self::UnresolvedColumns(labels) => {
                write!(f, "Columns without field mapping: {labels:?}")
            }
            Self::DuplicateFieldMapping { field_name, labels } => write!(
                f,
                "Field {field_name:?} is mapped from several columns: {labels:?}"
            ),
            Self::EncodingOverflow {
                field_name,
                value,
                byte_length,
                n_digits,
                row_idx,
            } => {
                write!(
                    f,
                    "Numeric overflow in field {field_name:?}: value {value:?} needs {n_digits} digits, width is {byte_length}"
                )?;
                if let Some(n_idx) = row_idx {
                    write!(f, " (row {n_idx})")?;
                }
                Ok(())
            }
            Self::InvalidTable(msg) => write!(f, "Invalid table: {msg}"),
            Self::Io { path, message } => write!(f, "IO error at {}: {message}", path.display()),
            Self::Xlsx(msg) => write!(f, "xlsx error: {msg}"),
            Self::DataFrame(msg) => write!(f, "DataFrame error: {msg}"),
        }
    }
}

impl std::error::Error for OfdError {}

// #endregion
////////////////////////////////////////////////////////////////////////////////
