//! OFD format constants and default option factories.

use crate::spec::{SpecColumnResolveOptions, SpecOfdConvertOptions};

/// First segment of every accepted source file name.
pub const C_OFD_FILE_NAME_TAG: &str = "OFD";
/// Number of `_`-separated segments in a source file stem.
pub const N_OFD_FILE_NAME_SEGMENTS: usize = 5;
/// Upload-time file name pattern.
pub const C_OFD_FILE_NAME_PATTERN: &str = r"^OFD_.+_.+_[0-9]{8}_.+\.xlsx$";
/// Extension of the generated document.
pub const C_OFD_OUTPUT_EXTENSION: &str = "TXT";

/// Header start marker.
pub const C_OFD_HEADER_TAG: &str = "OFDCFDAT";
/// Format version line.
pub const C_OFD_VERSION: &str = "22";
/// Zero-filled placeholder line following the date.
pub const C_OFD_HEADER_PLACEHOLDER: &str = "00000000";
/// Trailer marker, written without a line terminator.
pub const C_OFD_TRAILER_TAG: &str = "OFDCFEND";
/// Line terminator.
pub const C_OFD_LINE_END: &str = "\r\n";
/// Number of empty lines between the header block and the field directory.
pub const N_OFD_HEADER_BLANK_LINES: usize = 2;

/// Width of the output column count line.
pub const N_WIDTH_COLUMN_COUNT: usize = 8;
/// Width of the row count line.
pub const N_WIDTH_ROW_COUNT: usize = 16;

/// Fuzzy suggestion acceptance threshold (sequence-matcher ratio).
pub const N_FUZZY_CUTOFF_DEFAULT: f64 = 0.6;
/// `b` lengths at or above this use the popular-element heuristic.
pub const N_FUZZY_AUTOJUNK_MIN_LEN: usize = 200;

/// Padding byte for blank and character fields.
pub const CHR_PAD_CHARACTER: char = ' ';
/// Padding digit for numeric fields.
pub const CHR_PAD_NUMERIC: char = '0';

/// Sheet names used by the input template workbook.
pub const C_TEMPLATE_SHEET_DATA: &str = "data";
pub const C_TEMPLATE_SHEET_SCHEMA: &str = "schema";

/// Build default conversion options.
pub fn derive_default_ofd_convert_options() -> SpecOfdConvertOptions {
    SpecOfdConvertOptions::default()
}

/// Build default resolver options.
pub fn derive_default_column_resolve_options() -> SpecColumnResolveOptions {
    SpecColumnResolveOptions::default()
}
