//! `ofdkit_io_ofd` v1:
//! Rust-side spreadsheet to OFD fixed-width converter kernel.
//!
//! Module layout:
//! - `conf`     : format constants and default presets
//! - `spec`     : field specs/models/options/errors
//! - `schema`   : canonical field registry
//! - `encode`   : GB18030 fixed-width field encoder
//! - `resolve`  : column label resolver and resolve session
//! - `report`   : conversion report model
//! - `writer`   : document assembler and scoped file output
//! - `reader`   : xlsx / DataFrame table readers
//! - `template` : input template workbook writer
//! - `util`     : shared helper functions
pub mod conf;
pub mod encode;
pub mod reader;
pub mod report;
pub mod resolve;
pub mod schema;
pub mod spec;
pub mod template;
pub mod util;
pub mod writer;

#[cfg(test)]
mod testing;

pub use conf::{derive_default_column_resolve_options, derive_default_ofd_convert_options};
pub use encode::{EnumFieldEncodeStatus, SpecEncodedField, encode_field, encode_field_checked};
pub use reader::{derive_table_from_dataframe, read_xlsx_columns, read_xlsx_table};
pub use report::{ReportOfd, ReportOfdBuilder};
pub use resolve::{
    EnumColumnResolveEvent, SpecColumnResolveProgress, SpecColumnResolveSession,
    apply_manual_choice, find_closest_match, is_mapping_complete, resolve_columns,
};
pub use spec::{
    EnumFieldTypeClass, EnumNumericOverflowRule, EnumUnresolvedColumnRule, OfdError,
    SpecColumnMapping, SpecColumnResolveOptions, SpecFieldSpec, SpecOfdConvertOptions,
    SpecOfdDocument, SpecOfdFileLabel, SpecOfdTable,
};
pub use template::write_xlsx_template;
pub use util::{check_file_name, parse_source_file_label};
pub use writer::{convert, convert_table_to_ofd, convert_xlsx_to_ofd_file, write_ofd_document};
