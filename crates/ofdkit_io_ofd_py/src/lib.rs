use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{StructArray, TryExtend};
use arrow::datatypes::{ArrowDataType, ArrowSchema, Field as ArrowField};
use arrow::record_batch::RecordBatchT;
use ofdkit_io_ofd::conf::N_FUZZY_CUTOFF_DEFAULT;
use ofdkit_io_ofd::{
    EnumColumnResolveEvent, EnumNumericOverflowRule, EnumUnresolvedColumnRule, OfdError,
    ReportOfd, SpecColumnMapping, SpecColumnResolveOptions, SpecColumnResolveSession,
    SpecOfdConvertOptions, SpecOfdDocument, check_file_name, convert_table_to_ofd,
    convert_xlsx_to_ofd_file, derive_table_from_dataframe, read_xlsx_columns, schema,
    write_xlsx_template,
};
use polars::prelude::DataFrame;
use pyo3::exceptions::{PyOSError, PyRuntimeError, PyValueError};
use pyo3::ffi as pyffi;
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyBytes};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "ofdkit.io.ofd.v1";
const C_BRIDGE_TRANSPORT: &str = "arrow_c_data";
const C_ARROW_ARRAY_STREAM_CAPSULE_NAME: &[u8] = b"arrow_array_stream\0";

////////////////////////////////////////////////////////////////////////////////
// #region ResolveSession

#[pyclass(name = "ColumnResolveSession")]
#[derive(Debug, Clone)]
struct PyColumnResolveSession {
    inner: SpecColumnResolveSession,
}

impl PyColumnResolveSession {
    fn apply(&mut self, event: EnumColumnResolveEvent) -> PyResult<()> {
        self.inner = self.inner.clone().apply_event(event).map_err(map_ofd_error)?;
        Ok(())
    }
}

#[pymethods]
impl PyColumnResolveSession {
    #[new]
    #[pyo3(signature = (labels, thr_fuzzy_cutoff = None))]
    fn new(labels: Vec<String>, thr_fuzzy_cutoff: Option<f64>) -> PyResult<Self> {
        let thr_fuzzy_cutoff = thr_fuzzy_cutoff.unwrap_or(N_FUZZY_CUTOFF_DEFAULT);
        if !(0.0..=1.0).contains(&thr_fuzzy_cutoff) {
            return Err(PyValueError::new_err(format!(
                "thr_fuzzy_cutoff must be within [0, 1], got {thr_fuzzy_cutoff}"
            )));
        }
        let inner = SpecColumnResolveSession::resolve_columns(
            &labels,
            SpecColumnResolveOptions { thr_fuzzy_cutoff },
        );
        Ok(Self { inner })
    }

    fn resolve_again(&mut self, labels: Vec<String>) {
        self.inner = self.inner.clone().resolve_again(&labels);
    }

    fn accept_suggestion(&mut self, label: String) -> PyResult<()> {
        self.apply(EnumColumnResolveEvent::AcceptSuggestion { label })
    }

    fn begin_manual(&mut self, label: String) -> PyResult<()> {
        self.apply(EnumColumnResolveEvent::BeginManual { label })
    }

    fn apply_manual_choice(&mut self, label: String, field_name: String) -> PyResult<()> {
        self.apply(EnumColumnResolveEvent::ChooseManual { label, field_name })
    }

    fn cancel_manual(&mut self) -> PyResult<()> {
        self.apply(EnumColumnResolveEvent::CancelManual)
    }

    #[pyo3(signature = (n_labels_source = None))]
    fn is_mapping_complete(&self, n_labels_source: Option<usize>) -> bool {
        self.inner
            .is_mapping_complete(n_labels_source.unwrap_or(self.inner.labels().len()))
    }

    fn is_exact_match(&self, label: &str) -> bool {
        self.inner.is_exact_match(label)
    }

    fn suggestion(&self, label: &str) -> Option<String> {
        self.inner.suggestion(label).map(str::to_string)
    }

    #[getter]
    fn labels(&self) -> Vec<String> {
        self.inner.labels().to_vec()
    }

    #[getter]
    fn mapping(&self) -> BTreeMap<String, String> {
        self.inner.column_mapping().to_dict()
    }

    #[getter]
    fn suggestions(&self) -> BTreeMap<String, String> {
        self.inner.suggestions().clone()
    }

    #[getter]
    fn unresolved(&self) -> Vec<String> {
        self.inner
            .labels_unresolved()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[getter]
    fn pending(&self) -> Option<String> {
        self.inner.label_pending().map(str::to_string)
    }

    /// `(confirmed, to_confirm)`
    #[getter]
    fn progress(&self) -> (usize, usize) {
        let progress = self.inner.progress();
        (progress.cnt_confirmed, progress.cnt_to_confirm)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ResultClasses

#[pyclass(name = "OfdDocument")]
#[derive(Debug, Clone)]
struct PyOfdDocument {
    inner: SpecOfdDocument,
}

#[pymethods]
impl PyOfdDocument {
    #[getter]
    fn file_name(&self) -> String {
        self.inner.file_name().to_string()
    }

    #[getter]
    fn identifiers(&self) -> Vec<String> {
        self.inner.identifiers().to_vec()
    }

    #[getter]
    fn n_rows(&self) -> usize {
        self.inner.n_rows()
    }

    /// GB18030 bytes.
    fn to_bytes<'py>(&self, py: Python<'py>) -> Bound<'py, PyBytes> {
        PyBytes::new(py, self.inner.as_bytes())
    }

    fn text(&self) -> String {
        self.inner.text()
    }
}

#[pyclass(name = "ReportOfd")]
#[derive(Debug, Clone)]
struct PyReportOfd {
    inner: ReportOfd,
}

impl From<ReportOfd> for PyReportOfd {
    fn from(report: ReportOfd) -> Self {
        Self { inner: report }
    }
}

#[pymethods]
impl PyReportOfd {
    #[getter]
    fn cnt_rows(&self) -> u64 {
        self.inner.cnt_rows
    }

    #[getter]
    fn cnt_cols(&self) -> u64 {
        self.inner.cnt_cols
    }

    #[getter]
    fn cnt_cells_blanked(&self) -> u64 {
        self.inner.cnt_cells_blanked
    }

    #[getter]
    fn cnt_cells_truncated(&self) -> u64 {
        self.inner.cnt_cells_truncated
    }

    #[getter]
    fn cnt_cells_overflowed(&self) -> u64 {
        self.inner.cnt_cells_overflowed
    }

    #[getter]
    fn cols_dropped(&self) -> Vec<String> {
        self.inner.cols_dropped.clone()
    }

    #[getter]
    fn fields_missing(&self) -> Vec<String> {
        self.inner.fields_missing.clone()
    }

    #[getter]
    fn warnings(&self) -> Vec<String> {
        self.inner.warnings.clone()
    }

    #[getter]
    fn warning_count(&self) -> usize {
        self.inner.warning_count()
    }

    fn to_dict(&self) -> BTreeMap<String, u64> {
        self.inner.to_dict()
    }

    #[pyo3(signature = (prefix = "[OFD]"))]
    fn format(&self, prefix: &str) -> String {
        self.inner.format(prefix)
    }

    fn __str__(&self) -> String {
        self.inner.to_string()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Functions

#[pyfunction(name = "convert")]
#[pyo3(signature = (
    df,
    column_mapping,
    source_file_label,
    rule_unresolved_column = "warn",
    rule_numeric_overflow = "error"
))]
fn convert_py(
    py: Python<'_>,
    df: &Bound<'_, PyAny>,
    column_mapping: BTreeMap<String, String>,
    source_file_label: String,
    rule_unresolved_column: &str,
    rule_numeric_overflow: &str,
) -> PyResult<(PyOfdDocument, PyReportOfd)> {
    let options = parse_spec_ofd_convert_options(rule_unresolved_column, rule_numeric_overflow)?;
    let df_data = derive_dataframe_from_any_dataframe(py, df)?;
    let column_mapping: SpecColumnMapping = column_mapping.into_iter().collect();

    let (document, report) = py
        .allow_threads(|| {
            let table = derive_table_from_dataframe(&df_data)?;
            convert_table_to_ofd(&table, &column_mapping, &source_file_label, &options)
        })
        .map_err(map_ofd_error)?;
    Ok((PyOfdDocument { inner: document }, PyReportOfd::from(report)))
}

#[pyfunction(name = "convert_xlsx")]
#[pyo3(signature = (
    file_in,
    dir_out,
    column_mapping,
    rule_unresolved_column = "warn",
    rule_numeric_overflow = "error"
))]
fn convert_xlsx_py(
    py: Python<'_>,
    file_in: PathBuf,
    dir_out: PathBuf,
    column_mapping: BTreeMap<String, String>,
    rule_unresolved_column: &str,
    rule_numeric_overflow: &str,
) -> PyResult<(String, PyReportOfd)> {
    let options = parse_spec_ofd_convert_options(rule_unresolved_column, rule_numeric_overflow)?;
    let column_mapping: SpecColumnMapping = column_mapping.into_iter().collect();

    let (path_out, report) = py
        .allow_threads(|| convert_xlsx_to_ofd_file(&file_in, &dir_out, &column_mapping, &options))
        .map_err(map_ofd_error)?;
    Ok((
        path_out.to_string_lossy().to_string(),
        PyReportOfd::from(report),
    ))
}

#[pyfunction(name = "read_xlsx_columns")]
fn read_xlsx_columns_py(py: Python<'_>, file_in: PathBuf) -> PyResult<Vec<String>> {
    py.allow_threads(|| read_xlsx_columns(&file_in))
        .map_err(map_ofd_error)
}

#[pyfunction(name = "check_file_name")]
fn check_file_name_py(name: &str) -> bool {
    check_file_name(name)
}

#[pyfunction(name = "field_names")]
#[pyo3(signature = (if_sorted = false))]
fn field_names_py(if_sorted: bool) -> Vec<&'static str> {
    if if_sorted {
        schema::field_names_sorted()
    } else {
        schema::field_names()
    }
}

/// `(identifier, type_class, byte_length, decimal_places)`
#[pyfunction(name = "field_spec")]
fn field_spec_py(field_name: &str) -> PyResult<(&'static str, &'static str, usize, usize)> {
    let spec = schema::lookup(field_name).map_err(map_ofd_error)?;
    Ok((
        spec.identifier,
        spec.type_class.as_str(),
        spec.byte_length,
        spec.decimal_places,
    ))
}

#[pyfunction(name = "write_xlsx_template")]
#[pyo3(signature = (file_out, field_names = None))]
fn write_xlsx_template_py(
    py: Python<'_>,
    file_out: PathBuf,
    field_names: Option<Vec<String>>,
) -> PyResult<()> {
    let field_names = field_names.unwrap_or_default();
    py.allow_threads(|| write_xlsx_template(&file_out, &field_names))
        .map_err(map_ofd_error)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Parsing

fn parse_rule_unresolved_column(value: &str) -> PyResult<EnumUnresolvedColumnRule> {
    match value {
        "warn" => Ok(EnumUnresolvedColumnRule::Warn),
        "error" => Ok(EnumUnresolvedColumnRule::Error),
        _ => Err(PyValueError::new_err(format!(
            "Invalid unresolved column rule: `{value}`. Expected one of: ['warn', 'error']"
        ))),
    }
}

fn parse_rule_numeric_overflow(value: &str) -> PyResult<EnumNumericOverflowRule> {
    match value {
        "error" => Ok(EnumNumericOverflowRule::Error),
        "blank" => Ok(EnumNumericOverflowRule::Blank),
        _ => Err(PyValueError::new_err(format!(
            "Invalid numeric overflow rule: `{value}`. Expected one of: ['error', 'blank']"
        ))),
    }
}

fn parse_spec_ofd_convert_options(
    rule_unresolved_column: &str,
    rule_numeric_overflow: &str,
) -> PyResult<SpecOfdConvertOptions> {
    Ok(SpecOfdConvertOptions {
        rule_unresolved_column: parse_rule_unresolved_column(rule_unresolved_column)?,
        rule_numeric_overflow: parse_rule_numeric_overflow(rule_numeric_overflow)?,
    })
}

fn map_ofd_error(exception: OfdError) -> PyErr {
    match exception {
        OfdError::Io { .. } => PyOSError::new_err(exception.to_string()),
        OfdError::Xlsx(_) | OfdError::DataFrame(_) => PyRuntimeError::new_err(exception.to_string()),
        _ => PyValueError::new_err(exception.to_string()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ArrowImport

fn derive_dataframe_from_any_dataframe(
    py: Python<'_>,
    df: &Bound<'_, PyAny>,
) -> PyResult<DataFrame> {
    let df_polars = convert_to_polars_dataframe(py, df)?;
    let obj_capsule = df_polars.call_method0("__arrow_c_stream__")?;
    derive_dataframe_from_arrow_c_stream_capsule(&obj_capsule)
}

fn derive_dataframe_from_arrow_c_stream_capsule(
    obj_capsule: &Bound<'_, PyAny>,
) -> PyResult<DataFrame> {
    let ptr_capsule = obj_capsule.as_ptr();
    let ptr_stream_name = C_ARROW_ARRAY_STREAM_CAPSULE_NAME
        .as_ptr()
        .cast::<std::os::raw::c_char>();

    // Safety: only the pointer owned by the Python object is inspected.
    if unsafe { pyffi::PyCapsule_IsValid(ptr_capsule, ptr_stream_name) } == 0 {
        return Err(PyValueError::new_err(
            "Expected a valid `arrow_array_stream` PyCapsule.",
        ));
    }

    // Safety: capsule name was validated above.
    let ptr_stream = unsafe { pyffi::PyCapsule_GetPointer(ptr_capsule, ptr_stream_name) };
    if ptr_stream.is_null() {
        return Err(PyValueError::new_err(
            "Arrow C stream capsule pointer is null.",
        ));
    }

    let stream = ptr_stream.cast::<arrow::ffi::ArrowArrayStream>();
    // Safety: `stream` points to a live ArrowArrayStream owned by the capsule.
    let mut reader = unsafe { arrow::ffi::ArrowArrayStreamReader::try_new(&mut *stream) }
        .map_err(|err| PyValueError::new_err(format!("Failed to open Arrow C stream: {err}")))?;

    let schema_arrow = match reader.field().dtype() {
        ArrowDataType::Struct(fields) => fields
            .iter()
            .cloned()
            .map(|field: ArrowField| (field.name.clone(), field))
            .collect::<ArrowSchema>(),
        dtype => {
            return Err(PyValueError::new_err(format!(
                "Arrow stream schema must be Struct, got: {dtype:?}"
            )));
        }
    };
    let schema_ref = Arc::new(schema_arrow.clone());
    let mut df = DataFrame::empty_with_arrow_schema(&schema_arrow);

    while let Some(res_array) = unsafe { reader.next() } {
        let array_batch = res_array.map_err(|err| {
            PyValueError::new_err(format!("Failed to read Arrow stream batch: {err}"))
        })?;
        let array_struct = array_batch
            .as_any()
            .downcast_ref::<StructArray>()
            .ok_or_else(|| {
                PyValueError::new_err("Arrow C stream must yield StructArray batches.")
            })?;

        let record_batch = RecordBatchT::try_new(
            array_struct.len(),
            schema_ref.clone(),
            array_struct.values().to_vec(),
        )
        .map_err(|err| PyValueError::new_err(format!("Invalid Arrow record batch: {err}")))?;
        df.try_extend(std::iter::once(record_batch)).map_err(|err| {
            PyValueError::new_err(format!("Failed to append Arrow record batch: {err}"))
        })?;
    }

    Ok(df)
}

/// Accept polars frames as-is; anything else goes through `polars.DataFrame(...)`.
fn convert_to_polars_dataframe<'py>(
    py: Python<'py>,
    df: &Bound<'py, PyAny>,
) -> PyResult<Bound<'py, PyAny>> {
    let cls_dataframe = py.import("polars")?.getattr("DataFrame")?;
    if df.is_instance(&cls_dataframe)? {
        return Ok(df.clone());
    }
    cls_dataframe.call1((df,))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[pymodule]
fn _ofdkit_io_ofd_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyColumnResolveSession>()?;
    module.add_class::<PyOfdDocument>()?;
    module.add_class::<PyReportOfd>()?;
    module.add_function(wrap_pyfunction!(convert_py, module)?)?;
    module.add_function(wrap_pyfunction!(convert_xlsx_py, module)?)?;
    module.add_function(wrap_pyfunction!(read_xlsx_columns_py, module)?)?;
    module.add_function(wrap_pyfunction!(check_file_name_py, module)?)?;
    module.add_function(wrap_pyfunction!(field_names_py, module)?)?;
    module.add_function(wrap_pyfunction!(field_spec_py, module)?)?;
    module.add_function(wrap_pyfunction!(write_xlsx_template_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
