//! Shared test fixtures.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rust_xlsxwriter::Workbook;

static N_TEST_DIR_SEQ: AtomicUsize = AtomicUsize::new(0);

pub(crate) struct TestDir {
    path: PathBuf,
}

impl TestDir {
    pub(crate) fn new() -> Self {
        let n = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let n_seq = N_TEST_DIR_SEQ.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("ofdkit_test_{n}_{n_seq}"));
        std::fs::create_dir_all(&path).expect("create test dir");
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Workbook with one sheet of string cells; empty strings are left unwritten.
pub(crate) fn write_xlsx_fixture(path: &Path, header: &[&str], rows: &[&[&str]]) {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (n_col, c_label) in header.iter().enumerate() {
        worksheet
            .write_string(0, n_col as u16, *c_label)
            .expect("write header");
    }
    for (n_row, row) in rows.iter().enumerate() {
        for (n_col, c_value) in row.iter().enumerate() {
            if c_value.is_empty() {
                continue;
            }
            worksheet
                .write_string(n_row as u32 + 1, n_col as u16, *c_value)
                .expect("write cell");
        }
    }
    workbook.save(path).expect("save workbook");
}
