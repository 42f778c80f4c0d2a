#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use rowtree::tree::{RowRecord, TreeDocument};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Splits comma-separated lines into rows of cells.
pub fn rows(lines: &[&str]) -> Vec<Vec<String>> {
    lines
        .iter()
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}

/// Flattens a record list depth-first into `(depth, name, index)` triples.
pub fn outline(rows: &[RowRecord]) -> Vec<(usize, String, usize)> {
    fn walk(rows: &[RowRecord], depth: usize, out: &mut Vec<(usize, String, usize)>) {
        for row in rows {
            out.push((depth, row.name.clone(), row.index));
            for group in &row.children {
                walk(&group.rows, depth + 1, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(rows, 0, &mut out);
    out
}

pub fn parse_document(json: &[u8]) -> TreeDocument {
    serde_json::from_slice(json).expect("tree document JSON")
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}
