//! Newline-delimited JSON reading and durable appending.
//!
//! Reading is tolerant: a line that is not UTF-8, not JSON, or not an object
//! of the expected shape is logged and counted, never fatal. Writing is
//! strict: every I/O fault propagates.

use crate::models::{PrefsError, Result, ScoredTask};
use serde::de::DeserializeOwned;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Items parsed from a JSONL file plus the count of lines that were skipped.
#[derive(Debug, Clone)]
pub struct JsonlRead<T> {
    pub items: Vec<T>,
    pub malformed: usize,
}

/// Read every well-formed object line of `path` as `T`.
///
/// Blank lines are ignored. Only failing to open or read the file is an
/// error.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<JsonlRead<T>> {
    let file = File::open(path)
        .map_err(|e| PrefsError::io(format!("opening {}", path.display()), e))?;
    let mut reader = BufReader::new(file);

    let mut items = Vec::new();
    let mut malformed = 0;
    let mut buf = Vec::new();
    let mut line_num = 0usize;

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| PrefsError::io(format!("reading {}", path.display()), e))?;
        if n == 0 {
            break;
        }
        line_num += 1;

        let Ok(text) = std::str::from_utf8(&buf) else {
            warn!(line = line_num, "Skipping line: invalid UTF-8");
            malformed += 1;
            continue;
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        match parse_object::<T>(text) {
            Ok(item) => items.push(item),
            Err(e) => {
                warn!(line = line_num, error = %e, "Skipping malformed line");
                malformed += 1;
            }
        }
    }

    debug!(
        path = %path.display(),
        parsed = items.len(),
        malformed = malformed,
        "Read JSONL"
    );
    Ok(JsonlRead { items, malformed })
}

/// Parse one line, insisting on a JSON object at the top level.
fn parse_object<T: DeserializeOwned>(text: &str) -> std::result::Result<T, String> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("expected a JSON object".to_string());
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// Append-only, single-writer store of scored tasks.
///
/// Each record is written as one line and synced before `append` returns, so
/// a crash loses at most the records not yet appended.
pub struct ResultSink {
    path: PathBuf,
    file: File,
    written: usize,
}

impl ResultSink {
    /// Open (or create) `path` in append mode.
    pub fn open_append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| PrefsError::io("opening scored output", e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            written: 0,
        })
    }

    /// Persist one scored task durably.
    pub fn append(&mut self, task: &ScoredTask) -> Result<()> {
        let mut line = serde_json::to_string(task)
            .map_err(|e| PrefsError::Internal(format!("Serializing scored task: {e}")))?;
        line.push('\n');

        self.file
            .write_all(line.as_bytes())
            .map_err(|e| PrefsError::io("writing scored task", e))?;
        self.file
            .flush()
            .map_err(|e| PrefsError::io("flushing scored output", e))?;
        self.file
            .sync_data()
            .map_err(|e| PrefsError::io("syncing scored output", e))?;

        self.written += 1;
        Ok(())
    }

    /// Records appended through this handle.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Destination path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
