//! Destinations for finished record tables.
//!
//! The crawl hands its table to a sink exactly once; the spreadsheet
//! uploader in the surrounding system is one such sink, the bundled CSV
//! writer is another.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::record::{Cell, RecordTable};

#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Writes one complete table under a caller-chosen destination name.
    async fn write(&self, destination: &str, table: &RecordTable) -> Result<()>;
}

/// Writes `<destination>.csv` files under a base directory.
pub struct CsvSink {
    base_dir: PathBuf,
}

impl CsvSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl RecordSink for CsvSink {
    async fn write(&self, destination: &str, table: &RecordTable) -> Result<()> {
        let path = self.base_dir.join(format!("{destination}.csv"));
        let mut out = String::new();
        push_row(&mut out, table.headers.iter().map(String::as_str));
        for row in &table.rows {
            let rendered: Vec<String> = row.iter().map(Cell::to_string).collect();
            push_row(&mut out, rendered.iter().map(String::as_str));
        }
        tokio::fs::write(&path, out).await?;
        info!(target: "torvet", path = %path.display(), rows = table.rows.len(), "table written");
        Ok(())
    }
}

fn push_row<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        if field.contains([',', '"', '\n']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

/// Captures tables in memory. Test double for the orchestrator.
#[derive(Default)]
pub struct MemorySink {
    written: Mutex<Vec<(String, RecordTable)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<(String, RecordTable)> {
        self.written
            .lock()
            .map(|mut w| std::mem::take(&mut *w))
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn write(&self, destination: &str, table: &RecordTable) -> Result<()> {
        if let Ok(mut written) = self.written.lock() {
            written.push((destination.to_string(), table.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_fields_with_separators() {
        let mut out = String::new();
        push_row(&mut out, ["plain", "has,comma", "has\"quote"].into_iter());
        assert_eq!(out, "plain,\"has,comma\",\"has\"\"quote\"\n");
    }

    #[tokio::test]
    async fn csv_sink_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path());
        let table = RecordTable {
            headers: vec!["A".to_string(), "B".to_string()],
            rows: vec![vec![Cell::Text("x".to_string()), Cell::Blank]],
        };
        sink.write("listings", &table).await.unwrap();
        let written = std::fs::read_to_string(dir.path().join("listings.csv")).unwrap();
        assert_eq!(written, "A,B\nx,\n");
    }

    #[tokio::test]
    async fn memory_sink_captures_tables() {
        let sink = MemorySink::new();
        let table = RecordTable::default();
        sink.write("t", &table).await.unwrap();
        let written = sink.take();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, "t");
    }
}
