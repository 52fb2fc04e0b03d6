use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{tail, CaseStore, ListingMode};
use crate::domain::{CaseRecord, Result, TrafficError};

/// File name of the case log inside the artifacts directory.
pub const CASES_FILE: &str = "cases.jsonl";

/// Case log stored as one JSON document per line.
///
/// Appends are not coordinated; concurrent writers may interleave lines.
#[derive(Debug, Clone)]
pub struct JsonlCaseStore {
    path: PathBuf,
    mode: ListingMode,
}

impl JsonlCaseStore {
    /// Store at `<dir>/cases.jsonl`. The file is created on first append.
    pub fn new(dir: impl AsRef<Path>, mode: ListingMode) -> Self {
        Self::at_path(dir.as_ref().join(CASES_FILE), mode)
    }

    pub fn at_path(path: impl Into<PathBuf>, mode: ListingMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw log bytes; a missing file reads as empty.
    ///
    /// Lines are decoded one at a time so a torn or non-UTF-8 line only
    /// affects itself.
    async fn read_log(&self) -> Result<Vec<u8>> {
        match fs::read(&self.path).await {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &line[start..end]
}

/// Non-blank lines with their 1-based line numbers.
fn entries(raw: &[u8]) -> impl Iterator<Item = (usize, &[u8])> {
    raw.split(|b| *b == b'\n')
        .enumerate()
        .map(|(i, line)| (i + 1, trim_line(line)))
        .filter(|(_, line)| !line.is_empty())
}

#[async_trait]
impl CaseStore for JsonlCaseStore {
    async fn put(&self, record: &CaseRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(case_id = %record.case_id, path = %self.path.display(), "case appended");
        Ok(())
    }

    async fn get(&self, case_id: &str) -> Result<Option<CaseRecord>> {
        let raw = self.read_log().await?;
        for (line_no, line) in entries(&raw) {
            match serde_json::from_slice::<CaseRecord>(line) {
                Ok(record) if record.case_id == case_id => return Ok(Some(record)),
                Ok(_) => {}
                Err(e) => {
                    debug!(line = line_no, error = %e, "skipping malformed case line");
                }
            }
        }
        Ok(None)
    }

    async fn list(&self, limit: usize) -> Result<Vec<CaseRecord>> {
        let raw = self.read_log().await?;
        let mut records = Vec::new();
        for (line_no, line) in entries(&raw) {
            match serde_json::from_slice::<CaseRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => match self.mode {
                    ListingMode::Lenient => {
                        warn!(
                            line = line_no,
                            path = %self.path.display(),
                            error = %e,
                            "skipping malformed case line"
                        );
                    }
                    ListingMode::Strict => {
                        return Err(TrafficError::CorruptRecord {
                            line: line_no,
                            reason: e.to_string(),
                        });
                    }
                },
            }
        }
        Ok(tail(records, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewCase, Priority};

    fn record(id: &str) -> CaseRecord {
        CaseRecord::open(
            id.to_string(),
            NewCase {
                summary: "Vehicle ID: Toyota Camry".to_string(),
                priority: Priority::P0,
                evidence_path: "/tmp/EV-abc.json".to_string(),
                vehicle_make: "Toyota".to_string(),
                vehicle_model: "Camry".to_string(),
                vehicle_year_range: "2021-2022".to_string(),
                plate_number: None,
                location: Some("Dock 3".to_string()),
            },
        )
    }

    fn make_store(mode: ListingMode) -> (tempfile::TempDir, JsonlCaseStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlCaseStore::new(dir.path(), mode);
        (dir, store)
    }

    #[tokio::test]
    async fn missing_log_is_empty() {
        let (_dir, store) = make_store(ListingMode::Strict);
        assert!(store.get("CASE-1").await.unwrap().is_none());
        assert!(store.list(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_log_is_empty() {
        let (_dir, store) = make_store(ListingMode::Lenient);
        std::fs::write(store.path(), "").unwrap();
        assert!(store.get("CASE-1").await.unwrap().is_none());
        assert!(store.list(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_appends_one_line_each() {
        let (_dir, store) = make_store(ListingMode::Lenient);
        store.put(&record("CASE-1")).await.unwrap();
        store.put(&record("CASE-2")).await.unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.ends_with('\n'));
    }

    #[tokio::test]
    async fn get_round_trips_record() {
        let (_dir, store) = make_store(ListingMode::Lenient);
        let rec = record("CASE-42");
        store.put(&record("CASE-41")).await.unwrap();
        store.put(&rec).await.unwrap();
        assert_eq!(store.get("CASE-42").await.unwrap(), Some(rec));
    }

    #[tokio::test]
    async fn list_returns_last_n_in_insertion_order() {
        let (_dir, store) = make_store(ListingMode::Lenient);
        for i in 1..=5 {
            store.put(&record(&format!("CASE-{i}"))).await.unwrap();
        }
        let ids: Vec<String> = store
            .list(3)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.case_id)
            .collect();
        assert_eq!(ids, vec!["CASE-3", "CASE-4", "CASE-5"]);
    }

    #[tokio::test]
    async fn get_skips_malformed_lines() {
        let (_dir, store) = make_store(ListingMode::Strict);
        std::fs::write(store.path(), "{not json}\n").unwrap();
        store.put(&record("CASE-9")).await.unwrap();
        assert!(store.get("CASE-9").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn lenient_listing_skips_corrupt_line() {
        let (_dir, store) = make_store(ListingMode::Lenient);
        store.put(&record("CASE-1")).await.unwrap();
        let mut raw = std::fs::read_to_string(store.path()).unwrap();
        raw.push_str("garbage\n");
        std::fs::write(store.path(), raw).unwrap();
        store.put(&record("CASE-2")).await.unwrap();

        let listed = store.list(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].case_id, "CASE-2");
    }

    fn with_binary_line(store: &JsonlCaseStore) {
        let mut raw = std::fs::read(store.path()).unwrap();
        raw.extend_from_slice(b"\xff\xfe garbage\n");
        std::fs::write(store.path(), raw).unwrap();
    }

    #[tokio::test]
    async fn non_utf8_line_is_skipped_on_lookup_and_lenient_listing() {
        let (_dir, store) = make_store(ListingMode::Lenient);
        store.put(&record("CASE-1")).await.unwrap();
        with_binary_line(&store);
        store.put(&record("CASE-2")).await.unwrap();

        assert!(store.get("CASE-1").await.unwrap().is_some());
        assert!(store.get("CASE-2").await.unwrap().is_some());
        let ids: Vec<String> = store
            .list(10)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.case_id)
            .collect();
        assert_eq!(ids, vec!["CASE-1", "CASE-2"]);
    }

    #[tokio::test]
    async fn non_utf8_line_is_corrupt_in_strict_listing() {
        let (_dir, store) = make_store(ListingMode::Strict);
        store.put(&record("CASE-1")).await.unwrap();
        with_binary_line(&store);

        match store.list(10).await {
            Err(TrafficError::CorruptRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected CorruptRecord, got {other:?}"),
        }
    }

    #[test]
    fn entries_skip_blank_and_crlf_lines() {
        let raw = b"{\"a\":1}\r\n\n   \n{\"b\":2}";
        let got: Vec<(usize, &[u8])> = entries(raw).collect();
        assert_eq!(got, vec![(1, &b"{\"a\":1}"[..]), (4, &b"{\"b\":2}"[..])]);
    }

    #[tokio::test]
    async fn strict_listing_reports_line() {
        let (_dir, store) = make_store(ListingMode::Strict);
        store.put(&record("CASE-1")).await.unwrap();
        let mut raw = std::fs::read_to_string(store.path()).unwrap();
        raw.push_str("garbage\n");
        std::fs::write(store.path(), raw).unwrap();

        match store.list(10).await {
            Err(TrafficError::CorruptRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected CorruptRecord, got {other:?}"),
        }
    }
}
