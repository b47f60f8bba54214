use std::io::Write;
use std::path::{Path, PathBuf};

use launchscout_common::{EnrichedRecord, HarvestError, ListingRecord, OutputConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// The three pipeline snapshots on disk. Each is a pretty-printed JSON array
/// and is replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    output: OutputConfig,
}

impl SnapshotStore {
    pub fn new(output: OutputConfig) -> Self {
        Self { output }
    }

    pub fn all_listings_path(&self) -> PathBuf {
        self.output.all_listings_path()
    }

    pub fn top_listings_path(&self) -> PathBuf {
        self.output.top_listings_path()
    }

    pub fn enriched_path(&self) -> PathBuf {
        self.output.enriched_path()
    }

    pub fn write_all_listings(&self, listings: &[ListingRecord]) -> Result<(), HarvestError> {
        write_json(&self.all_listings_path(), listings)
    }

    pub fn write_top_listings(&self, listings: &[ListingRecord]) -> Result<(), HarvestError> {
        write_json(&self.top_listings_path(), listings)
    }

    pub fn load_top_listings(&self) -> Result<Vec<ListingRecord>, HarvestError> {
        read_json(&self.top_listings_path())
    }

    pub fn write_enriched(&self, records: &[EnrichedRecord]) -> Result<(), HarvestError> {
        write_json(&self.enriched_path(), records)
    }

    pub fn load_enriched(&self) -> Result<Vec<EnrichedRecord>, HarvestError> {
        read_json(&self.enriched_path())
    }
}

/// Read a JSON array snapshot. A missing file is [`HarvestError::MissingSnapshot`].
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, HarvestError> {
    if !path.exists() {
        return Err(HarvestError::MissingSnapshot(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| HarvestError::Snapshot {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write a JSON array snapshot via a temp file in the same directory, renamed
/// over the destination once fully written.
pub fn write_json<T: Serialize>(path: &Path, records: &[T]) -> Result<(), HarvestError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let snapshot_err = |message: String| HarvestError::Snapshot {
        path: path.to_path_buf(),
        message,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, records).map_err(|e| snapshot_err(e.to_string()))?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| snapshot_err(e.error.to_string()))?;

    debug!(path = %path.display(), records = records.len(), "Snapshot written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::listing;

    fn store(dir: &Path) -> SnapshotStore {
        SnapshotStore::new(OutputConfig {
            dir: dir.to_path_buf(),
            ..OutputConfig::default()
        })
    }

    #[test]
    fn missing_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(dir.path()).load_enriched().unwrap_err();
        assert!(matches!(err, HarvestError::MissingSnapshot(p) if p.ends_with("topAppsRecent.json")));
    }

    #[test]
    fn enriched_snapshot_keeps_null_fields_and_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let records = vec![
            EnrichedRecord::enriched(listing("a", "https://apps.shopify.com/a", 30), "March 3, 2025".into()),
            EnrichedRecord::failed(listing("b", "https://apps.shopify.com/b", 40), "404"),
        ];
        store.write_enriched(&records).unwrap();

        let raw = std::fs::read_to_string(store.enriched_path()).unwrap();
        assert!(raw.contains("\"launchDate\": \"March 3, 2025\""));
        assert!(raw.contains("\"error\": null"));
        assert!(raw.contains("\"launchDate\": null"));
        assert_eq!(store.load_enriched().unwrap(), records);
    }

    #[test]
    fn loading_tolerates_absent_outcome_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topAppsRecent.json");
        std::fs::write(
            &path,
            r#"[{"name":"a","url":"https://apps.shopify.com/a","rating":4.5,"reviews":30,"category":"Reviews"}]"#,
        )
        .unwrap();
        let records: Vec<EnrichedRecord> = read_json(&path).unwrap();
        assert_eq!(records[0].launch_date, None);
        assert_eq!(records[0].error, None);
    }

    #[test]
    fn malformed_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topApps.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = read_json::<ListingRecord>(&path).unwrap_err();
        assert!(matches!(err, HarvestError::Snapshot { .. }));
    }

    #[test]
    fn writes_create_output_dir_and_leave_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out");
        let store = store(&nested);
        store
            .write_top_listings(&[listing("a", "https://apps.shopify.com/a", 30)])
            .unwrap();
        let entries: Vec<_> = std::fs::read_dir(&nested).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.load_top_listings().unwrap().len(), 1);
    }
}
