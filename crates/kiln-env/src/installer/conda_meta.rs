use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tokio::fs;

use super::OperationExecutor;
use crate::package::{MatchSpec, PackageRecord};
use crate::repository::PrefixRecord;
use crate::solver::{Operation, Transaction};

/// Writes one `conda-meta/<name>-<version>-<build>.json` per installed record.
///
/// Records whose name matches a requested spec are stored with that spec as
/// `requested_spec`, so a later read marks them explicit. A reinstalled
/// package keeps the `requested_spec` of the record it replaces.
#[derive(Debug, Clone)]
pub struct CondaMetaWriter {
    prefix: PathBuf,
    requested: Vec<MatchSpec>,
}

impl CondaMetaWriter {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            requested: Vec::new(),
        }
    }

    /// Specs the user asked for by name
    pub fn requested(mut self, specs: Vec<MatchSpec>) -> Self {
        self.requested = specs;
        self
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.prefix.join("conda-meta")
    }

    /// Path of the metadata file for a record
    pub fn record_path(&self, record: &PackageRecord) -> PathBuf {
        self.meta_dir()
            .join(format!("{}-{}-{}.json", record.name, record.version, record.build))
    }

    fn requested_spec(&self, record: &PackageRecord) -> Option<String> {
        let name = record.normalized_name();
        self.requested
            .iter()
            .find(|spec| spec.name() == name)
            .map(|spec| spec.to_string())
    }

    async fn write(&self, record: &PackageRecord, requested_spec: Option<String>) -> anyhow::Result<()> {
        let path = self.record_path(record);
        let prefix_record = PrefixRecord {
            record: record.clone(),
            requested_spec,
        };
        let json = serde_json::to_string_pretty(&prefix_record)?;
        fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::debug!("Wrote {}", path.display());
        Ok(())
    }

    async fn remove(&self, record: &PackageRecord) -> anyhow::Result<Option<PrefixRecord>> {
        let path = self.record_path(record);
        let previous = match fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str::<PrefixRecord>(&contents).ok(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("{} already absent", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };
        fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to remove {}", path.display()))?;
        log::debug!("Removed {}", path.display());
        Ok(previous)
    }
}

#[async_trait]
impl OperationExecutor for CondaMetaWriter {
    async fn execute(&self, transaction: &Transaction) -> anyhow::Result<()> {
        let meta_dir = self.meta_dir();
        fs::create_dir_all(&meta_dir)
            .await
            .with_context(|| format!("Failed to create {}", meta_dir.display()))?;

        for operation in transaction.iter() {
            match operation {
                Operation::Remove(record) => {
                    self.remove(record).await?;
                }
                Operation::Install(record) => {
                    self.write(record, self.requested_spec(record)).await?;
                }
                Operation::Reinstall { from, to } => {
                    let previous = self.remove(from).await?;
                    let requested_spec = previous
                        .and_then(|p| p.requested_spec)
                        .or_else(|| self.requested_spec(to));
                    self.write(to, requested_spec).await?;
                }
                Operation::Noop(_) => {}
            }
        }

        log::info!("Updated {} with {}", meta_dir.display(), transaction.summary());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{CondaMetaReader, InstalledState, InstalledStateReader};
    use crate::solver::SolverResult;
    use kiln_version::Version;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(name: &str, version: &str) -> PackageRecord {
        PackageRecord::new(name, version.parse::<Version>().unwrap(), "h0_0").with_channel("conda-forge")
    }

    fn plan(solved: Vec<PackageRecord>, installed: &InstalledState) -> Transaction {
        let solved = SolverResult::new(solved.into_iter().map(Arc::new).collect());
        Transaction::plan(&solved, installed).unwrap()
    }

    #[tokio::test]
    async fn test_install_writes_records() {
        let dir = TempDir::new().unwrap();
        let writer = CondaMetaWriter::new(dir.path()).requested(vec!["python >=3.10".parse().unwrap()]);

        let transaction = plan(vec![record("python", "3.11.4"), record("zlib", "1.2.13")], &InstalledState::new());
        writer.execute(&transaction).await.unwrap();

        assert!(dir.path().join("conda-meta/python-3.11.4-h0_0.json").exists());
        assert!(dir.path().join("conda-meta/zlib-1.2.13-h0_0.json").exists());

        let state = CondaMetaReader::new(dir.path()).read().unwrap();
        assert_eq!(state.len(), 2);
        assert!(state.get("python").unwrap().explicit);
        assert!(!state.get("zlib").unwrap().explicit);
    }

    #[tokio::test]
    async fn test_remove_and_reinstall() {
        let dir = TempDir::new().unwrap();
        let writer = CondaMetaWriter::new(dir.path()).requested(vec!["python".parse().unwrap()]);
        writer
            .execute(&plan(vec![record("python", "3.10.0"), record("six", "1.16.0")], &InstalledState::new()))
            .await
            .unwrap();

        let installed = CondaMetaReader::new(dir.path()).read().unwrap();
        let upgrade = CondaMetaWriter::new(dir.path());
        upgrade
            .execute(&plan(vec![record("python", "3.11.4")], &installed))
            .await
            .unwrap();

        let state = CondaMetaReader::new(dir.path()).read().unwrap();
        assert_eq!(state.len(), 1);
        let python = state.get("python").unwrap();
        assert_eq!(python.record.version.to_string(), "3.11.4");
        assert!(python.explicit);
        assert!(!dir.path().join("conda-meta/python-3.10.0-h0_0.json").exists());
        assert!(!dir.path().join("conda-meta/six-1.16.0-h0_0.json").exists());
    }

    #[tokio::test]
    async fn test_removing_missing_record_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let writer = CondaMetaWriter::new(dir.path());
        let installed: InstalledState = vec![record("gone", "1.0")].into_iter().collect();

        writer.execute(&plan(vec![], &installed)).await.unwrap();
        assert!(dir.path().join("conda-meta").is_dir());
    }
}
