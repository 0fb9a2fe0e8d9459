//! Fetching channel metadata from a directory on disk

use anyhow::{anyhow, Context};
use async_trait::async_trait;

use super::{ChannelFetcher, RepoData};
use crate::package::{Channel, PackageRecord, Platform};

/// Reads `<channel>/<subdir>/repodata.json` from `file://` channels.
///
/// A subdir without a `repodata.json` yields no records, so a local channel
/// may publish only `noarch`.
#[derive(Debug, Clone, Default)]
pub struct LocalChannelFetcher;

impl LocalChannelFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChannelFetcher for LocalChannelFetcher {
    async fn fetch(&self, channel: &Channel, platform: Platform) -> anyhow::Result<Vec<PackageRecord>> {
        let root = channel
            .base_url()
            .to_file_path()
            .map_err(|_| anyhow!("Channel {} is not a local directory", channel.base_url()))?;
        let path = root.join(platform.as_str()).join("repodata.json");

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            log::debug!("No repodata at {}", path.display());
            return Ok(Vec::new());
        }

        let start = std::time::Instant::now();
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let repodata =
            RepoData::from_json(&contents).with_context(|| format!("Failed to parse {}", path.display()))?;

        let mut records = repodata.into_records(channel.name());
        for record in &mut records {
            if record.subdir.is_empty() {
                record.subdir = platform.as_str().to_string();
            }
        }

        log::info!(
            "Read {} records from {} in {:.3} seconds",
            records.len(),
            path.display(),
            start.elapsed().as_secs_f64()
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use url::Url;

    fn channel(dir: &TempDir) -> Channel {
        let alias = Url::parse(crate::package::DEFAULT_CHANNEL_ALIAS).unwrap();
        Channel::parse(dir.path().to_str().unwrap(), &alias).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_reads_subdir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("noarch")).unwrap();
        std::fs::write(
            dir.path().join("noarch/repodata.json"),
            r#"{"packages": {"six-1.16.0-pyh6c4a22f_0.tar.bz2": {"name": "six", "version": "1.16.0", "build": "pyh6c4a22f_0"}}}"#,
        )
        .unwrap();

        let channel = channel(&dir);
        let records = LocalChannelFetcher::new().fetch(&channel, Platform::NoArch).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "six");
        assert_eq!(records[0].subdir, "noarch");
        assert_eq!(records[0].channel, channel.name());
    }

    #[tokio::test]
    async fn test_missing_subdir_is_empty() {
        let dir = TempDir::new().unwrap();
        let records = LocalChannelFetcher::new()
            .fetch(&channel(&dir), Platform::Linux64)
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_is_error() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("linux-64")).unwrap();
        std::fs::write(dir.path().join("linux-64/repodata.json"), "not json").unwrap();

        let err = LocalChannelFetcher::new()
            .fetch(&channel(&dir), Platform::Linux64)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[tokio::test]
    async fn test_remote_channel_rejected() {
        let alias = Url::parse(crate::package::DEFAULT_CHANNEL_ALIAS).unwrap();
        let channel = Channel::parse("conda-forge", &alias).unwrap();
        assert!(LocalChannelFetcher::new().fetch(&channel, Platform::Linux64).await.is_err());
    }
}
