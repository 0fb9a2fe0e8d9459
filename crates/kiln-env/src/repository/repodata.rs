//! The `repodata.json` document published for each channel subdir

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::package::PackageRecord;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelInfo {
    #[serde(default)]
    pub subdir: String,
}

/// A parsed `repodata.json`.
///
/// Artifacts are keyed by file name. `.conda` artifacts live under
/// `packages.conda`, legacy tarballs under `packages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ChannelInfo>,

    #[serde(default)]
    pub packages: IndexMap<String, PackageRecord>,

    #[serde(rename = "packages.conda", default)]
    pub conda_packages: IndexMap<String, PackageRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
}

impl RepoData {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// The subdir named in the `info` block, if any
    pub fn subdir(&self) -> Option<&str> {
        self.info
            .as_ref()
            .map(|info| info.subdir.as_str())
            .filter(|subdir| !subdir.is_empty())
    }

    /// Flatten into records stamped with `channel`.
    ///
    /// When a `.conda` and a `.tar.bz2` artifact share a stem only the
    /// `.conda` one is kept. Artifacts listed under `removed` are skipped.
    pub fn into_records(self, channel: &str) -> Vec<PackageRecord> {
        let subdir = self.subdir().map(str::to_string);
        let removed: HashSet<String> = self.removed.into_iter().collect();

        let conda_stems: HashSet<String> = self
            .conda_packages
            .keys()
            .filter_map(|file| file.strip_suffix(".conda"))
            .map(str::to_string)
            .collect();

        let legacy = self.packages.into_iter().filter(|(file, _)| {
            file.strip_suffix(".tar.bz2")
                .map_or(true, |stem| !conda_stems.contains(stem))
        });

        self.conda_packages
            .into_iter()
            .chain(legacy)
            .filter(|(file, _)| !removed.contains(file))
            .map(|(file, mut record)| {
                record.file_name = Some(file);
                record.channel = channel.to_string();
                if record.subdir.is_empty() {
                    if let Some(subdir) = &subdir {
                        record.subdir = subdir.clone();
                    }
                }
                record
            })
            .collect()
    }
}
