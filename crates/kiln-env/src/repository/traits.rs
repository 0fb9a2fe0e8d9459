use async_trait::async_trait;

use super::InstalledState;
use crate::package::{Channel, PackageRecord, Platform};

/// Source of channel metadata.
///
/// Implementations return the records published in one subdir of a channel,
/// already parsed. Transport, caching and authentication are the
/// implementation's concern.
#[async_trait]
pub trait ChannelFetcher: Send + Sync {
    /// Fetch all records of `channel` for `platform` (a platform subdir or `noarch`)
    async fn fetch(&self, channel: &Channel, platform: Platform) -> anyhow::Result<Vec<PackageRecord>>;
}

/// Source of the current contents of an environment
pub trait InstalledStateReader: Send + Sync {
    fn read(&self) -> anyhow::Result<InstalledState>;
}

