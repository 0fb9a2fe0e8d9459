//! Package sources: channel metadata, the solver's index, installed state
//! and virtual packages describing the host

mod index;
mod installed;
mod local;
mod repodata;
mod traits;
mod virtual_package;

pub use index::{ChannelData, RepositoryIndex};
pub use installed::{CondaMetaReader, InstalledPackage, InstalledState, PrefixRecord};
pub use local::LocalChannelFetcher;
pub use repodata::{ChannelInfo, RepoData};
pub use traits::{ChannelFetcher, InstalledStateReader};
pub use virtual_package::{ParseVirtualPackageError, VirtualPackage};
