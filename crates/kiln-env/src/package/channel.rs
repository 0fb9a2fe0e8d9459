//! Channels: named or URL-addressed sources of package metadata

use std::fmt;
use std::path::Path;

use thiserror::Error;
use url::Url;

use super::Platform;

/// Base URL that bare channel names are resolved against
pub const DEFAULT_CHANNEL_ALIAS: &str = "https://conda.anaconda.org/";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseChannelError {
    #[error("Empty channel")]
    Empty,
    #[error("Invalid channel name \"{0}\"")]
    InvalidName(String),
    #[error("Invalid channel URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Channel path \"{0}\" must be absolute")]
    RelativePath(String),
}

/// A resolved channel.
///
/// Channels are identified by their base URL. The name is what records and
/// match specs refer to: the path below the channel alias for aliased
/// channels, the full URL otherwise.
#[derive(Debug, Clone)]
pub struct Channel {
    name: String,
    base_url: Url,
}

impl Channel {
    /// Resolve `text` (a name, URL or absolute path) against `alias`
    pub fn parse(text: &str, alias: &Url) -> Result<Self, ParseChannelError> {
        let text = text.trim().trim_end_matches('/');
        if text.is_empty() {
            return Err(ParseChannelError::Empty);
        }

        if text.contains("://") {
            let base_url = parse_directory_url(text)?;
            return Ok(Self::from_url(base_url, alias));
        }

        if text.starts_with('/') || text.starts_with('.') || text.starts_with('~') {
            let path = Path::new(text);
            if !path.is_absolute() {
                return Err(ParseChannelError::RelativePath(text.to_string()));
            }
            let base_url = Url::from_directory_path(path)
                .map_err(|_| ParseChannelError::RelativePath(text.to_string()))?;
            return Ok(Self::from_url(base_url, alias));
        }

        let valid = text
            .split('/')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c)));
        if !valid {
            return Err(ParseChannelError::InvalidName(text.to_string()));
        }

        let base_url = alias
            .join(&format!("{}/", text))
            .map_err(|e| ParseChannelError::InvalidUrl {
                url: text.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Channel {
            name: text.to_string(),
            base_url,
        })
    }

    /// The canonical name for a channel reference as stored in prefix
    /// metadata. Those may be full URLs that end in a platform subdir, such
    /// as `https://conda.anaconda.org/conda-forge/linux-64`. References
    /// that do not parse are returned unchanged.
    pub fn canonical_name(text: &str, alias: &Url) -> String {
        let trimmed = text.trim().trim_end_matches('/');
        let without_subdir = match trimmed.rsplit_once('/') {
            Some((base, last)) if trimmed.contains("://") && last.parse::<Platform>().is_ok() => base,
            _ => trimmed,
        };
        match Self::parse(without_subdir, alias) {
            Ok(channel) => channel.name,
            Err(_) => text.to_string(),
        }
    }

    fn from_url(base_url: Url, alias: &Url) -> Self {
        let name = match base_url.as_str().strip_prefix(alias.as_str()) {
            Some(rest) if !rest.trim_matches('/').is_empty() => rest.trim_matches('/').to_string(),
            _ => base_url.as_str().trim_end_matches('/').to_string(),
        };
        Channel { name, base_url }
    }

    /// The canonical name records carry in their `channel` field
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The channel root, always ending in `/`
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The URL of a platform subdir, e.g. `.../conda-forge/linux-64/`
    pub fn platform_url(&self, platform: Platform) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(platform.as_str()).push("");
        }
        url
    }

    /// Compare a channel reference from a match spec or record with this
    /// channel, ignoring case and trailing slashes
    pub fn matches_name(&self, other: &str) -> bool {
        let other = other.trim_end_matches('/');
        self.name.eq_ignore_ascii_case(other)
            || self
                .base_url
                .as_str()
                .trim_end_matches('/')
                .eq_ignore_ascii_case(other)
    }
}

fn parse_directory_url(text: &str) -> Result<Url, ParseChannelError> {
    Url::parse(&format!("{}/", text)).map_err(|e| ParseChannelError::InvalidUrl {
        url: text.to_string(),
        reason: e.to_string(),
    })
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        self.base_url == other.base_url
    }
}

impl Eq for Channel {}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
