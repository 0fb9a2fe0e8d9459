use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::package::PackageRecord;
use crate::repository::RepositoryIndex;

/// How channel order restricts candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelPriority {
    /// Only the highest priority channel publishing a name is considered
    Strict,
    /// Channel order is only a tie-break after version and build number
    #[default]
    Disabled,
}

impl ChannelPriority {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Some(ChannelPriority::Strict),
            "disabled" | "flexible" => Some(ChannelPriority::Disabled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelPriority::Strict => "strict",
            ChannelPriority::Disabled => "disabled",
        }
    }
}

/// Policy for ordering candidate records of one name.
///
/// Candidates are tried best first:
/// 1. the installed record, if it is a candidate
/// 2. highest version
/// 3. highest build number
/// 4. channel priority (first listed channel first)
/// 5. index order
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub channel_priority: ChannelPriority,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel_priority(mut self, channel_priority: ChannelPriority) -> Self {
        self.channel_priority = channel_priority;
        self
    }

    /// Order `records` (all records of one name, in index order) by preference
    pub fn order(
        &self,
        index: &RepositoryIndex,
        records: &[Arc<PackageRecord>],
        installed: Option<&PackageRecord>,
    ) -> Vec<Arc<PackageRecord>> {
        let mut ordered: Vec<Arc<PackageRecord>> = match self.channel_priority {
            ChannelPriority::Strict => {
                let best = records.iter().map(|r| index.priority(r)).min();
                records
                    .iter()
                    .filter(|r| Some(index.priority(r)) == best)
                    .cloned()
                    .collect()
            }
            ChannelPriority::Disabled => records.to_vec(),
        };

        // stable: equal records keep index order
        ordered.sort_by(|a, b| self.compare(index, a, b, installed));
        ordered
    }

    fn compare(
        &self,
        index: &RepositoryIndex,
        a: &PackageRecord,
        b: &PackageRecord,
        installed: Option<&PackageRecord>,
    ) -> Ordering {
        if let Some(installed) = installed {
            let a_installed = a.same_identity(installed);
            let b_installed = b.same_identity(installed);
            if a_installed != b_installed {
                return if a_installed { Ordering::Less } else { Ordering::Greater };
            }
        }

        b.version
            .cmp(&a.version)
            .then_with(|| b.build_number.cmp(&a.build_number))
            .then_with(|| index.priority(a).cmp(&index.priority(b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::ChannelData;
    use crate::package::Platform;

    fn record(name: &str, version: &str, build_number: u64) -> PackageRecord {
        PackageRecord::new(name, version.parse().unwrap(), format!("h_{}", build_number))
            .with_build_number(build_number)
    }

    fn index() -> RepositoryIndex {
        RepositoryIndex::load(
            vec![
                ChannelData::new("first", "linux-64", vec![record("foo", "1.0", 0), record("foo", "2.0", 0)]),
                ChannelData::new(
                    "second",
                    "linux-64",
                    vec![record("foo", "2.0", 0), record("foo", "2.0", 1), record("foo", "3.0", 0)],
                ),
            ],
            Platform::Linux64,
        )
    }

    fn describe(records: &[Arc<PackageRecord>]) -> Vec<String> {
        records
            .iter()
            .map(|r| format!("{}:{}:{}", r.channel, r.version, r.build_number))
            .collect()
    }

    #[test]
    fn test_default_order() {
        let index = index();
        let ordered = Policy::new().order(&index, index.lookup("foo"), None);
        assert_eq!(
            describe(&ordered),
            vec!["second:3.0:0", "second:2.0:1", "first:2.0:0", "second:2.0:0", "first:1.0:0"]
        );
    }

    #[test]
    fn test_installed_first() {
        let index = index();
        let installed = record("foo", "1.0", 0).with_channel("first");
        let ordered = Policy::new().order(&index, index.lookup("foo"), Some(&installed));
        assert_eq!(describe(&ordered)[0], "first:1.0:0");
        assert_eq!(describe(&ordered)[1], "second:3.0:0");
    }

    #[test]
    fn test_strict_priority() {
        let index = index();
        let policy = Policy::new().channel_priority(ChannelPriority::Strict);
        let ordered = policy.order(&index, index.lookup("foo"), None);
        assert_eq!(describe(&ordered), vec!["first:2.0:0", "first:1.0:0"]);
    }

    #[test]
    fn test_channel_priority_from_str() {
        assert_eq!(ChannelPriority::from_str("Strict"), Some(ChannelPriority::Strict));
        assert_eq!(ChannelPriority::from_str("disabled"), Some(ChannelPriority::Disabled));
        assert_eq!(ChannelPriority::from_str("sometimes"), None);
    }
}
