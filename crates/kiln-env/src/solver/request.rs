use std::sync::Arc;

use indexmap::IndexSet;

use super::CancellationToken;
use crate::package::MatchSpec;
use crate::repository::InstalledState;

/// A request specifies what needs to be resolved.
///
/// This includes the requested specs, the currently installed packages and
/// a cancellation token checked between solver decisions.
#[derive(Debug, Clone)]
pub struct Request {
    /// Requested specs, in the order given
    pub specs: Vec<MatchSpec>,

    /// Currently installed packages; preferred when still acceptable
    pub installed: Arc<InstalledState>,

    /// Keep explicitly installed packages the request does not mention
    pub keep_explicit: bool,

    pub cancellation: CancellationToken,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// Create a new empty request
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            installed: Arc::new(InstalledState::new()),
            keep_explicit: true,
            cancellation: CancellationToken::new(),
        }
    }

    /// Add a requested spec
    pub fn install(&mut self, spec: MatchSpec) -> &mut Self {
        self.specs.push(spec);
        self
    }

    pub fn installed(&mut self, installed: Arc<InstalledState>) -> &mut Self {
        self.installed = installed;
        self
    }

    pub fn keep_explicit(&mut self, keep: bool) -> &mut Self {
        self.keep_explicit = keep;
        self
    }

    pub fn cancellation(&mut self, token: CancellationToken) -> &mut Self {
        self.cancellation = token;
        self
    }

    /// The requested specs followed by name-only specs for explicitly
    /// installed packages the request does not name
    pub fn all_specs(&self) -> Vec<MatchSpec> {
        let mut specs = self.specs.clone();
        if !self.keep_explicit {
            return specs;
        }

        let requested: IndexSet<&str> = self.specs.iter().map(|spec| spec.name()).collect();
        let kept: Vec<MatchSpec> = self
            .installed
            .explicit_names()
            .filter(|name| !requested.contains(name))
            .map(MatchSpec::from_name)
            .collect();
        if !kept.is_empty() {
            log::debug!("Keeping {} explicitly installed packages", kept.len());
        }
        specs.extend(kept);
        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageRecord;

    fn spec(s: &str) -> MatchSpec {
        s.parse().unwrap()
    }

    fn installed() -> Arc<InstalledState> {
        let mut state = InstalledState::new();
        state.insert(PackageRecord::new("numpy", "1.26".parse().unwrap(), "0"), true);
        state.insert(PackageRecord::new("python", "3.12".parse().unwrap(), "0"), true);
        state.insert(PackageRecord::new("zlib", "1.3".parse().unwrap(), "0"), false);
        Arc::new(state)
    }

    #[test]
    fn test_all_specs_keeps_explicit() {
        let mut request = Request::new();
        request.install(spec("python >=3.12")).installed(installed());

        let names: Vec<String> = request.all_specs().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["python >=3.12", "numpy"]);
    }

    #[test]
    fn test_all_specs_without_keep_explicit() {
        let mut request = Request::new();
        request
            .install(spec("python"))
            .installed(installed())
            .keep_explicit(false);
        assert_eq!(request.all_specs().len(), 1);
    }
}
