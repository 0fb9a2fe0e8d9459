use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use super::SolverResult;
use crate::package::PackageRecord;
use crate::repository::InstalledState;

/// The solved dependency graph contains a cycle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cyclic dependency between packages: {}", .packages.join(" -> "))]
pub struct CyclicDependencyError {
    /// Names on the cycle, in dependency order
    pub packages: Vec<String>,
}

/// A single operation in a transaction
#[derive(Debug, Clone)]
pub enum Operation {
    /// Install a package that is not installed yet
    Install(Arc<PackageRecord>),
    /// Replace the installed record of a name in one step
    Reinstall {
        from: Arc<PackageRecord>,
        to: Arc<PackageRecord>,
    },
    /// Remove a package that is no longer needed
    Remove(Arc<PackageRecord>),
    /// Keep the installed record as is
    Noop(Arc<PackageRecord>),
}

impl Operation {
    /// The record the environment holds for this name afterwards, or the
    /// removed record
    pub fn record(&self) -> &Arc<PackageRecord> {
        match self {
            Operation::Install(record) | Operation::Remove(record) | Operation::Noop(record) => record,
            Operation::Reinstall { to, .. } => to,
        }
    }

    pub fn name(&self) -> &str {
        &self.record().name
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Install(record) => write!(f, "Install {}", record),
            Operation::Reinstall { from, to } => write!(f, "Reinstall {} -> {}", from, to),
            Operation::Remove(record) => write!(f, "Remove {}", record),
            Operation::Noop(record) => write!(f, "Keep {}", record),
        }
    }
}

/// An ordered list of operations.
///
/// Installs and reinstalls follow their dependencies. A removal runs only
/// once no old record still depends on the removed name, and is otherwise
/// scheduled as early as possible. Executing the list front to back never
/// leaves an installed package without one of its dependencies.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub operations: Vec<Operation>,
}

impl Transaction {
    /// Plan with the default planner
    pub fn plan(solved: &SolverResult, installed: &InstalledState) -> Result<Self, CyclicDependencyError> {
        Planner::new().plan(solved, installed)
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    /// Records installed fresh
    pub fn installs(&self) -> impl Iterator<Item = &Arc<PackageRecord>> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Install(record) => Some(record),
            _ => None,
        })
    }

    /// Records removed without replacement
    pub fn removals(&self) -> impl Iterator<Item = &Arc<PackageRecord>> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Remove(record) => Some(record),
            _ => None,
        })
    }

    /// (from, to) pairs of in-place replacements
    pub fn reinstalls(&self) -> impl Iterator<Item = (&Arc<PackageRecord>, &Arc<PackageRecord>)> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Reinstall { from, to } => Some((from, to)),
            _ => None,
        })
    }

    pub fn summary(&self) -> TransactionSummary {
        let mut summary = TransactionSummary::default();
        for op in &self.operations {
            match op {
                Operation::Install(_) => summary.installs += 1,
                Operation::Reinstall { .. } => summary.reinstalls += 1,
                Operation::Remove(_) => summary.removals += 1,
                Operation::Noop(_) => summary.noops += 1,
            }
        }
        summary
    }
}

/// Summary of a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionSummary {
    pub installs: usize,
    pub reinstalls: usize,
    pub removals: usize,
    pub noops: usize,
}

impl fmt::Display for TransactionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if self.installs > 0 {
            parts.push(format!("{} install(s)", self.installs));
        }
        if self.reinstalls > 0 {
            parts.push(format!("{} reinstall(s)", self.reinstalls));
        }
        if self.removals > 0 {
            parts.push(format!("{} removal(s)", self.removals));
        }

        if parts.is_empty() {
            write!(f, "Nothing to do")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Diffs the installed state against a solve result
#[derive(Debug, Clone, Default)]
pub struct Planner {
    keep_noops: bool,
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `Noop` operations for unchanged packages
    pub fn keep_noops(mut self, keep: bool) -> Self {
        self.keep_noops = keep;
        self
    }

    pub fn plan(&self, solved: &SolverResult, installed: &InstalledState) -> Result<Transaction, CyclicDependencyError> {
        let start = std::time::Instant::now();

        let target: IndexMap<String, Arc<PackageRecord>> = solved
            .real_packages()
            .map(|record| (record.normalized_name(), record.clone()))
            .collect();
        let current: IndexMap<String, Arc<PackageRecord>> = installed
            .iter()
            .filter(|(_, package)| !package.record.is_virtual())
            .map(|(name, package)| (name.to_string(), package.record.clone()))
            .collect();

        // One operation per name; unchanged names stay in the graph as Noop
        let mut pending: IndexMap<String, Operation> = IndexMap::new();
        for (name, record) in &target {
            let op = match current.get(name) {
                None => Operation::Install(record.clone()),
                Some(old) if !old.same_content(record) => Operation::Reinstall {
                    from: old.clone(),
                    to: record.clone(),
                },
                Some(_) => Operation::Noop(record.clone()),
            };
            pending.insert(name.clone(), op);
        }
        for (name, record) in &current {
            if !target.contains_key(name) {
                pending.insert(name.clone(), Operation::Remove(record.clone()));
            }
        }

        // name -> names whose operation has to run first
        let mut prerequisites: IndexMap<&str, BTreeSet<&str>> =
            pending.keys().map(|name| (name.as_str(), BTreeSet::new())).collect();

        // A new record comes after the new records it depends on
        for (name, record) in &target {
            for dep in record.dependency_names() {
                if dep != name.as_str() && target.contains_key(dep) {
                    if let Some(before) = prerequisites.get_mut(name.as_str()) {
                        before.insert(dep);
                    }
                }
            }
        }

        // A removal waits until no old record still depends on it
        for (dependent, old) in &current {
            for dep in old.dependency_names() {
                if dep == dependent.as_str() || !matches!(pending.get(dep), Some(Operation::Remove(_))) {
                    continue;
                }
                if let Some(before) = prerequisites.get_mut(dep) {
                    before.insert(dependent.as_str());
                }
            }
        }

        let order = schedule(&prerequisites, |name| matches!(pending.get(name), Some(Operation::Remove(_))))
            .map_err(|packages| CyclicDependencyError { packages })?;

        let operations = order
            .into_iter()
            .filter_map(|name| match pending.get(name.as_str()) {
                Some(Operation::Noop(_)) if !self.keep_noops => None,
                op => op.cloned(),
            })
            .collect();

        let transaction = Transaction { operations };
        log::info!(
            "Planned {} in {:.3} seconds",
            transaction.summary(),
            start.elapsed().as_secs_f64()
        );
        Ok(transaction)
    }
}

/// Order names so every name follows its prerequisites, ties broken by
/// `early` first and then by name.
///
/// A cycle made only of `early` names is broken by releasing its largest
/// name. Any other cycle is returned as the error.
fn schedule<'a>(
    prerequisites: &IndexMap<&'a str, BTreeSet<&'a str>>,
    early: impl Fn(&str) -> bool,
) -> Result<Vec<String>, Vec<String>> {
    let mut dependents: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for (name, before) in prerequisites {
        for prerequisite in before {
            dependents.entry(*prerequisite).or_default().push(*name);
        }
    }

    let rank = |name: &str| if early(name) { 0u8 } else { 1u8 };
    let mut remaining: IndexMap<&str, usize> =
        prerequisites.iter().map(|(name, before)| (*name, before.len())).collect();
    let mut ready: BTreeSet<(u8, &str)> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| (rank(*name), *name))
        .collect();

    let mut order = Vec::with_capacity(prerequisites.len());
    while !remaining.is_empty() {
        let name = match ready.pop_first() {
            Some((_, name)) => name,
            None => {
                let cycle = find_cycle(prerequisites, &remaining);
                if !cycle.iter().all(|name| early(name.as_str())) {
                    return Err(cycle);
                }
                log::debug!("Removed packages form a cycle ({}), removing by name", cycle.join(" -> "));
                match cycle.iter().max().and_then(|name| remaining.get_key_value(name.as_str())) {
                    Some((name, _)) => *name,
                    None => return Err(cycle),
                }
            }
        };

        remaining.shift_remove(name);
        order.push(name.to_string());
        for dependent in dependents.get(name).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(count) = remaining.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert((rank(*dependent), *dependent));
                }
            }
        }
    }

    Ok(order)
}

/// Follow unresolved dependencies from the smallest unresolved name until
/// a name repeats
fn find_cycle(dependencies: &IndexMap<&str, BTreeSet<&str>>, remaining: &IndexMap<&str, usize>) -> Vec<String> {
    let mut path: IndexSet<&str> = IndexSet::new();
    let mut current = remaining.keys().min().copied();

    while let Some(name) = current {
        if let Some(start) = path.get_index_of(name) {
            return path.iter().skip(start).map(|n| n.to_string()).collect();
        }
        path.insert(name);
        current = dependencies
            .get(name)
            .and_then(|deps| deps.iter().find(|dep| remaining.contains_key(**dep)))
            .copied();
    }

    path.iter().map(|n| n.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, version: &str, depends: &[&str]) -> PackageRecord {
        PackageRecord::new(name, version.parse().unwrap(), "0")
            .with_channel("c")
            .with_depends(depends.iter().map(|d| d.parse().unwrap()).collect())
    }

    fn solved(records: Vec<PackageRecord>) -> SolverResult {
        SolverResult::new(records.into_iter().map(Arc::new).collect())
    }

    fn describe(transaction: &Transaction) -> Vec<String> {
        transaction
            .operations
            .iter()
            .map(|op| match op {
                Operation::Install(r) => format!("install {}-{}", r.name, r.version),
                Operation::Reinstall { from, to } => format!("reinstall {}-{} -> {}", to.name, from.version, to.version),
                Operation::Remove(r) => format!("remove {}-{}", r.name, r.version),
                Operation::Noop(r) => format!("keep {}-{}", r.name, r.version),
            })
            .collect()
    }

    /// Apply `transaction` one operation at a time and check that every
    /// installed record still finds each of its dependencies by name
    fn assert_steps_keep_dependencies(installed: &InstalledState, transaction: &Transaction) {
        let mut state: IndexMap<String, Arc<PackageRecord>> = installed
            .iter()
            .map(|(name, package)| (name.to_string(), package.record.clone()))
            .collect();

        for op in transaction.iter() {
            match op {
                Operation::Remove(record) => {
                    state.shift_remove(&record.normalized_name());
                }
                other => {
                    state.insert(other.record().normalized_name(), other.record().clone());
                }
            }
            for record in state.values() {
                for dep in record.dependency_names().filter(|dep| !dep.starts_with("__")) {
                    assert!(
                        state.contains_key(dep),
                        "after `{}`: {} is installed but its dependency {} is missing",
                        op,
                        record.name,
                        dep
                    );
                }
            }
        }
    }

    #[test]
    fn test_install_in_dependency_order() {
        let result = solved(vec![
            record("app", "1.0", &["lib >=1", "zlib"]),
            record("lib", "1.0", &["zlib"]),
            record("zlib", "1.3", &[]),
            record("aaa", "1.0", &[]),
        ]);

        let transaction = Transaction::plan(&result, &InstalledState::new()).unwrap();
        assert_eq!(
            describe(&transaction),
            vec!["install aaa-1.0", "install zlib-1.3", "install lib-1.0", "install app-1.0"]
        );
    }

    #[test]
    fn test_noops_omitted_unless_kept() {
        let mut installed = InstalledState::new();
        installed.insert(record("zlib", "1.3", &[]), false);
        let result = solved(vec![record("lib", "1.0", &["zlib"]), record("zlib", "1.3", &[])]);

        let transaction = Transaction::plan(&result, &installed).unwrap();
        assert_eq!(describe(&transaction), vec!["install lib-1.0"]);

        let transaction = Planner::new().keep_noops(true).plan(&result, &installed).unwrap();
        assert_eq!(describe(&transaction), vec!["keep zlib-1.3", "install lib-1.0"]);
    }

    #[test]
    fn test_reinstall_and_remove() {
        let mut installed = InstalledState::new();
        installed.insert(record("app", "1.0", &["old"]), true);
        installed.insert(record("old", "1.0", &["older"]), false);
        installed.insert(record("older", "1.0", &[]), false);
        let result = solved(vec![record("app", "2.0", &[])]);

        let transaction = Transaction::plan(&result, &installed).unwrap();
        assert_eq!(
            describe(&transaction),
            vec!["reinstall app-1.0 -> 2.0", "remove old-1.0", "remove older-1.0"]
        );
        assert_steps_keep_dependencies(&installed, &transaction);
        assert_eq!(transaction.summary().to_string(), "1 reinstall(s), 2 removal(s)");
        assert_eq!(transaction.removals().count(), 2);
        assert_eq!(transaction.reinstalls().count(), 1);
    }

    #[test]
    fn test_remove_waits_for_reinstalled_dependent() {
        let mut installed = InstalledState::new();
        installed.insert(record("app", "1.0", &["old"]), true);
        installed.insert(record("old", "1.0", &[]), false);
        let result = solved(vec![record("app", "2.0", &[])]);

        let transaction = Transaction::plan(&result, &installed).unwrap();
        assert_eq!(describe(&transaction), vec!["reinstall app-1.0 -> 2.0", "remove old-1.0"]);
        assert_steps_keep_dependencies(&installed, &transaction);
    }

    #[test]
    fn test_mixed_upgrade_keeps_dependencies_at_every_step() {
        let mut installed = InstalledState::new();
        installed.insert(record("app", "1.0", &["lib", "legacy"]), true);
        installed.insert(record("lib", "1.0", &["zlib"]), false);
        installed.insert(record("legacy", "1.0", &["zlib"]), false);
        installed.insert(record("zlib", "1.2", &[]), false);
        installed.insert(record("stale", "0.1", &[]), false);
        let result = solved(vec![
            record("app", "2.0", &["lib >=2", "zstd"]),
            record("lib", "2.0", &["zlib"]),
            record("zlib", "1.3", &[]),
            record("zstd", "1.5", &[]),
        ]);

        let transaction = Transaction::plan(&result, &installed).unwrap();
        assert_eq!(
            describe(&transaction),
            vec![
                "remove stale-0.1",
                "reinstall zlib-1.2 -> 1.3",
                "reinstall lib-1.0 -> 2.0",
                "install zstd-1.5",
                "reinstall app-1.0 -> 2.0",
                "remove legacy-1.0",
            ]
        );
        assert_steps_keep_dependencies(&installed, &transaction);
    }

    #[test]
    fn test_changed_hash_is_reinstall() {
        let mut installed = InstalledState::new();
        installed.insert(record("zlib", "1.3", &[]).with_sha256("aa"), false);
        let result = solved(vec![record("zlib", "1.3", &[]).with_sha256("bb")]);

        let transaction = Transaction::plan(&result, &installed).unwrap();
        assert_eq!(describe(&transaction), vec!["reinstall zlib-1.3 -> 1.3"]);
    }

    #[test]
    fn test_virtual_records_never_planned() {
        let glibc = PackageRecord::new("__glibc", "2.17".parse().unwrap(), "0")
            .with_kind(crate::package::RecordKind::Virtual);
        let result = solved(vec![glibc, record("lib", "1.0", &["__glibc >=2.17"])]);

        let transaction = Transaction::plan(&result, &InstalledState::new()).unwrap();
        assert_eq!(describe(&transaction), vec!["install lib-1.0"]);
    }

    #[test]
    fn test_cycle_is_error() {
        let result = solved(vec![
            record("a", "1.0", &["b"]),
            record("b", "1.0", &["c"]),
            record("c", "1.0", &["b"]),
            record("d", "1.0", &["d"]),
        ]);

        let err = Transaction::plan(&result, &InstalledState::new()).unwrap_err();
        assert_eq!(err.packages, vec!["b", "c"]);
        assert!(err.to_string().contains("b -> c"));
    }

    #[test]
    fn test_removal_cycle_falls_back_to_name_order() {
        let mut installed = InstalledState::new();
        installed.insert(record("x", "1.0", &["y"]), false);
        installed.insert(record("y", "1.0", &["x"]), false);

        let transaction = Transaction::plan(&SolverResult::default(), &installed).unwrap();
        assert_eq!(describe(&transaction), vec!["remove y-1.0", "remove x-1.0"]);
    }

    #[test]
    fn test_empty_summary() {
        let transaction = Transaction::plan(&SolverResult::default(), &InstalledState::new()).unwrap();
        assert!(transaction.is_empty());
        assert_eq!(transaction.summary().to_string(), "Nothing to do");
    }
}
