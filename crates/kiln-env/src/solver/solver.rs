use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use super::problem::{
    Conflict, ConflictConstraint, ConstraintKind, ConstraintOrigin, ExcludedCandidate, UnsatisfiableError,
};
use super::{CancellationToken, Policy, Request};
use crate::package::{MatchSpec, PackageRecord};
use crate::repository::{InstalledState, RepositoryIndex};

#[derive(Error, Debug, Clone)]
pub enum SolveError {
    #[error(transparent)]
    Unsatisfiable(#[from] UnsatisfiableError),
    #[error("Dependency resolution was cancelled before a solution was found")]
    Timeout,
}

/// Result of dependency resolution.
///
/// One record per package name, sorted by name. Virtual records are
/// included; the planner filters them out.
#[derive(Debug, Clone, Default)]
pub struct SolverResult {
    pub packages: Vec<Arc<PackageRecord>>,
}

impl SolverResult {
    pub fn new(mut packages: Vec<Arc<PackageRecord>>) -> Self {
        packages.sort_by_key(|record| record.normalized_name());
        Self { packages }
    }

    /// The chosen record for `name`
    pub fn get(&self, name: &str) -> Option<&Arc<PackageRecord>> {
        self.packages.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PackageRecord>> {
        self.packages.iter()
    }

    /// Chosen records that are installable artifacts
    pub fn real_packages(&self) -> impl Iterator<Item = &Arc<PackageRecord>> {
        self.packages.iter().filter(|r| !r.is_virtual())
    }
}

/// Backtracking dependency solver.
///
/// Decides one package name at a time, most constrained name first, trying
/// candidates in policy order. After each assignment the new dependencies
/// are checked against every other name; when a name runs out of candidates
/// the search jumps back to the latest decision that constrained it.
pub struct Solver<'a> {
    index: &'a RepositoryIndex,
    policy: &'a Policy,
}

impl<'a> Solver<'a> {
    pub fn new(index: &'a RepositoryIndex, policy: &'a Policy) -> Self {
        Self { index, policy }
    }

    /// Solve the request.
    ///
    /// Returns the chosen records, an explanation of why no choice exists,
    /// or [`SolveError::Timeout`] if the request's token is cancelled first.
    pub fn solve(&self, request: &Request) -> Result<SolverResult, SolveError> {
        let start = std::time::Instant::now();
        let specs = request.all_specs();

        let mut search = Search::new(self.index, self.policy, &request.installed);
        search.collect_candidates(&specs);
        log::debug!(
            "Solving {} specs against {} reachable names",
            specs.len(),
            search.ordered.len()
        );

        for spec in specs {
            let name = spec.name().to_string();
            search.add(
                name,
                Entry {
                    spec,
                    origin: ConstraintOrigin::Requested,
                    kind: ConstraintKind::Requires,
                    depth: None,
                },
            );
        }

        while let Some(name) = search.select() {
            check_cancelled(&request.cancellation, start)?;

            let candidates = search.viable(&name);
            log::debug!("Deciding {} with {} candidates", name, candidates.len());
            search.frames.push(Frame {
                name,
                candidates,
                next: 0,
                trail_mark: search.trail.len(),
                conflict: BTreeSet::new(),
            });
            search.advance(&request.cancellation, start)?;
        }

        let result = search.result();
        log::info!(
            "Dependency resolution completed in {:.3} seconds",
            start.elapsed().as_secs_f64()
        );
        log::info!(
            "Chose {} packages after {} decisions and {} backjumps",
            result.len(),
            search.decisions,
            search.backjumps
        );
        Ok(result)
    }
}

const LOWER_PRIORITY: &str = "a higher priority channel provides this package";
const DEPENDENCY_CONFLICT: &str = "its dependencies conflict with other choices";

/// Fold a new explanation for a name into an earlier one. Constraints
/// accumulate; a specific exclusion reason replaces the generic one.
fn merge_conflicts(
    mut previous: Conflict,
    constraints: Vec<ConflictConstraint>,
    excluded: Vec<ExcludedCandidate>,
) -> Conflict {
    for constraint in constraints {
        if !previous.constraints.contains(&constraint) {
            previous.constraints.push(constraint);
        }
    }
    for candidate in excluded {
        match previous
            .excluded
            .iter_mut()
            .find(|c| Arc::ptr_eq(&c.record, &candidate.record))
        {
            Some(existing) if existing.reason == DEPENDENCY_CONFLICT => existing.reason = candidate.reason,
            Some(_) => {}
            None => previous.excluded.push(candidate),
        }
    }
    previous
}

fn check_cancelled(token: &CancellationToken, start: std::time::Instant) -> Result<(), SolveError> {
    if token.is_cancelled() {
        log::info!(
            "Dependency resolution cancelled after {:.3} seconds",
            start.elapsed().as_secs_f64()
        );
        return Err(SolveError::Timeout);
    }
    Ok(())
}

/// A constraint on a name and the decision that introduced it
#[derive(Debug, Clone)]
struct Entry {
    spec: MatchSpec,
    origin: ConstraintOrigin,
    kind: ConstraintKind,
    /// Frame that added the entry; `None` for the request
    depth: Option<usize>,
}

/// One decision: a name and its remaining candidates
#[derive(Debug)]
struct Frame {
    name: String,
    candidates: Vec<Arc<PackageRecord>>,
    /// Index of the next candidate to try
    next: usize,
    /// Trail length before this frame's assignment
    trail_mark: usize,
    /// Earlier frames implicated in failures of this frame's candidates
    conflict: BTreeSet<usize>,
}

impl Frame {
    fn chosen(&self) -> Option<&Arc<PackageRecord>> {
        self.next.checked_sub(1).and_then(|i| self.candidates.get(i))
    }
}

struct Search<'s> {
    index: &'s RepositoryIndex,
    policy: &'s Policy,
    installed: &'s InstalledState,
    /// Policy ordered records per reachable name
    ordered: IndexMap<String, Vec<Arc<PackageRecord>>>,
    constraints: IndexMap<String, Vec<Entry>>,
    /// Names in the order entries were pushed, for undo
    trail: Vec<String>,
    frames: Vec<Frame>,
    /// Assigned name -> frame depth
    assigned: IndexMap<String, usize>,
    /// Latest explanation per name, most recent last
    conflicts: IndexMap<String, Conflict>,
    decisions: usize,
    backjumps: usize,
}

impl<'s> Search<'s> {
    fn new(index: &'s RepositoryIndex, policy: &'s Policy, installed: &'s InstalledState) -> Self {
        Self {
            index,
            policy,
            installed,
            ordered: IndexMap::new(),
            constraints: IndexMap::new(),
            trail: Vec::new(),
            frames: Vec::new(),
            assigned: IndexMap::new(),
            conflicts: IndexMap::new(),
            decisions: 0,
            backjumps: 0,
        }
    }

    /// Walk dependencies breadth-first from the specs, ordering the
    /// candidates of every name reached
    fn collect_candidates(&mut self, specs: &[MatchSpec]) {
        let mut queue: VecDeque<String> = specs.iter().map(|spec| spec.name().to_string()).collect();

        while let Some(name) = queue.pop_front() {
            if self.ordered.contains_key(&name) {
                continue;
            }

            let installed = self.installed.get_record(&name).map(|r| r.as_ref());
            let ordered = self.policy.order(self.index, self.index.lookup(&name), installed);
            for record in &ordered {
                for dependency in record.dependency_names() {
                    if !self.ordered.contains_key(dependency) {
                        queue.push_back(dependency.to_string());
                    }
                }
            }
            self.ordered.insert(name, ordered);
        }
    }

    fn candidates(&self, name: &str) -> &[Arc<PackageRecord>] {
        self.ordered.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn entries(&self, name: &str) -> &[Entry] {
        self.constraints.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn add(&mut self, name: String, entry: Entry) {
        self.constraints.entry(name.clone()).or_default().push(entry);
        self.trail.push(name);
    }

    fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some(name) = self.trail.pop() {
                if let Some(entries) = self.constraints.get_mut(&name) {
                    entries.pop();
                }
            }
        }
    }

    /// The first constraint on `name` that `record` violates
    fn rejecting(&self, name: &str, record: &PackageRecord) -> Option<&Entry> {
        self.entries(name).iter().find(|entry| !entry.spec.matches(record))
    }

    fn viable(&self, name: &str) -> Vec<Arc<PackageRecord>> {
        self.candidates(name)
            .iter()
            .filter(|record| self.rejecting(name, record).is_none())
            .cloned()
            .collect()
    }

    fn viable_count(&self, name: &str) -> usize {
        self.candidates(name)
            .iter()
            .filter(|record| self.rejecting(name, record).is_none())
            .count()
    }

    fn is_required(&self, name: &str) -> bool {
        self.entries(name).iter().any(|entry| entry.kind == ConstraintKind::Requires)
    }

    /// Frames other than `exclude` that put a constraint on `name`
    fn culprits(&self, name: &str, exclude: usize) -> BTreeSet<usize> {
        self.entries(name)
            .iter()
            .filter_map(|entry| entry.depth)
            .filter(|&depth| depth != exclude)
            .collect()
    }

    /// The required, unassigned name with the fewest viable candidates;
    /// ties go to the name constrained first
    fn select(&self) -> Option<String> {
        let mut best: Option<(&str, usize)> = None;
        for name in self.constraints.keys() {
            if self.assigned.contains_key(name) || !self.is_required(name) {
                continue;
            }
            let count = self.viable_count(name);
            if best.map_or(true, |(_, best_count)| count < best_count) {
                best = Some((name.as_str(), count));
            }
        }
        best.map(|(name, _)| name.to_string())
    }

    /// Undo the current assignment of the frame at `depth`
    fn retract(&mut self, depth: usize) {
        let mark = self.frames[depth].trail_mark;
        self.undo_to(mark);
        let name = &self.frames[depth].name;
        self.assigned.shift_remove(name);
    }

    /// Assign the next consistent candidate to the top frame, backjumping
    /// as often as needed
    fn advance(&mut self, token: &CancellationToken, start: std::time::Instant) -> Result<(), SolveError> {
        loop {
            check_cancelled(token, start)?;

            let depth = self.frames.len() - 1;
            self.retract(depth);

            let frame = &mut self.frames[depth];
            if frame.next >= frame.candidates.len() {
                self.backjump()?;
                continue;
            }

            let record = frame.candidates[frame.next].clone();
            frame.next += 1;
            self.decisions += 1;

            if self.assign(depth, &record) {
                return Ok(());
            }
        }
    }

    /// Assign `record` at `depth` and forward check the names it constrains.
    /// Returns false, with the frame's conflict set updated, when some name
    /// is left without a candidate.
    fn assign(&mut self, depth: usize, record: &Arc<PackageRecord>) -> bool {
        let name = self.frames[depth].name.clone();
        log::debug!("Trying {} at depth {}", record, depth);
        self.assigned.insert(name, depth);

        let origin = ConstraintOrigin::Package(record.to_string());
        let mut touched = IndexSet::new();
        let entries = record
            .depends
            .iter()
            .map(|spec| (spec, ConstraintKind::Requires))
            .chain(record.constrains.iter().map(|spec| (spec, ConstraintKind::Constrains)));
        for (spec, kind) in entries {
            touched.insert(spec.name().to_string());
            self.add(
                spec.name().to_string(),
                Entry {
                    spec: spec.clone(),
                    origin: origin.clone(),
                    kind,
                    depth: Some(depth),
                },
            );
        }

        for dependency in &touched {
            if let Some(&owner) = self.assigned.get(dependency) {
                let rejected = match self.frames[owner].chosen() {
                    Some(chosen) => self.rejecting(dependency, chosen).is_some(),
                    None => false,
                };
                if rejected {
                    log::debug!("{} conflicts with the choice for {}", record, dependency);
                    self.record_conflict(dependency);
                    if owner != depth {
                        self.frames[depth].conflict.insert(owner);
                    }
                    return false;
                }
            } else if self.is_required(dependency) && self.viable_count(dependency) == 0 {
                log::debug!("{} leaves no candidate for {}", record, dependency);
                self.record_conflict(dependency);
                let culprits = self.culprits(dependency, depth);
                self.frames[depth].conflict.extend(culprits);
                return false;
            }
        }
        true
    }

    /// Pop the exhausted top frame and jump back to the latest frame in its
    /// conflict set, passing the rest of the set on
    fn backjump(&mut self) -> Result<(), UnsatisfiableError> {
        let frame = match self.frames.pop() {
            Some(frame) => frame,
            None => return Err(self.unsatisfiable()),
        };
        let depth = self.frames.len();
        self.record_conflict(&frame.name);

        let mut conflict = frame.conflict;
        conflict.extend(self.culprits(&frame.name, depth));

        let target = match conflict.pop_last() {
            Some(target) => target,
            None => {
                log::debug!("No decision left to revise for {}", frame.name);
                return Err(self.unsatisfiable());
            }
        };

        while self.frames.len() > target + 1 {
            let skipped = self.frames.len() - 1;
            self.retract(skipped);
            self.frames.pop();
        }
        self.frames[target].conflict.extend(conflict);
        self.backjumps += 1;
        log::debug!(
            "Backjumping from {} to {} at depth {}",
            frame.name,
            self.frames[target].name,
            target
        );
        Ok(())
    }

    fn record_conflict(&mut self, name: &str) {
        let constraints = self
            .entries(name)
            .iter()
            .map(|entry| ConflictConstraint {
                spec: entry.spec.clone(),
                origin: entry.origin.clone(),
                kind: entry.kind,
            })
            .collect();

        let ordered = self.candidates(name);
        let excluded = self
            .index
            .lookup(name)
            .iter()
            .map(|record| {
                let reason = if !ordered.iter().any(|r| Arc::ptr_eq(r, record)) {
                    LOWER_PRIORITY.to_string()
                } else if let Some(entry) = self.rejecting(name, record) {
                    format!("does not match {} ({})", entry.spec, entry.origin)
                } else {
                    DEPENDENCY_CONFLICT.to_string()
                };
                ExcludedCandidate {
                    record: record.clone(),
                    reason,
                }
            })
            .collect();

        let conflict = match self.conflicts.shift_remove(name) {
            Some(previous) => merge_conflicts(previous, constraints, excluded),
            None => Conflict {
                name: name.to_string(),
                constraints,
                excluded,
            },
        };
        self.conflicts.insert(name.to_string(), conflict);
    }

    /// Explanation with the most recent conflict first
    fn unsatisfiable(&self) -> UnsatisfiableError {
        UnsatisfiableError::new(self.conflicts.values().rev().cloned().collect())
    }

    fn result(&self) -> SolverResult {
        let packages = self
            .assigned
            .values()
            .filter_map(|&depth| self.frames[depth].chosen().cloned())
            .collect();
        SolverResult::new(packages)
    }
}
