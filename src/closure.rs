//! Breadth-first transitive closure over parent links.
//!
//! Both directions walk one generation at a time: each generation is resolved
//! with a single [`LinkSource`] call, ids are kept on first discovery only, and
//! the walk stops when a generation adds nothing new. Three guards protect
//! against malformed data. The origin showing up in its own closure is a cycle,
//! a walk deeper than the configured limit is a cycle, and reaching an id again
//! is a cycle when that id leads back to where it was reached from. Shared
//! ancestry (two parents with a common grandparent) revisits ids without
//! looping and passes.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use tracing::{debug, instrument};

use crate::config::RoleSelection;
use crate::error::TreeScopeError;
use crate::links::LinkSource;

/// Closure result grouped by distance from the origin.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Generations<Id> {
    levels: Vec<Vec<Id>>,
}

impl<Id> Generations<Id> {
    /// Generations ordered nearest first.
    pub fn levels(&self) -> &[Vec<Id>] {
        &self.levels
    }

    /// Number of generations walked.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn contains(&self, id: &Id) -> bool
    where
        Id: PartialEq,
    {
        self.levels.iter().any(|level| level.contains(id))
    }

    /// Flatten with the nearest generation first.
    pub fn nearest_first(self) -> Vec<Id> {
        self.levels.into_iter().flatten().collect()
    }

    /// Flatten with the farthest generation first, keeping order inside each generation.
    pub fn root_first(self) -> Vec<Id> {
        self.levels.into_iter().rev().flatten().collect()
    }
}

/// Walk parent links upwards from `origin`.
///
/// `direct_parents` is the origin's own role-ordered parent list, read from the
/// loaded row so the first generation costs no round trip.
#[instrument(level = "debug", skip_all, fields(origin = ?origin, max_depth = max_depth))]
pub async fn ancestor_generations<S>(
    source: &S,
    origin: &S::Id,
    direct_parents: Vec<S::Id>,
    roles: &RoleSelection,
    max_depth: usize,
) -> Result<Generations<S::Id>, TreeScopeError>
where
    S: LinkSource + ?Sized,
{
    let mut seen = HashSet::new();
    let mut walked = Edges::default();
    let mut levels = Vec::new();
    let mut frontier = direct_parents;
    let mut depth = 0;

    while !frontier.is_empty() {
        depth += 1;
        check_frontier(origin, &frontier, depth, max_depth)?;

        let level = fresh(&mut seen, frontier);
        if level.is_empty() {
            break;
        }

        let parents = source.parents_of(&level, roles).await?;
        for (child, parents) in level.iter().zip(&parents) {
            walked.extend(child, parents.iter().cloned());
        }
        for (child, parents) in level.iter().zip(&parents) {
            for parent in parents {
                if seen.contains(parent) && walked.reaches(parent, child) {
                    return Err(TreeScopeError::cycle(origin, depth + 1));
                }
            }
        }

        frontier = parents.into_iter().flatten().collect();
        levels.push(level);
    }

    let generations = Generations { levels };
    debug!(
        depth = generations.depth(),
        total = generations.len(),
        "ancestor closure computed"
    );
    Ok(generations)
}

/// Walk child links downwards from `origin`.
#[instrument(level = "debug", skip_all, fields(origin = ?origin, max_depth = max_depth))]
pub async fn descendant_generations<S>(
    source: &S,
    origin: &S::Id,
    roles: &RoleSelection,
    max_depth: usize,
) -> Result<Generations<S::Id>, TreeScopeError>
where
    S: LinkSource + ?Sized,
{
    let mut seen = HashSet::new();
    let mut walked = Edges::default();
    let mut levels = Vec::new();
    let mut frontier: Vec<S::Id> = source
        .children_of(std::slice::from_ref(origin), roles)
        .await?
        .into_iter()
        .map(|link| link.id)
        .collect();
    let mut depth = 0;

    while !frontier.is_empty() {
        depth += 1;
        check_frontier(origin, &frontier, depth, max_depth)?;

        let level = fresh(&mut seen, frontier);
        if level.is_empty() {
            break;
        }

        let children = source.children_of(&level, roles).await?;
        let explored: HashSet<&S::Id> = level.iter().collect();
        for link in &children {
            for parent in link.parents.iter().filter(|parent| explored.contains(parent)) {
                walked.extend(parent, [link.id.clone()]);
            }
        }
        for link in children.iter().filter(|link| seen.contains(&link.id)) {
            for parent in link.parents.iter().filter(|parent| explored.contains(parent)) {
                if walked.reaches(&link.id, parent) {
                    return Err(TreeScopeError::cycle(origin, depth + 1));
                }
            }
        }

        frontier = children.into_iter().map(|link| link.id).collect();
        levels.push(level);
    }

    let generations = Generations { levels };
    debug!(
        depth = generations.depth(),
        total = generations.len(),
        "descendant closure computed"
    );
    Ok(generations)
}

fn check_frontier<Id>(
    origin: &Id,
    frontier: &[Id],
    depth: usize,
    max_depth: usize,
) -> Result<(), TreeScopeError>
where
    Id: PartialEq + std::fmt::Debug,
{
    if depth > max_depth || frontier.contains(origin) {
        return Err(TreeScopeError::cycle(origin, depth));
    }
    Ok(())
}

// Keeps frontier order, drops anything already reached.
fn fresh<Id>(seen: &mut HashSet<Id>, frontier: Vec<Id>) -> Vec<Id>
where
    Id: Clone + Eq + Hash,
{
    frontier
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Links already walked, in walk direction.
struct Edges<Id> {
    next: HashMap<Id, Vec<Id>>,
}

impl<Id> Default for Edges<Id> {
    fn default() -> Self {
        Self {
            next: HashMap::new(),
        }
    }
}

impl<Id> Edges<Id>
where
    Id: Clone + Eq + Hash,
{
    fn extend(&mut self, from: &Id, to: impl IntoIterator<Item = Id>) {
        self.next.entry(from.clone()).or_default().extend(to);
    }

    /// True when `target` can be reached from `start` over walked links.
    fn reaches(&self, start: &Id, target: &Id) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(next) = self.next.get(id) {
                stack.extend(next);
            }
        }
        false
    }
}
