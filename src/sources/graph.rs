use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A resolved dependency graph keyed by package id, used to push the groups
/// of top-level requirements down to their transitive dependencies.
#[derive(Debug, Default)]
pub struct GroupGraph {
    edges: BTreeMap<String, Vec<String>>,
    roots: BTreeMap<String, BTreeSet<String>>,
}

impl GroupGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
    }

    /// Declare `id` as a direct requirement of the project in `group`.
    pub fn add_root(&mut self, id: &str, group: &str) {
        self.roots
            .entry(id.to_string())
            .or_default()
            .insert(group.to_string());
    }

    pub fn has_roots(&self) -> bool {
        !self.roots.is_empty()
    }

    /// Every id reachable from a root, mapped to the union of the groups of
    /// the roots it is reachable from.
    pub fn propagate(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut queue: VecDeque<(String, String)> = self
            .roots
            .iter()
            .flat_map(|(id, gs)| gs.iter().map(move |g| (id.clone(), g.clone())))
            .collect();

        while let Some((id, group)) = queue.pop_front() {
            if !groups.entry(id.clone()).or_default().insert(group.clone()) {
                continue;
            }
            for next in self.edges.get(&id).into_iter().flatten() {
                queue.push_back((next.clone(), group.clone()));
            }
        }
        groups
    }
}
