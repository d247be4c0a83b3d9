//! Graph algorithms for test dependency analysis.
//!
//! This module orders feature tests so that every test runs after the tests it
//! declares as dependencies, and detects dependency cycles at registration time.

use std::collections::{BTreeSet, HashMap, HashSet};

/// Result of ordering a dependency graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyOrder {
    /// Node IDs in an order where dependencies precede dependents
    pub ordered: Vec<String>,

    /// Node IDs that sit on (or behind) a cycle, in input order
    pub cyclic: Vec<String>,
}

impl DependencyOrder {
    /// All node IDs: the ordered ones followed by the cyclic ones.
    pub fn into_sequence(self) -> Vec<String> {
        let mut sequence = self.ordered;
        sequence.extend(self.cyclic);
        sequence
    }
}

/// Topologically order `nodes`, given as `(id, dependencies)` pairs.
///
/// Ties are broken by input position, so independent nodes keep their
/// registration order. Dependencies on IDs that are not in `nodes` do not
/// constrain the order.
pub fn dependency_order(nodes: &[(String, Vec<String>)]) -> DependencyOrder {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (id.as_str(), i))
        .collect();

    let mut indegree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

    for (i, (_, deps)) in nodes.iter().enumerate() {
        let mut seen = HashSet::new();
        for dep in deps {
            if let Some(&j) = index.get(dep.as_str()) {
                if seen.insert(j) {
                    indegree[i] += 1;
                    dependents[j].push(i);
                }
            }
        }
    }

    // Kahn's algorithm; the ready set is ordered by input position
    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| indegree[i] == 0).collect();
    let mut ordered = Vec::with_capacity(nodes.len());

    while let Some(i) = ready.pop_first() {
        ordered.push(nodes[i].0.clone());
        for &d in &dependents[i] {
            indegree[d] -= 1;
            if indegree[d] == 0 {
                ready.insert(d);
            }
        }
    }

    let cyclic = (0..nodes.len())
        .filter(|&i| indegree[i] > 0)
        .map(|i| nodes[i].0.clone())
        .collect();

    DependencyOrder { ordered, cyclic }
}

/// Check whether `id` can reach itself through declared dependencies.
///
/// Uses DFS from the node's dependencies looking for a path back to `id`.
pub fn has_cycle_through(id: &str, nodes: &[(String, Vec<String>)]) -> bool {
    let deps_of: HashMap<&str, &Vec<String>> =
        nodes.iter().map(|(n, deps)| (n.as_str(), deps)).collect();

    let Some(start) = deps_of.get(id) else {
        return false;
    };

    let mut visited = HashSet::new();
    let mut stack: Vec<&str> = start.iter().map(String::as_str).collect();

    while let Some(current) = stack.pop() {
        if current == id {
            return true;
        }

        if !visited.insert(current) {
            continue;
        }

        if let Some(deps) = deps_of.get(current) {
            for dep in deps.iter() {
                if !visited.contains(dep.as_str()) {
                    stack.push(dep);
                }
            }
        }
    }

    false
}
