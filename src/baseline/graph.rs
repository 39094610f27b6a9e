//! Dependency ordering over baseline items.
use std::collections::{BTreeSet, HashMap};

use crate::types::errors::ParseError;
use crate::types::BaselineItem;

/// Topologically sort items by `depends_on` using Kahn's algorithm.
///
/// Among items whose dependencies are all placed, the one declared first wins, so the
/// result equals declaration order whenever declaration order is already valid.
/// Returns indices into `items`.
///
/// # Errors
///
/// `ParseError::UnknownDependency` for edges to missing ids, `ParseError::Cycle` with one
/// offending cycle when the graph is not a DAG.
pub fn topo_order(items: &[BaselineItem]) -> Result<Vec<usize>, ParseError> {
    let index: HashMap<&str, usize> = items
        .iter()
        .enumerate()
        .map(|(i, it)| (it.id.as_str(), i))
        .collect();

    let mut indegree = vec![0usize; items.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    for (i, it) in items.iter().enumerate() {
        let mut seen = BTreeSet::new();
        for dep in &it.depends_on {
            let Some(&d) = index.get(dep.as_str()) else {
                return Err(ParseError::UnknownDependency {
                    item: it.id.clone(),
                    dependency: dep.clone(),
                });
            };
            if seen.insert(d) {
                indegree[i] += 1;
                dependents[d].push(i);
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..items.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(items.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &d in &dependents[next] {
            indegree[d] -= 1;
            if indegree[d] == 0 {
                ready.insert(d);
            }
        }
    }

    if order.len() == items.len() {
        Ok(order)
    } else {
        Err(ParseError::Cycle(find_cycle(items, &index, &indegree)))
    }
}

/// Walk unresolved nodes until one repeats; the repeated suffix is a cycle.
fn find_cycle(items: &[BaselineItem], index: &HashMap<&str, usize>, indegree: &[usize]) -> Vec<String> {
    let Some(start) = (0..items.len()).find(|&i| indegree[i] > 0) else {
        return Vec::new();
    };
    let mut path: Vec<usize> = vec![start];
    let mut cur = start;
    loop {
        // Every unresolved node has at least one unresolved dependency.
        let next = items[cur]
            .depends_on
            .iter()
            .filter_map(|d| index.get(d.as_str()).copied())
            .find(|&d| indegree[d] > 0);
        let Some(next) = next else {
            return path.iter().map(|&i| items[i].id.clone()).collect();
        };
        if let Some(pos) = path.iter().position(|&p| p == next) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|&i| items[i].id.clone()).collect();
            cycle.push(items[next].id.clone());
            return cycle;
        }
        path.push(next);
        cur = next;
    }
}
