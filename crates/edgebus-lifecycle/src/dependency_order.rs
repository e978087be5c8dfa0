//! Dependency-ordered run-list computation (spec §4.H, scenario 6),
//! grounded verbatim in `util::DependencyOrder::computeOrderedDependencies`
//! (`nucleus/src/deployment/model/dependency_order.hpp`): repeatedly scan
//! the pending set, move any entry whose dependencies are already resolved
//! into the output, and stop once a full scan makes no progress. What's
//! left is an unresolvable cycle or missing dependency.

use indexmap::{IndexMap, IndexSet};

/// Computes an insertion-ordered run list such that every entry appears
/// only after all of its dependencies, using `deps_of` to look up each
/// pending key's dependency set.
///
/// Returns `(resolved_order, inactive)`: `inactive` holds the keys left
/// over when a full scan makes no further progress (cyclic or missing
/// dependencies), in their original relative order.
pub fn compute_ordered_dependencies<K, F>(
    pending: impl IntoIterator<Item = K>,
    mut deps_of: F,
) -> (Vec<K>, Vec<K>)
where
    K: std::hash::Hash + Eq + Clone,
    F: FnMut(&K) -> Vec<K>,
{
    let mut pending: IndexMap<K, ()> = pending.into_iter().map(|k| (k, ())).collect();
    let mut resolved: IndexSet<K> = IndexSet::new();
    let mut order = Vec::new();

    loop {
        let before = pending.len();
        let mut resolved_this_pass = Vec::new();

        for key in pending.keys() {
            let deps = deps_of(key);
            if deps.iter().all(|d| resolved.contains(d)) {
                resolved_this_pass.push(key.clone());
            }
        }

        for key in &resolved_this_pass {
            pending.shift_remove(key);
            resolved.insert(key.clone());
            order.push(key.clone());
        }

        if pending.len() == before {
            // no progress this pass: cycle or missing dependency
            break;
        }
    }

    let inactive: Vec<K> = pending.into_keys().collect();
    (order, inactive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn graph(pairs: &[(i32, i32)]) -> HashMap<i32, Vec<i32>> {
        let mut deps: HashMap<i32, Vec<i32>> = HashMap::new();
        for &(from, to) in pairs {
            deps.entry(from).or_default().push(to);
        }
        deps
    }

    #[test]
    fn linear_and_disjoint_chains_resolve_in_dependency_order() {
        // 4 -> 1 -> 2 -> 3, and 6 -> 5, matching spec §8 scenario 6.
        let deps = graph(&[(4, 1), (1, 2), (2, 3), (6, 5)]);
        let all = [4, 1, 2, 3, 6, 5];
        let (order, inactive) =
            compute_ordered_dependencies(all, |k| deps.get(k).cloned().unwrap_or_default());

        assert!(inactive.is_empty());
        let pos = |k: i32| order.iter().position(|&x| x == k).unwrap();
        assert!(pos(3) < pos(2));
        assert!(pos(2) < pos(1));
        assert!(pos(1) < pos(4));
        assert!(pos(5) < pos(6));
    }

    #[test]
    fn a_cycle_leaves_its_members_inactive_while_the_rest_resolve() {
        // 1 <-> 2 cycle, 3 has no dependencies.
        let deps = graph(&[(1, 2), (2, 1)]);
        let all = [1, 2, 3];
        let (order, inactive) =
            compute_ordered_dependencies(all, |k| deps.get(k).cloned().unwrap_or_default());

        assert_eq!(order, vec![3]);
        let mut inactive_sorted = inactive.clone();
        inactive_sorted.sort();
        assert_eq!(inactive_sorted, vec![1, 2]);
    }

    #[test]
    fn missing_dependency_is_also_left_inactive() {
        let deps: HashMap<i32, Vec<i32>> = graph(&[(1, 99)]);
        let all = [1];
        let (order, inactive) =
            compute_ordered_dependencies(all, |k| deps.get(k).cloned().unwrap_or_default());
        assert!(order.is_empty());
        assert_eq!(inactive, vec![1]);
    }
}
