//! Topological ordering and parallel grouping
//!
//! Implements Kahn's algorithm with:
//! - Dangling-edge and duplicate-id checks before sorting
//! - Cycle detection with the operators involved
//! - Stable order (original operator position breaks ties)
//!
//! The generator only emits linear chains, but nothing here assumes it.

use crate::error::DagError;
use floatchat_types::SemanticOperatorDAG;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Min-heap entry keyed on original operator position
#[derive(Debug, Eq, PartialEq)]
struct MinHeapEntry {
    position: usize,
}

impl Ord for MinHeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse ordering for min-heap
        other.position.cmp(&self.position)
    }
}

impl PartialOrd for MinHeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Direct dependencies of each operator, as indices into `dag.operators`
pub fn dependency_indices(dag: &SemanticOperatorDAG) -> Result<Vec<Vec<usize>>, DagError> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(dag.operators.len());
    for (i, op) in dag.operators.iter().enumerate() {
        if index.insert(op.id.as_str(), i).is_some() {
            return Err(DagError::DuplicateOperator { id: op.id.clone() });
        }
    }

    let mut deps: Vec<Vec<usize>> = vec![Vec::new(); dag.operators.len()];
    for edge in &dag.edges {
        let (Some(&from), Some(&to)) = (
            index.get(edge.from_id.as_str()),
            index.get(edge.to_id.as_str()),
        ) else {
            return Err(DagError::DanglingEdge {
                from: edge.from_id.clone(),
                to: edge.to_id.clone(),
            });
        };
        if !deps[to].contains(&from) {
            deps[to].push(from);
        }
    }
    Ok(deps)
}

/// Operator indices in execution order
///
/// Every operator appears exactly once and for every edge `u -> v`,
/// `u` comes before `v`.
pub fn topological_sort(dag: &SemanticOperatorDAG) -> Result<Vec<usize>, DagError> {
    let n = dag.operators.len();
    let deps = dependency_indices(dag)?;

    // dependents[i] = operators that must wait for i
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree: Vec<usize> = vec![0; n];
    for (to, from_list) in deps.iter().enumerate() {
        for &from in from_list {
            dependents[from].push(to);
            in_degree[to] += 1;
        }
    }

    let mut heap: BinaryHeap<MinHeapEntry> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(position, _)| MinHeapEntry { position })
        .collect();

    let mut sorted: Vec<usize> = Vec::with_capacity(n);
    while let Some(entry) = heap.pop() {
        let idx = entry.position;
        sorted.push(idx);
        for &next in &dependents[idx] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                heap.push(MinHeapEntry { position: next });
            }
        }
    }

    if sorted.len() != n {
        let placed: HashSet<usize> = sorted.iter().copied().collect();
        let operator_ids: Vec<String> = (0..n)
            .filter(|i| !placed.contains(i))
            .map(|i| dag.operators[i].id.clone())
            .collect();

        let mut explanation = String::from("Circular dependency detected:\n");
        for id in &operator_ids {
            if let Some(op) = dag.operator(id) {
                explanation.push_str(&format!("  --> {} ({})\n", op.id, op.kind));
            }
        }
        explanation.push_str("\nThese operators depend on each other in a cycle.");

        return Err(DagError::Cycle {
            operator_ids,
            explanation,
        });
    }

    Ok(sorted)
}

/// Partition steps into groups that can run concurrently.
///
/// `depends_on[i]` lists the step indices step `i` waits for; steps are in
/// topological order, so every dependency index is smaller than `i`.
///
/// Walking the order, a step joins the current group only when all its
/// dependencies sit in earlier groups and it has no direct or transitive
/// dependency relation with anything already in the group. Otherwise the
/// group is closed and a new one started.
pub fn parallel_groups(depends_on: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = depends_on.len();

    // ancestors[i] = every step i depends on, directly or transitively
    let mut ancestors: Vec<HashSet<usize>> = Vec::with_capacity(n);
    for deps in depends_on {
        let mut all = HashSet::new();
        for &d in deps {
            all.insert(d);
            if let Some(inherited) = ancestors.get(d) {
                all.extend(inherited.iter().copied());
            }
        }
        ancestors.push(all);
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut completed: HashSet<usize> = HashSet::new();

    for i in 0..n {
        let deps_done = depends_on[i].iter().all(|d| completed.contains(d));
        let related = current
            .iter()
            .any(|&g| ancestors[i].contains(&g) || ancestors[g].contains(&i));

        if !current.is_empty() && (!deps_done || related) {
            completed.extend(current.iter().copied());
            groups.push(std::mem::take(&mut current));
        }
        current.push(i);
    }

    if !current.is_empty() {
        groups.push(current);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nl2op::operator_generator::new_operator;
    use floatchat_types::{Edge, ExtractedEntities, OperatorKind, Params, QueryIntent};

    fn dag(kinds: &[OperatorKind], edges: &[(usize, usize)]) -> SemanticOperatorDAG {
        let operators: Vec<_> = kinds
            .iter()
            .map(|&k| new_operator(k, Params::new()))
            .collect();
        let edges = edges
            .iter()
            .map(|&(a, b)| Edge::new(operators[a].id.clone(), operators[b].id.clone()))
            .collect();
        SemanticOperatorDAG {
            operators,
            edges,
            confidence: 1.0,
            intent: QueryIntent::GeneralQuery,
            entities: ExtractedEntities::new(),
            alternatives: Vec::new(),
            mode: Default::default(),
        }
    }

    #[test]
    fn test_linear_chain() {
        use OperatorKind::*;
        let d = dag(&[SpatialFilter, TemporalFilter, Visualize], &[(0, 1), (1, 2)]);
        assert_eq!(topological_sort(&d).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_stable_order_for_independent_operators() {
        use OperatorKind::*;
        // 2 has no dependencies but must not jump ahead of 0 and 1
        let d = dag(&[SpatialFilter, TemporalFilter, FloatFilter, Join], &[(0, 3), (1, 3)]);
        assert_eq!(topological_sort(&d).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_reverse_declared_edges() {
        use OperatorKind::*;
        let d = dag(&[Visualize, ComputeMld, SpatialFilter], &[(2, 1), (1, 0)]);
        assert_eq!(topological_sort(&d).unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn test_cycle_detected() {
        use OperatorKind::*;
        let d = dag(&[SpatialFilter, ComputeStats, Visualize], &[(0, 1), (1, 2), (2, 1)]);
        match topological_sort(&d) {
            Err(DagError::Cycle { operator_ids, .. }) => {
                assert_eq!(operator_ids.len(), 2);
                assert!(operator_ids.contains(&d.operators[1].id));
                assert!(operator_ids.contains(&d.operators[2].id));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_dangling_edge() {
        let mut d = dag(&[OperatorKind::SpatialFilter], &[]);
        d.edges.push(Edge::new(d.operators[0].id.clone(), "ghost"));
        assert!(matches!(
            topological_sort(&d),
            Err(DagError::DanglingEdge { .. })
        ));
    }

    #[test]
    fn test_duplicate_ids() {
        let mut d = dag(&[OperatorKind::SpatialFilter, OperatorKind::Visualize], &[]);
        d.operators[1].id = d.operators[0].id.clone();
        assert!(matches!(
            topological_sort(&d),
            Err(DagError::DuplicateOperator { .. })
        ));
    }

    #[test]
    fn test_groups_for_chain_are_singletons() {
        let groups = parallel_groups(&[vec![], vec![0], vec![1]]);
        assert_eq!(groups, vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_groups_for_diamond() {
        // 0 -> {1, 2} -> 3
        let groups = parallel_groups(&[vec![], vec![0], vec![0], vec![1, 2]]);
        assert_eq!(groups, vec![vec![0], vec![1, 2], vec![3]]);
    }

    #[test]
    fn test_independent_roots_share_a_group() {
        let groups = parallel_groups(&[vec![], vec![], vec![0, 1]]);
        assert_eq!(groups, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_empty() {
        assert!(parallel_groups(&[]).is_empty());
        let d = dag(&[], &[]);
        assert!(topological_sort(&d).unwrap().is_empty());
    }
}
