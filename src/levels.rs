//! Hierarchical level assignment shared by every renderer.
//!
//! Levels are computed once per graph snapshot: a holder or controller always
//! sits on a smaller level than what it owns or controls. Cross-holdings are
//! broken deterministically (earliest declared top-level entity first, then
//! earliest declared entity) and reported as [`CycleWarning`]s.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::model::OwnershipGraph;

/// Non-fatal notice that the input was not a DAG (or did not settle within
/// the iteration cap); levels are best effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleWarning {
    /// Edges ignored for levelling because they close a cycle.
    pub broken_edges: Vec<(String, String)>,
    /// True when relaxation stopped at the cap instead of converging.
    pub iteration_cap_reached: bool,
}

impl std::fmt::Display for CycleWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let edges: Vec<String> = self
            .broken_edges
            .iter()
            .map(|(from, to)| format!("{from} -> {to}"))
            .collect();
        write!(f, "ownership cycle broken at [{}]", edges.join(", "))?;
        if self.iteration_cap_reached {
            write!(f, " (iteration cap reached)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelAssignment {
    pub levels: BTreeMap<String, usize>,
    /// Entities in the order levels were resolved (a topological order once
    /// broken edges are dropped).
    pub order: Vec<String>,
    pub warnings: Vec<CycleWarning>,
}

impl LevelAssignment {
    pub fn get(&self, name: &str) -> Option<usize> {
        self.levels.get(name).copied()
    }

    pub fn max_level(&self) -> usize {
        self.levels.values().copied().max().unwrap_or(0)
    }

    pub fn has_cycles(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Entity names grouped per level, each group in graph declaration order.
    pub fn by_level(&self, graph: &OwnershipGraph) -> Vec<Vec<String>> {
        let mut buckets: Vec<Vec<String>> = vec![Vec::new(); self.max_level() + 1];
        for entity in &graph.entities {
            if let Some(level) = self.get(&entity.name) {
                buckets[level].push(entity.name.clone());
            }
        }
        buckets
    }
}

pub fn assign_levels(graph: &OwnershipGraph) -> LevelAssignment {
    assign_levels_capped(graph, None)
}

/// Like [`assign_levels`] with an explicit relaxation cap; `None` means
/// entity count + 1, enough for any acyclic input to converge.
pub fn assign_levels_capped(graph: &OwnershipGraph, max_iterations: Option<usize>) -> LevelAssignment {
    let names: Vec<&str> = graph.entities.iter().map(|e| e.name.as_str()).collect();
    let index = graph.entity_index();
    let count = names.len();

    let mut parents: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    for (from, to) in graph.parent_links() {
        let (Some(&from_idx), Some(&to_idx)) = (index.get(from), index.get(to)) else {
            continue;
        };
        if from_idx == to_idx || !seen.insert((from_idx, to_idx)) {
            continue;
        }
        children[from_idx].push(to_idx);
        parents[to_idx].push(from_idx);
    }

    let top_level: HashSet<usize> = graph
        .top_level
        .iter()
        .filter_map(|name| index.get(name.as_str()).copied())
        .collect();
    // Cycle breaking prefers declared roots, then declaration order.
    let order_key = |idx: usize| -> (bool, usize) { (!top_level.contains(&idx), idx) };

    let mut indeg: Vec<usize> = parents.iter().map(Vec::len).collect();
    let mut ready: BinaryHeap<Reverse<((bool, usize), usize)>> = BinaryHeap::new();
    for idx in 0..count {
        if indeg[idx] == 0 {
            ready.push(Reverse((order_key(idx), idx)));
        }
    }

    let mut order: Vec<usize> = Vec::with_capacity(count);
    let mut processed = vec![false; count];
    loop {
        while let Some(Reverse((_key, idx))) = ready.pop() {
            if processed[idx] {
                continue;
            }
            processed[idx] = true;
            order.push(idx);
            for &next in &children[idx] {
                if processed[next] {
                    continue;
                }
                indeg[next] = indeg[next].saturating_sub(1);
                if indeg[next] == 0 {
                    ready.push(Reverse((order_key(next), next)));
                }
            }
        }

        if order.len() >= count {
            break;
        }

        // Cycle: promote the preferred remaining entity to a source; its
        // incoming edges from unresolved entities become broken edges.
        let best = (0..count)
            .filter(|idx| !processed[*idx])
            .min_by_key(|idx| order_key(*idx));
        match best {
            Some(idx) => ready.push(Reverse((order_key(idx), idx))),
            None => break,
        }
    }

    let mut position = vec![0usize; count];
    for (pos, idx) in order.iter().enumerate() {
        position[*idx] = pos;
    }

    let mut broken_edges: Vec<(String, String)> = Vec::new();
    let mut forward_parents: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (to_idx, list) in parents.iter().enumerate() {
        for &from_idx in list {
            if position[from_idx] < position[to_idx] {
                forward_parents[to_idx].push(from_idx);
            } else {
                broken_edges.push((names[from_idx].to_string(), names[to_idx].to_string()));
            }
        }
    }
    broken_edges.sort_by_key(|(from, to)| (index[from.as_str()], index[to.as_str()]));

    let desired = |level: &[usize], idx: usize| {
        forward_parents[idx]
            .iter()
            .map(|parent| level[*parent] + 1)
            .max()
            .unwrap_or(0)
    };
    let cap = max_iterations.unwrap_or(count + 1).max(1);
    let mut level = vec![0usize; count];
    let mut converged = false;
    for _ in 0..cap {
        let mut changed = false;
        for &idx in &order {
            let wanted = desired(&level, idx);
            if wanted != level[idx] {
                level[idx] = wanted;
                changed = true;
            }
        }
        if !changed {
            converged = true;
            break;
        }
    }
    // The confirming check is not a relaxation round and does not count
    // against the cap.
    if !converged {
        converged = order.iter().all(|&idx| desired(&level, idx) == level[idx]);
    }

    let mut warnings = Vec::new();
    if !broken_edges.is_empty() || !converged {
        let warning = CycleWarning {
            broken_edges,
            iteration_cap_reached: !converged,
        };
        warn!(%warning, "level assignment used best-effort levels");
        warnings.push(warning);
    }

    let levels: BTreeMap<String, usize> = (0..count)
        .map(|idx| (names[idx].to_string(), level[idx]))
        .collect();
    debug!(
        entities = count,
        max_level = levels.values().copied().max().unwrap_or(0),
        "assigned levels"
    );

    LevelAssignment {
        levels,
        order: order.iter().map(|idx| names[*idx].to_string()).collect(),
        warnings,
    }
}

/// Orders the entities inside each level with median sweeps so that
/// connected entities line up and edge crossings drop. Ties keep
/// declaration order, which keeps the result deterministic.
pub fn order_levels(
    graph: &OwnershipGraph,
    levels: &LevelAssignment,
    passes: usize,
) -> Vec<Vec<String>> {
    let mut rank_nodes = levels.by_level(graph);
    if rank_nodes.len() <= 1 {
        return rank_nodes;
    }
    let node_order: HashMap<String, usize> = graph
        .entities
        .iter()
        .enumerate()
        .map(|(idx, e)| (e.name.clone(), idx))
        .collect();

    let mut incoming: HashMap<String, Vec<String>> = HashMap::new();
    let mut outgoing: HashMap<String, Vec<String>> = HashMap::new();
    for (from, to) in graph.parent_links() {
        outgoing
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        incoming
            .entry(to.to_string())
            .or_default()
            .push(from.to_string());
    }

    let mut positions: HashMap<String, usize> = HashMap::new();
    let update_positions = |rank_nodes: &mut [Vec<String>], positions: &mut HashMap<String, usize>| {
        positions.clear();
        for bucket in rank_nodes.iter() {
            for (idx, node_id) in bucket.iter().enumerate() {
                positions.insert(node_id.clone(), idx);
            }
        }
    };
    update_positions(&mut rank_nodes, &mut positions);

    let sort_bucket = |bucket: &mut Vec<String>,
                       neighbors: &HashMap<String, Vec<String>>,
                       positions: &HashMap<String, usize>| {
        let current: HashMap<String, usize> = bucket
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();
        bucket.sort_by(|a, b| {
            let a_score = median_position(a, neighbors, positions, &current);
            let b_score = median_position(b, neighbors, positions, &current);
            a_score
                .partial_cmp(&b_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| current.get(a).cmp(&current.get(b)))
                .then_with(|| node_order.get(a).cmp(&node_order.get(b)))
        });
    };

    for _ in 0..passes.max(1) {
        for rank in 1..rank_nodes.len() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            sort_bucket(&mut rank_nodes[rank], &incoming, &positions);
            update_positions(&mut rank_nodes, &mut positions);
        }
        for rank in (0..rank_nodes.len() - 1).rev() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            sort_bucket(&mut rank_nodes[rank], &outgoing, &positions);
            update_positions(&mut rank_nodes, &mut positions);
        }
    }
    rank_nodes
}

fn median_position(
    node_id: &str,
    neighbors: &HashMap<String, Vec<String>>,
    positions: &HashMap<String, usize>,
    current_positions: &HashMap<String, usize>,
) -> f32 {
    let fallback = *current_positions.get(node_id).unwrap_or(&0) as f32;
    let Some(list) = neighbors.get(node_id) else {
        return fallback;
    };
    let mut values: Vec<f32> = list
        .iter()
        .filter_map(|neighbor| positions.get(neighbor).map(|pos| *pos as f32))
        .collect();
    if values.is_empty() {
        return fallback;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) * 0.5
    }
}
