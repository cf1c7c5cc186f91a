//! Shortest-path search over a stored network.
//!
//! The graph is never materialized: each expansion queries the store for
//! the current node's exits, and cost/heuristic callbacks may themselves
//! read attribute values from storage. A callback failure aborts the
//! search.
//!
//! Searches are not wrapped in a transaction; each read stands alone, so
//! a writer running concurrently with a search can be observed mid-batch.
//! Callers that mutate networks while routing need their own locking.

use crate::network::{Edge, Network};
use crate::result::{Error, Result};
use crate::GeoPackage;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A found path: every node identifier from start to end inclusive, and
/// the summed edge cost
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub nodes: Vec<i64>,
    pub total_cost: f64,
}

/// Indexed binary min-heap over (priority, node id).
///
/// The position map makes decrease-key a sift-up instead of the linear
/// remove-and-reinsert a library heap would force. Equal priorities break
/// ties toward the lower node id, which makes path selection among
/// equal-cost routes deterministic.
struct MinQueue {
    entries: Vec<(f64, i64)>,
    positions: HashMap<i64, usize>,
}

impl MinQueue {
    fn new() -> Self {
        MinQueue {
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    fn contains(&self, node: i64) -> bool {
        self.positions.contains_key(&node)
    }

    fn push(&mut self, node: i64, priority: f64) {
        self.entries.push((priority, node));
        let index = self.entries.len() - 1;
        self.positions.insert(node, index);
        self.sift_up(index);
    }

    fn pop(&mut self) -> Option<(i64, f64)> {
        if self.entries.is_empty() {
            return None;
        }

        let last = self.entries.len() - 1;
        self.entries.swap(0, last);
        let (priority, node) = self.entries.pop()?;
        self.positions.remove(&node);

        if !self.entries.is_empty() {
            self.positions.insert(self.entries[0].1, 0);
            self.sift_down(0);
        }

        Some((node, priority))
    }

    fn decrease(&mut self, node: i64, priority: f64) {
        if let Some(&index) = self.positions.get(&node) {
            self.entries[index].0 = priority;
            self.sift_up(index);
        }
    }

    fn less(&self, first: usize, second: usize) -> bool {
        match self.entries[first].0.total_cmp(&self.entries[second].0) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => self.entries[first].1 < self.entries[second].1,
        }
    }

    fn swap_entries(&mut self, first: usize, second: usize) {
        self.entries.swap(first, second);
        self.positions.insert(self.entries[first].1, first);
        self.positions.insert(self.entries[second].1, second);
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.less(index, parent) {
                self.swap_entries(index, parent);
                index = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut smallest = index;

            if left < self.entries.len() && self.less(left, smallest) {
                smallest = left;
            }
            if right < self.entries.len() && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == index {
                return;
            }

            self.swap_entries(index, smallest);
            index = smallest;
        }
    }
}

/// Search bookkeeping for one node: predecessor link, best known distance
/// from the start, and the heuristic estimate to the goal
struct SearchVertex {
    previous: Option<i64>,
    distance_from_start: f64,
    distance_to_end: f64,
}

fn reconstruct(vertices: &HashMap<i64, SearchVertex>, end: i64) -> Route {
    let mut nodes = Vec::new();
    let mut current = Some(end);
    while let Some(node) = current {
        nodes.push(node);
        current = vertices[&node].previous;
    }
    nodes.reverse();

    Route {
        nodes,
        total_cost: vertices[&end].distance_from_start,
    }
}

/// A* shortest path from `start` to `end`.
///
/// The closed set is never re-examined, which finds optimal paths only
/// under a consistent (admissible, monotone) heuristic; callers supply
/// one. The heuristic is re-evaluated whenever a vertex is reached or
/// improved, not cached across relaxations. An exhausted open set without
/// reaching the goal is [Error::NoPath], never an empty route.
pub fn astar<C, H>(
    gpkg: &GeoPackage,
    network: &Network,
    start: i64,
    end: i64,
    mut edge_cost: C,
    mut heuristic: H,
) -> Result<Route>
where
    C: FnMut(&Edge) -> Result<f64>,
    H: FnMut(i64, i64) -> Result<f64>,
{
    let mut vertices: HashMap<i64, SearchVertex> = HashMap::new();
    let mut open = MinQueue::new();
    let mut closed: HashSet<i64> = HashSet::new();
    let mut expanded = 0usize;

    let start_estimate = heuristic(start, end)?;
    vertices.insert(
        start,
        SearchVertex {
            previous: None,
            distance_from_start: 0.0,
            distance_to_end: start_estimate,
        },
    );
    open.push(start, start_estimate);

    while let Some((current, _)) = open.pop() {
        if current == end {
            debug!(expanded, "a* search reached the goal");
            return Ok(reconstruct(&vertices, end));
        }

        closed.insert(current);
        expanded += 1;

        let current_distance = vertices[&current].distance_from_start;

        for edge in gpkg.exits(network, current)? {
            let neighbor = edge.to;
            if closed.contains(&neighbor) {
                continue;
            }

            let tentative = current_distance + edge_cost(&edge)?;

            match vertices.get(&neighbor) {
                None => {
                    let estimate = heuristic(neighbor, end)?;
                    vertices.insert(
                        neighbor,
                        SearchVertex {
                            previous: Some(current),
                            distance_from_start: tentative,
                            distance_to_end: estimate,
                        },
                    );
                    open.push(neighbor, tentative + estimate);
                }
                Some(vertex) if tentative < vertex.distance_from_start => {
                    let estimate = heuristic(neighbor, end)?;
                    vertices.insert(
                        neighbor,
                        SearchVertex {
                            previous: Some(current),
                            distance_from_start: tentative,
                            distance_to_end: estimate,
                        },
                    );
                    if open.contains(neighbor) {
                        open.decrease(neighbor, tentative + estimate);
                    } else {
                        open.push(neighbor, tentative + estimate);
                    }
                }
                Some(_) => {}
            }
        }
    }

    Err(Error::NoPath { start, end })
}

/// Dijkstra shortest path from `start` to `end`.
///
/// Runs to open-set exhaustion rather than stopping at the goal, relying
/// on monotonic relaxation under non-negative edge costs; the path is
/// reconstructed afterwards. An unreachable goal is [Error::NoPath].
pub fn dijkstra<C>(
    gpkg: &GeoPackage,
    network: &Network,
    start: i64,
    end: i64,
    mut edge_cost: C,
) -> Result<Route>
where
    C: FnMut(&Edge) -> Result<f64>,
{
    let mut vertices: HashMap<i64, SearchVertex> = HashMap::new();
    let mut open = MinQueue::new();
    let mut expanded = 0usize;

    vertices.insert(
        start,
        SearchVertex {
            previous: None,
            distance_from_start: 0.0,
            distance_to_end: 0.0,
        },
    );
    open.push(start, 0.0);

    while let Some((current, _)) = open.pop() {
        expanded += 1;
        let current_distance = vertices[&current].distance_from_start;

        for edge in gpkg.exits(network, current)? {
            let neighbor = edge.to;
            let tentative = current_distance + edge_cost(&edge)?;

            match vertices.get(&neighbor) {
                None => {
                    vertices.insert(
                        neighbor,
                        SearchVertex {
                            previous: Some(current),
                            distance_from_start: tentative,
                            distance_to_end: 0.0,
                        },
                    );
                    open.push(neighbor, tentative);
                }
                Some(vertex) if tentative < vertex.distance_from_start => {
                    vertices.insert(
                        neighbor,
                        SearchVertex {
                            previous: Some(current),
                            distance_from_start: tentative,
                            distance_to_end: 0.0,
                        },
                    );
                    if open.contains(neighbor) {
                        open.decrease(neighbor, tentative);
                    } else {
                        open.push(neighbor, tentative);
                    }
                }
                Some(_) => {}
            }
        }
    }

    debug!(expanded, "dijkstra search exhausted the open set");

    if !vertices.contains_key(&end) {
        return Err(Error::NoPath { start, end });
    }

    Ok(reconstruct(&vertices, end))
}
