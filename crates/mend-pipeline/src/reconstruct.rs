//! Path reconstruction: partition the segment graph into loops and chains.
//!
//! The deduplicated segments form an undirected graph over cluster ids.
//! Edges live in the graph's flat edge list and a parallel `used` vector
//! records which have been walked, so every edge ends up in exactly one
//! [`Path`].
//!
//! # Walk
//!
//! 1. Seed a path with the lowest-index unused edge.
//! 2. Extend the tail, then the head. At each step, if the path already
//!    spans at least three nodes and an unused edge leads from the
//!    terminal back to the opposite end, take it and stop: the path is a
//!    [`PathKind::Loop`].
//! 3. Otherwise follow the unused incident edge with the lowest neighbor
//!    cluster id (ties broken by edge index), until the terminal has no
//!    unused edge left.
//! 4. A path whose ends never met is a [`PathKind::Chain`].
//!
//! Topology that cannot be closed always degrades to chains; the walk
//! never fails.

use std::collections::VecDeque;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::types::{CanonicalSegment, ClusterId};

/// Undirected graph over cluster ids. Node `i` is `ClusterId(i)`.
pub type SegmentGraph = UnGraph<(), ()>;

/// Whether a path closes on itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathKind {
    /// First node equals last node.
    Loop,
    /// First node differs from last node.
    Chain,
}

/// An ordered walk through the segment graph.
///
/// `nodes` lists every visited cluster in walk order. For a loop the first
/// node is repeated at the end, so a path always has `nodes.len() - 1`
/// edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    kind: PathKind,
    nodes: Vec<ClusterId>,
}

impl Path {
    /// Loop or chain.
    #[must_use]
    pub const fn kind(&self) -> PathKind {
        self.kind
    }

    /// Returns `true` for a closed loop.
    #[must_use]
    pub fn is_loop(&self) -> bool {
        self.kind == PathKind::Loop
    }

    /// Visited clusters in walk order.
    #[must_use]
    pub fn nodes(&self) -> &[ClusterId] {
        &self.nodes
    }

    /// Number of graph edges this path consumed.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }
}

/// Build the segment graph with `cluster_count` nodes and one edge per
/// segment, in segment order.
#[must_use]
pub fn build_graph(cluster_count: usize, segments: &[CanonicalSegment]) -> SegmentGraph {
    let mut graph = SegmentGraph::with_capacity(cluster_count, segments.len());
    for _ in 0..cluster_count {
        graph.add_node(());
    }
    for segment in segments {
        graph.add_edge(
            NodeIndex::new(segment.a.index()),
            NodeIndex::new(segment.b.index()),
            (),
        );
    }
    graph
}

/// Partition all segments into loops and chains.
///
/// `segments` should be deduplicated: with no parallel edges, any closed
/// path spans at least three distinct clusters.
///
/// # Panics
///
/// Panics if a segment references a cluster id `>= cluster_count`.
#[must_use]
pub fn reconstruct(cluster_count: usize, segments: &[CanonicalSegment]) -> Vec<Path> {
    let graph = build_graph(cluster_count, segments);
    walk_all(&graph)
}

/// Which end of a path is being extended.
#[derive(Debug, Clone, Copy)]
enum End {
    Head,
    Tail,
}

/// Walk every edge of `graph` exactly once.
fn walk_all(graph: &SegmentGraph) -> Vec<Path> {
    let mut used = vec![false; graph.edge_count()];
    let mut paths = Vec::new();

    for seed in graph.edge_indices() {
        if used[seed.index()] {
            continue;
        }
        let Some((a, b)) = graph.edge_endpoints(seed) else {
            continue;
        };
        used[seed.index()] = true;

        let mut nodes = VecDeque::from([a, b]);
        let closed =
            extend(graph, &mut used, &mut nodes, End::Tail) || extend(graph, &mut used, &mut nodes, End::Head);

        let kind = if closed { PathKind::Loop } else { PathKind::Chain };
        paths.push(Path {
            kind,
            nodes: nodes.into_iter().map(|n| ClusterId(n.index())).collect(),
        });
    }

    paths
}

/// Greedily extend one end of `nodes`. Returns `true` if the path closed.
fn extend(
    graph: &SegmentGraph,
    used: &mut [bool],
    nodes: &mut VecDeque<NodeIndex>,
    end: End,
) -> bool {
    loop {
        let (terminal, opposite) = match (nodes.front(), nodes.back(), end) {
            (Some(&head), Some(&tail), End::Tail) => (tail, head),
            (Some(&head), Some(&tail), End::Head) => (head, tail),
            _ => return false,
        };
        let can_close = nodes.len() >= 3;

        let candidates: Vec<(NodeIndex, EdgeIndex)> = graph
            .edges(terminal)
            .filter(|e| !used[e.id().index()])
            .map(|e| {
                let other = if e.source() == terminal {
                    e.target()
                } else {
                    e.source()
                };
                (other, e.id())
            })
            // Returning to the opposite end is only allowed as a closure.
            .filter(|&(other, _)| can_close || other != opposite)
            .collect();

        let closing = candidates.iter().find(|&&(other, _)| other == opposite);
        let next = closing.or_else(|| candidates.iter().min()).copied();

        let Some((other, edge)) = next else {
            return false;
        };
        used[edge.index()] = true;
        match end {
            End::Tail => nodes.push_back(other),
            End::Head => nodes.push_front(other),
        }
        if other == opposite {
            return true;
        }
    }
}
