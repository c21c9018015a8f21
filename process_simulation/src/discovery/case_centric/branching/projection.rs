//! Log-visible neighbors of diverging exclusive gateways
//!
//! An event log only records real activities. To relate a gateway to the log, its structural
//! neighbors are projected onto the first real activity (or start/end event) on every path,
//! skipping gateways and synthetic activities that do not occur in the log.
use std::collections::{HashMap, HashSet};

use crate::core::process_models::case_centric::process_graph::{
    ArcId, GatewayDirection, NodeId, NodeKind, ProcessGraph,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    Backward,
    Forward,
}

impl Walk {
    fn arcs(self, graph: &ProcessGraph, node: NodeId) -> Vec<ArcId> {
        match self {
            Walk::Backward => graph.in_arcs(node),
            Walk::Forward => graph.out_arcs(node),
        }
    }

    fn next(self, graph: &ProcessGraph, arc: ArcId) -> NodeId {
        match self {
            Walk::Backward => graph.arc_source(arc),
            Walk::Forward => graph.arc_target(arc),
        }
    }

    /// Event kind that ends a walk in this direction
    fn terminal(self) -> NodeKind {
        match self {
            Walk::Backward => NodeKind::StartEvent,
            Walk::Forward => NodeKind::EndEvent,
        }
    }

    /// Parallel gateway direction that opens a parallel scope when met in this direction
    fn opening(self) -> GatewayDirection {
        match self {
            Walk::Backward => GatewayDirection::Converging,
            Walk::Forward => GatewayDirection::Diverging,
        }
    }
}

struct Walker<'a> {
    graph: &'a ProcessGraph,
    new_activities: &'a HashSet<NodeId>,
    walk: Walk,
    visited: HashSet<NodeId>,
}

impl Walker<'_> {
    /// Continue the walk past `node` along all of its arcs
    fn follow(&mut self, node: NodeId, parallel_opened: bool, found: &mut Vec<NodeId>) {
        if !self.visited.insert(node) {
            return;
        }
        for arc in self.walk.arcs(self.graph, node) {
            let next = self.walk.next(self.graph, arc);
            self.visit(next, parallel_opened, found);
        }
    }

    /// Handle a node reached by the walk
    fn visit(&mut self, node: NodeId, parallel_opened: bool, found: &mut Vec<NodeId>) {
        let n = self.graph.node(node);
        match n.kind {
            NodeKind::Activity => {
                if self.new_activities.contains(&node) {
                    self.follow(node, parallel_opened, found);
                } else {
                    found.push(node);
                }
            }
            kind if kind == self.walk.terminal() => found.push(node),
            NodeKind::StartEvent | NodeKind::EndEvent => {}
            NodeKind::ExclusiveGateway => self.follow(node, parallel_opened, found),
            NodeKind::ParallelGateway => {
                if n.direction == self.walk.opening() {
                    self.follow(node, true, found);
                } else if n.direction == GatewayDirection::Unspecified {
                    self.follow(node, parallel_opened, found);
                } else if !parallel_opened {
                    self.follow(node, false, found);
                }
                // Otherwise this is the pair of an already opened parallel scope: the branch ends.
            }
        }
    }
}

fn dedup_in_order(nodes: Vec<NodeId>) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    nodes.into_iter().filter(|n| seen.insert(*n)).collect()
}

///
/// Log-visible predecessors of a gateway
///
/// Walks backward along incoming arcs through exclusive gateways, parallel gateways, and synthetic
/// activities (`new_activities`). It collects the first real activity or start event on each path.
///
/// Walking backward into a converging parallel gateway opens a parallel scope. When a branch of an
/// opened scope reaches a diverging parallel gateway (the paired fork), that branch stops. Activities
/// before the fork belong to the enclosing scope and are reached through the branch of the gateway
/// itself.
pub fn predecessors(
    graph: &ProcessGraph,
    gateway: NodeId,
    new_activities: &HashSet<NodeId>,
) -> Vec<NodeId> {
    let mut walker = Walker {
        graph,
        new_activities,
        walk: Walk::Backward,
        visited: HashSet::new(),
    };
    let mut found = Vec::new();
    walker.follow(gateway, false, &mut found);
    dedup_in_order(found)
}

///
/// Log-visible successors of a gateway, per outgoing arc
///
/// This is the forward dual of [`predecessors`]: for every outgoing arc, the first real activity
/// or end event on each path starting with that arc. A node visited through an earlier arc is
/// not visited again.
pub fn arc_successors(
    graph: &ProcessGraph,
    gateway: NodeId,
    new_activities: &HashSet<NodeId>,
) -> Vec<(ArcId, Vec<NodeId>)> {
    let mut walker = Walker {
        graph,
        new_activities,
        walk: Walk::Forward,
        visited: HashSet::from([gateway]),
    };
    graph
        .out_arcs(gateway)
        .into_iter()
        .map(|arc| {
            let mut found = Vec::new();
            walker.visit(graph.arc_target(arc), false, &mut found);
            (arc, dedup_in_order(found))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
/// Log-visible neighborhood of a diverging exclusive gateway
pub struct GatewayProjection {
    /// Real predecessor activities (or the start event)
    pub predecessors: Vec<NodeId>,
    /// Real successor activities (or end events) per outgoing arc
    pub arc_successors: Vec<(ArcId, Vec<NodeId>)>,
}

impl GatewayProjection {
    /// Distinct successors over all arcs
    pub fn successors(&self) -> Vec<NodeId> {
        dedup_in_order(
            self.arc_successors
                .iter()
                .flat_map(|(_, s)| s.iter().copied())
                .collect(),
        )
    }
}

///
/// Project all diverging exclusive gateways of a graph
///
/// Gateway directions must be resolved beforehand.
pub fn project_gateways(
    graph: &ProcessGraph,
    new_activities: &HashSet<NodeId>,
) -> HashMap<NodeId, GatewayProjection> {
    graph
        .diverging_exclusive_gateways()
        .into_iter()
        .map(|g| {
            (
                g,
                GatewayProjection {
                    predecessors: predecessors(graph, g, new_activities),
                    arc_successors: arc_successors(graph, g, new_activities),
                },
            )
        })
        .collect()
}
