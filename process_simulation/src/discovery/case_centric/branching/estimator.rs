//! Estimate branching probabilities of diverging exclusive gateways from an event log
use std::collections::{BTreeMap, HashMap, HashSet};

use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::projection::{project_gateways, GatewayProjection};
use crate::core::{
    event_data::case_centric::EventLogActivityProjection,
    process_models::case_centric::process_graph::{ArcId, NodeId, NodeKind, ProcessGraph},
};

/// Probability per outgoing arc of a gateway
pub type ArcProbabilities = BTreeMap<ArcId, f64>;

/// Successor frequencies per encounter index
type EncounterFrequencies = BTreeMap<u32, HashMap<NodeId, u64>>;

#[derive(Debug, Clone, Default, PartialEq)]
///
/// Branching probabilities of diverging exclusive gateways
///
/// Rows are keyed by gateway, log-visible predecessor, and encounter index (starting at 1). The
/// encounter index counts how often the same predecessor led to the gateway within one case.
pub struct GatewayProbabilities {
    rows: HashMap<NodeId, HashMap<NodeId, BTreeMap<u32, ArcProbabilities>>>,
}

impl GatewayProbabilities {
    /// Probability row of a gateway for a predecessor and encounter index
    pub fn get(&self, gateway: NodeId, predecessor: NodeId, encounter: u32) -> Option<&ArcProbabilities> {
        self.rows.get(&gateway)?.get(&predecessor)?.get(&encounter)
    }

    /// Highest encounter index observed for a gateway and predecessor
    pub fn max_encounter(&self, gateway: NodeId, predecessor: NodeId) -> Option<u32> {
        self.rows
            .get(&gateway)?
            .get(&predecessor)?
            .keys()
            .next_back()
            .copied()
    }

    /// Iterate over all rows as `(gateway, predecessor, encounter, row)`
    pub fn rows(&self) -> impl Iterator<Item = (NodeId, NodeId, u32, &ArcProbabilities)> + '_ {
        self.rows.iter().flat_map(|(g, preds)| {
            preds.iter().flat_map(move |(p, encounters)| {
                encounters.iter().map(move |(e, row)| (*g, *p, *e, row))
            })
        })
    }

    /// Total number of rows
    pub fn len(&self) -> usize {
        self.rows().count()
    }

    /// `true` if there are no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    ///
    /// Set the row of a gateway for a predecessor and encounter index
    ///
    /// Rows are normally produced by [`estimate_gateway_probabilities`]. Inserting rows by hand
    /// is useful to simulate assumed branching behavior.
    pub fn insert(
        &mut self,
        gateway: NodeId,
        predecessor: NodeId,
        encounter: u32,
        row: ArcProbabilities,
    ) {
        self.rows
            .entry(gateway)
            .or_default()
            .entry(predecessor)
            .or_default()
            .insert(encounter, row);
    }

    ///
    /// Describe all rows using node ids of the graph
    ///
    /// Records are sorted by gateway, predecessor, and encounter. Arcs are named by the id of their
    /// target node.
    pub fn describe(&self, graph: &ProcessGraph) -> Vec<ProbabilityRecord> {
        let mut records: Vec<ProbabilityRecord> = self
            .rows()
            .map(|(g, p, encounter, row)| ProbabilityRecord {
                gateway: graph.node(g).id.clone(),
                predecessor: graph.node(p).id.clone(),
                encounter,
                arcs: row
                    .iter()
                    .map(|(arc, probability)| ArcProbability {
                        target: graph.node(graph.arc_target(*arc)).id.clone(),
                        probability: *probability,
                    })
                    .collect(),
            })
            .collect();
        records.sort_by(|a, b| {
            (&a.gateway, &a.predecessor, a.encounter).cmp(&(&b.gateway, &b.predecessor, b.encounter))
        });
        records
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
/// Serializable view of one row of [`GatewayProbabilities`]
pub struct ProbabilityRecord {
    /// Gateway id
    pub gateway: String,
    /// Predecessor id
    pub predecessor: String,
    /// Encounter index
    pub encounter: u32,
    /// Probability per outgoing arc
    pub arcs: Vec<ArcProbability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
/// Probability of an outgoing arc, named by its target node id
pub struct ArcProbability {
    /// Id of the arc target
    pub target: String,
    /// Probability of taking the arc
    pub probability: f64,
}

/// Successors of a gateway, split into tasks (with their activity index in the log) and end
struct SuccessorSplit {
    all: Vec<NodeId>,
    tasks: Vec<(NodeId, usize)>,
    end: Option<NodeId>,
}

impl SuccessorSplit {
    fn new(graph: &ProcessGraph, successors: Vec<NodeId>, log: &EventLogActivityProjection) -> Self {
        let mut tasks = Vec::new();
        let mut end = None;
        for s in &successors {
            let node = graph.node(*s);
            match node.kind {
                NodeKind::EndEvent => {
                    end = end.or(Some(*s));
                }
                _ => {
                    if let Some(act) = log.index_of(node.label()) {
                        tasks.push((*s, act));
                    }
                }
            }
        }
        Self {
            all: successors,
            tasks,
            end,
        }
    }

    /// Task successor occurring first in `acts` with its position (ties go to the earlier successor)
    fn first_in(&self, acts: &[usize]) -> Option<(usize, NodeId)> {
        self.tasks
            .iter()
            .filter_map(|(node, act)| acts.iter().position(|a| a == act).map(|pos| (pos, *node)))
            .min_by_key(|(pos, _)| *pos)
    }

    fn init_row(&self, frequencies: &mut EncounterFrequencies, encounter: u32) {
        let row = frequencies.entry(encounter).or_default();
        for (s, _) in &self.tasks {
            row.entry(*s).or_insert(0);
        }
        if let Some(end) = self.end {
            row.entry(end).or_insert(0);
        }
    }
}

fn credit(frequencies: &mut EncounterFrequencies, encounter: u32, successor: NodeId, count: u64) {
    *frequencies
        .entry(encounter)
        .or_default()
        .entry(successor)
        .or_insert(0) += count;
}

///
/// Attribute one suffix variant (starting at an occurrence of `predecessor`) to successors
///
/// Each pass looks at the remainder after the leading predecessor. An empty remainder means the
/// case ended right after the predecessor. Otherwise the leftmost task successor is credited, and
/// if the predecessor occurs again after it, the next pass starts there with the next encounter
/// index. A non-empty remainder without any task successor is credited to the end successor.
fn attribute_suffix(
    suffix: &[usize],
    count: u64,
    predecessor: usize,
    successors: &SuccessorSplit,
    frequencies: &mut EncounterFrequencies,
) {
    let mut rest = suffix.get(1..).unwrap_or_default();
    let mut encounter = 1;
    loop {
        successors.init_row(frequencies, encounter);
        if rest.is_empty() {
            if let Some(end) = successors.end {
                credit(frequencies, encounter, end, count);
            }
            return;
        }
        match successors.first_in(rest) {
            Some((pos, successor)) => {
                credit(frequencies, encounter, successor, count);
                // The successor itself is dropped before looking for the next predecessor occurrence
                let after = &rest[pos + 1..];
                match after.iter().position(|a| *a == predecessor) {
                    Some(next) => {
                        rest = &after[next + 1..];
                        encounter += 1;
                    }
                    None => return,
                }
            }
            None => {
                if let Some(end) = successors.end {
                    credit(frequencies, encounter, end, count);
                }
                return;
            }
        }
    }
}

/// Successor frequencies for one gateway predecessor
fn count_successor_frequencies(
    graph: &ProcessGraph,
    log: &EventLogActivityProjection,
    predecessor: NodeId,
    successors: &SuccessorSplit,
) -> EncounterFrequencies {
    let mut frequencies = EncounterFrequencies::new();
    let pred_node = graph.node(predecessor);
    match pred_node.kind {
        NodeKind::StartEvent => {
            // A case never ends at its first step: only task successors are credited
            let row = frequencies.entry(1).or_default();
            for s in &successors.all {
                row.entry(*s).or_insert(0);
            }
            for (variant, count) in &log.traces {
                if let Some((_, successor)) = successors.first_in(variant) {
                    credit(&mut frequencies, 1, successor, *count);
                }
            }
        }
        NodeKind::Activity => {
            if let Some(act) = log.index_of(pred_node.label()) {
                for (suffix, count) in log.suffix_variants(act) {
                    attribute_suffix(&suffix, count, act, successors, &mut frequencies);
                }
            }
        }
        _ => {}
    }
    frequencies
}

/// Normalize frequencies and map them onto the outgoing arcs of a gateway
fn arc_probabilities(
    frequencies: &HashMap<NodeId, u64>,
    projection: &GatewayProjection,
) -> ArcProbabilities {
    let total: u64 = frequencies.values().sum();
    let probability = |s: &NodeId| match (total, frequencies.get(s)) {
        (0, _) | (_, None) => 0.0,
        (_, Some(f)) => *f as f64 / total as f64,
    };
    projection
        .arc_successors
        .iter()
        .map(|(arc, successors)| (*arc, successors.iter().map(probability).sum::<f64>()))
        .collect()
}

fn estimate_for_gateway(
    graph: &ProcessGraph,
    log: &EventLogActivityProjection,
    gateway: NodeId,
    projection: &GatewayProjection,
) -> Vec<(NodeId, NodeId, u32, ArcProbabilities)> {
    let successors = SuccessorSplit::new(graph, projection.successors(), log);
    projection
        .predecessors
        .iter()
        .flat_map(|p| {
            count_successor_frequencies(graph, log, *p, &successors)
                .into_iter()
                .map(move |(encounter, freq)| {
                    (gateway, *p, encounter, arc_probabilities(&freq, projection))
                })
        })
        .collect()
}

///
/// Estimate [`GatewayProbabilities`] for all diverging exclusive gateways of a graph
///
/// Gateway directions must already be resolved
/// (see [`ProcessGraph::resolve_gateway_directions`]). `new_activities` are activity nodes absent
/// from the log (see [`ProcessGraph::new_activities`]). They are skipped when relating gateways
/// to the log.
///
/// For every predecessor, the suffixes of the log starting at that predecessor are matched
/// against the successors of the gateway. A row for a given encounter index holds
/// `frequency / total frequency` per successor, summed per arc. Rows without any observed
/// frequency are all zero.
pub fn estimate_gateway_probabilities(
    graph: &ProcessGraph,
    log: &EventLogActivityProjection,
    new_activities: &HashSet<NodeId>,
) -> GatewayProbabilities {
    let projections = project_gateways(graph, new_activities);
    let rows: Vec<_> = projections
        .par_iter()
        .flat_map_iter(|(g, projection)| estimate_for_gateway(graph, log, *g, projection))
        .collect();
    let mut ret = GatewayProbabilities::default();
    for (g, p, encounter, row) in rows {
        ret.insert(g, p, encounter, row);
    }
    ret
}
