//! Discrete-event replay of a process graph
//!
//! One run starts at the start event and follows the graph: tasks advance a logical clock,
//! diverging exclusive gateways sample an outgoing arc, parallel gateways fork and join
//! branches. Branches of a run share one clock and are interleaved through an event queue
//! ordered by time (first-in first-out for equal times).
use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap, HashSet},
};

use ordered_float::OrderedFloat;
use rand::{
    distr::{weighted::WeightedIndex, Distribution},
    Rng,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::{durations::DurationTable, SimulationError, SimulationOptions};
use crate::{
    core::process_models::case_centric::process_graph::{
        ArcId, GatewayDirection, NodeId, NodeKind, ProcessGraph,
    },
    discovery::case_centric::branching::{ArcProbabilities, GatewayProbabilities},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
/// Result of a single simulation run
pub struct SimulationRun {
    /// Elapsed time (hours) until the last branch of the run ended
    pub duration: f64,
    /// `duration` minus the duration of the first executed activity (at most `duration`)
    pub adjusted_duration: f64,
    /// Executed activities in order of completion
    pub trace: Vec<String>,
    /// Decisions and task executions of the run, if recording was enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_log: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Step {
    /// A branch reaches a node
    Arrive { node: NodeId, predecessor: NodeId },
    /// A task completes
    Finish { task: NodeId, predecessor: NodeId },
}

/// Mutable state of one run
///
/// Created fresh for every run, so nothing leaks from one run into the next.
struct RunContext {
    clock: f64,
    seq: u64,
    queue: BinaryHeap<Reverse<(OrderedFloat<f64>, u64, Step)>>,
    directions: HashMap<NodeId, GatewayDirection>,
    encounters: HashMap<NodeId, u32>,
    last_arc: HashMap<NodeId, ArcId>,
    /// First gateway met after the last encounter of each diverging gateway
    since_last: HashMap<NodeId, NodeId>,
    artificial: HashMap<NodeId, ArcProbabilities>,
    join_counters: HashMap<NodeId, usize>,
    trace: Vec<NodeId>,
    debug_log: Option<Vec<String>>,
}

impl RunContext {
    fn new(model: &SimulationModel, record_debug_log: bool) -> Self {
        let graph = &model.graph;
        let gateways: Vec<NodeId> = graph
            .nodes()
            .filter(|(_, n)| n.kind.is_gateway())
            .map(|(i, _)| i)
            .collect();
        Self {
            clock: 0.0,
            seq: 0,
            queue: BinaryHeap::new(),
            directions: gateways
                .iter()
                .map(|g| (*g, graph.node(*g).direction))
                .collect(),
            encounters: model.diverging_gateways.iter().map(|g| (*g, 0)).collect(),
            last_arc: HashMap::new(),
            since_last: HashMap::new(),
            artificial: model
                .diverging_gateways
                .iter()
                .map(|g| (*g, uniform(graph.out_arcs(*g))))
                .collect(),
            join_counters: gateways
                .iter()
                .filter(|g| graph.node(**g).kind == NodeKind::ParallelGateway)
                .map(|g| (*g, graph.in_degree(*g)))
                .collect(),
            trace: Vec::new(),
            debug_log: record_debug_log.then(Vec::new),
        }
    }

    fn schedule(&mut self, delay: f64, step: Step) {
        self.seq += 1;
        self.queue
            .push(Reverse((OrderedFloat(self.clock + delay), self.seq, step)));
    }

    fn log(&mut self, message: impl FnOnce() -> String) {
        if let Some(debug_log) = self.debug_log.as_mut() {
            debug_log.push(message());
        }
    }

    fn direction(&self, node: NodeId) -> GatewayDirection {
        self.directions
            .get(&node)
            .copied()
            .unwrap_or(GatewayDirection::Unspecified)
    }
}

/// Uniform distribution over the given arcs
fn uniform(arcs: impl IntoIterator<Item = ArcId>) -> ArcProbabilities {
    let arcs: Vec<ArcId> = arcs.into_iter().collect();
    let p = 1.0 / arcs.len().max(1) as f64;
    arcs.into_iter().map(|a| (a, p)).collect()
}

#[derive(Debug, Clone)]
///
/// A process graph prepared for simulation
///
/// Holds the graph (with resolved gateway directions), its branching probabilities, the duration
/// of every task, and the synthetic activities of the graph. The model is read-only during
/// simulation and can be shared between runs executed in parallel.
pub struct SimulationModel {
    graph: ProcessGraph,
    probabilities: GatewayProbabilities,
    task_durations: HashMap<NodeId, f64>,
    new_activities: HashSet<NodeId>,
    diverging_gateways: Vec<NodeId>,
    start: NodeId,
}

impl SimulationModel {
    ///
    /// Prepare a model for simulation
    ///
    /// Fails with [`SimulationError::MissingDuration`] if an activity of the graph has no
    /// duration, and with [`SimulationError::Graph`] if gateway directions can not be resolved or
    /// there is no unique start event.
    pub fn new(
        graph: &ProcessGraph,
        probabilities: GatewayProbabilities,
        durations: &DurationTable,
        new_activities: HashSet<NodeId>,
    ) -> Result<Self, SimulationError> {
        let mut graph = graph.clone();
        graph.resolve_gateway_directions()?;
        let start = graph.start_event()?;
        let task_durations = graph
            .nodes()
            .filter(|(_, n)| n.is_activity())
            .map(|(i, n)| {
                durations
                    .get(n.label())
                    .map(|d| (i, d))
                    .ok_or_else(|| SimulationError::MissingDuration(n.label().to_string()))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;
        let diverging_gateways = graph.diverging_exclusive_gateways();
        Ok(Self {
            graph,
            probabilities,
            task_durations,
            new_activities,
            diverging_gateways,
            start,
        })
    }

    /// The simulated graph
    pub fn graph(&self) -> &ProcessGraph {
        &self.graph
    }

    /// Branching probabilities used for exclusive decisions
    pub fn probabilities(&self) -> &GatewayProbabilities {
        &self.probabilities
    }

    fn task_duration(&self, task: NodeId) -> Result<f64, SimulationError> {
        self.task_durations
            .get(&task)
            .copied()
            .ok_or_else(|| SimulationError::MissingDuration(self.graph.node(task).label().to_string()))
    }

    fn first_target(&self, node: NodeId) -> Result<NodeId, SimulationError> {
        self.graph
            .out_arcs(node)
            .first()
            .map(|arc| self.graph.arc_target(*arc))
            .ok_or_else(|| SimulationError::NoOutgoingArc(self.graph.node(node).id.clone()))
    }

    ///
    /// Simulate a single run
    ///
    /// Randomness only enters through `rng`, so a seeded generator makes the run reproducible.
    pub fn simulate_run<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        options: &SimulationOptions,
    ) -> Result<SimulationRun, SimulationError> {
        let mut ctx = RunContext::new(self, options.record_debug_log);
        ctx.schedule(
            0.0,
            Step::Arrive {
                node: self.start,
                predecessor: self.start,
            },
        );
        let mut steps = 0;
        while let Some(Reverse((OrderedFloat(time), _, step))) = ctx.queue.pop() {
            steps += 1;
            if steps > options.max_steps_per_run {
                return Err(SimulationError::StepLimitExceeded {
                    limit: options.max_steps_per_run,
                });
            }
            ctx.clock = time;
            match step {
                Step::Arrive { node, predecessor } => self.arrive(&mut ctx, rng, node, predecessor)?,
                Step::Finish { task, predecessor } => self.finish(&mut ctx, task, predecessor)?,
            }
        }
        let duration = ctx.clock;
        let adjusted_duration = match ctx.trace.first() {
            Some(first) => duration - self.task_duration(*first)?.min(duration),
            None => duration,
        };
        Ok(SimulationRun {
            duration,
            adjusted_duration,
            trace: ctx
                .trace
                .iter()
                .map(|t| self.graph.node(*t).label().to_string())
                .collect(),
            debug_log: ctx.debug_log,
        })
    }

    fn arrive<R: Rng + ?Sized>(
        &self,
        ctx: &mut RunContext,
        rng: &mut R,
        node: NodeId,
        predecessor: NodeId,
    ) -> Result<(), SimulationError> {
        match self.graph.node(node).kind {
            NodeKind::StartEvent => {
                let next = self.first_target(node)?;
                ctx.schedule(0.0, Step::Arrive { node: next, predecessor });
            }
            NodeKind::EndEvent => {
                let clock = ctx.clock;
                ctx.log(|| format!("End of process reached at {clock}"));
            }
            NodeKind::Activity => self.start_task(ctx, node, predecessor)?,
            NodeKind::ExclusiveGateway => match ctx.direction(node) {
                GatewayDirection::Diverging => self.decide(ctx, rng, node, predecessor)?,
                _ => self.pass_merge(ctx, node, predecessor)?,
            },
            NodeKind::ParallelGateway => match ctx.direction(node) {
                GatewayDirection::Diverging => self.fork(ctx, node, predecessor),
                _ => self.join(ctx, node, predecessor)?,
            },
        }
        Ok(())
    }

    fn start_task(
        &self,
        ctx: &mut RunContext,
        task: NodeId,
        predecessor: NodeId,
    ) -> Result<(), SimulationError> {
        let duration = self.task_duration(task)?;
        let name = self.graph.node(task).label();
        trace!(task = name, time = ctx.clock, "task started");
        let clock = ctx.clock;
        ctx.log(|| format!("Task '{name}' started at {clock}"));
        ctx.schedule(duration, Step::Finish { task, predecessor });
        Ok(())
    }

    fn finish(
        &self,
        ctx: &mut RunContext,
        task: NodeId,
        predecessor: NodeId,
    ) -> Result<(), SimulationError> {
        let name = self.graph.node(task).label();
        trace!(task = name, time = ctx.clock, "task finished");
        let clock = ctx.clock;
        ctx.log(|| format!("Task '{name}' finished at {clock}"));
        ctx.trace.push(task);
        // Synthetic activities are invisible in the log, so they do not become predecessors
        let predecessor = if self.new_activities.contains(&task) {
            predecessor
        } else {
            task
        };
        let next = self.first_target(task)?;
        ctx.schedule(0.0, Step::Arrive { node: next, predecessor });
        Ok(())
    }

    /// Remember `gateway` as the first gateway since the last encounter of every diverging gateway
    /// already met, unless another one came first
    fn note_gateway(&self, ctx: &mut RunContext, gateway: NodeId) {
        for g in &self.diverging_gateways {
            if ctx.encounters.get(g).is_some_and(|e| *e >= 1) {
                ctx.since_last.entry(*g).or_insert(gateway);
            }
        }
    }

    fn pass_merge(
        &self,
        ctx: &mut RunContext,
        gateway: NodeId,
        predecessor: NodeId,
    ) -> Result<(), SimulationError> {
        self.note_gateway(ctx, gateway);
        let next = self.first_target(gateway)?;
        ctx.schedule(0.0, Step::Arrive { node: next, predecessor });
        Ok(())
    }

    fn decide<R: Rng + ?Sized>(
        &self,
        ctx: &mut RunContext,
        rng: &mut R,
        gateway: NodeId,
        predecessor: NodeId,
    ) -> Result<(), SimulationError> {
        let encounter = {
            let e = ctx.encounters.entry(gateway).or_insert(0);
            *e += 1;
            *e
        };
        self.note_gateway(ctx, gateway);
        let since_last = ctx.since_last.remove(&gateway);

        let mut row = match self.probabilities.get(gateway, predecessor, encounter) {
            Some(row) => row.clone(),
            None => {
                let gateway_id = &self.graph.node(gateway).id;
                debug!(gateway = %gateway_id, encounter, "no observed probabilities, using fallback");
                ctx.log(|| format!("End of encounters for diverging gateway {gateway_id}"));
                self.fallback_row(ctx, gateway, since_last)
            }
        };
        if row.is_empty() {
            return Err(SimulationError::NoOutgoingArc(
                self.graph.node(gateway).id.clone(),
            ));
        }
        if row.values().all(|p| *p == 0.0) {
            warn!(
                gateway = %self.graph.node(gateway).id,
                predecessor = %self.graph.node(predecessor).id,
                encounter,
                "all branching probabilities are zero, using uniform distribution"
            );
            row = uniform(row.keys().copied());
        }

        let arcs: Vec<ArcId> = row.keys().copied().collect();
        let dist: WeightedIndex<f64> = WeightedIndex::new(row.values())
            .map_err(|e| SimulationError::Sampling(e.to_string()))?;
        let arc = arcs[dist.sample(rng)];
        ctx.last_arc.insert(gateway, arc);
        let next = self.graph.arc_target(arc);
        debug!(
            gateway = %self.graph.node(gateway).id,
            predecessor = %self.graph.node(predecessor).id,
            encounter,
            next = %self.graph.node(next).id,
            "exclusive decision"
        );
        ctx.log(|| {
            let probabilities: Vec<String> = row
                .iter()
                .map(|(a, p)| format!("{}: {p}", self.graph.node(self.graph.arc_target(*a)).id))
                .collect();
            format!(
                "Gateway '{}' after '{}' (encounter {encounter}) with probabilities [{}] decided for '{}'",
                self.graph.node(gateway).id,
                self.graph.node(predecessor).label(),
                probabilities.join(", "),
                self.graph.node(next).label()
            )
        });
        ctx.schedule(0.0, Step::Arrive { node: next, predecessor });
        Ok(())
    }

    ///
    /// Probability row once the log has no data for the current encounter
    ///
    /// The per-run artificial table starts uniform. If the arc taken last time led straight into a
    /// converging exclusive gateway (closing a loop), it is removed from the table for the rest of
    /// the run. Otherwise, the last arc is excluded for this decision only.
    fn fallback_row(
        &self,
        ctx: &mut RunContext,
        gateway: NodeId,
        since_last: Option<NodeId>,
    ) -> ArcProbabilities {
        let Some(last_arc) = ctx.last_arc.get(&gateway).copied() else {
            return ctx.artificial.get(&gateway).cloned().unwrap_or_default();
        };
        let loops_back = since_last.is_some_and(|g| {
            self.graph.node(g).kind == NodeKind::ExclusiveGateway
                && ctx.direction(g) == GatewayDirection::Converging
        });
        let gateway_id = &self.graph.node(gateway).id;
        let table = ctx.artificial.entry(gateway).or_default();
        if table.len() <= 1 || !table.contains_key(&last_arc) {
            return table.clone();
        }
        if loops_back {
            table.remove(&last_arc);
            *table = uniform(table.keys().copied());
            let remaining = table.len();
            debug!(gateway = %gateway_id, remaining, "permanent exclusion of loop arc");
            let row = table.clone();
            ctx.log(|| format!("Permanent exclusion of arc leading to loop, {remaining} arcs remain"));
            row
        } else {
            let remaining = table.len() - 1;
            let p = 1.0 / remaining as f64;
            let row: ArcProbabilities = table
                .keys()
                .map(|a| (*a, if *a == last_arc { 0.0 } else { p }))
                .collect();
            debug!(gateway = %gateway_id, remaining, "temporary exclusion of last arc");
            ctx.log(|| format!("Temporary exclusion of last arc, {remaining} arcs remain"));
            row
        }
    }

    fn fork(&self, ctx: &mut RunContext, gateway: NodeId, predecessor: NodeId) {
        trace!(gateway = %self.graph.node(gateway).id, time = ctx.clock, "parallel fork");
        ctx.log(|| "Parallelity started".to_string());
        for arc in self.graph.out_arcs(gateway) {
            let node = self.graph.arc_target(arc);
            ctx.schedule(0.0, Step::Arrive { node, predecessor });
        }
        // A gateway that also joins branches acts as a join the next time it is reached
        if self.graph.in_degree(gateway) > 1 {
            ctx.directions.insert(gateway, GatewayDirection::Converging);
        }
    }

    fn join(
        &self,
        ctx: &mut RunContext,
        gateway: NodeId,
        predecessor: NodeId,
    ) -> Result<(), SimulationError> {
        let in_degree = self.graph.in_degree(gateway);
        let counter = ctx.join_counters.entry(gateway).or_insert(in_degree);
        *counter = counter.saturating_sub(1);
        if *counter > 0 {
            return Ok(());
        }
        *counter = in_degree;
        trace!(gateway = %self.graph.node(gateway).id, time = ctx.clock, "parallel join");
        ctx.log(|| "Parallelity ended".to_string());
        match self.graph.out_degree(gateway) {
            0 => {
                return Err(SimulationError::NoOutgoingArc(
                    self.graph.node(gateway).id.clone(),
                ))
            }
            1 => {
                let next = self.first_target(gateway)?;
                ctx.schedule(0.0, Step::Arrive { node: next, predecessor });
            }
            _ => {
                ctx.directions.insert(gateway, GatewayDirection::Diverging);
                ctx.schedule(
                    0.0,
                    Step::Arrive {
                        node: gateway,
                        predecessor,
                    },
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::core::process_models::case_centric::process_graph::GatewayDirection::*;

    fn durations(entries: &[(&str, f64)]) -> DurationTable {
        let mut table = DurationTable::new();
        for (a, d) in entries {
            table.insert(*a, *d).unwrap();
        }
        table
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn sequence_accumulates_durations() {
        let mut g = ProcessGraph::new();
        let s = g.add_start_event("start").unwrap();
        let a = g.add_activity("a", "A").unwrap();
        let b = g.add_activity("b", "B").unwrap();
        let e = g.add_end_event("end").unwrap();
        g.add_arc(s, a);
        g.add_arc(a, b);
        g.add_arc(b, e);
        let model = SimulationModel::new(
            &g,
            GatewayProbabilities::default(),
            &durations(&[("A", 2.0), ("B", 0.5)]),
            HashSet::new(),
        )
        .unwrap();
        let run = model
            .simulate_run(&mut rng(), &SimulationOptions::default())
            .unwrap();
        assert_eq!(run.trace, vec!["A", "B"]);
        assert_eq!(run.duration, 2.5);
        assert_eq!(run.adjusted_duration, 0.5);
        assert!(run.debug_log.is_none());
    }

    #[test]
    fn missing_duration_is_an_error() {
        let mut g = ProcessGraph::new();
        let s = g.add_start_event("start").unwrap();
        let a = g.add_activity("a", "A").unwrap();
        let e = g.add_end_event("end").unwrap();
        g.add_arc(s, a);
        g.add_arc(a, e);
        let res = SimulationModel::new(
            &g,
            GatewayProbabilities::default(),
            &DurationTable::new(),
            HashSet::new(),
        );
        assert!(matches!(res, Err(SimulationError::MissingDuration(a)) if a == "A"));
    }

    #[test]
    fn parallel_branches_share_the_clock() {
        // start -> fork -> (A: 3h, B: 1h) -> join -> C: 1h -> end
        let mut g = ProcessGraph::new();
        let s = g.add_start_event("start").unwrap();
        let fork = g.add_parallel_gateway("fork", Unspecified).unwrap();
        let a = g.add_activity("a", "A").unwrap();
        let b = g.add_activity("b", "B").unwrap();
        let join = g.add_parallel_gateway("join", Unspecified).unwrap();
        let c = g.add_activity("c", "C").unwrap();
        let e = g.add_end_event("end").unwrap();
        g.add_arc(s, fork);
        g.add_arc(fork, a);
        g.add_arc(fork, b);
        g.add_arc(a, join);
        g.add_arc(b, join);
        g.add_arc(join, c);
        g.add_arc(c, e);
        let model = SimulationModel::new(
            &g,
            GatewayProbabilities::default(),
            &durations(&[("A", 3.0), ("B", 1.0), ("C", 1.0)]),
            HashSet::new(),
        )
        .unwrap();
        let options = SimulationOptions {
            record_debug_log: true,
            ..Default::default()
        };
        let run = model.simulate_run(&mut rng(), &options).unwrap();
        assert_eq!(run.trace, vec!["B", "A", "C"]);
        assert_eq!(run.duration, 4.0);
        assert_eq!(run.adjusted_duration, 3.0);
        let log = run.debug_log.unwrap();
        assert_eq!(log.iter().filter(|l| *l == "Parallelity ended").count(), 1);
        assert_eq!(log.last().unwrap(), "End of process reached at 4");
    }

    #[test]
    fn collapsed_join_and_fork() {
        // start -> fork -> (A, B) -> gw -> (C, D) -> join -> end, where gw joins and forks
        let mut g = ProcessGraph::new();
        let s = g.add_start_event("start").unwrap();
        let fork = g.add_parallel_gateway("fork", Diverging).unwrap();
        let a = g.add_activity("a", "A").unwrap();
        let b = g.add_activity("b", "B").unwrap();
        let gw = g.add_parallel_gateway("gw", Converging).unwrap();
        let c = g.add_activity("c", "C").unwrap();
        let d = g.add_activity("d", "D").unwrap();
        let join = g.add_parallel_gateway("join", Converging).unwrap();
        let e = g.add_end_event("end").unwrap();
        g.add_arc(s, fork);
        g.add_arc(fork, a);
        g.add_arc(fork, b);
        g.add_arc(a, gw);
        g.add_arc(b, gw);
        g.add_arc(gw, c);
        g.add_arc(gw, d);
        g.add_arc(c, join);
        g.add_arc(d, join);
        g.add_arc(join, e);
        let model = SimulationModel::new(
            &g,
            GatewayProbabilities::default(),
            &durations(&[("A", 1.0), ("B", 1.0), ("C", 1.0), ("D", 1.0)]),
            HashSet::new(),
        )
        .unwrap();
        let run = model
            .simulate_run(&mut rng(), &SimulationOptions::default())
            .unwrap();
        assert_eq!(run.trace, vec!["A", "B", "C", "D"]);
        assert_eq!(run.duration, 2.0);
    }

    #[test]
    fn exhausted_loop_is_left_through_fallback() {
        // start -> merge -> A -> x -> (merge | end), observed to loop exactly three times
        let mut g = ProcessGraph::new();
        let s = g.add_start_event("start").unwrap();
        let merge = g.add_exclusive_gateway("merge", Converging).unwrap();
        let a = g.add_activity("a", "A").unwrap();
        let x = g.add_exclusive_gateway("x", Diverging).unwrap();
        let e = g.add_end_event("end").unwrap();
        g.add_arc(s, merge);
        g.add_arc(merge, a);
        g.add_arc(a, x);
        let back = g.add_arc(x, merge);
        let out = g.add_arc(x, e);
        let mut probabilities = GatewayProbabilities::default();
        for encounter in 1..=3 {
            probabilities.insert(x, a, encounter, BTreeMap::from([(back, 1.0), (out, 0.0)]));
        }
        let model = SimulationModel::new(
            &g,
            probabilities,
            &durations(&[("A", 1.0)]),
            HashSet::new(),
        )
        .unwrap();
        let options = SimulationOptions {
            record_debug_log: true,
            ..Default::default()
        };
        for seed in 0..20 {
            let run = model
                .simulate_run(&mut StdRng::seed_from_u64(seed), &options)
                .unwrap();
            assert_eq!(run.trace, vec!["A"; 4]);
            let log = run.debug_log.unwrap();
            assert!(log
                .iter()
                .any(|l| l.starts_with("Permanent exclusion of arc leading to loop")));
        }
    }

    #[test]
    fn zero_row_becomes_uniform() {
        let mut g = ProcessGraph::new();
        let s = g.add_start_event("start").unwrap();
        let x = g.add_exclusive_gateway("x", Diverging).unwrap();
        let a = g.add_activity("a", "A").unwrap();
        let b = g.add_activity("b", "B").unwrap();
        let e = g.add_end_event("end").unwrap();
        g.add_arc(s, x);
        let xa = g.add_arc(x, a);
        let xb = g.add_arc(x, b);
        g.add_arc(a, e);
        g.add_arc(b, e);
        let mut probabilities = GatewayProbabilities::default();
        probabilities.insert(x, s, 1, BTreeMap::from([(xa, 0.0), (xb, 0.0)]));
        let model = SimulationModel::new(
            &g,
            probabilities,
            &durations(&[("A", 1.0), ("B", 1.0)]),
            HashSet::new(),
        )
        .unwrap();
        let mut rng = rng();
        let traces: HashSet<Vec<String>> = (0..200)
            .map(|_| {
                model
                    .simulate_run(&mut rng, &SimulationOptions::default())
                    .unwrap()
                    .trace
            })
            .collect();
        assert_eq!(traces.len(), 2);
    }

    #[test]
    fn arc_into_merge_is_removed_permanently() {
        // start -> x -> (A | B) -> merge -> C -> y -> (x | end); only the first pass is observed
        let mut g = ProcessGraph::new();
        let s = g.add_start_event("start").unwrap();
        let loop_in = g.add_exclusive_gateway("loop_in", Converging).unwrap();
        let x = g.add_exclusive_gateway("x", Diverging).unwrap();
        let a = g.add_activity("a", "A").unwrap();
        let b = g.add_activity("b", "B").unwrap();
        let merge = g.add_exclusive_gateway("merge", Converging).unwrap();
        let c = g.add_activity("c", "C").unwrap();
        let y = g.add_exclusive_gateway("y", Diverging).unwrap();
        let e = g.add_end_event("end").unwrap();
        g.add_arc(s, loop_in);
        g.add_arc(loop_in, x);
        let xa = g.add_arc(x, a);
        let xb = g.add_arc(x, b);
        g.add_arc(a, merge);
        g.add_arc(b, merge);
        g.add_arc(merge, c);
        g.add_arc(c, y);
        let again = g.add_arc(y, loop_in);
        let done = g.add_arc(y, e);
        let mut probabilities = GatewayProbabilities::default();
        probabilities.insert(x, s, 1, BTreeMap::from([(xa, 1.0), (xb, 0.0)]));
        probabilities.insert(y, c, 1, BTreeMap::from([(again, 1.0), (done, 0.0)]));
        probabilities.insert(y, c, 2, BTreeMap::from([(again, 0.0), (done, 1.0)]));
        let model = SimulationModel::new(
            &g,
            probabilities,
            &durations(&[("A", 1.0), ("B", 1.0), ("C", 1.0)]),
            HashSet::new(),
        )
        .unwrap();
        // The second decision at x comes from C (no data): the arc to A, which was followed by a
        // converging gateway, is removed, so B is taken.
        let run = model
            .simulate_run(&mut rng(), &SimulationOptions::default())
            .unwrap();
        assert_eq!(run.trace, vec!["A", "C", "B", "C"]);
    }

    #[test]
    fn temporary_exclusion_avoids_last_arc() {
        // start -> loop_in -> x -> (A | B) -> y -> (loop_in | end); y is not a converging gateway
        let mut g = ProcessGraph::new();
        let s = g.add_start_event("start").unwrap();
        let loop_in = g.add_exclusive_gateway("loop_in", Converging).unwrap();
        let x = g.add_exclusive_gateway("x", Diverging).unwrap();
        let a = g.add_activity("a", "A").unwrap();
        let b = g.add_activity("b", "B").unwrap();
        let y = g.add_exclusive_gateway("y", Diverging).unwrap();
        let e = g.add_end_event("end").unwrap();
        g.add_arc(s, loop_in);
        g.add_arc(loop_in, x);
        let xa = g.add_arc(x, a);
        let xb = g.add_arc(x, b);
        g.add_arc(a, y);
        g.add_arc(b, y);
        let again = g.add_arc(y, loop_in);
        let done = g.add_arc(y, e);
        let mut probabilities = GatewayProbabilities::default();
        probabilities.insert(x, s, 1, BTreeMap::from([(xa, 1.0), (xb, 0.0)]));
        probabilities.insert(y, a, 1, BTreeMap::from([(again, 1.0), (done, 0.0)]));
        probabilities.insert(y, b, 2, BTreeMap::from([(again, 0.0), (done, 1.0)]));
        let model = SimulationModel::new(
            &g,
            probabilities,
            &durations(&[("A", 1.0), ("B", 1.0)]),
            HashSet::new(),
        )
        .unwrap();
        let options = SimulationOptions {
            record_debug_log: true,
            ..Default::default()
        };
        let run = model.simulate_run(&mut rng(), &options).unwrap();
        assert_eq!(run.trace, vec!["A", "B"]);
        assert!(run
            .debug_log
            .unwrap()
            .iter()
            .any(|l| l == "Temporary exclusion of last arc, 1 arcs remain"));
    }

    #[test]
    fn step_limit_stops_endless_runs() {
        // A loop without an exit: every decision goes back
        let mut g = ProcessGraph::new();
        let s = g.add_start_event("start").unwrap();
        let merge = g.add_exclusive_gateway("merge", Converging).unwrap();
        let a = g.add_activity("a", "A").unwrap();
        let x = g.add_exclusive_gateway("x", Diverging).unwrap();
        let b = g.add_activity("b", "B").unwrap();
        g.add_arc(s, merge);
        g.add_arc(merge, a);
        g.add_arc(a, x);
        g.add_arc(x, merge);
        g.add_arc(x, b);
        g.add_arc(b, merge);
        let model = SimulationModel::new(
            &g,
            GatewayProbabilities::default(),
            &durations(&[("A", 0.0), ("B", 0.0)]),
            HashSet::new(),
        )
        .unwrap();
        let options = SimulationOptions {
            max_steps_per_run: 500,
            ..Default::default()
        };
        assert!(matches!(
            model.simulate_run(&mut rng(), &options),
            Err(SimulationError::StepLimitExceeded { limit: 500 })
        ));
    }

    #[test]
    fn only_first_gateway_since_last_encounter_is_kept() {
        // start -> merge -> A -> x -> (merge | y -> (B | end)), with B -> end
        let mut g = ProcessGraph::new();
        let s = g.add_start_event("start").unwrap();
        let merge = g.add_exclusive_gateway("merge", Converging).unwrap();
        let a = g.add_activity("a", "A").unwrap();
        let x = g.add_exclusive_gateway("x", Diverging).unwrap();
        let y = g.add_exclusive_gateway("y", Diverging).unwrap();
        let b = g.add_activity("b", "B").unwrap();
        let e = g.add_end_event("end").unwrap();
        g.add_arc(s, merge);
        g.add_arc(merge, a);
        g.add_arc(a, x);
        g.add_arc(x, merge);
        g.add_arc(x, y);
        g.add_arc(y, b);
        g.add_arc(y, e);
        g.add_arc(b, e);
        let model = SimulationModel::new(
            &g,
            GatewayProbabilities::default(),
            &durations(&[("A", 1.0), ("B", 1.0)]),
            HashSet::new(),
        )
        .unwrap();
        let mut ctx = RunContext::new(&model, false);
        model.note_gateway(&mut ctx, merge);
        assert!(ctx.since_last.is_empty());

        ctx.encounters.insert(x, 1);
        for _ in 0..100 {
            model.note_gateway(&mut ctx, merge);
            model.note_gateway(&mut ctx, y);
        }
        assert_eq!(ctx.since_last.len(), 1);
        assert_eq!(ctx.since_last[&x], merge);

        ctx.encounters.insert(y, 1);
        model.note_gateway(&mut ctx, y);
        assert_eq!(ctx.since_last[&x], merge);
        assert_eq!(ctx.since_last[&y], y);
    }
}
