use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Stable identity of a node in a [`ProcessGraph`]
pub type NodeId = NodeIndex;
/// Stable identity of an arc in a [`ProcessGraph`]
pub type ArcId = EdgeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
/// Kind of a [`Node`] in a process graph
pub enum NodeKind {
    /// Task executed by the process (named by its activity)
    Activity,
    /// Start of the process
    StartEvent,
    /// End of the process
    EndEvent,
    /// Exclusive (XOR) gateway
    ExclusiveGateway,
    /// Parallel (AND) gateway
    ParallelGateway,
}

impl NodeKind {
    /// Returns `true` for exclusive and parallel gateways
    pub fn is_gateway(self) -> bool {
        matches!(self, NodeKind::ExclusiveGateway | NodeKind::ParallelGateway)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
/// Routing direction of a gateway
///
/// The direction is a plain state field: a parallel gateway that is both a join and a fork flips
/// between the two during simulation.
pub enum GatewayDirection {
    /// Splits the flow (more outgoing than incoming arcs)
    Diverging,
    /// Merges the flow (more incoming than outgoing arcs)
    Converging,
    /// Not given; inferred by [`ProcessGraph::resolve_gateway_directions`]
    #[default]
    Unspecified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Node of a [`ProcessGraph`]
pub struct Node {
    /// Unique identifier
    pub id: String,
    /// Human-readable name; for activities this is the activity name used in the event log
    pub name: Option<String>,
    /// Kind of node
    pub kind: NodeKind,
    /// Gateway direction (always [`GatewayDirection::Unspecified`] for non-gateways)
    pub direction: GatewayDirection,
}

impl Node {
    ///
    /// Label of the node: its name if present, otherwise its id
    ///
    /// For activities, this is the key into event logs and duration tables.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Returns `true` if the node is an activity
    pub fn is_activity(&self) -> bool {
        self.kind == NodeKind::Activity
    }
}

///
/// Error encountered while building or preparing a [`ProcessGraph`]
///
#[derive(Debug, thiserror::Error)]
pub enum ProcessGraphError {
    /// Gateway direction cannot be inferred because it has as many incoming as outgoing arcs
    #[error("direction of gateway `{gateway}` could not be determined ({arcs} incoming and outgoing arcs)")]
    AmbiguousGatewayDirection {
        /// Id of the gateway
        gateway: String,
        /// Number of incoming (= outgoing) arcs
        arcs: usize,
    },
    /// Referenced node does not exist
    #[error("unknown node `{0}`")]
    UnknownNode(String),
    /// Node id used twice
    #[error("duplicate node id `{0}`")]
    DuplicateNode(String),
    /// No start event in the graph
    #[error("process graph has no start event")]
    MissingStartEvent,
    /// More than one start event in the graph
    #[error("process graph has more than one start event")]
    MultipleStartEvents,
    /// JSON (de-)serialization error
    #[error("invalid process graph JSON: {0}")]
    JSON(#[from] serde_json::Error),
    /// IO error
    #[error("failed to read process graph: {0}")]
    IO(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
///
/// Process graph of activities, events and gateways connected by directed arcs
///
/// Nodes and arcs are stored in an arena ([`petgraph`] graph) and referred to by [`NodeId`] and
/// [`ArcId`]. Incoming and outgoing arcs are always reported in insertion order.
pub struct ProcessGraph {
    graph: DiGraph<Node, ()>,
    node_ids: HashMap<String, NodeId>,
}

impl ProcessGraph {
    /// Create a new, empty process graph
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// Add a node
    ///
    /// Fails if a node with the same id already exists.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, ProcessGraphError> {
        if self.node_ids.contains_key(&node.id) {
            return Err(ProcessGraphError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        let index = self.graph.add_node(node);
        self.node_ids.insert(id, index);
        Ok(index)
    }

    fn add_simple_node(
        &mut self,
        id: &str,
        name: Option<&str>,
        kind: NodeKind,
        direction: GatewayDirection,
    ) -> Result<NodeId, ProcessGraphError> {
        self.add_node(Node {
            id: id.to_string(),
            name: name.map(String::from),
            kind,
            direction,
        })
    }

    /// Add an activity with the given (log) name
    pub fn add_activity(&mut self, id: &str, name: &str) -> Result<NodeId, ProcessGraphError> {
        self.add_simple_node(id, Some(name), NodeKind::Activity, GatewayDirection::Unspecified)
    }

    /// Add a start event
    pub fn add_start_event(&mut self, id: &str) -> Result<NodeId, ProcessGraphError> {
        self.add_simple_node(id, None, NodeKind::StartEvent, GatewayDirection::Unspecified)
    }

    /// Add an end event
    pub fn add_end_event(&mut self, id: &str) -> Result<NodeId, ProcessGraphError> {
        self.add_simple_node(id, None, NodeKind::EndEvent, GatewayDirection::Unspecified)
    }

    /// Add an exclusive gateway
    pub fn add_exclusive_gateway(
        &mut self,
        id: &str,
        direction: GatewayDirection,
    ) -> Result<NodeId, ProcessGraphError> {
        self.add_simple_node(id, None, NodeKind::ExclusiveGateway, direction)
    }

    /// Add a parallel gateway
    pub fn add_parallel_gateway(
        &mut self,
        id: &str,
        direction: GatewayDirection,
    ) -> Result<NodeId, ProcessGraphError> {
        self.add_simple_node(id, None, NodeKind::ParallelGateway, direction)
    }

    /// Add an arc from `source` to `target`
    pub fn add_arc(&mut self, source: NodeId, target: NodeId) -> ArcId {
        self.graph.add_edge(source, target, ())
    }

    /// Add an arc between two nodes referred to by their ids
    pub fn add_arc_by_ids(&mut self, source: &str, target: &str) -> Result<ArcId, ProcessGraphError> {
        let s = self.node_index_or_err(source)?;
        let t = self.node_index_or_err(target)?;
        Ok(self.add_arc(s, t))
    }

    /// Look up a node by its id
    pub fn node_index(&self, id: &str) -> Option<NodeId> {
        self.node_ids.get(id).copied()
    }

    fn node_index_or_err(&self, id: &str) -> Result<NodeId, ProcessGraphError> {
        self.node_index(id)
            .ok_or_else(|| ProcessGraphError::UnknownNode(id.to_string()))
    }

    /// Get a node
    ///
    /// Panics if the [`NodeId`] does not belong to this graph.
    pub fn node(&self, node: NodeId) -> &Node {
        &self.graph[node]
    }

    /// All nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.graph
            .node_indices()
            .map(move |n| (n, &self.graph[n]))
    }

    /// All arcs in insertion order
    pub fn arcs(&self) -> impl Iterator<Item = ArcId> + '_ {
        self.graph.edge_indices()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of arcs
    pub fn arc_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn arcs_directed(&self, node: NodeId, dir: Direction) -> Vec<ArcId> {
        let mut arcs: Vec<ArcId> = self.graph.edges_directed(node, dir).map(|e| e.id()).collect();
        arcs.sort();
        arcs
    }

    /// Incoming arcs of a node
    pub fn in_arcs(&self, node: NodeId) -> Vec<ArcId> {
        self.arcs_directed(node, Direction::Incoming)
    }

    /// Outgoing arcs of a node
    pub fn out_arcs(&self, node: NodeId) -> Vec<ArcId> {
        self.arcs_directed(node, Direction::Outgoing)
    }

    /// Number of incoming arcs of a node
    pub fn in_degree(&self, node: NodeId) -> usize {
        self.graph.edges_directed(node, Direction::Incoming).count()
    }

    /// Number of outgoing arcs of a node
    pub fn out_degree(&self, node: NodeId) -> usize {
        self.graph.edges_directed(node, Direction::Outgoing).count()
    }

    /// Source and target of an arc
    pub fn arc_endpoints(&self, arc: ArcId) -> (NodeId, NodeId) {
        let edge = &self.graph.raw_edges()[arc.index()];
        (edge.source(), edge.target())
    }

    /// Source of an arc
    pub fn arc_source(&self, arc: ArcId) -> NodeId {
        self.arc_endpoints(arc).0
    }

    /// Target of an arc
    pub fn arc_target(&self, arc: ArcId) -> NodeId {
        self.arc_endpoints(arc).1
    }

    /// The unique start event
    pub fn start_event(&self) -> Result<NodeId, ProcessGraphError> {
        let mut starts = self
            .nodes()
            .filter(|(_, n)| n.kind == NodeKind::StartEvent)
            .map(|(i, _)| i);
        match (starts.next(), starts.next()) {
            (Some(start), None) => Ok(start),
            (None, _) => Err(ProcessGraphError::MissingStartEvent),
            (Some(_), Some(_)) => Err(ProcessGraphError::MultipleStartEvents),
        }
    }

    /// Distinct activity names in node order
    pub fn activity_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.nodes()
            .filter(|(_, n)| n.is_activity())
            .map(|(_, n)| n.label().to_string())
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    /// Exclusive gateways that are (currently) diverging, in node order
    pub fn diverging_exclusive_gateways(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, n)| {
                n.kind == NodeKind::ExclusiveGateway && n.direction == GatewayDirection::Diverging
            })
            .map(|(i, _)| i)
            .collect()
    }

    ///
    /// Assign a direction to every gateway whose direction is [`GatewayDirection::Unspecified`]
    ///
    /// More incoming than outgoing arcs makes a gateway converging. More outgoing than incoming
    /// arcs makes it diverging. Equal counts fail with
    /// [`ProcessGraphError::AmbiguousGatewayDirection`]; in that case no direction is changed.
    pub fn resolve_gateway_directions(&mut self) -> Result<(), ProcessGraphError> {
        let mut resolved = Vec::new();
        for (index, node) in self.nodes() {
            if !node.kind.is_gateway() || node.direction != GatewayDirection::Unspecified {
                continue;
            }
            let ins = self.in_degree(index);
            let outs = self.out_degree(index);
            let direction = match ins.cmp(&outs) {
                std::cmp::Ordering::Greater => GatewayDirection::Converging,
                std::cmp::Ordering::Less => GatewayDirection::Diverging,
                std::cmp::Ordering::Equal => {
                    return Err(ProcessGraphError::AmbiguousGatewayDirection {
                        gateway: node.id.clone(),
                        arcs: ins,
                    })
                }
            };
            resolved.push((index, direction));
        }
        for (index, direction) in resolved {
            self.graph[index].direction = direction;
        }
        Ok(())
    }

    ///
    /// Activities of the graph whose name does not occur in the given log activities
    ///
    /// These synthetic ("new") activities are skipped when relating gateways to log-visible
    /// activities.
    pub fn new_activities(&self, log_activities: &HashSet<String>) -> HashSet<NodeId> {
        self.nodes()
            .filter(|(_, n)| n.is_activity() && !log_activities.contains(n.label()))
            .map(|(i, _)| i)
            .collect()
    }
}
