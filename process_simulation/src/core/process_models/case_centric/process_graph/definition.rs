//! JSON interchange format of [`ProcessGraph`]s
use std::{fs::File, io::BufReader, path::Path};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::process_graph_struct::{GatewayDirection, Node, NodeKind, ProcessGraph, ProcessGraphError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
/// Node entry of a [`ProcessGraphDefinition`]
pub struct NodeDefinition {
    /// Unique identifier
    pub id: String,
    /// Kind of node
    pub kind: NodeKind,
    /// Name (activity name for activities)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Gateway direction, if known
    #[serde(default)]
    pub direction: GatewayDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
/// Arc entry of a [`ProcessGraphDefinition`], referring to nodes by id
pub struct ArcDefinition {
    /// Id of the source node
    pub source: String,
    /// Id of the target node
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
///
/// Serializable description of a [`ProcessGraph`]
///
/// This is the shape supplied by the graph preparation step (e.g., a converted BPMN model).
pub struct ProcessGraphDefinition {
    /// Nodes
    pub nodes: Vec<NodeDefinition>,
    /// Arcs
    pub arcs: Vec<ArcDefinition>,
}

impl TryFrom<ProcessGraphDefinition> for ProcessGraph {
    type Error = ProcessGraphError;

    fn try_from(value: ProcessGraphDefinition) -> Result<Self, Self::Error> {
        let mut graph = ProcessGraph::new();
        for n in value.nodes {
            let direction = if n.kind.is_gateway() {
                n.direction
            } else {
                GatewayDirection::Unspecified
            };
            graph.add_node(Node {
                id: n.id,
                name: n.name,
                kind: n.kind,
                direction,
            })?;
        }
        for arc in value.arcs {
            graph.add_arc_by_ids(&arc.source, &arc.target)?;
        }
        Ok(graph)
    }
}

impl From<&ProcessGraph> for ProcessGraphDefinition {
    fn from(graph: &ProcessGraph) -> Self {
        Self {
            nodes: graph
                .nodes()
                .map(|(_, n)| NodeDefinition {
                    id: n.id.clone(),
                    kind: n.kind,
                    name: n.name.clone(),
                    direction: n.direction,
                })
                .collect(),
            arcs: graph
                .arcs()
                .map(|arc| {
                    let (s, t) = graph.arc_endpoints(arc);
                    ArcDefinition {
                        source: graph.node(s).id.clone(),
                        target: graph.node(t).id.clone(),
                    }
                })
                .collect(),
        }
    }
}

impl ProcessGraph {
    ///
    /// Import a [`ProcessGraph`] from a JSON [`ProcessGraphDefinition`] byte slice
    ///
    pub fn import_json_slice(slice: &[u8]) -> Result<ProcessGraph, ProcessGraphError> {
        let definition: ProcessGraphDefinition = serde_json::from_slice(slice)?;
        definition.try_into()
    }

    ///
    /// Import a [`ProcessGraph`] from a JSON [`ProcessGraphDefinition`] file given by a filepath
    ///
    pub fn import_json_path<P: AsRef<Path>>(path: P) -> Result<ProcessGraph, ProcessGraphError> {
        let reader = BufReader::new(File::open(path)?);
        let definition: ProcessGraphDefinition = serde_json::from_reader(reader)?;
        definition.try_into()
    }

    /// Serialize to a JSON [`ProcessGraphDefinition`] string
    pub fn to_json(&self) -> Result<String, ProcessGraphError> {
        Ok(serde_json::to_string(&ProcessGraphDefinition::from(self))?)
    }
}
