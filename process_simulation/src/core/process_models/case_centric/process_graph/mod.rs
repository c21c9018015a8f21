//! Process graphs (activities, events, exclusive and parallel gateways)
pub mod definition;
/// Process graph struct with gateway direction resolution
pub mod process_graph_struct;

#[doc(inline)]
pub use definition::ProcessGraphDefinition;
#[doc(inline)]
pub use process_graph_struct::{
    ArcId, GatewayDirection, Node, NodeId, NodeKind, ProcessGraph, ProcessGraphError,
};
