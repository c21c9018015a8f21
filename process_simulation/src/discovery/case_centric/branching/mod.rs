//! Branching probabilities of exclusive gateways
/// Branching probability estimation from log suffixes
pub mod estimator;
/// Log-visible predecessors and successors of gateways
pub mod projection;

#[doc(inline)]
pub use estimator::{estimate_gateway_probabilities, ArcProbabilities, GatewayProbabilities};
#[doc(inline)]
pub use projection::{project_gateways, GatewayProjection};
