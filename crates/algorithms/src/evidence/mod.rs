//! Evidence combination
//!
//! Maps slope, HAND and distance-to-network through inflection curves and
//! fuses them into a likelihood surface in [0, 1].

mod combine;
mod curve;
mod distance;

pub use combine::{compute_likelihood, EvidenceComponents, EvidenceParams, FusionRule, FusionWeights, LikelihoodSurface};
pub use curve::InflectionCurve;
pub use distance::{distance_to_kind, distance_to_network, DistanceField};
