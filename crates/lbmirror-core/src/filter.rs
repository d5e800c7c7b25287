//! Applicability filter.

use crate::model::ServiceObservation;

/// A service can be mirrored only when it publishes exactly one address; the
/// registry holds one address per entry.
pub fn is_applicable(observation: &ServiceObservation) -> bool {
    observation.single_address().is_some()
}
