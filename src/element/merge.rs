//! Merge policy for duplicate element contributions
//!
//! When the same element name occurs in several rows (typically because the
//! archive was produced by merging several input archives), every occurrence
//! after the first is combined into the existing element:
//!
//! | Kind                      | Rule                                          |
//! |---------------------------|-----------------------------------------------|
//! | extendable histograms     | rebinning-aware combine                       |
//! | fixed histograms          | bin-wise add if every axis matches exactly    |
//! | `EventInfo/processedEvents` | sum                                         |
//! | `EventInfo/iEvent`, `EventInfo/iLumiSection` | maximum                    |
//! | other ints, floats, strings | first value wins                            |

use crate::element::histogram::Histogram;
use crate::element::kind::{BinStorage, TypeTag};
use crate::element::types::{MonitorElement, Payload};
use thiserror::Error;

/// Why a histogram contribution could not be combined
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeError {
    /// Fixed-binning histograms with different bin counts or axis limits
    #[error("histograms have different axis limits")]
    AxisMismatch,

    /// Different dimensionality or profile/non-profile contributions
    #[error("histogram shapes differ")]
    ShapeMismatch,

    /// Extendable axes that cannot be grown to a common binning
    #[error("extendable axes have incompatible binning")]
    IncompatibleBinning,

    #[error("element of kind {existing} cannot absorb a {incoming} contribution")]
    KindMismatch { existing: TypeTag, incoming: TypeTag },
}

/// Result of combining one contribution into an existing element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Content changed (or was considered) according to the kind's rule
    Merged,
    /// Contribution intentionally dropped
    Ignored,
    /// Contribution dropped because it is incompatible; element unchanged
    Failed(MergeError),
}

/// Combine `incoming` into `element` following the kind's merge rule
pub fn merge_into(element: &mut MonitorElement, incoming: Payload) -> MergeOutcome {
    let existing_kind = element.kind();
    let incoming_kind = incoming.type_tag();
    let name = element.full_name();

    match (element.payload_mut(), incoming) {
        (Payload::Int(existing), Payload::Int(value)) => merge_int(&name, existing, value),
        (Payload::Float(_), Payload::Float(_)) => MergeOutcome::Ignored,
        (Payload::String(_), Payload::String(_)) => MergeOutcome::Ignored,
        (Payload::TH1F(a), Payload::TH1F(b))
        | (Payload::TH1S(a), Payload::TH1S(b))
        | (Payload::TH1D(a), Payload::TH1D(b))
        | (Payload::TH2F(a), Payload::TH2F(b))
        | (Payload::TH2S(a), Payload::TH2S(b))
        | (Payload::TH2D(a), Payload::TH2D(b))
        | (Payload::TH3F(a), Payload::TH3F(b))
        | (Payload::TProfile(a), Payload::TProfile(b))
        | (Payload::TProfile2D(a), Payload::TProfile2D(b)) => {
            let storage = existing_kind.bin_storage().unwrap_or(BinStorage::F64);
            merge_histogram(a, &b, storage)
        }
        _ => MergeOutcome::Failed(MergeError::KindMismatch {
            existing: existing_kind,
            incoming: incoming_kind,
        }),
    }
}

fn merge_int(name: &str, existing: &mut i64, value: i64) -> MergeOutcome {
    if name.contains("EventInfo/processedEvents") {
        *existing = existing.saturating_add(value);
        MergeOutcome::Merged
    } else if name.contains("EventInfo/iEvent") || name.contains("EventInfo/iLumiSection") {
        *existing = (*existing).max(value);
        MergeOutcome::Merged
    } else {
        MergeOutcome::Ignored
    }
}

fn merge_histogram(existing: &mut Histogram, incoming: &Histogram, storage: BinStorage) -> MergeOutcome {
    let result = if existing.can_extend && incoming.can_extend {
        existing.merge_extendable(incoming)
    } else {
        existing.add(incoming)
    };

    match result {
        Ok(()) => {
            existing.normalize(storage);
            MergeOutcome::Merged
        }
        Err(e) => MergeOutcome::Failed(e),
    }
}
