//! Aggregate figures for the overview cards.

use serde::Serialize;

use crate::model::SegmentDetails;

/// Totals and member-weighted means across all segments.
///
/// The averages are `None` when there are no members at all, so an empty
/// mapping never produces a NaN.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Overview {
    pub total_clients: u64,
    pub total_segments: usize,
    pub average_age: Option<f64>,
    pub average_consumption: Option<f64>,
}

/// Compute the overview figures for a set of segment details.
pub fn compute_overview(details: &SegmentDetails) -> Overview {
    let mut total_clients: u64 = 0;
    let mut weighted_age = 0.0;
    let mut weighted_consumption = 0.0;

    for segment in details.segments() {
        let size = segment.size as f64;
        total_clients += segment.size;
        weighted_age += segment.mean_values.age * size;
        weighted_consumption += segment.mean_values.montant_consommation * size;
    }

    let mean = |sum: f64| {
        if total_clients == 0 {
            None
        } else {
            Some(sum / total_clients as f64)
        }
    };

    Overview {
        total_clients,
        total_segments: details.len(),
        average_age: mean(weighted_age),
        average_consumption: mean(weighted_consumption),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
