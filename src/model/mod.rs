//! Typed records for the segmentation API payloads.
//!
//! Every endpoint gets an explicit boundary type. Payloads that do not match
//! these shapes are rejected at deserialization time instead of leaking
//! missing fields into the rendering code.
//!
//! - [`SegmentDetails`] — `GET /api/segment_details`, an ordered mapping of
//!   segment id to [`Segment`]
//! - [`ChartPayload`] — the three chart endpoints, opaque `data` + `layout`

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Segment records
// ---------------------------------------------------------------------------

/// Statistics for a single customer segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Number of customers in the segment.
    pub size: u64,
    /// Share of the whole customer base, 0–100.
    pub percentage: f64,
    pub mean_values: MeanValues,
    pub offer: Offer,
}

/// Per-segment averages of numeric customer attributes.
///
/// `age` and `montant_consommation` are required; any other attribute the
/// backend sends is kept in `other` for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanValues {
    pub age: f64,
    pub montant_consommation: f64,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl MeanValues {
    /// All numeric attributes, required ones first, then the rest by name.
    pub fn numeric(&self) -> Vec<(&str, f64)> {
        let mut values = vec![
            ("age", self.age),
            ("montant_consommation", self.montant_consommation),
        ];
        values.extend(
            self.other
                .iter()
                .filter_map(|(k, v)| v.as_f64().map(|n| (k.as_str(), n))),
        );
        values
    }
}

/// Promotional package attached to a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    /// Discount ratio, 0–1.
    pub reduction: f64,
    pub services_additionnels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priorite_support: Option<bool>,
}

// ---------------------------------------------------------------------------
// SegmentDetails
// ---------------------------------------------------------------------------

/// Ordered mapping from segment id to [`Segment`].
///
/// Iteration follows the key order of the JSON object as received. A key that
/// appears twice keeps its first position and its last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentDetails {
    entries: Vec<(String, Segment)>,
}

impl SegmentDetails {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON body into segment details.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Insert or replace a segment. Replacement keeps the original position.
    pub fn insert(&mut self, id: impl Into<String>, segment: Segment) {
        let id = id.into();
        match self.entries.iter_mut().find(|(k, _)| *k == id) {
            Some(slot) => slot.1 = segment,
            None => self.entries.push((id, segment)),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Segment> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Segment)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.entries.iter().map(|(_, s)| s)
    }
}

impl FromIterator<(String, Segment)> for SegmentDetails {
    fn from_iter<I: IntoIterator<Item = (String, Segment)>>(iter: I) -> Self {
        let mut details = Self::new();
        for (id, segment) in iter {
            details.insert(id, segment);
        }
        details
    }
}

impl<'de> Deserialize<'de> for SegmentDetails {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DetailsVisitor;

        impl<'de> Visitor<'de> for DetailsVisitor {
            type Value = SegmentDetails;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of segment id to segment statistics")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut details = SegmentDetails::new();
                while let Some((id, segment)) = map.next_entry::<String, Segment>()? {
                    details.insert(id, segment);
                }
                Ok(details)
            }
        }

        deserializer.deserialize_map(DetailsVisitor)
    }
}

impl Serialize for SegmentDetails {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, segment) in &self.entries {
            map.serialize_entry(id, segment)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

/// Opaque chart description handed to the chart renderer untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    /// Series descriptions (Plotly traces).
    pub data: Vec<Value>,
    #[serde(default)]
    pub layout: Map<String, Value>,
}

impl ChartPayload {
    /// Best-effort title from `layout.title`, either a plain string or
    /// `{ "text": ... }`.
    pub fn title(&self) -> Option<&str> {
        match self.layout.get("title")? {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => obj.get("text").and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn trace_count(&self) -> usize {
        self.data.len()
    }
}

/// The three charts shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    ClusterDistribution,
    FeatureImportance,
    ClusterProfiles,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [
        ChartKind::ClusterDistribution,
        ChartKind::FeatureImportance,
        ChartKind::ClusterProfiles,
    ];

    /// Id of the display region the chart is drawn into.
    pub fn region(self) -> &'static str {
        match self {
            Self::ClusterDistribution => "cluster-distribution",
            Self::FeatureImportance => "feature-importance",
            Self::ClusterProfiles => "cluster-profiles",
        }
    }

    /// Heading shown above the chart.
    pub fn heading(self) -> &'static str {
        match self {
            Self::ClusterDistribution => "Distribution des Segments",
            Self::FeatureImportance => "Distribution des Features par Segment",
            Self::ClusterProfiles => "Profils des Segments",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClusterDistribution => write!(f, "cluster_distribution"),
            Self::FeatureImportance => write!(f, "feature_importance"),
            Self::ClusterProfiles => write!(f, "cluster_profiles"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
