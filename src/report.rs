//! Markdown segment reports built from one segment-details fetch.
//!
//! - **summary**: totals, distribution, dominant segment, opportunities
//! - **segments**: per-segment figures and offer, with recommendations
//! - **strategy**: per-segment marketing bullets and an action plan

use std::fmt::Write as _;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::controller::segment_label;
use crate::format::group_digits;
use crate::model::{Segment, SegmentDetails};

/// Reductions above this ratio mark a loyalty opportunity.
const LOYALTY_REDUCTION: f64 = 0.10;

/// Segments below this share (percent) need targeted actions.
const SMALL_SEGMENT_PCT: f64 = 10.0;

/// Segments above this share (percent) need resource planning.
const LARGE_SEGMENT_PCT: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Summary,
    Segments,
    Strategy,
}

impl ReportKind {
    pub fn from_str_opt(s: Option<&str>) -> Option<Self> {
        match s {
            None | Some("summary") => Some(Self::Summary),
            Some("segments") => Some(Self::Segments),
            Some("strategy") => Some(Self::Strategy),
            Some(_) => None,
        }
    }

    /// File name stem used when saving with a timestamp.
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Summary => "resume_executif",
            Self::Segments => "rapport_segmentation",
            Self::Strategy => "strategie_marketing",
        }
    }
}

/// Render a report of the given kind.
pub fn render(
    kind: ReportKind,
    details: &SegmentDetails,
    label_prefix: &str,
    generated: NaiveDateTime,
) -> String {
    match kind {
        ReportKind::Summary => executive_summary(details, label_prefix, generated),
        ReportKind::Segments => segment_report(details, label_prefix, generated),
        ReportKind::Strategy => marketing_strategy(details, label_prefix, generated),
    }
}

// ---------------------------------------------------------------------------
// Executive summary
// ---------------------------------------------------------------------------

pub fn executive_summary(details: &SegmentDetails, label_prefix: &str, generated: NaiveDateTime) -> String {
    let mut out = String::new();
    out.push_str("# Résumé Exécutif - Segmentation Clients\n\n");
    let _ = writeln!(out, "Date : {}\n", generated.format("%d/%m/%Y"));

    out.push_str("## Vue d'Ensemble\n\n");
    let _ = writeln!(out, "Nombre total de clients : {}\n", thousands(total_clients(details)));

    out.push_str("## Distribution des Segments\n\n");
    for (id, segment) in details.iter() {
        let _ = writeln!(out, "- {}: {:.1}%", segment_label(label_prefix, id), segment.percentage);
    }

    out.push_str("\n## Points Clés\n\n");
    if let Some((id, segment)) = dominant_segment(details) {
        let _ = writeln!(
            out,
            "- Segment dominant : {} ({:.1}%)",
            segment_label(label_prefix, id),
            segment.percentage
        );
    }

    out.push_str("\n## Opportunités\n\n");
    for (id, segment) in details.iter() {
        if segment.offer.reduction > LOYALTY_REDUCTION {
            let _ = writeln!(
                out,
                "- Potentiel de fidélisation important pour le segment {}",
                segment_label(label_prefix, id)
            );
        }
    }

    out.push_str("\n## Actions Recommandées\n\n");
    out.push_str("1. Développer des offres personnalisées par segment\n");
    out.push_str("2. Mettre en place un suivi des performances\n");
    out.push_str("3. Adapter les stratégies de communication\n");
    out
}

// ---------------------------------------------------------------------------
// Detailed segment report
// ---------------------------------------------------------------------------

pub fn segment_report(details: &SegmentDetails, label_prefix: &str, generated: NaiveDateTime) -> String {
    let mut out = String::new();
    out.push_str("# Rapport de Segmentation des Clients\n\n");
    let _ = writeln!(out, "Date de génération : {}\n", generated.format("%d/%m/%Y %H:%M"));

    out.push_str("## Résumé Général\n\n");
    let _ = writeln!(
        out,
        "Nombre total de clients analysés : {}\n",
        thousands(total_clients(details))
    );

    out.push_str("## Détails par Segment\n\n");
    for (id, segment) in details.iter() {
        let _ = writeln!(out, "### {}\n", segment_label(label_prefix, id));
        let _ = writeln!(
            out,
            "- Taille : {} clients ({:.1}%)",
            thousands(segment.size),
            segment.percentage
        );

        out.push_str("\nCaractéristiques principales :\n");
        write_mean_values(&mut out, segment);

        let offer = &segment.offer;
        out.push_str("\nOffre commerciale :\n");
        let _ = writeln!(out, "- Réduction : {:.0}%", offer.reduction * 100.0);
        if !offer.services_additionnels.is_empty() {
            let _ = writeln!(
                out,
                "- Services additionnels : {}",
                offer.services_additionnels.join(", ")
            );
        }
        let _ = writeln!(
            out,
            "- Support prioritaire : {}",
            if offer.priorite_support.unwrap_or(false) { "Oui" } else { "Non" }
        );
        out.push_str("\n---\n\n");
    }

    out.push_str("## Recommandations\n\n### Actions Prioritaires\n\n");
    for (id, segment) in details.iter() {
        let label = segment_label(label_prefix, id);
        if segment.percentage < SMALL_SEGMENT_PCT {
            let _ = writeln!(out, "- Développer des actions ciblées pour le segment {label}");
        }
        if segment.percentage > LARGE_SEGMENT_PCT {
            let _ = writeln!(out, "- Optimiser les ressources pour le segment {label}");
        }
    }

    out.push_str("\n### Stratégies Marketing\n\n");
    out.push_str("- Personnaliser les communications par segment\n");
    out.push_str("- Adapter les offres promotionnelles selon les profils\n");
    out.push_str("- Mettre en place un suivi des performances par segment\n");

    out.push_str("\n## Conclusion\n\n");
    out.push_str("Cette segmentation permet d'identifier clairement les différents profils de clients\n");
    out.push_str("et d'adapter les stratégies marketing en conséquence.\n");
    out
}

// ---------------------------------------------------------------------------
// Marketing strategy
// ---------------------------------------------------------------------------

pub fn marketing_strategy(details: &SegmentDetails, label_prefix: &str, generated: NaiveDateTime) -> String {
    let mut out = String::new();
    out.push_str("# Stratégie Marketing - Segmentation Clients\n\n");
    let _ = writeln!(out, "Date : {}\n", generated.format("%d/%m/%Y"));

    out.push_str("## Objectifs\n\n");
    out.push_str("- Augmenter la fidélisation des clients\n");
    out.push_str("- Optimiser les campagnes marketing\n");
    out.push_str("- Améliorer la satisfaction client\n");

    out.push_str("\n## Stratégies par Segment\n\n");
    for (id, segment) in details.iter() {
        let _ = writeln!(out, "### {}\n", segment_label(label_prefix, id));
        let _ = writeln!(out, "Taille : {:.1}% des clients\n", segment.percentage);

        out.push_str("Caractéristiques clés :\n");
        write_mean_values(&mut out, segment);

        out.push_str("\nStratégie :\n");
        for bullet in strategy_bullets(segment) {
            let _ = writeln!(out, "- {bullet}");
        }
        out.push_str("\n---\n\n");
    }

    out.push_str("## Plan d'Action\n\n### Court terme (1-3 mois)\n\n");
    out.push_str("1. Mettre en place les offres personnalisées\n");
    out.push_str("2. Adapter les communications par segment\n");
    out.push_str("3. Former l'équipe commerciale\n");
    out.push_str("\n### Moyen terme (3-6 mois)\n\n");
    out.push_str("1. Évaluer l'impact des actions\n");
    out.push_str("2. Ajuster les stratégies selon les résultats\n");
    out.push_str("3. Développer de nouveaux services\n");
    out.push_str("\n### Long terme (6-12 mois)\n\n");
    out.push_str("1. Optimiser la segmentation\n");
    out.push_str("2. Développer des partenariats stratégiques\n");
    out.push_str("3. Mettre en place un système de suivi automatisé\n");
    out
}

/// Strategy bullets derived from a segment's offer.
pub fn strategy_bullets(segment: &Segment) -> Vec<&'static str> {
    let mut bullets = Vec::new();
    if segment.offer.reduction > LOYALTY_REDUCTION {
        bullets.push("Focus sur la fidélisation via des offres exclusives");
    }
    if !segment.offer.services_additionnels.is_empty() {
        bullets.push("Promouvoir les services additionnels");
    }
    if segment.offer.priorite_support.unwrap_or(false) {
        bullets.push("Mettre en avant le support prioritaire");
    }
    bullets
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_mean_values(out: &mut String, segment: &Segment) {
    for (feature, value) in segment.mean_values.numeric() {
        let _ = writeln!(out, "- {feature}: {value:.2}");
    }
}

fn total_clients(details: &SegmentDetails) -> u64 {
    details.segments().map(|s| s.size).sum()
}

/// Largest segment by size; the first one wins ties.
fn dominant_segment(details: &SegmentDetails) -> Option<(&str, &Segment)> {
    let mut best: Option<(&str, &Segment)> = None;
    for (id, segment) in details.iter() {
        if best.is_none_or(|(_, b)| segment.size > b.size) {
            best = Some((id, segment));
        }
    }
    best
}

/// `1,234,567`
fn thousands(n: u64) -> String {
    group_digits(&n.to_string(), ',')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn generated() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn details() -> SegmentDetails {
        SegmentDetails::from_json(
            r#"{
            "0": {"size": 1200, "percentage": 60.0,
                  "mean_values": {"age": 35.457, "montant_consommation": 80.5},
                  "offer": {"reduction": 0.05, "services_additionnels": []}},
            "1": {"size": 650, "percentage": 32.5,
                  "mean_values": {"age": 52.0, "montant_consommation": 240.0, "anciennete": 7.25},
                  "offer": {"reduction": 0.2, "services_additionnels": ["Roaming", "Cloud"],
                            "priorite_support": true}},
            "2": {"size": 150, "percentage": 7.5,
                  "mean_values": {"age": 24.0, "montant_consommation": 30.0},
                  "offer": {"reduction": 0.15, "services_additionnels": ["Musique"]}}
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn summary_names_dominant_segment_and_opportunities() {
        let text = render(ReportKind::Summary, &details(), "Segment", generated());
        assert!(text.contains("Date : 14/03/2025"));
        assert!(text.contains("Nombre total de clients : 2,000"));
        assert!(text.contains("- Segment 1: 32.5%"));
        assert!(text.contains("Segment dominant : Segment 0 (60.0%)"));
        assert!(text.contains("fidélisation important pour le segment Segment 1"));
        assert!(text.contains("fidélisation important pour le segment Segment 2"));
        assert!(!text.contains("fidélisation important pour le segment Segment 0"));
    }

    #[test]
    fn segment_report_lists_values_and_recommendations() {
        let text = render(ReportKind::Segments, &details(), "Segment", generated());
        assert!(text.contains("Date de génération : 14/03/2025 09:30"));
        assert!(text.contains("- Taille : 1,200 clients (60.0%)"));
        assert!(text.contains("- age: 35.46"));
        assert!(text.contains("- anciennete: 7.25"));
        assert!(text.contains("- Réduction : 20%"));
        assert!(text.contains("- Services additionnels : Roaming, Cloud"));
        assert!(text.contains("- Support prioritaire : Oui"));
        assert!(text.contains("- Support prioritaire : Non"));
        assert!(text.contains("actions ciblées pour le segment Segment 2"));
        assert!(text.contains("Optimiser les ressources pour le segment Segment 0"));
        assert!(text.contains("Optimiser les ressources pour le segment Segment 1"));
    }

    #[test]
    fn strategy_bullets_follow_offer() {
        let details = details();
        assert!(strategy_bullets(details.get("0").unwrap()).is_empty());
        assert_eq!(strategy_bullets(details.get("1").unwrap()).len(), 3);
        assert_eq!(
            strategy_bullets(details.get("2").unwrap()),
            vec![
                "Focus sur la fidélisation via des offres exclusives",
                "Promouvoir les services additionnels"
            ]
        );

        let text = render(ReportKind::Strategy, &details, "Groupe", generated());
        assert!(text.contains("### Groupe 1"));
        assert!(text.contains("Taille : 7.5% des clients"));
    }

    #[test]
    fn empty_details_still_render() {
        let text = render(ReportKind::Summary, &SegmentDetails::new(), "Segment", generated());
        assert!(text.contains("Nombre total de clients : 0"));
        assert!(!text.contains("Segment dominant"));
    }

    #[test]
    fn dominant_prefers_first_on_tie() {
        let details = SegmentDetails::from_json(
            r#"{"b": {"size": 5, "percentage": 50, "mean_values": {"age": 1, "montant_consommation": 1},
                      "offer": {"reduction": 0, "services_additionnels": []}},
                "a": {"size": 5, "percentage": 50, "mean_values": {"age": 1, "montant_consommation": 1},
                      "offer": {"reduction": 0, "services_additionnels": []}}}"#,
        )
        .unwrap();
        assert_eq!(dominant_segment(&details).map(|(id, _)| id), Some("b"));
    }

    #[test]
    fn kind_parsing() {
        assert_eq!(ReportKind::from_str_opt(None), Some(ReportKind::Summary));
        assert_eq!(ReportKind::from_str_opt(Some("strategy")), Some(ReportKind::Strategy));
        assert_eq!(ReportKind::from_str_opt(Some("pdf")), None);
    }
}
