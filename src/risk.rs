//! Risk scoring and dashboard aggregation over HIRAC entries.
//!
//! Everything here is pure: the same entries always give the same summary,
//! and an empty collection still yields every KPI card and chart bucket.

use serde::{Deserialize, Serialize};

use crate::models::{
    hazard_entry::{HazardEntry, Rating},
    ImplementationStatus,
};

/// Highest total still classified as [`RiskTier::Low`].
pub const LOW_MAX: i32 = 6;
/// Highest total still classified as [`RiskTier::Medium`].
pub const MEDIUM_MAX: i32 = 12;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub const ALL: [RiskTier; 3] = [RiskTier::Low, RiskTier::Medium, RiskTier::High];

    pub fn classify(total: i32) -> Self {
        if total <= LOW_MAX {
            RiskTier::Low
        } else if total <= MEDIUM_MAX {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Medium => "Medium",
            RiskTier::High => "High",
        }
    }
}

pub fn risk_score(likelihood: Rating, severity: Rating) -> i32 {
    likelihood * severity
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct RiskAssessment {
    pub likelihood: Rating,
    pub severity: Rating,
    pub total: i32,
    pub tier: RiskTier,
}

impl RiskAssessment {
    pub fn new(likelihood: Rating, severity: Rating) -> Self {
        let total = risk_score(likelihood, severity);
        Self {
            likelihood,
            severity,
            total,
            tier: RiskTier::classify(total),
        }
    }
}

/// Chart label for a status. "For Implementation" shows as "Open".
pub fn status_label(status: ImplementationStatus) -> &'static str {
    match status {
        ImplementationStatus::ForImplementation => "Open",
        ImplementationStatus::Ongoing => "Ongoing",
        ImplementationStatus::Implemented => "Implemented",
    }
}

const STATUS_BUCKETS: [ImplementationStatus; 3] = [
    ImplementationStatus::ForImplementation,
    ImplementationStatus::Ongoing,
    ImplementationStatus::Implemented,
];

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct KpiSummary {
    pub total_hazards: usize,
    pub resolved: usize,
    pub open_issues: usize,
    pub high_risk_hazards: usize,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct KpiCard {
    pub title: String,
    pub value: String,
    pub description: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ChartBucket {
    pub name: String,
    pub count: usize,
}

impl ChartBucket {
    fn new(name: &str, count: usize) -> Self {
        Self {
            name: name.to_string(),
            count,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct DashboardData {
    pub summary: KpiSummary,
    pub kpis: Vec<KpiCard>,
    pub status_chart_data: Vec<ChartBucket>,
    pub risk_chart_data: Vec<ChartBucket>,
}

pub fn summarize(entries: &[HazardEntry]) -> KpiSummary {
    entries
        .iter()
        .fold(KpiSummary::default(), |mut summary, entry| {
            summary.total_hazards += 1;
            match entry.status {
                Some(ImplementationStatus::Implemented) => summary.resolved += 1,
                Some(ImplementationStatus::Ongoing)
                | Some(ImplementationStatus::ForImplementation) => summary.open_issues += 1,
                None => {}
            }
            if entry.initial_risk().tier == RiskTier::High {
                summary.high_risk_hazards += 1;
            }
            summary
        })
}

impl KpiSummary {
    /// Dashboard cards in display order.
    pub fn cards(&self) -> Vec<KpiCard> {
        let card = |title: &str, value: usize, description: &str| KpiCard {
            title: title.to_string(),
            value: value.to_string(),
            description: description.to_string(),
        };
        vec![
            card(
                "Total Hazards",
                self.total_hazards,
                "Hazards recorded in the register",
            ),
            card(
                "Open Issues",
                self.open_issues,
                "Controls ongoing or awaiting implementation",
            ),
            card("Resolved", self.resolved, "Controls implemented"),
            card(
                "High-Risk Hazards",
                self.high_risk_hazards,
                "Initial risk score above 12",
            ),
        ]
    }
}

/// Open, Ongoing, Implemented, always all three. Entries without a status
/// are left out.
pub fn status_chart(entries: &[HazardEntry]) -> Vec<ChartBucket> {
    STATUS_BUCKETS
        .iter()
        .map(|bucket| {
            let count = entries
                .iter()
                .filter(|entry| entry.status == Some(*bucket))
                .count();
            ChartBucket::new(status_label(*bucket), count)
        })
        .collect()
}

/// Low, Medium, High by initial risk, always all three.
pub fn risk_chart(entries: &[HazardEntry]) -> Vec<ChartBucket> {
    RiskTier::ALL
        .iter()
        .map(|tier| {
            let count = entries
                .iter()
                .filter(|entry| entry.initial_risk().tier == *tier)
                .count();
            ChartBucket::new(tier.as_str(), count)
        })
        .collect()
}

pub fn dashboard_data(entries: &[HazardEntry]) -> DashboardData {
    let summary = summarize(entries);
    DashboardData {
        summary,
        kpis: summary.cards(),
        status_chart_data: status_chart(entries),
        risk_chart_data: risk_chart(entries),
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::DateTime;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::hazard_entry::HazardClass;

    fn entry(
        _id: i64,
        likelihood: Rating,
        severity: Rating,
        status: Option<ImplementationStatus>,
    ) -> HazardEntry {
        HazardEntry {
            _id,
            department_id: 1,
            task: "Forklift loading".to_string(),
            hazard: "Unstable pallets".to_string(),
            photo_url: None,
            hazard_class: HazardClass::Physical,
            hazardous_event: "Load falls on a worker".to_string(),
            impact: "Crush injury".to_string(),
            initial_likelihood: likelihood,
            initial_severity: severity,
            residual_likelihood: 1,
            residual_severity: 1,
            status,
            created_at: DateTime::now(),
        }
    }

    fn buckets(pairs: &[(&str, usize)]) -> Vec<ChartBucket> {
        pairs
            .iter()
            .map(|(name, count)| ChartBucket::new(name, *count))
            .collect()
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(RiskTier::classify(1), RiskTier::Low);
        assert_eq!(RiskTier::classify(6), RiskTier::Low);
        assert_eq!(RiskTier::classify(7), RiskTier::Medium);
        assert_eq!(RiskTier::classify(12), RiskTier::Medium);
        assert_eq!(RiskTier::classify(13), RiskTier::High);
        assert_eq!(RiskTier::classify(25), RiskTier::High);
    }

    #[test]
    fn three_by_four_is_medium_not_high() {
        let assessment = RiskAssessment::new(3, 4);
        assert_eq!(assessment.total, 12);
        assert_eq!(assessment.tier, RiskTier::Medium);
        assert_eq!(summarize(&[entry(1, 3, 4, None)]).high_risk_hazards, 0);
    }

    #[test]
    fn empty_register_yields_zeroed_dashboard() {
        let data = dashboard_data(&[]);
        assert_eq!(data.summary, KpiSummary::default());
        assert_eq!(data.kpis.len(), 4);
        assert!(data.kpis.iter().all(|card| card.value == "0"));
        assert_eq!(
            data.status_chart_data,
            buckets(&[("Open", 0), ("Ongoing", 0), ("Implemented", 0)])
        );
        assert_eq!(
            data.risk_chart_data,
            buckets(&[("Low", 0), ("Medium", 0), ("High", 0)])
        );
    }

    #[test]
    fn status_scenario() {
        let entries = [
            entry(1, 1, 1, Some(ImplementationStatus::Ongoing)),
            entry(2, 1, 1, Some(ImplementationStatus::Implemented)),
            entry(3, 1, 1, Some(ImplementationStatus::ForImplementation)),
            entry(4, 1, 1, Some(ImplementationStatus::Implemented)),
        ];
        let data = dashboard_data(&entries);
        assert_eq!(data.summary.resolved, 2);
        assert_eq!(data.summary.open_issues, 2);
        assert_eq!(
            data.status_chart_data,
            buckets(&[("Open", 1), ("Ongoing", 1), ("Implemented", 2)])
        );
    }

    #[test]
    fn unset_status_counts_only_towards_total() {
        let entries = [
            entry(1, 5, 5, None),
            entry(2, 2, 2, Some(ImplementationStatus::Ongoing)),
        ];
        let summary = summarize(&entries);
        assert_eq!(summary.total_hazards, 2);
        assert_eq!(summary.open_issues, 1);
        assert_eq!(summary.resolved, 0);
        assert_eq!(summary.high_risk_hazards, 1);
        let status_total: usize = status_chart(&entries).iter().map(|b| b.count).sum();
        assert_eq!(status_total, 1);
    }

    #[test]
    fn risk_buckets_cover_every_entry() {
        let entries = [
            entry(1, 2, 3, None),
            entry(2, 1, 7, Some(ImplementationStatus::Ongoing)),
            entry(3, 3, 4, Some(ImplementationStatus::Implemented)),
            entry(4, 4, 4, Some(ImplementationStatus::ForImplementation)),
            entry(5, 5, 3, None),
        ];
        let chart = risk_chart(&entries);
        assert_eq!(chart, buckets(&[("Low", 1), ("Medium", 2), ("High", 2)]));
        let total: usize = chart.iter().map(|bucket| bucket.count).sum();
        assert_eq!(total, entries.len());

        let summary = summarize(&entries);
        assert!(summary.resolved + summary.open_issues <= summary.total_hazards);
    }

    #[test]
    fn residual_ratings_do_not_affect_buckets() {
        let mut high = entry(1, 5, 5, None);
        high.residual_likelihood = 1;
        high.residual_severity = 1;
        assert_eq!(high.residual_risk().tier, RiskTier::Low);
        assert_eq!(
            risk_chart(&[high]),
            buckets(&[("Low", 0), ("Medium", 0), ("High", 1)])
        );
    }

    #[test]
    fn kpi_cards_render_counts_in_order() {
        let summary = KpiSummary {
            total_hazards: 9,
            resolved: 4,
            open_issues: 3,
            high_risk_hazards: 2,
        };
        let cards: Vec<(String, String)> = summary
            .cards()
            .into_iter()
            .map(|card| (card.title, card.value))
            .collect();
        assert_eq!(
            cards,
            vec![
                ("Total Hazards".to_string(), "9".to_string()),
                ("Open Issues".to_string(), "3".to_string()),
                ("Resolved".to_string(), "4".to_string()),
                ("High-Risk Hazards".to_string(), "2".to_string()),
            ]
        );
    }
}
