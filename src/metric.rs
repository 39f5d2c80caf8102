use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The supplier performance metrics that make up the feature columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    QualityScore,
    DeliveryReliability,
    CostEfficiency,
    CustomerSatisfaction,
    DefectRate,
    OnTimeDeliveryRate,
    ResponseTimeHours,
}

impl Metric {
    /// Every metric, in the canonical column order.
    pub const ALL: [Metric; 7] = [
        Metric::QualityScore,
        Metric::DeliveryReliability,
        Metric::CostEfficiency,
        Metric::CustomerSatisfaction,
        Metric::DefectRate,
        Metric::OnTimeDeliveryRate,
        Metric::ResponseTimeHours,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::QualityScore => "quality_score",
            Metric::DeliveryReliability => "delivery_reliability",
            Metric::CostEfficiency => "cost_efficiency",
            Metric::CustomerSatisfaction => "customer_satisfaction",
            Metric::DefectRate => "defect_rate",
            Metric::OnTimeDeliveryRate => "on_time_delivery_rate",
            Metric::ResponseTimeHours => "response_time_hours",
        }
    }

    /// Human readable name, for generated text.
    pub fn label(&self) -> &'static str {
        match self {
            Metric::QualityScore => "quality",
            Metric::DeliveryReliability => "delivery reliability",
            Metric::CostEfficiency => "cost efficiency",
            Metric::CustomerSatisfaction => "customer satisfaction",
            Metric::DefectRate => "defect rate",
            Metric::OnTimeDeliveryRate => "on-time delivery",
            Metric::ResponseTimeHours => "response time",
        }
    }

    /// Whether lower values of this metric indicate better performance.
    pub fn is_inverse(&self) -> bool {
        matches!(self, Metric::DefectRate | Metric::ResponseTimeHours)
    }

    /// Orients a standardised value so that higher always means better.
    pub(crate) fn orient(&self, value: f64) -> f64 {
        if self.is_inverse() {
            -value
        } else {
            value
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
