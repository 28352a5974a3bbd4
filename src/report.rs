//! The application's view of a diagnosis: ranked conditions plus a severity
//! and advice derived from the top match.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::gateway::Prediction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
    Unknown,
}

// First match wins, so more serious keywords come first.
const SEVERITY_KEYWORDS: &[(&str, Severity)] = &[
    ("melanoma", Severity::Severe),
    ("carcinoma", Severity::Severe),
    ("cancer", Severity::Severe),
    ("malignant", Severity::Severe),
    ("cellulitis", Severity::Severe),
    ("psoriasis", Severity::Moderate),
    ("eczema", Severity::Moderate),
    ("dermatitis", Severity::Moderate),
    ("rosacea", Severity::Moderate),
    ("keratosis", Severity::Moderate),
    ("fungal", Severity::Moderate),
    ("acne", Severity::Mild),
    ("wart", Severity::Mild),
    ("mole", Severity::Mild),
    ("nevus", Severity::Mild),
    ("benign", Severity::Mild),
];

impl Severity {
    pub fn for_condition(name: &str) -> Self {
        let name = name.to_lowercase();
        SEVERITY_KEYWORDS
            .iter()
            .find(|(keyword, _)| name.contains(keyword))
            .map(|&(_, severity)| severity)
            .unwrap_or(Severity::Unknown)
    }

    pub fn recommendations(self) -> Vec<String> {
        let lines: &[&str] = match self {
            Severity::Severe => &[
                "Book an appointment with a dermatologist as soon as possible.",
                "Do not pick, scratch or try to remove the lesion.",
                "Note any change in size, colour or bleeding before your visit.",
            ],
            Severity::Moderate => &[
                "Consider seeing a dermatologist if it does not improve within two weeks.",
                "Keep the area clean and moisturised and avoid known irritants.",
            ],
            Severity::Mild => &[
                "Usually harmless; monitor the area for changes.",
                "Use gentle skin care and sun protection.",
            ],
            Severity::Unknown => &[
                "The result was inconclusive; a dermatologist can give a reliable assessment.",
            ],
        };
        lines.iter().map(|s| s.to_string()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisReport {
    pub id: String,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
    pub conditions: Vec<Prediction>,
    pub severity: Severity,
    pub recommendations: Vec<String>,
    /// Soft warning from the skin check, if any.
    pub warning: Option<String>,
}

impl DiagnosisReport {
    pub fn from_predictions(conditions: Vec<Prediction>, warning: Option<String>) -> Self {
        let severity = conditions
            .first()
            .map(|top| Severity::for_condition(&top.name))
            .unwrap_or(Severity::Unknown);
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at,
            conditions,
            severity,
            recommendations: severity.recommendations(),
            warning,
        }
    }

    pub fn top_condition(&self) -> Option<&Prediction> {
        self.conditions.first()
    }
}
