//! View models returned to the front end.

use crate::pipeline::ComparisonOutcome;
use crate::storage::StoredDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Integral values drop the fractional part: `82`, not `82.0`.
pub fn format_score(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartBar {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonView {
    pub explanation: String,
    pub final_score_label: String,
    pub final_score: f64,
    pub chart: Vec<ChartBar>,
}

impl From<&ComparisonOutcome> for ComparisonView {
    fn from(outcome: &ComparisonOutcome) -> Self {
        let scores = &outcome.scores;
        Self {
            explanation: outcome.explanation.clone(),
            final_score_label: format!("Final Score: {}%", format_score(scores.final_score)),
            final_score: scores.final_score,
            chart: scores
                .categories()
                .into_iter()
                .map(|(label, value)| ChartBar {
                    label: label.to_string(),
                    value,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    User,
    TransferMaster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLine {
    pub speaker: Speaker,
    pub content: String,
}

impl ChatLine {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            content: content.into(),
        }
    }

    pub fn reply(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::TransferMaster,
            content: content.into(),
        }
    }

    /// `User: ...` or `TransferMaster: ...`
    #[cfg(test)]
    pub fn render(&self) -> String {
        let who = match self.speaker {
            Speaker::User => "User",
            Speaker::TransferMaster => "TransferMaster",
        };
        format!("{}: {}", who, self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub slot: String,
    pub file_name: String,
    pub size: u64,
    pub signed_url: String,
    pub expires_at: DateTime<Utc>,
}

impl UploadedDocument {
    pub fn new(slot: impl Into<String>, stored: &StoredDocument) -> Self {
        Self {
            slot: slot.into(),
            file_name: stored.original_name.clone(),
            size: stored.size,
            signed_url: stored.signed_url.clone(),
            expires_at: stored.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Transcript;
    use crate::scores::ScoreVector;

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(82.0), "82");
        assert_eq!(format_score(82.5), "82.5");
        assert_eq!(format_score(0.0), "0");
        assert_eq!(format_score(100.0), "100");
    }

    #[test]
    fn test_comparison_view_from_outcome() {
        let outcome = ComparisonOutcome {
            explanation: "Mostly equivalent.".into(),
            scores: ScoreVector::parse("[85, 90, 70, 82]").unwrap(),
            transcript: Transcript::default(),
        };
        let view = ComparisonView::from(&outcome);
        assert_eq!(view.final_score_label, "Final Score: 82%");
        assert_eq!(
            view.chart,
            vec![
                ChartBar {
                    label: "Credits".into(),
                    value: 85.0,
                },
                ChartBar {
                    label: "Topics Covered".into(),
                    value: 90.0,
                },
                ChartBar {
                    label: "Grading Criteria".into(),
                    value: 70.0,
                },
            ]
        );
    }

    #[test]
    fn test_chat_line_render() {
        assert_eq!(ChatLine::user("hi").render(), "User: hi");
        assert_eq!(ChatLine::reply("hello").render(), "TransferMaster: hello");
    }
}
