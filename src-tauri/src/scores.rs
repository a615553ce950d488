//! Score vector produced by the formatter agent.
//!
//! The agent is told to answer with a bare list literal
//! `[credits, topics covered, grading criteria, final]`. The reply is parsed
//! strictly into named fields: anything other than four finite numbers in
//! 0..=100 is rejected.

use serde::{Deserialize, Serialize};

pub const CATEGORY_LABELS: [&str; 3] = ["Credits", "Topics Covered", "Grading Criteria"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreVector {
    pub credits: f64,
    pub topics_covered: f64,
    pub grading_criteria: f64,
    pub final_score: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoreError {
    #[error("Score list is not a bracketed list: {0:?}")]
    NotAList(String),
    #[error("Expected 4 scores, found {0}")]
    WrongArity(usize),
    #[error("Score {index} is not a number: {value:?}")]
    NotANumber { index: usize, value: String },
    #[error("Score {index} is out of range 0-100: {value}")]
    OutOfRange { index: usize, value: f64 },
}

impl ScoreVector {
    pub fn parse(raw: &str) -> Result<Self, ScoreError> {
        let body = strip_code_fence(raw.trim());
        let inner = body
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| ScoreError::NotAList(raw.to_string()))?;

        let mut items: Vec<&str> = inner.split(',').map(str::trim).collect();
        // A single trailing comma is valid list syntax.
        if items.len() > 1 && items.last() == Some(&"") {
            items.pop();
        }
        if items.len() == 1 && items[0].is_empty() {
            return Err(ScoreError::WrongArity(0));
        }
        if items.len() != 4 {
            return Err(ScoreError::WrongArity(items.len()));
        }

        let mut values = [0.0f64; 4];
        for (index, item) in items.iter().enumerate() {
            values[index] = parse_number(index, item)?;
        }

        Ok(Self {
            credits: values[0],
            topics_covered: values[1],
            grading_criteria: values[2],
            final_score: values[3],
        })
    }

    /// The three per-criterion scores, labelled, in display order.
    pub fn categories(&self) -> [(&'static str, f64); 3] {
        [
            (CATEGORY_LABELS[0], self.credits),
            (CATEGORY_LABELS[1], self.topics_covered),
            (CATEGORY_LABELS[2], self.grading_criteria),
        ]
    }

    pub fn as_array(&self) -> [f64; 4] {
        [
            self.credits,
            self.topics_covered,
            self.grading_criteria,
            self.final_score,
        ]
    }
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return s;
    };
    // Drop an optional language tag on the opening fence line.
    match rest.split_once('\n') {
        Some((tag, body)) if !tag.trim().starts_with('[') => body.trim(),
        _ => rest.trim(),
    }
}

fn parse_number(index: usize, item: &str) -> Result<f64, ScoreError> {
    let digits = item.strip_suffix('%').map(str::trim_end).unwrap_or(item);
    let not_a_number = || ScoreError::NotANumber {
        index,
        value: item.to_string(),
    };
    if digits.is_empty()
        || !digits
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return Err(not_a_number());
    }
    let value: f64 = digits.parse().map_err(|_| not_a_number())?;
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(ScoreError::OutOfRange { index, value });
    }
    Ok(value)
}
