//! Lexical completion indicators
//!
//! Scores worker response text: positive indicators add weight,
//! negative indicators subtract, embedded code blocks add a little
//! more. The sum is clamped to [0, 1].

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::error::{DetectorError, Result};

/// Weight added per matched positive indicator.
pub const POSITIVE_WEIGHT: f64 = 0.4;

/// Weight subtracted per matched negative indicator.
pub const NEGATIVE_WEIGHT: f64 = 0.4;

/// Weight added per fenced code block in the response.
pub const CODE_BLOCK_WEIGHT: f64 = 0.15;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*```").expect("code fence pattern is valid"));

/// What the response text contributed and why.
#[derive(Debug, Clone)]
pub struct IndicatorScore {
    pub confidence: f64,
    pub matched: Vec<String>,
}

/// Matches configured indicator phrases, case-insensitively and on
/// word boundaries.
pub struct IndicatorMatcher {
    positive: Vec<(String, Regex)>,
    negative: Vec<(String, Regex)>,
}

impl IndicatorMatcher {
    pub fn new(positive: &[String], negative: &[String]) -> Result<Self> {
        Ok(Self {
            positive: compile_all(positive)?,
            negative: compile_all(negative)?,
        })
    }

    /// Score a (possibly partial) worker response.
    pub fn score(&self, response: &str) -> IndicatorScore {
        let mut confidence = 0.0f64;
        let mut matched = Vec::new();

        for (phrase, pattern) in &self.positive {
            if pattern.is_match(response) {
                confidence += POSITIVE_WEIGHT;
                matched.push(format!("response contains \"{phrase}\""));
            }
        }

        for (phrase, pattern) in &self.negative {
            if pattern.is_match(response) {
                confidence -= NEGATIVE_WEIGHT;
                matched.push(format!("response contains negative \"{phrase}\""));
            }
        }

        let code_blocks = count_code_blocks(response);
        if code_blocks > 0 {
            confidence += code_blocks as f64 * CODE_BLOCK_WEIGHT;
            matched.push(format!("{code_blocks} code block(s) in response"));
        }

        IndicatorScore {
            confidence: confidence.clamp(0.0, 1.0),
            matched,
        }
    }
}

fn compile_all(phrases: &[String]) -> Result<Vec<(String, Regex)>> {
    phrases
        .iter()
        .map(|phrase| {
            let pattern = format!(r"\b{}\b", regex::escape(phrase));
            RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map(|regex| (phrase.clone(), regex))
                .map_err(|source| DetectorError::IndicatorPattern {
                    pattern: phrase.clone(),
                    source,
                })
        })
        .collect()
}

/// Count fenced code blocks: two fence lines make one block.
fn count_code_blocks(response: &str) -> usize {
    CODE_FENCE.find_iter(response).count() / 2
}
