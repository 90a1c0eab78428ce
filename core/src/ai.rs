use serde::Deserialize;

use crate::*;

/// Handle for one outstanding AI level request.
///
/// Only the most recent ticket is honored; anything that replaces the
/// session in the meantime invalidates it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AiTicket(u64);

impl AiTicket {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// What the host has to send to the external generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AiRequest {
    pub ticket: AiTicket,
    pub prompt: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AiResponse {
    Wrapped { grid: Vec<Vec<i64>> },
    Bare(Vec<Vec<i64>>),
}

/// Instructions wrapped around the player's free-text description.
pub fn build_ai_prompt(details: &str) -> String {
    format!(
        "Create a 2D integer array representing a puzzle grid pattern (size 4x4 or 5x5). \
         Use integers 0 (empty), 1 (red), 2 (blue), 3 (green), 4 (yellow). \
         The pattern should loosely resemble: {}. \
         Answer with a JSON object of the form {{\"grid\": [[...], ...]}}.",
        details.trim()
    )
}

/// Parses and validates the generator's JSON answer.
///
/// Accepts `{"grid": [[...]]}` or a bare `[[...]]`. Shape and color errors
/// come back as the matching [`GameError`], unreadable text as
/// [`GeneratorError::InvalidResponse`].
pub fn parse_ai_response(text: &str) -> Result<TargetPattern> {
    let response: AiResponse = serde_json::from_str(text.trim())
        .map_err(|err| GeneratorError::InvalidResponse(err.to_string()))?;
    let rows = match response {
        AiResponse::Wrapped { grid } => grid,
        AiResponse::Bare(grid) => grid,
    };
    TargetPattern::from_rows(&rows)
}
