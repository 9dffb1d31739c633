//! Propensity score types and the scoring response parser.
//!
//! The scoring endpoint answers with a loosely specified JSON document:
//!
//! ```text
//! {"header": {"ok": true},
//!  "scores": [{"product": "a", "score": 5, "score_type": 2},
//!             {"product": "b", "error_message": "x"}]}
//! ```
//!
//! [`parse_propensity_response`] never fails. Anything it cannot make sense
//! of becomes a [`PropensityScore`] with `header.ok == false`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error message used when the response has no usable header.
pub const NO_VALID_RESPONSE: &str = "No valid response";

/// `score_type` value the server uses for bucketed scores.
pub const BUCKETED_SCORE_TYPE: f64 = 2.0;

/// Typed result of a score query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropensityScore {
    pub header: ScoreHeader,
    pub body: ScoreBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreHeader {
    pub ok: bool,
}

/// Either the per-product scores or an error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreBody {
    Scores { scores: Vec<ScoreDetail> },
    Error { error: Option<String> },
}

/// Score, or the reason there is none, for one requested product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreDetail {
    Score { product: String, score: Score },
    Error { product: String, error: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub value: f64,
    pub bucketed: bool,
}

impl PropensityScore {
    pub fn success(scores: Vec<ScoreDetail>) -> Self {
        Self {
            header: ScoreHeader { ok: true },
            body: ScoreBody::Scores { scores },
        }
    }

    pub fn failure(error: Option<String>) -> Self {
        Self {
            header: ScoreHeader { ok: false },
            body: ScoreBody::Error { error },
        }
    }

    /// Failure result for a response that could not be interpreted at all.
    pub fn invalid() -> Self {
        Self::failure(Some(NO_VALID_RESPONSE.to_owned()))
    }

    pub fn scores(&self) -> Option<&[ScoreDetail]> {
        match &self.body {
            ScoreBody::Scores { scores } => Some(scores),
            ScoreBody::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.body {
            ScoreBody::Error { error } => error.as_deref(),
            ScoreBody::Scores { .. } => None,
        }
    }
}

impl ScoreDetail {
    pub fn product(&self) -> &str {
        match self {
            ScoreDetail::Score { product, .. } | ScoreDetail::Error { product, .. } => product,
        }
    }
}

/// Convert a raw scoring response into a [`PropensityScore`].
///
/// Entries keep the order and count of the server's `scores` array. An entry
/// carries a score only when its `score` field is a non-zero number or a
/// non-empty numeric string.
pub fn parse_propensity_response(response: &Value) -> PropensityScore {
    if !response.get("header").is_some_and(is_truthy) {
        return PropensityScore::invalid();
    }
    let ok = response
        .get("header")
        .and_then(|header| header.get("ok"))
        .is_some_and(is_truthy);
    if !ok {
        let error = response
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_owned);
        return PropensityScore::failure(error);
    }

    let Some(entries) = response.get("scores").and_then(Value::as_array) else {
        return PropensityScore::invalid();
    };

    let scores = entries.iter().map(parse_score_detail).collect();
    PropensityScore::success(scores)
}

fn parse_score_detail(entry: &Value) -> ScoreDetail {
    let product = match entry.get("product") {
        Some(Value::String(product)) => product.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let value = match entry.get("score") {
        Some(Value::Number(n)) => n.as_f64().filter(|value| *value != 0.0),
        // Any non-empty string is a present score, "0" included.
        Some(Value::String(s)) if !s.is_empty() => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|value| !value.is_nan());

    match value {
        Some(value) => ScoreDetail::Score {
            product,
            score: Score {
                value,
                bucketed: is_bucketed(entry.get("score_type")),
            },
        },
        None => ScoreDetail::Error {
            product,
            error: entry
                .get("error_message")
                .and_then(Value::as_str)
                .map(str::to_owned),
        },
    }
}

fn is_bucketed(score_type: Option<&Value>) -> bool {
    score_type.and_then(number) == Some(BUCKETED_SCORE_TYPE)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
