#![warn(missing_docs)]
//! # alfahm-predict-contract
//!
//! ## Purpose
//! Defines the prediction-service response schema and the normalized result
//! shape handed to the presentation consumer.
//!
//! ## Responsibilities
//! - Parse prediction response payloads, tolerating the array-wrapped shape.
//! - Extract human-readable messages from error bodies.
//! - Normalize responses into the stored result tagged with the active mode.
//!
//! ## Data flow
//! Raw HTTP body -> [`parse_predict_response`] -> [`normalize_result`] ->
//! session result store -> results screen.
//!
//! ## Ownership and lifetimes
//! Parsed values are owned structs to avoid borrowing from transient network
//! buffers.
//!
//! ## Error model
//! Bodies that decode to no usable object return
//! [`ContractError::MalformedResponse`].
//!
//! ## Security and privacy notes
//! This crate handles only result-card references and scores; it never sees
//! image bytes.

use alfahm_core::PhotoMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One winner score, tolerated as either a JSON number or a string.
///
/// The reference deployment emits both shapes depending on the code path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    /// Numeric score.
    Number(f64),
    /// Stringified score.
    Text(String),
}

/// Parsed prediction response from the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Card image reference for the first winner.
    #[serde(default)]
    pub winner1_card_url: Option<String>,
    /// Card image reference for the second winner (4-photo mode only).
    #[serde(default)]
    pub winner2_card_url: Option<String>,
    /// Confidence score for the first winner.
    #[serde(default)]
    pub winner1_score: Option<Score>,
    /// Confidence score for the second winner.
    #[serde(default)]
    pub winner2_score: Option<Score>,
}

/// Normalized outcome of one submission, keyed for the results screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResult {
    /// First winner card reference; `null` when the backend returned none.
    pub winner1_card_url: Option<String>,
    /// Second winner card reference; always `null` in 2-photo mode.
    pub winner2_card_url: Option<String>,
    /// Photo count of the session that produced this result (2 or 4).
    pub count: u8,
}

impl StoredResult {
    /// Serializes the result to the stored JSON form.
    ///
    /// # Errors
    /// Returns [`ContractError::Encode`] when JSON serialization fails.
    pub fn to_json(&self) -> Result<String, ContractError> {
        serde_json::to_string(self).map_err(ContractError::Encode)
    }

    /// Deserializes a result from its stored JSON form.
    ///
    /// # Errors
    /// Returns [`ContractError::MalformedResponse`] for undecodable input.
    pub fn from_json(raw: &str) -> Result<Self, ContractError> {
        serde_json::from_str(raw).map_err(ContractError::MalformedResponse)
    }
}

/// Parses a success body into a prediction response.
///
/// Accepts a JSON object, an array whose first element is the object
/// (tolerated shape), or an empty array (a response with no winners).
/// Unknown fields are ignored for forward compatibility.
///
/// # Errors
/// Returns [`ContractError::MalformedResponse`] when the body is not JSON
/// or decodes to neither shape.
pub fn parse_predict_response(raw: &str) -> Result<PredictResponse, ContractError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(ContractError::MalformedResponse)?;

    let object = match value {
        serde_json::Value::Array(items) => match items.into_iter().next() {
            Some(first) => first,
            None => return Ok(PredictResponse::default()),
        },
        other => other,
    };

    serde_json::from_value(object).map_err(ContractError::MalformedResponse)
}

/// Extracts a human-readable message from an error body, if one exists.
///
/// Looks for the `error`, `detail`, and `message` string fields emitted by
/// the reference backend; `None` means the caller should fall back to a
/// generic failure message.
pub fn parse_error_message(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    for key in ["error", "detail", "message"] {
        if let Some(text) = value.get(key).and_then(serde_json::Value::as_str)
            && !text.trim().is_empty()
        {
            return Some(text.to_string());
        }
    }
    None
}

/// Normalizes a prediction response into the stored result for one mode.
///
/// 2-photo sessions have exactly one winner; any second card reference the
/// response carries is dropped rather than shown.
pub fn normalize_result(response: &PredictResponse, mode: PhotoMode) -> StoredResult {
    StoredResult {
        winner1_card_url: response.winner1_card_url.clone(),
        winner2_card_url: match mode {
            PhotoMode::Two => None,
            PhotoMode::Four => response.winner2_card_url.clone(),
        },
        count: mode.required_count() as u8,
    }
}

/// Prediction contract errors.
#[derive(Debug, Error)]
pub enum ContractError {
    /// Success status but an undecodable body.
    #[error("malformed prediction response: {0}")]
    MalformedResponse(#[source] serde_json::Error),
    /// Stored-result serialization failure.
    #[error("result encode failure: {0}")]
    Encode(#[source] serde_json::Error),
}
