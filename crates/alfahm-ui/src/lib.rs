#![warn(missing_docs)]
//! # alfahm-ui
//!
//! ## Purpose
//! Defines the UI-facing runtime state model and the session-scoped result
//! hand-off for `alfahm`.
//!
//! ## Responsibilities
//! - Represent mode selection, camera and submission stage statuses, and the
//!   user-visible status line.
//! - Gate re-entrant triggers while a submission is outstanding.
//! - Store the normalized result for the results screen, read exactly once.
//!
//! ## Data flow
//! Orchestration events mutate [`UiState`]; a successful submission writes a
//! [`StoredResult`] into [`SessionResultStore`], which the results screen
//! `take`s.
//!
//! ## Ownership and lifetimes
//! `UiState` owns all string/status values to keep event handling free of
//! cross-component borrows. Stored results live only for the session.
//!
//! ## Error model
//! This crate favors explicit state over recoverable errors; invalid
//! combinations are prevented by guard methods.
//!
//! ## Security and privacy notes
//! UI state holds card references and status text, never image bytes.

use std::collections::HashMap;

use alfahm_core::PhotoMode;
use alfahm_predict_contract::{ContractError, StoredResult};

/// Session-storage key under which the results screen finds its input.
pub const RESULT_STORE_KEY: &str = "alfahm-winners";

/// Generic stage status used for the camera and submission flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Stage has not started.
    Idle,
    /// Stage is currently running.
    Running,
    /// Stage completed successfully.
    Healthy,
    /// Stage encountered a non-fatal error.
    Degraded,
}

/// Aggregate UI runtime state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    /// App version string sourced from the root `VERSION`.
    pub version: String,
    /// Active photo mode.
    pub mode: PhotoMode,
    /// Whether a submission is outstanding.
    pub submitting: bool,
    /// Camera pipeline stage status.
    pub camera: StageStatus,
    /// Submission stage status.
    pub submission: StageStatus,
    /// Human-readable status line.
    pub status_line: String,
}

impl UiState {
    /// Creates default UI state in 4-photo mode.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            mode: PhotoMode::Four,
            submitting: false,
            camera: StageStatus::Idle,
            submission: StageStatus::Idle,
            status_line: "Select 2 or 4 photos to begin".to_string(),
        }
    }

    /// Sets the active photo mode.
    pub fn set_mode(&mut self, mode: PhotoMode) {
        self.mode = mode;
    }

    /// Returns `true` when user triggers are allowed.
    ///
    /// All mutating controls are disabled while a submission is in flight;
    /// the user may only wait.
    pub fn can_interact(&self) -> bool {
        !self.submitting
    }

    /// Marks a submission as started.
    pub fn begin_submission(&mut self) {
        self.submitting = true;
        self.submission = StageStatus::Running;
        self.status_line = "Predicting...".to_string();
    }

    /// Marks the outstanding submission as succeeded.
    pub fn submission_succeeded(&mut self) {
        self.submitting = false;
        self.submission = StageStatus::Healthy;
        self.status_line = "Winners ready".to_string();
    }

    /// Marks the outstanding submission as failed with a user message.
    ///
    /// The only state a failure mutates is the submitting flag and the
    /// status line; slot contents and stored results stay untouched.
    pub fn submission_failed(&mut self, message: impl Into<String>) {
        self.submitting = false;
        self.submission = StageStatus::Degraded;
        self.status_line = format!("Prediction failed: {}", message.into());
    }
}

/// Session-scoped key-value store for the result hand-off.
///
/// Mirrors the one-page-to-the-next storage the reference UI uses: values
/// survive for the session, each successful submission overwrites the
/// previous entry, and the consumer takes the entry exactly once.
#[derive(Debug, Clone, Default)]
pub struct SessionResultStore {
    entries: HashMap<String, String>,
}

impl SessionResultStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value under a key, overwriting any previous entry.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Removes and returns the value under a key.
    pub fn take(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// Returns the value under a key without consuming it.
    pub fn peek(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

/// Writes a normalized result under [`RESULT_STORE_KEY`].
///
/// # Errors
/// Returns [`ContractError::Encode`] when serialization fails.
pub fn store_result(
    store: &mut SessionResultStore,
    result: &StoredResult,
) -> Result<(), ContractError> {
    store.put(RESULT_STORE_KEY, result.to_json()?);
    Ok(())
}

/// Consumes the stored result for the results screen.
///
/// Returns `None` when no submission succeeded yet or the entry was already
/// read.
pub fn take_result(store: &mut SessionResultStore) -> Option<StoredResult> {
    let raw = store.take(RESULT_STORE_KEY)?;
    StoredResult::from_json(&raw).ok()
}

#[cfg(test)]
mod tests {
    //! Unit tests for interaction gating and the result hand-off.

    use super::*;

    #[test]
    fn submission_disables_interaction_until_it_settles() {
        let mut state = UiState::new("v0.1.0");
        assert!(state.can_interact());

        state.begin_submission();
        assert!(!state.can_interact());

        state.submission_failed("Backend error");
        assert!(state.can_interact());
        assert_eq!(state.submission, StageStatus::Degraded);
    }

    #[test]
    fn stored_result_is_read_exactly_once() {
        let mut store = SessionResultStore::new();
        let result = StoredResult {
            winner1_card_url: Some("a".to_string()),
            winner2_card_url: Some("b".to_string()),
            count: 4,
        };

        store_result(&mut store, &result).expect("store should pass");
        assert_eq!(take_result(&mut store), Some(result));
        assert_eq!(take_result(&mut store), None);
    }

    #[test]
    fn newer_results_overwrite_older_ones() {
        let mut store = SessionResultStore::new();
        let first = StoredResult {
            winner1_card_url: Some("old".to_string()),
            winner2_card_url: None,
            count: 2,
        };
        let second = StoredResult {
            winner1_card_url: Some("new".to_string()),
            winner2_card_url: None,
            count: 2,
        };

        store_result(&mut store, &first).expect("store should pass");
        store_result(&mut store, &second).expect("store should pass");
        assert_eq!(take_result(&mut store), Some(second));
    }
}
