#![warn(missing_docs)]
//! # alfahm-app
//!
//! ## Purpose
//! Orchestrates slots, capture, upload, and UI state for `alfahm`.
//!
//! ## Responsibilities
//! - Route picker and camera input into the slot board.
//! - Own the submission state machine and its mode-dependent strategy
//!   (local stub for 2 photos, real backend for 4).
//! - Map subsystem failures into user-facing messages.
//! - Provide env-var configuration and per-run file logging.
//!
//! ## Data flow
//! Picker/camera -> slot board -> submission (stub or backend) -> contract
//! normalization -> session result store -> results screen.
//!
//! ## Ownership and lifetimes
//! This crate passes owned payloads and state snapshots between subsystems;
//! the orchestrator reads slot contents but never mutates them during a
//! submission.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`] and recovered at the
//! shell boundary; a failed submission only reverts the submitting flag.
//!
//! ## Security and privacy notes
//! - The camera kill-switch env var can disable capture at runtime.
//! - Log lines carry stage/action/status text, never image bytes.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use alfahm_capture::{CaptureError, CaptureSession};
use alfahm_core::{ImageSource, PhotoMode};
use alfahm_predict_contract::{
    ContractError, StoredResult, normalize_result, parse_error_message, parse_predict_response,
};
use alfahm_slots::{PreviewRegistry, SlotBoard, SlotError};
use alfahm_ui::{SessionResultStore, UiState, store_result};
use alfahm_upload::{
    FailureClass, PredictClient, StubPredictor, UploadError, UploadReport, classify_upload_error,
};
use thiserror::Error;
use time::OffsetDateTime;

/// Build-time application version loaded from the root `VERSION` file.
pub const APP_VERSION: &str = env!("ALFAHM_VERSION");

/// Default prediction endpoint for the reference deployment.
pub const DEFAULT_PREDICT_ENDPOINT: &str = "http://localhost:8000/predict-winners";

/// Default HTTP timeout for one submission.
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

/// Returns the app version sourced from the root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Returns the prediction endpoint from `ALFAHM_PREDICT_URL`, or the
/// reference default.
pub fn predict_endpoint_from_env() -> String {
    std::env::var("ALFAHM_PREDICT_URL")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_PREDICT_ENDPOINT.to_string())
}

/// Returns the HTTP timeout from `ALFAHM_HTTP_TIMEOUT_MS`, or the default.
pub fn http_timeout_from_env() -> u64 {
    std::env::var("ALFAHM_HTTP_TIMEOUT_MS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|timeout| *timeout > 0)
        .unwrap_or(DEFAULT_HTTP_TIMEOUT_MS)
}

/// Checks the runtime camera kill-switch env var.
///
/// Semantics:
/// - Unset => camera enabled.
/// - `0`, `false`, `off` (case-insensitive) => camera disabled.
/// - Any other value => camera enabled.
pub fn camera_enabled_from_env() -> bool {
    match std::env::var("ALFAHM_CAMERA_ENABLED") {
        Ok(value) => {
            let normalized = value.trim().to_ascii_lowercase();
            !(normalized == "0" || normalized == "false" || normalized == "off")
        }
        Err(_) => true,
    }
}

/// How a submission for one mode reaches a prediction.
///
/// The reference deployment only ever sends 4-photo batches to the real
/// backend; 2-photo sessions are served by a local stub. Both paths stay
/// explicit and separate instead of being unified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStrategy {
    /// Network-free fabricated prediction.
    LocalStub,
    /// One multipart POST to the external endpoint.
    RemoteBackend,
}

/// Selects the submission strategy for the active mode.
pub fn submission_strategy(mode: PhotoMode) -> SubmissionStrategy {
    match mode {
        PhotoMode::Two => SubmissionStrategy::LocalStub,
        PhotoMode::Four => SubmissionStrategy::RemoteBackend,
    }
}

/// Submission lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPhase {
    /// No submission outstanding.
    Idle,
    /// One submission in flight; triggers are disabled.
    Submitting,
    /// Submission succeeded; the session navigates to the results screen.
    Done,
}

/// Submission state machine with explicit legal transitions.
#[derive(Debug, Clone)]
pub struct SubmissionMachine {
    phase: SubmissionPhase,
}

impl SubmissionMachine {
    /// Creates a machine in the `Idle` phase.
    pub fn new() -> Self {
        Self {
            phase: SubmissionPhase::Idle,
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> SubmissionPhase {
        self.phase
    }

    /// Enters `Submitting`.
    ///
    /// # Errors
    /// Returns [`AppError::SubmissionInFlight`] when a submission is
    /// already outstanding or the machine already finished.
    pub fn begin(&mut self) -> Result<(), AppError> {
        if self.phase != SubmissionPhase::Idle {
            return Err(AppError::SubmissionInFlight);
        }
        self.phase = SubmissionPhase::Submitting;
        Ok(())
    }

    /// Marks the in-flight submission as succeeded.
    pub fn succeed(&mut self) {
        self.phase = SubmissionPhase::Done;
    }

    /// Returns the machine to `Idle` so the user may retry.
    pub fn fail(&mut self) {
        self.phase = SubmissionPhase::Idle;
    }
}

impl Default for SubmissionMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Fills the board from a bulk picker selection.
///
/// Non-image files are filtered out before counting, exactly like the
/// reference picker: a selection padded with text files still fails the
/// count check rather than partially filling.
///
/// # Errors
/// Returns [`AppError::Slot`] with `CountMismatch` when the surviving image
/// count differs from the active mode.
pub fn bulk_fill_from_picker<R: PreviewRegistry>(
    board: &mut SlotBoard<R>,
    picked: Vec<(String, Vec<u8>)>,
) -> Result<(), AppError> {
    let images: Vec<ImageSource> = picked
        .into_iter()
        .filter_map(|(file_name, bytes)| ImageSource::from_file_bytes(file_name, bytes).ok())
        .collect();

    board.bulk_fill(images)?;
    Ok(())
}

/// Replaces one slot from a single-file picker selection.
///
/// # Errors
/// Returns [`AppError::Slot`] with `InvalidPayload` for non-image bytes and
/// `SlotDisabled` for slots beyond the active mode; neither mutates state.
pub fn replace_slot_from_picker<R: PreviewRegistry>(
    board: &mut SlotBoard<R>,
    index: usize,
    file_name: impl Into<String>,
    bytes: Vec<u8>,
) -> Result<(), AppError> {
    let image = ImageSource::from_file_bytes(file_name, bytes)
        .map_err(|error| AppError::Slot(SlotError::InvalidPayload(error)))?;
    board.replace_at(index, image)?;
    Ok(())
}

/// Captures a still from the live session and routes it into the board.
///
/// The session's explicit target slot wins; otherwise the first empty
/// active slot takes the capture. A degenerate frame returns `Ok(None)`
/// with nothing inserted and the session left streaming.
///
/// # Errors
/// Returns [`AppError::Capture`] when the session is not streaming or the
/// device fails.
pub fn capture_into_slot<R: PreviewRegistry>(
    board: &mut SlotBoard<R>,
    session: &mut CaptureSession,
    captured_at_ms: u64,
) -> Result<Option<usize>, AppError> {
    let target = session.target_slot();
    match session.capture_still(captured_at_ms)? {
        Some(still) => Ok(board.insert_from_capture(still, target)),
        None => Ok(None),
    }
}

/// Submits the active slots and stores the normalized result.
///
/// Routes 2-photo sessions through the local stub and 4-photo sessions
/// through the real client. On any failure the machine returns to `Idle`
/// and the previously stored result is left untouched.
///
/// # Errors
/// Returns [`AppError::SubmissionBlocked`] below the required count,
/// [`AppError::SubmissionInFlight`] for re-entrant triggers,
/// [`AppError::Upload`] for transport/status failures, and
/// [`AppError::Contract`] when a success body does not parse.
pub fn submit_active_slots<R: PreviewRegistry>(
    board: &SlotBoard<R>,
    machine: &mut SubmissionMachine,
    client: &PredictClient,
    stub: &StubPredictor,
    store: &mut SessionResultStore,
) -> Result<StoredResult, AppError> {
    let required = board.mode().required_count();
    if !board.can_submit() {
        return Err(AppError::SubmissionBlocked {
            selected: board.selected_count(),
            required,
        });
    }

    machine.begin()?;

    let report: Result<UploadReport, UploadError> = match submission_strategy(board.mode()) {
        SubmissionStrategy::LocalStub => Ok(stub.predict()),
        SubmissionStrategy::RemoteBackend => client.submit(&board.active_images()),
    };

    let report = match report {
        Ok(report) => report,
        Err(error) => {
            machine.fail();
            return Err(AppError::Upload(error));
        }
    };

    let response = match parse_predict_response(&report.body) {
        Ok(response) => response,
        Err(error) => {
            machine.fail();
            return Err(AppError::Contract(error));
        }
    };

    let stored = normalize_result(&response, board.mode());
    if let Err(error) = store_result(store, &stored) {
        machine.fail();
        return Err(AppError::Contract(error));
    }

    machine.succeed();
    Ok(stored)
}

/// Builds the user-facing message for a failed operation.
///
/// Non-success replies are mined for the backend's own error text; when no
/// parseable payload exists, a generic message is used. Retriable failures
/// invite the user to try again.
pub fn user_message_for(error: &AppError) -> String {
    match error {
        AppError::Upload(upload) => {
            let backend_text = match upload {
                UploadError::Client { body, .. } | UploadError::Server { body, .. } => {
                    parse_error_message(body)
                }
                _ => None,
            };
            let text =
                backend_text.unwrap_or_else(|| "Something went wrong. Please try again.".to_string());
            match classify_upload_error(upload) {
                FailureClass::Retriable => format!("{text} You can retry the submission."),
                FailureClass::Permanent => text,
            }
        }
        other => other.to_string(),
    }
}

/// Consolidated runtime status snapshot for simple UI projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeStatus {
    /// Whether user triggers are currently allowed.
    pub can_interact: bool,
    /// Whether the camera kill-switch currently allows capture.
    pub camera_allowed: bool,
    /// Required photo count of the active mode.
    pub required_count: usize,
    /// Camera stage as a human-readable string.
    pub camera: String,
    /// Submission stage as a human-readable string.
    pub submission: String,
    /// Status line text.
    pub status: String,
}

/// Projects UI runtime state into a flat status snapshot.
pub fn project_runtime_status(state: &UiState) -> RuntimeStatus {
    RuntimeStatus {
        can_interact: state.can_interact(),
        camera_allowed: camera_enabled_from_env(),
        required_count: state.mode.required_count(),
        camera: format!("{:?}", state.camera),
        submission: format!("{:?}", state.submission),
        status: state.status_line.clone(),
    }
}

/// Per-run file logger writing `timestamp | LEVEL | stage | action | detail`
/// lines next to the executable.
pub struct RunLogger {
    file: Mutex<File>,
    path: PathBuf,
}

impl RunLogger {
    /// Creates a run log file in the given directory.
    ///
    /// # Errors
    /// Returns a descriptive message when the file cannot be created.
    pub fn create_in(directory: &Path) -> Result<Self, String> {
        let timestamp = timestamp_compact_utc();
        let path = directory.join(format!("{timestamp}_log.txt"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|error| format!("unable to create log file '{}': {error}", path.display()))?;

        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    /// Returns the log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one info line.
    pub fn info(&self, stage: &str, action: &str, detail: &str) {
        self.write_line("INFO", stage, action, detail);
    }

    /// Writes one error line and flushes immediately.
    pub fn error(&self, stage: &str, action: &str, detail: &str) {
        self.write_line("ERROR", stage, action, detail);
    }

    fn write_line(&self, level: &str, stage: &str, action: &str, detail: &str) {
        let line = format_log_line(&timestamp_compact_utc(), level, stage, action, detail);
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
            if level == "ERROR" {
                let _ = file.flush();
            }
        }
    }
}

/// Formats one log line; separated out so the shape stays testable.
pub fn format_log_line(
    timestamp: &str,
    level: &str,
    stage: &str,
    action: &str,
    detail: &str,
) -> String {
    format!("{timestamp} | {level} | {stage} | {action} | {detail}\n")
}

/// Compact UTC timestamp for log lines and run-log file names.
pub fn timestamp_compact_utc() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Slot board rejection.
    #[error("slot error: {0}")]
    Slot(#[from] SlotError),
    /// Capture pipeline failure.
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    /// Submission attempted below the required photo count.
    #[error("submission blocked: {selected} of {required} photos selected")]
    SubmissionBlocked {
        /// Currently occupied slots.
        selected: usize,
        /// Photos required by the active mode.
        required: usize,
    },
    /// A submission is already outstanding.
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    /// Upload/transport failure.
    #[error("submission failed: {0}")]
    Upload(#[from] UploadError),
    /// Prediction contract failure.
    #[error("prediction contract error: {0}")]
    Contract(#[from] ContractError),
}
