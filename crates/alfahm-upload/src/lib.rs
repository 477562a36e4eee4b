#![warn(missing_docs)]
//! # alfahm-upload
//!
//! ## Purpose
//! Assembles slot photos into one multipart submission and talks to the
//! prediction endpoint.
//!
//! ## Responsibilities
//! - Encode active slot payloads as `multipart/form-data` under one shared
//!   field name, in slot order.
//! - Validate the prediction endpoint URL policy.
//! - Execute one POST through an injectable transport abstraction and
//!   classify the reply.
//! - Provide the network-free local stub used for 2-photo sessions.
//!
//! ## Data flow
//! Slot board contents -> [`encode_submission`] -> [`PredictClient::submit`]
//! through a [`PredictTransport`] -> [`UploadReport`] handed to contract
//! parsing.
//!
//! ## Ownership and lifetimes
//! The encoded body owns its bytes; nothing borrows from the slot board
//! once a submission is in flight.
//!
//! ## Error model
//! Endpoint policy violations, network-level failures, and non-success
//! statuses surface as [`UploadError`] values carrying enough context for a
//! user-facing message.
//!
//! ## Security and privacy notes
//! Image bytes travel only to the configured endpoint; this crate neither
//! logs nor persists them. There is no automatic retry: the user decides
//! whether to resubmit.

use std::sync::Arc;
use std::time::Duration;

use alfahm_core::ImageSource;
use rand::{Rng, SeedableRng, rngs::StdRng};
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

/// Shared multipart field name for every image part.
pub const MULTIPART_FIELD_NAME: &str = "images";

/// Required path suffix of the prediction endpoint.
pub const REQUIRED_PREDICT_PATH: &str = "/predict-winners";

/// Delay of the local 2-photo stub in milliseconds.
pub const STUB_DELAY_MS: u64 = 1_200;

/// Placeholder card reference fabricated by the local stub.
pub const STUB_WINNER_CARD_URL: &str = "/placeholder.svg?height=640&width=480";

/// One encoded multipart submission ready for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSubmission {
    /// `Content-Type` header value, including the boundary.
    pub content_type: String,
    /// Stable key identifying identical submissions across retries.
    pub idempotency_key: String,
    /// Raw multipart body bytes.
    pub body: Vec<u8>,
}

/// Raw HTTP reply from the prediction endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
}

/// Successful submission report: a 2xx status plus its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    /// HTTP status code (always 2xx).
    pub status: u16,
    /// Response body text for contract parsing.
    pub body: String,
}

/// Abstract transport used by the prediction client.
///
/// Implementations return [`TransportReply`] for any reply the server
/// produced, including non-success statuses; [`UploadError::Transport`] is
/// reserved for failures where no reply exists (timeout, refused
/// connection, broken stream).
pub trait PredictTransport: Send + Sync {
    /// Sends one encoded submission to the endpoint.
    ///
    /// # Errors
    /// Returns [`UploadError::Transport`] for network-level failures.
    fn send(
        &self,
        endpoint: &str,
        submission: &EncodedSubmission,
    ) -> Result<TransportReply, UploadError>;
}

/// Blocking HTTP transport over `ureq`.
#[derive(Debug, Clone)]
pub struct UreqPredictTransport {
    timeout_ms: u64,
}

impl UreqPredictTransport {
    /// Creates a transport with the given request timeout.
    pub fn new(timeout_ms: u64) -> Self {
        Self { timeout_ms }
    }
}

impl PredictTransport for UreqPredictTransport {
    fn send(
        &self,
        endpoint: &str,
        submission: &EncodedSubmission,
    ) -> Result<TransportReply, UploadError> {
        let response = ureq::post(endpoint)
            .timeout(Duration::from_millis(self.timeout_ms))
            .set("Content-Type", &submission.content_type)
            .set("X-Idempotency-Key", &submission.idempotency_key)
            .send_bytes(&submission.body);

        match response {
            Ok(reply) => {
                let status = reply.status();
                let body = reply.into_string().map_err(|error| {
                    UploadError::Transport(format!("response read failed: {error}"))
                })?;
                Ok(TransportReply { status, body })
            }
            Err(ureq::Error::Status(status, reply)) => Ok(TransportReply {
                status,
                body: reply.into_string().unwrap_or_default(),
            }),
            Err(error) => Err(UploadError::Transport(error.to_string())),
        }
    }
}

/// Client for the external prediction endpoint.
#[derive(Clone)]
pub struct PredictClient {
    endpoint: String,
    transport: Arc<dyn PredictTransport>,
}

impl std::fmt::Debug for PredictClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl PredictClient {
    /// Creates a validated prediction client.
    ///
    /// # Errors
    /// Returns [`UploadError::InvalidEndpoint`] when the URL does not parse,
    /// is not http/https, or does not end with `/predict-winners`.
    pub fn new(
        endpoint: impl Into<String>,
        transport: Arc<dyn PredictTransport>,
    ) -> Result<Self, UploadError> {
        let endpoint = endpoint.into();
        validate_predict_endpoint(&endpoint)?;
        Ok(Self {
            endpoint,
            transport,
        })
    }

    /// Returns the configured endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submits the given payloads as one multipart POST.
    ///
    /// # Errors
    /// Returns [`UploadError::Client`] / [`UploadError::Server`] for
    /// non-success statuses (carrying the reply body for error-message
    /// extraction) and [`UploadError::Transport`] when no reply exists.
    pub fn submit(&self, images: &[&ImageSource]) -> Result<UploadReport, UploadError> {
        let submission = encode_submission(images, &random_boundary());
        let reply = self.transport.send(&self.endpoint, &submission)?;

        match reply.status {
            200..=299 => Ok(UploadReport {
                status: reply.status,
                body: reply.body,
            }),
            400..=499 => Err(UploadError::Client {
                status: reply.status,
                body: reply.body,
            }),
            other => Err(UploadError::Server {
                status: other,
                body: reply.body,
            }),
        }
    }
}

/// Encodes payloads as `multipart/form-data` with a caller-chosen boundary.
///
/// Every part uses [`MULTIPART_FIELD_NAME`]; parts appear in the order
/// given, which the caller guarantees is slot order.
pub fn encode_submission(images: &[&ImageSource], boundary: &str) -> EncodedSubmission {
    let mut body = Vec::new();
    for image in images {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{MULTIPART_FIELD_NAME}\"; filename=\"{}\"\r\n",
                sanitize_file_name(&image.file_name)
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", image.mime_type).as_bytes());
        body.extend_from_slice(&image.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    EncodedSubmission {
        content_type: format!("multipart/form-data; boundary={boundary}"),
        idempotency_key: idempotency_key_for_submission(images),
        body,
    }
}

/// Computes a stable key over part names and bytes.
///
/// Identical selections produce identical keys, letting the server dedupe a
/// resubmission of the same batch.
pub fn idempotency_key_for_submission(images: &[&ImageSource]) -> String {
    let mut hasher = Sha256::new();
    for image in images {
        hasher.update(image.file_name.as_bytes());
        hasher.update([0_u8]);
        hasher.update(&image.bytes);
        hasher.update([0_u8]);
    }
    hex::encode(hasher.finalize())
}

/// Generates a fresh multipart boundary from OS randomness.
pub fn random_boundary() -> String {
    let mut rng = StdRng::from_os_rng();
    format!("alfahm-{:032x}", rng.random::<u128>())
}

/// Validates the prediction endpoint policy.
///
/// # Errors
/// Returns [`UploadError::InvalidEndpoint`] for unparsable URLs, schemes
/// other than http/https, or a path that does not end with
/// [`REQUIRED_PREDICT_PATH`].
pub fn validate_predict_endpoint(endpoint: &str) -> Result<(), UploadError> {
    let parsed = Url::parse(endpoint)
        .map_err(|error| UploadError::InvalidEndpoint(format!("invalid predict url: {error}")))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(UploadError::InvalidEndpoint(
            "predict endpoint must use http or https".to_string(),
        ));
    }

    if !parsed.path().ends_with(REQUIRED_PREDICT_PATH) {
        return Err(UploadError::InvalidEndpoint(format!(
            "predict endpoint path must end with {REQUIRED_PREDICT_PATH}"
        )));
    }

    Ok(())
}

/// Local predictor for 2-photo sessions.
///
/// Never touches the network: it waits roughly as long as the real backend
/// takes and fabricates a single-winner reply in the same JSON shape, so the
/// downstream contract path is identical for both strategies.
#[derive(Debug, Clone)]
pub struct StubPredictor {
    delay_ms: u64,
}

impl StubPredictor {
    /// Creates a stub with the reference delay of [`STUB_DELAY_MS`].
    pub fn new() -> Self {
        Self {
            delay_ms: STUB_DELAY_MS,
        }
    }

    /// Creates a stub with a caller-chosen delay (tests use 0).
    pub fn with_delay_ms(delay_ms: u64) -> Self {
        Self { delay_ms }
    }

    /// Produces a fabricated success report after the configured delay.
    pub fn predict(&self) -> UploadReport {
        if self.delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.delay_ms));
        }

        UploadReport {
            status: 200,
            body: format!(
                "{{\"winner1_card_url\":\"{STUB_WINNER_CARD_URL}\",\"winner2_card_url\":null,\
                 \"winner1_score\":\"92.5\",\"winner2_score\":null,\"count\":2}}"
            ),
        }
    }
}

impl Default for StubPredictor {
    fn default() -> Self {
        Self::new()
    }
}

/// Coarse failure classification for user-facing retry messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Worth retrying as-is (network trouble, server-side failure).
    Retriable,
    /// Retrying the same submission will fail again.
    Permanent,
}

/// Classifies an upload error for retry messaging.
pub fn classify_upload_error(error: &UploadError) -> FailureClass {
    match error {
        UploadError::Transport(_) | UploadError::Server { .. } => FailureClass::Retriable,
        UploadError::InvalidEndpoint(_) | UploadError::Client { .. } => FailureClass::Permanent,
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|character| {
            if character == '"' || character.is_control() {
                '_'
            } else {
                character
            }
        })
        .collect()
}

/// Upload layer error type.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Endpoint violates the URL policy.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Network-level failure with no server reply.
    #[error("prediction request failed: {0}")]
    Transport(String),
    /// Server rejected the submission (4xx).
    #[error("prediction rejected with status {status}")]
    Client {
        /// HTTP status code.
        status: u16,
        /// Reply body for error-message extraction.
        body: String,
    },
    /// Server-side failure (5xx or unexpected status).
    #[error("prediction failed with status {status}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Reply body for error-message extraction.
        body: String,
    },
}
