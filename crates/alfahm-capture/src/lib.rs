#![warn(missing_docs)]
//! # alfahm-capture
//!
//! ## Purpose
//! Provides camera stream acquisition and still-image normalization for the
//! photo slots.
//!
//! ## Responsibilities
//! - Define a backend-agnostic camera trait with facing selection.
//! - Model one capture session as an explicit state machine.
//! - Produce a square-cropped, size-bounded, JPEG-encoded still on demand.
//! - Expose deterministic synthetic capture for CI and unit tests.
//!
//! ## Data flow
//! UI opens a [`CaptureSession`] -> backend grants a live stream -> user
//! triggers [`CaptureSession::capture_still`] -> one [`SensorFrame`] is
//! cropped/encoded into an [`ImageSource`] handed to the slot board.
//!
//! ## Ownership and lifetimes
//! A session exclusively owns its live stream. The stream is stopped
//! whenever the session closes for any reason, exactly once, and two
//! streams are never live at the same time.
//!
//! ## Error model
//! Permission/device failures surface as [`CaptureError::CameraUnavailable`]
//! and park the session in a retriable `Error` state. Capturing outside the
//! `Streaming` state is [`CaptureError::NotStreaming`].
//!
//! ## Security and privacy notes
//! Frames exist only in memory for the duration of one capture call;
//! nothing here writes pixels to disk or logs them.

use std::sync::{Arc, Mutex};

use alfahm_core::{ImageSource, SensorFrame};
use image::imageops::FilterType;
use thiserror::Error;

/// Smallest output square side in pixels.
pub const MIN_STILL_SIDE: u32 = 512;

/// Largest output square side in pixels.
pub const MAX_STILL_SIDE: u32 = 1024;

/// JPEG quality for encoded stills.
pub const STILL_JPEG_QUALITY: u8 = 90;

/// Which physical camera a session requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    /// Outward-facing camera.
    Environment,
    /// Inward-facing (selfie) camera.
    User,
}

impl Facing {
    /// Returns the opposite facing direction.
    pub fn flipped(&self) -> Facing {
        match self {
            Facing::Environment => Facing::User,
            Facing::User => Facing::Environment,
        }
    }
}

/// One live video stream granted by a camera backend.
pub trait CameraStream: Send {
    /// Reads the current frame from the live stream.
    ///
    /// # Errors
    /// Returns [`CaptureError::FrameRead`] on device read failures.
    fn read_frame(&mut self) -> Result<SensorFrame, CaptureError>;

    /// Stops the stream and releases all underlying device tracks.
    ///
    /// The owning session calls this exactly once per granted stream and
    /// never on a stream it no longer holds.
    fn stop(&mut self);
}

/// Trait implemented by concrete camera providers.
pub trait CameraBackend: Send + Sync {
    /// Requests a live stream constrained to the given facing direction.
    ///
    /// # Errors
    /// Returns [`CaptureError::CameraUnavailable`] when permission is denied
    /// or the device cannot be initialized.
    fn open(&self, facing: Facing) -> Result<Box<dyn CameraStream>, CaptureError>;
}

/// Capture session lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureState {
    /// No stream requested or held.
    Idle,
    /// Stream request issued, grant pending.
    Requesting,
    /// Live stream bound and renderable.
    Streaming,
    /// Acquisition failed; retriable without reopening the UI.
    Error(String),
}

/// One open camera interaction.
///
/// The session is the only owner of its stream. Every path out of
/// `Streaming` stops the stream before anything else happens, which is what
/// makes the "never two live streams" invariant checkable.
pub struct CaptureSession {
    backend: Arc<dyn CameraBackend>,
    facing: Facing,
    state: CaptureState,
    stream: Option<Box<dyn CameraStream>>,
    target_slot: Option<usize>,
}

impl CaptureSession {
    /// Opens a session and immediately requests a stream.
    pub fn open(
        backend: Arc<dyn CameraBackend>,
        facing: Facing,
        target_slot: Option<usize>,
    ) -> Self {
        let mut session = Self {
            backend,
            facing,
            state: CaptureState::Idle,
            stream: None,
            target_slot,
        };
        session.request_stream();
        session
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Returns `true` when a live stream is bound.
    pub fn is_streaming(&self) -> bool {
        self.state == CaptureState::Streaming
    }

    /// Returns the requested facing direction.
    pub fn facing(&self) -> Facing {
        self.facing
    }

    /// Returns the slot the capture UI was opened for, if any.
    pub fn target_slot(&self) -> Option<usize> {
        self.target_slot
    }

    /// Re-enters `Requesting`, stopping any stream that is still live.
    ///
    /// Used both to retry after a denial and to restart a running stream.
    pub fn retry(&mut self) {
        self.request_stream();
    }

    /// Stops the current stream, flips facing, and requests a new stream.
    pub fn switch_facing(&mut self) {
        self.facing = self.facing.flipped();
        self.request_stream();
    }

    /// Closes the session, stopping the stream if one is held.
    ///
    /// Safe in every state: a denied request or an already-closed session
    /// holds no stream and triggers no stop call.
    pub fn close(&mut self) {
        self.stop_stream();
        self.state = CaptureState::Idle;
    }

    /// Captures one normalized still from the live stream.
    ///
    /// On success the session closes itself (stream stopped) and returns the
    /// encoded payload. A degenerate (zero-area) source frame is a silent
    /// no-op: `Ok(None)` with the session left streaming so the user can try
    /// again once the device delivers real frames.
    ///
    /// # Errors
    /// Returns [`CaptureError::NotStreaming`] outside the `Streaming` state.
    /// Device read failures stop the stream and park the session in
    /// `Error`, keeping the retry path available.
    pub fn capture_still(
        &mut self,
        captured_at_ms: u64,
    ) -> Result<Option<ImageSource>, CaptureError> {
        if self.state != CaptureState::Streaming {
            return Err(CaptureError::NotStreaming);
        }

        let frame = {
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| CaptureError::FrameRead("stream handle missing".to_string()))?;
            stream.read_frame()
        };

        let frame = match frame {
            Ok(frame) => frame,
            Err(error) => {
                self.stop_stream();
                self.state = CaptureState::Error(error.to_string());
                return Err(error);
            }
        };

        match encode_square_still(&frame, captured_at_ms)? {
            Some(still) => {
                self.close();
                Ok(Some(still))
            }
            None => Ok(None),
        }
    }

    fn request_stream(&mut self) {
        // The prior stream is fully stopped before the next request; two
        // streams are never live at once.
        self.stop_stream();
        self.state = CaptureState::Requesting;

        match self.backend.open(self.facing) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = CaptureState::Streaming;
            }
            Err(error) => {
                self.state = CaptureState::Error(error.to_string());
            }
        }
    }

    fn stop_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        // Unmount behaves like close: no stream survives the session.
        self.stop_stream();
    }
}

/// Normalizes one sensor frame into an encoded square still.
///
/// # Semantics
/// - Centered square crop of side `min(width, height)` along the longer axis.
/// - Output side is `min(width, height)` clamped to
///   `[MIN_STILL_SIDE, MAX_STILL_SIDE]`.
/// - JPEG-encoded at [`STILL_JPEG_QUALITY`], named `camera-{timestamp}.jpg`.
///
/// Returns `Ok(None)` for a zero-area frame or an encode that yields no
/// bytes; neither is an error the user can act on.
///
/// # Errors
/// Returns [`CaptureError::Encode`] when the encoder itself fails.
pub fn encode_square_still(
    frame: &SensorFrame,
    captured_at_ms: u64,
) -> Result<Option<ImageSource>, CaptureError> {
    if frame.is_degenerate() {
        return Ok(None);
    }

    let crop_side = frame.width.min(frame.height);
    let crop_x = (frame.width - crop_side) / 2;
    let crop_y = (frame.height - crop_side) / 2;
    let out_side = crop_side.clamp(MIN_STILL_SIDE, MAX_STILL_SIDE);

    let rgb = rgba_to_rgb(&frame.rgba);
    let source = image::RgbImage::from_raw(frame.width, frame.height, rgb).ok_or_else(|| {
        CaptureError::Encode(format!(
            "failed to construct RGB buffer {}x{}",
            frame.width, frame.height
        ))
    })?;

    let cropped = image::imageops::crop_imm(&source, crop_x, crop_y, crop_side, crop_side);
    let resized = image::imageops::resize(
        &cropped.to_image(),
        out_side,
        out_side,
        FilterType::Triangle,
    );

    let mut jpeg_bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg_bytes, STILL_JPEG_QUALITY)
        .encode(
            resized.as_raw(),
            out_side,
            out_side,
            image::ColorType::Rgb8.into(),
        )
        .map_err(|error| CaptureError::Encode(format!("jpeg encoding failed: {error}")))?;

    if jpeg_bytes.is_empty() {
        return Ok(None);
    }

    let still = ImageSource::new(
        format!("camera-{captured_at_ms}.jpg"),
        "image/jpeg",
        jpeg_bytes,
    )
    .map_err(|error| CaptureError::Encode(error.to_string()))?;

    Ok(Some(still))
}

fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((rgba.len() / 4) * 3);
    for px in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }
    rgb
}

/// Bookkeeping snapshot of synthetic stream lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraLedgerSnapshot {
    /// Streams ever granted.
    pub opened: u64,
    /// Stop calls on live streams.
    pub stopped: u64,
    /// Stop calls on streams that were already stopped.
    pub double_stops: u64,
    /// Streams currently live.
    pub live: usize,
    /// Highest number of simultaneously live streams observed.
    pub max_live: usize,
}

#[derive(Debug, Default)]
struct CameraLedger {
    opened: u64,
    stopped: u64,
    double_stops: u64,
    live: usize,
    max_live: usize,
}

/// Deterministic synthetic backend for test and CI usage.
///
/// Tracks stream grants and stop calls in a shared ledger so tests can
/// assert the session's lifetime guarantees structurally.
#[derive(Debug, Clone)]
pub struct SyntheticCameraBackend {
    width: u32,
    height: u32,
    denial: Option<String>,
    ledger: Arc<Mutex<CameraLedger>>,
    sequence: Arc<Mutex<u64>>,
}

impl SyntheticCameraBackend {
    /// Creates a backend granting streams of the given frame geometry.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            denial: None,
            ledger: Arc::new(Mutex::new(CameraLedger::default())),
            sequence: Arc::new(Mutex::new(0)),
        }
    }

    /// Creates a backend that denies every stream request.
    pub fn denying(message: impl Into<String>) -> Self {
        let mut backend = Self::new(0, 0);
        backend.denial = Some(message.into());
        backend
    }

    /// Returns a snapshot of the stream lifetime ledger.
    pub fn ledger(&self) -> CameraLedgerSnapshot {
        let ledger = lock_ignoring_poison(&self.ledger);
        CameraLedgerSnapshot {
            opened: ledger.opened,
            stopped: ledger.stopped,
            double_stops: ledger.double_stops,
            live: ledger.live,
            max_live: ledger.max_live,
        }
    }
}

impl CameraBackend for SyntheticCameraBackend {
    fn open(&self, _facing: Facing) -> Result<Box<dyn CameraStream>, CaptureError> {
        if let Some(message) = &self.denial {
            return Err(CaptureError::CameraUnavailable(message.clone()));
        }

        let mut ledger = lock_ignoring_poison(&self.ledger);
        ledger.opened += 1;
        ledger.live += 1;
        ledger.max_live = ledger.max_live.max(ledger.live);

        Ok(Box::new(SyntheticStream {
            width: self.width,
            height: self.height,
            stopped: false,
            ledger: Arc::clone(&self.ledger),
            sequence: Arc::clone(&self.sequence),
        }))
    }
}

struct SyntheticStream {
    width: u32,
    height: u32,
    stopped: bool,
    ledger: Arc<Mutex<CameraLedger>>,
    sequence: Arc<Mutex<u64>>,
}

impl CameraStream for SyntheticStream {
    fn read_frame(&mut self) -> Result<SensorFrame, CaptureError> {
        if self.stopped {
            return Err(CaptureError::FrameRead(
                "synthetic stream is stopped".to_string(),
            ));
        }

        let mut sequence = lock_ignoring_poison(&self.sequence);
        *sequence += 1;
        let byte = (*sequence % 255) as u8;

        let rgba_len = (self.width as usize) * (self.height as usize) * 4;
        SensorFrame::new(self.width, self.height, vec![byte; rgba_len])
            .map_err(|error| CaptureError::FrameRead(error.to_string()))
    }

    fn stop(&mut self) {
        let mut ledger = lock_ignoring_poison(&self.ledger);
        if self.stopped {
            ledger.double_stops += 1;
            return;
        }

        self.stopped = true;
        ledger.stopped += 1;
        ledger.live = ledger.live.saturating_sub(1);
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}

/// Real device capture through `nokhwa`.
#[cfg(feature = "real-camera")]
pub mod real {
    //! Device-backed camera backend, compiled with the `real-camera` feature.

    use alfahm_core::SensorFrame;
    use nokhwa::Camera;
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};

    use super::{CameraBackend, CameraStream, CaptureError, Facing};

    /// Camera backend over the platform's native capture API.
    #[derive(Debug, Default)]
    pub struct NokhwaCameraBackend;

    impl NokhwaCameraBackend {
        /// Creates a device-backed camera backend.
        pub fn new() -> Self {
            Self
        }
    }

    impl CameraBackend for NokhwaCameraBackend {
        fn open(&self, facing: Facing) -> Result<Box<dyn CameraStream>, CaptureError> {
            let requested =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

            // Device ordering convention: the outward camera enumerates
            // first, the inward camera second. Fall back to the first
            // device when the preferred index does not exist.
            let preferred = match facing {
                Facing::Environment => CameraIndex::Index(0),
                Facing::User => CameraIndex::Index(1),
            };

            let mut camera = match Camera::new(preferred, requested.clone()) {
                Ok(camera) => camera,
                Err(_) => Camera::new(CameraIndex::Index(0), requested).map_err(|error| {
                    CaptureError::CameraUnavailable(format!("camera init failed: {error}"))
                })?,
            };

            camera.open_stream().map_err(|error| {
                CaptureError::CameraUnavailable(format!("stream open failed: {error}"))
            })?;

            Ok(Box::new(NokhwaStream { camera }))
        }
    }

    struct NokhwaStream {
        camera: Camera,
    }

    impl CameraStream for NokhwaStream {
        fn read_frame(&mut self) -> Result<SensorFrame, CaptureError> {
            let buffer = self
                .camera
                .frame()
                .map_err(|error| CaptureError::FrameRead(format!("frame grab failed: {error}")))?;
            let decoded = buffer.decode_image::<RgbFormat>().map_err(|error| {
                CaptureError::FrameRead(format!("frame decode failed: {error}"))
            })?;

            let (width, height) = (decoded.width(), decoded.height());
            let mut rgba = Vec::with_capacity((width as usize) * (height as usize) * 4);
            for pixel in decoded.pixels() {
                let [r, g, b] = pixel.0;
                rgba.extend_from_slice(&[r, g, b, 255]);
            }

            SensorFrame::new(width, height, rgba)
                .map_err(|error| CaptureError::FrameRead(error.to_string()))
        }

        fn stop(&mut self) {
            let _ = self.camera.stop_stream();
        }
    }
}

/// Capture layer error type.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Permission denied or device initialization failure.
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    /// Capture requested outside the `Streaming` state.
    #[error("capture is only valid while the camera is streaming")]
    NotStreaming,
    /// Device-level frame read failure.
    #[error("frame read failure: {0}")]
    FrameRead(String),
    /// Still image encoding failure.
    #[error("still encode failure: {0}")]
    Encode(String),
}
