#![warn(missing_docs)]
//! # alfahm-core
//!
//! ## Purpose
//! Defines the pure data model used across the `alfahm` workspace.
//!
//! ## Responsibilities
//! - Represent encoded image payloads selected or captured by the user.
//! - Represent raw camera sensor frames before crop/encode.
//! - Model the 2-photo / 4-photo session mode.
//!
//! ## Data flow
//! Picker and capture code produce [`ImageSource`] values. The slot board
//! stores them, and the upload layer reads them back in slot order when the
//! user submits.
//!
//! ## Ownership and lifetimes
//! Payloads and frames own their backing buffers (`Vec<u8>`) to avoid hidden
//! borrow/lifetime coupling between the slot board, capture session, and
//! in-flight submissions.
//!
//! ## Error model
//! Validation failures (non-image bytes, MIME disagreement, frame shape
//! mismatch) return [`CoreError`] variants with caller-actionable
//! categorization.
//!
//! ## Security and privacy notes
//! Image bytes are never logged by this crate and never written to disk;
//! payloads live only for the current session.
//!
//! ## Example
//! ```rust
//! use alfahm_core::{ImageSource, PhotoMode};
//!
//! let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10].to_vec();
//! let source = ImageSource::from_file_bytes("friend-1.jpg", jpeg).unwrap();
//! assert_eq!(source.mime_type, "image/jpeg");
//! assert_eq!(PhotoMode::Four.required_count(), 4);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MIME types the prediction backend accepts.
pub const SUPPORTED_IMAGE_MIMES: [&str; 4] =
    ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// One encoded image payload with its picker/capture identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    /// File name presented to the prediction backend.
    pub file_name: String,
    /// Declared MIME type, always one of [`SUPPORTED_IMAGE_MIMES`].
    pub mime_type: String,
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
}

impl ImageSource {
    /// Constructs a validated image payload with an explicit MIME type.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidImagePayload`] when the bytes do not sniff
    /// as a supported encoded image.
    /// Returns [`CoreError::MimeMismatch`] when the declared MIME disagrees
    /// with the sniffed format.
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, CoreError> {
        let file_name = file_name.into();
        let mime_type = mime_type.into();
        let sniffed = sniff_image_mime(&bytes)
            .ok_or_else(|| CoreError::InvalidImagePayload(file_name.clone()))?;

        if mime_type != sniffed {
            return Err(CoreError::MimeMismatch {
                declared: mime_type,
                sniffed: sniffed.to_string(),
            });
        }

        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }

    /// Constructs a payload from raw picked bytes, deriving the MIME type
    /// from the sniffed magic numbers.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidImagePayload`] when the bytes are not a
    /// supported encoded image.
    pub fn from_file_bytes(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, CoreError> {
        let file_name = file_name.into();
        let sniffed = sniff_image_mime(&bytes)
            .ok_or_else(|| CoreError::InvalidImagePayload(file_name.clone()))?;

        Ok(Self {
            file_name,
            mime_type: sniffed.to_string(),
            bytes,
        })
    }

    /// Returns payload size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` when the payload is empty.
    ///
    /// Empty payloads cannot be constructed through the validated paths;
    /// this exists for symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Sniffs the MIME type of encoded image bytes from magic numbers.
///
/// Recognizes the formats the prediction backend accepts: JPEG, PNG, WebP,
/// and GIF. Returns `None` for anything else.
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }

    None
}

/// One raw RGBA frame read from a live camera stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorFrame {
    /// Native frame width in pixels.
    pub width: u32,
    /// Native frame height in pixels.
    pub height: u32,
    /// Raw RGBA pixel buffer (`width * height * 4` bytes).
    pub rgba: Vec<u8>,
}

impl SensorFrame {
    /// Constructs a validated sensor frame.
    ///
    /// Zero-area frames are allowed; the capture pipeline treats them as
    /// "no picture available" rather than an error.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidFrameShape`] when the pixel buffer length
    /// is not exactly `width * height * 4`.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, CoreError> {
        let expected_len = required_rgba_len(width, height)?;
        if rgba.len() != expected_len {
            return Err(CoreError::InvalidFrameShape {
                expected: expected_len,
                actual: rgba.len(),
            });
        }

        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Returns `true` when the frame has no drawable area.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Session photo mode: how many slots must be filled before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhotoMode {
    /// Two photos, one winner.
    Two,
    /// Four photos, two winners.
    Four,
}

impl PhotoMode {
    /// Number of slots that must be occupied to submit.
    pub fn required_count(&self) -> usize {
        match self {
            PhotoMode::Two => 2,
            PhotoMode::Four => 4,
        }
    }

    /// Parses a user-supplied count into a mode.
    ///
    /// # Errors
    /// Returns [`CoreError::UnsupportedMode`] for anything but 2 or 4.
    pub fn from_count(count: usize) -> Result<Self, CoreError> {
        match count {
            2 => Ok(PhotoMode::Two),
            4 => Ok(PhotoMode::Four),
            other => Err(CoreError::UnsupportedMode(other)),
        }
    }
}

/// Error type for core domain validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bytes do not sniff as any supported encoded image.
    #[error("'{0}' is not a supported image file")]
    InvalidImagePayload(String),
    /// Declared MIME type disagrees with the sniffed format.
    #[error("declared MIME '{declared}' does not match sniffed '{sniffed}'")]
    MimeMismatch {
        /// MIME type the caller declared.
        declared: String,
        /// MIME type derived from magic numbers.
        sniffed: String,
    },
    /// Frame buffer shape does not match declared geometry.
    #[error("invalid frame shape: expected {expected} bytes, got {actual}")]
    InvalidFrameShape {
        /// Expected RGBA byte count.
        expected: usize,
        /// Actual RGBA byte count.
        actual: usize,
    },
    /// Photo count is not one of the supported session modes.
    #[error("unsupported photo count {0}: only 2 or 4 photos are allowed")]
    UnsupportedMode(usize),
    /// Frame dimensions overflow addressable buffer sizes.
    #[error("frame dimensions overflow")]
    FrameDimensionsOverflow,
}

fn required_rgba_len(width: u32, height: u32) -> Result<usize, CoreError> {
    let pixels = (width as usize)
        .checked_mul(height as usize)
        .ok_or(CoreError::FrameDimensionsOverflow)?;

    pixels
        .checked_mul(4)
        .ok_or(CoreError::FrameDimensionsOverflow)
}
