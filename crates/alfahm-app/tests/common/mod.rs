//! Shared fixtures for app integration tests.

use std::sync::{Arc, Mutex};

use alfahm_core::{ImageSource, PhotoMode};
use alfahm_slots::{InMemoryPreviewRegistry, SlotBoard};
use alfahm_upload::{EncodedSubmission, PredictTransport, TransportReply, UploadError};

/// Creates a deterministic JPEG payload fixture.
#[allow(dead_code)]
pub fn jpeg(name: &str) -> ImageSource {
    ImageSource::from_file_bytes(name, vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
        .expect("jpeg fixture should be valid")
}

/// Creates a board filled to exactly the given mode's count.
#[allow(dead_code)]
pub fn filled_board(mode: PhotoMode) -> SlotBoard<InMemoryPreviewRegistry> {
    let mut board = SlotBoard::new(InMemoryPreviewRegistry::new());
    board.set_mode(mode);
    let images = (0..mode.required_count())
        .map(|index| jpeg(&format!("friend-{index}.jpg")))
        .collect();
    board.bulk_fill(images).expect("fixture fill should pass");
    board
}

/// Transport double that records every request and replays one canned reply.
#[derive(Debug)]
#[allow(dead_code)]
pub struct RecordingTransport {
    reply: TransportReply,
    failure: Option<String>,
    requests: Mutex<Vec<EncodedSubmission>>,
}

impl RecordingTransport {
    /// Replies to every send with the given status and body.
    #[allow(dead_code)]
    pub fn with_reply(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: TransportReply {
                status,
                body: body.to_string(),
            },
            failure: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Fails every send with a network-level transport error.
    #[allow(dead_code)]
    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: TransportReply {
                status: 0,
                body: String::new(),
            },
            failure: Some(message.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Number of requests this transport saw.
    #[allow(dead_code)]
    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("request lock should work").len()
    }

    /// Returns a copy of the recorded requests.
    #[allow(dead_code)]
    pub fn requests(&self) -> Vec<EncodedSubmission> {
        self.requests
            .lock()
            .expect("request lock should work")
            .clone()
    }
}

impl PredictTransport for RecordingTransport {
    fn send(
        &self,
        _endpoint: &str,
        submission: &EncodedSubmission,
    ) -> Result<TransportReply, UploadError> {
        self.requests
            .lock()
            .expect("request lock should work")
            .push(submission.clone());

        match &self.failure {
            Some(message) => Err(UploadError::Transport(message.clone())),
            None => Ok(self.reply.clone()),
        }
    }
}
