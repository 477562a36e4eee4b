//! Integration tests for routing camera captures into the slot board.

mod common;

use std::sync::Arc;

use alfahm_app::capture_into_slot;
use alfahm_capture::{CaptureSession, CaptureState, Facing, SyntheticCameraBackend};
use alfahm_core::PhotoMode;
use alfahm_slots::{InMemoryPreviewRegistry, SlotBoard};
use common::jpeg;

#[test]
fn camera_to_slot_tests_explicit_target_wins() {
    let backend = Arc::new(SyntheticCameraBackend::new(1920, 1080));
    let mut session = CaptureSession::open(backend.clone(), Facing::Environment, Some(2));
    let mut board = SlotBoard::new(InMemoryPreviewRegistry::new());

    let inserted =
        capture_into_slot(&mut board, &mut session, 99).expect("capture should pass");

    assert_eq!(inserted, Some(2));
    assert_eq!(
        board.slot(2).map(|entry| entry.image.file_name.as_str()),
        Some("camera-99.jpg")
    );
    assert_eq!(session.state(), &CaptureState::Idle, "capture closes the UI");
    assert_eq!(backend.ledger().live, 0);
}

#[test]
fn camera_to_slot_tests_untargeted_capture_takes_first_empty_slot() {
    let backend = Arc::new(SyntheticCameraBackend::new(1280, 720));
    let mut session = CaptureSession::open(backend, Facing::Environment, None);
    let mut board = SlotBoard::new(InMemoryPreviewRegistry::new());
    board.set_mode(PhotoMode::Two);
    board
        .replace_at(0, jpeg("existing.jpg"))
        .expect("seed slot 0");

    let inserted =
        capture_into_slot(&mut board, &mut session, 7).expect("capture should pass");

    assert_eq!(inserted, Some(1), "slot 0 is taken, slot 1 is the first empty");
    assert_eq!(board.selected_count(), 2);
}

#[test]
fn camera_to_slot_tests_degenerate_frame_inserts_nothing() {
    let backend = Arc::new(SyntheticCameraBackend::new(0, 0));
    let mut session = CaptureSession::open(backend, Facing::Environment, None);
    let mut board = SlotBoard::new(InMemoryPreviewRegistry::new());

    let inserted =
        capture_into_slot(&mut board, &mut session, 7).expect("silent no-op, not an error");

    assert_eq!(inserted, None);
    assert_eq!(board.selected_count(), 0);
    assert!(session.is_streaming(), "the user may keep the camera open");
}
