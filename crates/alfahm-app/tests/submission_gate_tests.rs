//! Integration tests for the submission precondition and re-entrancy guard.

mod common;

use alfahm_app::{AppError, SubmissionMachine, submit_active_slots};
use alfahm_core::PhotoMode;
use alfahm_slots::{InMemoryPreviewRegistry, SlotBoard};
use alfahm_ui::SessionResultStore;
use alfahm_upload::{PredictClient, StubPredictor};
use common::{RecordingTransport, filled_board, jpeg};

#[test]
fn submission_gate_tests_blocks_below_required_count() {
    let mut board = SlotBoard::new(InMemoryPreviewRegistry::new());
    board.set_mode(PhotoMode::Four);
    board.insert_from_capture(jpeg("a.jpg"), None);
    board.insert_from_capture(jpeg("b.jpg"), None);
    board.insert_from_capture(jpeg("c.jpg"), None);

    let transport = RecordingTransport::with_reply(200, "{}");
    let client = PredictClient::new("http://localhost:8000/predict-winners", transport.clone())
        .expect("client should build");
    let mut machine = SubmissionMachine::new();
    let mut store = SessionResultStore::new();

    let error = submit_active_slots(
        &board,
        &mut machine,
        &client,
        &StubPredictor::with_delay_ms(0),
        &mut store,
    )
    .expect_err("three of four photos must not submit");

    assert!(matches!(
        error,
        AppError::SubmissionBlocked {
            selected: 3,
            required: 4
        }
    ));
    assert_eq!(transport.request_count(), 0, "no request leaves the app");
}

#[test]
fn submission_gate_tests_rejects_reentrant_triggers() {
    let board = filled_board(PhotoMode::Four);
    let transport = RecordingTransport::with_reply(200, "{}");
    let client = PredictClient::new("http://localhost:8000/predict-winners", transport.clone())
        .expect("client should build");
    let mut machine = SubmissionMachine::new();
    machine.begin().expect("first begin should pass");
    let mut store = SessionResultStore::new();

    let error = submit_active_slots(
        &board,
        &mut machine,
        &client,
        &StubPredictor::with_delay_ms(0),
        &mut store,
    )
    .expect_err("second trigger while submitting must fail");

    assert!(matches!(error, AppError::SubmissionInFlight));
    assert_eq!(transport.request_count(), 0);
}
