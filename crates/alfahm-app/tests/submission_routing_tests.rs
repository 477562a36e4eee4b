//! Integration tests for mode-dependent submission routing.

mod common;

use alfahm_app::{SubmissionMachine, SubmissionPhase, submit_active_slots};
use alfahm_core::PhotoMode;
use alfahm_ui::SessionResultStore;
use alfahm_upload::{PredictClient, STUB_WINNER_CARD_URL, StubPredictor};
use common::{RecordingTransport, filled_board};

#[test]
fn submission_routing_tests_two_photo_mode_never_touches_the_network() {
    let board = filled_board(PhotoMode::Two);
    let transport = RecordingTransport::with_reply(200, "{}");
    let client = PredictClient::new("http://localhost:8000/predict-winners", transport.clone())
        .expect("client should build");
    let mut machine = SubmissionMachine::new();
    let mut store = SessionResultStore::new();

    let stored = submit_active_slots(
        &board,
        &mut machine,
        &client,
        &StubPredictor::with_delay_ms(0),
        &mut store,
    )
    .expect("stub submission should pass");

    assert_eq!(transport.request_count(), 0, "2-photo mode is served locally");
    assert_eq!(stored.winner1_card_url.as_deref(), Some(STUB_WINNER_CARD_URL));
    assert_eq!(stored.winner2_card_url, None);
    assert_eq!(stored.count, 2);
    assert_eq!(machine.phase(), SubmissionPhase::Done);
}

#[test]
fn submission_routing_tests_four_photo_mode_posts_one_multipart_request() {
    let board = filled_board(PhotoMode::Four);
    let transport =
        RecordingTransport::with_reply(200, r#"{"winner1_card_url":"a","winner2_card_url":"b"}"#);
    let client = PredictClient::new("http://localhost:8000/predict-winners", transport.clone())
        .expect("client should build");
    let mut machine = SubmissionMachine::new();
    let mut store = SessionResultStore::new();

    let stored = submit_active_slots(
        &board,
        &mut machine,
        &client,
        &StubPredictor::with_delay_ms(0),
        &mut store,
    )
    .expect("backend submission should pass");

    assert_eq!(transport.request_count(), 1);
    let request = transport.requests().remove(0);
    assert!(
        request
            .content_type
            .starts_with("multipart/form-data; boundary=")
    );
    let body = String::from_utf8_lossy(&request.body);
    assert_eq!(
        body.matches("name=\"images\"").count(),
        4,
        "all four slots travel under one field name"
    );

    assert_eq!(stored.winner1_card_url.as_deref(), Some("a"));
    assert_eq!(stored.winner2_card_url.as_deref(), Some("b"));
    assert_eq!(stored.count, 4);
    assert_eq!(
        alfahm_ui::take_result(&mut store),
        Some(stored),
        "the results screen reads the same result back"
    );
}
