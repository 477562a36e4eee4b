//! Integration tests for submission failure handling.

mod common;

use alfahm_app::{AppError, SubmissionMachine, SubmissionPhase, submit_active_slots, user_message_for};
use alfahm_core::PhotoMode;
use alfahm_predict_contract::StoredResult;
use alfahm_ui::{RESULT_STORE_KEY, SessionResultStore, store_result};
use alfahm_upload::{PredictClient, StubPredictor, UploadError};
use common::{RecordingTransport, filled_board};

fn previous_result() -> StoredResult {
    StoredResult {
        winner1_card_url: Some("earlier-winner".to_string()),
        winner2_card_url: None,
        count: 2,
    }
}

#[test]
fn submission_failure_tests_server_error_leaves_previous_result_untouched() {
    let board = filled_board(PhotoMode::Four);
    let transport = RecordingTransport::with_reply(500, r#"{"error":"Backend error"}"#);
    let client = PredictClient::new("http://localhost:8000/predict-winners", transport)
        .expect("client should build");
    let mut machine = SubmissionMachine::new();
    let mut store = SessionResultStore::new();
    store_result(&mut store, &previous_result()).expect("seed result should store");
    let seeded = store.peek(RESULT_STORE_KEY).map(str::to_string);

    let error = submit_active_slots(
        &board,
        &mut machine,
        &client,
        &StubPredictor::with_delay_ms(0),
        &mut store,
    )
    .expect_err("500 reply must fail");

    assert!(matches!(
        error,
        AppError::Upload(UploadError::Server { status: 500, .. })
    ));
    assert_eq!(store.peek(RESULT_STORE_KEY).map(str::to_string), seeded);
    assert_eq!(
        machine.phase(),
        SubmissionPhase::Idle,
        "the user may retry after a failure"
    );
}

#[test]
fn submission_failure_tests_network_failure_reads_like_a_status_failure() {
    let board = filled_board(PhotoMode::Four);
    let transport = RecordingTransport::failing("connection refused");
    let client = PredictClient::new("http://localhost:8000/predict-winners", transport)
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
    .expect_err("network failure must fail");

    assert!(matches!(error, AppError::Upload(UploadError::Transport(_))));
    assert!(store.peek(RESULT_STORE_KEY).is_none());
    assert_eq!(machine.phase(), SubmissionPhase::Idle);
}

#[test]
fn submission_failure_tests_malformed_success_body_is_rejected() {
    let board = filled_board(PhotoMode::Four);
    let transport = RecordingTransport::with_reply(200, "<html>not json</html>");
    let client = PredictClient::new("http://localhost:8000/predict-winners", transport)
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
    .expect_err("unparsable success body must fail");

    assert!(matches!(error, AppError::Contract(_)));
    assert!(store.peek(RESULT_STORE_KEY).is_none());
    assert_eq!(machine.phase(), SubmissionPhase::Idle);
}

#[test]
fn submission_failure_tests_user_message_surfaces_backend_payload() {
    let error = AppError::Upload(UploadError::Server {
        status: 500,
        body: r#"{"error":"Backend error"}"#.to_string(),
    });
    let message = user_message_for(&error);
    assert!(message.contains("Backend error"));
    assert!(message.contains("retry"), "server failures invite a retry");

    let opaque = AppError::Upload(UploadError::Server {
        status: 502,
        body: "<html>bad gateway</html>".to_string(),
    });
    let message = user_message_for(&opaque);
    assert!(message.contains("Something went wrong"));
}
