//! Integration tests for prediction endpoint policy enforcement.

mod common;

use alfahm_app::{DEFAULT_PREDICT_ENDPOINT, predict_endpoint_from_env};
use alfahm_upload::{PredictClient, UploadError, validate_predict_endpoint};
use common::RecordingTransport;

#[test]
fn endpoint_policy_tests_default_endpoint_passes_validation() {
    validate_predict_endpoint(DEFAULT_PREDICT_ENDPOINT)
        .expect("shipped default must satisfy its own policy");
}

#[test]
fn endpoint_policy_tests_client_rejects_foreign_paths() {
    let transport = RecordingTransport::with_reply(200, "{}");
    let error = PredictClient::new("http://localhost:8000/other-endpoint", transport)
        .expect_err("foreign path must be rejected");
    assert!(matches!(error, UploadError::InvalidEndpoint(_)));
}

#[test]
fn endpoint_policy_tests_env_override_wins() {
    // Safety:
    // - Integration tests mutate process env in a single-threaded test body.
    // - We reset the variable before returning.
    unsafe { std::env::set_var("ALFAHM_PREDICT_URL", "https://api.example.test/predict-winners") };
    assert_eq!(
        predict_endpoint_from_env(),
        "https://api.example.test/predict-winners"
    );

    // Safety: see rationale above.
    unsafe { std::env::remove_var("ALFAHM_PREDICT_URL") };
    assert_eq!(predict_endpoint_from_env(), DEFAULT_PREDICT_ENDPOINT);
}
