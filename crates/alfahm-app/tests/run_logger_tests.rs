//! Integration tests for per-run file logging.

use std::fs;

use alfahm_app::{RunLogger, format_log_line};

#[test]
fn run_logger_tests_line_shape_is_stable() {
    let line = format_log_line("20260807_101500", "INFO", "camera", "open", "target=None");
    assert_eq!(line, "20260807_101500 | INFO | camera | open | target=None\n");
}

#[test]
fn run_logger_tests_writes_info_and_error_lines() {
    let directory = std::env::temp_dir().join(format!(
        "alfahm-run-logger-test-{}",
        std::process::id()
    ));
    fs::create_dir_all(&directory).expect("temp log dir should create");

    let logger = RunLogger::create_in(&directory).expect("logger should create");
    logger.info("submission", "success", "count=4");
    logger.error("camera", "open", "permission denied");

    let contents = fs::read_to_string(logger.path()).expect("log file should be readable");
    assert!(contents.contains("| INFO | submission | success | count=4"));
    assert!(contents.contains("| ERROR | camera | open | permission denied"));

    let _ = fs::remove_dir_all(&directory);
}
