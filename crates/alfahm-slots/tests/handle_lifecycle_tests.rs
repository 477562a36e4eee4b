//! Tests the exactly-once preview-handle release invariant across operation
//! sequences.

use alfahm_core::{ImageSource, PhotoMode};
use alfahm_slots::{InMemoryPreviewRegistry, SlotBoard};

fn jpeg(name: &str) -> ImageSource {
    ImageSource::from_file_bytes(name, vec![0xFF, 0xD8, 0xFF, 0xE0]).expect("valid jpeg stub")
}

#[test]
fn handle_lifecycle_tests_release_exactly_once_across_mixed_operations() {
    let registry = InMemoryPreviewRegistry::new();
    let observer = registry.clone();
    let mut board = SlotBoard::new(registry);

    board
        .bulk_fill(vec![jpeg("a.jpg"), jpeg("b.jpg"), jpeg("c.jpg"), jpeg("d.jpg")])
        .expect("bulk fill should pass");
    board
        .replace_at(1, jpeg("b2.jpg"))
        .expect("replace should pass");
    board.insert_from_capture(jpeg("cam.jpg"), Some(2));
    board.set_mode(PhotoMode::Two);
    board.set_mode(PhotoMode::Four);
    board.insert_from_capture(jpeg("cam2.jpg"), None);
    board.reset();

    let snapshot = observer.snapshot();
    assert_eq!(snapshot.live, 0, "no handle may outlive its slot content");
    assert_eq!(snapshot.released_total, snapshot.bound_total);
    assert_eq!(snapshot.double_releases, 0, "no handle may be released twice");
}

#[test]
fn handle_lifecycle_tests_failed_bulk_fill_releases_nothing() {
    let registry = InMemoryPreviewRegistry::new();
    let observer = registry.clone();
    let mut board = SlotBoard::new(registry);

    board
        .bulk_fill(vec![jpeg("a.jpg"), jpeg("b.jpg"), jpeg("c.jpg"), jpeg("d.jpg")])
        .expect("bulk fill should pass");
    let before = observer.snapshot();

    board
        .bulk_fill(vec![jpeg("x.jpg")])
        .expect_err("short selection must fail");

    assert_eq!(observer.snapshot(), before, "failed fill must not touch handles");
    assert_eq!(board.selected_count(), 4);
}

#[test]
fn handle_lifecycle_tests_replace_releases_only_that_slot() {
    let registry = InMemoryPreviewRegistry::new();
    let observer = registry.clone();
    let mut board = SlotBoard::new(registry);
    board.set_mode(PhotoMode::Two);
    board
        .bulk_fill(vec![jpeg("a.jpg"), jpeg("b.jpg")])
        .expect("bulk fill should pass");
    let untouched = board.slot(1).expect("slot 1 occupied").preview;

    board
        .replace_at(0, jpeg("a2.jpg"))
        .expect("replace should pass");

    let snapshot = observer.snapshot();
    assert_eq!(snapshot.live, 2);
    assert_eq!(snapshot.released_total, 1);
    assert_eq!(board.slot(1).expect("slot 1 occupied").preview, untouched);
}
