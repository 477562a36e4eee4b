#![warn(missing_docs)]
//! # alfahm-slots
//!
//! ## Purpose
//! Owns the fixed 4-slot photo board and the lifetime of every preview
//! handle bound to a slot.
//!
//! ## Responsibilities
//! - Track per-slot preview handles and release each exactly once.
//! - Enforce the "2 or 4 active slots" session invariant.
//! - Mediate bulk fill, single-slot replace, camera insertion, and reset.
//!
//! ## Data flow
//! Picker and capture code hand owned [`ImageSource`] values to
//! [`SlotBoard`]; every insertion binds a preview through the configured
//! [`PreviewRegistry`] and every removal releases the old handle in the same
//! mutation.
//!
//! ## Ownership and lifetimes
//! The board exclusively owns all slot entries and their handles. A handle
//! never outlives its slot's content and is never released twice; the board
//! releases whatever is still bound when it is dropped.
//!
//! ## Error model
//! Count mismatches, disabled-slot writes, and non-image payloads return
//! [`SlotError`] variants without mutating any slot.
//!
//! ## Security and privacy notes
//! Slot contents stay in memory for the session only; nothing here persists
//! or logs image bytes.
//!
//! ## Example
//! ```rust
//! use alfahm_core::{ImageSource, PhotoMode};
//! use alfahm_slots::{InMemoryPreviewRegistry, SlotBoard};
//!
//! let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0];
//! let image = ImageSource::from_file_bytes("a.jpg", jpeg).unwrap();
//! let mut board = SlotBoard::new(InMemoryPreviewRegistry::new());
//! board.set_mode(PhotoMode::Two);
//! board.bulk_fill(vec![image.clone(), image]).unwrap();
//! assert!(board.can_submit());
//! ```

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use alfahm_core::{CoreError, ImageSource, PhotoMode};
use thiserror::Error;

/// Number of fixed slot positions on the board.
pub const SLOT_COUNT: usize = 4;

/// Opaque renderable reference to the bytes behind one slot preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PreviewHandle(u64);

impl PreviewHandle {
    /// Returns the raw handle id, for diagnostics only.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Creates and invalidates renderable preview references.
///
/// Every handle produced by `bind` must be released exactly once, no later
/// than when its owning slot's content is replaced or cleared, and no
/// earlier. [`SlotBoard`] is the only caller in this workspace and upholds
/// that contract structurally.
pub trait PreviewRegistry {
    /// Creates a renderable reference for an image payload.
    fn bind(&mut self, source: &ImageSource) -> PreviewHandle;

    /// Invalidates a previously bound reference.
    ///
    /// # Returns
    /// `false` when the handle was unknown or already released; callers
    /// treat that as a lifetime bug, not a recoverable condition.
    fn release(&mut self, handle: PreviewHandle) -> bool;

    /// Number of currently live handles.
    fn live_handles(&self) -> usize;
}

/// Bookkeeping snapshot of one registry's lifetime history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreviewLedgerSnapshot {
    /// Handles currently live.
    pub live: usize,
    /// Total handles ever bound.
    pub bound_total: u64,
    /// Total handles released.
    pub released_total: u64,
    /// Release calls that targeted an unknown or already-released handle.
    pub double_releases: u64,
}

#[derive(Debug, Default)]
struct PreviewLedger {
    next_id: u64,
    live: BTreeSet<u64>,
    bound_total: u64,
    released_total: u64,
    double_releases: u64,
}

/// In-memory registry with a shared ledger.
///
/// Clones share one ledger, so a test can keep a clone, hand the original to
/// a [`SlotBoard`], and assert the exactly-once release invariant afterward.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPreviewRegistry {
    ledger: Arc<Mutex<PreviewLedger>>,
}

impl InMemoryPreviewRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the ledger for invariant checks.
    pub fn snapshot(&self) -> PreviewLedgerSnapshot {
        let ledger = self.lock_ledger();
        PreviewLedgerSnapshot {
            live: ledger.live.len(),
            bound_total: ledger.bound_total,
            released_total: ledger.released_total,
            double_releases: ledger.double_releases,
        }
    }

    fn lock_ledger(&self) -> std::sync::MutexGuard<'_, PreviewLedger> {
        // A poisoned ledger only means a previous holder panicked mid-update;
        // the counters themselves remain usable.
        self.ledger
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl PreviewRegistry for InMemoryPreviewRegistry {
    fn bind(&mut self, _source: &ImageSource) -> PreviewHandle {
        let mut ledger = self.lock_ledger();
        ledger.next_id += 1;
        let id = ledger.next_id;
        ledger.live.insert(id);
        ledger.bound_total += 1;
        PreviewHandle(id)
    }

    fn release(&mut self, handle: PreviewHandle) -> bool {
        let mut ledger = self.lock_ledger();
        if ledger.live.remove(&handle.0) {
            ledger.released_total += 1;
            true
        } else {
            ledger.double_releases += 1;
            false
        }
    }

    fn live_handles(&self) -> usize {
        self.lock_ledger().live.len()
    }
}

/// One occupied slot: the payload plus its live preview reference.
#[derive(Debug, Clone)]
pub struct SlotEntry {
    /// Encoded image payload submitted to the backend.
    pub image: ImageSource,
    /// Live preview reference for this payload.
    pub preview: PreviewHandle,
}

/// Fixed 4-slot photo board with an active-mode window.
///
/// The array size never changes; [`PhotoMode`] acts purely as a view
/// constraint over the first 2 or 4 positions.
#[derive(Debug)]
pub struct SlotBoard<R: PreviewRegistry> {
    mode: PhotoMode,
    slots: [Option<SlotEntry>; SLOT_COUNT],
    registry: R,
}

impl<R: PreviewRegistry> SlotBoard<R> {
    /// Creates an empty board in 4-photo mode.
    pub fn new(registry: R) -> Self {
        Self {
            mode: PhotoMode::Four,
            slots: [None, None, None, None],
            registry,
        }
    }

    /// Returns the active photo mode.
    pub fn mode(&self) -> PhotoMode {
        self.mode
    }

    /// Switches the active mode.
    ///
    /// Switching 4->2 clears slots 2-3 and releases their handles; slots
    /// 0-1 are untouched. Switching 2->4 never auto-fills.
    pub fn set_mode(&mut self, mode: PhotoMode) {
        self.mode = mode;
        for index in mode.required_count()..SLOT_COUNT {
            self.clear_slot(index);
        }
        self.debug_check();
    }

    /// Fills slots `0..mode` from an ordered selection.
    ///
    /// # Errors
    /// Returns [`SlotError::CountMismatch`] and leaves every slot unchanged
    /// when the selection size is not exactly the active mode's count.
    pub fn bulk_fill(&mut self, images: Vec<ImageSource>) -> Result<(), SlotError> {
        let expected = self.mode.required_count();
        if images.len() != expected {
            return Err(SlotError::CountMismatch {
                expected,
                actual: images.len(),
            });
        }

        // Release everything previously bound, then bind the new selection.
        for index in 0..SLOT_COUNT {
            self.clear_slot(index);
        }
        for (index, image) in images.into_iter().enumerate() {
            let preview = self.registry.bind(&image);
            self.slots[index] = Some(SlotEntry { image, preview });
        }
        self.debug_check();
        Ok(())
    }

    /// Replaces the content of one active slot.
    ///
    /// # Errors
    /// Returns [`SlotError::SlotDisabled`] when the index lies outside the
    /// active mode window; no slot changes.
    pub fn replace_at(&mut self, index: usize, image: ImageSource) -> Result<(), SlotError> {
        let required = self.mode.required_count();
        if index >= required {
            return Err(SlotError::SlotDisabled { index, required });
        }

        self.clear_slot(index);
        let preview = self.registry.bind(&image);
        self.slots[index] = Some(SlotEntry { image, preview });
        self.debug_check();
        Ok(())
    }

    /// Inserts a camera capture, resolving the destination slot.
    ///
    /// An explicit in-range target wins; otherwise the first unoccupied
    /// active slot; otherwise slot 0 is overwritten so a capture always
    /// lands somewhere visible.
    ///
    /// # Returns
    /// The slot index written, or `None` when the resolved index fell
    /// outside the active range (defensive guard; the payload is dropped
    /// without binding a preview).
    pub fn insert_from_capture(
        &mut self,
        image: ImageSource,
        target: Option<usize>,
    ) -> Option<usize> {
        let required = self.mode.required_count();
        let resolved = match target {
            Some(index) if index < required => index,
            _ => (0..required)
                .find(|&index| self.slots[index].is_none())
                .unwrap_or(0),
        };

        if resolved >= required {
            return None;
        }

        self.clear_slot(resolved);
        let preview = self.registry.bind(&image);
        self.slots[resolved] = Some(SlotEntry { image, preview });
        self.debug_check();
        Some(resolved)
    }

    /// Clears and releases all 4 slots regardless of mode.
    pub fn reset(&mut self) {
        for index in 0..SLOT_COUNT {
            self.clear_slot(index);
        }
        self.debug_check();
    }

    /// Number of occupied slots.
    pub fn selected_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Returns `true` when the occupied count matches the active mode.
    pub fn can_submit(&self) -> bool {
        self.selected_count() == self.mode.required_count()
    }

    /// Returns one slot entry, if occupied.
    pub fn slot(&self, index: usize) -> Option<&SlotEntry> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Occupied payloads inside the active window, in slot order.
    pub fn active_images(&self) -> Vec<&ImageSource> {
        self.slots[..self.mode.required_count()]
            .iter()
            .flatten()
            .map(|entry| &entry.image)
            .collect()
    }

    /// Returns the preview registry for inspection.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    fn clear_slot(&mut self, index: usize) {
        if let Some(entry) = self.slots[index].take() {
            self.registry.release(entry.preview);
        }
    }

    fn debug_check(&self) {
        // Invariant:
        // - Slots beyond the active mode window are always empty.
        debug_assert!(
            self.slots[self.mode.required_count()..]
                .iter()
                .all(Option::is_none)
        );
    }
}

impl<R: PreviewRegistry> Drop for SlotBoard<R> {
    fn drop(&mut self) {
        // Teardown must release whatever is still bound, exactly once.
        for index in 0..SLOT_COUNT {
            self.clear_slot(index);
        }
    }
}

/// Error type for slot board mutations.
#[derive(Debug, Error)]
pub enum SlotError {
    /// Bulk selection size does not match the active mode.
    #[error("exactly {expected} images are required, got {actual}")]
    CountMismatch {
        /// Required image count for the active mode.
        expected: usize,
        /// Number of images actually selected.
        actual: usize,
    },
    /// Mutation targeted a slot beyond the active mode window.
    #[error("slot {index} is disabled in {required}-photo mode")]
    SlotDisabled {
        /// Slot index the caller targeted.
        index: usize,
        /// Active mode's slot count.
        required: usize,
    },
    /// The supplied file is not image data.
    #[error("invalid image payload: {0}")]
    InvalidPayload(#[from] CoreError),
}

#[cfg(test)]
mod tests {
    //! Unit tests for slot resolution and registry bookkeeping.

    use super::*;

    fn jpeg(name: &str) -> ImageSource {
        ImageSource::from_file_bytes(name, vec![0xFF, 0xD8, 0xFF, 0xE0]).expect("valid jpeg stub")
    }

    #[test]
    fn capture_prefers_explicit_target_then_first_empty() {
        let registry = InMemoryPreviewRegistry::new();
        let mut board = SlotBoard::new(registry);

        assert_eq!(board.insert_from_capture(jpeg("a.jpg"), None), Some(0));
        assert_eq!(board.insert_from_capture(jpeg("b.jpg"), Some(3)), Some(3));
        assert_eq!(board.insert_from_capture(jpeg("c.jpg"), None), Some(1));
    }

    #[test]
    fn capture_overwrites_first_slot_when_board_is_full() {
        let registry = InMemoryPreviewRegistry::new();
        let mut board = SlotBoard::new(registry);
        board.set_mode(PhotoMode::Two);
        board
            .bulk_fill(vec![jpeg("a.jpg"), jpeg("b.jpg")])
            .expect("bulk fill should pass");

        assert_eq!(board.insert_from_capture(jpeg("c.jpg"), None), Some(0));
        assert_eq!(board.slot(0).map(|entry| entry.image.file_name.as_str()), Some("c.jpg"));
    }

    #[test]
    fn registry_flags_double_release() {
        let mut registry = InMemoryPreviewRegistry::new();
        let handle = registry.bind(&jpeg("a.jpg"));
        assert!(registry.release(handle));
        assert!(!registry.release(handle));
        assert_eq!(registry.snapshot().double_releases, 1);
    }

    #[test]
    fn drop_releases_remaining_handles() {
        let registry = InMemoryPreviewRegistry::new();
        let observer = registry.clone();
        {
            let mut board = SlotBoard::new(registry);
            board
                .bulk_fill(vec![jpeg("a.jpg"), jpeg("b.jpg"), jpeg("c.jpg"), jpeg("d.jpg")])
                .expect("bulk fill should pass");
            assert_eq!(observer.live_handles(), 4);
        }
        assert_eq!(observer.live_handles(), 0);
        assert_eq!(observer.snapshot().double_releases, 0);
    }
}
