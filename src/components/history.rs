use std::collections::VecDeque;

use crate::canvas::{PixelColor, SpriteRaster};

// ============================================================================
// UNDO JOURNAL — bounded LIFO stack of reversible pixel edits
// ============================================================================

/// Maximum number of entries retained in the journal.  Pushing beyond this
/// evicts the oldest entry, never the newest.
pub const MAX_UNDO_DEPTH: usize = 9999;

/// One cell's transition inside an undoable edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelChange {
    pub x: u32,
    pub y: u32,
    pub old: PixelColor,
    pub new: PixelColor,
}

/// An undoable edit: a lone cell write, or a set of writes applied and
/// reverted as one unit (a pen stroke, a flood fill, a drag commit).
#[derive(Clone, Debug)]
pub enum UndoEntry {
    Single(PixelChange),
    Group(Vec<PixelChange>),
}

impl UndoEntry {
    pub fn changes(&self) -> &[PixelChange] {
        match self {
            UndoEntry::Single(change) => std::slice::from_ref(change),
            UndoEntry::Group(changes) => changes,
        }
    }
}

/// Journal of reversible edits with gesture coalescing.
///
/// `begin_group` / `end_group` bracket one continuous gesture; every
/// `record_change` in between lands in a single grouped entry.  Undoing
/// restores each contained cell's old color.  There is no redo stack.
pub struct UndoJournal {
    entries: VecDeque<UndoEntry>,
    /// Changes accumulated between `begin_group` and `end_group`.
    open_group: Option<Vec<PixelChange>>,
    max_depth: usize,
}

impl Default for UndoJournal {
    fn default() -> Self {
        Self::new(MAX_UNDO_DEPTH)
    }
}

impl UndoJournal {
    pub fn new(max_depth: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            open_group: None,
            max_depth: max_depth.max(1),
        }
    }

    /// Start accumulating a gesture.  An unmatched earlier `begin_group`
    /// is committed first so its changes are never lost.
    pub fn begin_group(&mut self) {
        if let Some(pending) = self.open_group.take() {
            self.push_group(pending);
        }
        self.open_group = Some(Vec::new());
    }

    /// Commit the open gesture as one grouped entry.  A gesture that
    /// changed nothing produces no entry.
    pub fn end_group(&mut self) {
        if let Some(pending) = self.open_group.take() {
            self.push_group(pending);
        }
    }

    /// Record one cell write.  No-op when the color did not change.
    /// Joins the open group if there is one, otherwise pushes a
    /// standalone entry immediately.
    pub fn record_change(&mut self, change: PixelChange) {
        if change.old == change.new {
            return;
        }
        match self.open_group.as_mut() {
            Some(group) => group.push(change),
            None => self.push_entry(UndoEntry::Single(change)),
        }
    }

    /// Push an already-complete group atomically (flood fill, drag commit).
    /// An empty list produces no entry.
    pub fn record_group(&mut self, changes: Vec<PixelChange>) {
        self.push_group(changes);
    }

    fn push_group(&mut self, changes: Vec<PixelChange>) {
        if changes.is_empty() {
            return;
        }
        self.push_entry(UndoEntry::Group(changes));
    }

    fn push_entry(&mut self, entry: UndoEntry) {
        // Evict the oldest entries first so recent history survives.
        while self.entries.len() >= self.max_depth {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Revert the most recent entry onto `raster`.  Restoring is
    /// idempotent per cell, so application order within the entry does
    /// not matter.  No-op when the journal is empty.
    pub fn undo(&mut self, raster: &mut SpriteRaster) {
        let Some(entry) = self.entries.pop_back() else {
            return;
        };
        for change in entry.changes() {
            raster.set_pixel(change.x, change.y, change.old);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries oldest-first (the order they would be evicted in).
    pub fn iter(&self) -> impl Iterator<Item = &UndoEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.open_group = None;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(r: u8, g: u8, b: u8) -> PixelColor {
        PixelColor::Solid(Rgba([r, g, b, 255]))
    }

    fn change(x: u32, y: u32, old: PixelColor, new: PixelColor) -> PixelChange {
        PixelChange { x, y, old, new }
    }

    #[test]
    fn record_change_skips_identity_writes() {
        let mut journal = UndoJournal::default();
        journal.record_change(change(0, 0, solid(1, 2, 3), solid(1, 2, 3)));
        assert!(!journal.can_undo());

        journal.record_change(change(0, 0, PixelColor::Transparent, solid(1, 2, 3)));
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn empty_group_produces_no_entry() {
        let mut journal = UndoJournal::default();
        journal.begin_group();
        journal.end_group();
        assert!(!journal.can_undo());

        // A group whose only changes are identity writes is also empty.
        journal.begin_group();
        journal.record_change(change(3, 3, solid(9, 9, 9), solid(9, 9, 9)));
        journal.end_group();
        assert!(!journal.can_undo());
    }

    #[test]
    fn grouped_changes_revert_as_one_unit() {
        let mut raster = SpriteRaster::new(4, 4);
        let red = solid(255, 0, 0);

        let mut journal = UndoJournal::default();
        journal.begin_group();
        for x in 0..4 {
            journal.record_change(change(x, 1, raster.get_pixel(x, 1), red));
            raster.set_pixel(x, 1, red);
        }
        journal.end_group();
        assert_eq!(journal.len(), 1);

        journal.undo(&mut raster);
        for x in 0..4 {
            assert_eq!(raster.get_pixel(x, 1), PixelColor::Transparent);
        }
        assert!(!journal.can_undo());
    }

    #[test]
    fn standalone_changes_push_immediately() {
        let mut raster = SpriteRaster::new(2, 2);
        let mut journal = UndoJournal::default();

        journal.record_change(change(0, 0, PixelColor::Transparent, solid(1, 1, 1)));
        raster.set_pixel(0, 0, solid(1, 1, 1));
        journal.record_change(change(1, 1, PixelColor::Transparent, solid(2, 2, 2)));
        raster.set_pixel(1, 1, solid(2, 2, 2));
        assert_eq!(journal.len(), 2);

        // LIFO: the (1,1) write reverts first.
        journal.undo(&mut raster);
        assert_eq!(raster.get_pixel(1, 1), PixelColor::Transparent);
        assert_eq!(raster.get_pixel(0, 0), solid(1, 1, 1));

        journal.undo(&mut raster);
        assert_eq!(raster.get_pixel(0, 0), PixelColor::Transparent);
    }

    #[test]
    fn capacity_evicts_oldest_entry() {
        let mut journal = UndoJournal::default();
        for i in 0..10_000u32 {
            journal.record_group(vec![change(
                i % 100,
                i / 100,
                PixelColor::Transparent,
                solid((i % 251) as u8, 0, 0),
            )]);
        }
        assert_eq!(journal.len(), MAX_UNDO_DEPTH);

        // The first entry pushed (i == 0, cell (0,0)) was evicted; the
        // oldest survivor is i == 1 and the newest is i == 9999.
        let oldest = journal.iter().next().unwrap();
        assert_eq!(oldest.changes()[0], change(1, 0, PixelColor::Transparent, solid(1, 0, 0)));
        let newest = journal.iter().last().unwrap();
        assert_eq!(newest.changes()[0].x, 9999 % 100);
    }

    #[test]
    fn undo_on_empty_journal_is_a_no_op() {
        let mut raster = SpriteRaster::new(2, 2);
        let mut journal = UndoJournal::default();
        journal.undo(&mut raster);
        assert!(!raster.has_content());
    }

    #[test]
    fn begin_group_commits_a_dangling_open_group() {
        let mut journal = UndoJournal::default();
        journal.begin_group();
        journal.record_change(change(0, 0, PixelColor::Transparent, solid(5, 5, 5)));
        // Gesture interrupted: a new one starts without end_group.
        journal.begin_group();
        journal.record_change(change(1, 0, PixelColor::Transparent, solid(6, 6, 6)));
        journal.end_group();
        assert_eq!(journal.len(), 2);
    }
}
