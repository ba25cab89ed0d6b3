//! Stamp iteration over a private sync copy

use crate::sync::TimeSync;
use crate::Stamp;

/// Bidirectional iterator over schedule stamps
///
/// Keeps a single lookahead or lookbehind slot; changing direction drops
/// the slot of the other direction. Without a starting cursor the iterator
/// begins at the sync's first stamp.
#[derive(Debug, Clone)]
pub struct SyncIter {
    sync: TimeSync,
    cursor: Option<Stamp>,
    next: Option<Stamp>,
    previous: Option<Stamp>,
}

impl SyncIter {
    pub(crate) fn new(sync: TimeSync, cursor: Option<Stamp>) -> Self {
        Self {
            sync,
            cursor,
            next: None,
            previous: None,
        }
    }

    pub fn has_next(&mut self) -> bool {
        self.previous = None;
        if self.next.is_none() {
            self.next = match self.cursor {
                Some(cursor) => self.sync.next_after(cursor),
                None => self.sync.first_stamp(),
            };
        }
        self.next.is_some()
    }

    pub fn has_previous(&mut self) -> bool {
        self.next = None;
        if self.previous.is_none() {
            self.previous = match self.cursor {
                Some(cursor) => self.sync.previous_before(cursor),
                None => None,
            };
        }
        self.previous.is_some()
    }

    /// Step back to the stamp before the cursor
    pub fn previous(&mut self) -> Option<Stamp> {
        if !self.has_previous() {
            return None;
        }
        let stamp = self.previous.take();
        self.cursor = stamp;
        stamp
    }

    pub fn cursor(&self) -> Option<Stamp> {
        self.cursor
    }
}

impl Iterator for SyncIter {
    type Item = Stamp;

    fn next(&mut self) -> Option<Stamp> {
        if !self.has_next() {
            return None;
        }
        let stamp = self.next.take();
        self.cursor = stamp;
        stamp
    }
}
