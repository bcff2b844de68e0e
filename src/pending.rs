//! Pending watcher queues.
//!
//! A watcher whose event occurred but whose callback has not run yet sits in
//! one of these rows, one bounded row per priority level. Within a row the
//! entries are kept sorted by occurred-event mask, so watchers of the same
//! priority with different event combinations occupy distinct, order-stable
//! slots found by binary search. Every pending watcher caches its own slot
//! index, making removal before dispatch cheap.
//!
//! Expired timers are special cased: all of a priority's ready timers share
//! the row's single `TIMER` slot, chained through their intrusive links in
//! fire order. The links are free to reuse for this because an expired timer
//! has already left the scheduled list.

use arrayvec::ArrayVec;
use log::trace;

use crate::event::{Ready, PRIORITY_LEVELS};
use crate::watcher::{Arena, Kind, TimerLinks, WatcherId};
use crate::PENDING_CAPACITY;

/// A watcher whose event occurred, with the events that did.
#[derive(Copy, Clone, Debug)]
pub(crate) struct PendingEntry {
    pub(crate) watcher: WatcherId,
    pub(crate) occurred: Ready,
}

/// The per-priority pending rows.
#[derive(Debug)]
pub(crate) struct Pending {
    rows: [ArrayVec<PendingEntry, PENDING_CAPACITY>; PRIORITY_LEVELS],
}

impl Pending {
    pub(crate) fn new() -> Pending {
        Pending {
            rows: Default::default(),
        }
    }

    /// Queue an io watcher with the events that occurred. The caller must
    /// have checked that the watcher is active and not already pending.
    pub(crate) fn mark_io<B>(&mut self, watchers: &mut Arena<B>, id: WatcherId, occurred: Ready) {
        let row = watchers[id].priority.row();
        assert!(!self.rows[row].is_full(),
            "pending row overflow: more than {} watchers ready at one priority", PENDING_CAPACITY);
        trace!("marking io watcher pending: id={}, occurred={:?}", id, occurred);

        // Insert after any equal masks so that dispatch within a priority
        // stays first-marked-first.
        let slot = self.rows[row].partition_point(|entry| entry.occurred.bits() <= occurred.bits());
        self.rows[row].insert(slot, PendingEntry { watcher: id, occurred });
        watchers[id].pending = Some(slot);
        self.refresh_cached(watchers, row, slot + 1);
    }

    /// Queue an expired timer in its priority's `TIMER` slot, chaining it
    /// behind any timers already there so fire order is preserved.
    pub(crate) fn mark_timer<B>(&mut self, watchers: &mut Arena<B>, id: WatcherId) {
        let row = watchers[id].priority.row();
        trace!("marking timer pending: id={}", id);
        match self.rows[row].binary_search_by_key(&Ready::TIMER.bits(), |entry| entry.occurred.bits()) {
            Ok(slot) => {
                let mut tail = self.rows[row][slot].watcher;
                while let Some(next) = watchers[tail].timer().pending_links().1 {
                    tail = next;
                }
                let (prev, _) = watchers[tail].timer().pending_links();
                watchers[tail].timer_mut().links = TimerLinks::Pending { prev, next: Some(id) };
                watchers[id].timer_mut().links = TimerLinks::Pending { prev: Some(tail), next: None };
                watchers[id].pending = Some(slot);
            },
            Err(slot) => {
                assert!(!self.rows[row].is_full(),
                    "pending row overflow: more than {} watchers ready at one priority", PENDING_CAPACITY);
                self.rows[row].insert(slot, PendingEntry { watcher: id, occurred: Ready::TIMER });
                watchers[id].timer_mut().links = TimerLinks::Pending { prev: None, next: None };
                watchers[id].pending = Some(slot);
                self.refresh_cached(watchers, row, slot + 1);
            },
        }
    }

    /// Remove a watcher from its row before it is dispatched, using the
    /// slot index cached on the watcher.
    pub(crate) fn unmark<B>(&mut self, watchers: &mut Arena<B>, id: WatcherId) {
        let slot = match watchers[id].pending.take() {
            Some(slot) => slot,
            None => panic!("tried to unmark watcher {} which is not pending", id),
        };
        let row = watchers[id].priority.row();
        trace!("unmarking pending watcher: id={}", id);

        if let Kind::Timer(_) = watchers[id].kind {
            let (prev, next) = watchers[id].timer().pending_links();
            watchers[id].timer_mut().links = TimerLinks::Detached;
            if let Some(next) = next {
                let (_, n) = watchers[next].timer().pending_links();
                watchers[next].timer_mut().links = TimerLinks::Pending { prev, next: n };
            }
            match prev {
                Some(prev) => {
                    let (p, _) = watchers[prev].timer().pending_links();
                    watchers[prev].timer_mut().links = TimerLinks::Pending { prev: p, next };
                },
                None => {
                    assert_eq!(self.rows[row][slot].watcher, id,
                        "pending slot cache out of sync for watcher {}", id);
                    match next {
                        // The chain shrinks but keeps its slot.
                        Some(next) => self.rows[row][slot].watcher = next,
                        None => {
                            let _ = self.rows[row].remove(slot);
                            self.refresh_cached(watchers, row, slot);
                        },
                    }
                },
            }
        } else {
            assert_eq!(self.rows[row][slot].watcher, id,
                "pending slot cache out of sync for watcher {}", id);
            let _ = self.rows[row].remove(slot);
            self.refresh_cached(watchers, row, slot);
        }
    }

    /// Take the next watcher to dispatch: the front slot of the most urgent
    /// nonempty row, or the head of the timer chain sitting in that slot.
    ///
    /// Callers loop over this, which makes the drain restart from the most
    /// urgent row after every single dispatch; a callback that queues or
    /// unmarks watchers at any priority is honoured immediately.
    pub(crate) fn pop_front<B>(&mut self, watchers: &mut Arena<B>) -> Option<(WatcherId, Ready)> {
        let row = (0..PRIORITY_LEVELS).find(|&row| !self.rows[row].is_empty())?;
        let entry = self.rows[row][0];
        let id = entry.watcher;
        watchers[id].pending = None;

        if let Kind::Timer(_) = watchers[id].kind {
            let (_, next) = watchers[id].timer().pending_links();
            watchers[id].timer_mut().links = TimerLinks::Detached;
            match next {
                Some(next) => {
                    let (_, n) = watchers[next].timer().pending_links();
                    watchers[next].timer_mut().links = TimerLinks::Pending { prev: None, next: n };
                    self.rows[row][0].watcher = next;
                },
                None => {
                    let _ = self.rows[row].remove(0);
                    self.refresh_cached(watchers, row, 0);
                },
            }
        } else {
            let _ = self.rows[row].remove(0);
            self.refresh_cached(watchers, row, 0);
        }

        Some((id, entry.occurred))
    }

    /// Re-point the cached slot index of every entry in `row` from `start`
    /// on, after an insertion or removal shifted them. For a timer chain
    /// every member caches the chain's slot.
    fn refresh_cached<B>(&self, watchers: &mut Arena<B>, row: usize, start: usize) {
        for (index, entry) in self.rows[row].iter().enumerate().skip(start) {
            if let Kind::Timer(_) = watchers[entry.watcher].kind {
                let mut current = Some(entry.watcher);
                while let Some(id) = current {
                    watchers[id].pending = Some(index);
                    current = watchers[id].timer().pending_links().1;
                }
            } else {
                watchers[entry.watcher].pending = Some(index);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn row(&self, row: usize) -> &[PendingEntry] {
        &self.rows[row]
    }
}
