//! The scheduled timer list.

use std::time::Duration;

use log::trace;

use crate::watcher::{Arena, TimerLinks, WatcherId};

/// Scheduled one-shot timers, ordered by absolute fire time.
///
/// The list is intrusive (linked through the timer watchers themselves) and
/// delta-encoded: each node stores only the gap between its own fire time
/// and its predecessor's, so a node's true remaining delay is the sum of the
/// deltas from the head up to and including itself. No absolute deadline is
/// ever stored or recomputed on insertion, and the head's delta is always
/// exactly the time remaining until the next timer fires, which the loop
/// driver uses directly as its poll timeout.
#[derive(Debug)]
pub(crate) struct Timers {
    head: Option<WatcherId>,
}

impl Timers {
    pub(crate) fn new() -> Timers {
        Timers { head: None }
    }

    pub(crate) fn head(&self) -> Option<WatcherId> {
        self.head
    }

    /// Time until the next timer fires, `None` without scheduled timers.
    pub(crate) fn next_timeout<B>(&self, watchers: &Arena<B>) -> Option<Duration> {
        self.head.map(|head| watchers[head].timer().interval)
    }

    /// Schedule `id` to fire once, `interval` from now. No-op if the timer
    /// is already active; callers must stop first to reschedule.
    pub(crate) fn start<B>(&mut self, watchers: &mut Arena<B>, id: WatcherId, interval: Duration) {
        if watchers[id].active {
            return;
        }
        watchers[id].active = true;
        trace!("scheduling timer: id={}, interval={:?}", id, interval);

        // Walk the list with a running `remaining` value: subtracting each
        // visited node's delta keeps both sides of the comparison relative
        // to the same point in time. The new timer displaces the first node
        // that fires later, or at the same instant with less urgency, which
        // keeps equal-deadline equal-priority timers in insertion order.
        let mut remaining = interval;
        let mut after = None;
        let mut before = self.head;
        while let Some(current) = before {
            let delta = watchers[current].timer().interval;
            if remaining < delta
                || (remaining == delta && watchers[id].priority < watchers[current].priority)
            {
                break;
            }
            remaining -= delta;
            after = Some(current);
            before = watchers[current].timer().scheduled_links().1;
        }

        if let Some(before) = before {
            let timer = watchers[before].timer_mut();
            // The displaced node now sits behind the new one.
            timer.interval -= remaining;
            let (_, next) = timer.scheduled_links();
            timer.links = TimerLinks::Scheduled { prev: Some(id), next };
        }
        match after {
            Some(after) => {
                let timer = watchers[after].timer_mut();
                let (prev, _) = timer.scheduled_links();
                timer.links = TimerLinks::Scheduled { prev, next: Some(id) };
            },
            None => self.head = Some(id),
        }
        let timer = watchers[id].timer_mut();
        timer.interval = remaining;
        timer.links = TimerLinks::Scheduled { prev: after, next: before };
    }

    /// Unlink a scheduled timer, adding its delta back onto its successor so
    /// the successor's delay from its new predecessor stays correct.
    ///
    /// Only handles the scheduled list; a timer that already moved into a
    /// pending row is the pending queue's to unlink.
    pub(crate) fn stop<B>(&mut self, watchers: &mut Arena<B>, id: WatcherId) {
        let (prev, next, delta) = {
            let timer = watchers[id].timer();
            let (prev, next) = timer.scheduled_links();
            (prev, next, timer.interval)
        };
        if let Some(next) = next {
            let timer = watchers[next].timer_mut();
            timer.interval += delta;
            let (_, n) = timer.scheduled_links();
            timer.links = TimerLinks::Scheduled { prev, next: n };
        }
        match prev {
            Some(prev) => {
                let timer = watchers[prev].timer_mut();
                let (p, _) = timer.scheduled_links();
                timer.links = TimerLinks::Scheduled { prev: p, next };
            },
            None => self.head = next,
        }
        watchers[id].timer_mut().links = TimerLinks::Detached;
    }

    /// Unlink the head timer because it is about to fire. The successor's
    /// delta is left untouched: it stays relative to the fired deadline,
    /// which is exactly what expiry needs.
    pub(crate) fn pop_head<B>(&mut self, watchers: &mut Arena<B>) -> Option<WatcherId> {
        let head = self.head?;
        let (_, next) = watchers[head].timer().scheduled_links();
        if let Some(next) = next {
            let timer = watchers[next].timer_mut();
            let (_, n) = timer.scheduled_links();
            timer.links = TimerLinks::Scheduled { prev: None, next: n };
        }
        self.head = next;
        watchers[head].timer_mut().links = TimerLinks::Detached;
        Some(head)
    }
}
