//! Watcher state shared by all watcher kinds.
//!
//! Watchers live in an arena owned by the event loop and are referred to by
//! [`WatcherId`]. The intrusive lists the engine maintains (the per-handle
//! watcher list, the scheduled timer list and the pending timer chain) link
//! watchers through arena indices instead of pointers, which keeps unlinking
//! O(1) without aliasing.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::time::Duration;

use crate::event::{Handle, Priority, Ready};
use crate::poll::EventLoop;

/// Identifier of a watcher registered with an [`EventLoop`].
///
/// Returned by the `add_*` registration methods and passed back to every
/// watcher operation. Ids stay valid for the lifetime of the loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct WatcherId(pub(crate) usize);

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callback invoked when a watcher's event occurred.
///
/// The callback gets the loop itself, the id of the watcher that fired and
/// the set of events that occurred. It may call any watcher operation,
/// including stopping or restarting the very watcher it was invoked for.
pub type Callback<B> = Box<dyn FnMut(&mut EventLoop<B>, WatcherId, Ready)>;

/// State common to every watcher kind.
///
/// Invariant: `pending.is_some()` implies `active`.
pub(crate) struct Watcher<B> {
    pub(crate) active: bool,
    /// Slot index in this watcher's pending row, `None` while not pending.
    /// Caching the index makes removal before dispatch cheap.
    pub(crate) pending: Option<usize>,
    pub(crate) priority: Priority,
    /// Taken out of the slot while the callback runs, so the callback can
    /// borrow the loop.
    pub(crate) callback: Option<Callback<B>>,
    pub(crate) kind: Kind,
}

impl<B> Watcher<B> {
    pub(crate) fn new(priority: Priority, callback: Callback<B>, kind: Kind) -> Watcher<B> {
        Watcher {
            active: false,
            pending: None,
            priority,
            callback: Some(callback),
            kind,
        }
    }

    pub(crate) fn timer(&self) -> &TimerState {
        match self.kind {
            Kind::Timer(ref timer) => timer,
            _ => panic!("watcher is not a timer"),
        }
    }

    pub(crate) fn timer_mut(&mut self) -> &mut TimerState {
        match self.kind {
            Kind::Timer(ref mut timer) => timer,
            _ => panic!("watcher is not a timer"),
        }
    }

    pub(crate) fn io(&self) -> &IoState {
        match self.kind {
            Kind::Io(ref io) => io,
            _ => panic!("watcher is not an io watcher"),
        }
    }

    pub(crate) fn io_mut(&mut self) -> &mut IoState {
        match self.kind {
            Kind::Io(ref mut io) => io,
            _ => panic!("watcher is not an io watcher"),
        }
    }
}

/// The watcher kinds, each carrying its kind specific state.
pub(crate) enum Kind {
    Timer(TimerState),
    Io(IoState),
    Prepare,
    Check,
}

/// State of a timer watcher.
pub(crate) struct TimerState {
    /// While scheduled this is the *delta* from the previous scheduled
    /// timer's fire time, not the full delay; see `Timers`. Meaningless
    /// while pending or detached.
    pub(crate) interval: Duration,
    pub(crate) links: TimerLinks,
}

impl TimerState {
    pub(crate) fn new() -> TimerState {
        TimerState {
            interval: Duration::from_millis(0),
            links: TimerLinks::Detached,
        }
    }

    /// Neighbours in the scheduled list.
    pub(crate) fn scheduled_links(&self) -> (Option<WatcherId>, Option<WatcherId>) {
        match self.links {
            TimerLinks::Scheduled { prev, next } => (prev, next),
            _ => panic!("timer is not in the scheduled list"),
        }
    }

    /// Neighbours in the pending chain.
    pub(crate) fn pending_links(&self) -> (Option<WatcherId>, Option<WatcherId>) {
        match self.links {
            TimerLinks::Pending { prev, next } => (prev, next),
            _ => panic!("timer is not in a pending chain"),
        }
    }
}

/// List membership of a timer watcher.
///
/// A timer is in at most one of two disjoint lists at a time: the scheduled
/// list (globally sorted by fire time) or the chain hanging off its
/// priority row's single `TIMER` slot. Both reuse this one field, making the
/// reuse an explicit, checked state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum TimerLinks {
    Detached,
    Scheduled {
        prev: Option<WatcherId>,
        next: Option<WatcherId>,
    },
    Pending {
        prev: Option<WatcherId>,
        next: Option<WatcherId>,
    },
}

/// State of an io watcher.
pub(crate) struct IoState {
    pub(crate) handle: Handle,
    /// Events the watcher wants to see, a subset of [`Ready::RW`].
    pub(crate) interests: Ready,
    /// Neighbours in the descriptor table entry's watcher list.
    pub(crate) prev: Option<WatcherId>,
    pub(crate) next: Option<WatcherId>,
}

impl IoState {
    pub(crate) fn new(handle: Handle, interests: Ready) -> IoState {
        IoState {
            handle,
            interests,
            prev: None,
            next: None,
        }
    }
}

/// Watcher storage.
///
/// Slots are only ever added, never removed: a watcher lives as long as the
/// loop that owns it and is recycled through start/stop. Growing happens at
/// registration time only; no engine operation after that allocates.
pub(crate) struct Arena<B> {
    slots: Vec<Watcher<B>>,
}

impl<B> Arena<B> {
    pub(crate) fn new() -> Arena<B> {
        Arena { slots: Vec::new() }
    }

    pub(crate) fn insert(&mut self, watcher: Watcher<B>) -> WatcherId {
        let id = WatcherId(self.slots.len());
        self.slots.push(watcher);
        id
    }
}

impl<B> Index<WatcherId> for Arena<B> {
    type Output = Watcher<B>;

    fn index(&self, id: WatcherId) -> &Watcher<B> {
        &self.slots[id.0]
    }
}

impl<B> IndexMut<WatcherId> for Arena<B> {
    fn index_mut(&mut self, id: WatcherId) -> &mut Watcher<B> {
        &mut self.slots[id.0]
    }
}
