//! A single-threaded event loop for environments that cannot allocate
//! during steady-state operation and put a hard ceiling on the number of
//! watched handles.
//!
//! The [`EventLoop`] multiplexes readiness notifications for
//! file-descriptor-like handles and fires one-shot timers, dispatching both
//! through a priority-ordered pipeline. Three structures carry it:
//!
//!  * a bounded descriptor table, kept sorted by handle and maintained by
//!    binary search, mapping each handle to its watchers and their combined
//!    interests;
//!  * a delta-encoded list of scheduled timers whose head is always the
//!    next poll timeout;
//!  * bounded per-priority pending rows, drained most urgent first.
//!
//! The OS-level multiplexing mechanism is pluggable through the two-method
//! [`Backend`] trait and selected at construction; a `select(2)` based
//! implementation is provided as [`unix::Select`].
//!
//! Watchers are owned by the loop, registered once with the `add_*` methods
//! (the only allocating operations) and addressed by [`WatcherId`]
//! afterwards. Exceeding a capacity bound ([`MAX_HANDLES`] distinct
//! handles, [`PENDING_CAPACITY`] simultaneously pending watchers per
//! priority) is a fatal programming error, not a recoverable condition.
//!
//! # Usage
//!
//! Create an [`EventLoop`] over a backend, register watchers, start them,
//! and drive the loop. Callbacks run on the loop thread during dispatch and
//! may start or stop any watcher, including their own.
//!
//! # Examples
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! use rhea::unix::Select;
//! use rhea::{EventLoop, Priority};
//!
//! # fn main() -> std::io::Result<()> {
//! let mut ev_loop = EventLoop::new(Select::new());
//!
//! let fired = Rc::new(Cell::new(false));
//! let seen = Rc::clone(&fired);
//! let timer = ev_loop.add_timer(Priority::NORMAL, move |_, _, _| seen.set(true));
//!
//! // One-shot: fires once, 10 milliseconds from now.
//! ev_loop.timer_start(timer, Duration::from_millis(10));
//!
//! while !fired.get() {
//!     ev_loop.run_once()?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(anonymous_parameters,
        bare_trait_objects,
        missing_debug_implementations,
        missing_docs,
        trivial_casts,
        trivial_numeric_casts,
        unused_extern_crates,
        unused_import_braces,
        unused_qualifications,
        unused_results,
        variant_size_differences,
)]

// Disallow warnings when running tests.
#![cfg_attr(test, deny(warnings))]

// Disallow warnings in examples, we want to set a good example after all.
#![doc(test(attr(deny(warnings))))]

mod backend;
mod clock;
mod event;
mod fds;
mod pending;
mod poll;
mod sys;
mod timers;
mod watcher;

#[cfg(unix)]
pub mod unix {
    //! Unix only backends.

    pub use crate::sys::Select;
}

pub use crate::backend::Backend;
pub use crate::clock::{Clock, Monotonic};
pub use crate::event::{Handle, Priority, Ready};
pub use crate::poll::EventLoop;
pub use crate::watcher::{Callback, WatcherId};

/// Maximum number of distinct handles an [`EventLoop`] can watch.
///
/// Starting an io watcher on a handle when the descriptor table already
/// holds this many other handles is fatal.
pub const MAX_HANDLES: usize = 32;

/// Capacity of each priority's pending row.
///
/// More watchers than this becoming ready at a single priority level
/// without being dispatched is fatal.
pub const PENDING_CAPACITY: usize = MAX_HANDLES * 2;
