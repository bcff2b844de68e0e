//! The backend contract.
//!
//! The event loop never talks to the OS itself; the actual readiness
//! multiplexing mechanism (`select`, `poll`, epoll, kqueue, ...) is plugged
//! in at loop construction time as an implementation of [`Backend`]. The
//! loop drives it through exactly two operations: interest updates and the
//! blocking poll.

use std::io;
use std::time::Duration;

use crate::event::{Handle, Ready};
use crate::poll::EventLoop;

/// An OS-level readiness multiplexing mechanism driven by an [`EventLoop`].
pub trait Backend: Sized {
    /// Update the registration of `handle` from the `old` interest set to
    /// the `new` one.
    ///
    /// Only called when the two sets actually differ. `new` may be empty,
    /// meaning no watcher currently cares about the handle; the handle may
    /// gain interests again later.
    fn modify(&mut self, handle: Handle, old: Ready, new: Ready) -> io::Result<()>;

    /// Block until a registered handle becomes ready or `timeout` expires,
    /// or indefinitely if no timeout is given.
    ///
    /// Any readiness detected must be reported through
    /// [`EventLoop::io_event`] before this returns; the loop dispatches
    /// after the call, not during it. Returning without having reported
    /// anything because the timeout elapsed is not an error.
    fn poll(&mut self, ev_loop: &mut EventLoop<Self>, timeout: Option<Duration>) -> io::Result<()>;
}
