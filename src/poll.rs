//! The event loop driver.

use std::fmt;
use std::io;
use std::time::Duration;

use log::trace;

use crate::backend::Backend;
use crate::clock::{Clock, Monotonic};
use crate::event::{Handle, Priority, Ready};
use crate::fds::FdTable;
use crate::pending::Pending;
use crate::timers::Timers;
use crate::watcher::{Arena, IoState, Kind, TimerState, Watcher, WatcherId};

/// A single-threaded event loop multiplexing io readiness and one-shot
/// timers over a bounded set of handles.
///
/// The loop owns three structures: a sorted descriptor table mapping each
/// watched handle to its io watchers, a delta-encoded list of scheduled
/// timers, and one bounded pending row per priority level. Watchers are
/// registered once with the `add_*` methods (the only operations that
/// allocate) and then started and stopped any number of times; all of
/// start, stop, poll and dispatch run in bounded space.
///
/// Every operation must be called from the one thread running the loop.
/// Callbacks run synchronously during dispatch and may call any watcher
/// operation, including on the watcher currently firing; such calls take
/// effect immediately.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use rhea::unix::Select;
/// use rhea::{EventLoop, Priority};
///
/// # fn main() -> std::io::Result<()> {
/// let mut ev_loop = EventLoop::new(Select::new());
///
/// let timer = ev_loop.add_timer(Priority::NORMAL, |_, id, _| {
///     println!("timer {} fired", id);
/// });
/// ev_loop.timer_start(timer, Duration::from_secs(1));
///
/// ev_loop.run()
/// # }
/// ```
pub struct EventLoop<B> {
    watchers: Arena<B>,
    fds: FdTable,
    timers: Timers,
    pending: Pending,
    /// Taken out of the loop for the duration of the backend poll, so the
    /// backend can borrow the loop to report readiness.
    backend: Option<B>,
    clock: Box<dyn Clock>,
    /// Prepare and check hooks in registration order.
    prepare: Vec<WatcherId>,
    check: Vec<WatcherId>,
}

impl<B> EventLoop<B>
    where B: Backend,
{
    /// Create a new event loop polling readiness through `backend`, timed
    /// by the OS monotonic clock.
    pub fn new(backend: B) -> EventLoop<B> {
        EventLoop::with_clock(backend, Box::new(Monotonic))
    }

    /// Create a new event loop with a caller supplied [`Clock`].
    pub fn with_clock(backend: B, clock: Box<dyn Clock>) -> EventLoop<B> {
        EventLoop {
            watchers: Arena::new(),
            fds: FdTable::new(),
            timers: Timers::new(),
            pending: Pending::new(),
            backend: Some(backend),
            clock,
            prepare: Vec::new(),
            check: Vec::new(),
        }
    }

    /// Register a one-shot timer. The timer is created inactive; schedule
    /// it with [`timer_start`].
    ///
    /// [`timer_start`]: EventLoop::timer_start
    pub fn add_timer<F>(&mut self, priority: Priority, callback: F) -> WatcherId
        where F: FnMut(&mut EventLoop<B>, WatcherId, Ready) + 'static,
    {
        self.watchers.insert(Watcher::new(priority, Box::new(callback), Kind::Timer(TimerState::new())))
    }

    /// Register an io watcher for `handle`. Interests are limited to
    /// [`Ready::RW`]; other bits are ignored. The watcher is created
    /// inactive; activate it with [`io_start`].
    ///
    /// [`io_start`]: EventLoop::io_start
    pub fn add_io<F>(&mut self, handle: Handle, interests: Ready, priority: Priority, callback: F) -> WatcherId
        where F: FnMut(&mut EventLoop<B>, WatcherId, Ready) + 'static,
    {
        let interests = interests & Ready::RW;
        self.watchers.insert(Watcher::new(priority, Box::new(callback), Kind::Io(IoState::new(handle, interests))))
    }

    /// Register a prepare hook, run at the top of every loop iteration,
    /// before the backend is brought up to date and polled. Created
    /// inactive; enable it with [`prepare_start`].
    ///
    /// Hooks run in registration order and never enter the pending rows.
    ///
    /// [`prepare_start`]: EventLoop::prepare_start
    pub fn add_prepare<F>(&mut self, callback: F) -> WatcherId
        where F: FnMut(&mut EventLoop<B>, WatcherId, Ready) + 'static,
    {
        let id = self.watchers.insert(Watcher::new(Priority::NORMAL, Box::new(callback), Kind::Prepare));
        self.prepare.push(id);
        id
    }

    /// Register a check hook, run right after the backend poll returns,
    /// before the pending rows are dispatched. Created inactive; enable it
    /// with [`check_start`].
    ///
    /// [`check_start`]: EventLoop::check_start
    pub fn add_check<F>(&mut self, callback: F) -> WatcherId
        where F: FnMut(&mut EventLoop<B>, WatcherId, Ready) + 'static,
    {
        let id = self.watchers.insert(Watcher::new(Priority::NORMAL, Box::new(callback), Kind::Check));
        self.check.push(id);
        id
    }

    /// Schedule a timer to fire once, `interval` from now.
    ///
    /// Starting an already active timer is a no-op: the original schedule
    /// stands. Stop the timer first to rearm it with a new interval.
    pub fn timer_start(&mut self, id: WatcherId, interval: Duration) {
        let _ = self.watchers[id].timer();
        self.timers.start(&mut self.watchers, id, interval);
    }

    /// Cancel a timer. No-op if the timer is inactive.
    ///
    /// The timer is removed from wherever it currently sits: the scheduled
    /// list if it has not fired yet, or its pending row if it expired but
    /// was not dispatched yet. Either way its callback will not run.
    pub fn timer_stop(&mut self, id: WatcherId) {
        let _ = self.watchers[id].timer();
        if !self.watchers[id].active {
            return;
        }
        trace!("stopping timer: id={}", id);
        if self.watchers[id].pending.is_some() {
            self.pending.unmark(&mut self.watchers, id);
        } else {
            self.timers.stop(&mut self.watchers, id);
        }
        self.watchers[id].active = false;
    }

    /// Start watching the io watcher's handle for its interests. No-op if
    /// already active.
    pub fn io_start(&mut self, id: WatcherId) {
        {
            let io = self.watchers[id].io();
            if self.watchers[id].active {
                return;
            }
            trace!("starting io watcher: id={}, handle={}, interests={:?}",
                id, io.handle, io.interests);
        }
        self.watchers[id].active = true;
        self.fds.start(&mut self.watchers, id);
    }

    /// Stop watching. No-op if the watcher is inactive. A watcher whose
    /// event already occurred but was not dispatched yet will not be
    /// dispatched.
    pub fn io_stop(&mut self, id: WatcherId) {
        let _ = self.watchers[id].io();
        if !self.watchers[id].active {
            return;
        }
        trace!("stopping io watcher: id={}", id);
        if self.watchers[id].pending.is_some() {
            self.pending.unmark(&mut self.watchers, id);
        }
        self.fds.stop(&mut self.watchers, id);
        self.watchers[id].active = false;
    }

    /// Enable a prepare hook. No-op if already enabled.
    pub fn prepare_start(&mut self, id: WatcherId) {
        match self.watchers[id].kind {
            Kind::Prepare => self.watchers[id].active = true,
            _ => panic!("watcher is not a prepare hook"),
        }
    }

    /// Disable a prepare hook. No-op if already disabled.
    pub fn prepare_stop(&mut self, id: WatcherId) {
        match self.watchers[id].kind {
            Kind::Prepare => self.watchers[id].active = false,
            _ => panic!("watcher is not a prepare hook"),
        }
    }

    /// Enable a check hook. No-op if already enabled.
    pub fn check_start(&mut self, id: WatcherId) {
        match self.watchers[id].kind {
            Kind::Check => self.watchers[id].active = true,
            _ => panic!("watcher is not a check hook"),
        }
    }

    /// Disable a check hook. No-op if already disabled.
    pub fn check_stop(&mut self, id: WatcherId) {
        match self.watchers[id].kind {
            Kind::Check => self.watchers[id].active = false,
            _ => panic!("watcher is not a check hook"),
        }
    }

    /// Change an io watcher's handle and interests. Ignored while the
    /// watcher is active; stop it first.
    pub fn io_set(&mut self, id: WatcherId, handle: Handle, interests: Ready) {
        let _ = self.watchers[id].io();
        if self.watchers[id].active {
            return;
        }
        let io = self.watchers[id].io_mut();
        io.handle = handle;
        io.interests = interests & Ready::RW;
    }

    /// Change a watcher's priority. Ignored while the watcher is active;
    /// the priority of a started watcher is fixed.
    pub fn set_priority(&mut self, id: WatcherId, priority: Priority) {
        let watcher = &mut self.watchers[id];
        if !watcher.active {
            watcher.priority = priority;
        }
    }

    /// Whether the watcher is currently started.
    pub fn is_active(&self, id: WatcherId) -> bool {
        self.watchers[id].active
    }

    /// Whether the watcher's event occurred but its callback did not run
    /// yet.
    pub fn is_pending(&self, id: WatcherId) -> bool {
        self.watchers[id].pending.is_some()
    }

    /// The watcher's priority.
    pub fn priority(&self, id: WatcherId) -> Priority {
        self.watchers[id].priority
    }

    /// Time until the next scheduled timer fires, `None` without scheduled
    /// timers. This is the timeout handed to the backend poll.
    pub fn next_timeout(&self) -> Option<Duration> {
        self.timers.next_timeout(&self.watchers)
    }

    /// Report raw readiness for `handle`, fanning it out to every watcher
    /// on the handle whose interests intersect `ready`. This is the entry
    /// point backends call from [`Backend::poll`].
    ///
    /// Reporting readiness for a handle that was never watched is an
    /// internal-consistency error and panics.
    pub fn io_event(&mut self, handle: Handle, ready: Ready) {
        trace!("io event: handle={}, ready={:?}", handle, ready);
        let head = match self.fds.get(handle) {
            Some(entry) => entry.head,
            None => panic!("readiness reported for handle {} which was never watched", handle),
        };
        let mut current = head;
        while let Some(id) = current {
            let (occurred, next) = {
                let io = self.watchers[id].io();
                (io.interests & ready, io.next)
            };
            if !occurred.is_empty()
                && self.watchers[id].active
                && self.watchers[id].pending.is_none()
            {
                self.pending.mark_io(&mut self.watchers, id, occurred);
            }
            current = next;
        }
    }

    /// Run a single loop iteration: bring the backend's interest sets up to
    /// date, poll it with the next timer deadline as timeout, expire
    /// timers, and dispatch everything that became pending, most urgent
    /// priority first.
    ///
    /// Returns any error the backend reports; pending watchers survive an
    /// error and are dispatched on the next iteration.
    pub fn run_once(&mut self) -> io::Result<()> {
        self.run_prepare();
        self.reconcile()?;

        let timeout = self.next_timeout();
        let mut backend = match self.backend.take() {
            Some(backend) => backend,
            None => panic!("run_once called re-entrantly from inside a backend poll"),
        };
        let start = self.clock.now();
        trace!("polling backend: timeout={:?}", timeout);
        let result = backend.poll(self, timeout);
        self.backend = Some(backend);
        let elapsed = self.clock.now().checked_sub(start).unwrap_or(Duration::from_millis(0));
        trace!("backend poll returned: elapsed={:?}", elapsed);
        result?;

        self.expire_timers(elapsed);
        self.run_check();
        self.dispatch();
        Ok(())
    }

    /// Run the loop forever. There is no terminal state; this only returns
    /// on a backend error.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.run_once()?;
        }
    }

    fn reconcile(&mut self) -> io::Result<()> {
        let backend = match self.backend.as_mut() {
            Some(backend) => backend,
            None => panic!("reconcile called re-entrantly from inside a backend poll"),
        };
        self.fds.reconcile(&self.watchers, backend)
    }

    /// Walk `elapsed` off the head of the scheduled timer list, queueing
    /// every timer whose cumulative delta it covers.
    fn expire_timers(&mut self, mut elapsed: Duration) {
        while let Some(head) = self.timers.head() {
            let delta = self.watchers[head].timer().interval;
            if elapsed < delta {
                self.watchers[head].timer_mut().interval = delta - elapsed;
                break;
            }
            elapsed -= delta;
            let _ = self.timers.pop_head(&mut self.watchers);
            trace!("timer expired: id={}", head);
            self.pending.mark_timer(&mut self.watchers, head);
        }
    }

    /// Drain the pending rows. Popping one watcher at a time restarts the
    /// scan at the most urgent row after every callback, so work queued by
    /// a callback at a more urgent priority never waits.
    fn dispatch(&mut self) {
        while let Some((id, occurred)) = self.pending.pop_front(&mut self.watchers) {
            if occurred.is_timer() {
                // One-shot: the timer is done before its callback runs, so
                // the callback may rearm it.
                self.watchers[id].active = false;
            }
            trace!("dispatching: id={}, occurred={:?}", id, occurred);
            self.invoke(id, occurred);
        }
    }

    fn run_prepare(&mut self) {
        let mut index = 0;
        while index < self.prepare.len() {
            let id = self.prepare[index];
            index += 1;
            if self.watchers[id].active {
                trace!("running prepare hook: id={}", id);
                self.invoke(id, Ready::empty());
            }
        }
    }

    fn run_check(&mut self) {
        let mut index = 0;
        while index < self.check.len() {
            let id = self.check[index];
            index += 1;
            if self.watchers[id].active {
                trace!("running check hook: id={}", id);
                self.invoke(id, Ready::empty());
            }
        }
    }

    /// Call `id`'s callback, taking it out of the slot for the duration so
    /// the callback can borrow the loop.
    fn invoke(&mut self, id: WatcherId, occurred: Ready) {
        if let Some(mut callback) = self.watchers[id].callback.take() {
            callback(self, id, occurred);
            self.watchers[id].callback = Some(callback);
        }
    }
}

impl<B> fmt::Debug for EventLoop<B> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("fds", &self.fds)
            .field("timers", &self.timers)
            .field("pending", &self.pending)
            .finish()
    }
}
