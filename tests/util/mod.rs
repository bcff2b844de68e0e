//! Collection of testing utilities.

// Not all helpers are used by every test file.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;
use std::time::Duration;

use rhea::{Backend, Clock, EventLoop, Handle, Ready};

/// Initialise the test setup, things like logging etc.
pub fn init() {
    let env = env_logger::Env::new().filter("LOG_LEVEL");
    // Logger could already be set, so we ignore the result.
    drop(env_logger::try_init_from_env(env));
}

/// A manually advanced [`Clock`], shared between the test, the loop and the
/// scripted backend.
#[derive(Clone)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> ManualClock {
        ManualClock {
            now: Rc::new(Cell::new(Duration::from_millis(0))),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// A scripted [`Backend`]: reports whatever readiness the test queued and
/// records every modify call.
///
/// When nothing is queued a poll "sleeps" through its entire timeout by
/// advancing the shared [`ManualClock`], which is what makes timer tests
/// deterministic.
pub struct Script {
    pub queued: Rc<RefCell<Vec<(Handle, Ready)>>>,
    pub modifications: Rc<RefCell<Vec<(Handle, Ready, Ready)>>>,
    clock: ManualClock,
}

impl Script {
    pub fn new(clock: ManualClock) -> Script {
        Script {
            queued: Rc::new(RefCell::new(Vec::new())),
            modifications: Rc::new(RefCell::new(Vec::new())),
            clock,
        }
    }
}

impl Backend for Script {
    fn modify(&mut self, handle: Handle, old: Ready, new: Ready) -> io::Result<()> {
        self.modifications.borrow_mut().push((handle, old, new));
        Ok(())
    }

    fn poll(&mut self, ev_loop: &mut EventLoop<Script>, timeout: Option<Duration>) -> io::Result<()> {
        let queued: Vec<_> = self.queued.borrow_mut().drain(..).collect();
        if queued.is_empty() {
            if let Some(timeout) = timeout {
                self.clock.advance(timeout);
            }
        }
        for (handle, ready) in queued {
            ev_loop.io_event(handle, ready);
        }
        Ok(())
    }
}

/// Readiness the next scripted poll will report.
pub type Queued = Rc<RefCell<Vec<(Handle, Ready)>>>;

/// Modify calls seen so far, as (handle, old, new).
pub type Modifications = Rc<RefCell<Vec<(Handle, Ready, Ready)>>>;

/// An event loop over a scripted backend and a manual clock.
pub fn scripted() -> (EventLoop<Script>, ManualClock, Queued, Modifications) {
    init();
    let clock = ManualClock::new();
    let script = Script::new(clock.clone());
    let queued = Rc::clone(&script.queued);
    let modifications = Rc::clone(&script.modifications);
    let ev_loop = EventLoop::with_clock(script, Box::new(clock.clone()));
    (ev_loop, clock, queued, modifications)
}

pub fn millis(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
