use std::cmp::{max, min};
use std::time::Duration;
use std::{io, mem, ptr};

use arrayvec::ArrayVec;
use log::trace;

use crate::backend::Backend;
use crate::event::{Handle, Ready};
use crate::poll::EventLoop;
use crate::MAX_HANDLES;

/// [`Backend`] built on `select(2)`.
///
/// `select` has no kernel-side registration, so this keeps its own bounded
/// table of (handle, interests) pairs, updated through `modify`, and
/// rebuilds the fd sets from it on every poll.
///
/// # Examples
///
/// ```
/// use rhea::unix::Select;
/// use rhea::EventLoop;
///
/// let ev_loop = EventLoop::new(Select::new());
/// # drop(ev_loop);
/// ```
#[derive(Debug)]
pub struct Select {
    interests: ArrayVec<(Handle, Ready), MAX_HANDLES>,
}

impl Select {
    /// Create a new `select(2)` backend.
    pub fn new() -> Select {
        Select {
            interests: ArrayVec::new(),
        }
    }
}

impl Default for Select {
    fn default() -> Select {
        Select::new()
    }
}

impl Backend for Select {
    fn modify(&mut self, handle: Handle, old: Ready, new: Ready) -> io::Result<()> {
        trace!("select: modifying interests: handle={}, old={:?}, new={:?}", handle, old, new);
        let position = self.interests.iter().position(|&(h, _)| h == handle);
        match position {
            Some(index) if new.is_empty() => {
                let _ = self.interests.remove(index);
            },
            Some(index) => self.interests[index].1 = new,
            None if new.is_empty() => {},
            None => self.interests.push((handle, new)),
        }
        Ok(())
    }

    fn poll(&mut self, ev_loop: &mut EventLoop<Select>, timeout: Option<Duration>) -> io::Result<()> {
        let mut read_set: libc::fd_set = unsafe { mem::zeroed() };
        let mut write_set: libc::fd_set = unsafe { mem::zeroed() };
        unsafe {
            libc::FD_ZERO(&mut read_set);
            libc::FD_ZERO(&mut write_set);
        }

        let mut max_handle = -1;
        for &(handle, interests) in self.interests.iter() {
            if interests.is_readable() {
                unsafe { libc::FD_SET(handle.0, &mut read_set) }
            }
            if interests.is_writable() {
                unsafe { libc::FD_SET(handle.0, &mut write_set) }
            }
            max_handle = max(max_handle, handle.0);
        }

        let mut timeval = timeout.map(duration_to_timeval);
        let timeout_ptr: *mut libc::timeval = match timeval.as_mut() {
            Some(timeval) => timeval,
            None => ptr::null_mut(),
        };

        let n_ready = unsafe {
            libc::select(max_handle + 1, &mut read_set, &mut write_set, ptr::null_mut(), timeout_ptr)
        };
        match n_ready {
            -1 => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    // A signal woke us; report nothing and let the loop
                    // turn.
                    Ok(())
                } else {
                    Err(err)
                }
            },
            // Reached the time limit, no handles are ready.
            0 => Ok(()),
            _ => {
                for &(handle, _) in self.interests.iter() {
                    let mut ready = Ready::empty();
                    if unsafe { libc::FD_ISSET(handle.0, &mut read_set) } {
                        ready |= Ready::READABLE;
                    }
                    if unsafe { libc::FD_ISSET(handle.0, &mut write_set) } {
                        ready |= Ready::WRITABLE;
                    }
                    if !ready.is_empty() {
                        ev_loop.io_event(handle, ready);
                    }
                }
                Ok(())
            },
        }
    }
}

/// Convert a `Duration` to a `timeval`, rounding up to whole microseconds
/// so the poll never wakes before the deadline.
fn duration_to_timeval(duration: Duration) -> libc::timeval {
    let mut seconds = min(duration.as_secs(), libc::time_t::MAX as u64) as libc::time_t;
    let mut micros = u64::from(duration.subsec_micros());
    if duration.subsec_nanos() % 1_000 != 0 {
        micros += 1;
    }
    if micros == 1_000_000 {
        seconds = seconds.saturating_add(1);
        micros = 0;
    }
    libc::timeval {
        tv_sec: seconds,
        tv_usec: micros as libc::suseconds_t,
    }
}
