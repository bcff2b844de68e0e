//! The `select(2)` backend against real file descriptors.

#![cfg(unix)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use rhea::unix::Select;
use rhea::{EventLoop, Handle, Priority, Ready, WatcherId};

mod util;

use self::util::init;

type Fired = Rc<RefCell<Vec<(WatcherId, Ready)>>>;

struct Pipe {
    read: Handle,
    write: Handle,
}

fn pipe() -> Pipe {
    let mut fds = [0; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0, "unable to create pipe");
    Pipe {
        read: Handle(fds[0]),
        write: Handle(fds[1]),
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        unsafe {
            let _ = libc::close(self.read.0);
            let _ = libc::close(self.write.0);
        }
    }
}

fn write_byte(pipe: &Pipe) {
    let buf = [b'x'];
    let n = unsafe { libc::write(pipe.write.0, buf.as_ptr() as *const libc::c_void, 1) };
    assert_eq!(n, 1, "unable to write to pipe");
}

#[test]
fn readable_pipe_end() {
    init();
    let pipe = pipe();
    let mut ev_loop = EventLoop::new(Select::new());

    let fired: Fired = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&fired);
    let reader = ev_loop.add_io(pipe.read, Ready::READABLE, Priority::NORMAL, move |_, id, ready| {
        log.borrow_mut().push((id, ready));
    });
    ev_loop.io_start(reader);

    write_byte(&pipe);
    ev_loop.run_once().unwrap();

    assert_eq!(*fired.borrow(), vec![(reader, Ready::READABLE)]);
}

#[test]
fn writable_pipe_end() {
    init();
    let pipe = pipe();
    let mut ev_loop = EventLoop::new(Select::new());

    let fired: Fired = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&fired);
    let writer = ev_loop.add_io(pipe.write, Ready::WRITABLE, Priority::NORMAL, move |_, id, ready| {
        log.borrow_mut().push((id, ready));
    });
    ev_loop.io_start(writer);

    // An empty pipe's write end is immediately writable.
    ev_loop.run_once().unwrap();

    assert_eq!(*fired.borrow(), vec![(writer, Ready::WRITABLE)]);
}

#[test]
fn timer_against_the_real_clock() {
    init();
    let mut ev_loop = EventLoop::new(Select::new());

    let fired = Rc::new(RefCell::new(0));
    let seen = Rc::clone(&fired);
    let timer = ev_loop.add_timer(Priority::NORMAL, move |_, _, _| {
        *seen.borrow_mut() += 1;
    });
    ev_loop.timer_start(timer, Duration::from_millis(20));

    // The deadline may take a couple of passes if select wakes early.
    for _ in 0..100 {
        if *fired.borrow() > 0 {
            break;
        }
        ev_loop.run_once().unwrap();
    }

    assert_eq!(*fired.borrow(), 1);
    assert!(!ev_loop.is_active(timer));
}

#[test]
fn io_and_timer_together() {
    init();
    let pipe = pipe();
    let mut ev_loop = EventLoop::new(Select::new());

    let order = Rc::new(RefCell::new(Vec::new()));

    let log = Rc::clone(&order);
    let reader = ev_loop.add_io(pipe.read, Ready::READABLE, Priority::NORMAL, move |_, _, _| {
        log.borrow_mut().push("io");
    });
    let log = Rc::clone(&order);
    let timer = ev_loop.add_timer(Priority::NORMAL, move |_, _, _| {
        log.borrow_mut().push("timer");
    });

    ev_loop.io_start(reader);
    ev_loop.timer_start(timer, Duration::from_millis(10));
    write_byte(&pipe);

    // The io event arrives well before the deadline.
    ev_loop.run_once().unwrap();
    assert_eq!(*order.borrow(), vec!["io"]);

    // Stop watching so the still-readable pipe stops producing events, and
    // wait out the timer.
    ev_loop.io_stop(reader);
    for _ in 0..100 {
        if order.borrow().len() > 1 {
            break;
        }
        ev_loop.run_once().unwrap();
    }
    assert_eq!(*order.borrow(), vec!["io", "timer"]);
}
