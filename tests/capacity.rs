//! Capacity bounds and consistency violations are fatal, never silent.

use rhea::{Handle, Priority, Ready, MAX_HANDLES, PENDING_CAPACITY};

mod util;

use self::util::scripted;

#[test]
#[should_panic(expected = "descriptor table full")]
fn too_many_distinct_handles() {
    let (mut ev_loop, _, _, _) = scripted();

    for fd in 0..(MAX_HANDLES as i32 + 1) {
        let watcher = ev_loop.add_io(Handle(fd), Ready::READABLE, Priority::NORMAL, |_, _, _| {});
        ev_loop.io_start(watcher);
    }
}

#[test]
fn handle_count_at_the_limit_is_fine() {
    let (mut ev_loop, _, _, _) = scripted();

    for fd in 0..MAX_HANDLES as i32 {
        let watcher = ev_loop.add_io(Handle(fd), Ready::READABLE, Priority::NORMAL, |_, _, _| {});
        ev_loop.io_start(watcher);
    }
    ev_loop.run_once().unwrap();
}

#[test]
#[should_panic(expected = "pending row overflow")]
fn too_many_pending_watchers_at_one_priority() {
    let (mut ev_loop, _, _, _) = scripted();

    let handle = Handle(1);
    for _ in 0..(PENDING_CAPACITY + 1) {
        let watcher = ev_loop.add_io(handle, Ready::READABLE, Priority::NORMAL, |_, _, _| {});
        ev_loop.io_start(watcher);
    }

    // All of them intersect the event, one more than the row can hold.
    ev_loop.io_event(handle, Ready::READABLE);
}

#[test]
#[should_panic(expected = "never watched")]
fn readiness_for_an_unknown_handle() {
    let (mut ev_loop, _, _, _) = scripted();
    ev_loop.io_event(Handle(7), Ready::READABLE);
}
