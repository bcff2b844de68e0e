//! The descriptor table.
//!
//! One entry per distinct handle, tracking the io watchers registered on it
//! and the union of events they are interested in. The table is a bounded
//! array kept sorted ascending by handle: lookups are a binary search,
//! inserts shift the tail of the array. With the handle count bounded and
//! small this beats a hash table in both memory and iteration order, and it
//! never allocates.

use std::io;

use arrayvec::ArrayVec;
use log::trace;

use crate::backend::Backend;
use crate::event::{Handle, Ready};
use crate::watcher::{Arena, WatcherId};
use crate::MAX_HANDLES;

/// A single handle and the io watchers registered on it.
#[derive(Debug)]
pub(crate) struct FdEntry {
    pub(crate) handle: Handle,
    /// Head of the watcher list, linked through `IoState`.
    pub(crate) head: Option<WatcherId>,
    /// Union of interests last reported to the backend.
    pub(crate) interests: Ready,
    /// The watcher list changed since the backend was last informed, so
    /// `interests` may be stale.
    refresh: bool,
}

/// Bounded array of [`FdEntry`]s, sorted ascending by handle.
///
/// Entries are created the first time a watcher starts on a handle and are
/// never removed, even when their watcher list drains: an empty entry simply
/// carries an empty interest union, and keeping it around avoids compacting
/// the array.
#[derive(Debug)]
pub(crate) struct FdTable {
    entries: ArrayVec<FdEntry, MAX_HANDLES>,
}

impl FdTable {
    pub(crate) fn new() -> FdTable {
        FdTable {
            entries: ArrayVec::new(),
        }
    }

    /// Link a starting io watcher into the entry for its handle, creating
    /// the entry if the handle was never watched before.
    pub(crate) fn start<B>(&mut self, watchers: &mut Arena<B>, id: WatcherId) {
        let handle = watchers[id].io().handle;
        match self.search(handle) {
            Ok(index) => {
                // Known handle: push the watcher onto the entry's list.
                let old_head = self.entries[index].head;
                {
                    let io = watchers[id].io_mut();
                    io.prev = None;
                    io.next = old_head;
                }
                if let Some(old_head) = old_head {
                    watchers[old_head].io_mut().prev = Some(id);
                }
                self.entries[index].head = Some(id);
                self.entries[index].refresh = true;
            },
            Err(index) => {
                assert!(!self.entries.is_full(),
                    "descriptor table full: cannot watch more than {} distinct handles", MAX_HANDLES);
                {
                    let io = watchers[id].io_mut();
                    io.prev = None;
                    io.next = None;
                }
                self.entries.insert(index, FdEntry {
                    handle,
                    head: Some(id),
                    interests: Ready::empty(),
                    refresh: true,
                });
            },
        }
    }

    /// Unlink a stopping io watcher from its handle's entry. The entry
    /// itself stays, even when its watcher list becomes empty.
    pub(crate) fn stop<B>(&mut self, watchers: &mut Arena<B>, id: WatcherId) {
        let (handle, prev, next) = {
            let io = watchers[id].io();
            (io.handle, io.prev, io.next)
        };
        let index = match self.search(handle) {
            Ok(index) => index,
            Err(_) => panic!("active io watcher's handle {} is not in the descriptor table", handle),
        };
        if let Some(next) = next {
            watchers[next].io_mut().prev = prev;
        }
        match prev {
            Some(prev) => watchers[prev].io_mut().next = next,
            None => self.entries[index].head = next,
        }
        let io = watchers[id].io_mut();
        io.prev = None;
        io.next = None;
        self.entries[index].refresh = true;
    }

    /// Recompute the interest union of every entry marked `refresh` and
    /// report changed unions to the backend.
    pub(crate) fn reconcile<B>(&mut self, watchers: &Arena<B>, backend: &mut B) -> io::Result<()>
        where B: Backend,
    {
        for entry in self.entries.iter_mut() {
            if !entry.refresh {
                continue;
            }
            entry.refresh = false;

            let mut interests = Ready::empty();
            let mut current = entry.head;
            while let Some(id) = current {
                let io = watchers[id].io();
                interests |= io.interests;
                current = io.next;
            }

            if interests != entry.interests {
                trace!("updating backend interests: handle={}, old={:?}, new={:?}",
                    entry.handle, entry.interests, interests);
                backend.modify(entry.handle, entry.interests, interests)?;
                entry.interests = interests;
            }
        }
        Ok(())
    }

    /// Entry for `handle`, if the handle was ever watched.
    pub(crate) fn get(&self, handle: Handle) -> Option<&FdEntry> {
        match self.search(handle) {
            Ok(index) => Some(&self.entries[index]),
            Err(_) => None,
        }
    }

    fn search(&self, handle: Handle) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&handle, |entry| entry.handle)
    }

    #[cfg(test)]
    pub(crate) fn handles(&self) -> Vec<Handle> {
        self.entries.iter().map(|entry| entry.handle).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use crate::backend::Backend;
    use crate::event::{Handle, Priority, Ready};
    use crate::fds::FdTable;
    use crate::poll::EventLoop;
    use crate::watcher::{Arena, Callback, IoState, Kind, Watcher, WatcherId};

    /// Backend recording every modify call.
    struct Recorder {
        calls: Vec<(Handle, Ready, Ready)>,
    }

    impl Backend for Recorder {
        fn modify(&mut self, handle: Handle, old: Ready, new: Ready) -> io::Result<()> {
            self.calls.push((handle, old, new));
            Ok(())
        }

        fn poll(&mut self, _: &mut EventLoop<Recorder>, _: Option<Duration>) -> io::Result<()> {
            Ok(())
        }
    }

    fn io_watcher(watchers: &mut Arena<Recorder>, handle: Handle, interests: Ready) -> WatcherId {
        let callback: Callback<Recorder> = Box::new(|_, _, _| {});
        let id = watchers.insert(Watcher::new(
            Priority::NORMAL,
            callback,
            Kind::Io(IoState::new(handle, interests)),
        ));
        watchers[id].active = true;
        id
    }

    #[test]
    fn sorted_and_unique() {
        let mut watchers = Arena::new();
        let mut table = FdTable::new();

        for &fd in &[7, 3, 9, 1, 3, 5] {
            let id = io_watcher(&mut watchers, Handle(fd), Ready::READABLE);
            table.start(&mut watchers, id);
        }

        // One entry per distinct handle, ascending.
        assert_eq!(table.handles(), vec![Handle(1), Handle(3), Handle(5), Handle(7), Handle(9)]);
    }

    #[test]
    fn stop_keeps_entry() {
        let mut watchers = Arena::new();
        let mut table = FdTable::new();

        let id = io_watcher(&mut watchers, Handle(4), Ready::READABLE);
        table.start(&mut watchers, id);
        table.stop(&mut watchers, id);

        assert_eq!(table.handles(), vec![Handle(4)]);
        assert_eq!(table.get(Handle(4)).unwrap().head, None);
    }

    #[test]
    fn reconcile_reports_changed_unions() {
        let mut watchers = Arena::new();
        let mut table = FdTable::new();
        let mut backend = Recorder { calls: Vec::new() };

        let reader = io_watcher(&mut watchers, Handle(2), Ready::READABLE);
        let writer = io_watcher(&mut watchers, Handle(2), Ready::WRITABLE);
        table.start(&mut watchers, reader);
        table.start(&mut watchers, writer);

        table.reconcile(&watchers, &mut backend).unwrap();
        assert_eq!(backend.calls, vec![(Handle(2), Ready::empty(), Ready::RW)]);

        // Nothing changed, nothing reported.
        table.reconcile(&watchers, &mut backend).unwrap();
        assert_eq!(backend.calls.len(), 1);

        table.stop(&mut watchers, writer);
        table.reconcile(&watchers, &mut backend).unwrap();
        assert_eq!(backend.calls[1], (Handle(2), Ready::RW, Ready::READABLE));
    }

    #[test]
    fn start_stop_before_reconcile_is_silent() {
        let mut watchers = Arena::new();
        let mut table = FdTable::new();
        let mut backend = Recorder { calls: Vec::new() };

        let id = io_watcher(&mut watchers, Handle(6), Ready::READABLE);
        table.start(&mut watchers, id);
        table.stop(&mut watchers, id);

        // The union went from empty back to empty: no backend call.
        table.reconcile(&watchers, &mut backend).unwrap();
        assert!(backend.calls.is_empty());
    }

    #[test]
    #[should_panic(expected = "descriptor table full")]
    fn capacity_overflow_is_fatal() {
        let mut watchers = Arena::new();
        let mut table = FdTable::new();

        for fd in 0..(crate::MAX_HANDLES as i32 + 1) {
            let id = io_watcher(&mut watchers, Handle(fd), Ready::READABLE);
            table.start(&mut watchers, id);
        }
    }
}
