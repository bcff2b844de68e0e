//! Readiness event types and utilities.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// A set of readiness event kinds.
    ///
    /// `Ready` is used in two directions: as the *interests* of an io
    /// watcher, indicating which kind of operations it wants to be notified
    /// about, and as the *occurred* set handed to a callback, indicating
    /// which kind of operations are actually ready to be performed.
    ///
    /// `Ready` values can be combined together using the various bitwise
    /// operators.
    ///
    /// # Examples
    ///
    /// ```
    /// use rhea::Ready;
    ///
    /// let ready = Ready::READABLE | Ready::WRITABLE;
    ///
    /// assert!(ready.is_readable());
    /// assert!(ready.is_writable());
    /// assert!(!ready.is_timer());
    /// assert_eq!(ready, Ready::RW);
    /// ```
    pub struct Ready: u8 {
        /// Readable readiness.
        const READABLE = 0b0000_0001;
        /// Writable readiness.
        const WRITABLE = 0b0000_0010;
        /// Both readable and writable readiness.
        const RW       = Self::READABLE.bits | Self::WRITABLE.bits;
        /// Timer expired, see [`EventLoop.timer_start`].
        ///
        /// [`EventLoop.timer_start`]: crate::EventLoop::timer_start
        const TIMER    = 0b0000_0100;
    }
}

impl Ready {
    /// Returns true if the value includes readable readiness.
    #[inline]
    pub fn is_readable(&self) -> bool {
        self.contains(Ready::READABLE)
    }

    /// Returns true if the value includes writable readiness.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.contains(Ready::WRITABLE)
    }

    /// Returns true if the value includes a timer expiry.
    #[inline]
    pub fn is_timer(&self) -> bool {
        self.contains(Ready::TIMER)
    }
}

/// Dispatch priority of a watcher.
///
/// Priorities range from [`Priority::HIGH`] (-3) to [`Priority::LOW`] (3),
/// [`Priority::NORMAL`] (0) being the default. A numerically smaller
/// priority is more urgent: among watchers that are ready at the same time
/// the one with the smallest priority value is dispatched first, and among
/// timers that expire at the same instant the smallest priority value fires
/// first. There is no fairness beyond this static ordering.
///
/// # Examples
///
/// ```
/// use rhea::Priority;
///
/// // More urgent sorts first.
/// assert!(Priority::HIGH < Priority::NORMAL);
///
/// // Out of range values are clamped.
/// assert_eq!(Priority::new(100), Priority::LOW);
/// assert_eq!(Priority::new(-100), Priority::HIGH);
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Priority(i8);

/// Number of distinct priority levels, i.e. the -3 to 3 range.
pub(crate) const PRIORITY_LEVELS: usize = 7;

impl Priority {
    /// The most urgent priority.
    pub const HIGH: Priority = Priority(-3);

    /// The default priority.
    pub const NORMAL: Priority = Priority(0);

    /// The least urgent priority.
    pub const LOW: Priority = Priority(3);

    /// Create a new priority, clamping `priority` to the supported range.
    pub fn new(priority: i8) -> Priority {
        if priority < Priority::HIGH.0 {
            Priority::HIGH
        } else if priority > Priority::LOW.0 {
            Priority::LOW
        } else {
            Priority(priority)
        }
    }

    /// Index of this priority's pending row, 0 being the most urgent.
    pub(crate) fn row(self) -> usize {
        (self.0 - Priority::HIGH.0) as usize
    }
}

impl Default for Priority {
    fn default() -> Priority {
        Priority::NORMAL
    }
}

/// Identifier of an OS handle watched for readiness, e.g. a file descriptor
/// on Unix.
///
/// The event loop never interprets the value, it only uses it as a sorting
/// and lookup key; the [`Backend`] gives it meaning.
///
/// [`Backend`]: crate::Backend
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Handle(pub i32);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
