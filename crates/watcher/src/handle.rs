//! Kernel watch handles

use std::fmt;

/// Opaque identifier of one kernel watch
///
/// Non-negative values are live registrations; `INVALID` marks records
/// that belong to no watch (queue overflow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(i32);

impl WatchHandle {
    pub const INVALID: WatchHandle = WatchHandle(-1);

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> i32 {
        self.0
    }

    pub const fn is_registered(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
