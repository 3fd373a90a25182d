//! inotify event mask bits

use bitflags::bitflags;

bitflags! {
    /// Bits of an inotify registration mask or record mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        const ACCESS = libc::IN_ACCESS;
        const ATTRIB = libc::IN_ATTRIB;
        const CLOSE_WRITE = libc::IN_CLOSE_WRITE;
        const CLOSE_NOWRITE = libc::IN_CLOSE_NOWRITE;
        const CREATE = libc::IN_CREATE;
        const DELETE = libc::IN_DELETE;
        const DELETE_SELF = libc::IN_DELETE_SELF;
        const MODIFY = libc::IN_MODIFY;
        const MOVE_SELF = libc::IN_MOVE_SELF;
        const MOVED_FROM = libc::IN_MOVED_FROM;
        const MOVED_TO = libc::IN_MOVED_TO;
        const OPEN = libc::IN_OPEN;
        const IGNORED = libc::IN_IGNORED;
        const ISDIR = libc::IN_ISDIR;
        const Q_OVERFLOW = libc::IN_Q_OVERFLOW;
        const UNMOUNT = libc::IN_UNMOUNT;
    }
}

impl EventMask {
    /// Mask every directory watch is registered with
    pub const DIRECTORY_WATCH: EventMask = EventMask::CLOSE_WRITE
        .union(EventMask::CREATE)
        .union(EventMask::DELETE)
        .union(EventMask::DELETE_SELF)
        .union(EventMask::MOVE_SELF)
        .union(EventMask::MOVED_FROM)
        .union(EventMask::MOVED_TO);
}
