//! Event masks, names and classification.

use bitflags::bitflags;

use super::WatchError;

bitflags! {
    /// Event bits, using the kernel's inotify values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        const ACCESS = 0x0000_0001;
        const MODIFY = 0x0000_0002;
        const ATTRIB = 0x0000_0004;
        const CLOSE_WRITE = 0x0000_0008;
        const CLOSE_NOWRITE = 0x0000_0010;
        const OPEN = 0x0000_0020;
        const MOVED_FROM = 0x0000_0040;
        const MOVED_TO = 0x0000_0080;
        const CREATE = 0x0000_0100;
        const DELETE = 0x0000_0200;
        const DELETE_SELF = 0x0000_0400;
        const MOVE_SELF = 0x0000_0800;
        const UNMOUNT = 0x0000_2000;
        const Q_OVERFLOW = 0x0000_4000;
        const IGNORED = 0x0000_8000;
        const ONLYDIR = 0x0100_0000;
        const DONT_FOLLOW = 0x0200_0000;
        const EXCL_UNLINK = 0x0400_0000;
        const MASK_ADD = 0x2000_0000;
        const ISDIR = 0x4000_0000;
        const ONESHOT = 0x8000_0000;

        const CLOSE = Self::CLOSE_WRITE.bits() | Self::CLOSE_NOWRITE.bits();
        const MOVE = Self::MOVED_FROM.bits() | Self::MOVED_TO.bits();
        const ALL_EVENTS = 0x0000_0fff;
        const DEFAULT = Self::MODIFY.bits()
            | Self::CREATE.bits()
            | Self::DELETE.bits()
            | Self::MOVE.bits();
    }
}

/// Names accepted in an event list, with the bits they enable.
const EVENT_NAMES: &[(&str, EventMask)] = &[
    ("access", EventMask::ACCESS),
    ("modify", EventMask::MODIFY),
    ("attrib", EventMask::ATTRIB),
    ("close_write", EventMask::CLOSE_WRITE),
    ("close_nowrite", EventMask::CLOSE_NOWRITE),
    ("close", EventMask::CLOSE),
    ("open", EventMask::OPEN),
    ("moved_from", EventMask::MOVED_FROM),
    ("moved_to", EventMask::MOVED_TO),
    ("move", EventMask::MOVE),
    ("create", EventMask::CREATE),
    ("delete", EventMask::DELETE),
    ("delete_self", EventMask::DELETE_SELF),
    ("move_self", EventMask::MOVE_SELF),
    ("unmount", EventMask::UNMOUNT),
    ("q_overflow", EventMask::Q_OVERFLOW),
    ("ignored", EventMask::IGNORED),
    ("isdir", EventMask::ISDIR),
    ("oneshot", EventMask::ONESHOT),
    ("all_events", EventMask::ALL_EVENTS),
    ("default", EventMask::DEFAULT),
];

impl EventMask {
    /// Parse a list of event names into a mask.
    ///
    /// An empty list means [`EventMask::DEFAULT`].
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Self, WatchError> {
        let mut mask = EventMask::empty();

        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            let bits = EVENT_NAMES
                .iter()
                .find(|(known, _)| *known == name)
                .map(|(_, bits)| *bits)
                .ok_or_else(|| WatchError::UnknownEvent {
                    name: name.to_string(),
                })?;
            mask |= bits;
        }

        if mask.is_empty() {
            mask = EventMask::DEFAULT;
        }
        Ok(mask)
    }
}

/// Event kinds named after a single bit.
const SINGLE_BITS: &[(EventMask, EventKind)] = &[
    (EventMask::ACCESS, EventKind::Access),
    (EventMask::MODIFY, EventKind::Modify),
    (EventMask::ATTRIB, EventKind::Attrib),
    (EventMask::CLOSE_WRITE, EventKind::CloseWrite),
    (EventMask::CLOSE_NOWRITE, EventKind::CloseNowrite),
    (EventMask::OPEN, EventKind::Open),
    (EventMask::MOVED_FROM, EventKind::MovedFrom),
    (EventMask::MOVED_TO, EventKind::MovedTo),
    (EventMask::CREATE, EventKind::Create),
    (EventMask::DELETE, EventKind::Delete),
    (EventMask::DELETE_SELF, EventKind::DeleteSelf),
    (EventMask::MOVE_SELF, EventKind::MoveSelf),
    (EventMask::UNMOUNT, EventKind::Unmount),
    (EventMask::Q_OVERFLOW, EventKind::QOverflow),
    (EventMask::IGNORED, EventKind::Ignored),
    (EventMask::ONLYDIR, EventKind::OnlyDir),
    (EventMask::DONT_FOLLOW, EventKind::DontFollow),
    (EventMask::EXCL_UNLINK, EventKind::ExclUnlink),
    (EventMask::MASK_ADD, EventKind::MaskAdd),
    (EventMask::ISDIR, EventKind::IsDir),
    (EventMask::ONESHOT, EventKind::Oneshot),
];

/// What the dispatcher does with the registry for an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Create,
    Delete,
    MovedFrom,
    MovedTo,
    /// No registry work; the command still runs.
    Passive,
}

/// A named event type, as reported to the command template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Access,
    Modify,
    Attrib,
    CloseWrite,
    CloseNowrite,
    Open,
    MovedFrom,
    MovedTo,
    Create,
    Delete,
    DeleteSelf,
    MoveSelf,
    Unmount,
    QOverflow,
    Ignored,
    OnlyDir,
    DontFollow,
    ExclUnlink,
    MaskAdd,
    IsDir,
    Oneshot,
    Close,
    Move,
    AllEvents,
}

impl EventKind {
    /// Classify the bits of an event that survived the configured mask.
    ///
    /// Exact `close`, `move` and `all_events` combinations get their combined
    /// name; anything else is named after its lowest set bit. Bits without a
    /// name produce `None`.
    pub fn classify(masked: EventMask) -> Option<Self> {
        if masked == EventMask::CLOSE {
            return Some(EventKind::Close);
        }
        if masked == EventMask::MOVE {
            return Some(EventKind::Move);
        }
        if masked == EventMask::ALL_EVENTS {
            return Some(EventKind::AllEvents);
        }

        let bits = masked.bits();
        if bits == 0 {
            return None;
        }
        let lowest = EventMask::from_bits_retain(1 << bits.trailing_zeros());

        SINGLE_BITS
            .iter()
            .find(|(bit, _)| *bit == lowest)
            .map(|(_, kind)| *kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Access => "access",
            EventKind::Modify => "modify",
            EventKind::Attrib => "attrib",
            EventKind::CloseWrite => "close_write",
            EventKind::CloseNowrite => "close_nowrite",
            EventKind::Open => "open",
            EventKind::MovedFrom => "moved_from",
            EventKind::MovedTo => "moved_to",
            EventKind::Create => "create",
            EventKind::Delete => "delete",
            EventKind::DeleteSelf => "delete_self",
            EventKind::MoveSelf => "move_self",
            EventKind::Unmount => "unmount",
            EventKind::QOverflow => "q_overflow",
            EventKind::Ignored => "ignored",
            EventKind::OnlyDir => "onlydir",
            EventKind::DontFollow => "dont_follow",
            EventKind::ExclUnlink => "excl_unlink",
            EventKind::MaskAdd => "mask_add",
            EventKind::IsDir => "isdir",
            EventKind::Oneshot => "oneshot",
            EventKind::Close => "close",
            EventKind::Move => "move",
            EventKind::AllEvents => "all_events",
        }
    }

    pub fn handler(self) -> Handler {
        match self {
            EventKind::Create => Handler::Create,
            EventKind::Delete => Handler::Delete,
            EventKind::MovedFrom => Handler::MovedFrom,
            EventKind::MovedTo => Handler::MovedTo,
            _ => Handler::Passive,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let mask = EventMask::parse_list(&["create", "delete"]).unwrap();
        assert_eq!(mask, EventMask::CREATE | EventMask::DELETE);

        let mask = EventMask::parse_list(&["default"]).unwrap();
        assert!(mask.contains(EventMask::MOVED_FROM | EventMask::MOVED_TO));
        assert!(mask.contains(EventMask::MODIFY));
    }

    #[test]
    fn test_parse_empty_list_is_default() {
        let empty: [&str; 0] = [];
        assert_eq!(EventMask::parse_list(&empty).unwrap(), EventMask::DEFAULT);
        assert_eq!(EventMask::parse_list(&[""]).unwrap(), EventMask::DEFAULT);
    }

    #[test]
    fn test_parse_unknown_event() {
        let err = EventMask::parse_list(&["create", "explode"]).unwrap_err();
        assert!(matches!(err, WatchError::UnknownEvent { ref name } if name == "explode"));
    }

    #[test]
    fn test_classify_lowest_bit() {
        assert_eq!(
            EventKind::classify(EventMask::CREATE),
            Some(EventKind::Create)
        );
        // A directory create that also matched `isdir` is still a create
        assert_eq!(
            EventKind::classify(EventMask::CREATE | EventMask::ISDIR),
            Some(EventKind::Create)
        );
        assert_eq!(
            EventKind::classify(EventMask::MODIFY | EventMask::DELETE),
            Some(EventKind::Modify)
        );
    }

    #[test]
    fn test_classify_combined_names() {
        assert_eq!(EventKind::classify(EventMask::CLOSE), Some(EventKind::Close));
        assert_eq!(EventKind::classify(EventMask::MOVE), Some(EventKind::Move));
        assert_eq!(
            EventKind::classify(EventMask::ALL_EVENTS),
            Some(EventKind::AllEvents)
        );
    }

    #[test]
    fn test_classify_unnamed_bits() {
        assert_eq!(EventKind::classify(EventMask::empty()), None);
        assert_eq!(EventKind::classify(EventMask::from_bits_retain(0x1000)), None);
    }

    #[test]
    fn test_handlers() {
        assert_eq!(EventKind::Create.handler(), Handler::Create);
        assert_eq!(EventKind::MovedTo.handler(), Handler::MovedTo);
        assert_eq!(EventKind::Modify.handler(), Handler::Passive);
        assert_eq!(EventKind::Modify.to_string(), "modify");
    }
}
