use std::fmt;
use uuid::Uuid;

/// Identifies one `start_listener` acceptor loop, independent of the
/// `SessionId`s it produces for each connection it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        ListenerId(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        ListenerId::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
