use std::fmt;
use uuid::Uuid;

/// Identifies one logical connection across its whole lifetime, including
/// reconnects — a dialer session keeps the same `SessionId` every time it
/// re-establishes the socket; an accepted (listener) session gets a fresh one
/// per accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        SessionId::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
