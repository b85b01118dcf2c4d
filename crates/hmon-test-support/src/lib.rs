//! Test-only mock HMON peer, used by the integration suites under
//! `tests/integration/` to stand in for a remote interpreter process or a
//! remote monitoring orchestrator without spawning a real one.

mod mock_peer;
mod mock_server;

pub use mock_peer::MockHmonPeer;
pub use mock_server::{dial, MockHmonServer};
