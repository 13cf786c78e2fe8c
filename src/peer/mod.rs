pub mod connection;
pub mod session;

pub use connection::{add_remote_candidate, apply_pending_candidates, new_peer};
pub use session::PeerSession;
