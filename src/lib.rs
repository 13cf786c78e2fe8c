pub mod config;
pub mod engine;
pub mod error;
pub mod logger;
pub mod machine;
pub mod peer;
pub mod protocol;
pub mod sampler;
pub mod signaling;
pub mod utils;

pub use config::SyncConfig;
pub use engine::{Renderer, SyncEngine};
pub use error::SyncError;
pub use machine::{
    Effect, InputEvent, InteractionMode, Key, MemoryNicknameStore, NicknameStore, SessionEffect,
    SessionEvent, SessionMachine, SessionState, WhiteboardMachine,
};
pub use peer::PeerSession;
pub use protocol::{Envelope, PanEvent, StrokeEvent};
pub use sampler::{interpolate, Point};
pub use signaling::{SignalingClient, TransportEvent};
