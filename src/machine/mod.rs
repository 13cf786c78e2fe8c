pub mod app;
pub mod whiteboard;

pub use app::{
    MemoryNicknameStore, NicknameStore, SessionEffect, SessionEvent, SessionMachine, SessionState,
};
pub use whiteboard::{Effect, InputEvent, InteractionMode, Key, WhiteboardMachine};
