//! pogchat-protocol - Nachrichtenformat und Wire-Protokoll
//!
//! - `envelope` - signierter, verschluesselter Umschlag
//! - `frame` - aeusserer `{type, payload}`-Frame
//! - `wire` - Laengen-Praefix-Codec fuer TCP

pub mod envelope;
pub mod error;
pub mod frame;
pub mod wire;

pub use envelope::{Envelope, LOGIN_KLARTEXT};
pub use error::{ProtocolError, ProtocolResult};
pub use frame::{Frame, FrameKind};
pub use wire::{FrameCodec, DEFAULT_MAX_FRAME_SIZE, PROTOKOLL_VERSION};
