//! pogchat-client - Gegenstelle zum Relay
//!
//! `ChatClient` meldet sich per selbstsigniertem Umschlag an, verschluesselt
//! ausgehende Nachrichten fuer den Empfaenger und liefert eingehende
//! Nachrichten entschluesselt ueber einen Kanal.

pub mod error;
pub mod session;

pub use error::{ClientError, ClientResult};
pub use session::{ChatClient, ClientConfig, Eingehend, LOGIN_TIMEOUT};
