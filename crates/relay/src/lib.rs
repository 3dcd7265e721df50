//! pogchat-relay - TCP-Relay fuer Ende-zu-Ende-verschluesselte Umschlaege
//!
//! Der Server entschluesselt nie etwas. Er prueft nur Signaturen und leitet
//! Chiffretext anhand des Empfaenger-Fingerprints weiter.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (RelayServer)
//!     |
//!     v
//! pro Verbindung zwei Tasks
//!     +-- Empfangs-Task: Socket -> Frame -> Router
//!     +-- Sende-Task:    Ausgangs-Queue -> Socket
//!     |
//!     v
//! Router (ein Task, besitzt allen Routing-Zustand)
//!     +-- wartend:  ConnectionId -> Verbindung (noch nicht angemeldet)
//!     +-- routing:  Fingerprint  -> Verbindung (angemeldet)
//! ```
//!
//! Zustandsaenderungen passieren ausschliesslich im Router-Task; die
//! Verbindungs-Tasks kommunizieren nur ueber Nachrichten mit ihm.

pub mod config;
pub mod connection;
pub mod error;
pub mod router;
pub mod tcp;

// Bequeme Re-Exporte
pub use config::RelayConfig;
pub use connection::{verbindung_bedienen, Verbindung};
pub use error::{RegistrationError, RelayError, RelayResult, RoutingError};
pub use router::{ConnectionManager, Ergebnis, Router, RouterHandle, RouterStatistik};
pub use tcp::RelayServer;
