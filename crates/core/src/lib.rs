//! pogchat-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die Krypto-, Protokoll- und
//! Relay-Crate gemeinsam nutzen: Verbindungs-IDs, Fingerprints von
//! oeffentlichen Schluesseln und den Authentifizierungs-Fehler.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::AuthError;
pub use types::{ConnectionId, Fingerprint};
