//! Fehlertypen fuer das Relay

use pogchat_core::{AuthError, ConnectionId, Fingerprint};
use pogchat_protocol::ProtocolError;
use thiserror::Error;

/// Fehler bei der Zustellung bzw. Identitaetsbindung
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// Fingerprint ist bereits von einer anderen, lebenden Verbindung belegt
    #[error("Identitaet bereits angemeldet: {0}")]
    DoppelteIdentitaet(Fingerprint),

    /// Kein angemeldeter Empfaenger unter diesem Fingerprint
    #[error("Empfaenger nicht erreichbar: {0}")]
    EmpfaengerOffline(Fingerprint),

    /// Ausgangs-Queue des Empfaengers voll, Empfaenger wurde getrennt
    #[error("Empfaenger ueberlastet und getrennt: {0}")]
    EmpfaengerUeberlastet(Fingerprint),
}

/// Fehler bei der Registrierung einer Verbindung im Router
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Verbindung bereits registriert: {0}")]
    BereitsRegistriert(ConnectionId),

    #[error("Server ist voll")]
    ServerVoll,
}

/// Fehlertyp fuer das Relay
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Authentifizierungsfehler: {0}")]
    Auth(#[from] AuthError),

    #[error("Routing-Fehler: {0}")]
    Routing(#[from] RoutingError),

    #[error("Registrierungsfehler: {0}")]
    Registrierung(#[from] RegistrationError),

    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ungueltige Konfiguration: {0}")]
    Konfiguration(String),

    /// Router-Task laeuft nicht mehr (Shutdown)
    #[error("Router gestoppt")]
    RouterGestoppt,
}

/// Result-Typ fuer das Relay
pub type RelayResult<T> = Result<T, RelayError>;
