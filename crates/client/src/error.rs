//! Fehlertypen fuer den Client

use pogchat_crypto::KeyError;
use pogchat_protocol::{FrameKind, ProtocolError};
use thiserror::Error;

/// Fehler die bei der Server-Verbindung auftreten koennen
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),

    #[error("Schluesselfehler: {0}")]
    Schluessel(#[from] KeyError),

    /// Server hat mit LOGIN_FAILED geantwortet
    #[error("Login abgelehnt: {0}")]
    LoginAbgelehnt(String),

    #[error("Keine Antwort vom Server innerhalb der Frist")]
    Zeitueberschreitung,

    #[error("Verbindung vom Server getrennt")]
    VerbindungGetrennt,

    #[error("Nicht angemeldet")]
    NichtAngemeldet,

    #[error("Bereits angemeldet")]
    BereitsAngemeldet,

    #[error("Kein Empfaenger gesetzt")]
    KeinEmpfaenger,

    #[error("Unerwartete Antwort vom Server: {0:?}")]
    UnerwarteterFrame(FrameKind),
}

/// Result-Typ fuer den Client
pub type ClientResult<T> = Result<T, ClientError>;
