//! Fehlertypen fuer Envelope, Frame und Wire-Format

use pogchat_crypto::{CryptoError, KeyError};
use std::io;
use thiserror::Error;

use crate::frame::FrameKind;

/// Fehler beim Parsen, Framing und Aufbau von Nachrichten
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame- oder Envelope-JSON nicht lesbar
    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Ungueltiges Base64 in Feld '{feld}': {grund}")]
    UngueltigesBase64 { feld: &'static str, grund: String },

    /// Laengenfeld ueberschreitet das konfigurierte Maximum
    #[error("Frame zu gross: {groesse} Bytes (Maximum: {maximum} Bytes)")]
    FrameZuGross { groesse: usize, maximum: usize },

    #[error("Falscher Frame-Typ: erwartet {erwartet:?}, erhalten {erhalten:?}")]
    FalscherTyp {
        erwartet: FrameKind,
        erhalten: FrameKind,
    },

    #[error(transparent)]
    Krypto(#[from] CryptoError),

    #[error(transparent)]
    Schluessel(#[from] KeyError),

    #[error("IO-Fehler: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Framing-Fehler lassen sich nicht resynchronisieren
    pub fn ist_framing_fehler(&self) -> bool {
        matches!(self, ProtocolError::FrameZuGross { .. } | ProtocolError::Io(_))
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
