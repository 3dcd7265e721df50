//! Fehlertypen fuer das Kryptografie-Subsystem

use thiserror::Error;

use crate::types::KeyKind;

/// Fehler bei Verschluesselung, Entschluesselung und Signierung
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Klartext zu gross: {laenge} Bytes (Maximum: {maximum} Bytes)")]
    NachrichtZuGross { laenge: usize, maximum: usize },

    #[error("Ungueltiger Schluessel: {0}")]
    UngueltigerSchluessel(String),

    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    #[error("Entschluesselung fehlgeschlagen: {0}")]
    Entschluesselung(String),

    #[error("Signierung fehlgeschlagen: {0}")]
    Signierung(String),

    #[error("Schluessel-Generierung fehlgeschlagen: {0}")]
    SchluesselGenerierung(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Fehler beim Laden, Speichern und Erzeugen von Schluessel-Paaren
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ungueltiger PEM-Block: {0}")]
    UngueltigesPem(String),

    #[error("Falscher Schluessel-Typ: erwartet '{erwartet}', gefunden '{gefunden}'")]
    FalscherSchluesselTyp { erwartet: String, gefunden: String },

    #[error("Ungueltige DER-Kodierung: {0}")]
    UngueltigesDer(String),

    #[error("Schluessel fehlt: {0}")]
    SchluesselFehlt(KeyKind),

    #[error(transparent)]
    Krypto(#[from] CryptoError),
}

pub type KeyResult<T> = Result<T, KeyError>;
