//! Gemeinsame Identifikationstypen fuer pogchat
//!
//! IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Verbindungs-IDs und Identitaeten zur Compilezeit auszuschliessen.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Laenge des Kurznamens in Zeichen
const KURZ_LAENGE: usize = 10;

/// Eindeutige ID einer Socket-Verbindung
///
/// Wird beim Accept vergeben und lebt genau so lange wie die Verbindung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Fingerprint eines oeffentlichen Schluessels
///
/// SHA-256 ueber die DER-Bytes, URL-sicher base64-kodiert ohne Padding.
/// Gleiche Schluessel-Bytes ergeben immer den gleichen Fingerprint; er ist
/// der Schluessel der Routing-Tabelle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Leitet den Fingerprint aus den DER-Bytes eines oeffentlichen Schluessels ab
    pub fn aus_public_key(der: &[u8]) -> Self {
        let digest = Sha256::digest(der);
        Self(URL_SAFE_NO_PAD.encode(digest))
    }

    /// Gibt den Fingerprint als String zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Kurzer Anzeigename (die ersten Zeichen des Fingerprints)
    pub fn kurz(&self) -> &str {
        let ende = self.0.len().min(KURZ_LAENGE);
        &self.0[..ende]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_eindeutig() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b, "Zwei neue ConnectionIds muessen verschieden sein");
    }

    #[test]
    fn connection_id_display() {
        let id = ConnectionId(Uuid::nil());
        assert!(id.to_string().starts_with("conn:"));
    }

    #[test]
    fn fingerprint_deterministisch() {
        let der = b"\x30\x0d\x02\x06\x00\xff\x01\x02\x03\x04";
        assert_eq!(
            Fingerprint::aus_public_key(der),
            Fingerprint::aus_public_key(&der.to_vec())
        );
    }

    #[test]
    fn fingerprint_unterscheidet_schluessel() {
        let a = Fingerprint::aus_public_key(b"schluessel-a");
        let b = Fingerprint::aus_public_key(b"schluessel-b");
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_ist_textsicher() {
        let fp = Fingerprint::aus_public_key(&[0u8; 300]);
        // 32 Bytes SHA-256 -> 43 Zeichen base64 ohne Padding
        assert_eq!(fp.as_str().len(), 43);
        assert!(fp
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn fingerprint_kurzname() {
        let fp = Fingerprint::aus_public_key(b"alice");
        assert_eq!(fp.kurz().len(), 10);
        assert!(fp.as_str().starts_with(fp.kurz()));
    }

    #[test]
    fn fingerprint_ist_serde_transparent() {
        let fp = Fingerprint::aus_public_key(b"bob");
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{}\"", fp));
        let fp2: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(fp, fp2);
    }
}
