//! Authentifizierungs-Fehler
//!
//! Wird von der Signatur-Pruefung (Krypto-Crate) und vom Router
//! (Identitaetsbindung, Zustandspruefung) gemeinsam verwendet, damit
//! Aufrufer loggen koennen *warum* eine Nachricht abgelehnt wurde.

use thiserror::Error;

use crate::types::Fingerprint;

/// Fehler bei der Authentifizierung einer Nachricht oder Verbindung
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Signatur passt nicht zu Schluessel und Nachricht
    #[error("Ungueltige Signatur")]
    UngueltigeSignatur,

    /// Oeffentlicher Schluessel zur Pruefung nicht lesbar
    #[error("Ungueltiger oeffentlicher Schluessel: {0}")]
    UngueltigerSchluessel(String),

    /// Absender der Nachricht ist nicht die beim Login gebundene Identitaet
    #[error("Identitaet abweichend: gebunden={gebunden}, behauptet={behauptet}")]
    IdentitaetAbweichend {
        gebunden: Fingerprint,
        behauptet: Fingerprint,
    },

    /// Verbindung ist noch nicht authentifiziert
    #[error("Verbindung ist nicht angemeldet")]
    NichtAngemeldet,

    /// Verbindung ist bereits authentifiziert
    #[error("Verbindung ist bereits angemeldet")]
    BereitsAngemeldet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        assert_eq!(AuthError::UngueltigeSignatur.to_string(), "Ungueltige Signatur");
    }

    #[test]
    fn identitaet_abweichend_nennt_beide_seiten() {
        let gebunden = Fingerprint::aus_public_key(b"a");
        let behauptet = Fingerprint::aus_public_key(b"b");
        let e = AuthError::IdentitaetAbweichend {
            gebunden: gebunden.clone(),
            behauptet: behauptet.clone(),
        };
        let text = e.to_string();
        assert!(text.contains(gebunden.as_str()));
        assert!(text.contains(behauptet.as_str()));
    }
}
