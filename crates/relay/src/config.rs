//! Relay-Konfiguration
//!
//! Explizite, beim Start validierte Werte. Zeitangaben in Sekunden,
//! `0` schaltet die jeweilige Frist ab.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{RelayError, RelayResult};

/// Konfiguration des Relays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Maximale Groesse eines Wire-Frames in Bytes
    pub max_frame_bytes: usize,
    /// Kapazitaet der Ausgangs-Queue pro Verbindung
    pub ausgangs_queue: usize,
    /// Kapazitaet der Router-Mailbox
    pub router_queue: usize,
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_verbindungen: usize,
    /// Frist fuer den Login nach dem Verbindungsaufbau
    pub login_timeout_sek: u64,
    /// Leerlauf-Frist beim Lesen
    pub lese_timeout_sek: u64,
    /// Frist fuer einen einzelnen Socket-Schreibvorgang
    pub schreib_timeout_sek: u64,
    /// LOGIN_OK / LOGIN_FAILED an den Client senden
    pub login_antworten: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: pogchat_protocol::DEFAULT_MAX_FRAME_SIZE,
            ausgangs_queue: 256,
            router_queue: 1024,
            max_verbindungen: 1024,
            login_timeout_sek: 30,
            lese_timeout_sek: 0,
            schreib_timeout_sek: 10,
            login_antworten: true,
        }
    }
}

impl RelayConfig {
    /// Validiert die Konfiguration
    pub fn validieren(&self) -> RelayResult<()> {
        if self.max_frame_bytes == 0 || self.max_frame_bytes > u32::MAX as usize {
            return Err(RelayError::Konfiguration(format!(
                "max_frame_bytes muss zwischen 1 und {} liegen (war: {})",
                u32::MAX,
                self.max_frame_bytes
            )));
        }
        if self.ausgangs_queue == 0 {
            return Err(RelayError::Konfiguration(
                "ausgangs_queue muss groesser als 0 sein".into(),
            ));
        }
        if self.router_queue == 0 {
            return Err(RelayError::Konfiguration(
                "router_queue muss groesser als 0 sein".into(),
            ));
        }
        if self.max_verbindungen == 0 {
            return Err(RelayError::Konfiguration(
                "max_verbindungen muss groesser als 0 sein".into(),
            ));
        }
        Ok(())
    }

    pub fn login_timeout(&self) -> Option<Duration> {
        sekunden(self.login_timeout_sek)
    }

    pub fn lese_timeout(&self) -> Option<Duration> {
        sekunden(self.lese_timeout_sek)
    }

    pub fn schreib_timeout(&self) -> Option<Duration> {
        sekunden(self.schreib_timeout_sek)
    }
}

fn sekunden(wert: u64) -> Option<Duration> {
    (wert > 0).then(|| Duration::from_secs(wert))
}
