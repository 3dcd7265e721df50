//! pogchat-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use pogchat_crypto::KryptoDienste;
use pogchat_relay::RelayServer;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet das Relay und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown-Signal empfangen, Server wird beendet"),
                Err(e) => tracing::error!(fehler = %e, "Ctrl-C-Handler nicht installierbar"),
            }
            let _ = shutdown_tx.send(true);
        });

        self.laufen(shutdown_rx).await
    }

    /// Startet das Relay und laeuft bis `shutdown_rx` auf `true` wechselt
    ///
    /// Reihenfolge:
    /// 1. Krypto-Dienste aus `[krypto]` erzeugen
    /// 2. TCP-Listener binden (Konfiguration wird dabei validiert)
    /// 3. Router + Accept-Loop bis zum Shutdown
    pub async fn laufen(self, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let adresse = self.config.tcp_bind_adresse();
        let dienste = KryptoDienste::neu(&self.config.krypto);

        let relay = RelayServer::binden(adresse.as_str(), self.config.relay.clone(), dienste.signer)
            .await
            .with_context(|| format!("TCP-Listener auf {adresse} nicht startbar"))?;

        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %relay.lokale_adresse()?,
            hash = ?self.config.krypto.hash,
            "Server startet"
        );

        // Router meldet den Verbindungsstand selbst beim Beenden
        let relay_task = tokio::spawn(relay.starten(shutdown_rx));

        relay_task.await.context("Relay-Task abgebrochen")??;
        tracing::info!("Server beendet");
        Ok(())
    }
}
