//! pogchat Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use anyhow::Result;
use pogchat_observability::logging_initialisieren;
use pogchat_server::{config::ServerConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("POGCHAT_CONFIG").unwrap_or_else(|_| "pogchat.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let geladen = ServerConfig::laden(&config_pfad)?;
    let datei_fehlt = geladen.is_none();
    let config = geladen.unwrap_or_default();

    logging_initialisieren(&config.logging.level, &config.logging.format);

    // Erst nach dem Logging-Setup, sonst geht die Warnung verloren
    if datei_fehlt {
        tracing::warn!(
            pfad = %config_pfad,
            "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
        );
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "pogchat Server wird initialisiert"
    );

    Server::neu(config).starten().await
}
