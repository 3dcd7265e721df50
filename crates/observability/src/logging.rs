//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Konfiguration):
//! - `POGCHAT_LOG_LEVEL`: Filter-Ausdruck (z.B. `info` oder
//!   `pogchat_relay=debug,info`), Standard: info
//! - `POGCHAT_LOG_FORMAT`: Format (text/json), Standard: text

use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer den Log-Filter
pub const ENV_LOG_LEVEL: &str = "POGCHAT_LOG_LEVEL";

/// Umgebungsvariable fuer das Log-Format
pub const ENV_LOG_FORMAT: &str = "POGCHAT_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parst "text" oder "json"; alles andere ist ungueltig
    pub fn parsen(wert: &str) -> Option<Self> {
        match wert {
            "text" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Initialisiert das Logging-System.
///
/// Umgebungsvariablen schlagen die uebergebenen Werte. Ungueltige Angaben
/// fallen auf `info` / `text` zurueck.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .and_then(|f| LogFormat::parsen(&f))
        .or_else(|| LogFormat::parsen(format))
        .unwrap_or_default();

    match format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .init();
        }
        LogFormat::Text => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parsen() {
        assert_eq!(LogFormat::parsen("text"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parsen("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parsen("JSON"), None);
        assert_eq!(LogFormat::parsen("xml"), None);
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }
}
