//! pogchat – Kommandozeilen-Client
//!
//! Befehle:
//! - `pogchat keygen <public.pem> <private.pem> [bits]` – neues Schluessel-Paar
//! - `pogchat chat` (Standard) – zeilenbasierter Chat
//!
//! Umgebungsvariablen fuer `chat`:
//! - `POGCHAT_SERVER` – Relay-Adresse (Standard: 127.0.0.1:42069)
//! - `SENDER_PUBLIC` / `SENDER_PRIVATE` – eigenes Schluessel-Paar (PEM)
//! - `RECEIVER_PUBLIC` – oeffentlicher Schluessel des Empfaengers (PEM)
//! - `POGCHAT_LOGIN_ANTWORTEN` – `false`/`0`, wenn das Relay mit
//!   `login_antworten = false` laeuft (Standard: true)

use anyhow::{bail, Context, Result};
use pogchat_client::{ChatClient, ClientConfig, Eingehend};
use pogchat_crypto::{KeyPair, KryptoConfig, KryptoDienste, DEFAULT_BIT_SIZE};
use pogchat_observability::logging_initialisieren;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

const STANDARD_SERVER: &str = "127.0.0.1:42069";

#[tokio::main]
async fn main() -> Result<()> {
    // Logs nur fuer Warnungen, sonst stoeren sie die Chat-Ausgabe
    logging_initialisieren("warn", "text");

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("keygen") => schluessel_erzeugen(&args[1..]),
        None | Some("chat") => chatten().await,
        Some(anderer) => bail!(
            "Unbekannter Befehl '{anderer}'. Verwendung: pogchat [chat | keygen <public.pem> <private.pem> [bits]]"
        ),
    }
}

fn schluessel_erzeugen(args: &[String]) -> Result<()> {
    let (public, private) = match args {
        [public, private, ..] => (PathBuf::from(public), PathBuf::from(private)),
        _ => bail!("Verwendung: pogchat keygen <public.pem> <private.pem> [bits]"),
    };
    let bits = match args.get(2) {
        Some(bits) => bits
            .parse::<usize>()
            .with_context(|| format!("Ungueltige Schluessellaenge '{bits}'"))?,
        None => DEFAULT_BIT_SIZE,
    };

    let paar = KeyPair::generate(bits).context("Schluessel-Paar konnte nicht erzeugt werden")?;
    paar.store_public(&public)
        .with_context(|| format!("'{}' nicht schreibbar", public.display()))?;
    paar.store_private(&private)
        .with_context(|| format!("'{}' nicht schreibbar", private.display()))?;

    if let Some(fp) = paar.fingerprint() {
        println!("Schluessel-Paar erzeugt ({bits} Bit)");
        println!("Fingerprint: {fp}");
    }
    Ok(())
}

fn pfad_aus_env(name: &str) -> Result<PathBuf> {
    let wert = std::env::var(name).with_context(|| format!("Umgebungsvariable {name} fehlt"))?;
    Ok(PathBuf::from(wert))
}

fn client_config() -> ClientConfig {
    let antwort_erwarten = match std::env::var("POGCHAT_LOGIN_ANTWORTEN") {
        Ok(wert) => !matches!(wert.trim(), "0" | "false" | "nein"),
        Err(_) => true,
    };
    ClientConfig {
        antwort_erwarten,
        ..ClientConfig::default()
    }
}

fn empfaenger_laden(pfad: &Path) -> Result<Vec<u8>> {
    let paar = KeyPair::load_public(pfad)
        .with_context(|| format!("Empfaenger-Schluessel '{}' nicht ladbar", pfad.display()))?;
    Ok(paar.require_public()?.to_vec())
}

async fn chatten() -> Result<()> {
    let server = std::env::var("POGCHAT_SERVER").unwrap_or_else(|_| STANDARD_SERVER.into());
    let public = pfad_aus_env("SENDER_PUBLIC")?;
    let private = pfad_aus_env("SENDER_PRIVATE")?;
    let empfaenger = pfad_aus_env("RECEIVER_PUBLIC")?;

    let eigener = KeyPair::laden(Some(public.as_path()), Some(private.as_path()))
        .context("Eigenes Schluessel-Paar nicht ladbar")?;
    let dienste = KryptoDienste::neu(&KryptoConfig::default());

    let mut client = ChatClient::verbinden_mit(server.as_str(), eigener, dienste, client_config())
        .await
        .with_context(|| format!("Verbindung zu {server} fehlgeschlagen"))?;
    let mut eingang = client.login().await.context("Login fehlgeschlagen")?;
    client.empfaenger_setzen(empfaenger_laden(&empfaenger)?)?;

    println!("Angemeldet als {}", client.fingerprint().kurz());

    let mut zeilen = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            zeile = zeilen.next_line() => {
                let Some(zeile) = zeile.context("stdin nicht lesbar")? else {
                    break;
                };
                let text = zeile.trim_end();
                if text.is_empty() {
                    continue;
                }
                if let Err(e) = client.nachricht_senden(text).await {
                    eprintln!("Senden fehlgeschlagen: {e}");
                }
            }

            ereignis = eingang.recv() => match ereignis {
                Some(Eingehend::Nachricht { von, text, zeit }) => {
                    println!("[{}] {}: {}", zeit.format("%H:%M:%S"), von.kurz(), text);
                }
                Some(Eingehend::Entschluesselungsfehler { von, grund, .. }) => {
                    let von = von.as_ref().map(|fp| fp.kurz()).unwrap_or("?");
                    eprintln!("Nachricht von {von} verworfen: {grund}");
                }
                Some(Eingehend::Getrennt) | None => {
                    eprintln!("Verbindung zum Server getrennt");
                    break;
                }
            },
        }
    }

    client.trennen().await?;
    Ok(())
}
