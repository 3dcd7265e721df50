//! Client-seitige Sitzung zum Relay
//!
//! Nutzt den FrameCodec aus pogchat-protocol fuer das Wire-Format
//! (u32 BE length + JSON payload).
//!
//! Ablauf:
//! 1. `verbinden` - TCP-Verbindung, Schluessel pruefen
//! 2. `login` - selbstadressierter Umschlag, wartet auf LOGIN_OK
//!    (abschaltbar ueber `ClientConfig::antwort_erwarten`)
//! 3. danach liest ein Hintergrund-Task eingehende Umschlaege, prueft die
//!    Signatur, entschluesselt und liefert `Eingehend` ueber den Kanal

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use pogchat_core::Fingerprint;
use pogchat_crypto::{KeyPair, KryptoDienste};
use pogchat_protocol::{Envelope, Frame, FrameCodec, FrameKind};
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::error::{ClientError, ClientResult};

/// Frist fuer die Login-Antwort des Servers
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Kapazitaet des Kanals fuer eingehende Nachrichten
const EINGANG_QUEUE: usize = 64;

/// Client-Einstellungen, muessen zur Relay-Konfiguration passen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Auf LOGIN_OK / LOGIN_FAILED warten (Relay: `login_antworten`)
    pub antwort_erwarten: bool,
    /// Frist fuer die Login-Antwort
    pub login_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            antwort_erwarten: true,
            login_timeout: LOGIN_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Eingehend
// ---------------------------------------------------------------------------

/// Ereignis aus dem Empfangs-Task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eingehend {
    /// Entschluesselte Nachricht mit gueltiger Signatur
    Nachricht {
        von: Fingerprint,
        text: String,
        zeit: DateTime<Utc>,
    },
    /// Umschlag kam an, konnte aber nicht geprueft oder entschluesselt werden
    Entschluesselungsfehler {
        von: Option<Fingerprint>,
        grund: String,
        zeit: DateTime<Utc>,
    },
    /// Server hat die Verbindung beendet
    Getrennt,
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// TCP-Sitzung eines Teilnehmers
pub struct ChatClient {
    dienste: KryptoDienste,
    schluessel: KeyPair,
    config: ClientConfig,
    fingerprint: Fingerprint,
    empfaenger: Option<Vec<u8>>,
    schreiber: FramedWrite<OwnedWriteHalf, FrameCodec>,
    /// Bis zum Login hier, danach beim Empfangs-Task
    leser: Option<FramedRead<OwnedReadHalf, FrameCodec>>,
    angemeldet: bool,
}

impl ChatClient {
    /// Baut eine TCP-Verbindung zum Relay auf (Standard-Einstellungen)
    ///
    /// `schluessel` muss beide Haelften enthalten.
    pub async fn verbinden(
        addr: impl ToSocketAddrs,
        schluessel: KeyPair,
        dienste: KryptoDienste,
    ) -> ClientResult<Self> {
        Self::verbinden_mit(addr, schluessel, dienste, ClientConfig::default()).await
    }

    /// Wie `verbinden`, mit expliziten Einstellungen
    pub async fn verbinden_mit(
        addr: impl ToSocketAddrs,
        schluessel: KeyPair,
        dienste: KryptoDienste,
        config: ClientConfig,
    ) -> ClientResult<Self> {
        schluessel.require_private()?;
        let fingerprint = Fingerprint::aus_public_key(schluessel.require_public()?);

        let stream = TcpStream::connect(addr).await?;
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        tracing::info!(server = %peer, fingerprint = %fingerprint.kurz(), "TCP-Verbindung hergestellt");

        let (leser, schreiber) = stream.into_split();
        Ok(Self {
            dienste,
            schluessel,
            config,
            fingerprint,
            empfaenger: None,
            schreiber: FramedWrite::new(schreiber, FrameCodec::new()),
            leser: Some(FramedRead::new(leser, FrameCodec::new())),
            angemeldet: false,
        })
    }

    /// Eigene Identitaet
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn ist_angemeldet(&self) -> bool {
        self.angemeldet
    }

    /// Meldet sich mit einem selbstsignierten Umschlag an
    ///
    /// Gibt den Kanal mit den eingehenden Nachrichten zurueck. Der Server
    /// erlaubt genau einen Versuch; nach einem Fehler ist die Sitzung
    /// unbrauchbar.
    ///
    /// Ohne `antwort_erwarten` gilt der Login als erfolgreich, sobald der
    /// Frame gesendet ist. Eine Ablehnung zeigt sich dann nur als
    /// `Eingehend::Getrennt`.
    pub async fn login(&mut self) -> ClientResult<mpsc::Receiver<Eingehend>> {
        if self.angemeldet {
            return Err(ClientError::BereitsAngemeldet);
        }
        let mut leser = self.leser.take().ok_or(ClientError::VerbindungGetrennt)?;

        let envelope = Envelope::login(&self.dienste, &self.schluessel)?;
        self.schreiber.send(Frame::login(&envelope)?).await?;

        if self.config.antwort_erwarten {
            self.antwort_abwarten(&mut leser).await?;
        }

        self.angemeldet = true;
        tracing::info!(fingerprint = %self.fingerprint.kurz(), "Login erfolgreich");

        let (tx, rx) = mpsc::channel(EINGANG_QUEUE);
        tokio::spawn(empfangen(
            leser,
            self.dienste.clone(),
            self.schluessel.clone(),
            tx,
        ));
        Ok(rx)
    }

    async fn antwort_abwarten(
        &self,
        leser: &mut FramedRead<OwnedReadHalf, FrameCodec>,
    ) -> ClientResult<()> {
        let antwort = tokio::time::timeout(self.config.login_timeout, leser.next())
            .await
            .map_err(|_| ClientError::Zeitueberschreitung)?
            .ok_or(ClientError::VerbindungGetrennt)??;
        let frame = Frame::parse(&antwort)?;

        match frame.kind {
            FrameKind::LoginOk => {
                if frame.payload != self.fingerprint.as_str() {
                    tracing::warn!(
                        erwartet = %self.fingerprint,
                        erhalten = %frame.payload,
                        "Server meldet abweichenden Fingerprint"
                    );
                }
            }
            FrameKind::LoginFailed => {
                tracing::warn!(grund = %frame.payload, "Login abgelehnt");
                return Err(ClientError::LoginAbgelehnt(frame.payload));
            }
            andere => return Err(ClientError::UnerwarteterFrame(andere)),
        }
        Ok(())
    }

    /// Setzt den Standard-Empfaenger fuer `nachricht_senden`
    pub fn empfaenger_setzen(&mut self, public_key: impl Into<Vec<u8>>) -> ClientResult<()> {
        let public_key = public_key.into();
        // Nur pruefen, ob die DER-Bytes ein gueltiger Schluessel sind
        KeyPair::from_der(Some(public_key.as_slice()), None)?;
        tracing::debug!(
            empfaenger = %Fingerprint::aus_public_key(&public_key).kurz(),
            "Empfaenger gesetzt"
        );
        self.empfaenger = Some(public_key);
        Ok(())
    }

    /// Sendet `text` an den gesetzten Empfaenger
    pub async fn nachricht_senden(&mut self, text: &str) -> ClientResult<()> {
        let empfaenger = self.empfaenger.clone().ok_or(ClientError::KeinEmpfaenger)?;
        self.nachricht_senden_an(&empfaenger, text).await
    }

    /// Verschluesselt `text` fuer `public_key`, signiert und sendet ihn
    pub async fn nachricht_senden_an(&mut self, public_key: &[u8], text: &str) -> ClientResult<()> {
        if !self.angemeldet {
            return Err(ClientError::NichtAngemeldet);
        }
        let envelope =
            Envelope::versiegeln(&self.dienste, &self.schluessel, public_key, text.as_bytes())?;
        self.schreiber.send(Frame::peer(&envelope)?).await?;
        tracing::trace!(an = %envelope.recipient_fingerprint().kurz(), "Nachricht gesendet");
        Ok(())
    }

    /// Schliesst die Schreibseite; der Server baut die Verbindung dann ab
    pub async fn trennen(mut self) -> ClientResult<()> {
        self.schreiber.close().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Empfangs-Task
// ---------------------------------------------------------------------------

async fn empfangen(
    mut leser: FramedRead<OwnedReadHalf, FrameCodec>,
    dienste: KryptoDienste,
    schluessel: KeyPair,
    tx: mpsc::Sender<Eingehend>,
) {
    while let Some(gelesen) = leser.next().await {
        let bytes = match gelesen {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(fehler = %e, "Frame-Lesefehler");
                break;
            }
        };

        let Some(ereignis) = auswerten(&bytes, &dienste, &schluessel) else {
            continue;
        };
        if tx.send(ereignis).await.is_err() {
            // Niemand hoert mehr zu
            return;
        }
    }

    let _ = tx.send(Eingehend::Getrennt).await;
}

/// Prueft und entschluesselt einen eingehenden Frame
fn auswerten(bytes: &[u8], dienste: &KryptoDienste, schluessel: &KeyPair) -> Option<Eingehend> {
    let fehler = |von: Option<Fingerprint>, grund: String| Eingehend::Entschluesselungsfehler {
        von,
        grund,
        zeit: Utc::now(),
    };

    let frame = match Frame::parse(bytes) {
        Ok(frame) => frame,
        Err(e) => return Some(fehler(None, e.to_string())),
    };
    if frame.kind != FrameKind::PeerMsg {
        tracing::debug!(art = ?frame.kind, "Frame ignoriert");
        return None;
    }

    let envelope = match frame.envelope() {
        Ok(envelope) => envelope,
        Err(e) => return Some(fehler(None, e.to_string())),
    };
    let von = envelope.sender_fingerprint();

    if let Err(e) = envelope.verify(dienste.signer.as_ref()) {
        return Some(fehler(Some(von), e.to_string()));
    }

    let Some(private_key) = schluessel.private_key() else {
        return Some(fehler(Some(von), "kein privater Schluessel".into()));
    };
    match envelope.decrypt_message(dienste.cryptor.as_ref(), private_key) {
        Ok(klartext) => Some(Eingehend::Nachricht {
            von,
            text: String::from_utf8_lossy(&klartext).into_owned(),
            zeit: Utc::now(),
        }),
        Err(e) => Some(fehler(Some(von), e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pogchat_crypto::KryptoConfig;
    use std::sync::OnceLock;
    use tokio::net::TcpListener;
    use tokio_util::codec::Framed;

    fn schluessel(index: usize) -> &'static KeyPair {
        static PAARE: OnceLock<Vec<KeyPair>> = OnceLock::new();
        &PAARE.get_or_init(|| {
            (0..2)
                .map(|_| KeyPair::generate(1024).unwrap())
                .collect()
        })[index]
    }

    fn dienste() -> KryptoDienste {
        KryptoDienste::neu(&KryptoConfig::default())
    }

    /// Minimaler Server: beantwortet den Login mit `antwort` und reicht
    /// danach `danach` an den Client weiter
    async fn test_server(antwort: Frame, danach: Vec<Frame>) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, FrameCodec::new());
            // Client ohne Login trennt einfach wieder
            let Some(Ok(bytes)) = framed.next().await else {
                return;
            };
            let login = Frame::parse(&bytes).unwrap();
            assert_eq!(login.kind, FrameKind::LoginMsg);
            framed.send(antwort).await.unwrap();
            for frame in danach {
                framed.send(frame).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn login_ok_und_eingehende_nachricht() {
        let d = dienste();
        let eigener = schluessel(0);
        let fremder = schluessel(1);

        let an_mich =
            Envelope::versiegeln(&d, fremder, eigener.public_key().unwrap(), b"servus").unwrap();
        let addr = test_server(
            Frame::login_ok(&eigener.fingerprint().unwrap()),
            vec![Frame::peer(&an_mich).unwrap()],
        )
        .await;

        let mut client = ChatClient::verbinden(addr, eigener.clone(), d).await.unwrap();
        let mut eingang = client.login().await.unwrap();
        assert!(client.ist_angemeldet());

        match eingang.recv().await.unwrap() {
            Eingehend::Nachricht { von, text, .. } => {
                assert_eq!(von, fremder.fingerprint().unwrap());
                assert_eq!(text, "servus");
            }
            andere => panic!("Erwartet Nachricht, erhalten {:?}", andere),
        }
        // Test-Server beendet sich danach
        assert_eq!(eingang.recv().await.unwrap(), Eingehend::Getrennt);
    }

    #[tokio::test]
    async fn login_ohne_server_antwort() {
        let d = dienste();
        let eigener = schluessel(0);
        let fremder = schluessel(1);
        let an_mich =
            Envelope::versiegeln(&d, fremder, eigener.public_key().unwrap(), b"still").unwrap();

        // Server bestaetigt den Login nicht, stellt aber danach zu
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, FrameCodec::new());
            let Some(Ok(bytes)) = framed.next().await else {
                return;
            };
            assert_eq!(Frame::parse(&bytes).unwrap().kind, FrameKind::LoginMsg);
            framed.send(Frame::peer(&an_mich).unwrap()).await.unwrap();
        });

        let config = ClientConfig {
            antwort_erwarten: false,
            ..ClientConfig::default()
        };
        let mut client = ChatClient::verbinden_mit(addr, eigener.clone(), d, config)
            .await
            .unwrap();
        let mut eingang = tokio::time::timeout(Duration::from_secs(1), client.login())
            .await
            .expect("Login darf nicht auf eine Antwort warten")
            .unwrap();
        assert!(client.ist_angemeldet());

        match eingang.recv().await.unwrap() {
            Eingehend::Nachricht { text, .. } => assert_eq!(text, "still"),
            andere => panic!("Erwartet Nachricht, erhalten {:?}", andere),
        }
    }

    #[tokio::test]
    async fn login_frist_ist_einstellbar() {
        // Server liest nur und antwortet nie
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, FrameCodec::new());
            while let Some(Ok(_)) = framed.next().await {}
        });

        let config = ClientConfig {
            login_timeout: Duration::from_millis(100),
            ..ClientConfig::default()
        };
        let mut client = ChatClient::verbinden_mit(addr, schluessel(0).clone(), dienste(), config)
            .await
            .unwrap();
        assert!(matches!(
            client.login().await,
            Err(ClientError::Zeitueberschreitung)
        ));
    }

    #[tokio::test]
    async fn nicht_entschluesselbare_nachricht_wird_gemeldet() {
        let d = dienste();
        let eigener = schluessel(0);
        let fremder = schluessel(1);

        // Fuer den Absender selbst verschluesselt, nicht fuer uns
        let falsch =
            Envelope::versiegeln(&d, fremder, fremder.public_key().unwrap(), b"x").unwrap();
        let addr = test_server(
            Frame::login_ok(&eigener.fingerprint().unwrap()),
            vec![Frame::peer(&falsch).unwrap()],
        )
        .await;

        let mut client = ChatClient::verbinden(addr, eigener.clone(), d).await.unwrap();
        let mut eingang = client.login().await.unwrap();
        match eingang.recv().await.unwrap() {
            Eingehend::Entschluesselungsfehler { von, .. } => {
                assert_eq!(von, fremder.fingerprint());
            }
            andere => panic!("Erwartet Entschluesselungsfehler, erhalten {:?}", andere),
        }
    }

    #[tokio::test]
    async fn login_abgelehnt() {
        let addr = test_server(Frame::login_failed("Ungueltige Signatur"), vec![]).await;
        let mut client = ChatClient::verbinden(addr, schluessel(0).clone(), dienste())
            .await
            .unwrap();
        match client.login().await.unwrap_err() {
            ClientError::LoginAbgelehnt(grund) => assert_eq!(grund, "Ungueltige Signatur"),
            andere => panic!("Erwartet LoginAbgelehnt, erhalten {:?}", andere),
        }
        assert!(!client.ist_angemeldet());
        // Kein zweiter Versuch auf derselben Sitzung
        assert!(matches!(
            client.login().await,
            Err(ClientError::VerbindungGetrennt)
        ));
    }

    #[tokio::test]
    async fn senden_erfordert_login_und_empfaenger() {
        let addr = test_server(Frame::login_failed("egal"), vec![]).await;
        let mut client = ChatClient::verbinden(addr, schluessel(0).clone(), dienste())
            .await
            .unwrap();

        assert!(matches!(
            client.nachricht_senden("hallo").await,
            Err(ClientError::KeinEmpfaenger)
        ));
        client
            .empfaenger_setzen(schluessel(1).public_key().unwrap())
            .unwrap();
        assert!(matches!(
            client.nachricht_senden("hallo").await,
            Err(ClientError::NichtAngemeldet)
        ));
    }

    #[tokio::test]
    async fn ungueltiger_empfaenger_schluessel() {
        let addr = test_server(Frame::login_failed("egal"), vec![]).await;
        let mut client = ChatClient::verbinden(addr, schluessel(0).clone(), dienste())
            .await
            .unwrap();
        assert!(matches!(
            client.empfaenger_setzen(vec![1u8, 2, 3]),
            Err(ClientError::Schluessel(_))
        ));
    }

    #[tokio::test]
    async fn verbinden_ohne_privaten_schluessel() {
        let nur_public = KeyPair::from_der(schluessel(0).public_key(), None).unwrap();
        let ergebnis = ChatClient::verbinden("127.0.0.1:1", nur_public, dienste()).await;
        assert!(matches!(ergebnis, Err(ClientError::Schluessel(_))));
    }
}
