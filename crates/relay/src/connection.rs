//! Verbindung - eine einzelne Socket-Verbindung zum Relay
//!
//! Jede Verbindung laeuft als zwei Tasks:
//!
//! - Empfangs-Task: liest Frames vom Socket und reicht sie an den Router.
//!   Endet bei Lesefehler, EOF, Fristablauf, Shutdown oder wenn der
//!   Sende-Task endet, und meldet die Verbindung dann beim Router ab.
//! - Sende-Task: leert die Ausgangs-Queue auf den Socket. Endet, wenn der
//!   Router die Queue schliesst (die `Verbindung` fallen laesst) oder ein
//!   Schreibvorgang fehlschlaegt.
//!
//! ## Zustand
//! ```text
//! Wartend --(gueltiger LOGIN_MSG)--> Angemeldet
//!    |                                   |
//!    +----------- Abbau <----------------+
//! ```
//! Den Zustand aendert nur der Router; die Tasks lesen ihn.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use pogchat_core::{ConnectionId, Fingerprint};
use pogchat_protocol::{Frame, FrameCodec, ProtocolError};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::config::RelayConfig;
use crate::router::RouterHandle;

// ---------------------------------------------------------------------------
// Verbindungszustand
// ---------------------------------------------------------------------------

/// Zwischen Router und Verbindungs-Tasks geteilter Zustand
#[derive(Debug, Default)]
pub struct VerbindungsZustand {
    angemeldet: AtomicBool,
    fingerprint: OnceLock<Fingerprint>,
}

impl VerbindungsZustand {
    pub fn ist_angemeldet(&self) -> bool {
        self.angemeldet.load(Ordering::Acquire)
    }

    /// Gebundene Identitaet (erst nach dem Login gesetzt)
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.get()
    }

    /// Bindet die Identitaet; eine Verbindung wird hoechstens einmal angemeldet
    pub(crate) fn anmelden(&self, fingerprint: Fingerprint) {
        if self.fingerprint.set(fingerprint).is_ok() {
            self.angemeldet.store(true, Ordering::Release);
        }
    }
}

// ---------------------------------------------------------------------------
// Verbindung
// ---------------------------------------------------------------------------

/// Grund, warum ein Frame nicht eingereiht werden konnte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueFehler {
    /// Empfaenger liest nicht schnell genug
    Voll,
    /// Sende-Task ist bereits beendet
    Geschlossen,
}

/// Router-seitiger Griff auf eine Verbindung
///
/// Der Router haelt den einzigen Sender der Ausgangs-Queue. Faellt die
/// `Verbindung` weg, wird die Queue geschlossen: der Sende-Task schreibt
/// noch die eingereihten Frames und beendet sich dann.
#[derive(Debug)]
pub struct Verbindung {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    zustand: Arc<VerbindungsZustand>,
    ausgang: mpsc::Sender<Frame>,
}

impl Verbindung {
    /// Erstellt eine Verbindung mit begrenzter Ausgangs-Queue
    pub fn neu(peer_addr: SocketAddr, queue_groesse: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (ausgang, ausgang_rx) = mpsc::channel(queue_groesse);
        let verbindung = Self {
            id: ConnectionId::new(),
            peer_addr,
            zustand: Arc::new(VerbindungsZustand::default()),
            ausgang,
        };
        (verbindung, ausgang_rx)
    }

    pub fn zustand(&self) -> &Arc<VerbindungsZustand> {
        &self.zustand
    }

    /// Reiht einen Frame nicht-blockierend ein
    pub fn einreihen(&self, frame: Frame) -> Result<(), QueueFehler> {
        self.ausgang.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueFehler::Voll,
            mpsc::error::TrySendError::Closed(_) => QueueFehler::Geschlossen,
        })
    }
}

// ---------------------------------------------------------------------------
// Verbindungs-Tasks
// ---------------------------------------------------------------------------

/// Bedient eine akzeptierte Verbindung bis zu ihrem Ende
///
/// Registriert die Verbindung beim Router, startet den Sende-Task und
/// fuehrt die Empfangsschleife im aufrufenden Task aus.
pub async fn verbindung_bedienen<S>(
    stream: S,
    peer_addr: SocketAddr,
    router: RouterHandle,
    config: Arc<RelayConfig>,
    shutdown_rx: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (verbindung, ausgang_rx) = Verbindung::neu(peer_addr, config.ausgangs_queue);
    let id = verbindung.id;
    let zustand = Arc::clone(verbindung.zustand());

    if let Err(e) = router.registrieren(verbindung).await {
        tracing::warn!(peer = %peer_addr, fehler = %e, "Registrierung fehlgeschlagen");
        return;
    }

    tracing::info!(peer = %peer_addr, verbindung = %id, "Neue Verbindung");

    let (leser, schreiber) = tokio::io::split(stream);
    let leser = FramedRead::new(leser, FrameCodec::with_max_size(config.max_frame_bytes));
    let schreiber = FramedWrite::new(schreiber, FrameCodec::with_max_size(config.max_frame_bytes));

    // Endet der Sende-Task, faellt `beendet_tx` und der Empfangs-Task folgt
    let (beendet_tx, beendet_rx) = oneshot::channel::<()>();
    let sende_task = tokio::spawn(sende_schleife(
        id,
        ausgang_rx,
        schreiber,
        config.schreib_timeout(),
        beendet_tx,
    ));

    empfangs_schleife(
        id,
        peer_addr,
        leser,
        &router,
        &zustand,
        &config,
        beendet_rx,
        shutdown_rx,
    )
    .await;

    router.abmelden(id).await;
    if let Err(e) = sende_task.await {
        tracing::error!(verbindung = %id, fehler = %e, "Sende-Task abgebrochen");
    }

    tracing::info!(
        peer = %peer_addr,
        verbindung = %id,
        fingerprint = ?zustand.fingerprint().map(Fingerprint::kurz),
        "Verbindung beendet"
    );
}

/// Liest Frames und reicht sie an den Router
#[allow(clippy::too_many_arguments)]
async fn empfangs_schleife<R>(
    id: ConnectionId,
    peer_addr: SocketAddr,
    mut leser: FramedRead<R, FrameCodec>,
    router: &RouterHandle,
    zustand: &VerbindungsZustand,
    config: &RelayConfig,
    mut beendet_rx: oneshot::Receiver<()>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    if *shutdown_rx.borrow() {
        return;
    }

    let login_timeout = config.login_timeout();
    let mut login_offen = login_timeout.is_some();
    let login_frist = tokio::time::sleep(login_timeout.unwrap_or(Duration::MAX));
    tokio::pin!(login_frist);

    let lese_timeout = config.lese_timeout();

    loop {
        tokio::select! {
            // Sende-Task beendet (Queue geschlossen oder Schreibfehler)
            _ = &mut beendet_rx => {
                tracing::debug!(verbindung = %id, "Ausgang geschlossen - Verbindung wird abgebaut");
                break;
            }

            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::debug!(verbindung = %id, "Shutdown-Signal - Verbindung wird getrennt");
                    break;
                }
            }

            _ = &mut login_frist, if login_offen => {
                login_offen = false;
                if !zustand.ist_angemeldet() {
                    tracing::warn!(peer = %peer_addr, verbindung = %id, "Login-Frist abgelaufen");
                    break;
                }
            }

            gelesen = naechster_frame(&mut leser, lese_timeout) => {
                match gelesen {
                    Lesen::Frame(bytes) => {
                        tracing::trace!(verbindung = %id, bytes = bytes.len(), "Frame empfangen");
                        let frame = Frame::parse(&bytes);
                        if router.eingang(id, frame).await.is_err() {
                            break;
                        }
                    }
                    Lesen::Fehler(e) if e.ist_framing_fehler() => {
                        tracing::warn!(peer = %peer_addr, verbindung = %id, fehler = %e, "Framing-Fehler - Stream nicht mehr synchron");
                        break;
                    }
                    Lesen::Fehler(e) => {
                        tracing::debug!(peer = %peer_addr, verbindung = %id, fehler = %e, "Lesefehler");
                        break;
                    }
                    Lesen::Ende => {
                        tracing::debug!(verbindung = %id, "Verbindung vom Client getrennt");
                        break;
                    }
                    Lesen::Zeitueberschreitung => {
                        tracing::info!(peer = %peer_addr, verbindung = %id, "Lese-Frist abgelaufen");
                        break;
                    }
                }
            }
        }
    }
}

enum Lesen {
    Frame(Bytes),
    Fehler(ProtocolError),
    Ende,
    Zeitueberschreitung,
}

async fn naechster_frame<R>(
    leser: &mut FramedRead<R, FrameCodec>,
    frist: Option<Duration>,
) -> Lesen
where
    R: AsyncRead + Unpin,
{
    let naechstes = match frist {
        Some(frist) => match tokio::time::timeout(frist, leser.next()).await {
            Ok(naechstes) => naechstes,
            Err(_) => return Lesen::Zeitueberschreitung,
        },
        None => leser.next().await,
    };

    match naechstes {
        Some(Ok(bytes)) => Lesen::Frame(bytes),
        Some(Err(e)) => Lesen::Fehler(e),
        None => Lesen::Ende,
    }
}

/// Schreibt die Ausgangs-Queue auf den Socket
async fn sende_schleife<W>(
    id: ConnectionId,
    mut ausgang_rx: mpsc::Receiver<Frame>,
    mut schreiber: FramedWrite<W, FrameCodec>,
    schreib_timeout: Option<Duration>,
    _beendet_tx: oneshot::Sender<()>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = ausgang_rx.recv().await {
        let ergebnis = match schreib_timeout {
            Some(frist) => match tokio::time::timeout(frist, schreiber.send(frame)).await {
                Ok(ergebnis) => ergebnis,
                Err(_) => {
                    tracing::warn!(verbindung = %id, "Schreib-Frist abgelaufen");
                    return;
                }
            },
            None => schreiber.send(frame).await,
        };

        if let Err(e) = ergebnis {
            tracing::warn!(verbindung = %id, fehler = %e, "Senden fehlgeschlagen");
            return;
        }
    }

    // Queue geschlossen: Schreibseite sauber beenden
    if let Err(e) = schreiber.close().await {
        tracing::debug!(verbindung = %id, fehler = %e, "Schliessen fehlgeschlagen");
    }
    tracing::debug!(verbindung = %id, "Ausgangs-Queue geschlossen");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pogchat_protocol::FrameKind;

    fn adresse() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[test]
    fn zustand_wird_einmal_gebunden() {
        let zustand = VerbindungsZustand::default();
        assert!(!zustand.ist_angemeldet());
        assert!(zustand.fingerprint().is_none());

        let a = Fingerprint::aus_public_key(b"a");
        zustand.anmelden(a.clone());
        zustand.anmelden(Fingerprint::aus_public_key(b"b"));
        assert!(zustand.ist_angemeldet());
        assert_eq!(zustand.fingerprint(), Some(&a));
    }

    #[test]
    fn einreihen_meldet_volle_queue() {
        let (verbindung, _rx) = Verbindung::neu(adresse(), 1);
        verbindung.einreihen(Frame::login_failed("a")).unwrap();
        assert_eq!(
            verbindung.einreihen(Frame::login_failed("b")),
            Err(QueueFehler::Voll)
        );
    }

    #[test]
    fn einreihen_meldet_geschlossene_queue() {
        let (verbindung, rx) = Verbindung::neu(adresse(), 4);
        drop(rx);
        assert_eq!(
            verbindung.einreihen(Frame::login_failed("a")),
            Err(QueueFehler::Geschlossen)
        );
    }

    #[test]
    fn ids_sind_eindeutig() {
        let (a, _ra) = Verbindung::neu(adresse(), 1);
        let (b, _rb) = Verbindung::neu(adresse(), 1);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn sende_schleife_leert_queue_und_schliesst() {
        let (client, server) = tokio::io::duplex(4096);
        let (tx, rx) = mpsc::channel(8);
        let (beendet_tx, beendet_rx) = oneshot::channel();

        tx.send(Frame::login_failed("eins")).await.unwrap();
        tx.send(Frame::login_failed("zwei")).await.unwrap();
        drop(tx);

        sende_schleife(
            ConnectionId::new(),
            rx,
            FramedWrite::new(server, FrameCodec::new()),
            Some(Duration::from_secs(1)),
            beendet_tx,
        )
        .await;

        // Sende-Task beendet -> Signal an den Empfangs-Task
        assert!(beendet_rx.await.is_err());

        let mut leser = FramedRead::new(client, FrameCodec::new());
        let eins = Frame::parse(&leser.next().await.unwrap().unwrap()).unwrap();
        let zwei = Frame::parse(&leser.next().await.unwrap().unwrap()).unwrap();
        assert_eq!(eins.kind, FrameKind::LoginFailed);
        assert_eq!(eins.payload, "eins");
        assert_eq!(zwei.payload, "zwei");
        assert!(leser.next().await.is_none());
    }
}
