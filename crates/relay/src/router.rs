//! Router / Connection-Manager
//!
//! Einziger Besitzer von Warteliste und Routing-Tabelle. Alle Aenderungen
//! laufen nacheinander durch einen Task (`Router::laufen`), es gibt keine
//! Locks. Die Verbindungs-Tasks schicken `RouterEreignis`se ueber eine
//! begrenzte Mailbox.
//!
//! Der Router wartet nie auf eine einzelne Verbindung: Zustellungen werden
//! mit `try_send` eingereiht, ein Empfaenger mit voller Queue wird getrennt.

use pogchat_core::{AuthError, ConnectionId, Fingerprint};
use pogchat_crypto::Signer;
use pogchat_protocol::{Frame, FrameKind, ProtocolError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::RelayConfig;
use crate::connection::{QueueFehler, Verbindung};
use crate::error::{RegistrationError, RelayError, RelayResult, RoutingError};

// ---------------------------------------------------------------------------
// Ereignisse
// ---------------------------------------------------------------------------

/// Ereignis an den Router
#[derive(Debug)]
pub enum RouterEreignis {
    /// Neue Verbindung in die Warteliste aufnehmen
    Registrieren {
        verbindung: Verbindung,
        antwort: oneshot::Sender<Result<(), RegistrationError>>,
    },
    /// Verbindung entfernen (idempotent)
    Abmelden { id: ConnectionId },
    /// Empfangener Frame (oder dessen Parse-Fehler)
    Eingang {
        id: ConnectionId,
        frame: Result<Frame, ProtocolError>,
    },
    /// Aktuelle Belegung abfragen
    Momentaufnahme {
        antwort: oneshot::Sender<RouterStatistik>,
    },
}

/// Belegung von Warteliste und Routing-Tabelle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterStatistik {
    /// Verbindungen ohne Login
    pub wartend: usize,
    /// Angemeldete Identitaeten (sortiert)
    pub angemeldet: Vec<Fingerprint>,
}

/// Ergebnis der Verarbeitung eines eingehenden Frames
#[derive(Debug)]
pub enum Ergebnis {
    /// Login akzeptiert, Verbindung ist unter dem Fingerprint erreichbar
    Angemeldet(Fingerprint),
    /// Umschlag in die Queue des Empfaengers eingereiht
    Zugestellt { an: Fingerprint },
    /// Frame verworfen, Verbindung bleibt bestehen
    Verworfen(RelayError),
    /// Frame abgelehnt und Verbindung abgebaut
    Getrennt(RelayError),
    /// Verbindung ist (nicht mehr) bekannt
    Ignoriert,
}

// ---------------------------------------------------------------------------
// ConnectionManager
// ---------------------------------------------------------------------------

/// Routing-Zustand mit synchroner Zustandsmaschine
///
/// Jede Verbindung ist entweder in `wartend` oder in `routing`, nie in
/// beiden. Wird eine `Verbindung` entfernt, faellt ihr Queue-Sender weg
/// und der Sende-Task beendet sich.
pub struct ConnectionManager {
    signer: Arc<dyn Signer>,
    login_antworten: bool,
    wartend: HashMap<ConnectionId, Verbindung>,
    routing: HashMap<Fingerprint, Verbindung>,
    gebunden: HashMap<ConnectionId, Fingerprint>,
}

impl ConnectionManager {
    pub fn neu(signer: Arc<dyn Signer>, login_antworten: bool) -> Self {
        Self {
            signer,
            login_antworten,
            wartend: HashMap::new(),
            routing: HashMap::new(),
            gebunden: HashMap::new(),
        }
    }

    /// Nimmt eine Verbindung in die Warteliste auf
    pub fn registrieren(&mut self, verbindung: Verbindung) -> Result<(), RegistrationError> {
        let id = verbindung.id;
        if self.wartend.contains_key(&id) || self.gebunden.contains_key(&id) {
            return Err(RegistrationError::BereitsRegistriert(id));
        }
        tracing::trace!(verbindung = %id, "Verbindung registriert");
        self.wartend.insert(id, verbindung);
        Ok(())
    }

    /// Entfernt eine Verbindung und schliesst ihre Queue
    ///
    /// Gibt `false` zurueck, wenn die Verbindung nicht (mehr) bekannt war.
    pub fn abmelden(&mut self, id: ConnectionId) -> bool {
        if self.wartend.remove(&id).is_some() {
            tracing::debug!(verbindung = %id, "Wartende Verbindung entfernt");
            return true;
        }
        if let Some(fingerprint) = self.gebunden.remove(&id) {
            self.routing.remove(&fingerprint);
            tracing::debug!(verbindung = %id, fingerprint = %fingerprint.kurz(), "Angemeldete Verbindung entfernt");
            return true;
        }
        false
    }

    /// Verarbeitet einen eingehenden Frame
    pub fn eingang(&mut self, id: ConnectionId, frame: Result<Frame, ProtocolError>) -> Ergebnis {
        if let Some(verbindung) = self.wartend.remove(&id) {
            return self.login(verbindung, frame);
        }
        match self.gebunden.get(&id).cloned() {
            Some(fingerprint) => self.angemeldet_eingang(fingerprint, frame),
            None => Ergebnis::Ignoriert,
        }
    }

    pub fn statistik(&self) -> RouterStatistik {
        let mut angemeldet: Vec<Fingerprint> = self.routing.keys().cloned().collect();
        angemeldet.sort();
        RouterStatistik {
            wartend: self.wartend.len(),
            angemeldet,
        }
    }

    /// Entfernt alle Verbindungen (Shutdown)
    pub fn alle_trennen(&mut self) {
        self.wartend.clear();
        self.routing.clear();
        self.gebunden.clear();
    }

    // -----------------------------------------------------------------------
    // Login
    // -----------------------------------------------------------------------

    /// Einziger Login-Versuch einer wartenden Verbindung
    fn login(&mut self, verbindung: Verbindung, frame: Result<Frame, ProtocolError>) -> Ergebnis {
        let envelope = match frame.and_then(|frame| frame.envelope_als(FrameKind::LoginMsg)) {
            Ok(envelope) => envelope,
            // Erster Frame ist kein Login
            Err(ProtocolError::FalscherTyp { .. }) => {
                return self.login_ablehnen(verbindung, AuthError::NichtAngemeldet.into())
            }
            Err(e) => return self.login_ablehnen(verbindung, e.into()),
        };
        if let Err(e) = envelope.verify(self.signer.as_ref()) {
            return self.login_ablehnen(verbindung, e.into());
        }

        let fingerprint = envelope.sender_fingerprint();
        if self.routing.contains_key(&fingerprint) {
            return self.login_ablehnen(
                verbindung,
                RoutingError::DoppelteIdentitaet(fingerprint).into(),
            );
        }

        verbindung.zustand().anmelden(fingerprint.clone());
        if self.login_antworten {
            // Frische Queue, kann nicht voll sein
            let _ = verbindung.einreihen(Frame::login_ok(&fingerprint));
        }

        tracing::info!(
            peer = %verbindung.peer_addr,
            verbindung = %verbindung.id,
            fingerprint = %fingerprint.kurz(),
            "Login erfolgreich"
        );

        self.gebunden.insert(verbindung.id, fingerprint.clone());
        self.routing.insert(fingerprint.clone(), verbindung);
        Ergebnis::Angemeldet(fingerprint)
    }

    fn login_ablehnen(&mut self, verbindung: Verbindung, grund: RelayError) -> Ergebnis {
        tracing::warn!(
            peer = %verbindung.peer_addr,
            verbindung = %verbindung.id,
            fehler = %grund,
            "Login abgelehnt - Verbindung wird getrennt"
        );
        if self.login_antworten {
            let _ = verbindung.einreihen(Frame::login_failed(grund.to_string()));
        }
        // `verbindung` faellt hier weg: Queue zu, Sende-Task endet
        Ergebnis::Getrennt(grund)
    }

    // -----------------------------------------------------------------------
    // Weiterleitung
    // -----------------------------------------------------------------------

    fn angemeldet_eingang(
        &mut self,
        absender: Fingerprint,
        frame: Result<Frame, ProtocolError>,
    ) -> Ergebnis {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(fingerprint = %absender.kurz(), fehler = %e, "Ungueltiger Frame verworfen");
                return Ergebnis::Verworfen(e.into());
            }
        };

        match frame.kind {
            FrameKind::LoginMsg => {
                tracing::debug!(fingerprint = %absender.kurz(), "Erneuter Login verworfen");
                Ergebnis::Verworfen(AuthError::BereitsAngemeldet.into())
            }
            art if art.ist_server_antwort() => {
                tracing::debug!(fingerprint = %absender.kurz(), art = ?frame.kind, "Server-Frame vom Client verworfen");
                Ergebnis::Verworfen(
                    ProtocolError::FalscherTyp {
                        erwartet: FrameKind::PeerMsg,
                        erhalten: art,
                    }
                    .into(),
                )
            }
            _ => self.weiterleiten(absender, frame),
        }
    }

    fn weiterleiten(&mut self, absender: Fingerprint, frame: Frame) -> Ergebnis {
        let envelope = match frame.envelope_als(FrameKind::PeerMsg) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(fingerprint = %absender.kurz(), fehler = %e, "Ungueltiger Umschlag verworfen");
                return Ergebnis::Verworfen(e.into());
            }
        };

        if let Err(e) = envelope.verify(self.signer.as_ref()) {
            tracing::warn!(fingerprint = %absender.kurz(), fehler = %e, "Signatur ungueltig - Nachricht verworfen");
            return Ergebnis::Verworfen(e.into());
        }

        let behauptet = envelope.sender_fingerprint();
        if behauptet != absender {
            tracing::warn!(
                gebunden = %absender.kurz(),
                behauptet = %behauptet.kurz(),
                "Absender weicht von der angemeldeten Identitaet ab"
            );
            return Ergebnis::Verworfen(
                AuthError::IdentitaetAbweichend {
                    gebunden: absender,
                    behauptet,
                }
                .into(),
            );
        }

        let ziel = envelope.recipient_fingerprint();
        let Some(empfaenger) = self.routing.get(&ziel) else {
            tracing::debug!(von = %absender.kurz(), an = %ziel.kurz(), "Empfaenger offline - Nachricht verworfen");
            return Ergebnis::Verworfen(RoutingError::EmpfaengerOffline(ziel).into());
        };

        // Payload unveraendert weiterreichen
        match empfaenger.einreihen(Frame::neu(FrameKind::PeerMsg, frame.payload)) {
            Ok(()) => {
                tracing::trace!(von = %absender.kurz(), an = %ziel.kurz(), "Nachricht zugestellt");
                Ergebnis::Zugestellt { an: ziel }
            }
            Err(QueueFehler::Voll) => {
                tracing::warn!(fingerprint = %ziel.kurz(), "Ausgangs-Queue voll - Empfaenger wird getrennt");
                self.fingerprint_entfernen(&ziel);
                Ergebnis::Verworfen(RoutingError::EmpfaengerUeberlastet(ziel).into())
            }
            Err(QueueFehler::Geschlossen) => {
                tracing::debug!(fingerprint = %ziel.kurz(), "Ausgangs-Queue bereits geschlossen");
                self.fingerprint_entfernen(&ziel);
                Ergebnis::Verworfen(RoutingError::EmpfaengerOffline(ziel).into())
            }
        }
    }

    fn fingerprint_entfernen(&mut self, fingerprint: &Fingerprint) {
        if let Some(verbindung) = self.routing.remove(fingerprint) {
            self.gebunden.remove(&verbindung.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Router-Actor
// ---------------------------------------------------------------------------

/// Task, der den `ConnectionManager` besitzt
pub struct Router {
    manager: ConnectionManager,
    mailbox: mpsc::Receiver<RouterEreignis>,
}

impl Router {
    /// Erstellt Router und zugehoeriges Handle
    pub fn neu(signer: Arc<dyn Signer>, config: &RelayConfig) -> (Self, RouterHandle) {
        let (tx, mailbox) = mpsc::channel(config.router_queue);
        let router = Self {
            manager: ConnectionManager::neu(signer, config.login_antworten),
            mailbox,
        };
        (router, RouterHandle { tx })
    }

    /// Ereignisschleife
    ///
    /// Laeuft bis zum Shutdown-Signal oder bis alle Handles weg sind.
    /// Danach werden alle Verbindungen getrennt.
    pub async fn laufen(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::debug!("Router gestartet");

        if !*shutdown_rx.borrow() {
            loop {
                tokio::select! {
                    ereignis = self.mailbox.recv() => {
                        match ereignis {
                            Some(ereignis) => self.verarbeiten(ereignis),
                            None => break,
                        }
                    }

                    Ok(()) = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        }

        let statistik = self.manager.statistik();
        tracing::info!(
            wartend = statistik.wartend,
            angemeldet = statistik.angemeldet.len(),
            "Router gestoppt - alle Verbindungen werden getrennt"
        );
        self.manager.alle_trennen();
    }

    fn verarbeiten(&mut self, ereignis: RouterEreignis) {
        match ereignis {
            RouterEreignis::Registrieren {
                verbindung,
                antwort,
            } => {
                let _ = antwort.send(self.manager.registrieren(verbindung));
            }
            RouterEreignis::Abmelden { id } => {
                self.manager.abmelden(id);
            }
            RouterEreignis::Eingang { id, frame } => {
                let ergebnis = self.manager.eingang(id, frame);
                tracing::trace!(verbindung = %id, ergebnis = ?ergebnis, "Frame verarbeitet");
            }
            RouterEreignis::Momentaufnahme { antwort } => {
                let _ = antwort.send(self.manager.statistik());
            }
        }
    }
}

/// Handle auf den Router (Clone teilt die Mailbox)
#[derive(Debug, Clone)]
pub struct RouterHandle {
    tx: mpsc::Sender<RouterEreignis>,
}

impl RouterHandle {
    /// Registriert eine neue Verbindung
    pub async fn registrieren(&self, verbindung: Verbindung) -> RelayResult<()> {
        let (antwort, antwort_rx) = oneshot::channel();
        self.senden(RouterEreignis::Registrieren {
            verbindung,
            antwort,
        })
        .await?;
        antwort_rx.await.map_err(|_| RelayError::RouterGestoppt)??;
        Ok(())
    }

    /// Meldet eine Verbindung ab; nach dem Shutdown ein No-op
    pub async fn abmelden(&self, id: ConnectionId) {
        let _ = self.senden(RouterEreignis::Abmelden { id }).await;
    }

    /// Reicht einen empfangenen Frame weiter
    pub async fn eingang(
        &self,
        id: ConnectionId,
        frame: Result<Frame, ProtocolError>,
    ) -> RelayResult<()> {
        self.senden(RouterEreignis::Eingang { id, frame }).await
    }

    /// Aktuelle Belegung von Warteliste und Routing-Tabelle
    pub async fn momentaufnahme(&self) -> RelayResult<RouterStatistik> {
        let (antwort, antwort_rx) = oneshot::channel();
        self.senden(RouterEreignis::Momentaufnahme { antwort })
            .await?;
        antwort_rx.await.map_err(|_| RelayError::RouterGestoppt)
    }

    async fn senden(&self, ereignis: RouterEreignis) -> RelayResult<()> {
        self.tx
            .send(ereignis)
            .await
            .map_err(|_| RelayError::RouterGestoppt)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
