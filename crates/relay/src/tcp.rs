//! TCP-Listener - Bindet Socket, akzeptiert Verbindungen
//!
//! Der `RelayServer` startet den Router-Task und fuer jede eingehende
//! Verbindung einen eigenen tokio-Task. Ein Semaphor begrenzt die Anzahl
//! gleichzeitiger Verbindungen; ueberzaehlige werden sofort geschlossen.

use pogchat_crypto::Signer;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::{watch, Semaphore};

use crate::config::RelayConfig;
use crate::connection::verbindung_bedienen;
use crate::error::{RegistrationError, RelayResult};
use crate::router::{Router, RouterHandle};

/// TCP-Relay-Server
pub struct RelayServer {
    listener: TcpListener,
    config: Arc<RelayConfig>,
    router: Router,
    handle: RouterHandle,
}

impl RelayServer {
    /// Validiert die Konfiguration und bindet den Socket
    pub async fn binden(
        addr: impl ToSocketAddrs,
        config: RelayConfig,
        signer: Arc<dyn Signer>,
    ) -> RelayResult<Self> {
        config.validieren()?;
        let listener = TcpListener::bind(addr).await?;
        let (router, handle) = Router::neu(signer, &config);
        Ok(Self {
            listener,
            config: Arc::new(config),
            router,
            handle,
        })
    }

    /// Tatsaechlich gebundene Adresse (z.B. bei Port 0)
    pub fn lokale_adresse(&self) -> RelayResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle auf den Router (fuer Momentaufnahmen)
    pub fn router_handle(&self) -> RouterHandle {
        self.handle.clone()
    }

    /// Startet Router und Accept-Loop
    ///
    /// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt.
    pub async fn starten(self, mut shutdown_rx: watch::Receiver<bool>) -> RelayResult<()> {
        let Self {
            listener,
            config,
            router,
            handle,
        } = self;

        let lokale_addr = listener.local_addr()?;
        let router_task = tokio::spawn(router.laufen(shutdown_rx.clone()));
        let limit = Arc::new(Semaphore::new(config.max_verbindungen));

        tracing::info!(
            adresse = %lokale_addr,
            max_verbindungen = config.max_verbindungen,
            protokoll = pogchat_protocol::PROTOKOLL_VERSION,
            "Relay-Server gestartet"
        );

        if !*shutdown_rx.borrow() {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer_addr)) => {
                                let Ok(erlaubnis) = Arc::clone(&limit).try_acquire_owned() else {
                                    tracing::warn!(
                                        peer = %peer_addr,
                                        fehler = %RegistrationError::ServerVoll,
                                        "Verbindung abgelehnt"
                                    );
                                    drop(stream);
                                    continue;
                                };

                                if let Err(e) = stream.set_nodelay(true) {
                                    tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
                                }

                                let router = handle.clone();
                                let config = Arc::clone(&config);
                                let shutdown = shutdown_rx.clone();
                                tokio::spawn(async move {
                                    verbindung_bedienen(stream, peer_addr, router, config, shutdown).await;
                                    drop(erlaubnis);
                                });
                            }
                            Err(e) => {
                                tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                            }
                        }
                    }

                    Ok(()) = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Relay-Server: Shutdown-Signal empfangen");
                            break;
                        }
                    }
                }
            }
        }

        drop(listener);
        drop(handle);
        if let Err(e) = router_task.await {
            tracing::error!(fehler = %e, "Router-Task abgebrochen");
        }

        tracing::info!("Relay-Server gestoppt");
        Ok(())
    }
}
