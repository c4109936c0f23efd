//! Relay server: accept loop and session supervision.
//!
//! # Responsibilities
//! - Own the bounded listener
//! - Spawn one session task per client connection
//! - On shutdown, stop accepting and wait (bounded) for sessions to drain

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use crate::auth::AuthScheme;
use crate::config::RelayConfig;
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::observability::spans;
use crate::relay::Session;

/// Pause after a failed accept so persistent errors (fd exhaustion) do not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

pub struct ProxyServer {
    listener: Listener,
    config: Arc<RelayConfig>,
    scheme: Arc<AuthScheme>,
    tracker: ConnectionTracker,
}

impl ProxyServer {
    /// Bind the listener described by `config`. The configuration is assumed validated.
    pub async fn bind(config: RelayConfig) -> Result<Self, ListenerError> {
        let listener = Listener::bind(&config.listener).await?;
        let scheme = AuthScheme::from_config(&config.auth, &config.origin);
        Ok(Self {
            listener,
            config: Arc::new(config),
            scheme: Arc::new(scheme),
            tracker: ConnectionTracker::new(),
        })
    }

    /// Address the relay actually listens on (resolves an ephemeral port).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), ListenerError> {
        let ProxyServer {
            listener,
            config,
            scheme,
            tracker,
        } = self;
        let mut stop = shutdown.subscribe();

        tracing::info!(
            address = %listener.local_addr().map_err(ListenerError::Bind)?,
            scheme = %scheme.kind(),
            origin = config.origin.address.as_deref().unwrap_or("<per request>"),
            "Relay accepting connections"
        );

        loop {
            let accepted = tokio::select! {
                _ = stop.recv() => break,
                accepted = listener.accept() => accepted,
            };
            let (stream, peer, permit) = match accepted {
                Ok(accepted) => accepted,
                Err(ListenerError::Closed) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(error = %e, "Could not set TCP_NODELAY");
            }

            let guard = tracker.track();
            let id = guard.id();
            let session = Session::new(stream, Arc::clone(&config), Arc::clone(&scheme));
            let session_shutdown = shutdown.subscribe();

            tokio::spawn(
                async move {
                    let _permit = permit;
                    let _guard = guard;
                    tracing::debug!("Session started");
                    match session.run(session_shutdown).await {
                        Ok(()) => tracing::debug!("Session finished"),
                        Err(e) if e.is_timeout() => tracing::warn!(error = %e, "Session aborted: origin timed out"),
                        Err(e) => tracing::warn!(error = %e, "Session ended with error"),
                    }
                }
                .instrument(spans::connection_span(id, peer)),
            );
        }

        drop(listener);
        let grace = Duration::from_secs(config.timeouts.shutdown_grace_secs);
        tracing::info!(
            active_connections = tracker.active_count(),
            grace_secs = grace.as_secs(),
            "Stopped accepting; draining connections"
        );
        if !tracker.wait_idle(grace).await {
            tracing::warn!(
                active_connections = tracker.active_count(),
                "Grace period elapsed with connections still open"
            );
        }
        Ok(())
    }
}
