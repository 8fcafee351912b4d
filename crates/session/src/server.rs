//! LiveServer - accepts connections and runs one live session per peer

use std::net::SocketAddr;
use std::sync::Arc;

use contracts::{AppearanceSink, StreamSchema};
use serde::Serialize;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, instrument, warn, Instrument};

use crate::error::{Result, SessionError};
use crate::live::{LiveSession, LiveSessionConfig};
use crate::state::{CloseReason, SessionSummary};

/// Totals over every session a server ran
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerSummary {
    pub connections: u64,
    /// Sessions that ended with `QUIT`
    pub clean_disconnects: u64,
    pub readings_accepted: u64,
    pub readings_rejected: u64,
    pub records_emitted: u64,
    pub records_failed: u64,
}

impl ServerSummary {
    fn absorb(&mut self, session: &SessionSummary) {
        if session.close_reason == CloseReason::Quit {
            self.clean_disconnects += 1;
        }
        self.readings_accepted += session.readings_accepted;
        self.readings_rejected += session.readings_rejected;
        self.records_emitted += session.records_emitted;
        self.records_failed += session.records_failed;
    }
}

/// TCP front end for live ingestion
///
/// Every connection gets its own table, condenser and record sequence; only
/// the sink is shared.
pub struct LiveServer<S> {
    listener: TcpListener,
    schema: StreamSchema,
    config: LiveSessionConfig,
    sink: Arc<Mutex<S>>,
}

impl<S: AppearanceSink + 'static> LiveServer<S> {
    /// Bind the listening socket
    ///
    /// # Errors
    /// `Bind` if the address cannot be bound.
    pub async fn bind(
        addr: &str,
        schema: StreamSchema,
        config: LiveSessionConfig,
        sink: Arc<Mutex<S>>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| SessionError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self {
            listener,
            schema,
            config,
            sink,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` fires
    ///
    /// On shutdown every open session is drained, then the sink is closed.
    #[instrument(name = "live_server", skip_all, fields(addr = ?self.listener.local_addr().ok()))]
    pub async fn run(self, shutdown: CancellationToken) -> Result<ServerSummary> {
        info!(stream = %self.schema.stream(), "accepting connections");
        let mut sessions = JoinSet::new();
        let mut summary = ServerSummary::default();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    collect(joined, &mut summary);
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        summary.connections += 1;
                        sessions.spawn(self.serve(stream, peer, shutdown.child_token()));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }

        info!(open = sessions.len(), "shutting down, draining sessions");
        while let Some(joined) = sessions.join_next().await {
            collect(joined, &mut summary);
        }

        if let Err(e) = self.sink.lock().await.close().await {
            error!(error = %e, "sink close failed");
        }
        info!(
            connections = summary.connections,
            records = summary.records_emitted,
            "server stopped"
        );
        Ok(summary)
    }

    fn serve(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        shutdown: CancellationToken,
    ) -> impl std::future::Future<Output = Result<SessionSummary>> + Send + 'static {
        let session = LiveSession::new(self.schema.clone(), self.config.clone(), self.sink.clone());
        let span = info_span!("connection", peer = %peer);
        async move {
            info!("client connected");
            observability::record_session_open(true);
            let result = session.run(BufReader::new(stream), shutdown).await;
            observability::record_session_open(false);
            result
        }
        .instrument(span)
    }
}

fn collect(
    joined: std::result::Result<Result<SessionSummary>, tokio::task::JoinError>,
    summary: &mut ServerSummary,
) {
    match joined {
        Ok(Ok(session)) => summary.absorb(&session),
        Ok(Err(e)) => error!(error = %e, "session failed"),
        Err(e) => error!(error = %e, "session task panicked"),
    }
}
