//! Listener lifecycle and per-call dispatch.
//!
//! The [`Dispatcher`] owns the long-lived listening loop: bind once, accept
//! connections, and for each call frame resolve (service, method) against
//! the route table, decode, invoke the matching handler, and write the
//! response frame. Listening is the steady state; call handling is
//! re-entrant and never changes the dispatcher's top-level lifecycle
//! (unstarted, listening, shutting down, stopped).
//!
//! ## Concurrency
//!
//! Each accepted connection runs on its own task. Within a connection, each
//! call is dispatched on its own task and responses are funneled through a
//! per-connection writer channel, so a slow handler never blocks other calls
//! and responses are correlated by call id, not order.
//!
//! ## Failure semantics
//!
//! Unroutable frames, undecodable payloads, and handler failures all become
//! response-carried errors for that call only. A transport-level disconnect
//! aborts that connection's calls; the listener keeps serving. If a frame
//! carries a deadline, handler execution is capped by it and an expired call
//! produces no response (the caller has already timed out) while releasing
//! everything it held.

use crate::server::config::ServerConfig;
use crate::server::registry::RouteTable;
use bytes::Bytes;
use core::future::Future;
use core::time::Duration;
use futures::{SinkExt, StreamExt};
use herolink_core::frame::{RequestFrame, ResponseFrame, frame_codec};
use herolink_core::{Error, Result};
use prost::Message;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

/// Queue depth of the per-connection response writer.
const RESPONSE_BUFFER: usize = 64;

/// Counts in-flight calls so shutdown can drain them.
#[derive(Clone, Default)]
struct CallTracker {
    inflight: Arc<AtomicUsize>,
}

impl CallTracker {
    fn start(&self) -> CallGuard {
        self.inflight.fetch_add(1, Ordering::Relaxed);
        CallGuard {
            inflight: Arc::clone(&self.inflight),
        }
    }

    fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Relaxed)
    }
}

struct CallGuard {
    inflight: Arc<AtomicUsize>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.inflight.fetch_sub(1, Ordering::Relaxed);
    }
}

/// The server's listening and routing component.
///
/// Constructed with its configuration and a fully built [`RouteTable`];
/// nothing is resolved implicitly at runtime. Clones share the same routes,
/// shutdown token, and in-flight accounting.
#[derive(Clone)]
pub struct Dispatcher {
    config: ServerConfig,
    routes: Arc<RouteTable>,
    shutdown_token: CancellationToken,
    tracker: CallTracker,
}

impl Dispatcher {
    pub fn new(config: ServerConfig, routes: RouteTable) -> Self {
        Self {
            config,
            routes: Arc::new(routes),
            shutdown_token: CancellationToken::new(),
            tracker: CallTracker::default(),
        }
    }

    /// Binds the configured endpoint.
    ///
    /// Binding is the only externally observable side effect of startup; the
    /// returned listener carries the resolved local address (relevant when
    /// binding port 0).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the bind fails.
    pub async fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind(self.config.addr).await?)
    }

    /// Serves until [`Dispatcher::shutdown`] is invoked from elsewhere.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        self.serve_with_shutdown(listener, std::future::pending())
            .await
    }

    /// Serves until `signal` resolves, then shuts down gracefully.
    pub async fn serve_with_shutdown(
        &self,
        listener: TcpListener,
        signal: impl Future<Output = ()>,
    ) -> Result<()> {
        tokio::pin!(signal);
        loop {
            tokio::select! {
                () = &mut signal => {
                    self.shutdown().await;
                    break;
                }
                () = self.shutdown_token.cancelled() => {
                    // Someone else is running the drain.
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            tracing::debug!(%peer, "accepted connection");
                            tokio::spawn(handle_connection(
                                stream,
                                peer,
                                Arc::clone(&self.routes),
                                self.tracker.clone(),
                                self.shutdown_token.clone(),
                                self.config.max_frame_bytes,
                            ));
                        }
                        Err(err) => tracing::warn!("accept failed: {err}"),
                    }
                }
            }
        }

        tracing::info!("Dispatcher stopped");
        Ok(())
    }

    /// Initiates a graceful shutdown: stop routing new calls, then wait up
    /// to the configured grace period for in-flight calls to drain.
    ///
    /// Connections accepted before the drain keep their reader alive, so a
    /// frame arriving on one is answered with a [`Error::ServiceShutdown`]
    /// response. Connections never accepted get a transport-level reset
    /// instead; only established peers see the typed refusal.
    pub async fn shutdown(&self) {
        tracing::info!("Refusing new calls");
        self.shutdown_token.cancel();

        tracing::info!(
            inflight = self.tracker.inflight(),
            "Draining in-flight calls"
        );
        let drained = timeout(self.config.shutdown_grace, async {
            while self.tracker.inflight() > 0 {
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => tracing::debug!("All in-flight calls drained"),
            Err(_) => tracing::warn!(
                inflight = self.tracker.inflight(),
                "Graceful drain timed out"
            ),
        }
    }
}

/// Reads call frames off one connection and dispatches each on its own task.
///
/// Responses flow back through a bounded writer channel owned by a writer
/// task, keeping the sink single-owner while calls complete out of order.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    routes: Arc<RouteTable>,
    tracker: CallTracker,
    shutdown_token: CancellationToken,
    max_frame_bytes: usize,
) {
    let framed = Framed::new(stream, frame_codec(max_frame_bytes));
    let (mut sink, mut frames) = framed.split();

    let (resp_tx, mut resp_rx) = mpsc::channel::<ResponseFrame>(RESPONSE_BUFFER);
    let writer = tokio::spawn(async move {
        while let Some(frame) = resp_rx.recv().await {
            if sink.send(Bytes::from(frame.encode_to_vec())).await.is_err() {
                break;
            }
        }
    });

    while let Some(inbound) = frames.next().await {
        match inbound {
            Ok(bytes) => {
                let frame = match RequestFrame::decode(bytes.freeze()) {
                    Ok(frame) => frame,
                    Err(err) => {
                        // Without a decodable envelope there is no call id to
                        // correlate an error response with; the framing can
                        // no longer be trusted, so drop the connection.
                        tracing::warn!(%peer, "undecodable request frame: {err}");
                        break;
                    }
                };

                if shutdown_token.is_cancelled() {
                    let _ = resp_tx
                        .send(ResponseFrame::failure(frame.call_id, &Error::ServiceShutdown))
                        .await;
                    continue;
                }

                dispatch_call(frame, &routes, &tracker, resp_tx.clone());
            }
            Err(err) => {
                tracing::debug!(%peer, "connection error: {err}");
                break;
            }
        }
    }

    // Reader is done; closing the writer channel lets in-flight responses
    // flush before the writer exits.
    drop(resp_tx);
    let _ = writer.await;
    tracing::debug!(%peer, "connection closed");
}

/// Routes one call frame and runs its handler on a dedicated task.
fn dispatch_call(
    frame: RequestFrame,
    routes: &Arc<RouteTable>,
    tracker: &CallTracker,
    resp_tx: mpsc::Sender<ResponseFrame>,
) {
    let call_id = frame.call_id;

    let Some(handler) = routes.lookup(&frame.service, &frame.method) else {
        let err = Error::MethodNotFound {
            route: format!("{}/{}", frame.service, frame.method),
        };
        tracing::debug!(call_id, "{err}");
        tokio::spawn(async move {
            let _ = resp_tx.send(ResponseFrame::failure(call_id, &err)).await;
        });
        return;
    };

    let guard = tracker.start();
    let deadline = (frame.deadline_ms > 0).then(|| Duration::from_millis(frame.deadline_ms));
    let payload = frame.payload;

    tokio::spawn(async move {
        let _guard = guard;

        let outcome = match deadline {
            Some(budget) => match timeout(budget, handler.handle(payload)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    // The caller timed out already; a response would go
                    // unread. Release the call and move on.
                    tracing::debug!(call_id, handler = handler.name(), "call exceeded its deadline");
                    return;
                }
            },
            None => handler.handle(payload).await,
        };

        let response = match outcome {
            Ok(payload) => ResponseFrame::success(call_id, payload),
            Err(err) => {
                tracing::debug!(call_id, handler = handler.name(), "call failed: {err}");
                ResponseFrame::failure(call_id, &err)
            }
        };

        let _ = resp_tx.send(response).await;
    });
}
