//! Connection channel and driver task.
//!
//! A [`RpcChannel`] is a cheaply cloneable handle to one TCP connection. The
//! connection itself is owned by a spawned driver task: callers hand it a
//! request frame plus a oneshot completion slot over an MPSC queue, and the
//! driver pairs each inbound response with its pending slot by `call_id`.
//!
//! This keeps the socket single-owner (no locking around the framed stream)
//! while letting any number of concurrent callers share the connection. A
//! caller that abandons its call (deadline, cancellation) simply drops the
//! receiving half; when the late response eventually arrives, the completion
//! send fails and the driver discards it.
//!
//! When the connection dies, every pending call fails with a transport
//! error and the driver exits. The channel does not reconnect; that is a
//! caller policy.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use herolink_core::frame::{DEFAULT_MAX_FRAME_BYTES, RequestFrame, ResponseFrame, frame_codec};
use herolink_core::{Error, Result};
use prost::Message;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Queue depth between caller handles and the driver task.
const SUBMIT_BUFFER: usize = 64;

struct Call {
    frame: RequestFrame,
    completion: oneshot::Sender<Result<ResponseFrame>>,
}

/// Handle to one driver-owned TCP connection.
///
/// Clones share the underlying connection and its call-id counter. The
/// connection closes when the driver observes a transport error or every
/// handle has been dropped.
#[derive(Clone)]
pub struct RpcChannel {
    submit: mpsc::Sender<Call>,
    next_call_id: Arc<AtomicU64>,
}

impl RpcChannel {
    /// Connects to a dispatcher endpoint with the default frame limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the TCP connect fails.
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with(addr, DEFAULT_MAX_FRAME_BYTES).await
    }

    /// Connects with an explicit per-frame size limit.
    ///
    /// The limit must match the server's configuration; both ends construct
    /// the same codec from it.
    pub async fn connect_with(addr: &str, max_frame_bytes: usize) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let framed = Framed::new(stream, frame_codec(max_frame_bytes));

        let (submit, submissions) = mpsc::channel(SUBMIT_BUFFER);
        tokio::spawn(drive(framed, submissions));

        Ok(Self {
            submit,
            next_call_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Allocates the next call id for this connection.
    pub fn next_call_id(&self) -> u64 {
        self.next_call_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Sends one request frame and suspends until its correlated response
    /// frame arrives.
    ///
    /// This is the lowest-level call surface; typed stubs wrap it with
    /// encoding, schema checks, and deadline handling.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the driver has stopped or the
    /// connection dies before the response arrives.
    pub async fn request(&self, frame: RequestFrame) -> Result<ResponseFrame> {
        let (completion, pending) = oneshot::channel();
        self.submit
            .send(Call { frame, completion })
            .await
            .map_err(|_| Error::Transport {
                context: "connection driver stopped".to_string(),
            })?;

        pending.await.map_err(|_| Error::Transport {
            context: "connection closed before the response arrived".to_string(),
        })?
    }
}

/// Owns the framed connection: writes submitted frames, reads response
/// frames, and completes pending calls by `call_id`.
async fn drive(
    mut framed: Framed<TcpStream, LengthDelimitedCodec>,
    mut submissions: mpsc::Receiver<Call>,
) {
    let mut pending: HashMap<u64, oneshot::Sender<Result<ResponseFrame>>> = HashMap::new();

    loop {
        tokio::select! {
            submission = submissions.recv() => {
                let Some(Call { frame, completion }) = submission else {
                    // Every channel handle is gone; nothing can await the
                    // remaining responses.
                    break;
                };
                let call_id = frame.call_id;
                if let Err(err) = framed.send(Bytes::from(frame.encode_to_vec())).await {
                    let context = err.to_string();
                    let _ = completion.send(Err(Error::Transport { context: context.clone() }));
                    fail_pending(&mut pending, &context);
                    return;
                }
                pending.insert(call_id, completion);
            }
            inbound = framed.next() => {
                match inbound {
                    Some(Ok(bytes)) => match ResponseFrame::decode(bytes.freeze()) {
                        Ok(response) => {
                            if let Some(completion) = pending.remove(&response.call_id) {
                                // A failed send means the caller gave up
                                // (deadline elapsed); drop the late response.
                                let _ = completion.send(Ok(response));
                            } else {
                                tracing::debug!(call_id = response.call_id, "response for abandoned call");
                            }
                        }
                        Err(err) => {
                            // An undecodable frame means the stream framing
                            // can no longer be trusted.
                            fail_pending(&mut pending, &format!("undecodable response frame: {err}"));
                            return;
                        }
                    },
                    Some(Err(err)) => {
                        fail_pending(&mut pending, &err.to_string());
                        return;
                    }
                    None => {
                        fail_pending(&mut pending, "connection closed by peer");
                        return;
                    }
                }
            }
        }
    }

    fail_pending(&mut pending, "connection driver stopped");
}

fn fail_pending(
    pending: &mut HashMap<u64, oneshot::Sender<Result<ResponseFrame>>>,
    context: &str,
) {
    if !pending.is_empty() {
        tracing::debug!(calls = pending.len(), context, "failing pending calls");
    }
    for (_, completion) in pending.drain() {
        let _ = completion.send(Err(Error::Transport {
            context: context.to_string(),
        }));
    }
}
