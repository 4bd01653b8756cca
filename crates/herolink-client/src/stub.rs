//! Typed call stubs resolved against the schema descriptor.
//!
//! [`ClientStub`] is the resolution surface: `service(name)` checks the
//! schema and yields a [`ServiceStub`] bound to exactly one service
//! descriptor and one channel. The stub's lifetime is independent of any
//! single call and it may be reused for many.
//!
//! [`HeroServiceStub`] is the typed proxy for the one declared service, and
//! [`HeroClient`] layers the resolve-once step on top: the stub is resolved
//! lazily on first use, cached for the life of the client, and torn down by
//! dropping it.

use crate::channel::RpcChannel;
use bytes::Bytes;
use core::time::Duration;
use herolink_core::frame::RequestFrame;
use herolink_core::schema::{FIND_ONE, HERO_SERVICE, SchemaDescriptor, ServiceDescriptor};
use herolink_core::types::{Hero, HeroById, ShapedMessage};
use herolink_core::{Error, Result};
use tokio::sync::OnceCell;

/// Default per-call time budget when the caller sets none.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Resolves service stubs against a loaded schema.
pub struct ClientStub {
    channel: RpcChannel,
    schema: SchemaDescriptor,
}

impl ClientStub {
    pub fn new(channel: RpcChannel, schema: SchemaDescriptor) -> Self {
        Self { channel, schema }
    }

    /// Resolves a service by name and returns a stub bound to its
    /// descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownService`] if the loaded schema does not
    /// define the name.
    pub fn service(&self, name: &str) -> Result<ServiceStub> {
        let descriptor = self
            .schema
            .resolve_service(name)
            .map_err(|_| Error::UnknownService {
                name: name.to_string(),
            })?
            .clone();

        Ok(ServiceStub {
            channel: self.channel.clone(),
            descriptor,
        })
    }
}

/// A resolved handle for one service: marshal, send, await, unmarshal.
pub struct ServiceStub {
    channel: RpcChannel,
    descriptor: ServiceDescriptor,
}

impl ServiceStub {
    pub fn name(&self) -> &str {
        self.descriptor.name
    }

    /// Performs one remote call.
    ///
    /// The method is checked against the bound descriptor before any I/O:
    /// invoking an undeclared method is a contract violation and fails with
    /// [`Error::MethodNotFound`] without touching the wire, as does a typed
    /// request or response that does not match the declared shapes.
    ///
    /// The call suspends until the correlated response arrives or `deadline`
    /// elapses. Server-carried errors propagate unchanged; no retries.
    pub async fn call<Req, Res>(&self, method: &str, request: &Req, deadline: Duration) -> Result<Res>
    where
        Req: ShapedMessage,
        Res: ShapedMessage,
    {
        let descriptor = self.descriptor.method(method).ok_or_else(|| Error::MethodNotFound {
            route: format!("{}/{}", self.descriptor.name, method),
        })?;

        if descriptor.request_shape != Req::SHAPE || descriptor.response_shape != Res::SHAPE {
            return Err(Error::MalformedRequest {
                reason: format!(
                    "call shapes do not match the declared {:?} -> {:?}",
                    descriptor.request_shape, descriptor.response_shape
                ),
            });
        }

        let frame = RequestFrame {
            call_id: self.channel.next_call_id(),
            service: self.descriptor.name.to_string(),
            method: method.to_string(),
            deadline_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            payload: Bytes::from(request.encode_to_vec()),
        };

        let response = match tokio::time::timeout(deadline, self.channel.request(frame)).await {
            Ok(outcome) => outcome?,
            Err(_) => return Err(Error::DeadlineExceeded),
        };

        if let Some(err) = response.error {
            return Err(err.into());
        }

        Res::decode(response.payload).map_err(|err| Error::Transport {
            context: format!("undecodable response payload: {err}"),
        })
    }
}

/// Typed proxy for `HeroService`.
pub struct HeroServiceStub {
    inner: ServiceStub,
    deadline: Duration,
}

impl HeroServiceStub {
    pub fn new(inner: ServiceStub) -> Self {
        Self {
            inner,
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Replaces the per-call deadline applied to every method.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Looks up a Hero by id.
    pub async fn find_one(&self, request: HeroById) -> Result<Hero> {
        self.inner.call(FIND_ONE, &request, self.deadline).await
    }
}

/// Process-scoped HeroService handle with lazy, resolve-once stub caching.
///
/// The first call resolves `HeroService` against the canonical schema and
/// caches the resulting stub; every later call reuses it. Teardown is
/// dropping the client (or the process exiting). Resolution failures are not
/// cached, so a failed first call may be retried by the caller.
pub struct HeroClient {
    channel: RpcChannel,
    deadline: Duration,
    stub: OnceCell<HeroServiceStub>,
}

impl HeroClient {
    pub fn new(channel: RpcChannel) -> Self {
        Self {
            channel,
            deadline: DEFAULT_DEADLINE,
            stub: OnceCell::new(),
        }
    }

    /// Connects a channel and wraps it in one step.
    pub async fn connect(addr: &str) -> Result<Self> {
        Ok(Self::new(RpcChannel::connect(addr).await?))
    }

    /// Replaces the per-call deadline applied to every method.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    async fn stub(&self) -> Result<&HeroServiceStub> {
        self.stub
            .get_or_try_init(|| async {
                let resolver =
                    ClientStub::new(self.channel.clone(), SchemaDescriptor::hero().clone());
                Ok(HeroServiceStub::new(resolver.service(HERO_SERVICE)?)
                    .with_deadline(self.deadline))
            })
            .await
    }

    /// Looks up a Hero by id through the cached stub.
    pub async fn find_one(&self, request: HeroById) -> Result<Hero> {
        self.stub().await?.find_one(request).await
    }
}
