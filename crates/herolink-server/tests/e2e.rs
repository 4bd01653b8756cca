//! End-to-end tests: a real dispatcher on an ephemeral port, exercised
//! through the client stub and through raw frames.

use async_trait::async_trait;
use bytes::Bytes;
use core::time::Duration;
use herolink_client::{ClientStub, HeroClient, RpcChannel};
use herolink_core::Error;
use herolink_core::frame::{DEFAULT_MAX_FRAME_BYTES, RequestFrame};
use herolink_core::schema::{FIND_ONE, HERO_SERVICE, SchemaDescriptor};
use herolink_core::types::{Hero, HeroById};
use herolink_server::server::config::ServerConfig;
use herolink_server::server::dispatch::Dispatcher;
use herolink_server::server::hero::{FindOneHandler, HeroStore, InMemoryHeroStore};
use herolink_server::server::registry::RouteTableBuilder;
use prost::Message;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn hero(id: i64, name: &str) -> Hero {
    Hero {
        id,
        name: name.to_string(),
    }
}

async fn spawn_dispatcher(store: Arc<dyn HeroStore>) -> SocketAddr {
    let (addr, _dispatcher) = spawn_dispatcher_with_handle(store).await;
    addr
}

/// Like [`spawn_dispatcher`], but keeps a handle so tests can drive the
/// lifecycle (e.g. invoke a graceful shutdown) from outside.
async fn spawn_dispatcher_with_handle(store: Arc<dyn HeroStore>) -> (SocketAddr, Dispatcher) {
    let config = ServerConfig {
        addr: "127.0.0.1:0".parse().unwrap(),
        max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        shutdown_grace: Duration::from_secs(1),
    };
    let routes = RouteTableBuilder::new(SchemaDescriptor::hero().clone())
        .register(HERO_SERVICE, FIND_ONE, Arc::new(FindOneHandler::new(store)))
        .unwrap()
        .build();

    let dispatcher = Dispatcher::new(config, routes);
    let listener = dispatcher.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = dispatcher.clone();
    tokio::spawn(async move { server.serve(listener).await });
    (addr, dispatcher)
}

async fn connect(addr: SocketAddr) -> RpcChannel {
    RpcChannel::connect(&addr.to_string()).await.unwrap()
}

/// Counts store lookups so tests can assert the handler never ran.
struct CountingStore {
    inner: InMemoryHeroStore,
    lookups: AtomicUsize,
}

impl CountingStore {
    fn new(heroes: impl IntoIterator<Item = Hero>) -> Self {
        Self {
            inner: InMemoryHeroStore::new(heroes),
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HeroStore for CountingStore {
    async fn find(&self, id: i64) -> herolink_core::Result<Option<Hero>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find(id).await
    }
}

/// Stalls lookups for one id to simulate a slow backend.
struct SlowStore {
    inner: InMemoryHeroStore,
    slow_id: i64,
}

#[async_trait]
impl HeroStore for SlowStore {
    async fn find(&self, id: i64) -> herolink_core::Result<Option<Hero>> {
        if id == self.slow_id {
            tokio::time::sleep(Duration::from_millis(400)).await;
        }
        self.inner.find(id).await
    }
}

#[tokio::test]
async fn find_one_round_trips_a_known_hero() {
    let addr = spawn_dispatcher(Arc::new(InMemoryHeroStore::new([hero(2, "Doe")]))).await;
    let client = HeroClient::connect(&addr.to_string()).await.unwrap();

    let found = client.find_one(HeroById { id: 2 }).await.unwrap();
    assert_eq!(found, hero(2, "Doe"));
}

#[tokio::test]
async fn absent_hero_is_a_handler_error_not_a_fault() {
    let addr = spawn_dispatcher(Arc::new(InMemoryHeroStore::new([hero(2, "Doe")]))).await;
    let client = HeroClient::connect(&addr.to_string()).await.unwrap();

    let err = client.find_one(HeroById { id: 999 }).await.unwrap_err();
    assert!(matches!(err, Error::Handler { ref message } if message.contains("999")));

    // The server is still healthy afterwards.
    let found = client.find_one(HeroById { id: 2 }).await.unwrap();
    assert_eq!(found, hero(2, "Doe"));
}

#[tokio::test]
async fn unknown_service_fails_stub_resolution() {
    let addr = spawn_dispatcher(Arc::new(InMemoryHeroStore::with_default_heroes())).await;
    let resolver = ClientStub::new(connect(addr).await, SchemaDescriptor::hero().clone());

    let err = resolver.service("VillainService").map(|_| ()).unwrap_err();
    assert!(matches!(err, Error::UnknownService { ref name } if name == "VillainService"));
}

#[tokio::test]
async fn undeclared_method_is_rejected_before_any_io() {
    let addr = spawn_dispatcher(Arc::new(InMemoryHeroStore::with_default_heroes())).await;
    let resolver = ClientStub::new(connect(addr).await, SchemaDescriptor::hero().clone());
    let service = resolver.service(HERO_SERVICE).unwrap();

    let err = service
        .call::<HeroById, Hero>("FindTwo", &HeroById { id: 2 }, Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MethodNotFound { ref route } if route.ends_with("FindTwo")));
}

#[tokio::test]
async fn unroutable_frame_yields_method_not_found() {
    let addr = spawn_dispatcher(Arc::new(InMemoryHeroStore::with_default_heroes())).await;
    let channel = connect(addr).await;

    // Bypass the stub's schema check with a hand-built frame.
    let response = channel
        .request(RequestFrame {
            call_id: channel.next_call_id(),
            service: HERO_SERVICE.to_string(),
            method: "Vanish".to_string(),
            deadline_ms: 0,
            payload: Bytes::from(HeroById { id: 2 }.encode_to_vec()),
        })
        .await
        .unwrap();

    let err = Error::from(response.error.unwrap());
    assert!(matches!(err, Error::MethodNotFound { ref route } if route.ends_with("Vanish")));
}

#[tokio::test]
async fn malformed_payload_never_reaches_the_handler() {
    let store = Arc::new(CountingStore::new([hero(2, "Doe")]));
    let addr = spawn_dispatcher(Arc::clone(&store) as Arc<dyn HeroStore>).await;
    let channel = connect(addr).await;

    let response = channel
        .request(RequestFrame {
            call_id: channel.next_call_id(),
            service: HERO_SERVICE.to_string(),
            method: FIND_ONE.to_string(),
            deadline_ms: 0,
            payload: Bytes::from_static(&[0xff, 0xff, 0xff, 0xff]),
        })
        .await
        .unwrap();

    let err = Error::from(response.error.unwrap());
    assert!(matches!(err, Error::MalformedRequest { .. }));
    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_calls_never_cross_deliver() {
    let heroes: Vec<Hero> = (1..=16).map(|id| hero(id, &format!("hero-{id}"))).collect();
    let addr = spawn_dispatcher(Arc::new(InMemoryHeroStore::new(heroes))).await;
    let client = Arc::new(HeroClient::connect(&addr.to_string()).await.unwrap());

    let calls: Vec<_> = (1..=16)
        .map(|id| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { (id, client.find_one(HeroById { id }).await.unwrap()) })
        })
        .collect();

    for call in calls {
        let (id, found) = call.await.unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.name, format!("hero-{id}"));
    }
}

#[tokio::test]
async fn draining_dispatcher_refuses_new_calls() {
    let (addr, dispatcher) =
        spawn_dispatcher_with_handle(Arc::new(InMemoryHeroStore::with_default_heroes())).await;
    let client = HeroClient::connect(&addr.to_string()).await.unwrap();

    // Establish the connection with a completed call first.
    let found = client.find_one(HeroById { id: 2 }).await.unwrap();
    assert_eq!(found, hero(2, "Doe"));

    dispatcher.shutdown().await;

    let err = client.find_one(HeroById { id: 2 }).await.unwrap_err();
    assert!(matches!(err, Error::ServiceShutdown));
}

#[tokio::test]
async fn expired_deadline_fails_only_that_call() {
    let store = Arc::new(SlowStore {
        inner: InMemoryHeroStore::new([hero(2, "Doe"), hero(13, "Slow")]),
        slow_id: 13,
    });
    let addr = spawn_dispatcher(store as Arc<dyn HeroStore>).await;
    let client = HeroClient::connect(&addr.to_string())
        .await
        .unwrap()
        .with_deadline(Duration::from_millis(100));

    let err = client.find_one(HeroById { id: 13 }).await.unwrap_err();
    assert!(matches!(err, Error::DeadlineExceeded));

    // The same stub keeps working for independent calls.
    let found = client.find_one(HeroById { id: 2 }).await.unwrap();
    assert_eq!(found, hero(2, "Doe"));
}
