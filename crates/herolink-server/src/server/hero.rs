//! The FindOne handler and its hero store collaborator.
//!
//! [`HeroStore`] is the external record provider the handler resolves ids
//! against; its concurrency safety is its own concern. [`InMemoryHeroStore`]
//! is the provided implementation: a read-only map built at startup, which
//! doubles as the test fixture.
//!
//! Not-found policy: a lookup for an absent id returns an explicit handler
//! error naming the id. A sentinel empty Hero would be indistinguishable
//! from a real record, so absence is always an error the caller can match
//! on.

use crate::server::handler::{MethodHandler, decode_request};
use async_trait::async_trait;
use bytes::Bytes;
use herolink_core::types::{Hero, HeroById};
use herolink_core::{Error, Result};
use prost::Message;
use std::collections::HashMap;
use std::sync::Arc;

/// External record provider for hero lookups.
#[async_trait]
pub trait HeroStore: Send + Sync {
    /// Finds a hero by id; `Ok(None)` means no record matches.
    ///
    /// # Errors
    ///
    /// A store-level failure; surfaced to the caller as a handler error.
    async fn find(&self, id: i64) -> Result<Option<Hero>>;
}

/// Read-only in-memory store.
pub struct InMemoryHeroStore {
    heroes: HashMap<i64, Hero>,
}

impl InMemoryHeroStore {
    pub fn new(heroes: impl IntoIterator<Item = Hero>) -> Self {
        Self {
            heroes: heroes.into_iter().map(|h| (h.id, h)).collect(),
        }
    }

    /// The demo data set the binary serves.
    pub fn with_default_heroes() -> Self {
        Self::new([
            Hero {
                id: 1,
                name: "John".to_string(),
            },
            Hero {
                id: 2,
                name: "Doe".to_string(),
            },
        ])
    }
}

#[async_trait]
impl HeroStore for InMemoryHeroStore {
    async fn find(&self, id: i64) -> Result<Option<Hero>> {
        Ok(self.heroes.get(&id).cloned())
    }
}

/// Handler for `HeroService/FindOne`.
pub struct FindOneHandler {
    store: Arc<dyn HeroStore>,
}

impl FindOneHandler {
    pub fn new(store: Arc<dyn HeroStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MethodHandler for FindOneHandler {
    async fn handle(&self, payload: Bytes) -> Result<Bytes> {
        let request: HeroById = decode_request(payload)?;

        match self.store.find(request.id).await? {
            Some(hero) => Ok(Bytes::from(hero.encode_to_vec())),
            None => Err(Error::Handler {
                message: format!("no hero with id {}", request.id),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "FindOneHandler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> FindOneHandler {
        FindOneHandler::new(Arc::new(InMemoryHeroStore::with_default_heroes()))
    }

    #[tokio::test]
    async fn known_id_returns_the_record() {
        let payload = Bytes::from(HeroById { id: 2 }.encode_to_vec());
        let encoded = handler().handle(payload).await.unwrap();
        let hero = Hero::decode(encoded).unwrap();
        assert_eq!(
            hero,
            Hero {
                id: 2,
                name: "Doe".to_string()
            }
        );
    }

    #[tokio::test]
    async fn absent_id_is_an_explicit_error() {
        let payload = Bytes::from(HeroById { id: 999 }.encode_to_vec());
        let err = handler().handle(payload).await.unwrap_err();
        assert!(matches!(err, Error::Handler { ref message } if message.contains("999")));
    }

    #[tokio::test]
    async fn garbage_payload_is_malformed() {
        let payload = Bytes::from_static(&[0xff, 0xff, 0xff, 0xff]);
        let err = handler().handle(payload).await.unwrap_err();
        assert!(matches!(err, Error::MalformedRequest { .. }));
    }
}
