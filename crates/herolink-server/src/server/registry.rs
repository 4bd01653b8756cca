//! Explicit (service, method) routing table.
//!
//! Routes are registered once at startup through [`RouteTableBuilder`] and
//! the resulting [`RouteTable`] is immutable thereafter, shared read-only by
//! every connection task. Registration is checked against the schema
//! descriptor: wiring a handler to a method the schema does not declare is a
//! startup defect and fails with a [`SchemaError`], not a per-call error.

use crate::server::handler::MethodHandler;
use herolink_core::Result;
use herolink_core::schema::SchemaDescriptor;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable mapping from (service, method) to handler.
pub struct RouteTable {
    routes: HashMap<(String, String), Arc<dyn MethodHandler>>,
}

impl RouteTable {
    /// Finds the handler registered for a route, if any.
    pub fn lookup(&self, service: &str, method: &str) -> Option<Arc<dyn MethodHandler>> {
        self.routes
            .get(&(service.to_string(), method.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Startup-time builder validating registrations against the schema.
pub struct RouteTableBuilder {
    schema: SchemaDescriptor,
    routes: HashMap<(String, String), Arc<dyn MethodHandler>>,
}

impl RouteTableBuilder {
    pub fn new(schema: SchemaDescriptor) -> Self {
        Self {
            schema,
            routes: HashMap::new(),
        }
    }

    /// Registers a handler for a declared (service, method) pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`](herolink_core::Error::Schema) if the schema
    /// does not declare the pair.
    pub fn register(
        mut self,
        service: &str,
        method: &str,
        handler: Arc<dyn MethodHandler>,
    ) -> Result<Self> {
        self.schema.resolve_method(service, method)?;
        self.routes
            .insert((service.to_string(), method.to_string()), handler);
        Ok(self)
    }

    pub fn build(self) -> RouteTable {
        RouteTable {
            routes: self.routes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use herolink_core::Error;
    use herolink_core::schema::{FIND_ONE, HERO_SERVICE, SchemaError};

    struct NoopHandler;

    #[async_trait]
    impl MethodHandler for NoopHandler {
        async fn handle(&self, payload: Bytes) -> herolink_core::Result<Bytes> {
            Ok(payload)
        }

        fn name(&self) -> &'static str {
            "NoopHandler"
        }
    }

    #[test]
    fn declared_route_registers() {
        let table = RouteTableBuilder::new(SchemaDescriptor::hero().clone())
            .register(HERO_SERVICE, FIND_ONE, Arc::new(NoopHandler))
            .unwrap()
            .build();
        assert!(table.lookup(HERO_SERVICE, FIND_ONE).is_some());
        assert!(table.lookup(HERO_SERVICE, "FindAll").is_none());
    }

    #[test]
    fn undeclared_method_is_a_startup_defect() {
        let err = RouteTableBuilder::new(SchemaDescriptor::hero().clone())
            .register(HERO_SERVICE, "FindAll", Arc::new(NoopHandler))
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::UnknownMethod { .. })
        ));
    }
}
