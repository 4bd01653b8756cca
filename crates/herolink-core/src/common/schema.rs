//! # Schema Descriptor
//!
//! The static, load-once definition of services, methods, and message shapes
//! shared by client and server. The descriptor is pure data: it carries no
//! behavior beyond name resolution, and it is never mutated after
//! construction, so concurrent calls may read it without locking.
//!
//! Both processes obtain the canonical HeroService definition from
//! [`SchemaDescriptor::hero`], which builds it exactly once for the process
//! lifetime. Because the descriptor (and the message structs it names) live
//! in this shared crate, linking the same crate version on both ends is what
//! keeps the wire contract bit-exact.
//!
//! Resolution failures are [`SchemaError`]s: a configuration defect on
//! whichever side asked, distinct from the per-call error kinds that travel
//! in response frames.

use std::sync::OnceLock;

/// Name of the single service this system exposes.
pub const HERO_SERVICE: &str = "HeroService";

/// Name of the lookup method on [`HERO_SERVICE`].
pub const FIND_ONE: &str = "FindOne";

/// Names a statically-known message layout.
///
/// Every request and response shape a method declares must be one of these;
/// the variants map 1:1 to the message structs in
/// [`types`](crate::types) via
/// [`ShapedMessage`](crate::types::ShapedMessage).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageShape {
    HeroById,
    Hero,
}

/// One named remote operation with fixed request and response shapes.
#[derive(Clone, Debug)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub request_shape: MessageShape,
    pub response_shape: MessageShape,
}

/// A named group of related remote operations.
#[derive(Clone, Debug)]
pub struct ServiceDescriptor {
    pub name: &'static str,
    pub methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    /// Looks up a method by name within this service.
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Resolution failure against the loaded schema.
///
/// Unknown names at resolution time are a startup/configuration defect on
/// the resolving side, not a runtime data error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The schema defines no service with this name.
    #[error("schema defines no service named {0:?}")]
    UnknownService(String),

    /// The named service exists but has no such method.
    #[error("service {service:?} defines no method named {method:?}")]
    UnknownMethod { service: String, method: String },
}

/// The load-once root descriptor holding every service this process knows.
#[derive(Clone, Debug)]
pub struct SchemaDescriptor {
    services: Vec<ServiceDescriptor>,
}

impl SchemaDescriptor {
    /// Builds a descriptor from an explicit service list.
    pub fn new(services: Vec<ServiceDescriptor>) -> Self {
        Self { services }
    }

    /// The canonical schema: `HeroService` with its single `FindOne` method.
    ///
    /// Built once per process and immutable thereafter.
    pub fn hero() -> &'static SchemaDescriptor {
        static SCHEMA: OnceLock<SchemaDescriptor> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaDescriptor::new(vec![ServiceDescriptor {
                name: HERO_SERVICE,
                methods: vec![MethodDescriptor {
                    name: FIND_ONE,
                    request_shape: MessageShape::HeroById,
                    response_shape: MessageShape::Hero,
                }],
            }])
        })
    }

    /// Resolves a service by name.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownService`] if the schema has no such
    /// service.
    pub fn resolve_service(&self, name: &str) -> Result<&ServiceDescriptor, SchemaError> {
        self.services
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SchemaError::UnknownService(name.to_string()))
    }

    /// Resolves a method within a service.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownService`] or
    /// [`SchemaError::UnknownMethod`] when either name is undeclared.
    pub fn resolve_method(
        &self,
        service: &str,
        method: &str,
    ) -> Result<&MethodDescriptor, SchemaError> {
        let descriptor = self.resolve_service(service)?;
        descriptor.method(method).ok_or_else(|| SchemaError::UnknownMethod {
            service: service.to_string(),
            method: method.to_string(),
        })
    }
}
