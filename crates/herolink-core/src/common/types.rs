//! # Hero Message Types
//!
//! This module defines the request and response messages exchanged over the
//! HeroService RPC boundary. The structs double as the interface definition:
//! their `prost` field tags fix the protobuf wire layout, so client and
//! server components adhere to a consistent, compile-time contract for
//! binary serialization.
//!
//! ## Messages
//!
//! - [`HeroById`] - identifies a lookup request by integer id
//! - [`Hero`] - the immutable record returned by a successful lookup
//!
//! ## Shapes
//!
//! Each message implements [`ShapedMessage`], which names its entry in the
//! schema descriptor (see [`schema`](crate::schema)). Stubs and the route
//! table use the shape to verify that a typed call matches the declared
//! request/response layout before any bytes travel.

use crate::schema::MessageShape;
use prost::Message;

/// Lookup request: names a Hero by its integer identifier.
///
/// No validation beyond presence; whether a negative or unknown id resolves
/// is a handler-level decision.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct HeroById {
    #[prost(int64, tag = "1")]
    pub id: i64,
}

/// Immutable value returned by a successful lookup.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Hero {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub name: String,
}

/// A protobuf message with a fixed entry in the schema descriptor.
///
/// Binds a Rust message type to the [`MessageShape`] the descriptor declares
/// for it, letting typed stubs check their request/response types against a
/// [`MethodDescriptor`](crate::schema::MethodDescriptor) at call time.
pub trait ShapedMessage: Message + Default {
    /// The descriptor shape this message serializes as.
    const SHAPE: MessageShape;
}

impl ShapedMessage for HeroById {
    const SHAPE: MessageShape = MessageShape::HeroById;
}

impl ShapedMessage for Hero {
    const SHAPE: MessageShape = MessageShape::Hero;
}
