//! Pluggable serializer hooks.
//!
//! A [`SerializerModifier`] can skip members, rewrite values on the way out and
//! restore them on the way in. The chain for a type is resolved once by the
//! [`MemberCatalog`](crate::MemberCatalog):
//!
//! - modifiers declared with `#[refgraph(modifier = Path)]`, in declaration order,
//! - then modifiers registered at runtime with
//!   [`MemberCatalog::register_modifier`](crate::MemberCatalog::register_modifier).
//!
//! Serialization runs the chain in that order, deserialization runs it
//! reversed, so a modifier that wraps a value can always unwrap what the
//! modifiers after it produced.
//!
//! Errors returned from `serialize_member` / `deserialize_member` only drop
//! the member. Errors from the object-level hooks abort the object.

use std::fmt;

use crate::context::SerializationContext;
use crate::error::Result;
use crate::member::MemberValue;
use crate::model::ModelRef;

/// Hooks invoked around and during the (de)serialization of one model type.
///
/// All methods default to no-ops.
pub trait SerializerModifier: Send + Sync + fmt::Debug {
    /// Returns true to leave the member out of this pass entirely.
    fn should_ignore_member(
        &self,
        context: &SerializationContext<'_>,
        model: &ModelRef,
        member: &MemberValue,
    ) -> bool {
        let _ = (context, model, member);
        false
    }

    /// Called before any member of `model` is serialized.
    fn on_serializing(&self, context: &SerializationContext<'_>, model: &ModelRef) -> Result<()> {
        let _ = (context, model);
        Ok(())
    }

    /// Rewrites a member value before it is encoded.
    fn serialize_member(&self, context: &SerializationContext<'_>, member: &mut MemberValue) -> Result<()> {
        let _ = (context, member);
        Ok(())
    }

    /// Called after every member of `model` has been serialized.
    fn on_serialized(&self, context: &SerializationContext<'_>, model: &ModelRef) -> Result<()> {
        let _ = (context, model);
        Ok(())
    }

    /// Called before any member of `model` is assigned.
    fn on_deserializing(&self, context: &SerializationContext<'_>, model: &ModelRef) -> Result<()> {
        let _ = (context, model);
        Ok(())
    }

    /// Restores a member value after it is decoded, before it is assigned.
    fn deserialize_member(&self, context: &SerializationContext<'_>, member: &mut MemberValue) -> Result<()> {
        let _ = (context, member);
        Ok(())
    }

    /// Called after every member of `model` has been assigned.
    fn on_deserialized(&self, context: &SerializationContext<'_>, model: &ModelRef) -> Result<()> {
        let _ = (context, model);
        Ok(())
    }
}
