//! The per-pass view of a single member.

use crate::model::{MemberDescriptor, MemberGroup};
use crate::value::Value;

/// One member of one model during one (de)serialization pass.
///
/// Modifiers receive it by mutable reference and may rewrite `value` in place.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberValue {
    /// The member's group.
    pub group: MemberGroup,
    /// Wire name of the type declaring the member.
    pub declaring_type: String,
    /// Rust type of the member, as written in the source.
    pub member_type: &'static str,
    /// Member name.
    pub name: String,
    /// Current value.
    pub value: Value,
}

impl MemberValue {
    /// Builds a member value from its descriptor.
    pub fn from_descriptor(declaring_type: &str, descriptor: &MemberDescriptor, value: Value) -> Self {
        Self {
            group: descriptor.group,
            declaring_type: declaring_type.to_owned(),
            member_type: descriptor.member_type,
            name: descriptor.name.to_owned(),
            value,
        }
    }
}
