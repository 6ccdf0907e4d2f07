//! Static type tags for message payloads.

use std::any::TypeId;
use std::fmt;

/// A static type tag carried by ports and message entries.
///
/// Tags are compared at wiring time (`add_flow`), at `emit` and at `receive`,
/// so a mismatched payload surfaces as a typed error instead of a failed
/// downcast deep inside an operator. The `any` tag matches every payload.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: Option<TypeId>,
    name: &'static str,
}

impl TypeTag {
    /// Tag for the concrete type `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            id: Some(TypeId::of::<T>()),
            name: std::any::type_name::<T>(),
        }
    }

    /// Tag accepting any payload.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            id: None,
            name: "any",
        }
    }

    /// Whether this is the wildcard tag.
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.id.is_none()
    }

    /// Whether a value tagged `other` may flow through a port tagged `self`.
    #[must_use]
    pub fn accepts(&self, other: &TypeTag) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Human-readable type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
