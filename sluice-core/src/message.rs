//! Messages carried on edges.
//!
//! A message is an ordered collection of named, typed entries. Entries are
//! reference counted so a broadcast to several consumers shares one payload.

use crate::types::TypeTag;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
struct Entry {
    name: String,
    tag: TypeTag,
    value: Arc<dyn Any + Send + Sync>,
}

/// A typed payload sent from an output port to an input port.
///
/// Cloning a message is cheap: the entries are shared, not copied.
#[derive(Clone)]
pub struct Message {
    entries: Arc<[Entry]>,
}

impl Message {
    /// Create a message with a single unnamed entry.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::builder().entry("", value).build()
    }

    /// Create a message from an already shared value.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            entries: Arc::from(vec![Entry {
                name: String::new(),
                tag: TypeTag::of::<T>(),
                value,
            }]),
        }
    }

    /// Start building a message with several named entries.
    pub fn builder() -> MessageBuilder {
        MessageBuilder {
            entries: Vec::new(),
        }
    }

    /// The type of the first entry, or [`TypeTag::any`] for an empty message.
    pub fn tag(&self) -> TypeTag {
        self.entries
            .first()
            .map(|e| e.tag)
            .unwrap_or_else(TypeTag::any)
    }

    /// The first entry, downcast to `T`.
    pub fn primary<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let entry = self.entries.first()?;
        Arc::clone(&entry.value).downcast::<T>().ok()
    }

    /// The entry with the given name, downcast to `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let entry = self.entries.iter().find(|e| e.name == name)?;
        Arc::clone(&entry.value).downcast::<T>().ok()
    }

    /// Names of all entries, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the message has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether two messages share the same entries.
    pub fn ptr_eq(&self, other: &Message) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.name.as_str(), e.tag)))
            .finish()
    }
}

/// Builder for multi-entry messages.
pub struct MessageBuilder {
    entries: Vec<Entry>,
}

impl MessageBuilder {
    /// Append a named entry.
    pub fn entry<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.entries.push(Entry {
            name: name.into(),
            tag: TypeTag::of::<T>(),
            value: Arc::new(value),
        });
        self
    }

    /// Finish the message.
    pub fn build(self) -> Message {
        Message {
            entries: Arc::from(self.entries),
        }
    }
}
