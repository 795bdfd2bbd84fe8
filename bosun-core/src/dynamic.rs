//! Types for resource kinds not known at compile-time.
use serde::{Deserialize, Serialize};

use crate::metadata::{ListMeta, ObjectMeta, TypeMeta};

/// A dynamic representation of an API object
///
/// This will work with any non-list type object.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DynamicObject {
    /// The type fields, not always present
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// All other keys
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl DynamicObject {
    /// Create a named object with its type fields set
    #[must_use]
    pub fn new(name: &str, types: TypeMeta) -> Self {
        Self {
            types: Some(types),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            data: Default::default(),
        }
    }

    /// Attach dynamic data to the object
    #[must_use]
    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Attach a namespace to the object
    #[must_use]
    pub fn within(mut self, ns: &str) -> Self {
        self.metadata.namespace = Some(ns.into());
        self
    }

    /// The object's name, if set
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    /// The object's resource version, if set
    pub fn resource_version(&self) -> Option<&str> {
        self.metadata.resource_version.as_deref()
    }
}

/// A generic object list
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ObjectList<T>
where
    T: Clone,
{
    /// ListMeta - only really used for its `resource_version`
    #[serde(default)]
    pub metadata: ListMeta,

    /// The items we are actually interested in
    #[serde(bound(deserialize = "Vec<T>: Deserialize<'de>"))]
    pub items: Vec<T>,
}

impl<T: Clone> ObjectList<T> {
    /// Returns an iterator over the elements of this list
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> IntoIterator for ObjectList<T> {
    type IntoIter = std::vec::IntoIter<Self::Item>;
    type Item = T;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
