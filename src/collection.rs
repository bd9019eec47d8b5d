//! Collection models.
//!
//! A collection is encoded as the single [`COLLECTION_MEMBER_NAME`]
//! pseudo-member whose value is the list of items. Items that are models get
//! the same reference treatment as any member, so shared items stay shared.

use std::any::type_name;
use std::ops::{Deref, DerefMut};

use crate::error::{GraphError, Result};
use crate::model::{COLLECTION_MEMBER_NAME, MemberDescriptor, MemberGroup, Model, ModelType};
use crate::value::{FromValue, IntoValue, Value};

/// An ordered collection of items that serializes as a model.
///
/// ```
/// use refgraph::{ModelList, ModelRef, ModelSerializer};
///
/// let list = ModelRef::new(ModelList::from(vec![1i64, 2, 3]));
/// let serializer = ModelSerializer::new();
///
/// let mut bytes = Vec::new();
/// serializer.serialize(&list, &mut bytes).unwrap();
/// let copy = serializer.deserialize::<ModelList<i64>, _>(&mut bytes.as_slice()).unwrap();
/// assert_eq!(copy.borrow().as_slice(), &[1, 2, 3]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ModelList<T> {
    items: Vec<T>,
}

impl<T> ModelList<T> {
    /// An empty list.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Appends an item.
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// The items.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Consumes the list.
    pub fn into_inner(self) -> Vec<T> {
        self.items
    }
}

impl<T> Default for ModelList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for ModelList<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> FromIterator<T> for ModelList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> Deref for ModelList<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.items
    }
}

impl<T> DerefMut for ModelList<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }
}

impl<T: IntoValue + FromValue + 'static> Model for ModelList<T> {
    fn model_type() -> ModelType {
        ModelType::new::<Self>(format!("refgraph::ModelList<{}>", type_name::<T>()))
            .collection()
            .member(
                MemberDescriptor::new(COLLECTION_MEMBER_NAME, MemberGroup::Collection, type_name::<Vec<T>>())
                    .nested(<T as FromValue>::nested_model_type),
            )
    }

    fn describe(&self) -> ModelType {
        Self::model_type()
    }

    fn get_member(&self, name: &str) -> Result<Value> {
        Err(GraphError::member_not_registered(self.describe().name, name))
    }

    fn set_member(&mut self, name: &str, _value: Value) -> Result<()> {
        Err(GraphError::member_not_registered(self.describe().name, name))
    }

    fn collection_items(&self) -> Option<Vec<Value>> {
        Some(self.items.iter().map(IntoValue::to_value).collect())
    }

    fn set_collection_items(&mut self, items: Vec<Value>) -> Result<()> {
        self.items = items.into_iter().map(T::from_value).collect::<Result<_>>()?;
        Ok(())
    }
}
