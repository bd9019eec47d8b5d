//! The `Model` capability interface and the shared handles the graph is made of.
//!
//! A model is any `'static` type that can describe its members ([`ModelType`])
//! and read or write them as dynamic [`Value`]s. The `#[derive(Model)]` macro
//! generates the implementation; [`ModelList`](crate::ModelList) is a
//! hand-written one for collections.
//!
//! Models participate in a graph through [`Shared<T>`] (typed) and
//! [`ModelRef`] (type-erased). Both are `Rc<RefCell<_>>` underneath, so cloning
//! a handle shares the instance and reference identity is the allocation
//! address.

use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::modifier::SerializerModifier;
use crate::value::Value;

/// Name of the pseudo-member a collection model is encoded under.
pub const COLLECTION_MEMBER_NAME: &str = "__collection";

/// The member groups a model type can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberGroup {
    /// A plain property. Serialized only when opted in.
    RegularProperty,
    /// A tagged model property. Serialized unless opted out.
    ModelProperty,
    /// A field. Serialized only when opted in.
    Field,
    /// The items of a collection model.
    Collection,
}

/// Whether a model type is a regular object or a collection of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Members are walked one by one.
    Object,
    /// Encoded as the single [`COLLECTION_MEMBER_NAME`] pseudo-member.
    Collection,
}

/// Static description of one member of a model type.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    /// Member name, as used on the wire.
    pub name: &'static str,
    /// The member's group.
    pub group: MemberGroup,
    /// Rust type of the member, as written in the source.
    pub member_type: &'static str,
    /// Explicit inclusion marker.
    pub include: bool,
    /// Explicit exclusion marker. Wins over `include`.
    pub exclude: bool,
    /// Describes the model type reachable through this member, if any.
    pub nested: fn() -> Option<ModelType>,
}

impl MemberDescriptor {
    /// Creates a descriptor with no markers and no nested model type.
    pub fn new(name: &'static str, group: MemberGroup, member_type: &'static str) -> Self {
        Self {
            name,
            group,
            member_type,
            include: false,
            exclude: false,
            nested: || None,
        }
    }

    /// Sets the inclusion marker.
    pub fn include(mut self, include: bool) -> Self {
        self.include = include;
        self
    }

    /// Sets the exclusion marker.
    pub fn exclude(mut self, exclude: bool) -> Self {
        self.exclude = exclude;
        self
    }

    /// Sets the nested model type accessor.
    pub fn nested(mut self, nested: fn() -> Option<ModelType>) -> Self {
        self.nested = nested;
        self
    }

    /// Applies the inclusion rule: tagged model properties are in unless
    /// excluded, everything else needs the include marker. Exclusion wins.
    pub fn is_serializable(&self) -> bool {
        if self.exclude {
            return false;
        }
        match self.group {
            MemberGroup::ModelProperty => true,
            MemberGroup::RegularProperty | MemberGroup::Field => self.include,
            MemberGroup::Collection => false,
        }
    }
}

/// Runtime description of a model type.
///
/// Produced by [`Model::model_type`]; the [`MemberCatalog`](crate::MemberCatalog)
/// caches what it derives from it.
#[derive(Clone)]
pub struct ModelType {
    /// Wire name of the type.
    pub name: String,
    /// Legacy wire names that should resolve to this type.
    pub aliases: Vec<String>,
    /// Rust type identity.
    pub type_id: TypeId,
    /// Object or collection.
    pub kind: ModelKind,
    /// Members in declaration order.
    pub members: Vec<MemberDescriptor>,
    /// Modifiers declared on the type, in declaration order.
    pub modifiers: Vec<Arc<dyn SerializerModifier>>,
    /// Produces a blank instance.
    pub create: fn() -> ModelRef,
}

impl ModelType {
    /// Starts a description for `T`.
    pub fn new<T: Model + Default>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            type_id: TypeId::of::<T>(),
            kind: ModelKind::Object,
            members: Vec::new(),
            modifiers: Vec::new(),
            create: ModelRef::new_default::<T>,
        }
    }

    /// Marks the type as a collection.
    pub fn collection(mut self) -> Self {
        self.kind = ModelKind::Collection;
        self
    }

    /// Adds a legacy wire name.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Appends a member.
    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    /// Appends a type-level modifier.
    pub fn modifier(mut self, modifier: Arc<dyn SerializerModifier>) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Looks a member up by name.
    pub fn find_member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name == name)
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelType")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("kind", &self.kind)
            .field("members", &self.members.len())
            .field("modifiers", &self.modifiers.len())
            .finish()
    }
}

/// A type whose members can be walked by the graph serializer.
///
/// Usually implemented with `#[derive(Model)]`.
pub trait Model: 'static {
    /// Describes the type.
    fn model_type() -> ModelType
    where
        Self: Sized;

    /// Describes the type of a type-erased instance.
    fn describe(&self) -> ModelType;

    /// Reads a member.
    ///
    /// # Errors
    /// [`GraphError::MemberNotRegistered`] for unknown names.
    fn get_member(&self, name: &str) -> Result<Value>;

    /// Writes a member.
    ///
    /// # Errors
    /// [`GraphError::MemberNotRegistered`] for unknown names,
    /// [`GraphError::TypeMismatch`] when the value does not fit.
    fn set_member(&mut self, name: &str, value: Value) -> Result<()>;

    /// Items of a collection model. `None` for object models.
    fn collection_items(&self) -> Option<Vec<Value>> {
        None
    }

    /// Replaces the items of a collection model.
    fn set_collection_items(&mut self, items: Vec<Value>) -> Result<()> {
        let _ = items;
        Err(GraphError::member_not_registered(
            self.describe().name,
            COLLECTION_MEMBER_NAME,
        ))
    }
}

/// A type-erased, shared handle to a model instance.
///
/// Equality is reference identity.
#[derive(Clone)]
pub struct ModelRef {
    cell: Rc<RefCell<dyn Model>>,
    any: Rc<dyn Any>,
    type_id: TypeId,
}

impl ModelRef {
    /// Wraps a fresh instance.
    pub fn new<T: Model>(model: T) -> Self {
        Shared::new(model).handle()
    }

    /// Wraps `T::default()`. Used as the blank-instance factory.
    pub fn new_default<T: Model + Default>() -> Self {
        Self::new(T::default())
    }

    /// Rust type identity of the instance.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Identity key: the address of the shared allocation.
    pub fn address(&self) -> usize {
        Rc::as_ptr(&self.any) as *const () as usize
    }

    /// Returns true when both handles point at the same instance.
    pub fn ptr_eq(&self, other: &ModelRef) -> bool {
        self.address() == other.address()
    }

    /// Immutably borrows the instance.
    ///
    /// # Panics
    /// Panics if the instance is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, dyn Model> {
        self.cell.borrow()
    }

    /// Mutably borrows the instance.
    ///
    /// # Panics
    /// Panics if the instance is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, dyn Model> {
        self.cell.borrow_mut()
    }

    /// Non-panicking mutable borrow.
    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, dyn Model>> {
        self.cell
            .try_borrow_mut()
            .map_err(|_| GraphError::Internal("model is already borrowed".into()))
    }

    /// Non-panicking immutable borrow.
    pub fn try_borrow(&self) -> Result<Ref<'_, dyn Model>> {
        self.cell
            .try_borrow()
            .map_err(|_| GraphError::Internal("model is mutably borrowed".into()))
    }

    /// Recovers the typed handle.
    pub fn downcast<T: Model>(&self) -> Option<Shared<T>> {
        Rc::clone(&self.any).downcast::<RefCell<T>>().ok().map(Shared)
    }
}

impl PartialEq for ModelRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ModelRef {
    // Graphs can be cyclic, so never recurse into members here.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelRef({:#x})", self.address())
    }
}

/// A typed, shared handle to a model instance.
pub struct Shared<T: Model>(Rc<RefCell<T>>);

impl<T: Model> Shared<T> {
    /// Wraps a fresh instance.
    pub fn new(model: T) -> Self {
        Self(Rc::new(RefCell::new(model)))
    }

    /// Immutably borrows the instance.
    ///
    /// # Panics
    /// Panics if the instance is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    /// Mutably borrows the instance.
    ///
    /// # Panics
    /// Panics if the instance is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// Returns true when both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Shared<T>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Type-erased handle to the same instance.
    pub fn handle(&self) -> ModelRef {
        let cell: Rc<RefCell<dyn Model>> = self.0.clone();
        let any: Rc<dyn Any> = self.0.clone();
        ModelRef {
            cell,
            any,
            type_id: TypeId::of::<T>(),
        }
    }
}

impl<T: Model> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Model + Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Model> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: Model> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Shared<{}>({:p})",
            std::any::type_name::<T>(),
            Rc::as_ptr(&self.0)
        )
    }
}

impl<T: Model> From<&Shared<T>> for ModelRef {
    fn from(shared: &Shared<T>) -> Self {
        shared.handle()
    }
}

impl<T: Model> From<Shared<T>> for ModelRef {
    fn from(shared: Shared<T>) -> Self {
        shared.handle()
    }
}
