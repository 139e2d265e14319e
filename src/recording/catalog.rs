//! Metadata Catalog
//!
//! An in-memory index of type descriptors. Types are held in an arena
//! (`Vec<TypeDescriptor>`) and referenced by a stable numeric [`TypeId`]
//! rather than embedded pointers, which is what makes cyclic schemas
//! (stack trace → frame → method → class → class-loader, possibly back to
//! a class) representable without `Rc`/`RefCell` cycles.

use indexmap::IndexMap;
use std::collections::HashMap;

/// A stable numeric id for a catalog entry. Fields resolve to other
/// entries by id, never by embedded pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// What kind of catalog entry a [`TypeDescriptor`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Event,
    Struct,
    Primitive,
    ConstantPoolEntry,
}

/// A key/value annotation attached to a type or field.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub name: String,
    pub values: IndexMap<String, String>,
}

impl Annotation {
    pub fn new(name: impl Into<String>) -> Self {
        Annotation {
            name: name.into(),
            values: IndexMap::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

/// A single field of a [`TypeDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    /// The declared type name; always resolvable to another catalog entry
    /// or a primitive (C2 invariant).
    pub type_name: String,
    /// 0 = scalar, 1 = list/array.
    pub dimension: u8,
    pub annotations: Vec<Annotation>,
}

impl Field {
    pub fn scalar(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            type_name: type_name.into(),
            dimension: 0,
            annotations: Vec::new(),
        }
    }

    pub fn list(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            type_name: type_name.into(),
            dimension: 1,
            annotations: Vec::new(),
        }
    }

    pub fn is_list(&self) -> bool {
        self.dimension >= 1
    }
}

/// A single catalog entry: an event, struct, primitive, or constant-pool
/// entry type, with its fields and class-level metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub name: String,
    pub id: TypeId,
    pub kind: TypeKind,
    pub fields: Vec<Field>,
    pub annotations: Vec<Annotation>,
    pub settings: Vec<String>,
}

impl TypeDescriptor {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The in-memory type catalog. Immutable after construction; safe for
/// concurrent readers.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    types: Vec<TypeDescriptor>,
    by_name: HashMap<String, TypeId>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Insert a new type descriptor, assigning it the next arena id.
    /// Returns the assigned id.
    pub fn insert(&mut self, name: impl Into<String>, kind: TypeKind) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        let name = name.into();
        self.by_name.insert(name.clone(), id);
        self.types.push(TypeDescriptor {
            name,
            id,
            kind,
            fields: Vec::new(),
            annotations: Vec::new(),
            settings: Vec::new(),
        });
        id
    }

    pub fn add_field(&mut self, id: TypeId, field: Field) {
        if let Some(desc) = self.types.get_mut(id.0 as usize) {
            desc.fields.push(field);
        }
    }

    pub fn add_annotation(&mut self, id: TypeId, annotation: Annotation) {
        if let Some(desc) = self.types.get_mut(id.0 as usize) {
            desc.annotations.push(annotation);
        }
    }

    pub fn add_setting(&mut self, id: TypeId, setting: impl Into<String>) {
        if let Some(desc) = self.types.get_mut(id.0 as usize) {
            desc.settings.push(setting.into());
        }
    }

    pub fn by_id(&self, id: TypeId) -> Option<&TypeDescriptor> {
        self.types.get(id.0 as usize)
    }

    pub fn by_name(&self, name: &str) -> Option<&TypeDescriptor> {
        self.by_name.get(name).and_then(|id| self.by_id(*id))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn event_type_names(&self) -> Vec<String> {
        self.types
            .iter()
            .filter(|t| t.kind == TypeKind::Event)
            .map(|t| t.name.clone())
            .collect()
    }

    pub fn constant_pool_type_names(&self) -> Vec<String> {
        self.types
            .iter()
            .filter(|t| t.kind == TypeKind::ConstantPoolEntry)
            .map(|t| t.name.clone())
            .collect()
    }

    /// Look up a field by type name then field name, distinguishing
    /// "the type itself is unknown" from "the field doesn't exist on it" —
    /// the two halves of `QueryError::{UnknownType,UnknownField}`.
    pub fn resolve_field<'a>(
        &'a self,
        type_name: &str,
        field_name: &str,
    ) -> Result<&'a Field, crate::error::QueryError> {
        let desc = self
            .by_name(type_name)
            .ok_or_else(|| crate::error::QueryError::UnknownType(type_name.to_string()))?;
        desc.field(field_name)
            .ok_or_else(|| crate::error::QueryError::UnknownField {
                type_name: type_name.to_string(),
                field: field_name.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.iter()
    }
}
