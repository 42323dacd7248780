use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use scriptwire_wire::{Primitive, ID_CHARSET};

use crate::error::{Result, SchemaError};

/// Numeric identifier agreed by all peers for one canonical signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Width of the rendered identifier in ID-charset characters.
    pub const WIRE_LEN: usize = 4;

    /// Render as four ID-charset characters (big-endian).
    pub fn to_wire(self) -> String {
        ID_CHARSET.encode(&self.0.to_be_bytes())
    }

    /// Parse a rendered identifier. Anything but exactly four ID-charset
    /// characters is rejected.
    pub fn from_wire(text: &str) -> Option<Self> {
        let bytes = ID_CHARSET.decode(text).ok()?;
        let bytes: [u8; 4] = bytes.as_slice().try_into().ok()?;
        Some(TypeId(u32::from_be_bytes(bytes)))
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A wire type, resolved once when the owning schema is built.
#[derive(Debug, Clone)]
pub enum WireType {
    Primitive(Primitive),
    /// VarInt element count followed by the elements.
    Array(Box<WireType>),
    /// A nested record with its own field list.
    Composite(Arc<Schema>),
}

impl WireType {
    /// Array of `element`.
    pub fn array(element: impl Into<WireType>) -> Self {
        WireType::Array(Box::new(element.into()))
    }

    /// Nested record of `schema`.
    pub fn composite(schema: Arc<Schema>) -> Self {
        WireType::Composite(schema)
    }

    /// Human-readable type name, as used in declaration files.
    pub fn name(&self) -> String {
        match self {
            WireType::Primitive(p) => p.name().to_string(),
            WireType::Array(element) => format!("array<{}>", element.name()),
            WireType::Composite(schema) => schema.name().to_string(),
        }
    }

    fn validate(&self, field: &FieldKey) -> Result<()> {
        if let WireType::Array(element) = self {
            if matches!(**element, WireType::Array(_)) {
                return Err(SchemaError::ArrayNesting {
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl From<Primitive> for WireType {
    fn from(p: Primitive) -> Self {
        WireType::Primitive(p)
    }
}

impl From<Arc<Schema>> for WireType {
    fn from(schema: Arc<Schema>) -> Self {
        WireType::Composite(schema)
    }
}

/// How a field is addressed inside a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Index(usize),
    Name(String),
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Index(i) => write!(f, "{i}"),
            FieldKey::Name(name) => f.write_str(name),
        }
    }
}

/// One declared field.
#[derive(Debug, Clone)]
pub struct Field {
    pub key: FieldKey,
    pub ty: WireType,
}

impl Field {
    pub fn new(key: FieldKey, ty: impl Into<WireType>) -> Self {
        Self {
            key,
            ty: ty.into(),
        }
    }
}

/// Record layout of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Positional,
    Named,
}

/// An immutable, validated list of typed fields.
///
/// Declaration order is wire order for both layouts. The id is absent until
/// the schema has been registered with a peer group.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    id: Option<TypeId>,
    layout: Layout,
    fields: Vec<Field>,
}

impl Schema {
    /// Build a schema from explicit fields.
    ///
    /// Keys must be either all `Index(i)` with `i` equal to the position, or
    /// all `Name` and unique. An empty field list is positional.
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Result<Self> {
        let name = name.into();
        let layout = match fields.first().map(|f| &f.key) {
            None | Some(FieldKey::Index(_)) => Layout::Positional,
            Some(FieldKey::Name(_)) => Layout::Named,
        };

        let mut seen = HashSet::new();
        for (position, field) in fields.iter().enumerate() {
            match (&field.key, layout) {
                (FieldKey::Index(i), Layout::Positional) if *i == position => {}
                (FieldKey::Index(i), Layout::Positional) => {
                    return Err(SchemaError::InvalidLayout {
                        schema: name,
                        reason: format!("field at position {position} has index {i}"),
                    });
                }
                (FieldKey::Name(field_name), Layout::Named) => {
                    if !seen.insert(field_name.as_str()) {
                        return Err(SchemaError::DuplicateField {
                            schema: name.clone(),
                            field: field_name.clone(),
                        });
                    }
                }
                _ => {
                    return Err(SchemaError::InvalidLayout {
                        schema: name,
                        reason: "positional and named fields are mixed".to_string(),
                    });
                }
            }
            field.ty.validate(&field.key)?;
        }

        Ok(Self {
            name,
            id: None,
            layout,
            fields,
        })
    }

    /// Schema without fields.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            layout: Layout::Positional,
            fields: Vec::new(),
        }
    }

    /// Positional schema: fields are addressed by index.
    pub fn positional<I, T>(name: impl Into<String>, types: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<WireType>,
    {
        let fields = types
            .into_iter()
            .enumerate()
            .map(|(i, ty)| Field::new(FieldKey::Index(i), ty))
            .collect();
        Self::new(name, fields)
    }

    /// Named schema: fields are addressed by key, in the given order.
    pub fn named<I, K, T>(name: impl Into<String>, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<WireType>,
    {
        let fields = fields
            .into_iter()
            .map(|(key, ty)| Field::new(FieldKey::Name(key.into()), ty))
            .collect();
        Self::new(name, fields)
    }

    /// Copy of this schema bound to a registered id.
    pub fn with_id(&self, id: TypeId) -> Self {
        Self {
            id: Some(id),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Option<TypeId> {
        self.id
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
