//! Canonical type signatures.
//!
//! Two peers that declare the same shape under the same name produce the
//! same signature string, which is what the registry deduplicates on. The
//! rendering is `"<name> <id>;<id>;..."` where each id is the four
//! character ID-charset form of a registered [`TypeId`].

use std::sync::Arc;

use scriptwire_wire::{BoolCursor, Primitive};

use crate::error::{Result, SchemaError};
use crate::types::{Schema, TypeId, WireType};

/// Built-in types every peer registers, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Char,
    Int8,
    Int16,
    Int32,
    ZigZag,
    UInt8,
    UInt16,
    UInt32,
    VarInt,
    Float32,
    Float64,
    Bool,
    String,
    Bytes,
    Array,
}

impl Builtin {
    /// Every built-in, in the order peers register them.
    pub const ALL: [Builtin; 15] = [
        Builtin::Char,
        Builtin::Int8,
        Builtin::Int16,
        Builtin::Int32,
        Builtin::ZigZag,
        Builtin::UInt8,
        Builtin::UInt16,
        Builtin::UInt32,
        Builtin::VarInt,
        Builtin::Float32,
        Builtin::Float64,
        Builtin::Bool,
        Builtin::String,
        Builtin::Bytes,
        Builtin::Array,
    ];

    /// Name the built-in registers under.
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Char => "ch",
            Builtin::Int8 => "int8",
            Builtin::Int16 => "int16",
            Builtin::Int32 => "int32",
            Builtin::ZigZag => "varint",
            Builtin::UInt8 => "uint8",
            Builtin::UInt16 => "uint16",
            Builtin::UInt32 => "uint32",
            Builtin::VarInt => "uvarint",
            Builtin::Float32 => "float32",
            Builtin::Float64 => "float64",
            Builtin::Bool => "bool",
            Builtin::String => "string",
            Builtin::Bytes => "bytes",
            Builtin::Array => "array",
        }
    }

    /// The built-in a primitive field refers to.
    pub fn for_primitive(primitive: Primitive) -> Self {
        match primitive {
            Primitive::Char => Builtin::Char,
            Primitive::Int8 => Builtin::Int8,
            Primitive::Int16 => Builtin::Int16,
            Primitive::Int32 => Builtin::Int32,
            Primitive::ZigZagVarInt => Builtin::ZigZag,
            Primitive::UInt8 => Builtin::UInt8,
            Primitive::UInt16 => Builtin::UInt16,
            Primitive::UInt32 => Builtin::UInt32,
            Primitive::VarInt => Builtin::VarInt,
            Primitive::Float32 => Builtin::Float32,
            Primitive::Float64 => Builtin::Float64,
            Primitive::Boolean => Builtin::Bool,
            Primitive::String => Builtin::String,
            Primitive::ByteArray => Builtin::Bytes,
        }
    }

    /// Field-less schema registered for this built-in.
    pub fn schema(self) -> Arc<Schema> {
        Arc::new(Schema::empty(self.name()))
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Registered ids of the built-in types, filled in as registration completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltinIds {
    ids: [Option<TypeId>; 15],
}

impl BuiltinIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, builtin: Builtin, id: TypeId) {
        self.ids[builtin.index()] = Some(id);
    }

    pub fn get(&self, builtin: Builtin) -> Option<TypeId> {
        self.ids[builtin.index()]
    }

    /// Whether every built-in has an id.
    pub fn is_complete(&self) -> bool {
        self.ids.iter().all(Option::is_some)
    }

    fn require(&self, builtin: Builtin) -> Result<TypeId> {
        self.get(builtin).ok_or_else(|| {
            SchemaError::InvalidTypeReference(format!(
                "built-in `{}` has no registered id",
                builtin.name()
            ))
        })
    }
}

/// Canonical signature of `schema`.
///
/// Boolean fields contribute the `bool` id only when they open a new
/// bit-packed byte, so eight consecutive booleans render as one id.
pub fn signature(schema: &Schema, builtins: &BuiltinIds) -> Result<String> {
    let mut ids = Vec::with_capacity(schema.len());
    let mut bools = BoolCursor::new();
    for field in schema.fields() {
        match &field.ty {
            WireType::Primitive(Primitive::Boolean) => {
                if bools.claim(ids.len()).allocated {
                    ids.push(builtins.require(Builtin::Bool)?);
                }
            }
            WireType::Array(element) => {
                ids.push(builtins.require(Builtin::Array)?);
                ids.push(type_id(element, builtins)?);
            }
            other => ids.push(type_id(other, builtins)?),
        }
    }

    let rendered: Vec<String> = ids.into_iter().map(TypeId::to_wire).collect();
    Ok(format!("{} {}", schema.name(), rendered.join(";")))
}

fn type_id(ty: &WireType, builtins: &BuiltinIds) -> Result<TypeId> {
    match ty {
        WireType::Primitive(p) => builtins.require(Builtin::for_primitive(*p)),
        WireType::Composite(schema) => schema.id().ok_or_else(|| {
            SchemaError::InvalidTypeReference(format!(
                "composite `{}` is not registered",
                schema.name()
            ))
        }),
        WireType::Array(_) => Err(SchemaError::ArrayNesting {
            field: ty.name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_builtins() -> BuiltinIds {
        let mut ids = BuiltinIds::new();
        for (i, builtin) in Builtin::ALL.into_iter().enumerate() {
            ids.set(builtin, TypeId(i as u32));
        }
        ids
    }

    fn wire(n: u32) -> String {
        TypeId(n).to_wire()
    }

    #[test]
    fn builtin_signature_is_name_and_space() {
        let ids = BuiltinIds::new();
        assert_eq!(signature(&Builtin::Float64.schema(), &ids).unwrap(), "float64 ");
    }

    #[test]
    fn builtin_order_is_fixed() {
        let names: Vec<&str> = Builtin::ALL.iter().map(|b| b.name()).collect();
        assert_eq!(
            names,
            [
                "ch", "int8", "int16", "int32", "varint", "uint8", "uint16", "uint32", "uvarint",
                "float32", "float64", "bool", "string", "bytes", "array"
            ]
        );
        for (i, builtin) in Builtin::ALL.into_iter().enumerate() {
            assert_eq!(builtin.index(), i);
        }
    }

    #[test]
    fn primitive_fields_use_builtin_ids() {
        let schema = Schema::named("Pos", [("x", Primitive::Int32), ("y", Primitive::ZigZagVarInt)]).unwrap();
        let sig = signature(&schema, &all_builtins()).unwrap();
        assert_eq!(sig, format!("Pos {};{}", wire(3), wire(4)));
    }

    #[test]
    fn arrays_emit_marker_then_element() {
        let schema = Schema::positional("List", [WireType::array(Primitive::UInt8)]).unwrap();
        let sig = signature(&schema, &all_builtins()).unwrap();
        assert_eq!(sig, format!("List {};{}", wire(14), wire(5)));
    }

    #[test]
    fn booleans_compress_per_packed_byte() {
        let mut types = vec![WireType::from(Primitive::Boolean); 9];
        types.insert(3, Primitive::UInt8.into());
        let schema = Schema::positional("Flags", types).unwrap();
        let sig = signature(&schema, &all_builtins()).unwrap();
        assert_eq!(
            sig,
            format!("Flags {};{};{}", wire(11), wire(5), wire(11))
        );
    }

    #[test]
    fn composite_uses_registered_id() {
        let pos = Arc::new(
            Schema::named("Pos", [("x", Primitive::Int32)])
                .unwrap()
                .with_id(TypeId(40)),
        );
        let area = Schema::named(
            "Area",
            [("a", WireType::from(pos.clone())), ("b", WireType::array(pos))],
        )
        .unwrap();
        let sig = signature(&area, &all_builtins()).unwrap();
        assert_eq!(sig, format!("Area {};{};{}", wire(40), wire(14), wire(40)));
    }

    #[test]
    fn unregistered_references_fail() {
        let pos = Arc::new(Schema::named("Pos", [("x", Primitive::Int32)]).unwrap());
        let area = Schema::named("Area", [("a", WireType::from(pos))]).unwrap();
        assert!(matches!(
            signature(&area, &all_builtins()),
            Err(SchemaError::InvalidTypeReference(_))
        ));

        let schema = Schema::named("P", [("x", Primitive::Int32)]).unwrap();
        assert!(matches!(
            signature(&schema, &BuiltinIds::new()),
            Err(SchemaError::InvalidTypeReference(_))
        ));
    }

    #[test]
    fn same_shape_same_signature() {
        let a = Schema::named("Pos", [("x", Primitive::Int32), ("y", Primitive::Int32)]).unwrap();
        let b = Schema::positional("Pos", [Primitive::Int32, Primitive::Int32]).unwrap();
        let ids = all_builtins();
        assert_eq!(signature(&a, &ids).unwrap(), signature(&b, &ids).unwrap());
        assert!(ids.is_complete());
    }
}
