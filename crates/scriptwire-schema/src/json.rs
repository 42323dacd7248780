//! Schema-directed conversion between JSON and [`Record`]s.
//!
//! JSON numbers carry no width, so the schema decides which [`Value`]
//! variant a number becomes. Byte arrays are JSON arrays of integers.

use bytes::Bytes;
use serde_json::{Map, Number, Value as Json};

use scriptwire_wire::Primitive;

use crate::error::{Result, SchemaError};
use crate::types::{FieldKey, Layout, Schema, WireType};
use crate::value::{Record, Value};

impl Schema {
    /// Build a record from JSON shaped like this schema: an object for named
    /// layouts, an array for positional ones.
    pub fn record_from_json(&self, json: &Json) -> Result<Record> {
        match (self.layout(), json) {
            (Layout::Named, Json::Object(map)) => {
                let mut entries = Vec::with_capacity(self.len());
                for field in self.fields() {
                    let FieldKey::Name(name) = &field.key else {
                        continue;
                    };
                    let item = map.get(name).ok_or_else(|| SchemaError::MissingField {
                        schema: self.name().to_string(),
                        field: name.clone(),
                    })?;
                    let value = value_from_json(&field.ty, item).map_err(|err| err.in_field(name))?;
                    entries.push((name.clone(), value));
                }
                if map.len() != entries.len() {
                    return Err(SchemaError::FieldCountMismatch {
                        schema: self.name().to_string(),
                        expected: entries.len(),
                        found: map.len(),
                    });
                }
                Ok(Record::Named(entries))
            }
            (Layout::Positional, Json::Array(items)) => {
                if items.len() != self.len() {
                    return Err(SchemaError::FieldCountMismatch {
                        schema: self.name().to_string(),
                        expected: self.len(),
                        found: items.len(),
                    });
                }
                let mut values = Vec::with_capacity(items.len());
                for (field, item) in self.fields().iter().zip(items) {
                    let value = value_from_json(&field.ty, item)
                        .map_err(|err| err.in_field(&field.key.to_string()))?;
                    values.push(value);
                }
                Ok(Record::Positional(values))
            }
            (layout, other) => Err(SchemaError::ArgumentTypeMismatch {
                field: self.name().to_string(),
                expected: match layout {
                    Layout::Named => "JSON object".to_string(),
                    Layout::Positional => "JSON array".to_string(),
                },
                found: json_kind(other),
            }),
        }
    }
}

impl Record {
    /// Named records become objects, positional records arrays.
    pub fn to_json(&self) -> Json {
        match self {
            Record::Positional(values) => Json::Array(values.iter().map(Value::to_json).collect()),
            Record::Named(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_json());
                }
                Json::Object(map)
            }
        }
    }
}

impl Value {
    /// JSON form of the value. Non-finite floats become `null`.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Char(c) => Json::String(c.to_string()),
            Value::Int(v) => Json::from(*v),
            Value::UInt(v) => Json::from(*v),
            Value::Float(v) => Number::from_f64(*v).map(Json::Number).unwrap_or(Json::Null),
            Value::Bool(v) => Json::Bool(*v),
            Value::String(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::Array(b.iter().map(|byte| Json::from(*byte)).collect()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Record(record) => record.to_json(),
        }
    }
}

fn value_from_json(ty: &WireType, json: &Json) -> Result<Value> {
    let mismatch = || SchemaError::ArgumentTypeMismatch {
        field: String::new(),
        expected: ty.name(),
        found: json_kind(json),
    };

    match ty {
        WireType::Primitive(primitive) => match primitive {
            Primitive::Char => {
                let text = json.as_str().ok_or_else(mismatch)?;
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err(mismatch()),
                }
            }
            Primitive::Int8
            | Primitive::Int16
            | Primitive::Int32
            | Primitive::ZigZagVarInt => json
                .as_i64()
                .map(Value::Int)
                .or_else(|| json.as_u64().map(Value::UInt))
                .ok_or_else(mismatch),
            Primitive::UInt8 | Primitive::UInt16 | Primitive::UInt32 | Primitive::VarInt => json
                .as_u64()
                .map(Value::UInt)
                .or_else(|| json.as_i64().map(Value::Int))
                .ok_or_else(mismatch),
            Primitive::Float32 | Primitive::Float64 => {
                json.as_f64().map(Value::Float).ok_or_else(mismatch)
            }
            Primitive::Boolean => json.as_bool().map(Value::Bool).ok_or_else(mismatch),
            Primitive::String => json
                .as_str()
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(mismatch),
            Primitive::ByteArray => {
                let items = json.as_array().ok_or_else(mismatch)?;
                let bytes = items
                    .iter()
                    .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect::<Option<Vec<u8>>>()
                    .ok_or_else(mismatch)?;
                Ok(Value::Bytes(Bytes::from(bytes)))
            }
        },
        WireType::Array(element) => {
            let items = json.as_array().ok_or_else(mismatch)?;
            let mut values = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                values.push(value_from_json(element, item).map_err(|err| err.in_field(&format!("[{i}]")))?);
            }
            Ok(Value::Array(values))
        }
        WireType::Composite(schema) => Ok(Value::Record(schema.record_from_json(json)?)),
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn area() -> Schema {
        let pos = Arc::new(Schema::named("Pos", [("x", Primitive::Int32), ("y", Primitive::Int32)]).unwrap());
        Schema::named(
            "Area",
            [
                ("id", WireType::from(Primitive::String)),
                ("corners", WireType::array(pos)),
                ("level", WireType::from(Primitive::UInt8)),
                ("blob", WireType::from(Primitive::ByteArray)),
                ("mark", WireType::from(Primitive::Char)),
                ("open", WireType::from(Primitive::Boolean)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn json_roundtrips_through_codec() {
        let schema = area();
        let input = json!({
            "id": "spawn",
            "corners": [{"x": -5, "y": 1000000}, {"x": 0, "y": 0}],
            "level": 3,
            "blob": [0, 255],
            "mark": "#",
            "open": true
        });
        let record = schema.record_from_json(&input).unwrap();
        let bytes = schema.encode(&record).unwrap();
        let (decoded, _) = schema.decode(&bytes, 0).unwrap();
        assert_eq!(decoded.to_json(), input);
    }

    #[test]
    fn positional_schema_takes_arrays() {
        let schema = Schema::positional("Pair", [Primitive::Float64, Primitive::ZigZagVarInt]).unwrap();
        let record = schema.record_from_json(&json!([1.5, -3])).unwrap();
        assert_eq!(record, Record::Positional(vec![Value::Float(1.5), Value::Int(-3)]));
        assert!(matches!(
            schema.record_from_json(&json!([1.5])),
            Err(SchemaError::FieldCountMismatch { expected: 2, found: 1, .. })
        ));
        assert!(matches!(
            schema.record_from_json(&json!({"a": 1})),
            Err(SchemaError::ArgumentTypeMismatch { found: "object", .. })
        ));
    }

    #[test]
    fn json_errors_name_fields() {
        let schema = area();
        let input = json!({
            "id": "x",
            "corners": [{"x": 1, "y": "up"}],
            "level": 3,
            "blob": [],
            "mark": "#",
            "open": false
        });
        match schema.record_from_json(&input).unwrap_err() {
            SchemaError::ArgumentTypeMismatch { field, expected, found } => {
                assert_eq!(field, "corners[0].y");
                assert_eq!(expected, "int32");
                assert_eq!(found, "string");
            }
            other => panic!("unexpected {other:?}"),
        }

        let missing = json!({"id": "x"});
        assert!(matches!(
            schema.record_from_json(&missing),
            Err(SchemaError::MissingField { field, .. }) if field == "corners"
        ));

        let pos = Schema::named("Pos", [("x", Primitive::Int32), ("y", Primitive::Int32)]).unwrap();
        assert!(matches!(
            pos.record_from_json(&json!({"x": 1, "y": 2, "z": 3})),
            Err(SchemaError::FieldCountMismatch { expected: 2, found: 3, .. })
        ));
    }

    #[test]
    fn byte_arrays_reject_non_bytes() {
        let schema = Schema::positional("B", [Primitive::ByteArray]).unwrap();
        assert!(schema.record_from_json(&json!([[1, 2, 256]])).is_err());
        assert!(schema.record_from_json(&json!([[1, -1]])).is_err());
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert_eq!(Value::Float(f64::NAN).to_json(), Json::Null);
        assert_eq!(Value::UInt(u64::MAX).to_json(), json!(u64::MAX));
    }
}
