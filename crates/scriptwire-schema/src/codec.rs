//! Record encoding and decoding driven by a [`Schema`].
//!
//! Each record invocation owns one [`BoolCursor`]. Boolean fields and the
//! elements of boolean arrays directly inside that record share it; a nested
//! composite starts a fresh cursor.

use bytes::Bytes;
use scriptwire_wire::{
    decode_array, decode_primitive, encode_array, encode_primitive, BoolCursor, EncodeBuffer,
    DEFAULT_ENCODE_BUFFER_SIZE,
};

use crate::error::{Result, SchemaError};
use crate::types::{FieldKey, Layout, Schema, WireType};
use crate::value::{Record, Value};

impl Schema {
    /// Encode a record into a fresh buffer.
    pub fn encode(&self, record: &Record) -> Result<Bytes> {
        self.encode_with_capacity(record, DEFAULT_ENCODE_BUFFER_SIZE)
    }

    /// Encode a record into a fresh buffer with an explicit starting capacity.
    pub fn encode_with_capacity(&self, record: &Record, capacity: usize) -> Result<Bytes> {
        let mut buf = EncodeBuffer::with_capacity(capacity);
        self.encode_into(record, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Append the encoding of `record` to `buf`.
    ///
    /// On error the buffer holds a partial record and must be discarded.
    pub fn encode_into(&self, record: &Record, buf: &mut EncodeBuffer) -> Result<()> {
        let mut bools = BoolCursor::new();
        match record {
            Record::Positional(values) => {
                if values.len() != self.len() {
                    return Err(SchemaError::FieldCountMismatch {
                        schema: self.name().to_string(),
                        expected: self.len(),
                        found: values.len(),
                    });
                }
                for (field, value) in self.fields().iter().zip(values) {
                    encode_value(&field.ty, value, buf, &mut bools)
                        .map_err(|err| err.in_field(&field.key.to_string()))?;
                }
            }
            Record::Named(_) if self.layout() == Layout::Positional && !self.is_empty() => {
                return Err(SchemaError::ArgumentTypeMismatch {
                    field: self.name().to_string(),
                    expected: "positional record".to_string(),
                    found: "named record",
                });
            }
            Record::Named(entries) => {
                for field in self.fields() {
                    let FieldKey::Name(name) = &field.key else {
                        continue;
                    };
                    let value = record.get(name).ok_or_else(|| SchemaError::MissingField {
                        schema: self.name().to_string(),
                        field: name.clone(),
                    })?;
                    encode_value(&field.ty, value, buf, &mut bools)
                        .map_err(|err| err.in_field(name))?;
                }
                // Every field was found, so any surplus entry is unknown or repeated.
                if entries.len() != self.len() {
                    return Err(SchemaError::FieldCountMismatch {
                        schema: self.name().to_string(),
                        expected: self.len(),
                        found: entries.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Decode one record starting at `start`.
    ///
    /// Returns the record laid out like the schema and the offset just past
    /// it.
    pub fn decode(&self, src: &Bytes, start: usize) -> Result<(Record, usize)> {
        let mut bools = BoolCursor::new();
        let mut offset = start;
        let mut values = Vec::with_capacity(self.len());
        for field in self.fields() {
            let (value, next) = decode_value(&field.ty, src, offset, &mut bools)
                .map_err(|err| err.in_field(&field.key.to_string()))?;
            values.push((&field.key, value));
            offset = next;
        }

        let record = match self.layout() {
            Layout::Positional => Record::Positional(values.into_iter().map(|(_, v)| v).collect()),
            Layout::Named => Record::Named(
                values
                    .into_iter()
                    .map(|(key, v)| (key.to_string(), v))
                    .collect(),
            ),
        };
        Ok((record, offset))
    }
}

fn encode_value(
    ty: &WireType,
    value: &Value,
    buf: &mut EncodeBuffer,
    bools: &mut BoolCursor,
) -> Result<()> {
    match ty {
        WireType::Primitive(primitive) => match value.as_scalar() {
            Some(scalar) => Ok(encode_primitive(*primitive, scalar, buf, bools)?),
            None => Err(mismatch(ty, value)),
        },
        WireType::Array(element) => {
            let Value::Array(items) = value else {
                return Err(mismatch(ty, value));
            };
            let mut index = 0usize;
            encode_array(items, buf, |item, buf| {
                let result = encode_value(element, item, buf, bools)
                    .map_err(|err| err.in_field(&format!("[{index}]")));
                index += 1;
                result
            })
        }
        WireType::Composite(schema) => {
            let Value::Record(record) = value else {
                return Err(mismatch(ty, value));
            };
            schema.encode_into(record, buf)
        }
    }
}

fn decode_value(
    ty: &WireType,
    src: &Bytes,
    offset: usize,
    bools: &mut BoolCursor,
) -> Result<(Value, usize)> {
    match ty {
        WireType::Primitive(primitive) => {
            let (scalar, next) = decode_primitive(*primitive, src, offset, bools)?;
            Ok((Value::from(scalar), next))
        }
        WireType::Array(element) => {
            let mut index = 0usize;
            let (items, next) = decode_array(src, offset, |at| {
                let result = decode_value(element, src, at, bools)
                    .map_err(|err: SchemaError| err.in_field(&format!("[{index}]")));
                index += 1;
                result
            })?;
            Ok((Value::Array(items), next))
        }
        WireType::Composite(schema) => {
            let (record, next) = schema.decode(src, offset)?;
            Ok((Value::Record(record), next))
        }
    }
}

fn mismatch(ty: &WireType, value: &Value) -> SchemaError {
    SchemaError::ArgumentTypeMismatch {
        field: String::new(),
        expected: ty.name(),
        found: value.kind(),
    }
}
