//! JSON schema declarations.
//!
//! ```json
//! {
//!   "types":   [{ "name": "Pos", "fields": { "x": "int32", "y": "int32" } }],
//!   "packets": [{ "name": "AreaCreate", "fields": { "id": "string", "start": "Pos" } }]
//! }
//! ```
//!
//! `fields` is an array for positional layouts or an object for named ones
//! (key order is kept). A field type is a primitive name, `array<T>`, or the
//! name of a type declared earlier in the same file.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use scriptwire_wire::Primitive;
use serde::Deserialize;

use crate::config::SchemaLoadConfig;
use crate::error::{Result, SchemaError};
use crate::types::{Field, FieldKey, Schema, WireType};

/// Whether a declaration is a plain type or a packet with its own channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Type,
    Packet,
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclKind::Type => f.write_str("type"),
            DeclKind::Packet => f.write_str("packet"),
        }
    }
}

/// Unresolved field type as written in a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Primitive(Primitive),
    Array(Box<TypeExpr>),
    Named(String),
}

impl TypeExpr {
    fn resolve<F>(&self, lookup: &mut F) -> Result<WireType>
    where
        F: FnMut(&str) -> Option<Arc<Schema>>,
    {
        match self {
            TypeExpr::Primitive(p) => Ok(WireType::Primitive(*p)),
            TypeExpr::Array(element) => Ok(WireType::array(element.resolve(lookup)?)),
            TypeExpr::Named(name) => lookup(name)
                .map(WireType::Composite)
                .ok_or_else(|| SchemaError::InvalidTypeReference(format!("unknown type `{name}`"))),
        }
    }

    fn named_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TypeExpr::Primitive(_) => {}
            TypeExpr::Array(element) => element.named_refs(out),
            TypeExpr::Named(name) => out.push(name),
        }
    }
}

impl FromStr for TypeExpr {
    type Err = SchemaError;

    fn from_str(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Some(inner) = text
            .strip_prefix("array<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return Ok(TypeExpr::Array(Box::new(inner.parse()?)));
        }
        if let Some(p) = Primitive::from_name(text) {
            return Ok(TypeExpr::Primitive(p));
        }
        if text.is_empty() || !text.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(SchemaError::InvalidTypeReference(format!(
                "`{text}` is not a type name"
            )));
        }
        Ok(TypeExpr::Named(text.to_string()))
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Primitive(p) => write!(f, "{p}"),
            TypeExpr::Array(element) => write!(f, "array<{element}>"),
            TypeExpr::Named(name) => f.write_str(name),
        }
    }
}

/// Declared fields, positional or named.
#[derive(Debug, Clone)]
pub enum DeclFields {
    Positional(Vec<TypeExpr>),
    Named(Vec<(String, TypeExpr)>),
}

/// One declared type or packet.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclKind,
    pub fields: DeclFields,
}

impl Declaration {
    /// Build the schema, resolving named types through `lookup`.
    ///
    /// Pass registered schemas to get a schema whose signature can be
    /// computed; unregistered ones are enough for local encoding.
    pub fn build<F>(&self, mut lookup: F) -> Result<Schema>
    where
        F: FnMut(&str) -> Option<Arc<Schema>>,
    {
        let mut fields = Vec::new();
        match &self.fields {
            DeclFields::Positional(types) => {
                for (i, expr) in types.iter().enumerate() {
                    fields.push(Field::new(FieldKey::Index(i), expr.resolve(&mut lookup)?));
                }
            }
            DeclFields::Named(entries) => {
                for (key, expr) in entries {
                    fields.push(Field::new(
                        FieldKey::Name(key.clone()),
                        expr.resolve(&mut lookup)?,
                    ));
                }
            }
        }
        Schema::new(self.name.clone(), fields)
    }

    /// Names of declared types this declaration refers to.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut out = Vec::new();
        match &self.fields {
            DeclFields::Positional(types) => types.iter().for_each(|t| t.named_refs(&mut out)),
            DeclFields::Named(entries) => entries.iter().for_each(|(_, t)| t.named_refs(&mut out)),
        }
        out
    }

    fn field_exprs(&self) -> Vec<(String, &TypeExpr)> {
        match &self.fields {
            DeclFields::Positional(types) => types
                .iter()
                .enumerate()
                .map(|(i, t)| (i.to_string(), t))
                .collect(),
            DeclFields::Named(entries) => entries.iter().map(|(k, t)| (k.clone(), t)).collect(),
        }
    }
}

/// All declarations of one file: types first, then packets, each in file
/// order.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    entries: Vec<Declaration>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFile {
    #[serde(default)]
    types: Vec<RawDecl>,
    #[serde(default)]
    packets: Vec<RawDecl>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDecl {
    name: String,
    fields: RawFields,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFields {
    Positional(Vec<String>),
    Named(serde_json::Map<String, serde_json::Value>),
}

impl Declarations {
    /// Parse declarations from a JSON string with default limits.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_json_str_with_config(text, SchemaLoadConfig::default())
    }

    /// Parse declarations from a JSON string with explicit limits.
    pub fn from_json_str_with_config(text: &str, config: SchemaLoadConfig) -> Result<Self> {
        if text.len() > config.max_file_size {
            return Err(SchemaError::LoadFailed(format!(
                "declarations too large ({} bytes)",
                text.len()
            )));
        }
        let raw: RawFile = serde_json::from_str(text)?;
        let count = raw.types.len() + raw.packets.len();
        if count > config.max_declarations {
            return Err(SchemaError::LoadFailed(format!(
                "declaration count exceeds configured max ({}): {count}",
                config.max_declarations
            )));
        }

        let mut entries = Vec::with_capacity(count);
        let kinds = raw
            .types
            .into_iter()
            .map(|d| (DeclKind::Type, d))
            .chain(raw.packets.into_iter().map(|d| (DeclKind::Packet, d)));
        for (kind, decl) in kinds {
            entries.push(Declaration {
                name: decl.name,
                kind,
                fields: parse_fields(decl.fields)?,
            });
        }

        let declarations = Self { entries };
        declarations.validate()?;
        tracing::debug!(count, "loaded schema declarations");
        Ok(declarations)
    }

    /// Load declarations from a file with default limits.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_path_with_config(path, SchemaLoadConfig::default())
    }

    /// Load declarations from a file with explicit limits.
    pub fn from_path_with_config(path: &Path, config: SchemaLoadConfig) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|err| {
            SchemaError::LoadFailed(format!("failed opening {}: {err}", path.display()))
        })?;
        let metadata = file
            .metadata()
            .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
        if metadata.len() > config.max_file_size as u64 {
            return Err(SchemaError::LoadFailed(format!(
                "declaration file too large ({} bytes): {}",
                metadata.len(),
                path.display()
            )));
        }

        let read_limit = u64::try_from(config.max_file_size.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit)
            .read_to_string(&mut content)
            .map_err(|err| {
                SchemaError::LoadFailed(format!("failed reading {}: {err}", path.display()))
            })?;
        Self::from_json_str_with_config(&content, config)
    }

    pub fn entries(&self) -> &[Declaration] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.entries.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build every declaration without registered ids, keyed by name.
    ///
    /// Enough for local encoding and decoding; signatures need registered
    /// composites.
    pub fn build_unregistered(&self) -> Result<HashMap<String, Arc<Schema>>> {
        let mut built: HashMap<String, Arc<Schema>> = HashMap::with_capacity(self.entries.len());
        for decl in &self.entries {
            let schema = decl.build(|name| built.get(name).cloned())?;
            built.insert(decl.name.clone(), Arc::new(schema));
        }
        Ok(built)
    }

    fn validate(&self) -> Result<()> {
        let mut types = HashSet::new();
        let mut names = HashSet::new();
        for decl in &self.entries {
            if decl.name.is_empty() || decl.name.contains(char::is_whitespace) {
                return Err(SchemaError::LoadFailed(format!(
                    "invalid declaration name `{}`",
                    decl.name
                )));
            }
            if Primitive::from_name(&decl.name).is_some() {
                return Err(SchemaError::LoadFailed(format!(
                    "`{}` shadows a primitive type",
                    decl.name
                )));
            }
            if !names.insert(decl.name.as_str()) {
                return Err(SchemaError::LoadFailed(format!(
                    "`{}` is declared more than once",
                    decl.name
                )));
            }

            for (field, expr) in decl.field_exprs() {
                if let TypeExpr::Array(element) = expr {
                    if matches!(**element, TypeExpr::Array(_)) {
                        return Err(SchemaError::ArrayNesting {
                            field: format!("{}.{field}", decl.name),
                        });
                    }
                }
            }
            for dep in decl.dependencies() {
                if !types.contains(dep) {
                    return Err(SchemaError::InvalidTypeReference(format!(
                        "`{}` refers to `{dep}`, which is not a type declared before it",
                        decl.name
                    )));
                }
            }

            if decl.kind == DeclKind::Type {
                types.insert(decl.name.as_str());
            }
        }
        Ok(())
    }
}

fn parse_fields(raw: RawFields) -> Result<DeclFields> {
    match raw {
        RawFields::Positional(types) => Ok(DeclFields::Positional(
            types
                .iter()
                .map(|t| t.parse::<TypeExpr>())
                .collect::<Result<Vec<_>>>()?,
        )),
        RawFields::Named(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, value) in map {
                let serde_json::Value::String(text) = value else {
                    return Err(SchemaError::LoadFailed(format!(
                        "field `{key}` must name a type"
                    )));
                };
                entries.push((key, text.parse()?));
            }
            Ok(DeclFields::Named(entries))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use bytes::Bytes;

    use super::*;
    use crate::value::{Record, Value};

    const AREA: &str = r#"{
        "types": [
            { "name": "Pos", "fields": { "x": "int32", "y": "int32" } },
            { "name": "Pair", "fields": ["uint8", "array<Pos>"] }
        ],
        "packets": [
            { "name": "AreaCreate", "fields": { "id": "string", "start": "Pos", "end": "Pos", "flags": "array<bool>" } }
        ]
    }"#;

    #[test]
    fn parses_types_then_packets_in_order() {
        let decls = Declarations::from_json_str(AREA).unwrap();
        let names: Vec<(&str, DeclKind)> = decls
            .entries()
            .iter()
            .map(|d| (d.name.as_str(), d.kind))
            .collect();
        assert_eq!(
            names,
            [
                ("Pos", DeclKind::Type),
                ("Pair", DeclKind::Type),
                ("AreaCreate", DeclKind::Packet)
            ]
        );

        let DeclFields::Named(fields) = &decls.get("AreaCreate").unwrap().fields else {
            panic!("expected named fields");
        };
        let keys: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["id", "start", "end", "flags"]);
        assert_eq!(
            fields[3].1,
            TypeExpr::Array(Box::new(TypeExpr::Primitive(Primitive::Boolean)))
        );
    }

    #[test]
    fn built_schemas_encode() {
        let decls = Declarations::from_json_str(AREA).unwrap();
        let built = decls.build_unregistered().unwrap();
        let area = &built["AreaCreate"];
        let pos = |x: i64, y: i64| Value::Record(Record::named([("x", Value::Int(x)), ("y", Value::Int(y))]));
        let record = Record::named([
            ("id", Value::from("a1")),
            ("start", pos(0, 0)),
            ("end", pos(10, -10)),
            ("flags", Value::Array(vec![Value::Bool(true)])),
        ]);
        let bytes: Bytes = area.encode(&record).unwrap();
        assert_eq!(area.decode(&bytes, 0).unwrap().0, record);
        assert_eq!(area.fields()[1].ty.name(), "Pos");
    }

    #[test]
    fn unknown_and_forward_references_fail() {
        let unknown = r#"{"types":[{"name":"A","fields":["Missing"]}]}"#;
        assert!(matches!(
            Declarations::from_json_str(unknown),
            Err(SchemaError::InvalidTypeReference(_))
        ));

        let forward = r#"{"types":[{"name":"A","fields":["B"]},{"name":"B","fields":["int8"]}]}"#;
        assert!(matches!(
            Declarations::from_json_str(forward),
            Err(SchemaError::InvalidTypeReference(_))
        ));

        let packet_ref = r#"{"packets":[{"name":"P","fields":["int8"]},{"name":"Q","fields":["P"]}]}"#;
        assert!(matches!(
            Declarations::from_json_str(packet_ref),
            Err(SchemaError::InvalidTypeReference(_))
        ));

        assert!(matches!(
            "array<".parse::<TypeExpr>(),
            Err(SchemaError::InvalidTypeReference(_))
        ));
    }

    #[test]
    fn nested_arrays_fail_at_load() {
        let text = r#"{"types":[{"name":"G","fields":{"cells":"array<array<uint8>>"}}]}"#;
        assert!(matches!(
            Declarations::from_json_str(text),
            Err(SchemaError::ArrayNesting { field }) if field == "G.cells"
        ));
    }

    #[test]
    fn duplicate_and_shadowing_names_fail() {
        let dup = r#"{"types":[{"name":"A","fields":[]},{"name":"A","fields":[]}]}"#;
        assert!(matches!(Declarations::from_json_str(dup), Err(SchemaError::LoadFailed(_))));

        let shadow = r#"{"types":[{"name":"int32","fields":[]}]}"#;
        assert!(matches!(Declarations::from_json_str(shadow), Err(SchemaError::LoadFailed(_))));

        let non_string = r#"{"types":[{"name":"A","fields":{"x":5}}]}"#;
        assert!(matches!(Declarations::from_json_str(non_string), Err(SchemaError::LoadFailed(_))));
    }

    #[test]
    fn invalid_json_is_reported() {
        assert!(matches!(
            Declarations::from_json_str("{not json"),
            Err(SchemaError::InvalidJson(_))
        ));
        assert!(matches!(
            Declarations::from_json_str(r#"{"kinds":[]}"#),
            Err(SchemaError::InvalidJson(_))
        ));
    }

    #[test]
    fn limits_are_enforced() {
        let config = SchemaLoadConfig {
            max_declarations: 2,
            ..SchemaLoadConfig::default()
        };
        assert!(matches!(
            Declarations::from_json_str_with_config(AREA, config),
            Err(SchemaError::LoadFailed(_))
        ));

        let config = SchemaLoadConfig {
            max_file_size: 8,
            ..SchemaLoadConfig::default()
        };
        assert!(matches!(
            Declarations::from_json_str_with_config(AREA, config),
            Err(SchemaError::LoadFailed(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let path = temp_file("decl-load", AREA);
        let decls = Declarations::from_path(&path).unwrap();
        assert_eq!(decls.len(), 3);

        let small = SchemaLoadConfig {
            max_file_size: 16,
            ..SchemaLoadConfig::default()
        };
        assert!(matches!(
            Declarations::from_path_with_config(&path, small),
            Err(SchemaError::LoadFailed(_))
        ));
        let _ = std::fs::remove_file(&path);

        assert!(matches!(
            Declarations::from_path(Path::new("/nonexistent/scriptwire.json")),
            Err(SchemaError::LoadFailed(_))
        ));
    }

    fn temp_file(tag: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "scriptwire-schema-{tag}-{}-{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::write(&path, contents.as_bytes()).unwrap();
        path
    }
}
