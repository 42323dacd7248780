use scriptwire_wire::WireError;

/// Errors raised while building, encoding or decoding schemas.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A primitive codec failed on a field.
    #[error("field `{field}`: {source}")]
    Wire {
        field: String,
        #[source]
        source: WireError,
    },

    /// A value has the wrong shape for a composite or array field.
    #[error("field `{field}`: expected {expected}, found {found}")]
    ArgumentTypeMismatch {
        field: String,
        expected: String,
        found: &'static str,
    },

    /// A named record lacks a declared field.
    #[error("record for `{schema}` is missing field `{field}`")]
    MissingField { schema: String, field: String },

    /// A positional record has the wrong number of values.
    #[error("record for `{schema}` has {found} values, schema declares {expected}")]
    FieldCountMismatch {
        schema: String,
        expected: usize,
        found: usize,
    },

    /// A type name or composite reference cannot be resolved.
    #[error("invalid type reference: {0}")]
    InvalidTypeReference(String),

    /// An array was declared directly inside another array.
    #[error("field `{field}`: arrays cannot be nested directly, wrap the inner array in a composite")]
    ArrayNesting { field: String },

    /// Two fields share a name.
    #[error("schema `{schema}` declares field `{field}` more than once")]
    DuplicateField { schema: String, field: String },

    /// Field keys do not form a valid positional or named layout.
    #[error("schema `{schema}` has an invalid field layout: {reason}")]
    InvalidLayout { schema: String, reason: String },

    /// A declaration file could not be loaded.
    #[error("failed to load declarations: {0}")]
    LoadFailed(String),

    /// A declaration file is not valid JSON.
    #[error("declarations are not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl From<WireError> for SchemaError {
    fn from(source: WireError) -> Self {
        SchemaError::Wire {
            field: String::new(),
            source,
        }
    }
}

impl SchemaError {
    /// Prefix the field path of a codec error with an enclosing field.
    pub(crate) fn in_field(self, segment: &str) -> Self {
        match self {
            SchemaError::Wire { field, source } => SchemaError::Wire {
                field: join_path(segment, &field),
                source,
            },
            SchemaError::ArgumentTypeMismatch {
                field,
                expected,
                found,
            } => SchemaError::ArgumentTypeMismatch {
                field: join_path(segment, &field),
                expected,
                found,
            },
            other => other,
        }
    }
}

fn join_path(outer: &str, inner: &str) -> String {
    if inner.is_empty() {
        outer.to_string()
    } else if inner.starts_with('[') {
        format!("{outer}{inner}")
    } else {
        format!("{outer}.{inner}")
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;
