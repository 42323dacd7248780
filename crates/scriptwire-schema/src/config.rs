/// Limits applied when loading declaration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaLoadConfig {
    /// Maximum bytes read from a declaration file.
    pub max_file_size: usize,
    /// Maximum number of type and packet declarations per file.
    pub max_declarations: usize,
}

impl Default for SchemaLoadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 256 * 1024,
            max_declarations: 256,
        }
    }
}
