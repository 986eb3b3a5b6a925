//! The table of themed fields and their concrete values.
//!
//! Fields can be declared programmatically, loaded from a stylesheet whose
//! root-level `$name: value;` declarations define them, or loaded from a YAML
//! map.
//!
//! ```rust
//! use thematic_render::ThemeFields;
//!
//! let fields = ThemeFields::from_scss(r#"
//! $brand-color: #ff0000 !default;
//! $link-color: $brand-color;
//! "#).unwrap();
//!
//! assert_eq!(fields.get("link-color"), Some("#ff0000"));
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ParseError;
use crate::rewriter::scanner::{SyntaxTree, TokenKind};

static VALUE_FLAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\s*!(default|global))+\s*$").expect("valid flag pattern"));

/// Errors raised while loading theme fields.
#[derive(Debug, thiserror::Error)]
pub enum FieldsError {
    #[error("Failed to read theme fields from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse theme fields in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("Invalid theme field map: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Named theme fields with their concrete values, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ThemeFields {
    values: BTreeMap<String, String>,
}

impl ThemeFields {
    /// Creates an empty field table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, returning `self` for chaining.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds or replaces a field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Copies every field of `other` into this table, replacing duplicates.
    pub fn merge(&mut self, other: &ThemeFields) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Reads root-level variable declarations from stylesheet source.
    ///
    /// `!default` declarations do not override an earlier value, `!global`
    /// is ignored, and references to previously declared fields inside a
    /// value are substituted. Declarations inside blocks are not fields.
    pub fn from_scss(source: &str) -> Result<Self, ParseError> {
        let tree = SyntaxTree::parse(source)?;
        let tokens = tree.tokens();
        let mut fields = ThemeFields::new();

        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            let name = match token.variable_name() {
                Some(name) if token.declaration && token.statement_start && token.depth == 0 => {
                    name
                }
                _ => {
                    i += 1;
                    continue;
                }
            };

            let end = tree.statement_end(i).ok_or_else(|| {
                ParseError::at(
                    source,
                    token.offset,
                    format!("unterminated declaration of ${}", name),
                )
            })?;

            let mut value = String::new();
            for part in &tokens[i + 1..end] {
                match part.kind {
                    TokenKind::Comment | TokenKind::LineComment => {}
                    TokenKind::Variable => {
                        let referenced = part.variable_name().unwrap_or_default();
                        match fields.get(referenced) {
                            Some(v) => value.push_str(v),
                            None => value.push_str(part.text),
                        }
                    }
                    _ => value.push_str(part.text),
                }
            }

            let value = value.trim_start().trim_start_matches(':').trim();
            let is_default = value.contains("!default");
            let value = VALUE_FLAGS.replace(value, "").trim().to_string();

            if !(is_default && fields.contains(name)) {
                fields.insert(name, value);
            }
            i = end + 1;
        }

        Ok(fields)
    }

    /// Parses a YAML map of field names to scalar values.
    ///
    /// Values must be quoted when they start with `#`, since YAML treats an
    /// unquoted `#` as a comment.
    pub fn from_yaml(yaml: &str) -> Result<Self, FieldsError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Loads fields from a file: `.yaml`/`.yml` files as YAML, anything else
    /// as stylesheet source.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FieldsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| FieldsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_scss(&content).map_err(|source| FieldsError::Parse {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Scalar values accepted in field maps.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

impl ScalarValue {
    fn into_string(self) -> String {
        match self {
            ScalarValue::Text(s) => s,
            ScalarValue::Integer(n) => n.to_string(),
            ScalarValue::Float(n) => n.to_string(),
            ScalarValue::Flag(b) => b.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for ThemeFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, ScalarValue>::deserialize(deserializer)?;
        Ok(Self {
            values: raw
                .into_iter()
                .map(|(name, value)| (name, value.into_string()))
                .collect(),
        })
    }
}
