//! Theme rewriting between the three stylesheet representations.
//!
//! ## Representations
//!
//! | Form | Example | Produced by |
//! |------|---------|-------------|
//! | Variable reference | `color: $brand-color;` | the author |
//! | Field literal | `color: ____brand-color____;` | [`ThemeSource::to_field_literals`], [`ThemeRewriter::vars_to_field_literals`] |
//! | Literal value | `color: #ff0000;` | [`ThemeRewriter::field_literals_to_values`] |
//! | Template interpolation | `color: <%= brand_color %>;` | [`ThemeRewriter::field_literals_to_interpolations`] |
//!
//! Field literals are plain identifiers, so they pass through a stylesheet
//! engine untouched and can be replaced in the rendered CSS afterwards.
//!
//! ## Two ways in
//!
//! [`ThemeRewriter::load_source`] scans the source into a [`SyntaxTree`] and
//! rewrites only real references (declarations and parameter defaults are
//! left alone). When the scan fails, [`ThemeRewriter::vars_to_field_literals`]
//! is the regex fallback: it does the same substitution without any
//! structural understanding of the source.
//!
//! ```rust
//! use thematic_render::{RewriterOptions, ThemeFields, ThemeRewriter};
//!
//! let rewriter = ThemeRewriter::new(
//!     ThemeFields::new().with("brand-color", "#ff0000"),
//!     RewriterOptions::default(),
//! );
//!
//! let literals = rewriter
//!     .load_source(".a { color: $brand-color; }")
//!     .unwrap()
//!     .to_field_literals();
//! assert_eq!(literals.contents, ".a { color: ____brand-color____; }");
//! assert_eq!(literals.usage.get("brand-color"), Some(&1));
//!
//! assert_eq!(
//!     rewriter.field_literals_to_values(&literals.contents),
//!     ".a { color: #ff0000; }"
//! );
//! assert_eq!(
//!     rewriter.field_literals_to_interpolations(&literals.contents),
//!     ".a { color: <%= brand_color %>; }"
//! );
//! ```

pub mod scanner;

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::theme::ThemeFields;

pub use scanner::{SyntaxTree, Token, TokenKind};

/// Delimiter written on both sides of a field name in field-literal form.
pub const FIELD_DELIMITER: &str = "____";

static FIELD_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"____([A-Za-z_][A-Za-z0-9_-]*?)____").expect("valid field literal pattern")
});

static VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$([A-Za-z_][A-Za-z0-9_-]*)(\s*:)?").expect("valid variable pattern")
});

/// Returns the field-literal token for a field name.
pub fn field_literal(name: &str) -> String {
    format!("{FIELD_DELIMITER}{name}{FIELD_DELIMITER}")
}

/// Per-field reference counts, ordered by field name.
pub type FieldUsage = BTreeMap<String, usize>;

/// Output of a source rewrite: the rewritten text and how often each theme
/// field was referenced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRewrite {
    pub contents: String,
    pub usage: FieldUsage,
}

/// How template placeholders are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriterOptions {
    /// Text placed before the field name, e.g. `<%= `.
    pub template_open: String,
    /// Text placed after the field name, e.g. ` %>`.
    pub template_close: String,
    /// Convert `brand-color` to `brand_color` inside placeholders.
    pub snake_case: bool,
}

impl Default for RewriterOptions {
    fn default() -> Self {
        Self {
            template_open: "<%= ".to_string(),
            template_close: " %>".to_string(),
            snake_case: true,
        }
    }
}

/// Builds the field-literal matcher for a field table.
///
/// Known names come first, longest first, so a name ending in `_` (such as
/// `space_` in `____space_____`) is not cut short by the generic pattern.
/// Unknown names still match through the generic alternative.
fn literal_pattern(fields: &ThemeFields) -> Regex {
    let mut names: Vec<&str> = fields.iter().map(|(name, _)| name).collect();
    if names.is_empty() {
        return FIELD_LITERAL.clone();
    }
    names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    let known = names
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!("____({known})____|{}", FIELD_LITERAL.as_str());
    Regex::new(&pattern).unwrap_or_else(|_| FIELD_LITERAL.clone())
}

/// The field name of a literal matched by [`literal_pattern`].
fn literal_name<'c>(caps: &Captures<'c>) -> &'c str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default()
}

/// Rewrites stylesheet text between theme representations.
#[derive(Debug, Clone)]
pub struct ThemeRewriter {
    fields: ThemeFields,
    options: RewriterOptions,
    literal: Regex,
}

impl ThemeRewriter {
    pub fn new(fields: ThemeFields, options: RewriterOptions) -> Self {
        let literal = literal_pattern(&fields);
        Self {
            fields,
            options,
            literal,
        }
    }

    pub fn fields(&self) -> &ThemeFields {
        &self.fields
    }

    pub fn options(&self) -> &RewriterOptions {
        &self.options
    }

    /// Scans `source` into a syntax tree bound to this rewriter's fields.
    pub fn load_source<'s>(&self, source: &'s str) -> Result<ThemeSource<'s, '_>, ParseError> {
        Ok(ThemeSource {
            tree: SyntaxTree::parse(source)?,
            fields: &self.fields,
        })
    }

    /// Regex fallback: replaces `$field` references with field literals.
    ///
    /// Anything that looks like `$field:` is treated as a declaration and
    /// left alone. Strings and comments are not understood.
    pub fn vars_to_field_literals(&self, source: &str) -> FieldRewrite {
        let mut usage = FieldUsage::new();
        let contents = VARIABLE.replace_all(source, |caps: &Captures<'_>| {
            let name = &caps[1];
            if caps.get(2).is_some() || !self.fields.contains(name) {
                return caps[0].to_string();
            }
            *usage.entry(name.to_string()).or_insert(0) += 1;
            field_literal(name)
        });
        FieldRewrite {
            contents: contents.into_owned(),
            usage,
        }
    }

    /// Replaces every field literal with a template placeholder.
    pub fn field_literals_to_interpolations(&self, css: &str) -> String {
        self.literal
            .replace_all(css, |caps: &Captures<'_>| self.interpolation(literal_name(caps)))
            .into_owned()
    }

    /// Replaces every field literal of a known field with its value.
    ///
    /// Literals naming unknown fields are left in place.
    pub fn field_literals_to_values(&self, css: &str) -> String {
        self.literal
            .replace_all(css, |caps: &Captures<'_>| match self.fields.get(literal_name(caps)) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// The template placeholder for a field name.
    pub fn interpolation(&self, name: &str) -> String {
        let name = if self.options.snake_case {
            name.replace('-', "_")
        } else {
            name.to_string()
        };
        format!(
            "{}{}{}",
            self.options.template_open, name, self.options.template_close
        )
    }
}

/// A scanned source ready to be rewritten into field-literal form.
#[derive(Debug, Clone)]
pub struct ThemeSource<'s, 'r> {
    tree: SyntaxTree<'s>,
    fields: &'r ThemeFields,
}

impl<'s, 'r> ThemeSource<'s, 'r> {
    pub fn tree(&self) -> &SyntaxTree<'s> {
        &self.tree
    }

    /// Rewrites theme-field references into field literals, keeping every
    /// declaration in place.
    pub fn to_field_literals(&self) -> FieldRewrite {
        let mut out = String::with_capacity(self.tree.source().len());
        let mut usage = FieldUsage::new();
        for token in self.tree.tokens() {
            self.push_token(token, &mut out, &mut usage);
        }
        FieldRewrite {
            contents: out,
            usage,
        }
    }

    /// Rewrites references like [`to_field_literals`](Self::to_field_literals)
    /// and also removes the root-level declarations of theme fields.
    ///
    /// Fails when a theme field is declared inside a block, since a scoped
    /// override cannot be expressed in the template output.
    pub fn without_theme_declarations(&self) -> Result<FieldRewrite, ParseError> {
        let source = self.tree.source();
        let tokens = self.tree.tokens();
        let mut out = String::with_capacity(source.len());
        let mut usage = FieldUsage::new();

        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            let theme_declaration = token.declaration
                && token.statement_start
                && token
                    .variable_name()
                    .map(|name| self.fields.contains(name))
                    .unwrap_or(false);

            if !theme_declaration {
                self.push_token(token, &mut out, &mut usage);
                i += 1;
                continue;
            }

            if token.depth > 0 {
                return Err(ParseError::at(
                    source,
                    token.offset,
                    format!(
                        "theme field {} cannot be declared inside a block",
                        token.text
                    ),
                ));
            }

            let end = self.tree.statement_end(i).ok_or_else(|| {
                ParseError::at(
                    source,
                    token.offset,
                    format!("unterminated declaration of theme field {}", token.text),
                )
            })?;
            i = end + 1;
        }

        Ok(FieldRewrite {
            contents: out,
            usage,
        })
    }

    fn push_token(&self, token: &Token<'_>, out: &mut String, usage: &mut FieldUsage) {
        match token.variable_name() {
            Some(name) if !token.declaration && self.fields.contains(name) => {
                *usage.entry(name.to_string()).or_insert(0) += 1;
                out.push_str(&field_literal(name));
            }
            _ => out.push_str(token.text),
        }
    }
}
