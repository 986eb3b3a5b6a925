//! A minimal, dependency-free stylesheet engine.
//!
//! [`FlatEngine`] understands exactly three things:
//!
//! - `@import "a", "b";` statements, inlined through the [`Importer`]
//!   (imports of `.css` files, `url(...)` and remote URLs are kept as-is)
//! - `$variable: value;` declarations (with `!default`), in one flat scope
//! - `$variable` references, replaced by their declared values
//!
//! Everything else, nesting included, passes through unchanged. Line comments
//! are always dropped; block comments are dropped in compressed output unless
//! they start with `/*!` or `/*#`.

use std::collections::HashMap;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Importer, OutputStyle, RenderOptions, Rendered, StyleEngine};
use crate::error::EngineError;
use crate::rewriter::scanner::{SyntaxTree, Token, TokenKind};

/// Imports nested deeper than this are treated as a cycle.
pub const MAX_IMPORT_DEPTH: usize = 64;

static VALUE_FLAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\s*!(default|global))+\s*$").expect("valid flag pattern"));

/// Import-inlining, variable-substituting engine. See the module docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatEngine;

impl FlatEngine {
    pub fn new() -> Self {
        Self
    }
}

impl StyleEngine for FlatEngine {
    fn render(
        &self,
        options: &RenderOptions,
        importer: &mut dyn Importer,
    ) -> Result<Rendered, EngineError> {
        let mut state = FlatState {
            importer,
            variables: HashMap::new(),
            included: Vec::new(),
        };
        let body = state.expand(&options.data, "stdin", &options.file, 0)?;
        let css = match options.output_style {
            OutputStyle::Expanded => tidy(&body),
            OutputStyle::Compressed => compress(&body),
        };
        Ok(Rendered {
            css,
            source_map: None,
            included_files: state.included,
        })
    }
}

struct FlatState<'i> {
    importer: &'i mut dyn Importer,
    variables: HashMap<String, String>,
    included: Vec<PathBuf>,
}

impl<'i> FlatState<'i> {
    fn expand(
        &mut self,
        source: &str,
        context: &str,
        file: &Path,
        depth: usize,
    ) -> Result<String, EngineError> {
        let tree = SyntaxTree::parse(source)
            .map_err(|e| EngineError::from_parse(e, Some(file.to_path_buf()), source))?;
        let tokens = tree.tokens();
        let fail = |message: String, offset: usize| {
            EngineError::new(message)
                .at(source, offset)
                .in_file(Some(file.to_path_buf()))
        };

        let mut out = String::with_capacity(source.len());
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            match token.kind {
                TokenKind::LineComment => i += 1,
                TokenKind::Variable if token.declaration && token.statement_start => {
                    let end = tree.statement_end(i).ok_or_else(|| {
                        fail(
                            format!("expected ';' after declaration of {}", token.text),
                            token.offset,
                        )
                    })?;
                    let raw = self.substitute(&tokens[i + 1..end], source, file)?;
                    let value = raw.trim_start().trim_start_matches(':').trim();
                    let is_default = value.contains("!default");
                    let value = VALUE_FLAGS.replace(value, "").trim().to_string();
                    let name = token.variable_name().unwrap_or_default().to_string();
                    if !(is_default && self.variables.contains_key(&name)) {
                        self.variables.insert(name, value);
                    }
                    i = end + 1;
                }
                TokenKind::Variable if token.declaration => {
                    out.push_str(token.text);
                    i += 1;
                }
                TokenKind::Variable => {
                    let name = token.variable_name().unwrap_or_default();
                    match self.variables.get(name) {
                        Some(value) => out.push_str(value),
                        None => {
                            return Err(fail(
                                format!("Undefined variable: {}", token.text),
                                token.offset,
                            ))
                        }
                    }
                    i += 1;
                }
                TokenKind::Text
                    if token.statement_start && token.text.trim_start().starts_with("@import") =>
                {
                    let end = tree.statement_end(i).ok_or_else(|| {
                        fail("expected ';' after @import".to_string(), token.offset)
                    })?;
                    for url in import_urls(&tokens[i..end]) {
                        if is_plain_css(&url) {
                            out.push_str(&format!("@import {};\n", quote_plain(&url)));
                            continue;
                        }
                        if depth + 1 > MAX_IMPORT_DEPTH {
                            return Err(fail(
                                format!("import of \"{}\" nests too deeply (cycle?)", url),
                                token.offset,
                            ));
                        }
                        let imported = self
                            .importer
                            .import(&url, context)
                            .map_err(|e| fail(e.message, token.offset))?;
                        if !self.included.contains(&imported.file) {
                            self.included.push(imported.file.clone());
                        }
                        tracing::trace!(url = %url, file = %imported.file.display(), depth, "inlining import");
                        let nested_context = imported.file.to_string_lossy().into_owned();
                        let body = self.expand(
                            &imported.contents,
                            &nested_context,
                            &imported.file,
                            depth + 1,
                        )?;
                        out.push_str(&body);
                        out.push('\n');
                    }
                    i = end + 1;
                }
                _ => {
                    out.push_str(token.text);
                    i += 1;
                }
            }
        }
        Ok(out)
    }

    /// Concatenates tokens, replacing variable references with their values.
    fn substitute(
        &self,
        tokens: &[Token<'_>],
        source: &str,
        file: &Path,
    ) -> Result<String, EngineError> {
        let mut out = String::new();
        for token in tokens {
            match token.kind {
                TokenKind::Comment | TokenKind::LineComment => {}
                TokenKind::Variable if !token.declaration => {
                    let name = token.variable_name().unwrap_or_default();
                    match self.variables.get(name) {
                        Some(value) => out.push_str(value),
                        None => {
                            return Err(EngineError::new(format!(
                                "Undefined variable: {}",
                                token.text
                            ))
                            .at(source, token.offset)
                            .in_file(Some(file.to_path_buf())))
                        }
                    }
                }
                _ => out.push_str(token.text),
            }
        }
        Ok(out)
    }
}

/// Extracts the import URLs of an `@import` statement (without its `;`).
fn import_urls(tokens: &[Token<'_>]) -> Vec<String> {
    let mut urls = Vec::new();
    // Inside `url("...")`, which scans as text, string, text.
    let mut in_url = false;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Str if in_url => {
                urls.push(format!("url({})", token.text));
                in_url = false;
            }
            TokenKind::Str => {
                let inner = &token.text[1..token.text.len() - 1];
                urls.push(inner.to_string());
            }
            TokenKind::Text => {
                let text = if i == 0 {
                    token.text.trim_start().trim_start_matches("@import")
                } else {
                    token.text
                };
                for part in text.split(',').map(str::trim) {
                    if part.is_empty() || part == ")" {
                        continue;
                    }
                    if part.eq_ignore_ascii_case("url(") {
                        in_url = true;
                        continue;
                    }
                    urls.push(part.to_string());
                }
            }
            _ => {}
        }
    }
    urls
}

fn is_plain_css(url: &str) -> bool {
    url.ends_with(".css")
        || url.starts_with("http://")
        || url.starts_with("https://")
        || url.starts_with("//")
        || url.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("url("))
}

fn quote_plain(url: &str) -> String {
    if url.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("url(")) {
        url.to_string()
    } else {
        format!("\"{}\"", url)
    }
}

/// Drops blank lines and trailing whitespace.
fn tidy(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    for line in css.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Whether the statement ahead opens a block, making it a selector.
fn in_selector(rest: &Peekable<Chars<'_>>) -> bool {
    rest.clone().find(|c| matches!(c, '{' | ';' | '}')) == Some('{')
}

/// Removes insignificant whitespace and ordinary comments.
fn compress(css: &str) -> String {
    const PUNCT: [char; 6] = ['{', '}', ';', ',', ':', '>'];

    let mut out = String::with_capacity(css.len());
    let mut chars = css.chars().peekable();
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                if pending_space && !out.is_empty() && !out.ends_with(PUNCT) {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
                while let Some(s) = chars.next() {
                    out.push(s);
                    if s == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if s == c {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut body = String::new();
                let mut prev = '\0';
                for s in chars.by_ref() {
                    if prev == '*' && s == '/' {
                        body.pop();
                        break;
                    }
                    body.push(s);
                    prev = s;
                }
                if body.starts_with('!') || body.starts_with('#') {
                    out.push_str("/*");
                    out.push_str(&body);
                    out.push_str("*/");
                }
            }
            c if c.is_whitespace() => pending_space = true,
            // `.nav :hover` keeps its descendant combinator; `color : red` does not.
            ':' if pending_space && !out.is_empty() && !out.ends_with(PUNCT) => {
                pending_space = false;
                if in_selector(&chars) {
                    out.push(' ');
                }
                out.push(':');
            }
            c if PUNCT.contains(&c) => {
                pending_space = false;
                if c == '}' && out.ends_with(';') {
                    out.pop();
                }
                out.push(c);
            }
            _ => {
                if pending_space && !out.is_empty() && !out.ends_with(PUNCT) {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
            }
        }
    }
    out
}
