//! Token-level syntax tree for stylesheet sources.
//!
//! This is not a full stylesheet parser. It splits source text into the few
//! token kinds the rewriter and the flat engine care about (variables,
//! strings, comments, braces, semicolons and everything else as text) and
//! checks that strings, comments, `url(...)` and blocks are well formed.
//!
//! Concatenating the `text` of every token reproduces the source exactly.

use crate::error::ParseError;

/// Kind of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Anything that is not one of the other kinds.
    Text,
    /// `/* ... */`
    Comment,
    /// `// ...` up to (not including) the newline.
    LineComment,
    /// A single- or double-quoted string, quotes included.
    Str,
    /// `$name`
    Variable,
    /// `{`
    Open,
    /// `#{`
    Interpolation,
    /// `}`
    Close,
    /// `;`
    Semicolon,
}

/// A scanned token with its position and structural context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// The exact source slice of this token.
    pub text: &'a str,
    /// Byte offset of the token in the source.
    pub offset: usize,
    /// Block depth at this token. Opening tokens report the depth outside
    /// the block they open, closing tokens the depth after closing.
    pub depth: usize,
    /// True when only whitespace or comments separate this token from the
    /// start of the source or the previous `{`, `}` or `;`.
    pub statement_start: bool,
    /// For variables: the name is followed by `:` (a declaration or a
    /// parameter default), so it is not a reference.
    pub declaration: bool,
}

impl<'a> Token<'a> {
    /// Returns the variable name without `$`, for variable tokens.
    pub fn variable_name(&self) -> Option<&'a str> {
        match self.kind {
            TokenKind::Variable => Some(&self.text[1..]),
            _ => None,
        }
    }

    /// True for whitespace-only text, comments and line comments.
    pub fn is_trivia(&self) -> bool {
        match self.kind {
            TokenKind::Comment | TokenKind::LineComment => true,
            TokenKind::Text => self.text.trim().is_empty(),
            _ => false,
        }
    }
}

/// A scanned stylesheet source.
#[derive(Debug, Clone)]
pub struct SyntaxTree<'a> {
    source: &'a str,
    tokens: Vec<Token<'a>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Block,
    Interpolation,
}

impl<'a> SyntaxTree<'a> {
    /// Scans `source`, failing on unterminated strings, comments or `url(`,
    /// or unbalanced braces. A `$` not followed by a name (as in `[href$=x]`)
    /// is plain text.
    pub fn parse(source: &'a str) -> Result<Self, ParseError> {
        let mut tokens = Vec::new();
        let mut stack: Vec<(Frame, usize)> = Vec::new();
        let mut statement_start = true;
        let mut pos = 0;

        while pos < source.len() {
            let rest = &source[pos..];
            let depth = stack.len();

            let (kind, end) = if rest.starts_with("/*") {
                match rest[2..].find("*/") {
                    Some(i) => (TokenKind::Comment, pos + 2 + i + 2),
                    None => return Err(ParseError::at(source, pos, "unterminated comment")),
                }
            } else if rest.starts_with("//") {
                let end = rest.find('\n').map(|i| pos + i).unwrap_or(source.len());
                (TokenKind::LineComment, end)
            } else if rest.starts_with(['"', '\'']) {
                (TokenKind::Str, scan_string(source, pos)?)
            } else if rest.starts_with("#{") {
                (TokenKind::Interpolation, pos + 2)
            } else if starts_variable(rest) {
                (TokenKind::Variable, pos + 1 + ident_len(&rest[1..]))
            } else if rest.starts_with('{') {
                (TokenKind::Open, pos + 1)
            } else if rest.starts_with('}') {
                (TokenKind::Close, pos + 1)
            } else if rest.starts_with(';') {
                (TokenKind::Semicolon, pos + 1)
            } else if starts_unquoted_url(rest) {
                match rest.find(')') {
                    Some(i) => (TokenKind::Text, pos + i + 1),
                    None => return Err(ParseError::at(source, pos, "unterminated url()")),
                }
            } else {
                (TokenKind::Text, scan_text(source, pos))
            };

            let text = &source[pos..end];
            let in_interpolation = stack
                .last()
                .map(|(frame, _)| *frame == Frame::Interpolation)
                .unwrap_or(false);
            let declaration = kind == TokenKind::Variable
                && !in_interpolation
                && source[end..].trim_start().starts_with(':');

            let mut closed = None;
            let token_depth = match kind {
                TokenKind::Open => {
                    stack.push((Frame::Block, pos));
                    depth
                }
                TokenKind::Interpolation => {
                    stack.push((Frame::Interpolation, pos));
                    depth
                }
                TokenKind::Close => match stack.pop() {
                    Some((frame, _)) => {
                        closed = Some(frame);
                        depth - 1
                    }
                    None => return Err(ParseError::at(source, pos, "unmatched '}'")),
                },
                _ => depth,
            };

            let token = Token {
                kind,
                text,
                offset: pos,
                depth: token_depth,
                statement_start,
                declaration,
            };

            statement_start = match kind {
                TokenKind::Open | TokenKind::Semicolon => true,
                TokenKind::Close => closed != Some(Frame::Interpolation),
                TokenKind::Interpolation => false,
                _ if token.is_trivia() => statement_start,
                _ => false,
            };

            tokens.push(token);
            pos = end;
        }

        if let Some((_, offset)) = stack.last() {
            return Err(ParseError::at(source, *offset, "unclosed block"));
        }

        Ok(Self { source, tokens })
    }

    /// The scanned source.
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// All tokens in source order.
    pub fn tokens(&self) -> &[Token<'a>] {
        &self.tokens
    }

    /// Finds the `;` that ends the statement containing token `index`.
    ///
    /// Nested blocks and interpolations are skipped. Returns `None` when the
    /// enclosing block closes (or the source ends) first.
    pub fn statement_end(&self, index: usize) -> Option<usize> {
        let mut nesting = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(index + 1) {
            match token.kind {
                TokenKind::Open | TokenKind::Interpolation => nesting += 1,
                TokenKind::Close => {
                    if nesting == 0 {
                        return None;
                    }
                    nesting -= 1;
                }
                TokenKind::Semicolon if nesting == 0 => return Some(i),
                _ => {}
            }
        }
        None
    }
}

/// Length in bytes of the identifier at the start of `s`.
fn ident_len(s: &str) -> usize {
    let mut len = 0;
    for (i, c) in s.char_indices() {
        let valid = if i == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_' || c == '-'
        };
        if !valid {
            break;
        }
        len = i + c.len_utf8();
    }
    len
}

fn starts_variable(rest: &str) -> bool {
    rest.starts_with('$') && ident_len(&rest[1..]) > 0
}

fn scan_string(source: &str, start: usize) -> Result<usize, ParseError> {
    let mut chars = source[start..].char_indices();
    let quote = match chars.next() {
        Some((_, q)) => q,
        None => return Err(ParseError::at(source, start, "unterminated string")),
    };
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '\n' => return Err(ParseError::at(source, start, "unterminated string")),
            c if c == quote => return Ok(start + i + c.len_utf8()),
            _ => {}
        }
    }
    Err(ParseError::at(source, start, "unterminated string"))
}

fn starts_unquoted_url(rest: &str) -> bool {
    match rest.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("url(") => {
            !rest[4..].trim_start().starts_with(['"', '\''])
        }
        _ => false,
    }
}

fn is_token_start(rest: &str) -> bool {
    rest.starts_with("/*")
        || rest.starts_with("//")
        || rest.starts_with("#{")
        || rest.starts_with(['"', '\'', '{', '}', ';'])
        || starts_variable(rest)
        || starts_unquoted_url(rest)
}

fn scan_text(source: &str, start: usize) -> usize {
    for (i, _) in source[start..].char_indices().skip(1) {
        if is_token_start(&source[start + i..]) {
            return start + i;
        }
    }
    source.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        SyntaxTree::parse(src)
            .unwrap()
            .tokens()
            .iter()
            .map(|t| t.kind)
            .collect()
    }

    // =========================================================================
    // Tokenizing
    // =========================================================================

    #[test]
    fn test_tokens_reproduce_source() {
        let src = "// header\n$a: 1px; /* c */ .x { margin: $a \"s;t\" url(http://x/y); }\n";
        let tree = SyntaxTree::parse(src).unwrap();
        let joined: String = tree.tokens().iter().map(|t| t.text).collect();
        assert_eq!(joined, src);
    }

    #[test]
    fn test_simple_rule_kinds() {
        assert_eq!(
            kinds(".a { color: $c; }"),
            vec![
                TokenKind::Text,
                TokenKind::Open,
                TokenKind::Text,
                TokenKind::Variable,
                TokenKind::Semicolon,
                TokenKind::Text,
                TokenKind::Close,
            ]
        );
    }

    #[test]
    fn test_unquoted_url_is_one_text_token() {
        let tree = SyntaxTree::parse("a { b: url(//cdn/x.png); }").unwrap();
        assert!(tree
            .tokens()
            .iter()
            .any(|t| t.kind == TokenKind::Text && t.text == "url(//cdn/x.png)"));
        assert!(!tree.tokens().iter().any(|t| t.kind == TokenKind::LineComment));
    }

    #[test]
    fn test_declaration_flags() {
        let tree = SyntaxTree::parse("$a : 1;\n.x { y: $a; }").unwrap();
        let vars: Vec<_> = tree
            .tokens()
            .iter()
            .filter(|t| t.kind == TokenKind::Variable)
            .collect();
        assert!(vars[0].declaration);
        assert!(vars[0].statement_start);
        assert!(!vars[1].declaration);
        assert!(!vars[1].statement_start);
    }

    #[test]
    fn test_depth_tracking() {
        let tree = SyntaxTree::parse(".a { .b { $x: 1; } }").unwrap();
        let var = tree
            .tokens()
            .iter()
            .find(|t| t.kind == TokenKind::Variable)
            .unwrap();
        assert_eq!(var.depth, 2);
        assert!(var.statement_start);
    }

    #[test]
    fn test_interpolation_close_does_not_start_statement() {
        let tree = SyntaxTree::parse(".a-#{$n} $b { }").unwrap();
        let vars: Vec<_> = tree
            .tokens()
            .iter()
            .filter(|t| t.kind == TokenKind::Variable)
            .collect();
        assert!(!vars[1].statement_start);
    }

    #[test]
    fn test_statement_end_skips_nested() {
        let tree = SyntaxTree::parse("$m: map-get((a: #{1}), a); x").unwrap();
        let end = tree.statement_end(0).unwrap();
        assert_eq!(tree.tokens()[end].kind, TokenKind::Semicolon);
        assert_eq!(tree.tokens()[end].offset, "$m: map-get((a: #{1}), a)".len());
    }

    #[test]
    fn test_statement_end_none_when_block_closes() {
        let tree = SyntaxTree::parse(".a { $x: 1 }").unwrap();
        let idx = tree
            .tokens()
            .iter()
            .position(|t| t.kind == TokenKind::Variable)
            .unwrap();
        assert_eq!(tree.statement_end(idx), None);
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn test_unclosed_block_reports_opener() {
        let err = SyntaxTree::parse("a {\n  b {\n}").unwrap_err();
        assert_eq!((err.line, err.column), (1, 3));
    }

    #[test]
    fn test_unmatched_close() {
        let err = SyntaxTree::parse("a { }\n}").unwrap_err();
        assert_eq!(err.message, "unmatched '}'");
        assert_eq!((err.line, err.column), (2, 1));
    }

    #[test]
    fn test_unterminated_string() {
        let err = SyntaxTree::parse("a { content: \"oops\n}").unwrap_err();
        assert_eq!(err.message, "unterminated string");
    }

    #[test]
    fn test_unterminated_comment() {
        assert!(SyntaxTree::parse("/* never closed").is_err());
    }

    #[test]
    fn test_unquoted_url_without_close() {
        let err = SyntaxTree::parse("a { b: url(x.png; }").unwrap_err();
        assert_eq!(err.message, "unterminated url()");
        assert_eq!(err.column, 8);
    }

    // =========================================================================
    // Dollar signs that are not variables
    // =========================================================================

    #[test]
    fn test_attribute_suffix_selector_is_text() {
        let src = "a[href$=\".pdf\"] { color: $c; }";
        let tree = SyntaxTree::parse(src).unwrap();
        let tokens = tree.tokens();
        assert_eq!(tokens[0].kind, TokenKind::Text);
        assert_eq!(tokens[0].text, "a[href$=");
        assert_eq!(tokens[1].kind, TokenKind::Str);
        let vars: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Variable)
            .map(|t| t.text)
            .collect();
        assert_eq!(vars, vec!["$c"]);
    }

    #[test]
    fn test_lone_dollar_is_text() {
        let src = "a { b: $ ; c: $1; }";
        let tree = SyntaxTree::parse(src).unwrap();
        assert!(!tree.tokens().iter().any(|t| t.kind == TokenKind::Variable));
        let joined: String = tree.tokens().iter().map(|t| t.text).collect();
        assert_eq!(joined, src);
    }
}
