//! Function signature extraction from unit source text.
//!
//! A unit exports its top-level synchronous `function name(...)` declarations.
//! The binder needs each declared parameter's name, whether it has a default,
//! and a type hint when the default is a plain literal. The engine does not
//! expose parameter lists, so the scanner walks the source once, tracking
//! brace depth and skipping strings, template literals, comments, and regex
//! literals, and records the head of every depth-zero declaration.
//!
//! Parameter forms understood: `name`, `name = <expr>`, and a final catch-all
//! written `...name` or `{ ...name }` (optionally with an `= {}` default).
//! A function using any other parameter pattern, a generator, or an `async`
//! function is simply not exported. Names resolved at call time still go
//! through a callability check, so an over-eager match here can never invoke
//! a non-function.

use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Number,
    Boolean,
    String,
    Array,
    Object,
}

impl TypeTag {
    pub fn of(value: &JsonValue) -> Option<TypeTag> {
        match value {
            JsonValue::Null => None,
            JsonValue::Bool(_) => Some(TypeTag::Boolean),
            JsonValue::Number(_) => Some(TypeTag::Number),
            JsonValue::String(_) => Some(TypeTag::String),
            JsonValue::Array(_) => Some(TypeTag::Array),
            JsonValue::Object(_) => Some(TypeTag::Object),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Number => "number",
            TypeTag::Boolean => "boolean",
            TypeTag::String => "string",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// A plain literal default; doubles as the parameter's type hint.
    Literal(JsonValue),
    /// Any other default expression. The engine evaluates it when the
    /// argument slot is left undefined; it carries no type information.
    Expression(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<DefaultValue>,
}

impl Param {
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    pub fn type_tag(&self) -> Option<TypeTag> {
        match &self.default {
            Some(DefaultValue::Literal(value)) => TypeTag::of(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<Param>,
    /// Name of the trailing catch-all parameter, when declared. Unmatched
    /// request entries are aggregated into one object passed in its position.
    pub catch_all: Option<String>,
}

/// Scan `source` and return the signatures of its exported functions, in
/// declaration order.
pub fn scan_signatures(source: &str) -> Vec<FunctionSignature> {
    Scanner::new(source).run()
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
    depth: i32,
    prev_byte: Option<u8>,
    prev_word: Option<&'a str>,
    signatures: Vec<FunctionSignature>,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            src: source.as_bytes(),
            pos: 0,
            depth: 0,
            prev_byte: None,
            prev_word: None,
            signatures: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<FunctionSignature> {
        while self.pos < self.src.len() {
            let b = self.src[self.pos];
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment(),
                b'\'' | b'"' => {
                    self.skip_string(b);
                    self.set_prev(b'"', None);
                }
                b'`' => {
                    self.skip_template();
                    self.set_prev(b'"', None);
                }
                b'/' => {
                    if self.regex_position() {
                        self.skip_regex();
                        self.set_prev(b'"', None);
                    } else {
                        self.pos += 1;
                        self.set_prev(b'/', None);
                    }
                }
                b'{' => {
                    self.depth += 1;
                    self.pos += 1;
                    self.set_prev(b'{', None);
                }
                b'}' => {
                    self.depth -= 1;
                    self.pos += 1;
                    self.set_prev(b'}', None);
                }
                _ if is_ident_start(b) => {
                    let word = self.read_word();
                    if word == "function" && self.depth == 0 && self.declaration_position() {
                        self.scan_function_head();
                    }
                    let last = word.as_bytes().last().copied().unwrap_or(b'_');
                    self.set_prev(last, Some(word));
                }
                _ => {
                    self.pos += 1;
                    self.set_prev(b, None);
                }
            }
        }
        self.signatures
    }

    /// A `function` keyword that follows an operator, an opening bracket, or
    /// an expression keyword is a function expression, not a declaration.
    fn declaration_position(&self) -> bool {
        if let Some(word) = self.prev_word {
            if matches!(
                word,
                "async"
                    | "return"
                    | "typeof"
                    | "void"
                    | "delete"
                    | "new"
                    | "in"
                    | "of"
                    | "case"
                    | "yield"
                    | "await"
                    | "else"
                    | "do"
            ) {
                return false;
            }
        }
        match self.prev_byte {
            None => true,
            Some(b) => !matches!(
                b,
                b'=' | b'('
                    | b','
                    | b':'
                    | b'['
                    | b'!'
                    | b'&'
                    | b'|'
                    | b'?'
                    | b'+'
                    | b'-'
                    | b'*'
                    | b'%'
                    | b'<'
                    | b'>'
                    | b'~'
                    | b'^'
            ),
        }
    }

    /// Whether a `/` at the current position starts a regex literal rather
    /// than a division. Misclassified divisions are contained by the
    /// line-bounded regex skip.
    fn regex_position(&self) -> bool {
        if let Some(word) = self.prev_word {
            return matches!(
                word,
                "return"
                    | "typeof"
                    | "case"
                    | "in"
                    | "of"
                    | "new"
                    | "delete"
                    | "void"
                    | "instanceof"
                    | "do"
                    | "else"
                    | "yield"
                    | "await"
            );
        }
        match self.prev_byte {
            None => true,
            Some(b) => matches!(
                b,
                b'=' | b'('
                    | b','
                    | b':'
                    | b'['
                    | b'!'
                    | b'&'
                    | b'|'
                    | b'?'
                    | b'{'
                    | b'}'
                    | b';'
                    | b'+'
                    | b'-'
                    | b'*'
                    | b'%'
                    | b'<'
                    | b'>'
                    | b'~'
                    | b'^'
            ),
        }
    }

    fn scan_function_head(&mut self) {
        self.skip_insignificant();
        if self.peek(0) == Some(b'*') {
            return; // generator
        }
        let name = self.read_word();
        if name.is_empty() {
            return;
        }
        self.skip_insignificant();
        if self.peek(0) != Some(b'(') {
            return;
        }
        self.pos += 1;
        let Some(params_src) = self.collect_params() else {
            return;
        };
        if let Some((params, catch_all)) = parse_params(&params_src) {
            self.signatures.push(FunctionSignature {
                name: name.to_string(),
                params,
                catch_all,
            });
        }
    }

    /// Collect the parameter list text up to the matching `)`, with comments
    /// blanked out and nested brackets/strings kept verbatim.
    fn collect_params(&mut self) -> Option<String> {
        let mut text: Vec<u8> = Vec::new();
        let mut depth = 0i32;
        while self.pos < self.src.len() {
            let b = self.src[self.pos];
            match b {
                b')' if depth == 0 => {
                    self.pos += 1;
                    return Some(String::from_utf8_lossy(&text).into_owned());
                }
                b'(' | b'[' | b'{' => {
                    depth += 1;
                    text.push(b);
                    self.pos += 1;
                }
                b')' | b']' | b'}' => {
                    depth -= 1;
                    text.push(b);
                    self.pos += 1;
                }
                b'\'' | b'"' | b'`' => {
                    let start = self.pos;
                    if b == b'`' {
                        self.skip_template();
                    } else {
                        self.skip_string(b);
                    }
                    text.extend_from_slice(&self.src[start..self.pos]);
                }
                b'/' if self.peek(1) == Some(b'/') => {
                    self.skip_line_comment();
                    text.push(b' ');
                }
                b'/' if self.peek(1) == Some(b'*') => {
                    self.skip_block_comment();
                    text.push(b' ');
                }
                _ => {
                    text.push(b);
                    self.pos += 1;
                }
            }
        }
        None
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn set_prev(&mut self, byte: u8, word: Option<&'a str>) {
        self.prev_byte = Some(byte);
        self.prev_word = word;
    }

    fn read_word(&mut self) -> &'a str {
        let start = self.pos;
        while self.pos < self.src.len() && is_ident_char(self.src[self.pos]) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.src[start..self.pos]).unwrap_or("")
    }

    fn skip_insignificant(&mut self) {
        loop {
            match self.peek(0) {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => self.pos += 1,
                Some(b'/') if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                Some(b'/') if self.peek(1) == Some(b'*') => self.skip_block_comment(),
                _ => return,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while self.pos < self.src.len() {
            if self.src[self.pos] == b'*' && self.peek(1) == Some(b'/') {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    fn skip_string(&mut self, quote: u8) {
        self.pos += 1;
        while self.pos < self.src.len() {
            let b = self.src[self.pos];
            if b == b'\\' {
                self.pos += 2;
                continue;
            }
            self.pos += 1;
            if b == quote {
                return;
            }
        }
    }

    fn skip_template(&mut self) {
        self.pos += 1;
        while self.pos < self.src.len() {
            let b = self.src[self.pos];
            match b {
                b'\\' => self.pos += 2,
                b'`' => {
                    self.pos += 1;
                    return;
                }
                b'$' if self.peek(1) == Some(b'{') => {
                    self.pos += 2;
                    self.skip_template_expr();
                }
                _ => self.pos += 1,
            }
        }
    }

    fn skip_template_expr(&mut self) {
        let mut depth = 1;
        while self.pos < self.src.len() && depth > 0 {
            let b = self.src[self.pos];
            match b {
                b'{' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' => {
                    depth -= 1;
                    self.pos += 1;
                }
                b'\'' | b'"' => self.skip_string(b),
                b'`' => self.skip_template(),
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment(),
                _ => self.pos += 1,
            }
        }
    }

    fn skip_regex(&mut self) {
        self.pos += 1;
        let mut in_class = false;
        while self.pos < self.src.len() {
            let b = self.src[self.pos];
            match b {
                b'\\' => {
                    self.pos += 2;
                    continue;
                }
                b'[' => in_class = true,
                b']' => in_class = false,
                b'/' if !in_class => {
                    self.pos += 1;
                    return;
                }
                // regex literals cannot span lines; bail on misclassification
                b'\n' => return,
                _ => {}
            }
            self.pos += 1;
        }
    }
}

fn parse_params(text: &str) -> Option<(Vec<Param>, Option<String>)> {
    let mut params = Vec::new();
    let mut catch_all = None;
    let pieces = split_top_level(text);

    for (index, piece) in pieces.iter().enumerate() {
        let piece = piece.trim();
        if piece.is_empty() {
            // an empty list, or a trailing comma
            if index == pieces.len() - 1 {
                break;
            }
            return None;
        }
        if catch_all.is_some() {
            return None; // catch-all must be the final parameter
        }
        if let Some(rest) = piece.strip_prefix("...") {
            catch_all = Some(parse_ident(rest.trim())?);
            continue;
        }
        if piece.starts_with('{') {
            catch_all = Some(parse_object_catch_all(piece)?);
            continue;
        }
        let (name, default_src) = split_param(piece)?;
        params.push(Param {
            name,
            default: default_src.map(|src| parse_default(&src)),
        });
    }

    Some((params, catch_all))
}

fn split_top_level(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => pieces.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    pieces.push(current);
    pieces
}

fn split_param(piece: &str) -> Option<(String, Option<String>)> {
    let bytes = piece.as_bytes();
    if bytes.is_empty() || !is_ident_start(bytes[0]) {
        return None;
    }
    let mut end = 0;
    while end < bytes.len() && is_ident_char(bytes[end]) {
        end += 1;
    }
    let name = piece[..end].to_string();
    let rest = piece[end..].trim_start();
    if rest.is_empty() {
        return Some((name, None));
    }
    let rest = rest.strip_prefix('=')?;
    if rest.starts_with('=') || rest.starts_with('>') {
        return None;
    }
    Some((name, Some(rest.trim().to_string())))
}

/// Recognize `{ ...name }`, optionally followed by an `=` default.
fn parse_object_catch_all(piece: &str) -> Option<String> {
    let rest = piece.strip_prefix('{')?;
    let close = find_matching_brace(rest)?;
    let inner = rest[..close].trim();
    let tail = rest[close + 1..].trim();
    if !tail.is_empty() && !tail.starts_with('=') {
        return None;
    }
    parse_ident(inner.strip_prefix("...")?.trim())
}

fn find_matching_brace(text: &str) -> Option<usize> {
    let mut depth = 1;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_ident(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    if bytes.is_empty() || !is_ident_start(bytes[0]) {
        return None;
    }
    if bytes.iter().all(|&b| is_ident_char(b)) {
        Some(text.to_string())
    } else {
        None
    }
}

fn parse_default(src: &str) -> DefaultValue {
    let src = src.trim();
    if let Ok(value) = serde_json::from_str::<JsonValue>(src) {
        return DefaultValue::Literal(value);
    }
    // single-quoted string literals are not JSON; accept the escape-free form
    if src.len() >= 2 && src.starts_with('\'') && src.ends_with('\'') {
        let inner = &src[1..src.len() - 1];
        if !inner.contains('\'') && !inner.contains('\\') {
            return DefaultValue::Literal(JsonValue::String(inner.to_string()));
        }
    }
    DefaultValue::Expression(src.to_string())
}
