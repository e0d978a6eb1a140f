//! Path queries over JSON documents.
//!
//! A path expression extracts one value out of a `serde_json::Value` tree:
//!
//! - `data.attributes.long_name`: field access with dotted chaining
//! - `titles[0].title`, `items[-1]`: array indexing, negative counts from the end
//! - `"@uuid"`: quoted field names for keys that are not plain identifiers
//! - `items[*].name`: projection over every array element
//! - `items[].tags`: projection that flattens one level of nested arrays
//! - `@`: the document itself
//! - `a || b`: evaluates `b` only when `a` is absent or empty
//!
//! Evaluation never fails. A missing field, an index out of range or a type
//! mismatch yields `None`. Only the syntax can be wrong, and that is caught by
//! [`PathExpr::parse`] when the configuration is compiled.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Syntax error in a path expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{expression}' at position {position}: {message}")]
pub struct PathSyntaxError {
    pub expression: String,
    pub position: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Field(String),
    Index(i64),
    Project { flatten: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Chain {
    ops: Vec<Op>,
}

impl Chain {
    fn ends_with_projection(&self) -> bool {
        matches!(self.ops.last(), Some(Op::Project { .. }))
    }

    fn eval(&self, doc: &Value) -> Option<Value> {
        eval_ops(doc, &self.ops)
    }
}

/// A compiled path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    source: String,
    alternatives: Vec<Chain>,
}

impl PathExpr {
    /// Compile an expression, rejecting malformed syntax.
    pub fn parse(source: &str) -> Result<Self, PathSyntaxError> {
        let alternatives = Parser::new(source).parse_expr()?;
        Ok(Self {
            source: source.trim().to_string(),
            alternatives,
        })
    }

    /// The expression as written in the configuration.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate against `doc`.
    ///
    /// Alternatives are tried left to right; the first non-empty result wins.
    /// When every alternative is empty, the last one's result is returned, so
    /// a single-alternative expression hands back whatever it found.
    pub fn evaluate(&self, doc: &Value) -> Option<Value> {
        let mut last = None;
        for chain in &self.alternatives {
            let value = chain.eval(doc);
            if value.as_ref().is_some_and(|v| !is_empty_value(v)) {
                return value;
            }
            last = value;
        }
        last
    }

    /// Evaluate for a single-valued attribute.
    ///
    /// An alternative that yields an array but does not end in a projection
    /// collapses to its first non-empty element. Empty results count as absent.
    pub fn evaluate_scalar(&self, doc: &Value) -> Option<Value> {
        for chain in &self.alternatives {
            let mut value = chain.eval(doc);
            if !chain.ends_with_projection() {
                value = value.and_then(first_meaningful);
            }
            if let Some(v) = value {
                if !is_empty_value(&v) {
                    return Some(v);
                }
            }
        }
        None
    }

    /// Evaluate and render the result as text.
    ///
    /// Strings are trimmed, numbers and booleans are formatted; anything else,
    /// including empty strings, is treated as absent.
    pub fn evaluate_text(&self, doc: &Value) -> Option<String> {
        self.evaluate_scalar(doc).and_then(|v| value_to_text(&v))
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for PathExpr {
    type Err = PathSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Whether a value counts as empty for `||` fallback and attribute mapping.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Render a scalar as text. Containers and empty strings give `None`.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn first_meaningful(value: Value) -> Option<Value> {
    match value {
        Value::Array(items) => items.into_iter().find(|item| !is_empty_value(item)),
        other => Some(other),
    }
}

fn eval_ops(node: &Value, ops: &[Op]) -> Option<Value> {
    let Some((op, rest)) = ops.split_first() else {
        return Some(node.clone());
    };

    match op {
        Op::Field(name) => eval_ops(node.as_object()?.get(name)?, rest),
        Op::Index(index) => {
            let items = node.as_array()?;
            let len = items.len() as i64;
            let resolved = if *index < 0 { len + index } else { *index };
            if resolved < 0 || resolved >= len {
                return None;
            }
            eval_ops(&items[resolved as usize], rest)
        }
        Op::Project { flatten } => {
            let items = node.as_array()?;
            let mut elements: Vec<&Value> = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Array(inner) if *flatten => elements.extend(inner.iter()),
                    other => elements.push(other),
                }
            }
            let projected = elements
                .into_iter()
                .filter_map(|element| eval_ops(element, rest))
                .filter(|value| !value.is_null())
                .collect();
            Some(Value::Array(projected))
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> PathSyntaxError {
        PathSyntaxError {
            expression: self.source.to_string(),
            position: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), PathSyntaxError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", expected)))
        }
    }

    fn parse_expr(&mut self) -> Result<Vec<Chain>, PathSyntaxError> {
        let mut alternatives = Vec::new();
        loop {
            self.skip_whitespace();
            alternatives.push(self.parse_chain()?);
            self.skip_whitespace();
            match (self.peek(), self.peek_at(1)) {
                (None, _) => break,
                (Some('|'), Some('|')) => self.pos += 2,
                (Some(c), _) => return Err(self.error(format!("unexpected character '{}'", c))),
            }
        }
        Ok(alternatives)
    }

    fn parse_chain(&mut self) -> Result<Chain, PathSyntaxError> {
        let mut ops = Vec::new();

        if self.peek() == Some('@') && !self.peek_at(1).is_some_and(is_identifier_char) {
            self.pos += 1;
        } else if self.peek() == Some('[') {
            ops.push(self.parse_bracket()?);
        } else {
            ops.push(Op::Field(self.parse_field()?));
        }

        loop {
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    ops.push(Op::Field(self.parse_field()?));
                }
                Some('[') => ops.push(self.parse_bracket()?),
                _ => break,
            }
        }

        Ok(Chain { ops })
    }

    fn parse_field(&mut self) -> Result<String, PathSyntaxError> {
        if self.peek() == Some('"') {
            return self.parse_quoted();
        }
        let start = self.pos;
        while self.peek().is_some_and(is_identifier_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected field name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_quoted(&mut self) -> Result<String, PathSyntaxError> {
        self.expect('"')?;
        let mut name = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated quoted field name")),
                Some('"') => {
                    self.pos += 1;
                    break;
                }
                Some('\\') => {
                    let escaped = self
                        .peek_at(1)
                        .ok_or_else(|| self.error("dangling escape"))?;
                    name.push(escaped);
                    self.pos += 2;
                }
                Some(c) => {
                    name.push(c);
                    self.pos += 1;
                }
            }
        }
        if name.is_empty() {
            return Err(self.error("empty quoted field name"));
        }
        Ok(name)
    }

    fn parse_bracket(&mut self) -> Result<Op, PathSyntaxError> {
        self.expect('[')?;
        self.skip_whitespace();
        let op = match self.peek() {
            Some(']') => Op::Project { flatten: true },
            Some('*') => {
                self.pos += 1;
                self.skip_whitespace();
                Op::Project { flatten: false }
            }
            _ => {
                let start = self.pos;
                if self.peek() == Some('-') {
                    self.pos += 1;
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let digits: String = self.chars[start..self.pos].iter().collect();
                let index = digits
                    .parse::<i64>()
                    .map_err(|_| self.error("expected array index, '*' or ']'"))?;
                self.skip_whitespace();
                Op::Index(index)
            }
        };
        self.expect(']')?;
        Ok(op)
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '$' | '@' | ':' | '#')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(expr: &str, doc: Value) -> Option<Value> {
        PathExpr::parse(expr).unwrap().evaluate(&doc)
    }

    #[test]
    fn test_dotted_field_access() {
        assert_eq!(eval("a.b", json!({"a": {"b": 5}})), Some(json!(5)));
        assert_eq!(eval("a.b", json!({})), None);
        assert_eq!(eval("a.b", json!({"a": 3})), None);
    }

    #[test]
    fn test_alternation() {
        assert_eq!(eval("a || b", json!({"b": 7})), Some(json!(7)));
        assert_eq!(eval("a || b", json!({})), None);
        assert_eq!(eval("a || b", json!({"a": "", "b": "x"})), Some(json!("x")));
        assert_eq!(eval("a || b", json!({"a": 0, "b": 1})), Some(json!(0)));
        assert_eq!(
            eval("x.y || a.b || c", json!({"a": {"b": []}, "c": "last"})),
            Some(json!("last"))
        );
    }

    #[test]
    fn test_single_alternative_returns_empty_value_as_found() {
        assert_eq!(eval("a", json!({"a": ""})), Some(json!("")));
        assert_eq!(eval("a", json!({"a": null})), Some(Value::Null));
    }

    #[test]
    fn test_indexing() {
        let doc = json!({"titles": [{"title": "First"}, {"title": "Second"}]});
        assert_eq!(eval("titles[0].title", doc.clone()), Some(json!("First")));
        assert_eq!(eval("titles[-1].title", doc.clone()), Some(json!("Second")));
        assert_eq!(eval("titles[2].title", doc.clone()), None);
        assert_eq!(eval("titles[-3]", doc), None);
    }

    #[test]
    fn test_root_and_quoted_fields() {
        let doc = json!([{"@uuid": "u-1"}]);
        assert_eq!(eval("@", doc.clone()), Some(doc.clone()));
        assert_eq!(eval("@[0].\"@uuid\"", doc.clone()), Some(json!("u-1")));
        assert_eq!(eval("[0].@uuid", doc), Some(json!("u-1")));
        assert_eq!(
            eval("\"dotted.key\"", json!({"dotted.key": 1})),
            Some(json!(1))
        );
    }

    #[test]
    fn test_projection() {
        let doc = json!({"records": [
            {"contact": {"email": "a@example.org"}},
            {"contact": {}},
            {"contact": {"email": "b@example.org"}}
        ]});
        assert_eq!(
            eval("records[*].contact.email", doc),
            Some(json!(["a@example.org", "b@example.org"]))
        );

        let nested = json!({"groups": [["a", "b"], ["c"]]});
        assert_eq!(eval("groups[]", nested.clone()), Some(json!(["a", "b", "c"])));
        assert_eq!(eval("groups[*]", nested), Some(json!([["a", "b"], ["c"]])));
    }

    #[test]
    fn test_evaluate_scalar_collapses_lists() {
        let doc = json!({"names": ["", null, "Widget", "Other"], "tags": ["x", "y"]});
        let expr = PathExpr::parse("names").unwrap();
        assert_eq!(expr.evaluate_scalar(&doc), Some(json!("Widget")));

        let listed = PathExpr::parse("tags[*]").unwrap();
        assert_eq!(listed.evaluate_scalar(&doc), Some(json!(["x", "y"])));

        let empty = PathExpr::parse("missing || names[5]").unwrap();
        assert_eq!(empty.evaluate_scalar(&doc), None);
    }

    #[test]
    fn test_evaluate_text() {
        let doc = json!({"id": 42, "name": "  Alpha  ", "blank": " "});
        assert_eq!(
            PathExpr::parse("id").unwrap().evaluate_text(&doc),
            Some("42".to_string())
        );
        assert_eq!(
            PathExpr::parse("name").unwrap().evaluate_text(&doc),
            Some("Alpha".to_string())
        );
        assert_eq!(PathExpr::parse("blank").unwrap().evaluate_text(&doc), None);
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["", "a.", "a..b", "a[", "a[x]", "a || ", "a b", "\"open", "a[1", "||"] {
            assert!(PathExpr::parse(bad).is_err(), "'{}' should be rejected", bad);
        }
    }

    #[test]
    fn test_display_keeps_source() {
        let expr: PathExpr = " data.id || id ".parse().unwrap();
        assert_eq!(expr.to_string(), "data.id || id");
        assert_eq!(expr.as_str(), "data.id || id");
    }
}
