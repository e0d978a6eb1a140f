//! `{name}` templates for request URLs, SPARQL bodies and result labels.
//!
//! `{{` and `}}` stand for literal braces. Every placeholder must be resolved
//! at render time; a missing value is an error, never an empty string.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

pub const BASE_URL: &str = "base_url";
pub const QUERY: &str = "query";
pub const QUERY_RAW: &str = "query_raw";
pub const MAX_HITS: &str = "max_hits";
pub const LANGUAGE: &str = "language";
pub const ID: &str = "id";
pub const ID_ENCODED: &str = "id_encoded";
pub const NATIVE_ID: &str = "native_id";
pub const PREFIX: &str = "prefix";
pub const LABEL: &str = "label";

/// Placeholders available to a search URL.
pub const SEARCH_URL_VARS: &[&str] = &[BASE_URL, QUERY, QUERY_RAW, MAX_HITS, LANGUAGE];
/// Placeholders available to a SPARQL query body.
pub const SPARQL_QUERY_VARS: &[&str] = &[QUERY, MAX_HITS, LANGUAGE];
/// Placeholders available to a SPARQL endpoint URL.
pub const SPARQL_ENDPOINT_VARS: &[&str] = &[BASE_URL];
/// Placeholders available to a detail step URL.
pub const DETAIL_URL_VARS: &[&str] = &[BASE_URL, ID, ID_ENCODED, NATIVE_ID];
/// Placeholders available to a result label.
pub const LABEL_VARS: &[&str] = &[PREFIX, LABEL, ID];

static PLACEHOLDER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("'{template}': {message}")]
    Syntax { template: String, message: String },

    #[error("'{template}': unresolved placeholder '{{{name}}}'")]
    Unresolved { template: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Values substituted into a template.
pub type TemplateVars = HashMap<&'static str, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let syntax = |message: &str| TemplateError::Syntax {
            template: source.to_string(),
            message: message.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => return Err(syntax("unclosed '{'")),
                        }
                    }
                    if !PLACEHOLDER_NAME.is_match(&name) {
                        return Err(syntax(&format!("invalid placeholder '{{{}}}'", name)));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => return Err(syntax("single '}' must be written as '}}'")),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Literal text before the first placeholder.
    pub fn literal_prefix(&self) -> &str {
        match self.segments.first() {
            Some(Segment::Literal(text)) => text,
            _ => "",
        }
    }

    /// The placeholder the template opens with, if any.
    pub fn leading_placeholder(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Placeholder(name)) => Some(name),
            _ => None,
        }
    }

    pub fn render(&self, vars: &TemplateVars) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value =
                        vars.get(name.as_str())
                            .ok_or_else(|| TemplateError::Unresolved {
                                template: self.source.clone(),
                                name: name.clone(),
                            })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    /// Render with a dummy value for each allowed name.
    ///
    /// Used at configuration load to reject placeholders the execution
    /// context can never provide.
    pub fn dry_run(&self, allowed: &[&'static str]) -> Result<String, TemplateError> {
        let vars: TemplateVars = allowed
            .iter()
            .map(|name| (*name, format!("dummy-{}", name)))
            .collect();
        self.render(&vars)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Escape text for the inside of a double-quoted SPARQL string literal.
pub fn escape_sparql_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> TemplateVars {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_render_placeholders() {
        let template = Template::parse("{base_url}/devices?q={query}").unwrap();
        let rendered = template
            .render(&vars(&[(BASE_URL, "https://api.example.org"), (QUERY, "ctd%20probe")]))
            .unwrap();
        assert_eq!(rendered, "https://api.example.org/devices?q=ctd%20probe");
        assert_eq!(template.placeholders().collect::<Vec<_>>(), vec!["base_url", "query"]);
    }

    #[test]
    fn test_escaped_braces() {
        let template =
            Template::parse("SELECT ?item WHERE {{ ?item rdfs:label \"{query}\"@en }}").unwrap();
        let rendered = template.render(&vars(&[(QUERY, "seismometer")])).unwrap();
        assert_eq!(
            rendered,
            "SELECT ?item WHERE { ?item rdfs:label \"seismometer\"@en }"
        );
    }

    #[test]
    fn test_unresolved_placeholder_is_an_error() {
        let template = Template::parse("{base_url}/items/{id}").unwrap();
        let err = template.render(&vars(&[(BASE_URL, "x")])).unwrap_err();
        assert_eq!(
            err,
            TemplateError::Unresolved {
                template: "{base_url}/items/{id}".to_string(),
                name: "id".to_string(),
            }
        );
    }

    #[test]
    fn test_dry_run_rejects_unknown_names() {
        let good = Template::parse("{base_url}/search?q={query}").unwrap();
        assert!(good.dry_run(SEARCH_URL_VARS).is_ok());

        let bad = Template::parse("{base_url}/search?q={term}").unwrap();
        assert!(matches!(
            bad.dry_run(SEARCH_URL_VARS),
            Err(TemplateError::Unresolved { name, .. }) if name == "term"
        ));
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["{unclosed", "stray }", "{}", "{with space}", "{1abc}"] {
            assert!(Template::parse(bad).is_err(), "'{}' should be rejected", bad);
        }
    }

    #[test]
    fn test_leading_segment() {
        let literal = Template::parse("https://{{host}}/items/{id}").unwrap();
        assert_eq!(literal.literal_prefix(), "https://{host}/items/");
        assert_eq!(literal.leading_placeholder(), None);

        let data = Template::parse("{id}.json").unwrap();
        assert_eq!(data.literal_prefix(), "");
        assert_eq!(data.leading_placeholder(), Some("id"));
    }

    #[test]
    fn test_escape_sparql_literal() {
        assert_eq!(escape_sparql_literal(r#"a "b" \c"#), r#"a \"b\" \\c"#);
    }
}
