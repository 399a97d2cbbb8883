//! Compiling URL templates into path matchers
//!
//! A template is literal text with placeholders in between. A placeholder is either `{name}`,
//! which matches one or more characters up to the next `/`, or `{name:pattern}`, which matches
//! the given regular expression. Braces may nest inside a pattern, so `{year:\d{4}}` works as
//! expected.
//!
//! Everything outside placeholders is matched literally, and a compiled template only ever
//! matches a complete path.
//!
//! ```
//! use waymark::Template;
//!
//! let template = Template::compile(r"/{year:\d{4}}/{slug}").unwrap();
//! let vars = template.captures("/2024/hello").unwrap();
//!
//! assert_eq!(vars["year"], "2024");
//! assert_eq!(vars["slug"], "hello");
//! assert!(!template.is_match("/2024/hello/world"));
//! ```
use crate::error::Error;
use crate::router::RouteParams;
use regex::Regex;
use std::fmt;

const DEFAULT_PATTERN: &str = "[^/]+";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable {
        name: String,
        pattern: Option<String>,
    },
}

/// A compiled URL template
#[derive(Clone)]
pub struct Template {
    source: String,
    regex: Regex,
    variables: Vec<String>,
    segments: Vec<Segment>,
}

impl Template {
    /// Compiles `template` into a matcher.
    ///
    /// Fails if a placeholder is not closed, if a variable name is empty, malformed or repeated,
    /// or if a placeholder pattern is not a valid regular expression.
    pub fn compile(template: &str) -> Result<Self, Error> {
        let segments = parse(template)?;

        let mut expression = String::from("^(?:");
        let mut variables: Vec<String> = Vec::new();

        for segment in &segments {
            match segment {
                Segment::Literal(text) => expression.push_str(&regex::escape(text)),
                Segment::Variable { name, pattern } => {
                    if variables.contains(name) {
                        return Err(Error::DuplicateVariable {
                            template: template.to_string(),
                            name: name.clone(),
                        });
                    }
                    let pattern = match pattern.as_deref() {
                        Some(pattern) => {
                            // A fragment must stand on its own, or it could close the capture
                            // group early and leak an alternation into the whole expression.
                            Regex::new(pattern).map_err(|source| Error::InvalidPattern {
                                template: template.to_string(),
                                source,
                            })?;
                            pattern
                        }
                        None => DEFAULT_PATTERN,
                    };
                    expression.push_str(&format!("(?P<{name}>{pattern})"));
                    variables.push(name.clone());
                }
            }
        }

        expression.push_str(")$");

        let regex = Regex::new(&expression).map_err(|source| Error::InvalidPattern {
            template: template.to_string(),
            source,
        })?;

        Ok(Self {
            source: template.to_string(),
            regex,
            variables,
            segments,
        })
    }

    /// Returns the template this matcher was compiled from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns the names of the template's variables, in the order they appear
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Returns `true` if `path` matches the template in its entirety
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Matches `path` against the template and returns the captured variables.
    ///
    /// Returns `None` if the path does not match in its entirety. A variable whose pattern can
    /// match the empty string is captured as `""`.
    pub fn captures(&self, path: &str) -> Option<RouteParams> {
        let captures = self.regex.captures(path)?;

        let mut params = RouteParams::new();
        for name in &self.variables {
            if let Some(value) = captures.name(name) {
                params.insert(name.clone(), value.as_str().to_string());
            }
        }

        Some(params)
    }

    /// Builds a path from the template by substituting `vars` into the placeholders.
    ///
    /// The result is checked against the template, so a value that violates a placeholder's
    /// pattern is an error rather than a path that would never route back here.
    pub fn expand(&self, vars: &RouteParams) -> Result<String, Error> {
        let mut path = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Variable { name, .. } => {
                    let value = vars.get(name).ok_or_else(|| Error::MissingVariable {
                        template: self.source.clone(),
                        name: name.clone(),
                    })?;
                    path.push_str(value);
                }
            }
        }

        if !self.is_match(&path) {
            return Err(Error::ExpansionMismatch {
                template: self.source.clone(),
                path,
            });
        }

        Ok(path)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("source", &self.source)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// A placeholder found while scanning a template.
struct Placeholder<'a> {
    name: &'a str,
    pattern: Option<&'a str>,
    start: usize,
    end: usize,
}

// Yields each placeholder of `template` in order, or the offset of an opening brace that is
// never closed.
fn placeholders(template: &str) -> impl Iterator<Item = Result<Placeholder<'_>, usize>> + '_ {
    let mut cursor = 0;
    std::iter::from_fn(move || {
        let open = cursor + template[cursor..].find('{')?;
        match closing_brace(template, open) {
            Some(close) => {
                cursor = close + 1;
                let inner = &template[open + 1..close];
                let (name, pattern) = match inner.split_once(':') {
                    Some((name, "")) => (name, None),
                    Some((name, pattern)) => (name, Some(pattern)),
                    None => (inner, None),
                };
                Some(Ok(Placeholder {
                    name,
                    pattern,
                    start: open,
                    end: close + 1,
                }))
            }
            None => {
                cursor = template.len();
                Some(Err(open))
            }
        }
    })
}

// Finds the brace closing the placeholder opened at `open`, honoring nested braces and
// backslash escapes inside the pattern.
fn closing_brace(template: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut escaped = false;

    for (i, c) in template[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }

    None
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse(template: &str) -> Result<Vec<Segment>, Error> {
    let mut segments = Vec::new();
    let mut last = 0;

    for placeholder in placeholders(template) {
        let placeholder = placeholder.map_err(|offset| Error::UnterminatedPlaceholder {
            template: template.to_string(),
            offset,
        })?;

        if !is_valid_name(placeholder.name) {
            return Err(Error::InvalidVariableName {
                template: template.to_string(),
                name: placeholder.name.to_string(),
            });
        }

        if placeholder.start > last {
            segments.push(Segment::Literal(template[last..placeholder.start].to_string()));
        }
        segments.push(Segment::Variable {
            name: placeholder.name.to_string(),
            pattern: placeholder.pattern.map(str::to_string),
        });
        last = placeholder.end;
    }

    if last < template.len() {
        segments.push(Segment::Literal(template[last..].to_string()));
    }

    Ok(segments)
}
