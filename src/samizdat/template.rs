//! SQL templates with `${placeholder}` expansion.
//!
//! A template is either a literal string or a producer evaluated lazily —
//! the latter for SQL derived from an external query builder. Deferred
//! templates resolve at most once per run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

pub const DEFAULT_TEMPLATE: &str = "-- A samizdat body for ${samizdatname} belongs here.";

#[derive(Clone)]
pub enum Template {
    Static(String),
    Deferred {
        producer: Arc<dyn Fn() -> String + Send + Sync>,
        cache: OnceCell<String>,
    },
}

impl Template {
    pub fn new(sql: impl Into<String>) -> Self {
        Template::Static(sql.into())
    }

    pub fn deferred(producer: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Template::Deferred {
            producer: Arc::new(producer),
            cache: OnceCell::new(),
        }
    }

    pub fn resolve(&self) -> &str {
        match self {
            Template::Static(sql) => sql,
            Template::Deferred { producer, cache } => cache.get_or_init(|| (producer.as_ref())()),
        }
    }

    pub fn expand(&self, substitutions: &BTreeMap<&'static str, String>) -> String {
        expand(self.resolve(), substitutions)
    }
}

impl Default for Template {
    fn default() -> Self {
        Template::Static(DEFAULT_TEMPLATE.to_string())
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Template::Static(sql) => f.debug_tuple("Static").field(sql).finish(),
            Template::Deferred { .. } => f.write_str("Deferred(..)"),
        }
    }
}

impl From<&str> for Template {
    fn from(sql: &str) -> Self {
        Template::Static(sql.to_string())
    }
}

impl From<String> for Template {
    fn from(sql: String) -> Self {
        Template::Static(sql)
    }
}

/// Substitute `${key}` placeholders. Unknown `${...}` placeholders are left
/// in place (they surface as a PostgreSQL syntax error, which is the
/// fail-loud behavior we want), and bare `$...` text such as dollar-quoting
/// tags is never touched.
pub fn expand(template: &str, substitutions: &BTreeMap<&'static str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find("${") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match substitutions.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("${");
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str("${");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
