//! Qualified names, reference normalization, and identifier validation.

use std::fmt;

use crate::error::SamizdatError;

pub const PG_IDENTIFIER_MAXLEN: usize = 63;

/// The kinds of database objects under samizdat management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Table,
    View,
    MatView,
    Function,
    Trigger,
}

impl EntityKind {
    /// The SQL keyword(s) for this kind, as used in CREATE/DROP/COMMENT.
    pub fn sql_word(&self) -> &'static str {
        match self {
            EntityKind::Table => "TABLE",
            EntityKind::View => "VIEW",
            EntityKind::MatView => "MATERIALIZED VIEW",
            EntityKind::Function => "FUNCTION",
            EntityKind::Trigger => "TRIGGER",
        }
    }

    /// Short token used in hashes and wire records.
    pub fn token(&self) -> &'static str {
        match self {
            EntityKind::Table => "TABLE",
            EntityKind::View => "VIEW",
            EntityKind::MatView => "MATVIEW",
            EntityKind::Function => "FUNCTION",
            EntityKind::Trigger => "TRIGGER",
        }
    }

    pub fn parse_token(token: &str) -> Option<Self> {
        match token {
            "TABLE" => Some(EntityKind::Table),
            "VIEW" => Some(EntityKind::View),
            "MATVIEW" => Some(EntityKind::MatView),
            "FUNCTION" => Some(EntityKind::Function),
            "TRIGGER" => Some(EntityKind::Trigger),
            _ => None,
        }
    }
}

/// Double-quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

/// A fully qualified name: `(schema, object_name, args?)`.
///
/// `args` is present only for functions, where the argument signature
/// disambiguates overloads. Ordering is lexicographic on the fields, which
/// matches ordering on the canonical rendering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fqn {
    pub schema: String,
    pub object_name: String,
    pub args: Option<String>,
}

impl Fqn {
    pub fn new(schema: impl Into<String>, object_name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            object_name: object_name.into(),
            args: None,
        }
    }

    pub fn with_args(
        schema: impl Into<String>,
        object_name: impl Into<String>,
        args: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            object_name: object_name.into(),
            args: Some(args.into()),
        }
    }

    /// Canonical rendering: `"schema"."name"`, or `"schema"."name"(args)`
    /// for functions.
    pub fn db_object_identity(&self) -> String {
        match &self.args {
            Some(args) => format!(
                "{}.{}({})",
                quote_ident(&self.schema),
                quote_ident(&self.object_name),
                args
            ),
            None => format!(
                "{}.{}",
                quote_ident(&self.schema),
                quote_ident(&self.object_name)
            ),
        }
    }
}

impl fmt::Display for Fqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&nodenamefmt(self))
    }
}

/// Human-facing name: the `public.` prefix is dropped, except for functions
/// (whose signature makes the schema worth spelling out).
pub fn nodenamefmt(fqn: &Fqn) -> String {
    match &fqn.args {
        Some(args) => format!("{}.{}({})", fqn.schema, fqn.object_name, args),
        None if fqn.schema == "public" => fqn.object_name.clone(),
        None => format!("{}.{}", fqn.schema, fqn.object_name),
    }
}

/// A not-yet-normalized reference to another database object.
///
/// References arrive as bare names, `(schema, name)` pairs, or full FQNs;
/// they are converted once to [`Fqn`] at the graph boundary and only FQNs
/// circulate internally.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectRef {
    Name(String),
    SchemaName(String, String),
    Qualified(Fqn),
}

impl ObjectRef {
    /// Parse the string forms used in definition files and on the command
    /// line: `name`, `schema.name`, `schema.name(args)`.
    pub fn parse(s: &str) -> Self {
        let (head, args) = match (s.find('('), s.ends_with(')')) {
            (Some(open), true) => (&s[..open], Some(s[open + 1..s.len() - 1].to_string())),
            _ => (s, None),
        };
        match (head.split_once('.'), args) {
            (Some((schema, name)), Some(args)) => {
                ObjectRef::Qualified(Fqn::with_args(schema, name, args))
            }
            (Some((schema, name)), None) => {
                ObjectRef::SchemaName(schema.to_string(), name.to_string())
            }
            (None, Some(args)) => {
                ObjectRef::Qualified(Fqn::with_args("public", head, args))
            }
            (None, None) => ObjectRef::Name(head.to_string()),
        }
    }

    /// Normalize to an FQN, filling in `default_schema` for bare names.
    pub fn fqify(&self, default_schema: &str) -> Fqn {
        match self {
            ObjectRef::Name(name) => Fqn::new(default_schema, name.clone()),
            ObjectRef::SchemaName(schema, name) => Fqn::new(schema.clone(), name.clone()),
            ObjectRef::Qualified(fqn) => fqn.clone(),
        }
    }
}

impl From<&str> for ObjectRef {
    fn from(s: &str) -> Self {
        ObjectRef::parse(s)
    }
}

impl From<(&str, &str)> for ObjectRef {
    fn from((schema, name): (&str, &str)) -> Self {
        ObjectRef::SchemaName(schema.to_string(), name.to_string())
    }
}

impl From<(&str, &str, &str)> for ObjectRef {
    fn from((schema, name, args): (&str, &str, &str)) -> Self {
        ObjectRef::Qualified(Fqn::with_args(schema, name, args))
    }
}

impl From<Fqn> for ObjectRef {
    fn from(fqn: Fqn) -> Self {
        ObjectRef::Qualified(fqn)
    }
}

/// Check that a name is usable as a quoted PostgreSQL identifier.
///
/// We quote identifiers everywhere, so the rules are lenient: ASCII only
/// (UESCAPE would complicate the length math), at most 63 bytes, and no
/// embedded double quote.
pub fn validate_name(name: &str, subject: &str) -> Result<(), SamizdatError> {
    if name.chars().any(|c| !c.is_ascii()) {
        return Err(SamizdatError::UnsuitableName {
            samizdat: subject.to_string(),
            reason: "Name contains non-ASCII characters".to_string(),
        });
    }
    if name.len() > PG_IDENTIFIER_MAXLEN {
        return Err(SamizdatError::UnsuitableName {
            samizdat: subject.to_string(),
            reason: "Name is too long".to_string(),
        });
    }
    if name.contains('"') {
        return Err(SamizdatError::UnsuitableName {
            samizdat: subject.to_string(),
            reason: "Name contains unwelcome characters ('\"')".to_string(),
        });
    }
    Ok(())
}
