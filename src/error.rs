//! Error taxonomy for everything that can go wrong between a samizdat
//! definition and the database.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::db::session::SessionError;
use crate::samizdat::TRIGGER_DEPCOUNTER_WIDTH;

/// Indent SQL for embedding in error and progress output.
pub fn sqlfmt(sql: &str) -> String {
    sql.lines()
        .map(|line| format!("\t\t{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Error)]
pub enum SamizdatError {
    #[error("{samizdat} : {reason}")]
    UnsuitableName { samizdat: String, reason: String },

    #[error("Non-unique DB entities specified: {}", .0.join(", "))]
    NameClash(Vec<String>),

    #[error("Nonexistent dependencies referenced: {}", .0.join(", "))]
    DanglingReference(Vec<String>),

    #[error("Samizdat entity is also declared as *unmanaged* dependency: {}", .0.join(", "))]
    TypeConfusion(Vec<String>),

    #[error("{} : Dependency cycle detected", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("{0}")]
    FunctionSignature(Box<FunctionSignatureFailure>),

    #[error("{0}")]
    Database(Box<DatabaseFailure>),

    #[error(
        "{0} was reconstructed from database introspection and has no SQL template; it can only be dropped"
    )]
    TemplateUnavailable(String),

    #[error(
        "Trigger creation order {0} does not fit the zero-padded numbering width of {width}. \
         PostgreSQL runs same-event triggers in alphabetical name order, which the padded index preserves; \
         widening it would reorder triggers that already exist.",
        width = TRIGGER_DEPCOUNTER_WIDTH
    )]
    SidekickOverflow(u64),

    #[error("Unknown rootnodes:\n\t- {}", .0.join("\n\t- "))]
    UnknownRootNodes(Vec<String>),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("definition file {path}: {message}")]
    Definitions { path: String, message: String },
}

/// Context captured when a SQL action fails for any reason other than the
/// signature-recovery path.
#[derive(Debug)]
pub struct DatabaseFailure {
    pub action: &'static str,
    pub samizdat: String,
    pub sql: String,
    pub error: SessionError,
    pub template: Option<String>,
    pub substitutions: Option<BTreeMap<&'static str, String>>,
    pub function_signature: Option<String>,
}

impl fmt::Display for DatabaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "While executing:")?;
        writeln!(f, "{}", sqlfmt(&self.sql))?;
        writeln!(f)?;
        writeln!(f, "a DB error was raised:")?;
        writeln!(f, "{}", self.error)?;

        if let Some(template) = &self.template {
            writeln!(f)?;
            writeln!(f, "Original template:")?;
            writeln!(f, "{}", sqlfmt(template))?;
        }
        if let Some(substitutions) = &self.substitutions {
            writeln!(f)?;
            writeln!(f, "Template variable substitutions:")?;
            for (key, value) in substitutions {
                writeln!(f, "  ${key} = {value:?}")?;
            }
        }
        if let Some(signature) = &self.function_signature {
            writeln!(f)?;
            if signature.is_empty() {
                writeln!(f, "function_arguments_signature: '' (empty)")?;
            } else {
                writeln!(f, "function_arguments_signature: {signature:?}")?;
            }
        }
        if let Some(hint) = detect_error_pattern(&self.error.message, &self.sql) {
            writeln!(f)?;
            writeln!(f, "Hint: {hint}")?;
        }
        writeln!(f)?;
        writeln!(f, "while we were processing the samizdat:")?;
        writeln!(f, "{}", self.samizdat)?;
        writeln!(f)?;
        write!(f, "furthermore: {} failed", self.action)
    }
}

/// Raised when signing a freshly created function fails because the
/// declared identity signature does not match what PostgreSQL assigned.
#[derive(Debug)]
pub struct FunctionSignatureFailure {
    pub samizdat: String,
    pub create_sql: String,
    pub identity: String,
    pub declared_arguments: String,
    pub candidates: Vec<String>,
}

impl fmt::Display for FunctionSignatureFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let candidates = if self.candidates.is_empty() {
            "<none>".to_string()
        } else {
            self.candidates.join("\n")
        };
        writeln!(f, "After executing:")?;
        writeln!(f, "{}", sqlfmt(&self.create_sql))?;
        writeln!(f)?;
        writeln!(
            f,
            "which we did in order to create the samizdat function {},",
            self.samizdat
        )?;
        writeln!(
            f,
            "we were not able to identify the resulting database function via its call signature of:"
        )?;
        writeln!(f, "{}", self.identity)?;
        writeln!(f)?;
        writeln!(
            f,
            "because, we figure, that is not actually the effective call signature resulting from the function arguments, which are:"
        )?;
        writeln!(f, "({})", self.declared_arguments)?;
        writeln!(f)?;
        writeln!(
            f,
            "We queried the database for the effective call signature, and came up with:"
        )?;
        writeln!(f, "{candidates}")?;
        writeln!(f)?;
        write!(
            f,
            "HINT: Amend the arguments_signature and/or arguments attributes of {}.",
            self.samizdat
        )
    }
}

/// Pattern-match a database error message against mistakes we have seen
/// before and can name.
pub fn detect_error_pattern(error_msg: &str, sql: &str) -> Option<&'static str> {
    let error_lower = error_msg.to_lowercase();
    let sql_lower = sql.to_lowercase();

    if error_lower.contains("syntax error at or near \"(\"")
        && sql_lower.contains("create function")
        && sql_lower.contains(")(")
    {
        return Some(
            "Signature duplication detected: an arguments signature was provided \
             but the template also spells out a function signature. \
             Remove the signature from either the template or the arguments attribute.",
        );
    }

    if error_lower.contains("syntax error at or near \"returns\"")
        && !sql_lower.contains("create function")
        && sql_lower.contains("returns")
    {
        return Some(
            "Missing CREATE FUNCTION: the template includes RETURNS but no CREATE FUNCTION \
             statement. Make sure the template starts with ${preamble}.",
        );
    }

    if error_lower.contains("syntax error at or near \"$\"") {
        return Some(
            "Unsubstituted template variable: a ${...} placeholder survived into the SQL. \
             Only ${preamble}, ${postamble} and ${samizdatname} are substituted.",
        );
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_for_duplicated_signature() {
        let hint = detect_error_pattern(
            r#"syntax error at or near "(""#,
            r#"CREATE FUNCTION "public"."f"(x integer)(x integer) RETURNS int"#,
        );
        assert!(hint.unwrap().contains("Signature duplication"));
    }

    #[test]
    fn hint_for_missing_create_function() {
        let hint = detect_error_pattern(
            r#"syntax error at or near "RETURNS""#,
            "RETURNS trigger AS $X$ BEGIN END $X$",
        );
        assert!(hint.unwrap().contains("Missing CREATE FUNCTION"));
    }

    #[test]
    fn hint_for_unresolved_placeholder() {
        let hint = detect_error_pattern(r#"syntax error at or near "$""#, "SELECT ${nosuchvar}");
        assert!(hint.unwrap().contains("Unsubstituted template variable"));
    }

    #[test]
    fn no_hint_for_unrelated_errors() {
        assert!(detect_error_pattern("relation \"x\" does not exist", "SELECT 1").is_none());
    }
}
