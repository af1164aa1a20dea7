//! Database introspection: enumerate the objects we own.
//!
//! An object is owned iff its COMMENT parses as a dbinfo signature.
//! Anything else in the database is invisible to us and never touched.

use crate::error::SamizdatError;
use crate::ident::{EntityKind, Fqn};
use crate::samizdat::{DbInfo, Ghost, Samizdat};

use super::session::Session;

const SYSTEM_SCHEMAS: &str = "'pg_catalog', 'information_schema', 'pg_toast'";

/// One introspected database object, before the ownership filter.
#[derive(Debug, Clone)]
pub struct DbObjectState {
    pub kind: EntityKind,
    pub schema: String,
    pub name: String,
    /// Effective argument signature, functions only.
    pub args: Option<String>,
    /// The table a trigger is attached to, triggers only.
    pub table: Option<Fqn>,
    pub comment: Option<String>,
}

impl DbObjectState {
    /// Parse the comment as a dbinfo signature; `None` means not ours.
    pub fn dbinfo(&self) -> Option<DbInfo> {
        serde_json::from_str(self.comment.as_deref()?).ok()
    }
}

fn relations_sql() -> String {
    format!(
        "SELECT n.nspname::text,\n\
         \x20      c.relname::text,\n\
         \x20      CASE c.relkind WHEN 'v' THEN 'VIEW' WHEN 'm' THEN 'MATVIEW' ELSE 'TABLE' END,\n\
         \x20      d.description\n\
         FROM pg_catalog.pg_class c\n\
         JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid\n\
         LEFT JOIN pg_catalog.pg_description d ON d.objoid = c.oid AND d.objsubid = 0\n\
         WHERE c.relkind IN ('r', 'v', 'm')\n\
         \x20 AND n.nspname NOT IN ({SYSTEM_SCHEMAS})\n\
         ORDER BY n.nspname, c.relname"
    )
}

fn functions_sql() -> String {
    format!(
        "SELECT n.nspname::text,\n\
         \x20      p.proname::text,\n\
         \x20      pg_catalog.pg_get_function_identity_arguments(p.oid)::text,\n\
         \x20      d.description\n\
         FROM pg_catalog.pg_proc p\n\
         JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace\n\
         LEFT JOIN pg_catalog.pg_description d ON d.objoid = p.oid AND d.objsubid = 0\n\
         WHERE p.prokind NOT IN ('a', 'w', 'p')\n\
         \x20 AND n.nspname NOT IN ({SYSTEM_SCHEMAS})\n\
         ORDER BY n.nspname, p.proname"
    )
}

fn triggers_sql() -> String {
    format!(
        "SELECT tn.nspname::text,\n\
         \x20      t.tgname::text,\n\
         \x20      c.relname::text,\n\
         \x20      d.description\n\
         FROM pg_catalog.pg_trigger t\n\
         JOIN pg_catalog.pg_class c ON t.tgrelid = c.oid\n\
         JOIN pg_catalog.pg_namespace tn ON c.relnamespace = tn.oid\n\
         LEFT JOIN pg_catalog.pg_description d ON d.objoid = t.oid AND d.objsubid = 0\n\
         WHERE NOT t.tgisinternal\n\
         \x20 AND tn.nspname NOT IN ({SYSTEM_SCHEMAS})\n\
         ORDER BY tn.nspname, c.relname, t.tgname"
    )
}

fn column(row: &[Option<String>], ix: usize) -> String {
    row.get(ix).cloned().flatten().unwrap_or_default()
}

/// Enumerate every view, matview, table, function (no aggregates, window
/// functions or procedures) and non-internal trigger outside the system
/// schemas, with its comment.
pub async fn get_dbstate(
    session: &mut dyn Session,
) -> Result<Vec<DbObjectState>, SamizdatError> {
    let mut state = Vec::new();

    for row in session.fetch_all(&relations_sql()).await? {
        let kind =
            EntityKind::parse_token(&column(&row, 2)).unwrap_or(EntityKind::Table);
        state.push(DbObjectState {
            kind,
            schema: column(&row, 0),
            name: column(&row, 1),
            args: None,
            table: None,
            comment: row.get(3).cloned().flatten(),
        });
    }

    for row in session.fetch_all(&functions_sql()).await? {
        state.push(DbObjectState {
            kind: EntityKind::Function,
            schema: column(&row, 0),
            name: column(&row, 1),
            args: Some(column(&row, 2)),
            table: None,
            comment: row.get(3).cloned().flatten(),
        });
    }

    for row in session.fetch_all(&triggers_sql()).await? {
        let schema = column(&row, 0);
        let table = Fqn::new(schema.clone(), column(&row, 2));
        state.push(DbObjectState {
            kind: EntityKind::Trigger,
            schema,
            name: column(&row, 1),
            args: None,
            table: Some(table),
            comment: row.get(3).cloned().flatten(),
        });
    }

    Ok(state)
}

/// Reconstruct a ghost samizdat from an introspected record, or `None`
/// when the record is not ours.
pub fn ghost(state: &DbObjectState) -> Option<Samizdat> {
    let info = state.dbinfo()?;
    Some(Samizdat::Ghost(Ghost {
        kind: state.kind,
        schema: state.schema.clone(),
        name: state.name.clone(),
        args: state.args.clone(),
        on_table: state.table.clone(),
        implanted_hash: info.dbsamizdat.definition_hash,
    }))
}
