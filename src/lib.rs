//! dbsamizdat manages the lifecycle of derived PostgreSQL schema objects —
//! views, materialized views, functions, triggers and tables — as
//! declarative units. It reconciles the database against the declared set:
//! creating missing objects in dependency order, dropping undeclared ones,
//! refreshing materialized views, and signing every object it owns with a
//! JSON comment so it never touches anything else.

pub mod api;
pub mod commands;
pub mod db;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod graph;
pub mod graphvizdot;
pub mod ident;
pub mod reconcile;
pub mod samizdat;

pub use db::session::{PgSession, Session, SessionError};
pub use error::SamizdatError;
pub use executor::TxDiscipline;
pub use ident::{EntityKind, Fqn, ObjectRef};
pub use samizdat::{Function, Ghost, MatView, Samizdat, Table, Template, Trigger, View};
