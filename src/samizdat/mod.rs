//! The samizdat model: declarative descriptions of the database objects we
//! manage, and the SQL each one knows how to produce about itself.
//!
//! A samizdat is a value, one per database object. Declared samizdats carry
//! a SQL template; ghosts are reconstructed from database introspection and
//! carry only their identity and implanted hash, which is enough to drop
//! them but nothing else.

pub mod sidekick;
pub mod template;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::db::session::Session;
use crate::error::SamizdatError;
use crate::ident::{EntityKind, Fqn, ObjectRef, nodenamefmt, quote_ident};

pub use template::Template;

/// Version number for the signature format.
pub const DBINFO_VERSION: u32 = 1;

/// Autogenerated refresh triggers are numbered so that PostgreSQL's
/// alphabetical trigger ordering matches samizdat dependency order; the
/// index is left-padded to this width (166 sorts before 23, but 00166
/// sorts after 00023).
pub const TRIGGER_DEPCOUNTER_WIDTH: usize = 5;

/// The ownership signature stored in a database object's COMMENT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DbInfo {
    pub dbsamizdat: DbInfoBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DbInfoBody {
    pub version: u32,
    pub created: i64,
    pub definition_hash: String,
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input))
}

#[derive(Debug, Clone)]
pub struct View {
    pub schema: String,
    pub name: String,
    pub template: Template,
    pub deps_on: BTreeSet<ObjectRef>,
    pub deps_on_unmanaged: BTreeSet<ObjectRef>,
}

impl View {
    pub fn new(name: impl Into<String>, template: impl Into<Template>) -> Self {
        Self {
            schema: "public".to_string(),
            name: name.into(),
            template: template.into(),
            deps_on: BTreeSet::new(),
            deps_on_unmanaged: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub template: Template,
    pub deps_on: BTreeSet<ObjectRef>,
    pub deps_on_unmanaged: BTreeSet<ObjectRef>,
    pub unlogged: bool,
}

impl Table {
    pub fn new(name: impl Into<String>, template: impl Into<Template>) -> Self {
        Self {
            schema: "public".to_string(),
            name: name.into(),
            template: template.into(),
            deps_on: BTreeSet::new(),
            deps_on_unmanaged: BTreeSet::new(),
            unlogged: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatView {
    pub schema: String,
    pub name: String,
    pub template: Template,
    pub deps_on: BTreeSet<ObjectRef>,
    pub deps_on_unmanaged: BTreeSet<ObjectRef>,
    pub refresh_concurrently: bool,
    /// Unmanaged tables whose statement-level changes should refresh this
    /// view; non-empty sets grow sidekick objects (see [`sidekick`]).
    pub refresh_triggers: BTreeSet<ObjectRef>,
    pub unlogged: bool,
}

impl MatView {
    pub fn new(name: impl Into<String>, template: impl Into<Template>) -> Self {
        Self {
            schema: "public".to_string(),
            name: name.into(),
            template: template.into(),
            deps_on: BTreeSet::new(),
            deps_on_unmanaged: BTreeSet::new(),
            refresh_concurrently: false,
            refresh_triggers: BTreeSet::new(),
            unlogged: false,
        }
    }

    /// Refresh-trigger references normalized to FQNs.
    pub fn refresh_trigger_fqns(&self) -> BTreeSet<Fqn> {
        self.refresh_triggers
            .iter()
            .map(|r| r.fqify("public"))
            .collect()
    }

    pub fn refresh_sql(&self, concurrent_allowed: bool) -> String {
        let concurrently = if concurrent_allowed && self.refresh_concurrently {
            "CONCURRENTLY "
        } else {
            ""
        };
        format!(
            "REFRESH MATERIALIZED VIEW {concurrently}{};",
            Fqn::new(&*self.schema, &*self.name).db_object_identity()
        )
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub schema: String,
    pub name: String,
    /// The effective argument signature PostgreSQL assigns — no defaults,
    /// normalized types. Part of the function's identity (overloads).
    pub arguments_signature: String,
    /// Creation-time arguments; may carry defaults and OUT parameters.
    /// Falls back to the identity signature when absent.
    pub arguments: Option<String>,
    pub template: Template,
    pub deps_on: BTreeSet<ObjectRef>,
    pub deps_on_unmanaged: BTreeSet<ObjectRef>,
    /// Marks functions generated to service a matview's refresh triggers.
    pub autorefresher: bool,
}

impl Function {
    pub fn new(name: impl Into<String>, template: impl Into<Template>) -> Self {
        Self {
            schema: "public".to_string(),
            name: name.into(),
            arguments_signature: String::new(),
            arguments: None,
            template: template.into(),
            deps_on: BTreeSet::new(),
            deps_on_unmanaged: BTreeSet::new(),
            autorefresher: false,
        }
    }

    pub fn fqn(&self) -> Fqn {
        Fqn::with_args(&*self.schema, &*self.name, &*self.arguments_signature)
    }

    pub fn creation_arguments(&self) -> &str {
        self.arguments.as_deref().unwrap_or(&self.arguments_signature)
    }

    /// The identity used in CREATE FUNCTION, which may differ from the
    /// call-signature identity when `arguments` carries extras.
    pub fn creation_identity(&self) -> String {
        format!(
            "{}.{}({})",
            quote_ident(&self.schema),
            quote_ident(&self.name),
            self.creation_arguments()
        )
    }
}

#[derive(Debug, Clone)]
pub struct Trigger {
    /// Default schema for normalizing this trigger's references. The
    /// trigger itself lives in its table's namespace, not a schema.
    pub schema: String,
    pub name: String,
    pub on_table: ObjectRef,
    /// E.g. `BEFORE INSERT`, `AFTER UPDATE OR DELETE`.
    pub condition: String,
    pub template: Template,
    pub deps_on: BTreeSet<ObjectRef>,
    pub deps_on_unmanaged: BTreeSet<ObjectRef>,
    pub autorefresher: bool,
}

impl Trigger {
    pub fn new(
        name: impl Into<String>,
        on_table: impl Into<ObjectRef>,
        condition: impl Into<String>,
        template: impl Into<Template>,
    ) -> Self {
        Self {
            schema: "public".to_string(),
            name: name.into(),
            on_table: on_table.into(),
            condition: condition.into(),
            template: template.into(),
            deps_on: BTreeSet::new(),
            deps_on_unmanaged: BTreeSet::new(),
            autorefresher: false,
        }
    }

    pub fn table_fqn(&self) -> Fqn {
        self.on_table.fqify(&self.schema)
    }

    /// Trigger names are only unique per table, so the graph identity
    /// records the target table's identity in the schema slot.
    pub fn fqn(&self) -> Fqn {
        Fqn::new(self.table_fqn().db_object_identity(), &*self.name)
    }
}

/// A samizdat reconstructed from database introspection. Identity and
/// implanted hash only — droppable, nothing more.
#[derive(Debug, Clone)]
pub struct Ghost {
    pub kind: EntityKind,
    pub schema: String,
    pub name: String,
    pub args: Option<String>,
    /// For triggers: the table the trigger is attached to.
    pub on_table: Option<Fqn>,
    pub implanted_hash: String,
}

#[derive(Debug, Clone)]
pub enum Samizdat {
    View(View),
    MatView(MatView),
    Function(Function),
    Trigger(Trigger),
    Table(Table),
    Ghost(Ghost),
}

impl Samizdat {
    pub fn kind(&self) -> EntityKind {
        match self {
            Samizdat::View(_) => EntityKind::View,
            Samizdat::MatView(_) => EntityKind::MatView,
            Samizdat::Function(_) => EntityKind::Function,
            Samizdat::Trigger(_) => EntityKind::Trigger,
            Samizdat::Table(_) => EntityKind::Table,
            Samizdat::Ghost(ghost) => ghost.kind,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Samizdat::View(sd) => &sd.name,
            Samizdat::MatView(sd) => &sd.name,
            Samizdat::Function(sd) => &sd.name,
            Samizdat::Trigger(sd) => &sd.name,
            Samizdat::Table(sd) => &sd.name,
            Samizdat::Ghost(sd) => &sd.name,
        }
    }

    pub fn fqn(&self) -> Fqn {
        match self {
            Samizdat::View(sd) => Fqn::new(&*sd.schema, &*sd.name),
            Samizdat::MatView(sd) => Fqn::new(&*sd.schema, &*sd.name),
            Samizdat::Table(sd) => Fqn::new(&*sd.schema, &*sd.name),
            Samizdat::Function(sd) => sd.fqn(),
            Samizdat::Trigger(sd) => sd.fqn(),
            Samizdat::Ghost(sd) => match (sd.kind, &sd.on_table) {
                (EntityKind::Trigger, Some(table)) => {
                    Fqn::new(table.db_object_identity(), &*sd.name)
                }
                (EntityKind::Function, _) => Fqn::with_args(
                    &*sd.schema,
                    &*sd.name,
                    sd.args.clone().unwrap_or_default(),
                ),
                _ => Fqn::new(&*sd.schema, &*sd.name),
            },
        }
    }

    pub fn display_name(&self) -> String {
        nodenamefmt(&self.fqn())
    }

    pub fn is_autorefresher(&self) -> bool {
        match self {
            Samizdat::Function(sd) => sd.autorefresher,
            Samizdat::Trigger(sd) => sd.autorefresher,
            _ => false,
        }
    }

    pub fn template(&self) -> Option<&Template> {
        match self {
            Samizdat::View(sd) => Some(&sd.template),
            Samizdat::MatView(sd) => Some(&sd.template),
            Samizdat::Function(sd) => Some(&sd.template),
            Samizdat::Trigger(sd) => Some(&sd.template),
            Samizdat::Table(sd) => Some(&sd.template),
            Samizdat::Ghost(_) => None,
        }
    }

    fn default_schema(&self) -> &str {
        match self {
            Samizdat::View(sd) => &sd.schema,
            Samizdat::MatView(sd) => &sd.schema,
            Samizdat::Function(sd) => &sd.schema,
            Samizdat::Trigger(sd) => &sd.schema,
            Samizdat::Table(sd) => &sd.schema,
            Samizdat::Ghost(sd) => &sd.schema,
        }
    }

    fn raw_deps_on(&self) -> Option<&BTreeSet<ObjectRef>> {
        match self {
            Samizdat::View(sd) => Some(&sd.deps_on),
            Samizdat::MatView(sd) => Some(&sd.deps_on),
            Samizdat::Function(sd) => Some(&sd.deps_on),
            Samizdat::Trigger(sd) => Some(&sd.deps_on),
            Samizdat::Table(sd) => Some(&sd.deps_on),
            Samizdat::Ghost(_) => None,
        }
    }

    fn raw_deps_on_unmanaged(&self) -> Option<&BTreeSet<ObjectRef>> {
        match self {
            Samizdat::View(sd) => Some(&sd.deps_on_unmanaged),
            Samizdat::MatView(sd) => Some(&sd.deps_on_unmanaged),
            Samizdat::Function(sd) => Some(&sd.deps_on_unmanaged),
            Samizdat::Trigger(sd) => Some(&sd.deps_on_unmanaged),
            Samizdat::Table(sd) => Some(&sd.deps_on_unmanaged),
            Samizdat::Ghost(_) => None,
        }
    }

    pub fn deps_on_fqns(&self) -> BTreeSet<Fqn> {
        let default_schema = self.default_schema();
        self.raw_deps_on()
            .map(|deps| deps.iter().map(|d| d.fqify(default_schema)).collect())
            .unwrap_or_default()
    }

    /// Unmanaged dependencies; a trigger's target table is always one.
    pub fn deps_on_unmanaged_fqns(&self) -> BTreeSet<Fqn> {
        let default_schema = self.default_schema();
        let mut fqns: BTreeSet<Fqn> = self
            .raw_deps_on_unmanaged()
            .map(|deps| deps.iter().map(|d| d.fqify(default_schema)).collect())
            .unwrap_or_default();
        if let Samizdat::Trigger(trigger) = self {
            fqns.insert(trigger.table_fqn());
        }
        fqns
    }

    pub fn refresh_trigger_fqns(&self) -> BTreeSet<Fqn> {
        match self {
            Samizdat::MatView(sd) => sd.refresh_trigger_fqns(),
            _ => BTreeSet::new(),
        }
    }

    /// The hash that defines logical identity for reconciliation: same
    /// hash, same object. Ghosts report what the database comment said.
    pub fn definition_hash(&self) -> String {
        match self {
            Samizdat::Ghost(ghost) => ghost.implanted_hash.clone(),
            Samizdat::Function(function) => md5_hex(&format!(
                "{}|{}|{}",
                function.template.resolve(),
                function.fqn().db_object_identity(),
                function.creation_identity()
            )),
            _ => md5_hex(&format!(
                "{}|{}",
                self.template().expect("non-ghost carries a template").resolve(),
                self.fqn().db_object_identity()
            )),
        }
    }

    /// Stable work-item identity for the reconciler: fixed inputs yield the
    /// same id in every process.
    pub fn head_id(&self) -> String {
        match self {
            Samizdat::Trigger(trigger) => {
                let table = trigger.table_fqn();
                md5_hex(&format!(
                    "{}|{}|{}|{}|{}",
                    table.schema,
                    trigger.name,
                    self.kind().token(),
                    table.object_name,
                    self.definition_hash()
                ))
            }
            Samizdat::Ghost(ghost) if ghost.kind == EntityKind::Trigger => {
                let table = ghost.on_table.clone().unwrap_or_else(|| {
                    Fqn::new(&*ghost.schema, "")
                });
                md5_hex(&format!(
                    "{}|{}|{}|{}|{}",
                    table.schema,
                    ghost.name,
                    ghost.kind.token(),
                    table.object_name,
                    ghost.implanted_hash
                ))
            }
            _ => md5_hex(&format!(
                "{}|{}|{}|{}",
                self.default_schema(),
                self.name(),
                self.kind().token(),
                self.definition_hash()
            )),
        }
    }

    /// The JSON descriptor stored in the database object's COMMENT.
    pub fn dbinfo(&self) -> Result<String, SamizdatError> {
        if matches!(self, Samizdat::Ghost(_)) {
            return Err(SamizdatError::TemplateUnavailable(self.display_name()));
        }
        let info = DbInfo {
            dbsamizdat: DbInfoBody {
                version: DBINFO_VERSION,
                created: chrono::Utc::now().timestamp(),
                definition_hash: self.definition_hash(),
            },
        };
        Ok(serde_json::to_string(&info).expect("dbinfo serializes"))
    }

    /// The placeholder substitutions `create_sql` applies, also surfaced in
    /// database error context.
    pub fn substitutions(&self) -> Option<BTreeMap<&'static str, String>> {
        let identity = self.fqn().db_object_identity();
        match self {
            Samizdat::View(_) => Some(BTreeMap::from([
                ("preamble", format!("CREATE VIEW {identity} AS")),
                ("postamble", String::new()),
                ("samizdatname", identity),
            ])),
            Samizdat::Table(table) => {
                let unlogged = if table.unlogged { "UNLOGGED " } else { "" };
                Some(BTreeMap::from([
                    ("preamble", format!("CREATE {unlogged}TABLE {identity}")),
                    ("postamble", String::new()),
                    ("samizdatname", identity),
                ]))
            }
            Samizdat::MatView(matview) => {
                let unlogged = if matview.unlogged { "UNLOGGED " } else { "" };
                Some(BTreeMap::from([
                    (
                        "preamble",
                        format!("CREATE {unlogged}MATERIALIZED VIEW {identity} AS"),
                    ),
                    ("postamble", "WITH NO DATA".to_string()),
                    ("samizdatname", identity),
                ]))
            }
            Samizdat::Function(function) => Some(BTreeMap::from([
                (
                    "preamble",
                    format!("CREATE FUNCTION {}", function.creation_identity()),
                ),
                ("samizdatname", identity),
            ])),
            Samizdat::Trigger(trigger) => Some(BTreeMap::from([
                (
                    "preamble",
                    format!(
                        "CREATE TRIGGER {} {} ON {}",
                        quote_ident(&trigger.name),
                        trigger.condition,
                        trigger.table_fqn().db_object_identity()
                    ),
                ),
                ("samizdatname", trigger.name.clone()),
            ])),
            Samizdat::Ghost(_) => None,
        }
    }

    /// SQL to create this object. Ghosts cannot be created.
    pub fn create_sql(&self) -> Result<String, SamizdatError> {
        let substitutions = self
            .substitutions()
            .ok_or_else(|| SamizdatError::TemplateUnavailable(self.display_name()))?;
        let template = self
            .template()
            .ok_or_else(|| SamizdatError::TemplateUnavailable(self.display_name()))?;
        Ok(template.expand(&substitutions))
    }

    /// SQL to drop this object. Always CASCADE: the in-database dependency
    /// tree below user objects is unknown to us.
    pub fn drop_sql(&self, if_exists: bool) -> String {
        let if_exists = if if_exists { "IF EXISTS " } else { "" };
        match self {
            Samizdat::Trigger(trigger) => format!(
                "DROP TRIGGER {if_exists}{} ON {} CASCADE;",
                quote_ident(&trigger.name),
                trigger.table_fqn().db_object_identity()
            ),
            Samizdat::Ghost(ghost) if ghost.kind == EntityKind::Trigger => {
                let table = ghost
                    .on_table
                    .clone()
                    .unwrap_or_else(|| Fqn::new(&*ghost.schema, ""));
                format!(
                    "DROP TRIGGER {if_exists}{} ON {} CASCADE;",
                    quote_ident(&ghost.name),
                    table.db_object_identity()
                )
            }
            _ => format!(
                "DROP {} {if_exists}{} CASCADE;",
                self.kind().sql_word(),
                self.fqn().db_object_identity()
            ),
        }
    }

    /// `COMMENT ON ... IS '<dbinfo>'`. The JSON payload goes through the
    /// session's literal substitution so it survives arbitrary content.
    pub fn sign_sql(&self, session: &dyn Session) -> Result<String, SamizdatError> {
        let payload = self.dbinfo()?;
        let sql = match self {
            Samizdat::Trigger(trigger) => format!(
                "COMMENT ON TRIGGER {} ON {} IS $1;",
                quote_ident(&trigger.name),
                trigger.table_fqn().db_object_identity()
            ),
            _ => format!(
                "COMMENT ON {} {} IS $1;",
                self.kind().sql_word(),
                self.fqn().db_object_identity()
            ),
        };
        Ok(session.mogrify(&sql, &[payload.as_str()]))
    }

    /// Refresh SQL, for materialized views only. `CONCURRENTLY` requires
    /// both the declaration and the caller to allow it (never on first
    /// population, which happens WITH NO DATA).
    pub fn refresh_sql(&self, concurrent_allowed: bool) -> Option<String> {
        match self {
            Samizdat::MatView(matview) => Some(matview.refresh_sql(concurrent_allowed)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fakes::FakeSession;

    fn simple_view() -> Samizdat {
        Samizdat::View(View::new("V", "${preamble}\nSELECT 1\n${postamble}"))
    }

    #[test]
    fn view_create_sql() {
        let sql = simple_view().create_sql().unwrap();
        assert_eq!(sql, "CREATE VIEW \"public\".\"V\" AS\nSELECT 1\n");
    }

    #[test]
    fn matview_create_sql_ends_with_no_data() {
        let sd = Samizdat::MatView(MatView::new("M", "${preamble} SELECT 1 ${postamble}"));
        assert_eq!(
            sd.create_sql().unwrap(),
            "CREATE MATERIALIZED VIEW \"public\".\"M\" AS SELECT 1 WITH NO DATA"
        );
    }

    #[test]
    fn unlogged_matview_and_table() {
        let mv = Samizdat::MatView(MatView {
            unlogged: true,
            ..MatView::new("M", "${preamble} SELECT 1 ${postamble}")
        });
        assert!(mv.create_sql().unwrap().starts_with("CREATE UNLOGGED MATERIALIZED VIEW"));

        let table = Samizdat::Table(Table {
            unlogged: true,
            ..Table::new("T", "${preamble} (id int) ${postamble}")
        });
        assert!(table.create_sql().unwrap().starts_with("CREATE UNLOGGED TABLE"));
    }

    #[test]
    fn function_create_uses_creation_identity() {
        let sd = Samizdat::Function(Function {
            arguments_signature: "x integer".to_string(),
            arguments: Some("x integer DEFAULT 7".to_string()),
            ..Function::new("f", "${preamble} RETURNS integer AS $$ SELECT x $$ LANGUAGE SQL;")
        });
        let sql = sd.create_sql().unwrap();
        assert!(sql.starts_with("CREATE FUNCTION \"public\".\"f\"(x integer DEFAULT 7)"));
        // but identity (and the signed comment) carry the bare signature
        assert_eq!(sd.fqn().db_object_identity(), "\"public\".\"f\"(x integer)");
    }

    #[test]
    fn trigger_sql_targets_its_table() {
        let sd = Samizdat::Trigger(Trigger::new(
            "audit",
            ("app", "events"),
            "AFTER INSERT",
            "${preamble}\nFOR EACH ROW EXECUTE PROCEDURE \"app\".\"log\"();",
        ));
        let create = sd.create_sql().unwrap();
        assert!(create.starts_with(
            "CREATE TRIGGER \"audit\" AFTER INSERT ON \"app\".\"events\""
        ));
        assert_eq!(
            sd.drop_sql(false),
            "DROP TRIGGER \"audit\" ON \"app\".\"events\" CASCADE;"
        );
    }

    #[test]
    fn drop_sql_cascades_and_honors_if_exists() {
        assert_eq!(
            simple_view().drop_sql(false),
            "DROP VIEW \"public\".\"V\" CASCADE;"
        );
        assert_eq!(
            simple_view().drop_sql(true),
            "DROP VIEW IF EXISTS \"public\".\"V\" CASCADE;"
        );
    }

    #[test]
    fn definition_hash_matches_recipe() {
        let sd = simple_view();
        let expected = md5_hex("${preamble}\nSELECT 1\n${postamble}|\"public\".\"V\"");
        assert_eq!(sd.definition_hash(), expected);
    }

    #[test]
    fn function_hash_covers_creation_identity() {
        let base = Function {
            arguments_signature: "x integer".to_string(),
            ..Function::new("f", "${preamble} RETURNS integer AS $$ SELECT 1 $$ LANGUAGE SQL;")
        };
        let with_defaults = Function {
            arguments: Some("x integer DEFAULT 7".to_string()),
            ..base.clone()
        };
        assert_ne!(
            Samizdat::Function(base).definition_hash(),
            Samizdat::Function(with_defaults).definition_hash()
        );
    }

    #[test]
    fn head_id_is_stable_and_hash_sensitive() {
        let a = simple_view();
        let b = simple_view();
        assert_eq!(a.head_id(), b.head_id());

        let changed = Samizdat::View(View::new("V", "${preamble}\nSELECT 2\n${postamble}"));
        assert_ne!(a.head_id(), changed.head_id());
    }

    #[test]
    fn sign_sql_quotes_the_payload() {
        let session = FakeSession::new();
        let sql = simple_view().sign_sql(&session).unwrap();
        assert!(sql.starts_with("COMMENT ON VIEW \"public\".\"V\" IS '{\"dbsamizdat\""));
        assert!(sql.contains("\"version\":1"));
        assert!(sql.contains(&format!(
            "\"definition_hash\":\"{}\"",
            simple_view().definition_hash()
        )));
        assert!(sql.trim_end().ends_with("';"));
    }

    #[test]
    fn refresh_sql_concurrency_rules() {
        let mv = MatView {
            refresh_concurrently: true,
            ..MatView::new("M", "${preamble} SELECT 1 ${postamble}")
        };
        let sd = Samizdat::MatView(mv);
        assert_eq!(
            sd.refresh_sql(true).unwrap(),
            "REFRESH MATERIALIZED VIEW CONCURRENTLY \"public\".\"M\";"
        );
        // first population is WITH NO DATA, so the caller forbids CONCURRENTLY
        assert_eq!(
            sd.refresh_sql(false).unwrap(),
            "REFRESH MATERIALIZED VIEW \"public\".\"M\";"
        );
        assert!(simple_view().refresh_sql(true).is_none());
    }

    #[test]
    fn ghost_supports_drop_only() {
        let ghost = Samizdat::Ghost(Ghost {
            kind: EntityKind::View,
            schema: "public".to_string(),
            name: "V".to_string(),
            args: None,
            on_table: None,
            implanted_hash: "abc".to_string(),
        });
        assert_eq!(ghost.drop_sql(true), "DROP VIEW IF EXISTS \"public\".\"V\" CASCADE;");
        assert_eq!(ghost.definition_hash(), "abc");
        assert!(matches!(
            ghost.create_sql(),
            Err(SamizdatError::TemplateUnavailable(_))
        ));
        let session = FakeSession::new();
        assert!(ghost.sign_sql(&session).is_err());
    }

    #[test]
    fn ghost_head_id_matches_declared_counterpart() {
        let declared = simple_view();
        let ghost = Samizdat::Ghost(Ghost {
            kind: EntityKind::View,
            schema: "public".to_string(),
            name: "V".to_string(),
            args: None,
            on_table: None,
            implanted_hash: declared.definition_hash(),
        });
        assert_eq!(declared.head_id(), ghost.head_id());
    }

    #[test]
    fn trigger_ghost_head_id_matches_declared_counterpart() {
        let declared = Samizdat::Trigger(Trigger::new(
            "audit",
            ("app", "events"),
            "AFTER INSERT",
            "${preamble} FOR EACH ROW EXECUTE PROCEDURE \"app\".\"log\"();",
        ));
        let ghost = Samizdat::Ghost(Ghost {
            kind: EntityKind::Trigger,
            schema: "app".to_string(),
            name: "audit".to_string(),
            args: None,
            on_table: Some(Fqn::new("app", "events")),
            implanted_hash: declared.definition_hash(),
        });
        assert_eq!(declared.head_id(), ghost.head_id());
    }

    #[test]
    fn function_overloads_have_distinct_fqns() {
        let a = Function {
            arguments_signature: "x integer".to_string(),
            ..Function::new("f", "${preamble} RETURNS integer AS $$ SELECT 1 $$ LANGUAGE SQL;")
        };
        let b = Function {
            arguments_signature: "x text".to_string(),
            ..a.clone()
        };
        assert_ne!(a.fqn(), b.fqn());
    }
}
