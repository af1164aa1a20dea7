//! YAML samizdat definition files — the standalone CLI's discovery
//! adapter.
//!
//! ```yaml
//! samizdats:
//!   - kind: view
//!     name: recent_signups
//!     sql: |
//!       ${preamble}
//!       SELECT * FROM users WHERE created_at > now() - interval '7 days'
//!       ${postamble}
//!     deps_on_unmanaged: [public.users]
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::SamizdatError;
use crate::ident::ObjectRef;
use crate::samizdat::{Function, MatView, Samizdat, Table, Template, Trigger, View};

use super::Discovery;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionsFile {
    samizdats: Vec<DefinitionEntry>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DefinitionKind {
    View,
    Matview,
    Function,
    Trigger,
    Table,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionEntry {
    kind: DefinitionKind,
    name: String,
    #[serde(default = "default_schema")]
    schema: String,
    sql: String,
    #[serde(default)]
    deps_on: Vec<String>,
    #[serde(default)]
    deps_on_unmanaged: Vec<String>,

    // functions
    #[serde(default)]
    arguments_signature: Option<String>,
    #[serde(default)]
    arguments: Option<String>,

    // triggers
    #[serde(default)]
    on_table: Option<String>,
    #[serde(default)]
    condition: Option<String>,

    // materialized views
    #[serde(default)]
    refresh_concurrently: bool,
    #[serde(default)]
    refresh_triggers: Vec<String>,

    // tables and materialized views
    #[serde(default)]
    unlogged: bool,
}

fn default_schema() -> String {
    "public".to_string()
}

fn refs(raw: &[String]) -> BTreeSet<ObjectRef> {
    raw.iter().map(|s| ObjectRef::parse(s)).collect()
}

impl DefinitionEntry {
    fn into_samizdat(self, path: &Path) -> Result<Samizdat, SamizdatError> {
        let definition_error = |message: String| SamizdatError::Definitions {
            path: path.display().to_string(),
            message,
        };
        let deps_on = refs(&self.deps_on);
        let deps_on_unmanaged = refs(&self.deps_on_unmanaged);
        let template = Template::new(self.sql);

        Ok(match self.kind {
            DefinitionKind::View => Samizdat::View(View {
                schema: self.schema,
                name: self.name,
                template,
                deps_on,
                deps_on_unmanaged,
            }),
            DefinitionKind::Table => Samizdat::Table(Table {
                schema: self.schema,
                name: self.name,
                template,
                deps_on,
                deps_on_unmanaged,
                unlogged: self.unlogged,
            }),
            DefinitionKind::Matview => Samizdat::MatView(MatView {
                schema: self.schema,
                name: self.name,
                template,
                deps_on,
                deps_on_unmanaged,
                refresh_concurrently: self.refresh_concurrently,
                refresh_triggers: refs(&self.refresh_triggers),
                unlogged: self.unlogged,
            }),
            DefinitionKind::Function => Samizdat::Function(Function {
                schema: self.schema,
                name: self.name,
                arguments_signature: self.arguments_signature.unwrap_or_default(),
                arguments: self.arguments,
                template,
                deps_on,
                deps_on_unmanaged,
                autorefresher: false,
            }),
            DefinitionKind::Trigger => {
                let on_table = self.on_table.ok_or_else(|| {
                    definition_error(format!("trigger {} is missing on_table", self.name))
                })?;
                let condition = self.condition.ok_or_else(|| {
                    definition_error(format!("trigger {} is missing condition", self.name))
                })?;
                Samizdat::Trigger(Trigger {
                    schema: self.schema,
                    name: self.name,
                    on_table: ObjectRef::parse(&on_table),
                    condition,
                    template,
                    deps_on,
                    deps_on_unmanaged,
                    autorefresher: false,
                })
            }
        })
    }
}

/// Parse one or more YAML definition files into a samizdat set.
#[derive(Debug, Clone)]
pub struct DefinitionFiles {
    paths: Vec<PathBuf>,
}

impl DefinitionFiles {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl Discovery for DefinitionFiles {
    fn discover(&self) -> Result<Vec<Samizdat>, SamizdatError> {
        let mut samizdats = Vec::new();
        for path in &self.paths {
            let content =
                std::fs::read_to_string(path).map_err(|e| SamizdatError::Definitions {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            let parsed: DefinitionsFile =
                serde_yaml::from_str(&content).map_err(|e| SamizdatError::Definitions {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            for entry in parsed.samizdats {
                samizdats.push(entry.into_samizdat(path)?);
            }
        }
        Ok(samizdats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::EntityKind;

    fn parse(yaml: &str) -> Result<Vec<Samizdat>, SamizdatError> {
        let parsed: DefinitionsFile = serde_yaml::from_str(yaml).map_err(|e| {
            SamizdatError::Definitions {
                path: "<inline>".to_string(),
                message: e.to_string(),
            }
        })?;
        parsed
            .samizdats
            .into_iter()
            .map(|entry| entry.into_samizdat(Path::new("<inline>")))
            .collect()
    }

    #[test]
    fn parses_a_view_with_dependencies() {
        let samizdats = parse(
            r#"
samizdats:
  - kind: view
    name: V
    sql: "${preamble} SELECT 1 ${postamble}"
    deps_on: [Base]
    deps_on_unmanaged: [public.users]
"#,
        )
        .unwrap();
        assert_eq!(samizdats.len(), 1);
        assert_eq!(samizdats[0].kind(), EntityKind::View);
        assert_eq!(samizdats[0].deps_on_fqns().len(), 1);
        assert_eq!(samizdats[0].deps_on_unmanaged_fqns().len(), 1);
    }

    #[test]
    fn parses_matview_and_function_attributes() {
        let samizdats = parse(
            r#"
samizdats:
  - kind: matview
    name: M
    schema: analytics
    sql: "${preamble} SELECT 1 ${postamble}"
    refresh_concurrently: true
    refresh_triggers: [public.users]
    unlogged: true
  - kind: function
    name: f
    sql: "${preamble} RETURNS integer AS $$ SELECT x $$ LANGUAGE SQL;"
    arguments_signature: "x integer"
    arguments: "x integer DEFAULT 3"
"#,
        )
        .unwrap();
        match &samizdats[0] {
            Samizdat::MatView(matview) => {
                assert_eq!(matview.schema, "analytics");
                assert!(matview.refresh_concurrently);
                assert!(matview.unlogged);
                assert_eq!(matview.refresh_triggers.len(), 1);
            }
            other => panic!("expected matview, got {other:?}"),
        }
        match &samizdats[1] {
            Samizdat::Function(function) => {
                assert_eq!(function.arguments_signature, "x integer");
                assert_eq!(function.creation_arguments(), "x integer DEFAULT 3");
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn trigger_requires_table_and_condition() {
        let err = parse(
            r#"
samizdats:
  - kind: trigger
    name: trg
    sql: "${preamble} FOR EACH ROW EXECUTE PROCEDURE f();"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, SamizdatError::Definitions { .. }));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse(
            r#"
samizdats:
  - kind: view
    name: V
    sql: "SELECT 1"
    no_such_field: true
"#,
        )
        .unwrap_err();
        assert!(matches!(err, SamizdatError::Definitions { .. }));
    }
}
