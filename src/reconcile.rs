//! Reconciliation: compare the declared set against the live database.
//!
//! Identity is the `head_id` — a stable hash over (schema, name, kind,
//! definition hash). An object whose hash changed shows up in *both*
//! excess sets and is dropped and recreated; that pair is the fundamental
//! reconciliation unit.

use std::collections::BTreeSet;

use crate::db::introspect::{get_dbstate, ghost};
use crate::db::session::Session;
use crate::error::SamizdatError;
use crate::samizdat::Samizdat;

#[derive(Debug)]
pub struct StateComparison {
    /// In the database but not declared (or declared with another hash).
    pub excess_dbstate: Vec<Samizdat>,
    /// Declared but not in the database (or present with another hash).
    pub excess_definedstate: Vec<Samizdat>,
}

impl StateComparison {
    pub fn issame(&self) -> bool {
        self.excess_dbstate.is_empty() && self.excess_definedstate.is_empty()
    }
}

pub async fn dbstate_equals_definedstate(
    session: &mut dyn Session,
    declared: &[Samizdat],
) -> Result<StateComparison, SamizdatError> {
    let dbstate = get_dbstate(session).await?;
    let ghosts: Vec<Samizdat> = dbstate.iter().filter_map(ghost).collect();

    let declared_ids: BTreeSet<String> = declared.iter().map(Samizdat::head_id).collect();
    let db_ids: BTreeSet<String> = ghosts.iter().map(Samizdat::head_id).collect();

    Ok(StateComparison {
        excess_dbstate: ghosts
            .into_iter()
            .filter(|sd| !declared_ids.contains(&sd.head_id()))
            .collect(),
        excess_definedstate: declared
            .iter()
            .filter(|sd| !db_ids.contains(&sd.head_id()))
            .cloned()
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fakes::FakeSession;
    use crate::samizdat::View;

    fn declared_view(body: &str) -> Samizdat {
        Samizdat::View(View::new("V", format!("${{preamble}} {body} ${{postamble}}")))
    }

    fn db_row(name: &str, hash: &str) -> Vec<Option<String>> {
        vec![
            Some("public".into()),
            Some(name.into()),
            Some("VIEW".into()),
            Some(format!(
                r#"{{"dbsamizdat": {{"version": 1, "created": 1700000000, "definition_hash": "{hash}"}}}}"#
            )),
        ]
    }

    #[tokio::test]
    async fn matching_hashes_mean_issame() {
        let declared = declared_view("SELECT 1");
        let mut session = FakeSession::new();
        session.stub_query("relkind", vec![db_row("V", &declared.definition_hash())]);

        let comparison = dbstate_equals_definedstate(&mut session, &[declared])
            .await
            .unwrap();
        assert!(comparison.issame());
    }

    #[tokio::test]
    async fn missing_object_is_excess_definedstate() {
        let declared = declared_view("SELECT 1");
        let mut session = FakeSession::new();

        let comparison = dbstate_equals_definedstate(&mut session, &[declared])
            .await
            .unwrap();
        assert!(comparison.excess_dbstate.is_empty());
        assert_eq!(comparison.excess_definedstate.len(), 1);
    }

    #[tokio::test]
    async fn undeclared_object_is_excess_dbstate() {
        let mut session = FakeSession::new();
        session.stub_query("relkind", vec![db_row("Orphan", "cafe")]);

        let comparison = dbstate_equals_definedstate(&mut session, &[]).await.unwrap();
        assert_eq!(comparison.excess_dbstate.len(), 1);
        assert_eq!(comparison.excess_dbstate[0].name(), "Orphan");
        assert!(comparison.excess_definedstate.is_empty());
    }

    #[tokio::test]
    async fn changed_hash_lands_in_both_sets() {
        let old = declared_view("SELECT 1");
        let new = declared_view("SELECT 2");
        let mut session = FakeSession::new();
        session.stub_query("relkind", vec![db_row("V", &old.definition_hash())]);

        let comparison = dbstate_equals_definedstate(&mut session, &[new]).await.unwrap();
        assert_eq!(comparison.excess_dbstate.len(), 1);
        assert_eq!(comparison.excess_definedstate.len(), 1);
    }
}
