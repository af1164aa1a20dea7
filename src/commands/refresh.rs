//! `refresh`: refresh declared materialized views in dependency order.

use std::collections::BTreeSet;

use crate::db::introspect::{get_dbstate, ghost};
use crate::db::session::Session;
use crate::error::SamizdatError;
use crate::executor::{Action, Step, finalize, run_steps};
use crate::graph;
use crate::ident::{EntityKind, Fqn, ObjectRef};
use crate::samizdat::Samizdat;

use super::{RunContext, max_namelen};

/// With `belownodes`, only matviews in the subtree depending on those
/// nodes are refreshed, and only those actually present in the database.
pub async fn cmd_refresh(
    session: &mut dyn Session,
    samizdats: &[Samizdat],
    belownodes: &[String],
    ctx: &RunContext,
) -> Result<(), SamizdatError> {
    let ordered = graph::prepare(samizdats)?;
    session.begin().await?;

    let mut matviews: Vec<&Samizdat> = ordered
        .iter()
        .filter(|sd| sd.kind() == EntityKind::MatView)
        .collect();

    if !belownodes.is_empty() {
        let roots: BTreeSet<Fqn> = belownodes
            .iter()
            .map(|node| ObjectRef::parse(node).fqify("public"))
            .collect();
        let subtree = graph::subtree_depends(&ordered, &roots)?;
        matviews.retain(|sd| subtree.contains(&sd.fqn()));

        let present: BTreeSet<Fqn> = get_dbstate(session)
            .await?
            .iter()
            .filter_map(ghost)
            .filter(|sd| sd.kind() == EntityKind::MatView)
            .map(|sd| sd.fqn())
            .collect();
        matviews.retain(|sd| present.contains(&sd.fqn()));
    }

    let width = max_namelen(matviews.iter().copied());
    let steps: Vec<Step> = matviews
        .iter()
        .filter_map(|sd| {
            sd.refresh_sql(true).map(|sql| Step {
                action: Action::Refresh,
                samizdat: (*sd).clone(),
                sql,
            })
        })
        .collect();
    run_steps(session, &steps, &ctx.exec_options(width, true)).await?;
    finalize(session, ctx.discipline).await
}
