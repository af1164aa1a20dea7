//! `sync`: make the database match the declared set.

use std::collections::BTreeSet;

use console::style;

use crate::db::session::Session;
use crate::error::SamizdatError;
use crate::executor::{Action, Step, finalize, run_steps};
use crate::graph;
use crate::ident::EntityKind;
use crate::reconcile::dbstate_equals_definedstate;
use crate::samizdat::Samizdat;

use super::{RunContext, max_namelen, vprint};

pub async fn cmd_sync(
    session: &mut dyn Session,
    samizdats: &[Samizdat],
    ctx: &RunContext,
) -> Result<(), SamizdatError> {
    let ordered = graph::prepare(samizdats)?;
    session.begin().await?;

    let mut comparison = dbstate_equals_definedstate(session, &ordered).await?;
    if comparison.issame() {
        vprint(ctx, &format!("{}", style("No differences, nothing to do.").green()));
        return Ok(());
    }

    let width = max_namelen(
        comparison
            .excess_dbstate
            .iter()
            .chain(comparison.excess_definedstate.iter()),
    );

    if !comparison.excess_dbstate.is_empty() {
        let drops: Vec<Step> = comparison
            .excess_dbstate
            .iter()
            .map(|sd| Step {
                action: Action::Drop,
                samizdat: sd.clone(),
                // IF EXISTS: an earlier drop may already have cascaded
                // through this object
                sql: sd.drop_sql(true),
            })
            .collect();
        run_steps(session, &drops, &ctx.exec_options(width, true)).await?;

        // cascading drops can take objects we still believed present;
        // re-read before planning the create pass
        comparison = dbstate_equals_definedstate(session, &ordered).await?;
    }

    if !comparison.excess_definedstate.is_empty() {
        let to_create: BTreeSet<String> = comparison
            .excess_definedstate
            .iter()
            .map(Samizdat::head_id)
            .collect();

        let mut creates = Vec::new();
        for sd in &ordered {
            // iterate the full ordering so creation happens in dependency order
            if !to_create.contains(&sd.head_id()) {
                continue;
            }
            creates.push(Step {
                action: Action::Create,
                samizdat: sd.clone(),
                sql: sd.create_sql()?,
            });
            creates.push(Step {
                action: Action::Sign,
                samizdat: sd.clone(),
                sql: sd.sign_sql(&*session)?,
            });
        }
        run_steps(session, &creates, &ctx.exec_options(width, true)).await?;

        let refreshes: Vec<Step> = ordered
            .iter()
            .filter(|sd| sd.kind() == EntityKind::MatView && to_create.contains(&sd.head_id()))
            .filter_map(|sd| {
                // freshly created WITH NO DATA, so the first population
                // must not be concurrent
                sd.refresh_sql(false).map(|sql| Step {
                    action: Action::Refresh,
                    samizdat: sd.clone(),
                    sql,
                })
            })
            .collect();
        if !refreshes.is_empty() {
            run_steps(session, &refreshes, &ctx.exec_options(width, true)).await?;
        }
    }

    finalize(session, ctx.discipline).await
}
