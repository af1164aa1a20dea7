//! `nuke`: drop every database object we own.
//!
//! CASCADE-reliant: user objects that happen to depend on an owned object
//! go down with it, since the in-database dependency tree is unknown.

use crate::db::introspect::{get_dbstate, ghost};
use crate::db::session::Session;
use crate::error::SamizdatError;
use crate::executor::{Action, Step, finalize, run_steps};
use crate::samizdat::Samizdat;

use super::{RunContext, max_namelen};

pub async fn cmd_nuke(session: &mut dyn Session, ctx: &RunContext) -> Result<(), SamizdatError> {
    session.begin().await?;

    let owned: Vec<Samizdat> = get_dbstate(session).await?.iter().filter_map(ghost).collect();
    let width = max_namelen(owned.iter());
    let steps: Vec<Step> = owned
        .iter()
        .map(|sd| Step {
            action: Action::Nuke,
            samizdat: sd.clone(),
            sql: sd.drop_sql(true),
        })
        .collect();
    run_steps(session, &steps, &ctx.exec_options(width, false)).await?;
    finalize(session, ctx.discipline).await
}
