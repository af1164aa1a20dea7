//! `diff`: report differences between declared and live state.
//!
//! Exit code is `100 + flags`: flag 1 when the database has extra objects,
//! flag 2 when the code does, so 101, 102 or 103.

use console::style;
use itertools::Itertools;

use crate::db::session::Session;
use crate::error::SamizdatError;
use crate::graph;
use crate::reconcile::dbstate_equals_definedstate;
use crate::samizdat::Samizdat;

use super::{RunContext, max_namelen, vprint};

fn statefmt(state: &[Samizdat], prefix: &str, width: usize) -> String {
    state
        .iter()
        .sorted_by_key(|sd| sd.display_name())
        .map(|sd| {
            format!(
                "{prefix}{:<17}\t{:<width$}\t{}",
                sd.kind().sql_word(),
                sd.display_name(),
                sd.definition_hash()
            )
        })
        .join("\n")
}

pub async fn cmd_diff(
    session: &mut dyn Session,
    samizdats: &[Samizdat],
    ctx: &RunContext,
) -> Result<u8, SamizdatError> {
    let ordered = graph::prepare(samizdats)?;
    session.begin().await?;
    let comparison = dbstate_equals_definedstate(session, &ordered).await?;
    session.rollback().await?;

    if comparison.issame() {
        vprint(ctx, &format!("{}", style("No differences.").green()));
        return Ok(0);
    }

    let width = max_namelen(
        comparison
            .excess_dbstate
            .iter()
            .chain(comparison.excess_definedstate.iter()),
    );
    if !comparison.excess_dbstate.is_empty() {
        println!(
            "{}",
            statefmt(&comparison.excess_dbstate, "Not in samizdats:\t", width)
        );
    }
    if !comparison.excess_definedstate.is_empty() {
        println!(
            "{}",
            statefmt(&comparison.excess_definedstate, "Not in database:   \t", width)
        );
    }

    let mut flags = 0u8;
    if !comparison.excess_dbstate.is_empty() {
        flags |= 1;
    }
    if !comparison.excess_definedstate.is_empty() {
        flags |= 2;
    }
    Ok(100 + flags)
}
