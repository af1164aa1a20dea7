//! Library entry points for hosts that embed dbsamizdat instead of using
//! the CLI. Each function opens its own session, runs one command, and
//! returns. The conservative default discipline for embedded use is
//! [`TxDiscipline::Jumbo`].

use crate::commands::{self, RunContext};
use crate::db::session::PgSession;
use crate::error::SamizdatError;
use crate::executor::TxDiscipline;
use crate::samizdat::Samizdat;

async fn connect(dburl: &str) -> Result<PgSession, SamizdatError> {
    Ok(PgSession::connect(dburl).await?)
}

pub async fn sync(
    dburl: &str,
    samizdats: Vec<Samizdat>,
    discipline: TxDiscipline,
) -> Result<(), SamizdatError> {
    let mut session = connect(dburl).await?;
    let ctx = RunContext {
        discipline,
        verbosity: 0,
    };
    commands::cmd_sync(&mut session, &samizdats, &ctx).await
}

pub async fn refresh(
    dburl: &str,
    samizdats: Vec<Samizdat>,
    discipline: TxDiscipline,
    belownodes: &[String],
) -> Result<(), SamizdatError> {
    let mut session = connect(dburl).await?;
    let ctx = RunContext {
        discipline,
        verbosity: 0,
    };
    commands::cmd_refresh(&mut session, &samizdats, belownodes, &ctx).await
}

pub async fn nuke(dburl: &str, discipline: TxDiscipline) -> Result<(), SamizdatError> {
    let mut session = connect(dburl).await?;
    let ctx = RunContext {
        discipline,
        verbosity: 0,
    };
    commands::cmd_nuke(&mut session, &ctx).await
}

/// Returns the diff exit code: 0 when states match, otherwise `100 +
/// flags` (1 = database extras, 2 = code extras).
pub async fn diff(dburl: &str, samizdats: Vec<Samizdat>) -> Result<u8, SamizdatError> {
    let mut session = connect(dburl).await?;
    let ctx = RunContext {
        discipline: TxDiscipline::Dryrun,
        verbosity: 0,
    };
    commands::cmd_diff(&mut session, &samizdats, &ctx).await
}
