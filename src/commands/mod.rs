pub mod diff;
pub mod nuke;
pub mod printdot;
pub mod refresh;
pub mod sync;

pub use diff::cmd_diff;
pub use nuke::cmd_nuke;
pub use printdot::cmd_printdot;
pub use refresh::cmd_refresh;
pub use sync::cmd_sync;

use crate::executor::{ExecutionOptions, TxDiscipline};
use crate::samizdat::Samizdat;

/// Per-run settings shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct RunContext {
    pub discipline: TxDiscipline,
    /// 0 = quiet, 1 = normal, 2 = chatty (full SQL).
    pub verbosity: u8,
}

impl RunContext {
    pub(crate) fn exec_options(&self, max_namelen: usize, timing: bool) -> ExecutionOptions {
        ExecutionOptions {
            discipline: self.discipline,
            verbosity: self.verbosity,
            max_namelen,
            timing,
        }
    }
}

pub(crate) fn vprint(ctx: &RunContext, message: &str) {
    if ctx.verbosity >= 1 {
        eprintln!("{message}");
    }
}

pub(crate) fn max_namelen<'a>(samizdats: impl Iterator<Item = &'a Samizdat>) -> usize {
    samizdats
        .map(|sd| sd.display_name().len())
        .max()
        .unwrap_or(0)
}
