//! `printdot`: emit the dependency graph in GraphViz DOT.

use crate::error::SamizdatError;
use crate::graph;
use crate::graphvizdot;
use crate::samizdat::Samizdat;

pub fn cmd_printdot(samizdats: &[Samizdat]) -> Result<(), SamizdatError> {
    let ordered = graph::prepare(samizdats)?;
    println!("{}", graphvizdot::dot(&ordered).join("\n"));
    Ok(())
}
