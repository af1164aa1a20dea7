//! GraphViz DOT rendering of the dependency graph. Each kind gets its own
//! node shape; unmanaged references show up as yellow houses; autorefresh
//! relationships are dashed.

use std::collections::BTreeSet;

use crate::ident::{EntityKind, Fqn, nodenamefmt};
use crate::samizdat::Samizdat;

fn node_style(kind: EntityKind) -> (&'static str, &'static str) {
    match kind {
        EntityKind::View => ("box", "grey"),
        EntityKind::MatView => ("box3d", "red"),
        EntityKind::Function => ("hexagon", "olivedrab1"),
        EntityKind::Trigger => ("cds", "darkorchid1"),
        EntityKind::Table => ("box", "lightblue"),
    }
}

fn label(fqn: &Fqn) -> String {
    nodenamefmt(fqn).replace('"', "\\\"")
}

pub fn dot(samizdats: &[Samizdat]) -> Vec<String> {
    let mut lines = vec![
        "digraph dbsamizdat {".to_string(),
        "\trankdir=\"LR\";".to_string(),
        "\tnode [style=filled];".to_string(),
    ];

    let declared: BTreeSet<Fqn> = samizdats.iter().map(Samizdat::fqn).collect();
    let unmanaged: BTreeSet<Fqn> = samizdats
        .iter()
        .flat_map(|sd| {
            sd.deps_on_unmanaged_fqns()
                .into_iter()
                .chain(sd.refresh_trigger_fqns())
        })
        .filter(|fqn| !declared.contains(fqn))
        .collect();

    lines.push("\t{ rank=min;".to_string());
    for fqn in &unmanaged {
        lines.push(format!(
            "\t\t\"{}\" [shape=house, fillcolor=yellow];",
            label(fqn)
        ));
    }
    lines.push("\t}".to_string());

    for sd in samizdats {
        let (shape, fillcolor) = node_style(sd.kind());
        lines.push(format!(
            "\t\"{}\" [shape={shape}, fillcolor={fillcolor}];",
            label(&sd.fqn())
        ));
    }

    for sd in samizdats {
        let to = label(&sd.fqn());
        for dep in sd.deps_on_fqns().union(&sd.deps_on_unmanaged_fqns()) {
            lines.push(format!("\t\"{}\" -> \"{to}\";", label(dep)));
        }
        for table in sd.refresh_trigger_fqns() {
            lines.push(format!(
                "\t\"{}\" -> \"{to}\" [style=\"dashed\", arrowhead=\"dot\"];",
                label(&table)
            ));
        }
    }

    lines.push("}".to_string());
    lines
}
