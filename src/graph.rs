//! The dependency graph over a declared samizdat set: validation,
//! deterministic topological ordering, sidekick expansion, and subtree
//! selection.
//!
//! Nodes are FQNs; edges run from dependency to dependent.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;

use crate::error::SamizdatError;
use crate::ident::{Fqn, nodenamefmt, validate_name};
use crate::samizdat::sidekick::sidekicks_for;
use crate::samizdat::Samizdat;

/// Enforce the declared-set invariants: valid identifiers, unique FQNs,
/// resolvable managed dependencies, managed/unmanaged disjointness, and
/// no dependency cycles (named when found).
pub fn sanity_check(samizdats: &[Samizdat]) -> Result<(), SamizdatError> {
    for sd in samizdats {
        validate_name(sd.name(), &sd.display_name())?;
    }

    let mut identity_counts: BTreeMap<String, usize> = BTreeMap::new();
    for sd in samizdats {
        *identity_counts
            .entry(sd.fqn().db_object_identity())
            .or_insert(0) += 1;
    }
    let clashes: Vec<String> = identity_counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(identity, _)| identity)
        .collect();
    if !clashes.is_empty() {
        return Err(SamizdatError::NameClash(clashes));
    }

    let declared: BTreeSet<Fqn> = samizdats.iter().map(Samizdat::fqn).collect();

    let dangling: BTreeSet<Fqn> = samizdats
        .iter()
        .flat_map(|sd| sd.deps_on_fqns())
        .filter(|dep| !declared.contains(dep))
        .collect();
    if !dangling.is_empty() {
        return Err(SamizdatError::DanglingReference(
            dangling.iter().map(nodenamefmt).collect(),
        ));
    }

    let confused: BTreeSet<Fqn> = samizdats
        .iter()
        .flat_map(|sd| sd.deps_on_unmanaged_fqns())
        .filter(|dep| declared.contains(dep))
        .collect();
    if !confused.is_empty() {
        return Err(SamizdatError::TypeConfusion(
            confused.iter().map(nodenamefmt).collect(),
        ));
    }

    for sd in samizdats {
        if sd.deps_on_fqns().contains(&sd.fqn()) {
            return Err(SamizdatError::DependencyCycle(vec![sd.display_name()]));
        }
    }

    let mut graph: DiGraph<Fqn, ()> = DiGraph::new();
    let mut indices = BTreeMap::new();
    for fqn in &declared {
        indices.insert(fqn.clone(), graph.add_node(fqn.clone()));
    }
    for sd in samizdats {
        let to = indices[&sd.fqn()];
        for dep in sd.deps_on_fqns() {
            graph.add_edge(indices[&dep], to, ());
        }
    }
    for scc in tarjan_scc(&graph) {
        if scc.len() > 1 {
            let mut cyclists: Vec<String> =
                scc.into_iter().map(|ix| nodenamefmt(&graph[ix])).collect();
            cyclists.sort();
            return Err(SamizdatError::DependencyCycle(cyclists));
        }
    }

    Ok(())
}

/// Topologically sort into creation-safe order. Within a layer the order
/// is lexicographic on the FQN, so repeated runs produce identical
/// sequences.
pub fn depsort(samizdats: &[Samizdat]) -> Result<Vec<Samizdat>, SamizdatError> {
    let by_fqn: BTreeMap<Fqn, &Samizdat> =
        samizdats.iter().map(|sd| (sd.fqn(), sd)).collect();
    let mut pending: BTreeMap<Fqn, BTreeSet<Fqn>> = samizdats
        .iter()
        .map(|sd| {
            let deps = sd
                .deps_on_fqns()
                .into_iter()
                .filter(|dep| by_fqn.contains_key(dep))
                .collect();
            (sd.fqn(), deps)
        })
        .collect();

    let mut ordered = Vec::with_capacity(samizdats.len());
    while !pending.is_empty() {
        let layer: Vec<Fqn> = pending
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(fqn, _)| fqn.clone())
            .collect();
        if layer.is_empty() {
            return Err(SamizdatError::DependencyCycle(
                pending.keys().map(nodenamefmt).collect(),
            ));
        }
        for fqn in &layer {
            pending.remove(fqn);
        }
        for deps in pending.values_mut() {
            for fqn in &layer {
                deps.remove(fqn);
            }
        }
        ordered.extend(layer.iter().map(|fqn| by_fqn[fqn].clone()));
    }
    Ok(ordered)
}

/// Sort, then splice each refresh-triggered matview's sidekicks in right
/// after it. A shared counter assigns the dependency-order index that ends
/// up in sidekick trigger names.
pub fn depsort_with_sidekicks(samizdats: &[Samizdat]) -> Result<Vec<Samizdat>, SamizdatError> {
    let sorted = depsort(samizdats)?;
    let mut counter: u64 = 0;
    let mut expanded = Vec::with_capacity(sorted.len());
    for sd in sorted {
        let sidekicks = match &sd {
            Samizdat::MatView(matview) if !matview.refresh_triggers.is_empty() => {
                counter += 1;
                sidekicks_for(matview, counter)?
            }
            _ => Vec::new(),
        };
        expanded.push(sd);
        expanded.extend(sidekicks);
    }
    Ok(expanded)
}

/// Validate, sort and expand a discovered set — the standard preamble of
/// every command.
pub fn prepare(samizdats: &[Samizdat]) -> Result<Vec<Samizdat>, SamizdatError> {
    sanity_check(samizdats)?;
    let expanded = depsort_with_sidekicks(samizdats)?;
    sanity_check(&expanded)?;
    Ok(expanded)
}

/// Every FQN in play: declared samizdats and their unmanaged references.
pub fn node_dump(samizdats: &[Samizdat]) -> BTreeSet<Fqn> {
    samizdats
        .iter()
        .flat_map(|sd| {
            let mut nodes = sd.deps_on_unmanaged_fqns();
            nodes.insert(sd.fqn());
            nodes
        })
        .collect()
}

/// All FQNs transitively depending on any root (roots included). Unknown
/// roots are fatal.
pub fn subtree_depends(
    samizdats: &[Samizdat],
    roots: &BTreeSet<Fqn>,
) -> Result<BTreeSet<Fqn>, SamizdatError> {
    let known = node_dump(samizdats);
    let unknown: Vec<String> = roots.difference(&known).map(nodenamefmt).collect();
    if !unknown.is_empty() {
        return Err(SamizdatError::UnknownRootNodes(unknown));
    }

    let mut selected = roots.clone();
    loop {
        let mut grew = false;
        for sd in samizdats {
            let fqn = sd.fqn();
            if selected.contains(&fqn) {
                continue;
            }
            let depends_on_selected = sd
                .deps_on_fqns()
                .union(&sd.deps_on_unmanaged_fqns())
                .any(|dep| selected.contains(dep));
            if depends_on_selected {
                selected.insert(fqn);
                grew = true;
            }
        }
        if !grew {
            return Ok(selected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::ObjectRef;
    use crate::samizdat::{MatView, View};
    use std::collections::BTreeSet;

    fn view(name: &str, deps: &[&str]) -> Samizdat {
        Samizdat::View(View {
            deps_on: deps.iter().map(|d| ObjectRef::parse(d)).collect(),
            ..View::new(name, "${preamble} SELECT 1 ${postamble}")
        })
    }

    #[test]
    fn sorts_dependencies_first() {
        let set = vec![view("B", &["A"]), view("A", &[])];
        let ordered = depsort(&set).unwrap();
        let names: Vec<&str> = ordered.iter().map(Samizdat::name).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn sort_is_deterministic() {
        let set = vec![
            view("C", &[]),
            view("A", &[]),
            view("B", &["C"]),
            view("D", &["A", "C"]),
        ];
        let first: Vec<String> = depsort(&set)
            .unwrap()
            .iter()
            .map(|sd| sd.name().to_string())
            .collect();
        let second: Vec<String> = depsort(&set)
            .unwrap()
            .iter()
            .map(|sd| sd.name().to_string())
            .collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["A", "C", "B", "D"]);
    }

    #[test]
    fn name_clash_is_fatal() {
        let set = vec![view("A", &[]), view("A", &[])];
        assert!(matches!(
            sanity_check(&set),
            Err(SamizdatError::NameClash(_))
        ));
    }

    #[test]
    fn dangling_reference_is_fatal() {
        let set = vec![view("A", &["Missing"])];
        match sanity_check(&set) {
            Err(SamizdatError::DanglingReference(names)) => {
                assert_eq!(names, vec!["Missing".to_string()]);
            }
            other => panic!("expected DanglingReference, got {other:?}"),
        }
    }

    #[test]
    fn managed_unmanaged_overlap_is_fatal() {
        let mut confused = View::new("B", "${preamble} SELECT 1 ${postamble}");
        confused.deps_on_unmanaged.insert(ObjectRef::parse("A"));
        let set = vec![view("A", &[]), Samizdat::View(confused)];
        assert!(matches!(
            sanity_check(&set),
            Err(SamizdatError::TypeConfusion(_))
        ));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let set = vec![view("A", &["A"])];
        assert!(matches!(
            sanity_check(&set),
            Err(SamizdatError::DependencyCycle(_))
        ));
    }

    #[test]
    fn transitive_cycle_names_every_participant() {
        let set = vec![view("A", &["B"]), view("B", &["A"])];
        match sanity_check(&set) {
            Err(SamizdatError::DependencyCycle(names)) => {
                assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
            }
            other => panic!("expected DependencyCycle, got {other:?}"),
        }
    }

    #[test]
    fn sidekick_expansion_follows_the_matview() {
        let matview = Samizdat::MatView(MatView {
            refresh_triggers: BTreeSet::from([ObjectRef::parse("t")]),
            ..MatView::new("M", "${preamble} SELECT 1 ${postamble}")
        });
        let expanded = depsort_with_sidekicks(&[matview, view("A", &[])]).unwrap();
        let names: Vec<&str> = expanded.iter().map(Samizdat::name).collect();
        assert_eq!(names, vec!["A", "M", "M_refresh", "t00001_0_autorefresh"]);
    }

    #[test]
    fn sidekick_counter_is_shared_across_matviews() {
        let matview = |name: &str| {
            Samizdat::MatView(MatView {
                refresh_triggers: BTreeSet::from([ObjectRef::parse("t")]),
                ..MatView::new(name, "${preamble} SELECT 1 ${postamble}")
            })
        };
        let expanded = depsort_with_sidekicks(&[matview("M1"), matview("M2")]).unwrap();
        let trigger_names: Vec<&str> = expanded
            .iter()
            .filter(|sd| sd.kind() == crate::ident::EntityKind::Trigger)
            .map(Samizdat::name)
            .collect();
        assert_eq!(
            trigger_names,
            vec!["t00001_0_autorefresh", "t00002_0_autorefresh"]
        );
    }

    #[test]
    fn prepare_accepts_expanded_sets() {
        let matview = Samizdat::MatView(MatView {
            refresh_triggers: BTreeSet::from([ObjectRef::parse("t")]),
            ..MatView::new("M", "${preamble} SELECT 1 ${postamble}")
        });
        let prepared = prepare(&[matview]).unwrap();
        assert_eq!(prepared.len(), 3);
    }

    #[test]
    fn subtree_selects_transitive_dependents() {
        let mut base = View::new("Base", "${preamble} SELECT 1 ${postamble}");
        base.deps_on_unmanaged.insert(ObjectRef::parse("t"));
        let set = vec![
            Samizdat::View(base),
            view("Mid", &["Base"]),
            view("Top", &["Mid"]),
            view("Elsewhere", &[]),
        ];
        let roots = BTreeSet::from([ObjectRef::parse("t").fqify("public")]);
        let subtree = subtree_depends(&set, &roots).unwrap();
        let names: BTreeSet<String> = subtree.iter().map(nodenamefmt).collect();
        assert!(names.contains("t"));
        assert!(names.contains("Base"));
        assert!(names.contains("Mid"));
        assert!(names.contains("Top"));
        assert!(!names.contains("Elsewhere"));
    }

    #[test]
    fn unknown_subtree_roots_are_fatal() {
        let set = vec![view("A", &[])];
        let roots = BTreeSet::from([ObjectRef::parse("nope").fqify("public")]);
        assert!(matches!(
            subtree_depends(&set, &roots),
            Err(SamizdatError::UnknownRootNodes(_))
        ));
    }
}
