//! Autogenerated helper objects for materialized views with
//! `refresh_triggers`: one trigger-returning function per view, plus one
//! statement-level trigger per listed table.

use std::collections::BTreeSet;

use crate::error::SamizdatError;
use crate::ident::{Fqn, ObjectRef};

use super::{Function, MatView, Samizdat, TRIGGER_DEPCOUNTER_WIDTH, Template, Trigger};

/// Expand a matview's sidekicks. `dep_order` is the view's 1-based index
/// among refresh-triggered matviews in dependency order; it is embedded,
/// zero-padded, in the trigger names so PostgreSQL's alphabetical trigger
/// ordering replays dependency order.
pub fn sidekicks_for(matview: &MatView, dep_order: u64) -> Result<Vec<Samizdat>, SamizdatError> {
    if matview.refresh_triggers.is_empty() {
        return Ok(Vec::new());
    }
    if dep_order > 10u64.pow(TRIGGER_DEPCOUNTER_WIDTH as u32) - 1 {
        return Err(SamizdatError::SidekickOverflow(dep_order));
    }

    let matview_fqn = Fqn::new(&*matview.schema, &*matview.name);
    let function = Function {
        schema: matview.schema.clone(),
        name: format!("{}_refresh", matview.name),
        arguments_signature: String::new(),
        arguments: None,
        template: Template::new(format!(
            "${{preamble}}\n\
             RETURNS trigger AS $THEBODY$\n\
             BEGIN\n\
             {}\n\
             RETURN NULL;\n\
             END;\n\
             $THEBODY$ LANGUAGE plpgsql;",
            matview.refresh_sql(true)
        )),
        deps_on: BTreeSet::from([ObjectRef::Qualified(matview_fqn)]),
        deps_on_unmanaged: BTreeSet::new(),
        autorefresher: true,
    };
    let function_fqn = function.fqn();
    let function_identity = function.creation_identity();

    let mut sidekicks = vec![Samizdat::Function(function)];
    for (ix, table) in matview.refresh_trigger_fqns().into_iter().enumerate() {
        sidekicks.push(Samizdat::Trigger(Trigger {
            schema: "public".to_string(),
            name: format!(
                "t{dep_order:0width$}_{ix}_autorefresh",
                width = TRIGGER_DEPCOUNTER_WIDTH
            ),
            on_table: ObjectRef::Qualified(table),
            condition: "AFTER UPDATE OR INSERT OR DELETE OR TRUNCATE".to_string(),
            template: Template::new(format!(
                "${{preamble}}\nFOR EACH STATEMENT EXECUTE PROCEDURE {function_identity};"
            )),
            deps_on: BTreeSet::from([ObjectRef::Qualified(function_fqn.clone())]),
            deps_on_unmanaged: BTreeSet::new(),
            autorefresher: true,
        }));
    }
    Ok(sidekicks)
}
