//! The transactional plan executor.
//!
//! Consumes `(action, samizdat, sql)` steps and applies each under a
//! savepoint, with targeted recovery when signing a function fails (the
//! one failure we can diagnose further by asking the database what
//! signature it actually assigned).

use std::time::Instant;

use clap::ValueEnum;

use crate::db::introspect::get_dbstate;
use crate::db::session::Session;
use crate::error::{
    DatabaseFailure, FunctionSignatureFailure, SamizdatError, sqlfmt,
};
use crate::ident::EntityKind;
use crate::samizdat::Samizdat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TxDiscipline {
    /// Commit after every samizdat-level action (except a bare create,
    /// which always commits together with its signature).
    Checkpoint,
    /// One transaction for the whole plan.
    Jumbo,
    /// One transaction, rolled back at the end.
    Dryrun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Sign,
    Drop,
    Refresh,
    Nuke,
}

impl Action {
    pub fn word(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Sign => "sign",
            Action::Drop => "drop",
            Action::Refresh => "refresh",
            Action::Nuke => "nuke",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Step {
    pub action: Action,
    pub samizdat: Samizdat,
    pub sql: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutionOptions {
    pub discipline: TxDiscipline,
    pub verbosity: u8,
    /// Width for aligning names in progress output.
    pub max_namelen: usize,
    pub timing: bool,
}

/// Run a plan. Each step: ensure a transaction is open, set a savepoint,
/// execute, release. Under `checkpoint` every non-create step commits —
/// a create never commits alone, so no unsigned object outlives its
/// transaction.
pub async fn run_steps(
    session: &mut dyn Session,
    steps: &[Step],
    opts: &ExecutionOptions,
) -> Result<(), SamizdatError> {
    let mut previous = Instant::now();
    for (ix, step) in steps.iter().enumerate() {
        if opts.verbosity >= 1 {
            if ix > 0 {
                finish_progress_line(opts, &mut previous);
            }
            eprint!(
                "{:<7} {:<17} {:<width$} ...",
                step.action.word(),
                step.samizdat.kind().sql_word(),
                step.samizdat.display_name(),
                width = opts.max_namelen
            );
            if opts.verbosity >= 2 {
                eprintln!("\n\n{}\n", sqlfmt(&step.sql));
            }
        }

        let savepoint = format!("action_{}", step.action.word());
        session.begin().await?;
        session.savepoint(&savepoint).await?;
        if let Err(failure) = session.execute(&step.sql).await {
            if step.action == Action::Sign {
                // back out to a non-error state so we can still query
                session.rollback_to_savepoint(&savepoint).await?;
                let candidates = signature_candidates(session, &step.samizdat).await?;
                return Err(signature_error(&step.samizdat, candidates));
            }
            return Err(database_error(step, failure));
        }
        session.release_savepoint(&savepoint).await?;
        if opts.discipline == TxDiscipline::Checkpoint && step.action != Action::Create {
            session.commit().await?;
        }
    }
    if !steps.is_empty() && opts.verbosity >= 1 {
        finish_progress_line(opts, &mut previous);
    }
    Ok(())
}

/// Close out the run according to the discipline.
pub async fn finalize(
    session: &mut dyn Session,
    discipline: TxDiscipline,
) -> Result<(), SamizdatError> {
    match discipline {
        TxDiscipline::Dryrun => session.rollback().await?,
        TxDiscipline::Jumbo | TxDiscipline::Checkpoint => session.commit().await?,
    }
    Ok(())
}

fn finish_progress_line(opts: &ExecutionOptions, previous: &mut Instant) {
    if opts.timing {
        eprintln!(" {:.2}s", previous.elapsed().as_secs_f64());
    } else {
        eprintln!();
    }
    *previous = Instant::now();
}

fn database_error(step: &Step, failure: crate::db::session::SessionError) -> SamizdatError {
    let template = match step.action {
        Action::Create => step
            .samizdat
            .template()
            .map(|template| template.resolve().to_string()),
        _ => None,
    };
    let substitutions = match step.action {
        Action::Create => step.samizdat.substitutions(),
        _ => None,
    };
    let function_signature = match &step.samizdat {
        Samizdat::Function(function) => Some(function.arguments_signature.clone()),
        _ => None,
    };
    SamizdatError::Database(Box::new(DatabaseFailure {
        action: step.action.word(),
        samizdat: step.samizdat.display_name(),
        sql: step.sql.clone(),
        error: failure,
        template,
        substitutions,
        function_signature,
    }))
}

fn signature_error(samizdat: &Samizdat, candidates: Vec<String>) -> SamizdatError {
    let declared_arguments = match samizdat {
        Samizdat::Function(function) => function.creation_arguments().to_string(),
        _ => String::new(),
    };
    SamizdatError::FunctionSignature(Box::new(FunctionSignatureFailure {
        samizdat: samizdat.display_name(),
        create_sql: samizdat
            .create_sql()
            .unwrap_or_else(|_| "<unavailable>".to_string()),
        identity: samizdat.fqn().db_object_identity(),
        declared_arguments,
        candidates,
    }))
}

/// What signatures does the database hold under this function's (schema,
/// name)? Checks the owned dbstate first; a function created in the
/// current transaction is not signed yet, so fall back to pg_proc.
async fn signature_candidates(
    session: &mut dyn Session,
    samizdat: &Samizdat,
) -> Result<Vec<String>, SamizdatError> {
    let Samizdat::Function(function) = samizdat else {
        return Ok(Vec::new());
    };

    let mut candidates: Vec<String> = get_dbstate(session)
        .await?
        .into_iter()
        .filter(|state| {
            state.kind == EntityKind::Function
                && state.schema == function.schema
                && state.name == function.name
        })
        .filter_map(|state| state.args)
        .collect();

    if candidates.is_empty() {
        let sql = session.mogrify(
            "SELECT pg_catalog.pg_get_function_identity_arguments(p.oid)::text\n\
             FROM pg_catalog.pg_proc p\n\
             JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace\n\
             WHERE n.nspname = $1\n\
             \x20 AND p.proname = $2\n\
             \x20 AND p.prokind NOT IN ('a', 'w', 'p')",
            &[function.schema.as_str(), function.name.as_str()],
        );
        candidates = session
            .fetch_all(&sql)
            .await?
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .filter(|args| !args.is_empty())
            .collect();
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fakes::FakeSession;
    use crate::samizdat::{Function, View};

    fn quiet(discipline: TxDiscipline) -> ExecutionOptions {
        ExecutionOptions {
            discipline,
            verbosity: 0,
            max_namelen: 0,
            timing: false,
        }
    }

    fn create_step(name: &str) -> Step {
        let samizdat = Samizdat::View(View::new(name, "${preamble} SELECT 1 ${postamble}"));
        let sql = samizdat.create_sql().unwrap();
        Step {
            action: Action::Create,
            samizdat,
            sql,
        }
    }

    fn sign_step(session: &FakeSession, name: &str) -> Step {
        let samizdat = Samizdat::View(View::new(name, "${preamble} SELECT 1 ${postamble}"));
        let sql = samizdat.sign_sql(session).unwrap();
        Step {
            action: Action::Sign,
            samizdat,
            sql,
        }
    }

    #[tokio::test]
    async fn wraps_each_action_in_a_savepoint() {
        let mut session = FakeSession::new();
        let steps = vec![create_step("V")];
        run_steps(&mut session, &steps, &quiet(TxDiscipline::Jumbo))
            .await
            .unwrap();

        let executed = session.executed.clone();
        assert_eq!(executed[0], "BEGIN;");
        assert_eq!(executed[1], "SAVEPOINT action_create;");
        assert!(executed[2].starts_with("CREATE VIEW"));
        assert_eq!(executed[3], "RELEASE SAVEPOINT action_create;");
        // jumbo never commits mid-plan
        assert!(session.executed_matching("COMMIT").is_empty());
    }

    #[tokio::test]
    async fn checkpoint_commits_after_everything_but_create() {
        let mut session = FakeSession::new();
        let sign = sign_step(&session, "V");
        let steps = vec![create_step("V"), sign];
        run_steps(&mut session, &steps, &quiet(TxDiscipline::Checkpoint))
            .await
            .unwrap();

        // exactly one commit: after the sign, never after the bare create
        assert_eq!(session.executed_matching("COMMIT;").len(), 1);
        let commit_pos = session
            .executed
            .iter()
            .position(|sql| sql == "COMMIT;")
            .unwrap();
        let sign_pos = session
            .executed
            .iter()
            .position(|sql| sql.starts_with("COMMENT ON"))
            .unwrap();
        assert!(commit_pos > sign_pos);
    }

    #[tokio::test]
    async fn failed_create_reports_template_context() {
        let mut session = FakeSession::new();
        session.fail_matching("CREATE VIEW", "syntax error at or near \"$\"");
        let steps = vec![create_step("V")];
        let err = run_steps(&mut session, &steps, &quiet(TxDiscipline::Jumbo))
            .await
            .unwrap_err();
        match err {
            SamizdatError::Database(failure) => {
                assert_eq!(failure.action, "create");
                assert!(failure.template.is_some());
                assert!(failure.substitutions.is_some());
                let rendered = failure.to_string();
                assert!(rendered.contains("While executing:"));
                assert!(rendered.contains("Unsubstituted template variable"));
            }
            other => panic!("expected Database error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_sign_recovers_savepoint_and_lists_candidates() {
        let mut session = FakeSession::new();
        session.fail_matching("COMMENT ON", "function does not exist");
        session.stub_query(
            "p.proname = 'f'",
            vec![vec![Some("x integer".into())]],
        );

        let samizdat = Samizdat::Function(Function {
            arguments_signature: "x int".to_string(),
            ..Function::new(
                "f",
                "${preamble} RETURNS integer AS $$ SELECT x $$ LANGUAGE SQL;",
            )
        });
        let sql = samizdat.sign_sql(&session).unwrap();
        let steps = vec![Step {
            action: Action::Sign,
            samizdat,
            sql,
        }];

        let err = run_steps(&mut session, &steps, &quiet(TxDiscipline::Jumbo))
            .await
            .unwrap_err();
        match err {
            SamizdatError::FunctionSignature(failure) => {
                assert_eq!(failure.candidates, vec!["x integer".to_string()]);
                assert!(failure.identity.contains("(x int)"));
            }
            other => panic!("expected FunctionSignature error, got {other:?}"),
        }
        assert!(
            !session
                .executed_matching("ROLLBACK TO SAVEPOINT action_sign;")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn dryrun_finalize_rolls_back() {
        let mut session = FakeSession::new();
        finalize(&mut session, TxDiscipline::Dryrun).await.unwrap();
        assert_eq!(session.executed, vec!["ROLLBACK;".to_string()]);

        let mut session = FakeSession::new();
        finalize(&mut session, TxDiscipline::Jumbo).await.unwrap();
        assert_eq!(session.executed, vec!["COMMIT;".to_string()]);
    }
}
