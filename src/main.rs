use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use tracing_subscriber::{EnvFilter, fmt};

use dbsamizdat::commands::{self, RunContext};
use dbsamizdat::discovery::{DefinitionFiles, Discovery};
use dbsamizdat::db::session::PgSession;
use dbsamizdat::error::SamizdatError;
use dbsamizdat::executor::TxDiscipline;

/// The blissfully naive PostgreSQL database object manager.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Be quiet (minimal output)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Be verbose (full SQL on stderr)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ConnectionArgs {
    /// PostgreSQL connection URI, e.g. postgresql:///mydbname.
    /// Falls back to the DBURL environment variable.
    #[arg(env = "DBURL")]
    dburl: String,
}

#[derive(Args, Clone)]
struct DefinitionArgs {
    /// YAML files declaring the samizdat set
    #[arg(required = true)]
    definitions: Vec<PathBuf>,
}

impl DefinitionArgs {
    fn discover(&self) -> Result<Vec<dbsamizdat::Samizdat>, SamizdatError> {
        DefinitionFiles::new(self.definitions.clone()).discover()
    }
}

#[derive(Args, Clone)]
struct TxArgs {
    /// Transaction discipline: "checkpoint" commits after every
    /// samizdat-level action, "jumbo" runs one large transaction,
    /// "dryrun" runs one large transaction and rolls it back.
    #[arg(long, short = 't', value_enum, default_value = "checkpoint")]
    txdiscipline: TxDiscipline,
}

#[derive(Subcommand)]
enum Commands {
    /// Make it so!
    Sync {
        #[command(flatten)]
        tx: TxArgs,

        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(flatten)]
        definitions: DefinitionArgs,
    },

    /// Refresh materialized views, in dependency order
    Refresh {
        #[command(flatten)]
        tx: TxArgs,

        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(flatten)]
        definitions: DefinitionArgs,

        /// Limit to views depending on these nodes (usually tables)
        #[arg(long, short = 'b', num_args = 1.., value_name = "ENTITYNAMES")]
        belownodes: Vec<String>,
    },

    /// Drop all database objects carrying our signature. CASCADE-reliant:
    /// anything depending on them goes too.
    Nuke {
        #[command(flatten)]
        tx: TxArgs,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Show differences between declared and database state. Exits 101
    /// when the database has extra objects, 102 when the code does, 103
    /// for both.
    Diff {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(flatten)]
        definitions: DefinitionArgs,
    },

    /// Print the dependency graph in GraphViz format
    Printdot {
        #[command(flatten)]
        definitions: DefinitionArgs,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();
    initialize_logging(&cli);
    let verbosity = if cli.quiet {
        0
    } else if cli.verbose {
        2
    } else {
        1
    };

    let outcome = tokio::select! {
        outcome = run_main(cli.command, verbosity) => outcome,
        _ = wait_for_shutdown_signal() => {
            eprintln!("\nInterrupted.");
            return ExitCode::FAILURE;
        }
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(error) => {
            eprintln!("\nFATAL: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn initialize_logging(cli: &Cli) {
    let level = if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn run_main(command: Commands, verbosity: u8) -> Result<u8> {
    match command {
        Commands::Sync {
            tx,
            connection,
            definitions,
        } => {
            let samizdats = definitions.discover()?;
            let mut session = PgSession::connect(&connection.dburl).await?;
            let ctx = RunContext {
                discipline: tx.txdiscipline,
                verbosity,
            };
            commands::cmd_sync(&mut session, &samizdats, &ctx).await?;
            Ok(0)
        }
        Commands::Refresh {
            tx,
            connection,
            definitions,
            belownodes,
        } => {
            let samizdats = definitions.discover()?;
            let mut session = PgSession::connect(&connection.dburl).await?;
            let ctx = RunContext {
                discipline: tx.txdiscipline,
                verbosity,
            };
            commands::cmd_refresh(&mut session, &samizdats, &belownodes, &ctx).await?;
            Ok(0)
        }
        Commands::Nuke { tx, connection } => {
            let mut session = PgSession::connect(&connection.dburl).await?;
            let ctx = RunContext {
                discipline: tx.txdiscipline,
                verbosity,
            };
            commands::cmd_nuke(&mut session, &ctx).await?;
            Ok(0)
        }
        Commands::Diff {
            connection,
            definitions,
        } => {
            let samizdats = definitions.discover()?;
            let mut session = PgSession::connect(&connection.dburl).await?;
            let ctx = RunContext {
                discipline: TxDiscipline::Dryrun,
                verbosity,
            };
            let code = commands::cmd_diff(&mut session, &samizdats, &ctx).await?;
            Ok(code)
        }
        Commands::Printdot { definitions } => {
            let samizdats = definitions.discover()?;
            commands::cmd_printdot(&samizdats)?;
            Ok(0)
        }
    }
}
