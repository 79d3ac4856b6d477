//! threadsync CLI entry point.

use clap::Parser;
use std::process::ExitCode;
use threadsync::cli::commands;
use threadsync::cli::{Cli, Commands};
use threadsync::error::Error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    init_tracing(cli.verbose, cli.quiet);

    // --json, or stdout piped somewhere other than a terminal
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,hyper=info,reqwest=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let db = cli.db.as_deref();
    let thread = cli.thread.as_deref();
    let token = cli.token.as_deref();

    match &cli.command {
        Commands::Init { force } => commands::init::execute(db, token, thread, *force, json),
        Commands::Pull => commands::pull::execute(db, thread, token, json),
        Commands::Update { participants } => {
            commands::update::execute(db, thread, token, *participants, json)
        }
        Commands::Participants => commands::participants::execute(db, thread, token, json),
        Commands::Report { kind, limit } => commands::report::execute(db, thread, kind, *limit, json),
        Commands::Status => commands::status::execute(db, thread, token, json),
        Commands::Version => commands::version::execute(json),
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
