//! Conversion queue CLI entry point.

use clap::Parser;
use convq::cli::commands;
use convq::cli::{Cli, Commands};
use convq::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.quiet {
        convq::QUIET.store(true, std::sync::atomic::Ordering::Relaxed);
    }
    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
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

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info"),
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
    let db = cli.db.as_ref();

    match &cli.command {
        Commands::Migrate { from } => commands::migrate::execute(*from, db, json),
        Commands::Save { file } => commands::queue::save(file, db, cli.batch_size, json),
        Commands::List => commands::queue::list(db, json),
        Commands::Next => commands::queue::next(db, json),
        Commands::Get {
            creative_instance_id,
        } => commands::queue::get(creative_instance_id, db, json),
        Commands::MarkProcessed {
            creative_instance_id,
        } => commands::queue::mark_processed(creative_instance_id, db, json),
        Commands::Delete {
            creative_instance_id,
        } => commands::queue::delete(creative_instance_id, db, json),
        Commands::Version => commands::version::execute(json),
    }
}
