//! Build preference pairs from a scored-task file with the default settings.
//!
//! Usage: build-pairs input.jsonl output.jsonl

use qe_prefs::PreferenceBuilder;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

const USAGE: &str = "Usage: build-pairs input.jsonl output.jsonl";

fn setup_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn main() -> ExitCode {
    let args: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    let [input, output] = args.as_slice() else {
        eprintln!("{USAGE}");
        return ExitCode::from(1);
    };

    setup_logging();

    match PreferenceBuilder::default().run(input, output) {
        Ok(stats) => {
            println!(
                "Wrote {} pairs from {} scored tasks to {}",
                stats.pairs,
                stats.input_tasks,
                output.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Failed to build pairs");
            ExitCode::from(1)
        }
    }
}
