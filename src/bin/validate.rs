use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use resume_generator::{data, logging};

#[derive(Parser)]
#[command(name = "resume-validate")]
#[command(about = "Check resume JSON before generating a PDF")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate JSON file structure
    Validate {
        /// JSON file to check
        json_file: PathBuf,
    },
    /// Show example JSON structure
    Example,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(0);

    match cli.command {
        Command::Validate { json_file } => match data::load(&json_file) {
            Ok(_) => {
                println!("JSON file is valid!");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        },
        Command::Example => match serde_json::to_string_pretty(&data::example_document()) {
            Ok(example) => {
                println!("Example JSON structure:");
                println!("{example}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        },
    }
}
