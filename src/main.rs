use std::any::Any;
use std::panic;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use resume_generator::{Config, DEFAULT_TEMPLATE, Error, ResumeGenerator, logging};

#[derive(Parser)]
#[command(name = "resume-generator")]
#[command(about = "Generate professional PDF resumes from JSON data")]
struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a PDF resume from JSON data using an HTML template
    Generate {
        /// Path to JSON file containing resume data
        #[arg(long = "json")]
        json_file: PathBuf,

        /// Template to use
        #[arg(long, default_value = DEFAULT_TEMPLATE)]
        template: String,

        /// Output PDF file path
        #[arg(long = "output")]
        output_file: PathBuf,

        /// Custom templates directory
        #[arg(long)]
        templates_dir: Option<PathBuf>,

        /// TOML file with page and font settings
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List available resume templates
    ListTemplates {
        /// Custom templates directory
        #[arg(long)]
        templates_dir: Option<PathBuf>,
    },

    /// Show JSON requirements and features for a specific template
    TemplateInfo {
        template_name: String,

        /// Custom templates directory
        #[arg(long)]
        templates_dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    // A panic is logged and then reported like any other failure.
    panic::set_hook(Box::new(|info| tracing::error!("panic: {info}")));

    match panic::catch_unwind(|| run(cli.command)) {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            report(&e);
            ExitCode::FAILURE
        }
        Err(payload) => {
            eprintln!("Unexpected error: {}", panic_message(&*payload));
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), Error> {
    match command {
        Command::Generate {
            json_file,
            template,
            output_file,
            templates_dir,
            config,
        } => {
            let mut generator = ResumeGenerator::new(templates_dir);
            if let Some(path) = config {
                generator = generator.with_config(Config::load(&path)?);
            }

            // Fail before touching the JSON or the output path
            generator.resolve_template(&template)?;

            println!("Generating resume using '{template}' template...");
            generator.generate_resume(&json_file, &output_file, &template)?;
            println!("Resume generated successfully: {}", output_file.display());
        }
        Command::ListTemplates { templates_dir } => {
            let templates = ResumeGenerator::new(templates_dir).available_templates();
            if templates.is_empty() {
                println!("No templates found.");
                return Ok(());
            }

            println!("Available templates:");
            for template in templates {
                println!("  - {template}");
            }
        }
        Command::TemplateInfo {
            template_name,
            templates_dir,
        } => {
            let info = ResumeGenerator::new(templates_dir).describe_template(&template_name)?;
            println!("{info}");
        }
    }
    Ok(())
}

fn report(error: &Error) {
    match error {
        Error::TemplateNotFound { name, available } => {
            eprintln!("Error: Template '{name}' not found.");
            eprintln!("Available templates: {}", available.join(", "));
        }
        other => eprintln!("Error: {other}"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
