use clap::{Parser, Subcommand};
use pvsave_core::{IndexOutcome, NormalisedPayload, SaveService, DEFAULT_SAVE_DIR};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pvsave")]
#[command(about = "PV-One patient save folder tool")]
struct Cli {
    /// Save directory
    #[arg(long, global = true, env = "PV_SAVE_DIR", default_value = DEFAULT_SAVE_DIR)]
    dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a JSON document the same way the server does
    Save {
        /// Path to the JSON document
        file: PathBuf,
    },
    /// List indexed patients, newest first
    List,
    /// Show the filename a display name would be saved under
    Sanitize {
        /// Patient display name
        name: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Save { file }) => {
            let contents = std::fs::read_to_string(&file)?;
            let payload: serde_json::Value = serde_json::from_str(&contents)
                .map_err(|e| format!("Invalid JSON in {}: {}", file.display(), e))?;

            let service = SaveService::new(cli.dir);
            let saved = service.save_payload(payload)?;
            println!("Saved {} to {}", saved.filename, saved.path.display());

            match saved.index {
                IndexOutcome::Created | IndexOutcome::Rewritten => {}
                IndexOutcome::Appended { cause } => {
                    eprintln!("Warning: index rewrite failed, row appended: {}", cause)
                }
                IndexOutcome::Failed {
                    cause,
                    fallback: Some(fallback),
                } => eprintln!(
                    "Warning: index not updated: {}; append also failed: {}",
                    cause, fallback
                ),
                IndexOutcome::Failed {
                    cause,
                    fallback: None,
                } => eprintln!("Warning: index not updated: {}", cause),
            }
        }
        Some(Commands::List) => {
            let service = SaveService::new(cli.dir);
            let patients = service.list_patients()?;
            if patients.is_empty() {
                println!("No patients found.");
            } else {
                for patient in patients {
                    let saved_at = chrono::DateTime::from_timestamp_millis(patient.mtime)
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| patient.mtime.to_string());
                    println!(
                        "File: {}, Name: {}, Saved: {}",
                        patient.filename, patient.name, saved_at
                    );
                }
            }
        }
        Some(Commands::Sanitize { name }) => {
            let payload = serde_json::json!({ "name": name });
            println!("{}", NormalisedPayload::from_value(payload).filename());
        }
        None => {
            println!("Use 'pvsave --help' for commands");
        }
    }

    Ok(())
}
