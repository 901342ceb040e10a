use dispatch_board::{Board, BoloId, NewBolo};

use super::{ExitCode, print_json};

#[derive(clap::Args)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// List BOLO alerts, newest first
    List {
        /// Prints the alerts in JSON format
        #[arg(long)]
        json: bool,

        /// Show only active alerts
        #[arg(short, long)]
        active: bool,
    },
    /// Raise a new BOLO alert
    Create {
        /// What to look out for
        title: String,

        /// Vehicle plate, if any
        #[arg(short, long, default_value = "")]
        plate: String,

        /// Free-form description
        #[arg(short, long, default_value = "")]
        note: String,

        /// Create the alert already inactive
        #[arg(long)]
        inactive: bool,
    },
    /// Delete a BOLO alert
    Delete {
        /// BOLO ID
        id: String,
    },
}

pub async fn main(board: &Board, args: Args) -> anyhow::Result<ExitCode> {
    match args.command {
        Command::List { json, active } => {
            let snapshot = board.snapshot();
            let bolos: Vec<_> = snapshot
                .bolos
                .iter()
                .filter(|bolo| !active || bolo.active)
                .collect();
            if json {
                print_json(&bolos)?;
            } else {
                println!(
                    "{:<36} | {:<16} | {:<6} | {:<10} | {}",
                    "ID", "Created", "Active", "Plate", "Title"
                );
                for bolo in bolos {
                    println!(
                        "{:<36} | {:<16} | {:<6} | {:<10} | {}",
                        bolo.id,
                        bolo.created_at.format("%Y-%m-%d %H:%M").to_string(),
                        if bolo.active { "yes" } else { "no" },
                        bolo.plate,
                        bolo.title
                    );
                    if !bolo.note.is_empty() {
                        println!("    {}", bolo.note);
                    }
                }
            }
        }
        Command::Create {
            title,
            plate,
            note,
            inactive,
        } => {
            let new = NewBolo {
                title,
                plate,
                note,
                active: !inactive,
            };
            match board.create_bolo(new).await {
                Ok(id) => println!("{}", id),
                Err(err) => {
                    eprintln!("{}", err);
                    return Ok(ExitCode::FaultOrArgsError);
                }
            }
        }
        Command::Delete { id } => {
            let id = BoloId::from(id.as_str());
            if board.snapshot().bolo(&id).is_none() {
                eprintln!("BOLO with ID {} not found", id);
                return Ok(ExitCode::RequestUnsatisfied);
            }
            board.delete_bolo(&id).await;
        }
    }
    Ok(ExitCode::Ok)
}
