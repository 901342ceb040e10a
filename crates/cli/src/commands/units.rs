use dispatch_board::{Board, NewUnit, Subdivision, UnitId, UnitStatus, UnitType};

use super::{ExitCode, print_json};

#[derive(clap::Args)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// List all units
    List {
        /// Prints the units in JSON format
        #[arg(long)]
        json: bool,

        /// Show only units with this status
        #[arg(short, long, value_parser = UnitStatus::parse)]
        status: Option<UnitStatus>,
    },
    /// Create a new unit
    Create {
        /// Display name of the unit
        name: String,

        /// Agency of the unit (LASD, CHP, LAPD, DHS)
        #[arg(short = 't', long = "type", default_value = "LASD")]
        kind: UnitType,

        /// LAPD subdivision (HC, SUP, PU). Ignored for other agencies
        #[arg(short = 'd', long)]
        subdivision: Option<Subdivision>,

        /// Initial status
        #[arg(short, long, value_parser = UnitStatus::parse, default_value = "Available")]
        status: UnitStatus,
    },
    /// Delete a unit, removing it from every group and call
    Delete {
        /// Unit ID
        id: String,
    },
    /// Change the status of a unit
    Status {
        /// Unit ID
        id: String,

        /// New status (Available, Busy, On Scene, Unavailable, Off Duty)
        #[arg(value_parser = UnitStatus::parse)]
        status: UnitStatus,
    },
}

fn print_units(board: &Board, status: Option<UnitStatus>) {
    let snapshot = board.snapshot();

    println!(
        "{:<36} | {:<20} | {:<5} | {:<4} | {}",
        "ID", "Name", "Type", "Sub", "Status"
    );
    for unit in snapshot
        .units
        .iter()
        .filter(|unit| status.is_none_or(|status| unit.status == status))
    {
        println!(
            "{:<36} | {:<20} | {:<5} | {:<4} | {}",
            unit.id,
            unit.name,
            unit.kind,
            unit.subdivision.map(|sub| sub.to_string()).unwrap_or_default(),
            unit.status
        )
    }
}

fn ensure_exists(board: &Board, id: &UnitId) -> Option<ExitCode> {
    if board.snapshot().unit(id).is_none() {
        eprintln!("Unit with ID {} not found", id);
        return Some(ExitCode::RequestUnsatisfied);
    }
    None
}

pub async fn main(board: &Board, args: Args) -> anyhow::Result<ExitCode> {
    match args.command {
        Command::List { json, status } => {
            if json {
                let snapshot = board.snapshot();
                let units: Vec<_> = snapshot
                    .units
                    .iter()
                    .filter(|unit| status.is_none_or(|status| unit.status == status))
                    .collect();
                print_json(&units)?;
            } else {
                print_units(board, status);
            }
        }
        Command::Create {
            name,
            kind,
            subdivision,
            status,
        } => {
            let id = match board
                .create_unit(NewUnit {
                    name,
                    kind,
                    subdivision,
                    status,
                })
                .await
            {
                Ok(id) => id,
                Err(err) => {
                    eprintln!("{}", err);
                    return Ok(ExitCode::FaultOrArgsError);
                }
            };
            println!("{}", id);
        }
        Command::Delete { id } => {
            let id = UnitId::from(id.as_str());
            if let Some(code) = ensure_exists(board, &id) {
                return Ok(code);
            }
            board.delete_unit(&id).await;
        }
        Command::Status { id, status } => {
            let id = UnitId::from(id.as_str());
            if let Some(code) = ensure_exists(board, &id) {
                return Ok(code);
            }
            board.set_unit_status(&id, status).await;
        }
    }
    Ok(ExitCode::Ok)
}
