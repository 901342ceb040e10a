use dispatch_board::{Board, GroupId, Snapshot, UnitIdSet};
use serde::Serialize;

use super::{ExitCode, print_json};

#[derive(clap::Args)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// List all groups with their members
    List {
        /// Prints the groups in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Create a group of units
    Create {
        /// Display name of the group
        name: String,

        /// IDs of the member units
        #[arg(short, long = "unit")]
        units: Vec<String>,
    },
    /// Delete a group. Calls keep the units assigned through it
    Delete {
        /// Group ID
        id: String,
    },
}

#[derive(Serialize)]
struct GroupMember<'a> {
    id: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct GroupInfo<'a> {
    id: &'a str,
    name: &'a str,
    members: Vec<GroupMember<'a>>,
}

pub fn member_names(snapshot: &Snapshot, ids: &UnitIdSet) -> String {
    ids.iter()
        .map(|id| snapshot.unit_name(id))
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn main(board: &Board, args: Args) -> anyhow::Result<ExitCode> {
    match args.command {
        Command::List { json } => {
            let snapshot = board.snapshot();
            if json {
                let groups: Vec<_> = snapshot
                    .groups
                    .iter()
                    .map(|group| GroupInfo {
                        id: group.id.as_str(),
                        name: &group.name,
                        members: group
                            .unit_ids
                            .iter()
                            .map(|id| GroupMember {
                                id: id.as_str(),
                                name: snapshot.unit_name(id),
                            })
                            .collect(),
                    })
                    .collect();
                print_json(&groups)?;
            } else {
                println!("{:<36} | {:<20} | {}", "ID", "Name", "Members");
                for group in snapshot.groups.iter() {
                    println!(
                        "{:<36} | {:<20} | {}",
                        group.id,
                        group.name,
                        member_names(&snapshot, &group.unit_ids)
                    )
                }
            }
        }
        Command::Create { name, units } => {
            let members = units.iter().map(|id| id.as_str().into()).collect();
            match board.create_group(&name, members).await {
                Ok(id) => println!("{}", id),
                Err(err) => {
                    eprintln!("{}", err);
                    return Ok(ExitCode::FaultOrArgsError);
                }
            }
        }
        Command::Delete { id } => {
            let id = GroupId::from(id.as_str());
            if board.snapshot().group(&id).is_none() {
                eprintln!("Group with ID {} not found", id);
                return Ok(ExitCode::RequestUnsatisfied);
            }
            board.delete_group(&id).await;
        }
    }
    Ok(ExitCode::Ok)
}
