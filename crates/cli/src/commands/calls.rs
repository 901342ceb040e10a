use dispatch_board::{
    Board, Call, CallId, CallOrigin, CallPatch, GroupId, NewCall, Priority, Snapshot, UnitId,
};

use super::{ExitCode, groups::member_names, print_json};

#[derive(clap::Args)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct CallFields {
    /// Street address
    #[arg(short, long)]
    address: Option<String>,

    /// Postal code
    #[arg(short = 'z', long)]
    postal: Option<String>,

    /// Priority (1/High, 2/Medium, 3/Low)
    #[arg(short, long, value_parser = Priority::parse)]
    priority: Option<Priority>,

    /// How the call reached dispatch (Caller, Radio, Dispatch, Alarms)
    #[arg(short, long)]
    origin: Option<CallOrigin>,

    /// Ten-code of the call, e.g. 10-68
    #[arg(short, long)]
    code: Option<String>,
}

#[derive(clap::Subcommand)]
enum Command {
    /// List calls, newest first
    List {
        /// Prints the calls in JSON format
        #[arg(long)]
        json: bool,

        /// Show only active calls
        #[arg(long)]
        active: bool,
    },
    /// Show every detail of a call
    Show {
        /// Call ID
        id: String,

        /// Prints the call in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Open a new call
    Create {
        /// Short description of the incident
        title: String,

        #[command(flatten)]
        fields: CallFields,

        /// Create the call already inactive
        #[arg(long)]
        inactive: bool,
    },
    /// Delete a call
    Delete {
        /// Call ID
        id: String,
    },
    /// Flip a call between active and inactive
    Toggle {
        /// Call ID
        id: String,
    },
    /// Overwrite the given fields of a call
    Edit {
        /// Call ID
        id: String,

        /// New title
        #[arg(short, long)]
        title: Option<String>,

        #[command(flatten)]
        fields: CallFields,

        /// New call notes
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Assign a unit to a call
    AssignUnit {
        /// Call ID
        call: String,
        /// Unit ID. Unknown IDs are assigned as given and listed as "Unknown"
        unit: String,
    },
    /// Assign every member of a group to a call
    AssignGroup {
        /// Call ID
        call: String,
        /// Group ID
        group: String,
    },
    /// Remove a unit from a call
    Unassign {
        /// Call ID
        call: String,
        /// Unit ID
        unit: String,
    },
}

fn code_label(code: &str) -> String {
    match dispatch_board_data::lookup(code) {
        Some(meaning) => format!("{} ({})", code, meaning),
        None => code.to_string(),
    }
}

fn print_call(snapshot: &Snapshot, call: &Call) {
    println!("Call Information:");
    println!(" - ID: {}", call.id);
    println!(" - Title: {}", call.title);
    println!(" - Active: {}", if call.active { "yes" } else { "no" });
    println!(" - Address: {} {}", call.address, call.postal);
    println!(" - Priority: {}", call.priority);
    println!(" - Origin: {}", call.origin);
    println!(" - Code: {}", code_label(&call.code));
    println!(" - Assigned Units:");
    for id in call.assigned.iter() {
        println!("  - {} (ID: {})", snapshot.unit_name(id), id);
    }
    if !call.notes.is_empty() {
        println!(" - Notes:");
        println!("{}", call.notes);
    }
}

fn find_call(board: &Board, id: &str) -> Result<CallId, ExitCode> {
    let id = CallId::from(id);
    if board.snapshot().call(&id).is_none() {
        eprintln!("Call with ID {} not found", id);
        return Err(ExitCode::RequestUnsatisfied);
    }
    Ok(id)
}

pub async fn main(board: &Board, args: Args) -> anyhow::Result<ExitCode> {
    match args.command {
        Command::List { json, active } => {
            let snapshot = board.snapshot();
            let calls: Vec<_> = snapshot
                .calls
                .iter()
                .filter(|call| !active || call.active)
                .collect();
            if json {
                print_json(&calls)?;
            } else {
                println!(
                    "{:<36} | {:<6} | {:<8} | {:<24} | {:<30} | {}",
                    "ID", "Active", "Priority", "Code", "Title", "Units"
                );
                for call in calls {
                    println!(
                        "{:<36} | {:<6} | {:<8} | {:<24} | {:<30} | {}",
                        call.id,
                        if call.active { "yes" } else { "no" },
                        call.priority,
                        code_label(&call.code),
                        call.title,
                        member_names(&snapshot, &call.assigned)
                    )
                }
            }
        }
        Command::Show { id, json } => {
            let id = match find_call(board, &id) {
                Ok(id) => id,
                Err(code) => return Ok(code),
            };
            let snapshot = board.snapshot();
            if let Some(call) = snapshot.call(&id) {
                if json {
                    print_json(call)?;
                } else {
                    print_call(&snapshot, call);
                }
            }
        }
        Command::Create {
            title,
            fields,
            inactive,
        } => {
            let new = NewCall {
                title,
                address: fields.address.unwrap_or_default(),
                postal: fields.postal.unwrap_or_default(),
                priority: fields.priority.unwrap_or_default(),
                origin: fields.origin.unwrap_or_default(),
                code: fields.code.unwrap_or_default(),
                active: !inactive,
            };
            match board.create_call(new).await {
                Ok(id) => println!("{}", id),
                Err(err) => {
                    eprintln!("{}", err);
                    return Ok(ExitCode::FaultOrArgsError);
                }
            }
        }
        Command::Delete { id } => match find_call(board, &id) {
            Ok(id) => board.delete_call(&id).await,
            Err(code) => return Ok(code),
        },
        Command::Toggle { id } => match find_call(board, &id) {
            Ok(id) => board.toggle_call_active(&id).await,
            Err(code) => return Ok(code),
        },
        Command::Edit {
            id,
            title,
            fields,
            notes,
        } => {
            let patch = CallPatch {
                title,
                address: fields.address,
                postal: fields.postal,
                priority: fields.priority,
                origin: fields.origin,
                code: fields.code,
                active: None,
                notes,
            };
            if patch.is_empty() {
                eprintln!("Nothing to edit, pass at least one field.");
                return Ok(ExitCode::FaultOrArgsError);
            }
            match find_call(board, &id) {
                Ok(id) => board.edit_call(&id, patch).await,
                Err(code) => return Ok(code),
            }
        }
        Command::AssignUnit { call, unit } => {
            let call = match find_call(board, &call) {
                Ok(id) => id,
                Err(code) => return Ok(code),
            };
            board
                .assign_unit_to_call(&UnitId::from(unit.as_str()), &call)
                .await;
        }
        Command::AssignGroup { call, group } => {
            let call = match find_call(board, &call) {
                Ok(id) => id,
                Err(code) => return Ok(code),
            };
            let group = GroupId::from(group.as_str());
            if board.snapshot().group(&group).is_none() {
                eprintln!("Group with ID {} not found", group);
                return Ok(ExitCode::RequestUnsatisfied);
            }
            board.assign_group_to_call(&group, &call).await;
        }
        Command::Unassign { call, unit } => match find_call(board, &call) {
            Ok(call) => {
                board
                    .remove_assigned_unit(&UnitId::from(unit.as_str()), &call)
                    .await
            }
            Err(code) => return Ok(code),
        },
    }
    Ok(ExitCode::Ok)
}
