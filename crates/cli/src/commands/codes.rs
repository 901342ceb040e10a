use serde::Serialize;

use super::{ExitCode, print_json};

#[derive(clap::Args)]
pub struct Args {
    /// Show only codes whose code or meaning contains this text
    filter: Option<String>,

    /// Prints the table in JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct CodeInfo {
    code: &'static str,
    meaning: &'static str,
}

pub async fn main(args: Args) -> anyhow::Result<ExitCode> {
    let filter = args.filter.map(|filter| filter.to_lowercase());
    let codes: Vec<_> = dispatch_board_data::ten_codes::ALL
        .iter()
        .filter(|entry| match &filter {
            Some(filter) => {
                entry.code.contains(filter.as_str())
                    || entry.meaning.to_lowercase().contains(filter.as_str())
            }
            None => true,
        })
        .collect();

    if codes.is_empty() {
        eprintln!("No ten-codes match the given filter.");
        return Ok(ExitCode::RequestUnsatisfied);
    }

    if args.json {
        print_json(
            &codes
                .iter()
                .map(|entry| CodeInfo {
                    code: entry.code,
                    meaning: entry.meaning,
                })
                .collect::<Vec<_>>(),
        )?;
    } else {
        println!("{:<6} | {}", "Code", "Meaning");
        for entry in codes {
            println!("{:<6} | {}", entry.code, entry.meaning);
        }
    }
    Ok(ExitCode::Ok)
}
