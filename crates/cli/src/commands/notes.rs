use std::io::Read;

use anyhow::Context;
use dispatch_board::Board;

use super::ExitCode;

#[derive(clap::Args)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Print the dispatch notes
    Show,
    /// Replace the dispatch notes
    Set {
        /// New notes. Read from stdin when omitted
        text: Option<String>,
    },
}

pub async fn main(board: &Board, args: Args) -> anyhow::Result<ExitCode> {
    match args.command {
        Command::Show => println!("{}", board.snapshot().dispatch_notes),
        Command::Set { text } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut text = String::new();
                    std::io::stdin()
                        .read_to_string(&mut text)
                        .context("Couldn't read notes from stdin")?;
                    text
                }
            };
            board.set_dispatch_notes(&text).await;
        }
    }
    Ok(ExitCode::Ok)
}
