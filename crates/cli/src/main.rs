use clap::{Parser, Subcommand};
use dispatch_board::Board;
use log::LevelFilter;

mod commands;

#[derive(Parser)]
#[command(name = "dispatch-board")]
#[command(about = "A CLI tool for running a dispatch board of units, calls and BOLOs")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: commands::GlobalArgs,

    #[command(subcommand)]
    subcommand: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage field units
    Units(commands::units::Args),
    /// Manage groups of units
    Groups(commands::groups::Args),
    /// Manage incident calls
    Calls(commands::calls::Args),
    /// Manage BOLO alerts
    Bolos(commands::bolos::Args),
    /// Read or replace the dispatch notes
    Notes(commands::notes::Args),
    /// List the ten-code table
    Codes(commands::codes::Args),
    /// Follow the hosted store and reload on every change
    Watch(commands::watch::Args),
}

#[tokio::main]
async fn main() -> anyhow::Result<commands::ExitCode> {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    match cli.subcommand {
        Commands::Codes(args) => commands::codes::main(args).await,
        command => {
            let board = cli.global.open_board().await?;
            let result = run(&board, command).await;
            board.settle().await;
            result
        }
    }
}

async fn run(board: &Board, command: Commands) -> anyhow::Result<commands::ExitCode> {
    match command {
        Commands::Units(args) => commands::units::main(board, args).await,
        Commands::Groups(args) => commands::groups::main(board, args).await,
        Commands::Calls(args) => commands::calls::main(board, args).await,
        Commands::Bolos(args) => commands::bolos::main(board, args).await,
        Commands::Notes(args) => commands::notes::main(board, args).await,
        Commands::Watch(args) => commands::watch::main(board, args).await,
        Commands::Codes(args) => commands::codes::main(args).await,
    }
}
