use std::{path::PathBuf, process::Termination, time::Duration};

use dispatch_board::{Board, BoardConfig, DEFAULT_REMOTE_TIMEOUT, RemoteConfig};
use log::error;
use reqwest::Url;

pub mod bolos;
pub mod calls;
pub mod codes;
pub mod groups;
pub mod notes;
pub mod units;
pub mod watch;

#[repr(u8)]
pub enum ExitCode {
    Ok = 0,
    FaultOrArgsError = 1,
    RequestUnsatisfied = 2,
}

impl Termination for ExitCode {
    fn report(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }
}

#[derive(clap::Args)]
pub struct GlobalArgs {
    /// Directory holding the local board file
    #[arg(long, global = true, env = "DISPATCH_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Base URL of the hosted store. The board runs local-only without it
    #[arg(long, global = true, env = "DISPATCH_REMOTE_URL")]
    pub remote_url: Option<Url>,

    /// API key of the hosted store
    #[arg(long, global = true, env = "DISPATCH_REMOTE_KEY", hide_env_values = true)]
    pub remote_key: Option<String>,

    /// Timeout of each request to the hosted store
    #[arg(long, global = true, default_value_t = DEFAULT_REMOTE_TIMEOUT.as_secs())]
    pub remote_timeout_secs: u64,
}

impl GlobalArgs {
    pub fn board_config(&self) -> BoardConfig {
        BoardConfig {
            data_dir: self.data_dir.clone(),
            remote: self.remote_url.clone().map(|url| RemoteConfig {
                url,
                api_key: self.remote_key.clone().unwrap_or_default(),
                timeout: Duration::from_secs(self.remote_timeout_secs),
            }),
        }
    }

    /// Opens the board and, if it is mirrored, pulls the hosted copy once.
    pub async fn open_board(&self) -> anyhow::Result<Board> {
        let board = Board::open(&self.board_config()).await?;
        if board.remote().is_some() {
            if let Err(err) = board.reload().await {
                error!("Initial reload failed, using local board: {:#}", err);
            }
        }
        Ok(board)
    }
}

pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
