use std::{sync::Arc, time::Duration};

use chrono::Local;
use dispatch_board::{Board, poll_changes};
use log::info;

use super::ExitCode;

#[derive(clap::Args)]
pub struct Args {
    /// Seconds between two polls of the hosted tables
    #[arg(long, default_value_t = 2)]
    poll_interval_secs: u64,
}

pub async fn main(board: &Board, args: Args) -> anyhow::Result<ExitCode> {
    let Some(remote) = board.remote() else {
        eprintln!("Watching requires a hosted store, pass --remote-url.");
        return Ok(ExitCode::FaultOrArgsError);
    };

    let (events, poller) = poll_changes(
        Arc::clone(remote),
        Duration::from_secs(args.poll_interval_secs.max(1)),
    );
    info!(
        "Watching for changes every {}s, press Ctrl-C to stop",
        args.poll_interval_secs.max(1)
    );

    let follow = board.watch(events, |event, version, snapshot| {
        println!(
            "[{}] {} changed, board at version {}: {} units, {} groups, {} calls, {} bolos",
            Local::now().format("%H:%M:%S"),
            event.table,
            version,
            snapshot.units.len(),
            snapshot.groups.len(),
            snapshot.calls.len(),
            snapshot.bolos.len()
        );
    });

    tokio::select! {
        _ = follow => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Stopping watch");
        }
    }
    poller.abort();

    Ok(ExitCode::Ok)
}
