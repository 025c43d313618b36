//! `toolfleet run`: keep the fleet up until Ctrl-C.

use anyhow::Result;
use clap::Args;

use toolfleet_mcp::PoolEntry;

use super::{Context, start_fleet, truncate};

/// Arguments for `toolfleet run`.
#[derive(Args, Debug)]
pub struct RunArgs {}

/// Run `toolfleet run`.
pub async fn run(_args: RunArgs, ctx: &Context) -> Result<()> {
    let mut fleet = start_fleet(ctx, ctx.server_specs()).await?;
    let pool = fleet.snapshot();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&pool)?);
    } else {
        print_pool(&pool);
        println!();
        println!("Fleet running. Press Ctrl-C to stop.");
    }

    let waited = tokio::signal::ctrl_c().await;
    let stopped = fleet.stop_all().await;
    if !ctx.json_output {
        println!("Stopped {} server(s).", stopped);
    }

    waited?;
    Ok(())
}

fn print_pool(pool: &[PoolEntry]) {
    println!("{:<20} {:<7} {:<8} {:<30} {:<8}", "NAME", "PORT", "PID", "ADDRESS", "STATUS");
    println!("{}", "-".repeat(77));

    for entry in pool {
        let pid = entry
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let status = if entry.running { "running" } else { "exited" };
        println!(
            "{:<20} {:<7} {:<8} {:<30} {:<8}",
            truncate(&entry.name, 20),
            entry.port,
            pid,
            entry.address,
            status
        );
    }
}
