//! `toolfleet tools`: start the fleet and list every discovered tool.

use anyhow::Result;
use clap::Args;

use toolfleet_mcp::ServerTool;

use super::{Context, start_fleet, truncate};

/// Arguments for `toolfleet tools`.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Only start and query this server
    #[arg(long)]
    pub server: Option<String>,
}

/// Run `toolfleet tools`.
pub async fn run(args: ToolsArgs, ctx: &Context) -> Result<()> {
    let specs = match &args.server {
        Some(name) => vec![ctx.server_spec(name)?],
        None => ctx.server_specs(),
    };

    let mut fleet = start_fleet(ctx, specs).await?;
    let tools = fleet.list_all_tools().await;
    let stopped = fleet.stop_all().await;
    tracing::debug!(stopped, tool_count = tools.len(), "tool discovery finished");

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&tools)?);
    } else if tools.is_empty() {
        println!("No tools discovered.");
    } else {
        print_table(&tools, ctx.verbose);
    }
    Ok(())
}

fn print_table(tools: &[ServerTool], verbose: bool) {
    println!("{:<20} {:<30} {:<40}", "SERVER", "TOOL", "DESCRIPTION");
    println!("{}", "-".repeat(92));

    for tagged in tools {
        println!(
            "{:<20} {:<30} {:<40}",
            truncate(&tagged.server, 20),
            truncate(&tagged.tool.name, 30),
            truncate(&tagged.tool.description, 40)
        );
        if verbose {
            let schema = serde_json::to_string(&tagged.tool.input_schema).unwrap_or_default();
            println!("  schema: {}", schema);
        }
    }
}
