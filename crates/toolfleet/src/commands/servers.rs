//! `toolfleet servers`: list configured servers without starting them.

use anyhow::Result;
use clap::Args;

use toolfleet_mcp::{ToolCatalog, ToolMetadata};

use super::{Context, truncate};

/// Arguments for `toolfleet servers`.
#[derive(Args, Debug)]
pub struct ServersArgs {}

/// Run `toolfleet servers`.
pub async fn run(_args: ServersArgs, ctx: &Context) -> Result<()> {
    let specs = ctx.server_specs();
    let catalog = ToolCatalog::from_specs(&specs);

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(catalog.all())?);
        return Ok(());
    }

    if catalog.is_empty() {
        println!("No servers configured.");
        println!();
        println!("Add [[servers]] entries to toolfleet.toml or point servers_file at a YAML registry.");
        return Ok(());
    }

    print_table(catalog.all(), ctx.verbose);
    Ok(())
}

fn print_table(entries: &[ToolMetadata], verbose: bool) {
    println!("{:<20} {:<8} {:<50}", "NAME", "TYPE", "COMMAND");
    println!("{}", "-".repeat(80));

    for entry in entries {
        let mut command = entry.command.clone();
        if !entry.args.is_empty() {
            command.push(' ');
            command.push_str(&entry.args.join(" "));
        }

        println!(
            "{:<20} {:<8} {:<50}",
            truncate(&entry.name, 20),
            entry.kind.to_string(),
            truncate(&command, 50)
        );

        if verbose && let Some(description) = &entry.description {
            println!("  {}", description);
        }
    }
}
