//! `toolfleet call`: start one server and invoke a tool on it.

use anyhow::{Context as _, Result};
use clap::Args;
use serde_json::Value;

use toolfleet_mcp::{CallToolResult, ToolContent};

use super::{Context, start_fleet};

/// Arguments for `toolfleet call`.
#[derive(Args, Debug)]
pub struct CallArgs {
    /// Server that provides the tool
    pub server: String,

    /// Tool to invoke
    pub tool: String,

    /// Tool arguments as a JSON object
    #[arg(long)]
    pub args: Option<String>,
}

/// Run `toolfleet call`.
pub async fn run(args: CallArgs, ctx: &Context) -> Result<()> {
    let arguments = parse_arguments(args.args.as_deref())?;
    let spec = ctx.server_spec(&args.server)?;

    let mut fleet = start_fleet(ctx, vec![spec]).await?;
    let result = fleet.call_tool(&args.server, &args.tool, arguments).await;
    fleet.stop_all().await;

    let result = result.with_context(|| format!("calling '{}' on '{}'", args.tool, args.server))?;
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_content(&result);
    }

    if result.is_error() {
        anyhow::bail!("tool '{}' reported an error", args.tool);
    }
    Ok(())
}

/// Parse `--args`, which must be a JSON object when present.
fn parse_arguments(raw: Option<&str>) -> Result<Option<Value>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(raw).context("invalid JSON in --args")?;
    if !value.is_object() {
        anyhow::bail!("--args must be a JSON object");
    }
    Ok(Some(value))
}

fn print_content(result: &CallToolResult) {
    for item in &result.content {
        match item {
            ToolContent::Text { text } => println!("{}", text),
            ToolContent::Image { mime_type, data } => {
                println!("[image {} ({} bytes base64)]", mime_type, data.len())
            }
            ToolContent::Resource { resource } => {
                let uri = resource.get("uri").and_then(Value::as_str).unwrap_or("?");
                println!("[resource {}]", uri);
            }
        }
    }
}
