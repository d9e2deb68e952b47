//! Check command - required-variable validation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::Style;

use tollgate_input::check_value_for_required_variables_provided;

use super::{Context, read_document};

/// Arguments for the check command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Rendered node YAML declaring `variables`
    #[arg(long)]
    pub field_yaml: PathBuf,

    /// Execution input YAML (`-` for stdin); omitted means no input
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Allow variables with a declared default to be left blank
    #[arg(long)]
    pub partial: bool,
}

/// Run the check command.
pub async fn run(args: CheckArgs, ctx: &Context) -> Result<()> {
    let field_yaml = read_document(&args.field_yaml)?;
    let input = match &args.input {
        Some(path) => read_document(path)?,
        None => String::new(),
    };

    let result = check_value_for_required_variables_provided(&field_yaml, &input, args.partial);

    if ctx.json_output {
        let report = serde_json::json!({
            "ok": result.is_ok(),
            "partial": args.partial,
            "error": result.as_ref().err().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if result.is_ok() {
        let green = Style::new().green();
        println!("{} All required variables provided", green.apply_to("✓"));
    }

    result.map_err(Into::into)
}
