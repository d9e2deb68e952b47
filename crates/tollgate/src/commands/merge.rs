//! Merge command - preview the merged execution input.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::Style;

use tollgate_input::template::{marker_paths, parse_yaml, validate_allowed_values};
use tollgate_input::merge_template_with_input;

use super::{Context, read_document};

/// Arguments for the merge command.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Template YAML containing `<+input>` markers
    #[arg(short, long)]
    pub template: PathBuf,

    /// User input YAML (`-` for stdin); omitted means no input
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

/// Run the merge command.
pub async fn run(args: MergeArgs, ctx: &Context) -> Result<()> {
    let template = parse_yaml(&read_document(&args.template)?)?;
    let input = match &args.input {
        Some(path) => parse_yaml(&read_document(path)?)?,
        None => parse_yaml("")?,
    };

    let merged = merge_template_with_input(&template, &input);
    validate_allowed_values(&template, &merged)?;

    if ctx.json_output {
        println!("{}", serde_json::to_string(&merged)?);
        return Ok(());
    }

    println!("{}", serde_json::to_string_pretty(&merged)?);

    let unresolved = marker_paths(&merged);
    if !unresolved.is_empty() {
        let dim = Style::new().dim();
        eprintln!();
        eprintln!("{}", dim.apply_to("Fields still awaiting input:"));
        for path in &unresolved {
            eprintln!("  {}", dim.apply_to(path));
        }
    } else if ctx.verbose {
        eprintln!("All {} input fields supplied", marker_paths(&template).len());
    }
    Ok(())
}
