//! Instances command - inspect and manage stored execution-input instances.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use console::{Style, style};

use tollgate_input::{
    AmbianceResolver, ExecutionInputInstance, ExecutionInputService, InMemoryOrchestrator,
    SqliteInputStore, WaitNotifyEngine,
};

use super::Context;

/// Arguments for the instances command.
#[derive(Args, Debug)]
pub struct InstancesArgs {
    #[command(subcommand)]
    pub command: InstancesCommand,
}

#[derive(Subcommand, Debug)]
pub enum InstancesCommand {
    /// Show the instance owned by a node execution
    Get {
        /// Node execution ID
        node_execution_id: String,
    },

    /// List instances for the given node executions (all pending when omitted)
    List {
        /// Node execution IDs
        node_execution_ids: Vec<String>,
    },

    /// Delete instances owned by the given node executions
    Purge {
        /// Node execution IDs
        #[arg(required = true)]
        node_execution_ids: Vec<String>,
    },

    /// Print the template of a pending instance
    Template {
        /// Node execution ID
        node_execution_id: String,
    },
}

/// Run the instances command.
pub async fn run(args: InstancesArgs, ctx: &Context) -> Result<()> {
    let store = Arc::new(
        SqliteInputStore::open(&ctx.db_path)
            .with_context(|| format!("failed to open {}", ctx.db_path.display()))?,
    );
    // Offline access: no engine is attached, so only storage-backed operations are used
    let service = ExecutionInputService::new(
        store.clone(),
        Arc::new(AmbianceResolver),
        WaitNotifyEngine::current(),
        Arc::new(InMemoryOrchestrator::new()),
    );
    let dim = Style::new().dim();

    match args.command {
        InstancesCommand::Get { node_execution_id } => {
            match service.get_execution_input_instance(&node_execution_id)? {
                Some(instance) => {
                    if ctx.json_output {
                        println!("{}", serde_json::to_string_pretty(&instance)?);
                    } else {
                        print_instance(&instance, ctx.verbose);
                    }
                }
                None => {
                    if ctx.json_output {
                        println!("null");
                    } else {
                        println!(
                            "{}",
                            dim.apply_to(format!(
                                "No execution input for node execution {node_execution_id}"
                            ))
                        );
                    }
                }
            }
        }
        InstancesCommand::List { node_execution_ids } => {
            let instances = if node_execution_ids.is_empty() {
                store.list_pending()?
            } else {
                service.get_execution_input_instances(&node_execution_ids)?
            };

            if ctx.json_output {
                println!("{}", serde_json::to_string_pretty(&instances)?);
            } else if instances.is_empty() {
                println!("{}", dim.apply_to("No execution input instances found"));
            } else {
                println!("{}", style("Execution Inputs").bold());
                println!("{}", dim.apply_to("─".repeat(50)));
                for instance in &instances {
                    println!(
                        "{:<36}  {:<9} {}",
                        instance.node_execution_id,
                        instance.state,
                        dim.apply_to(instance.created_at.format("%Y-%m-%d %H:%M:%S"))
                    );
                }
            }
        }
        InstancesCommand::Purge { node_execution_ids } => {
            let deleted = service
                .delete_execution_input_instance_for_given_node_execution_ids(&node_execution_ids)?;
            if ctx.json_output {
                println!("{}", serde_json::json!({ "deleted": deleted }));
            } else {
                let green = Style::new().green();
                println!("{} Deleted {} instance(s)", green.apply_to("✓"), deleted);
            }
        }
        InstancesCommand::Template { node_execution_id } => {
            let template = service.get_execution_input_template(&node_execution_id)?;
            if ctx.json_output {
                println!("{}", serde_json::json!({ "template": template }));
            } else {
                print!("{template}");
                if !template.ends_with('\n') {
                    println!();
                }
            }
        }
    }

    Ok(())
}

fn print_instance(instance: &ExecutionInputInstance, verbose: bool) {
    let dim = Style::new().dim();
    println!("{}", style(&instance.node_execution_id).bold());
    println!("  {} {}", dim.apply_to("instance:"), instance.input_instance_id);
    println!("  {} {}", dim.apply_to("state:   "), instance.state);
    println!(
        "  {} {}",
        dim.apply_to("updated: "),
        instance.updated_at.to_rfc3339()
    );
    if let Some(merged) = &instance.merged_input_template {
        println!("  {}", dim.apply_to("merged input:"));
        let pretty = serde_json::to_string_pretty(merged).unwrap_or_else(|_| merged.to_string());
        for line in pretty.lines() {
            println!("    {line}");
        }
    }
    if verbose {
        println!("  {}", dim.apply_to("template:"));
        for line in instance.template.lines() {
            println!("    {line}");
        }
    }
}
