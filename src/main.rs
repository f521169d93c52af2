//! bicameral CLI: plan and execute goals with the built-in tools.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use bicameral_agent::plan::Plan;
use bicameral_agent::{
    AgentConfig, BicameralResult, ExecutionContext, Executor, InMemory, PlanExecutor, Planner,
    TemplatePlanner, ToolRegistry, tools,
};

#[derive(Parser)]
#[command(name = "bicameral", version, about = "Plan-then-execute tool agent")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan and execute a goal, printing the trace as JSON.
    Run {
        /// The natural-language goal.
        #[arg(long)]
        goal: String,

        /// Execute this JSON plan instead of generating one.
        #[arg(long)]
        plan: Option<PathBuf>,
    },

    /// Validate a JSON plan file.
    Validate {
        /// Path to the plan.
        file: PathBuf,
    },

    /// Show the step dependency layers of a JSON plan file.
    Graph {
        /// Path to the plan.
        file: PathBuf,
    },

    /// List the built-in tools.
    Tools,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { goal, plan } => {
            let plan = match plan {
                Some(path) => Plan::load(&path)?,
                None => TemplatePlanner::new(config.planner.clone()).plan(&goal)?,
            };
            let executor = build_executor(&config)?;
            let mut ctx = ExecutionContext::new(goal);

            match executor.execute(&plan, &mut ctx) {
                Ok(trace) => {
                    let json = serde_json::to_string_pretty(&trace).into_diagnostic()?;
                    println!("{json}");
                }
                Err(failure) => {
                    let json = serde_json::to_string_pretty(&failure.trace).into_diagnostic()?;
                    println!("{json}");
                    return Err(failure.into());
                }
            }
        }

        Commands::Validate { file } => {
            let plan = Plan::load(&file)?;
            println!("{}: valid plan with {} step(s)", file.display(), plan.len());
        }

        Commands::Graph { file } => {
            let plan = Plan::load(&file)?;
            let graph = plan.dependency_graph();
            for (i, step) in plan.iter().enumerate() {
                let deps = graph.dependencies(i);
                if deps.is_empty() {
                    println!("  [{i}] {} ({})", step.with, step.step);
                } else {
                    println!("  [{i}] {} ({}) <- {deps:?}", step.with, step.step);
                }
            }
            println!("Layers:");
            for (depth, layer) in graph.layers().iter().enumerate() {
                println!("  {depth}: {layer:?}");
            }
            for (step, from) in graph.dangling() {
                println!("  warning: step {step} points at missing step {from}");
            }
        }

        Commands::Tools => {
            let registry = build_registry(&config)?;
            println!("Tools ({}):", registry.len());
            for name in registry.names() {
                let tool = registry.instantiate(name)?;
                println!("  {name:<10} {}", tool.description());
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> BicameralResult<AgentConfig> {
    match path {
        Some(path) => Ok(AgentConfig::load(path)?),
        None => Ok(AgentConfig::default()),
    }
}

/// Built-in tools over a fresh in-process memory.
fn build_registry(config: &AgentConfig) -> BicameralResult<Arc<ToolRegistry>> {
    Ok(tools::builtin_registry(config, Arc::new(InMemory::new()))?)
}

fn build_executor(config: &AgentConfig) -> BicameralResult<PlanExecutor> {
    let executor = PlanExecutor::new(build_registry(config)?)?;
    Ok(executor.with_config(config.executor.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bicameral_agent::BicameralError;

    #[test]
    fn missing_config_file_is_a_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_config(Some(dir.path().join("none.toml").as_path())).unwrap_err();
        assert!(matches!(err, BicameralError::Config(_)));
        assert_eq!(load_config(None).unwrap(), AgentConfig::default());
    }

    #[test]
    fn executor_builds_from_default_config() {
        let registry = build_registry(&AgentConfig::default()).unwrap();
        assert!(registry.names().contains(&"Compute"));
        assert!(build_executor(&AgentConfig::default()).is_ok());
    }
}
