//! FloatChat Command Line Interface
//!
//! Drives the query engine stage by stage for local debugging.
//!
//! # Usage
//!
//! ```bash
//! # Show the operator DAG for a query
//! floatchat_cli parse "Show temperature in the Arabian Sea for 2020"
//!
//! # Plan with a 300ms deadline
//! floatchat_cli plan --deadline-ms 300 "salinity gradient near Sri Lanka"
//!
//! # Plan a saved (possibly hand-edited) DAG
//! floatchat_cli -o json parse "oxygen in the Bay of Bengal" > dag.json
//! floatchat_cli plan --dag dag.json
//!
//! # Run the security stages only
//! echo "'; DROP TABLE profiles; --" | floatchat_cli validate
//!
//! # Full pipeline against the configured executors
//! floatchat_cli -o json run "temperature profiles for float 2902746"
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use floatchat::types::{
    ExecutionPlan, ParseMode, SecurityValidation, SemanticOperatorDAG, ThreatLevel,
};
use floatchat::{EngineConfig, EngineError, ParseContext, QueryEngine, QueryOutcome};
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "floatchat_cli")]
#[command(version = "0.1.0")]
#[command(about = "Parse, plan, screen and run natural-language ARGO queries")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,

    /// Parse mode: explorer or power
    #[arg(long, global = true, default_value = "explorer")]
    mode: ParseMode,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a query into an operator DAG
    Parse {
        /// Query text (reads stdin if not provided)
        query: Option<String>,
    },

    /// Parse and plan without executing
    Plan {
        query: Option<String>,

        /// Plan a DAG from a JSON file instead of parsing a query
        #[arg(long, value_name = "FILE", conflicts_with = "query")]
        dag: Option<PathBuf>,

        /// Latency budget in milliseconds
        #[arg(long, env = "DEFAULT_DEADLINE_MS")]
        deadline_ms: Option<u64>,
    },

    /// Run the security stages on a query
    Validate {
        query: Option<String>,

        /// User id for rate limiting
        #[arg(long)]
        user: Option<String>,
    },

    /// Full pipeline: parse, screen, plan, execute
    Run {
        query: Option<String>,

        #[arg(long)]
        deadline_ms: Option<u64>,

        #[arg(long)]
        user: Option<String>,
    },
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match build_engine() {
        Ok(engine) => match cli.command {
            Commands::Parse { query } => cmd_parse(&engine, query, cli.mode, cli.format),
            Commands::Plan {
                query,
                dag,
                deadline_ms,
            } => cmd_plan(&engine, query, dag, cli.mode, deadline_ms, cli.format).await,
            Commands::Validate { query, user } => {
                cmd_validate(&engine, query, user, cli.mode, cli.format).await
            }
            Commands::Run {
                query,
                deadline_ms,
                user,
            } => cmd_run(&engine, query, cli.mode, deadline_ms, user, cli.format).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({"error": format!("{:#}", e)}));
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

fn build_engine() -> Result<QueryEngine> {
    let config = EngineConfig::from_env().context("Invalid configuration")?;
    Ok(QueryEngine::from_config(&config)?)
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_parse(
    engine: &QueryEngine,
    query: Option<String>,
    mode: ParseMode,
    format: OutputFormat,
) -> Result<()> {
    let query = read_query(query)?;
    let dag = engine.parser().parse(&query, &ParseContext::new(), mode);

    match format {
        OutputFormat::Json => print_json(&dag)?,
        OutputFormat::Pretty => print_dag(&dag),
    }
    Ok(())
}

async fn cmd_plan(
    engine: &QueryEngine,
    query: Option<String>,
    dag_file: Option<PathBuf>,
    mode: ParseMode,
    deadline_ms: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let plan = match dag_file {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            engine.plan_submitted(&json, deadline_ms).await?
        }
        None => {
            let query = read_query(query)?;
            let dag = engine.parser().parse(&query, &ParseContext::new(), mode);
            engine
                .planner()
                .plan(&dag, deadline_ms)
                .await
                .map_err(EngineError::from)?
        }
    };

    match format {
        OutputFormat::Json => print_json(&plan)?,
        OutputFormat::Pretty => print_plan(&plan, deadline_ms),
    }
    Ok(())
}

async fn cmd_validate(
    engine: &QueryEngine,
    query: Option<String>,
    user: Option<String>,
    mode: ParseMode,
    format: OutputFormat,
) -> Result<()> {
    let query = read_query(query)?;
    let dag = engine.parser().parse(&query, &ParseContext::new(), mode);
    let validation = engine
        .bridge()
        .validate(&query, Some(&dag), user.as_deref())
        .await;

    match format {
        OutputFormat::Json => print_json(&validation)?,
        OutputFormat::Pretty => print_validation(&validation),
    }

    if validation.passed {
        Ok(())
    } else {
        Err(anyhow!("Query rejected"))
    }
}

async fn cmd_run(
    engine: &QueryEngine,
    query: Option<String>,
    mode: ParseMode,
    deadline_ms: Option<u64>,
    user: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let query = read_query(query)?;
    let outcome = engine
        .handle_in_mode(&query, &ParseContext::new(), mode, user.as_deref(), deadline_ms)
        .await?;

    match outcome {
        QueryOutcome::ClarificationNeeded { dag, alternatives } => match format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "clarification_needed": true,
                "dag": dag,
                "alternatives": alternatives,
            }))?,
            OutputFormat::Pretty => {
                println!(
                    "{} Low confidence ({:.2}), did you mean:",
                    "?".yellow().bold(),
                    dag.confidence
                );
                for (i, alt) in alternatives.iter().enumerate() {
                    println!("  [{}] {} ({:.2})", i, alt.intent, alt.confidence);
                }
            }
        },
        QueryOutcome::Executed { plan, result, .. } => match format {
            OutputFormat::Json => print_json(&result)?,
            OutputFormat::Pretty => {
                print_plan(&plan, deadline_ms);
                let status = if result.success {
                    "OK".green().bold()
                } else {
                    "PARTIAL".yellow().bold()
                };
                println!(
                    "{} {} rows, {} cache hits, confidence {:.2}, {:.1}ms",
                    status,
                    result.rows_processed,
                    result.cache_hits,
                    result.confidence,
                    result.execution_time_ms
                );
                for error in &result.errors {
                    println!("  {} {}: {}", "x".red(), error.step, error.message);
                }
                println!("{}", serde_json::to_string_pretty(&result.data)?);
            }
        },
    }
    Ok(())
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("JSON serialization failed")?
    );
    Ok(())
}

fn print_dag(dag: &SemanticOperatorDAG) {
    println!(
        "{} intent {} confidence {:.2}",
        "OK".green().bold(),
        dag.intent.to_string().cyan(),
        dag.confidence
    );
    for (i, op) in dag.operators.iter().enumerate() {
        println!(
            "  [{}] {} {}",
            i,
            op.kind.as_str().bold(),
            serde_json::Value::Object(op.params.clone())
        );
    }
    if !dag.alternatives.is_empty() {
        println!("  {} alternative reading(s)", dag.alternatives.len());
    }
}

fn print_plan(plan: &ExecutionPlan, deadline_ms: Option<u64>) {
    let budget = deadline_ms
        .map(|d| format!(" / {}ms", d))
        .unwrap_or_default();
    println!(
        "{} plan {} est. {:.1}ms{}",
        "OK".green().bold(),
        plan.plan_id,
        plan.estimated_cost,
        budget
    );
    for (g, group) in plan.parallel_groups.iter().enumerate() {
        println!("{}:", format!("Group {}", g).cyan().bold());
        for &idx in group {
            let step = &plan.steps[idx];
            println!(
                "  {} -> {} ({:.1}ms, timeout {}ms)",
                step.operator.kind.as_str(),
                step.target_executor,
                step.operator.estimated_cost,
                step.timeout_ms
            );
        }
    }
}

fn print_validation(validation: &SecurityValidation) {
    let level = match validation.threat_level {
        ThreatLevel::Safe => validation.threat_level.to_string().green().bold(),
        ThreatLevel::Suspicious => validation.threat_level.to_string().yellow().bold(),
        ThreatLevel::Blocked => validation.threat_level.to_string().red().bold(),
    };
    println!(
        "{} at stage {} (confidence {:.2}, {:.2}ms)",
        level, validation.stage_reached, validation.confidence, validation.latency_ms
    );
    for issue in &validation.issues {
        println!("  - {}", issue);
    }
}

fn read_query(query: Option<String>) -> Result<String> {
    let query = match query {
        Some(q) => q,
        None => {
            if io::stdin().is_terminal() {
                return Err(anyhow!(
                    "No query provided. Pass it as an argument or pipe it via stdin."
                ));
            }
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };
    Ok(query.trim().to_string())
}
