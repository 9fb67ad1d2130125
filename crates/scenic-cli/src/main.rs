//! `scenic-cli` – command line front-end for the scene-memory pipeline.
//!
//! Three subcommands:
//!
//! 1. `scenic ask <graph.json> "<question>" [--modality M] [--mode MODE]` –
//!    answer one question against a stored scene graph.
//! 2. `scenic bench <graph.json> <dataset.json> [--mode MODE] [--out F]` –
//!    run a QA dataset through the pipeline and the judge, writing a report.
//! 3. `scenic info <graph.json>` – print graph statistics.
//!
//! Configuration lives in `~/.scenic/config.toml`; `SCENIC_*` environment
//! variables override individual fields.

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;

use scenic_eval::{BenchmarkRunner, Evaluator, QaDataset};
use scenic_graph::{GraphDocument, SceneGraph};
use scenic_oracle::LlmOracle;
use scenic_retrieval::{PipelineConfig, QueryPipeline, RetrievalMode, telemetry};
use scenic_types::{Modality, Query};

fn main() -> ExitCode {
    // Telemetry first; the Tokio runtime is created afterwards because the
    // OTLP exporter is initialised synchronously.
    let _guard = telemetry::init_tracing("scenic");

    let cfg = match config::load() {
        Ok(Some(cfg)) => cfg,
        Ok(None) => {
            let cfg = config::Config::default();
            if let Err(e) = config::save(&cfg) {
                eprintln!("{}: {}", "Could not write default config".yellow(), e);
            } else {
                println!(
                    "  Wrote default config to {}",
                    config::config_path().display().to_string().bold()
                );
            }
            cfg
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            config::Config::default()
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        Some("ask") => cmd_ask(&cfg, &args[1..]),
        Some("bench") => cmd_bench(&cfg, &args[1..]),
        Some("info") => cmd_info(&args[1..]),
        Some(other) => {
            eprintln!("{}: unknown command '{}'", "Error".red(), other);
            print_usage();
            return ExitCode::FAILURE;
        }
        None => {
            print_banner();
            print_usage();
            return ExitCode::SUCCESS;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_ask(cfg: &config::Config, args: &[String]) -> Result<(), String> {
    let positional = positionals(args);
    let [graph_path, question] = positional.as_slice() else {
        return Err("usage: scenic ask <graph.json> \"<question>\" [--modality M] [--mode MODE]".into());
    };
    let modality: Modality = flag_value(args, "--modality")
        .unwrap_or_else(|| "text".to_string())
        .parse()
        .map_err(|e| format!("{e}"))?;
    let mode = resolve_mode(cfg, args)?;
    let graph = load_graph(graph_path)?;
    let oracle = Arc::new(LlmOracle::new(&cfg.llm_url, &cfg.model));
    let pipeline = QueryPipeline::new(
        Arc::new(graph),
        oracle.clone(),
        PipelineConfig {
            mode,
            oracle_timeout: Duration::from_secs(cfg.oracle_timeout_secs),
            ..PipelineConfig::default()
        },
    );

    let query = Query::new(question.clone(), modality);
    let runtime = runtime()?;
    let result = runtime
        .block_on(pipeline.answer(&query))
        .map_err(|e| e.to_string())?;

    println!();
    match &result.answer {
        Some(value) => println!("  {} {}", "Answer:".bold(), value.to_string().green().bold()),
        None => println!("  {} {}", "Answer:".bold(), "insufficient information".yellow()),
    }
    println!("  {} {:.2}", "Confidence:".bold(), result.confidence);
    if !result.explanation.is_empty() {
        println!("  {} {}", "Explanation:".bold(), result.explanation.dimmed());
    }
    println!(
        "  {} {} node(s), {} edge(s)",
        "Cited:".bold(),
        result.cited_nodes.len(),
        result.cited_edges.len()
    );
    let (prompt, completion) = oracle.token_usage();
    println!("  {} {prompt} prompt / {completion} completion", "Tokens:".dimmed());
    Ok(())
}

fn cmd_bench(cfg: &config::Config, args: &[String]) -> Result<(), String> {
    let positional = positionals(args);
    let [graph_path, dataset_path] = positional.as_slice() else {
        return Err(
            "usage: scenic bench <graph.json> <dataset.json> [--mode MODE] [--out FILE]".into(),
        );
    };
    let mode = resolve_mode(cfg, args)?;
    let out = flag_value(args, "--out").unwrap_or_else(|| "report.json".to_string());

    let graph = Arc::new(load_graph(graph_path)?);
    let mut dataset = QaDataset::load_json(dataset_path).map_err(|e| e.to_string())?;
    let dropped = dataset.validate_against(&graph);
    if dropped > 0 {
        println!(
            "  {} {dropped} sample(s) referenced unknown objects and were skipped",
            "Note:".yellow()
        );
    }

    let oracle = Arc::new(LlmOracle::new(&cfg.llm_url, &cfg.model));
    let pipeline = QueryPipeline::new(
        graph,
        oracle.clone(),
        PipelineConfig {
            mode,
            oracle_timeout: Duration::from_secs(cfg.oracle_timeout_secs),
            ..PipelineConfig::default()
        },
    );
    let runner = BenchmarkRunner::new(pipeline, Evaluator::new(oracle.clone()), cfg.concurrency);

    println!(
        "  Running {} sample(s) in mode {} ({} concurrent) …",
        dataset.len(),
        mode.to_string().bold(),
        cfg.concurrency
    );
    let runtime = runtime()?;
    let report = runtime
        .block_on(runner.run(&dataset, chrono::Utc::now()))
        .map_err(|e| e.to_string())?;

    for record in &report.records {
        let mark = if record.accuracy >= 0.5 {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "  {mark} [{:.2}] {} ({} ms)",
            record.accuracy,
            record.query.dimmed(),
            record.elapsed_ms
        );
    }
    println!(
        "\n  {} {:.3} over {} sample(s)",
        "Mean accuracy:".bold(),
        report.mean_accuracy,
        report.records.len()
    );
    let (prompt, completion) = oracle.token_usage();
    println!("  {} {prompt} prompt / {completion} completion", "Tokens:".dimmed());
    report.save_json(&out).map_err(|e| e.to_string())?;
    println!("  Report written to {}", out.bold());
    Ok(())
}

fn cmd_info(args: &[String]) -> Result<(), String> {
    let positional = positionals(args);
    let [graph_path] = positional.as_slice() else {
        return Err("usage: scenic info <graph.json>".into());
    };
    let graph = load_graph(graph_path)?;
    println!();
    println!("  {} {}", "Objects:".bold(), graph.object_count());
    println!("  {} {}", "Events:".bold(), graph.event_count());
    println!("  {} {}", "Edges:".bold(), graph.edge_count());
    let locations: Vec<&str> = graph.locations().iter().map(String::as_str).collect();
    println!("  {} {}", "Locations:".bold(), locations.join(", "));
    match graph.time_range() {
        Some((start, end)) => println!("  {} {start} – {end}", "Span:".bold()),
        None => println!("  {} empty", "Span:".bold()),
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn load_graph(path: &str) -> Result<SceneGraph, String> {
    GraphDocument::load_json(path).map_err(|e| format!("failed to load graph '{path}': {e}"))
}

fn resolve_mode(cfg: &config::Config, args: &[String]) -> Result<RetrievalMode, String> {
    flag_value(args, "--mode")
        .unwrap_or_else(|| cfg.retrieval_mode.clone())
        .parse()
        .map_err(|e: scenic_retrieval::mode::UnknownModeError| e.to_string())
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Runtime::new().map_err(|e| format!("failed to start runtime: {e}"))
}

/// Arguments that are not flags or flag values.
fn positionals(args: &[String]) -> Vec<&String> {
    let mut out = Vec::new();
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if arg.starts_with("--") {
            skip = true;
            continue;
        }
        out.push(arg);
    }
    out
}

fn flag_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn print_banner() {
    println!();
    println!("{}", r#"   ___ ___ ___ _  _ _  ___ "#.bold().cyan());
    println!("{}", r#"  / __/ __| __| \| | |/ __|"#.bold().cyan());
    println!("{}", r#"  \__ \ (__| _|| .` | | (__ "#.bold().cyan());
    println!("{}", r#"  |___/\___|___|_|\_|_|\___|"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "scenic".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Spatio-temporal scene memory for robots");
    println!();
}

fn print_usage() {
    println!("  {}", "Usage:".bold());
    println!("    scenic ask <graph.json> \"<question>\" [--modality M] [--mode MODE]");
    println!("    scenic bench <graph.json> <dataset.json> [--mode MODE] [--out FILE]");
    println!("    scenic info <graph.json>");
    println!();
    println!(
        "  Modes: {}",
        RetrievalMode::ALL
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positionals_skip_flags_and_their_values() {
        let args: Vec<String> = ["g.json", "--mode", "no_edge", "what happened?"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let got = positionals(&args);
        assert_eq!(got, vec!["g.json", "what happened?"]);
    }

    #[test]
    fn flag_value_finds_its_argument() {
        let args: Vec<String> = ["a", "--out", "r.json"].iter().map(|s| s.to_string()).collect();
        assert_eq!(flag_value(&args, "--out").as_deref(), Some("r.json"));
        assert_eq!(flag_value(&args, "--mode"), None);
    }

    #[test]
    fn default_mode_comes_from_config() {
        let cfg = config::Config::default();
        assert_eq!(resolve_mode(&cfg, &[]).unwrap(), RetrievalMode::FullUnified);
        let override_args: Vec<String> =
            ["--mode", "pruning_unified"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            resolve_mode(&cfg, &override_args).unwrap(),
            RetrievalMode::PruningUnified
        );
        let bad = config::Config {
            retrieval_mode: "graph_rag".into(),
            ..config::Config::default()
        };
        assert!(resolve_mode(&bad, &[]).is_err());
    }
}
