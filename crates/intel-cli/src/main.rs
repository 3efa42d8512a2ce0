//! Command-line interface for intel-rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use intel_llm::providers::OpenAIProvider;
use intel_report::{DataCollector, QueryParser, Report, ReportConfig, ReportPipeline};
use intel_utils::LogFormat;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "intel-report", version)]
#[command(about = "Industry intelligence reports from a single market question", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// `.env` file to load instead of searching the current directory
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Log output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,

    /// Override the chat model
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and print the Markdown report
    Generate {
        /// Market question, e.g. "Analyze the electric vehicle market in Europe"
        query: String,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the structured analysis as JSON
        #[arg(long)]
        analysis_json: Option<PathBuf>,
    },
    /// Only extract query parameters
    Parse { query: String },
    /// Parse the query and print the collected market data
    Collect { query: String },
    /// Read questions from stdin, one report per line
    Repl,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            if let Err(e) = intel_utils::load_env_from(path) {
                eprintln!("Error loading {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
        None => {
            intel_utils::load_env();
        }
    }
    intel_utils::init_tracing(cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error in processing: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config =
        ReportConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(model) = cli.model {
        config.model = model;
        config.validate()?;
    }

    info!(model = %config.model, "Starting intel-report");

    match cli.command {
        Command::Generate {
            query,
            output,
            analysis_json,
        } => {
            let pipeline = ReportPipeline::from_config(config)?;
            let report = generate(&pipeline, &query).await?;
            write_report(&report, output.as_deref(), analysis_json.as_deref())?;
        }
        Command::Parse { query } => {
            let parser = query_parser(&config)?;
            let params = parser.parse(&query).await?;
            println!("{}", serde_json::to_string_pretty(&params)?);
        }
        Command::Collect { query } => {
            let parser = query_parser(&config)?;
            let collector = DataCollector::from_config(&config)?;
            let params = parser.parse(&query).await?;
            let data = collector.research_market(&params).await?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Command::Repl => {
            let pipeline = ReportPipeline::from_config(config)?;
            repl(&pipeline).await?;
        }
    }

    Ok(())
}

fn query_parser(config: &ReportConfig) -> Result<QueryParser> {
    let provider = OpenAIProvider::with_config(config.openai_config()?)?;
    Ok(QueryParser::new(Arc::new(provider), config.model.clone())
        .with_retry_policy(config.retry_policy()))
}

async fn generate(pipeline: &ReportPipeline, query: &str) -> Result<Report> {
    let report = pipeline
        .run(query, |stage| eprintln!("{}", stage.label()))
        .await?;

    for warning in report.warnings() {
        eprintln!("Warning: {warning}");
    }
    eprintln!("{}", summary_table(&report));

    Ok(report)
}

fn write_report(
    report: &Report,
    output: Option<&Path>,
    analysis_json: Option<&Path>,
) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, &report.markdown)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{}", report.markdown),
    }

    if let Some(path) = analysis_json {
        let json = serde_json::to_string_pretty(&report.analysis)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Analysis written to {}", path.display());
    }

    Ok(())
}

fn summary_table(report: &Report) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Step", "Value"]);

    for timing in report.timings.iter() {
        table.add_row(vec![
            timing.stage.name().to_string(),
            format!("{:.2}s", timing.elapsed.as_secs_f64()),
        ]);
    }
    table.add_row(vec![
        "Total".to_string(),
        format!("{:.2}s", report.timings.total().as_secs_f64()),
    ]);
    table.add_row(vec!["Input tokens".to_string(), report.usage.input_tokens.to_string()]);
    table.add_row(vec!["Output tokens".to_string(), report.usage.output_tokens.to_string()]);
    table.add_row(vec!["Total tokens".to_string(), report.usage.total().to_string()]);
    table.add_row(vec![
        "Analysis quality".to_string(),
        format!("{}/1.0", report.analysis.metadata.quality_score),
    ]);
    table.add_row(vec!["Report id".to_string(), report.id.to_string()]);

    table
}

async fn repl(pipeline: &ReportPipeline) -> Result<()> {
    println!("Industry intelligence reports. Type a market question, or 'exit' to quit.");

    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("query> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!("Goodbye!");
            break;
        }

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            println!("Goodbye!");
            break;
        }

        match generate(pipeline, query).await {
            Ok(report) => println!("\n{}\n", report.markdown),
            Err(e) => eprintln!("Error in processing: {e:#}"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate_args() {
        let cli = Cli::try_parse_from([
            "intel-report",
            "--log-format",
            "json",
            "generate",
            "EV market in Europe",
            "-o",
            "report.md",
        ])
        .unwrap();

        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Command::Generate { query, output, analysis_json } => {
                assert_eq!(query, "EV market in Europe");
                assert_eq!(output, Some(PathBuf::from("report.md")));
                assert!(analysis_json.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let result = Cli::try_parse_from(["intel-report", "--log-format", "xml", "repl"]);
        assert!(result.is_err());
    }
}
