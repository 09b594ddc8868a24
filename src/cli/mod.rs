//! Risk scoring CLI
//!
//! Command-line interface for training, serving, synthetic data generation
//! and offline scoring.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::Settings;
use crate::data::SyntheticGenerator;
use crate::explainability::explain;
use crate::inference::FittedPipeline;
use crate::server::PredictionRequest;
use crate::training::{TrainingConfig, TrainingOrchestrator};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "credit-risk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Credit-default risk scoring: train, serve and explain")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the baseline and champion models and write the artifacts
    Train {
        /// Skip the local and remote sources and train on synthetic data
        #[arg(long)]
        synthetic: bool,

        /// Synthetic row count
        #[arg(long)]
        rows: Option<usize>,

        /// Output pipeline artifact
        #[arg(long)]
        model_path: Option<PathBuf>,

        /// Directory for metrics.json
        #[arg(long)]
        reports_dir: Option<PathBuf>,
    },

    /// Start the prediction service
    Serve {
        /// Server host
        #[arg(long)]
        host: Option<String>,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Pipeline artifact to load
        #[arg(long)]
        model_path: Option<PathBuf>,
    },

    /// Write a synthetic canonical dataset as CSV
    Generate {
        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "1000")]
        rows: usize,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Score one JSON record offline
    Predict {
        /// JSON file holding one record
        #[arg(short, long)]
        input: PathBuf,

        /// Pipeline artifact to load
        #[arg(long)]
        model_path: Option<PathBuf>,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_train(
    mut settings: Settings,
    synthetic: bool,
    rows: Option<usize>,
    model_path: Option<PathBuf>,
    reports_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    settings.use_synthetic_data |= synthetic;
    if let Some(rows) = rows {
        settings.synthetic_rows = rows;
    }
    if let Some(path) = model_path {
        settings.model_path = path;
    }
    if let Some(dir) = reports_dir {
        settings.reports_dir = dir;
    }

    section("Train");

    step_run("Loading data and fitting models");
    let start = Instant::now();
    let orchestrator = TrainingOrchestrator::new(TrainingConfig::from_settings(&settings));
    let outcome = orchestrator.run(&settings).await?;
    step_done(&format!(
        "{} train / {} test rows in {:?}",
        outcome.n_train,
        outcome.n_test,
        start.elapsed()
    ));

    let report = &outcome.report;
    println!();
    println!("  {:<16} {:>10} {:>10}", muted("Metric"), muted("Baseline"), muted("Champion"));
    println!("  {}", dim(&"─".repeat(38)));
    println!("  {:<16} {:>10.4} {:>10.4}", "Accuracy", report.baseline.accuracy, report.champion.accuracy);
    println!("  {:<16} {:>10.4} {:>10.4}", "ROC-AUC", report.baseline.roc_auc, report.champion.roc_auc);
    println!("  {:<16} {:>10} {:>10.4}", "Precision", dim("-"), report.champion.precision);
    println!("  {:<16} {:>10} {:>10.4}", "Recall", dim("-"), report.champion.recall);
    println!("  {:<16} {:>10} {:>10.4}", "F1", dim("-"), report.champion.f1);
    println!("  {}", dim(&"─".repeat(38)));

    let [[tn, fp], [fn_, tp]] = report.confusion_matrix;
    println!();
    println!("  {:<16} tn {}  fp {}  fn {}  tp {}", muted("Confusion"), tn, fp, fn_, tp);
    println!("  {:<16} {}", muted("Model"), settings.model_path.display());
    println!("  {:<16} {}", muted("Baseline"), settings.baseline_model_path.display());
    println!("  {:<16} {}", muted("Preprocessor"), settings.preprocessor_path.display());
    println!("  {:<16} {}", muted("Metrics"), settings.metrics_path().display());
    println!("  {:<16} {}", muted("Time"), format!("{:.3}s", outcome.training_time_secs).white());
    println!();

    Ok(())
}

pub async fn cmd_serve(
    mut settings: Settings,
    host: Option<String>,
    port: Option<u16>,
    model_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    use crate::server::run_server;

    if let Some(host) = host {
        settings.host = host;
    }
    if let Some(port) = port {
        settings.port = port;
    }
    if let Some(path) = model_path {
        settings.model_path = path;
    }

    let (host, port) = (settings.host.clone(), settings.port);
    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", settings.project_name.white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", settings.version))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Predict", &format!("POST http://{}:{}/predict", host, port)));
    line_box(&kv("Health ", &format!("GET  http://{}:{}/health", host, port)));
    line_box(&kv("Model  ", &settings.model_path.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(settings).await
}

pub fn cmd_generate(output: &PathBuf, rows: usize, seed: u64) -> anyhow::Result<()> {
    section("Generate");

    step_run(&format!("Generating {} rows (seed {})", rows, seed));
    let start = Instant::now();
    let mut df = SyntheticGenerator::new(rows).with_seed(seed).generate()?;
    step_done(&format!("{:?}", start.elapsed()));

    step_run(&format!("Saving → {}", output.display()));
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(output)?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    println!();
    Ok(())
}

pub fn cmd_predict(settings: Settings, input: &PathBuf, model_path: Option<PathBuf>) -> anyhow::Result<()> {
    let model_path = model_path.unwrap_or(settings.model_path);
    section("Predict");

    step_run("Loading model");
    let pipeline = FittedPipeline::load(&model_path)?;
    step_done(&format!("{} v{}", pipeline.classifier().name(), pipeline.model_version));

    let request: PredictionRequest = serde_json::from_str(&std::fs::read_to_string(input)?)?;
    let record = request.to_frame()?;
    let prediction = pipeline.predict_one(&record)?;

    println!();
    println!("  {:<16} {}", muted("Probability"), format!("{:.4}", prediction.probability).white().bold());
    let label = if prediction.label == 1 { "default".red() } else { "no default".green() };
    println!("  {:<16} {} {}", muted("Label"), prediction.label, label);

    match explain(&pipeline, &record) {
        Ok(explanation) => {
            let values = explanation.values_map();
            println!();
            println!("  {:<24} {:>12}", muted("Top feature"), muted("Contribution"));
            println!("  {}", dim(&"─".repeat(38)));
            for name in explanation.top_features(settings.top_features) {
                let value = values.get(&name).copied().unwrap_or(0.0);
                println!("  {:<24} {:>+12.4}", name, value);
            }
        }
        Err(e) => println!("  {} {}", "explanation unavailable:".yellow(), e),
    }

    println!();
    Ok(())
}

pub fn show_help() {
    section("Commands");

    let cmds: &[(&str, &str)] = &[
        ("credit-risk train", "Train on local, remote or synthetic data"),
        ("credit-risk train --synthetic --rows 5000", "Train on synthetic data"),
        ("credit-risk serve -p 8000", "Start the prediction service"),
        ("credit-risk generate -o data.csv", "Write a synthetic dataset"),
        ("credit-risk predict -i record.json", "Score one record offline"),
        ("credit-risk predict -i record.json --model-path models/baseline.json", "Score with the baseline"),
    ];

    for (cmd, desc) in cmds {
        println!("  {:<72} {}", cmd.white(), muted(desc));
    }

    println!();
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
    fn test_parse_train_flags() {
        let cli = Cli::parse_from(["credit-risk", "train", "--synthetic", "--rows", "500"]);
        match cli.command {
            Some(Commands::Train { synthetic, rows, .. }) => {
                assert!(synthetic);
                assert_eq!(rows, Some(500));
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi(&format!("{}", "x".red())), "x");
    }

    #[test]
    fn test_generate_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("synthetic.csv");
        cmd_generate(&output, 25, 1).unwrap();

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(output))
            .unwrap()
            .finish()
            .unwrap();
        assert_eq!(df.shape(), (25, 24));
    }
}
