// ==========================================
// Talhão APEX - command line entry point
// ==========================================
// talhao-apex [--db PATH] <consist|manejo|all> [--remanescentes]
// Runs the pipelines headless against one store file and prints
// progress in the configured locale.
// ==========================================

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use talhao_apex::app::{get_default_db_path, AppState};
use talhao_apex::engine::events::{ChannelProgressSink, PipelineEvent, SharedProgressSink};
use talhao_apex::engine::{manejo, PipelineOutput, CONSIST_STAGES};
use talhao_apex::i18n::{stage_label, t, t_with_args};
use talhao_apex::{logging, PipelineReport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Consist,
    Manejo,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliArgs {
    db: Option<String>,
    command: Command,
    /// None: configured default
    remnants: Option<bool>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut db = None;
    let mut command = None;
    let mut remnants = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => db = Some(args.next().context("--db needs a path")?),
            "--remanescentes" => remnants = Some(true),
            "consist" => command = Some(Command::Consist),
            "manejo" => command = Some(Command::Manejo),
            "all" => command = Some(Command::All),
            other => bail!("unknown argument: {}", other),
        }
    }
    match command {
        Some(command) => Ok(CliArgs { db, command, remnants }),
        None => bail!("{}", t("cli.usage")),
    }
}

/// Sink plus a task printing its events against `stages`
fn progress_printer(stages: Vec<&'static str>) -> (SharedProgressSink, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::Progress { current, total } => {
                    let stage = stages
                        .get(current.saturating_sub(1))
                        .map(|s| stage_label(s))
                        .unwrap_or_default();
                    println!(
                        "{}",
                        t_with_args(
                            "cli.progress",
                            &[
                                ("current", &current.to_string()),
                                ("total", &total.to_string()),
                                ("stage", &stage),
                            ],
                        )
                    );
                }
                PipelineEvent::StageFailed { stage, message } => {
                    eprintln!(
                        "{}",
                        t_with_args("cli.stage_failed", &[("stage", &stage_label(&stage)), ("message", &message)])
                    );
                }
                PipelineEvent::Finished(report) => print_report(&report),
            }
        }
    });
    (Arc::new(ChannelProgressSink::new(tx)), printer)
}

fn print_report(report: &PipelineReport) {
    if report.cancelled {
        println!("{}", t("cli.cancelled"));
    }
    println!(
        "{}",
        t_with_args(
            "cli.finished",
            &[
                ("pipeline", &report.pipeline),
                ("completed", &report.completed.to_string()),
                ("total", &report.total.to_string()),
                ("failed", &report.failed_count().to_string()),
            ],
        )
    );
}

fn print_output(output: &PipelineOutput) {
    match output {
        PipelineOutput::Consist {
            adjustments: Some(adjustments),
            ..
        } => {
            for count in &adjustments.counts {
                println!(
                    "{}",
                    t_with_args(
                        "cli.adjustments",
                        &[("label", &count.label), ("count", &count.count.to_string())]
                    )
                );
            }
        }
        PipelineOutput::Consist { .. } => {}
        PipelineOutput::Manejo(outcome) => {
            println!(
                "{}",
                t_with_args(
                    "cli.run_created",
                    &[
                        ("number", &outcome.run_number.to_string()),
                        ("table", &outcome.result_table),
                    ],
                )
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args = parse_args(std::env::args().skip(1))?;
    let db_path = args.db.clone().unwrap_or_else(get_default_db_path);
    println!("{} {}", talhao_apex::APP_NAME, talhao_apex::VERSION);
    println!("{}", t_with_args("cli.database", &[("path", &db_path)]));

    let state = AppState::new(db_path).await.map_err(anyhow::Error::msg)?;
    let api = &state.manejo_api;

    if matches!(args.command, Command::Consist | Command::All) {
        let (sink, printer) = progress_printer(CONSIST_STAGES.to_vec());
        let output = api.run_consist(sink).await?;
        printer.await?;
        print_output(&output);
        if output.report().cancelled {
            return Ok(());
        }
    }

    if matches!(args.command, Command::Manejo | Command::All) {
        let kind = state.runner.manejo(args.remnants);
        let remnants = matches!(
            kind,
            talhao_apex::PipelineKind::Manejo {
                remnant_reconciliation: true
            }
        );
        let (sink, printer) = progress_printer(manejo::stage_names(remnants));
        let output = api.run_manejo(Some(remnants), sink).await?;
        printer.await?;
        print_output(&output);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<CliArgs> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&["--db", "/tmp/apex.db", "manejo", "--remanescentes"]).unwrap();
        assert_eq!(parsed.db.as_deref(), Some("/tmp/apex.db"));
        assert_eq!(parsed.command, Command::Manejo);
        assert_eq!(parsed.remnants, Some(true));

        let parsed = args(&["all"]).unwrap();
        assert_eq!(parsed.command, Command::All);
        assert_eq!(parsed.remnants, None);

        assert!(args(&[]).is_err());
        assert!(args(&["--db"]).is_err());
        assert!(args(&["export"]).is_err());
    }
}
