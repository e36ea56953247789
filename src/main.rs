//! GAIA Agent 命令行入口
//!
//! - `gaia ask <QUESTION>`：回答单个问题，答案输出到 stdout
//! - `gaia batch <FILE>`：并发回答题目列表，输出 JSON 答案数组
//!
//! 日志只写 stderr；Ctrl+C 取消所有进行中的运行。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use gaia_agent::agent::{load_tasks, BatchRunner};
use gaia_agent::config::{self, load_config};
use gaia_agent::core::{AgentBuilder, SessionSupervisor, Task, TaskScheduler};
use gaia_agent::observability;

/// Benchmark question-answering agent
#[derive(Parser, Debug)]
#[command(name = "gaia")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a single question
    Ask {
        question: String,

        #[arg(long, default_value = "cli")]
        task_id: String,

        /// Attached file name, fetched from the task service
        #[arg(long)]
        file_name: Option<String>,

        /// Print run events as JSON lines on stderr
        #[arg(long)]
        events: bool,
    },

    /// Answer every task in a JSON file
    Batch {
        /// JSON array of {task_id, question, file_name}
        file: PathBuf,

        /// Write answers here instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let cli = Cli::parse();

    let cfg = load_config(cli.config).context("Failed to load config")?;
    let cfg = config::install(cfg);
    let orchestrator = Arc::new(
        AgentBuilder::new(cfg.clone())
            .build()
            .context("Failed to build agent")?,
    );

    let supervisor = Arc::new(SessionSupervisor::new());
    {
        let supervisor = supervisor.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling runs");
                supervisor.cancel();
            }
        });
    }

    match cli.command {
        Command::Ask {
            question,
            task_id,
            file_name,
            events,
        } => {
            let task = Task::new(task_id, question, file_name.as_deref());
            let outcome = if events {
                let (tx, mut rx) = mpsc::unbounded_channel();
                let printer = tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        if let Ok(line) = serde_json::to_string(&event) {
                            eprintln!("{line}");
                        }
                    }
                });
                let outcome = orchestrator
                    .run_task_with_events(task, supervisor.child_token(), Some(&tx))
                    .await;
                drop(tx);
                let _ = printer.await;
                outcome
            } else {
                orchestrator.run_task(task, supervisor.child_token()).await
            };
            let outcome = outcome.context("Run failed")?;
            println!("{}", outcome.answer.formatted_text);
        }
        Command::Batch { file, output } => {
            let tasks = load_tasks(&file)?;
            let runner = BatchRunner::new(
                orchestrator,
                TaskScheduler::new(cfg.agent.max_concurrent_runs),
                supervisor.clone(),
            );
            let records = runner.run_batch(tasks).await;
            if supervisor.is_cancelled() {
                tracing::warn!("batch interrupted, unfinished tasks have empty answers");
            }
            let json = serde_json::to_string_pretty(&records)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!(path = %path.display(), "answers written");
                }
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}
