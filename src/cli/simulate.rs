//! Simulate command handler.

use std::path::{Path, PathBuf};

use clap::Args;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use futures::FutureExt;
use serde_json::{json, Value as JsonValue};

use crate::config::Config;
use crate::error::AppError;
use crate::executor::{unit_of_work_fn, BatchTransactionExecutor, UnitOfWork};
use crate::graph::backends::memory::MemoryClient;
use crate::graph::QueryExt;

const CREATE_ITEM: &str = "CREATE (n:Item {payload: $payload, batch: $batch, step: $step})";

/// Drain a JSON-lines file through the batch executor.
///
/// Each non-blank line becomes one item, written as an `Item` node inside
/// its batch's transaction. Nothing leaves the process: the store is the
/// in-memory journal, so this is a dry run of batch sizing and failure
/// isolation.
#[derive(Args)]
pub struct SimulateCommand {
    /// JSON-lines input file
    #[arg(long)]
    input: PathBuf,

    /// Items per transaction (overrides config)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Fail the unit of work for items equal to this JSON value
    #[arg(long)]
    fail_on: Option<String>,
}

impl SimulateCommand {
    pub async fn run(&self) -> Result<()> {
        let config = Config::load()?;
        let items = read_items(&self.input)?;
        let fail_on = self
            .fail_on
            .as_deref()
            .map(serde_json::from_str::<JsonValue>)
            .transpose()
            .wrap_err("--fail-on must be a JSON value")?;

        tracing::info!(
            items = items.len(),
            input = %self.input.display(),
            "Simulating batch execution"
        );

        let client = MemoryClient::new();
        let mut builder =
            BatchTransactionExecutor::builder(client.clone(), create_item(fail_on))
                .configure(&config.executor);
        if let Some(batch_size) = self.batch_size {
            builder = builder.batch_size(batch_size);
        }

        let executor = builder.input(items)?;
        let stats = executor.execute().await?;

        let report = json!({
            "batch_size": executor.batch_size(),
            "stats": stats,
            "failed_steps": stats.failed_steps(),
            "committed_statements": client.committed().len(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);

        Ok(())
    }
}

fn create_item(fail_on: Option<JsonValue>) -> impl UnitOfWork<JsonValue> {
    unit_of_work_fn(move |tx, item: JsonValue, batch, step| {
        let rejected = fail_on.as_ref() == Some(&item);
        async move {
            if rejected {
                return Err(AppError::UnitOfWork(format!("item {} rejected", item)));
            }
            tx.query(CREATE_ITEM)
                .param("payload", item)
                .param("batch", batch)
                .param("step", step)
                .run()
                .await
        }
        .boxed()
    })
}

fn read_items(path: &Path) -> Result<Vec<JsonValue>> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| eyre!("line {}: invalid JSON: {}", idx + 1, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_items_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"id\": 1}}\n\n2\n\"three\"").unwrap();

        let items = read_items(file.path()).unwrap();

        assert_eq!(items, vec![json!({"id": 1}), json!(2), json!("three")]);
    }

    #[test]
    fn test_read_items_reports_line_number() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1\n{{broken").unwrap();

        let err = read_items(file.path()).unwrap_err();

        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_rejected_item_rolls_back_its_batch() {
        let client = MemoryClient::new();
        let unit_of_work = create_item(Some(json!(2)));
        let executor = BatchTransactionExecutor::builder(client.clone(), unit_of_work)
            .batch_size(2)
            .input(vec![json!(1), json!(2), json!(3)])
            .unwrap();

        let stats = executor.execute().await.unwrap();

        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.successful_steps, 1);
        assert_eq!(client.committed().len(), 1);
        assert_eq!(client.committed()[0].params["payload"], json!(3));
    }
}
