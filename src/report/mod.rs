//! Report module.
//!
//! Renders each cycle's results and hands them to report sinks.

mod format;

pub use format::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::probe::CheckResult;

/// Report error types.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Table,
    Json,
    Csv,
    Html,
}

impl ReportFormat {
    pub fn render(self, results: &[CheckResult]) -> Result<String, ReportError> {
        Ok(match self {
            ReportFormat::Table => format_table(results),
            ReportFormat::Json => format_json(results)?,
            ReportFormat::Csv => format_csv(results),
            ReportFormat::Html => format_html(results),
        })
    }
}

/// Consumer of a cycle's full, ordered result set.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn publish(&self, results: &[CheckResult]) -> Result<(), ReportError>;
}

/// Process exit status for a result set: 0 when everything succeeded.
pub fn exit_code(results: &[CheckResult]) -> i32 {
    if results.iter().all(|r| r.success) {
        0
    } else {
        1
    }
}

/// Prints reports to stdout, or writes them to a file.
#[derive(Debug, Clone)]
pub struct ConsoleReporter {
    format: ReportFormat,
    output: Option<PathBuf>,
}

impl ConsoleReporter {
    pub fn new(format: ReportFormat, output: Option<PathBuf>) -> Self {
        Self { format, output }
    }
}

#[async_trait]
impl ReportSink for ConsoleReporter {
    async fn publish(&self, results: &[CheckResult]) -> Result<(), ReportError> {
        let content = self.format.render(results)?;

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, content)
                    .await
                    .map_err(|source| ReportError::Write {
                        path: path.clone(),
                        source,
                    })?;
                tracing::info!("Report saved to {}", path.display());
            }
            None => println!("{}", content),
        }

        Ok(())
    }
}
