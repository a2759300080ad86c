//! `tmdstat convert`: event file (ROOT or Parquet) to Parquet.

use std::path::Path;

use anyhow::{Context, Result};

use ts_events::{ReadRequest, open_source, write_parquet};

/// Split `X,Q2, Z` into branch names.
pub fn parse_branches(arg: &str) -> Vec<String> {
    arg.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

pub fn cmd_convert(
    input: &Path,
    tree: Option<&str>,
    output: &Path,
    branches: &[String],
    weight: Option<&str>,
    max_entries: Option<usize>,
) -> Result<()> {
    if branches.is_empty() {
        anyhow::bail!("at least one branch is required (--branches X,Q2,Z)");
    }

    let source = open_source(input, tree)?;
    tracing::info!(source = %source.describe(), branches = branches.len(), "reading events");

    let mut request = ReadRequest::new(branches.iter().cloned()).with_max_entries(max_entries);
    if let Some(w) = weight {
        request = request.with_weight(w);
    }
    let sample = source
        .read(&request)
        .with_context(|| format!("failed to read events from {}", input.display()))?;
    tracing::info!(events = sample.n_events(), "read events");

    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    write_parquet(&sample, output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!(path = %output.display(), "wrote parquet");
    Ok(())
}
