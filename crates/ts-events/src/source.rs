//! Event source abstraction and file-extension dispatch.

use std::path::Path;

use ts_core::{Error, Result};

use crate::parquet_io::ParquetSource;
use crate::root_io::RootSource;
use crate::sample::EventSample;

/// Weight branch name used by the simulation trees.
pub const DEFAULT_WEIGHT_BRANCH: &str = "Weight";

/// What to read from an event source.
#[derive(Debug, Clone, Default)]
pub struct ReadRequest {
    /// Branches (columns) to materialize, in output order.
    pub branches: Vec<String>,
    /// Optional weight branch. `None` gives unit weights.
    pub weight: Option<String>,
    /// Keep only the first `max_entries` events.
    pub max_entries: Option<usize>,
}

impl ReadRequest {
    /// Request the given branches with unit weights and no entry limit.
    pub fn new<I, S>(branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { branches: branches.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    /// Read per-event weights from `branch`.
    pub fn with_weight(mut self, branch: impl Into<String>) -> Self {
        self.weight = Some(branch.into());
        self
    }

    /// Limit the number of events read.
    pub fn with_max_entries(mut self, max: Option<usize>) -> Self {
        self.max_entries = max;
        self
    }

    /// Branch list with duplicates removed (first occurrence wins).
    pub fn unique_branches(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.branches.len());
        for b in &self.branches {
            if !out.contains(b) {
                out.push(b.clone());
            }
        }
        out
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.branches.is_empty() {
            return Err(Error::Validation("read request must name at least one branch".into()));
        }
        if let Some(w) = &self.weight
            && self.branches.contains(w)
        {
            return Err(Error::Validation(format!(
                "weight branch '{w}' must not also be requested as a column"
            )));
        }
        Ok(())
    }

    pub(crate) fn finish(&self, sample: EventSample) -> EventSample {
        match self.max_entries {
            Some(max) if max < sample.n_events() => {
                log::info!("truncating to {max} of {} events", sample.n_events());
                sample.truncate(max)
            }
            _ => sample,
        }
    }
}

/// A read-only columnar store of events.
pub trait EventSource {
    /// Materialize the requested branches into an [`EventSample`].
    fn read(&self, request: &ReadRequest) -> Result<EventSample>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Open an event file, choosing the reader from the file extension.
///
/// `.parquet` / `.pq` files are read through Arrow; `.root` files need a tree
/// name unless they contain exactly one TTree.
pub fn open_source(path: &Path, tree: Option<&str>) -> Result<Box<dyn EventSource>> {
    let ext = path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("parquet") | Some("pq") => Ok(Box::new(ParquetSource::new(path))),
        Some("root") => Ok(Box::new(RootSource::new(path, tree.map(str::to_string)))),
        _ => Err(Error::EventSource(format!(
            "unsupported event file '{}': expected .root, .parquet or .pq",
            path.display()
        ))),
    }
}
