//! # ts-events
//!
//! Event-level input for tmdstat.
//!
//! Events are held as a columnar [`EventSample`] (one `f64` column per branch
//! plus a weight column). Samples are produced by an [`EventSource`]: Parquet
//! files via Arrow, or ROOT TTrees.
//!
//! ```no_run
//! use ts_events::{ReadRequest, open_source};
//!
//! let source = open_source("out/analysis.root".as_ref(), Some("dihadron_tree")).unwrap();
//! let request = ReadRequest::new(["X", "Q2", "Z", "Mh"]).with_weight("Weight");
//! let sample = source.read(&request).unwrap();
//! println!("{} events", sample.n_events());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod parquet_io;
pub mod root_io;
pub mod sample;
pub mod source;

pub use parquet_io::{ParquetSource, write_parquet};
pub use root_io::RootSource;
pub use sample::EventSample;
pub use source::{DEFAULT_WEIGHT_BRANCH, EventSource, ReadRequest, open_source};
