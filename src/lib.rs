//! Gorilla Trajectories - rebuild per-participant mouse and gaze trajectories
//! from Gorilla experiment exports
//!
//! Two export shapes are supported, both ending in the same participant map:
//!
//! - **Consolidated tables**: one delimited file for all participants, with
//!   trial starts, coordinate samples and events interleaved as rows
//!   (segmenter → normalizer).
//! - **Per-trial spreadsheets**: one `.xls`/`.xlsx` file per trial, either in a
//!   folder or referenced by name from a consolidated table
//!   (trial file parser → aggregator → normalizer).

pub mod aggregator;
pub mod config;
pub mod delimited;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod records;
pub mod segmenter;
pub mod sheet;
pub mod trial_file;
pub mod types;

pub use config::{IdentitySource, ParserConfig, Precision, SamplePolicy};
pub use error::ParseError;
pub use pipeline::{read_consolidated, read_folder, read_indexed, read_trial_file, GorillaReader};
pub use sheet::{Cell, CellCoercion, Sheet, SheetReader};
pub use types::{
    Diagnostics, Message, MessageValue, ParseOutcome, Participant, Trial, TrajectoryMap,
};

/// Crate version, reported by the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
