//! Pipeline orchestration
//!
//! This module provides the public API: one entry point per export shape,
//! each running source → segmentation/aggregation → normalization.

use crate::aggregator::{aggregate_folder, FileSource};
use crate::config::ParserConfig;
use crate::delimited::{extension, DelimitedTable};
use crate::error::ParseError;
use crate::normalizer::Normalizer;
use crate::segmenter::{segment, InlineSource};
use crate::sheet::{
    coerce_nan_tolerant, CalamineReader, CellCoercion, SheetReader, SHEET_EXTENSIONS,
};
use crate::trial_file::TrialFileParser;
use crate::types::{Diagnostics, ParseOutcome, Participant, RawParticipantMap, Trial};
use std::path::Path;
use tracing::info;

/// Parse a consolidated table with inline coordinates.
///
/// # Example
/// ```ignore
/// let config = ParserConfig::new("fixation").with_custom_fields(["condition"]);
/// let outcome = read_consolidated(Path::new("data_exp_1234.csv"), &config)?;
/// ```
pub fn read_consolidated(path: &Path, config: &ParserConfig) -> Result<ParseOutcome, ParseError> {
    GorillaReader::new(config.clone()).consolidated(path)
}

/// Parse a consolidated table whose trials live in per-trial files under
/// `trial_folder`.
pub fn read_indexed(
    path: &Path,
    trial_folder: &Path,
    config: &ParserConfig,
) -> Result<ParseOutcome, ParseError> {
    GorillaReader::new(config.clone()).indexed(path, trial_folder)
}

/// Parse a folder of per-trial spreadsheet files.
pub fn read_folder(folder: &Path, config: &ParserConfig) -> Result<ParseOutcome, ParseError> {
    GorillaReader::new(config.clone()).folder(folder)
}

/// Parse a single per-trial spreadsheet file.
pub fn read_trial_file(path: &Path, config: &ParserConfig) -> Result<Participant<Trial>, ParseError> {
    GorillaReader::new(config.clone()).trial_file(path)
}

/// Reusable reader holding configuration, the spreadsheet backend and the
/// cell coercion.
pub struct GorillaReader {
    config: ParserConfig,
    sheets: Box<dyn SheetReader>,
    coerce: CellCoercion,
}

impl GorillaReader {
    /// Reader backed by `calamine` with NaN-tolerant cell coercion.
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            sheets: Box::new(CalamineReader),
            coerce: coerce_nan_tolerant,
        }
    }

    /// Replace the spreadsheet backend.
    pub fn with_sheet_reader(mut self, reader: impl SheetReader + 'static) -> Self {
        self.sheets = Box::new(reader);
        self
    }

    /// Replace the coercion applied to numeric spreadsheet cells.
    pub fn with_coercion(mut self, coerce: CellCoercion) -> Self {
        self.coerce = coerce;
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Consolidated table with inline coordinate rows.
    pub fn consolidated(&self, path: &Path) -> Result<ParseOutcome, ParseError> {
        let table = DelimitedTable::open(path, self.config.delimiter)?;
        let source = InlineSource::new(table.header(), &self.config)?;
        let (header, rows) = table.into_parts();
        let (participants, diagnostics) = segment(&header, rows, &self.config, source)?;
        self.finish(participants, diagnostics)
    }

    /// Consolidated table referencing per-trial files by name.
    pub fn indexed(&self, path: &Path, trial_folder: &Path) -> Result<ParseOutcome, ParseError> {
        let table = DelimitedTable::open(path, self.config.delimiter)?;
        let source = FileSource::new(
            table.header(),
            &self.config,
            self.sheets.as_ref(),
            trial_folder,
            self.coerce,
        )?;
        let (header, rows) = table.into_parts();
        let (participants, diagnostics) = segment(&header, rows, &self.config, source)?;
        self.finish(participants, diagnostics)
    }

    /// Folder of per-trial spreadsheet files.
    pub fn folder(&self, folder: &Path) -> Result<ParseOutcome, ParseError> {
        let (participants, diagnostics) =
            aggregate_folder(folder, &self.config, self.sheets.as_ref(), self.coerce)?;
        self.finish(participants, diagnostics)
    }

    /// A single per-trial file, as a participant holding one trial.
    pub fn trial_file(&self, path: &Path) -> Result<Participant<Trial>, ParseError> {
        if !path.is_file() {
            return Err(ParseError::NotFound(path.to_path_buf()));
        }
        if !SHEET_EXTENSIONS.contains(&extension(path).as_str()) {
            return Err(ParseError::UnsupportedExtension {
                path: path.to_path_buf(),
                expected: ".xls, .xlsx".to_string(),
            });
        }

        let file = TrialFileParser::new(&self.config)
            .with_coercion(self.coerce)
            .parse(self.sheets.read(path)?)?;
        let Some(id) = file.participant_id else {
            return Err(ParseError::EmptyTrialFile(path.to_path_buf()));
        };
        let mut participants = RawParticipantMap::new();
        let (participant, _) = participants.get_or_insert(&id);
        participant.resolution = file.viewport.clone();
        participant.viewport = file.viewport;
        participant.trials.push(file.trial);

        let normalized = Normalizer::normalize(participants, self.config.precision)?;
        normalized
            .into_iter()
            .next()
            .ok_or_else(|| ParseError::NotFound(path.to_path_buf()))
    }

    fn finish(
        &self,
        participants: RawParticipantMap,
        diagnostics: Diagnostics,
    ) -> Result<ParseOutcome, ParseError> {
        let participants = Normalizer::normalize(participants, self.config.precision)?;
        info!(
            participants = participants.len(),
            trials = participants.trial_count(),
            "normalized trajectories"
        );
        Ok(ParseOutcome {
            participants,
            diagnostics,
        })
    }
}
