//! Segmentation of consolidated tables into participants and trials
//!
//! A consolidated export is one flat table. Participant changes and trial
//! starts are only visible as changes in the id column and as marker values
//! in the zone column, so the table is folded in a single pass through an
//! explicit state machine:
//!
//! - `NoParticipant`: nothing seen yet
//! - `ParticipantNoTrial`: rows are discarded until a trial opens
//! - `ParticipantInTrial`: rows are handed to the [`SampleSource`]
//!
//! A change of participant id always returns to `ParticipantNoTrial`, even if
//! the previous participant still had a trial open. What opens a trial and
//! how rows fill it is decided by the sample source: inline coordinates
//! ([`InlineSource`]) or referenced per-trial files
//! ([`crate::aggregator::FileSource`]).

use crate::config::{ParserConfig, SamplePolicy};
use crate::error::ParseError;
use crate::records::{ColumnIndex, Header, Records};
use crate::types::{Diagnostics, Message, Participant, RawParticipantMap, RawTrial, RawValue};
use tracing::{debug, info, warn};

/// Where the state machine stands after the last record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmenterState {
    NoParticipant,
    ParticipantNoTrial { participant: String },
    ParticipantInTrial { participant: String },
}

impl SegmenterState {
    fn participant(&self) -> Option<&str> {
        match self {
            SegmenterState::NoParticipant => None,
            SegmenterState::ParticipantNoTrial { participant }
            | SegmenterState::ParticipantInTrial { participant } => Some(participant),
        }
    }
}

/// How records turn into trials and samples.
///
/// Rows handed to a source always have one field per header column;
/// [`Segmenter::feed`] drops any other row before it reaches the source.
pub trait SampleSource {
    /// Whether `row` opens a new trial for the current participant.
    fn opens_trial(&mut self, row: &[String], diagnostics: &mut Diagnostics) -> bool;

    /// Fold `row` into the participant's last trial.
    fn absorb(
        &mut self,
        row: &[String],
        participant: &mut Participant<RawTrial>,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), ParseError>;
}

/// Columns every consolidated table provides.
struct TableLayout {
    width: usize,
    participant: usize,
    resolution: usize,
    viewport: usize,
    custom: ColumnIndex,
}

/// Single-pass participant/trial accumulator.
pub struct Segmenter<S> {
    layout: TableLayout,
    source: S,
    state: SegmenterState,
    participants: RawParticipantMap,
    diagnostics: Diagnostics,
}

impl<S: SampleSource> Segmenter<S> {
    /// Resolve the shared columns and custom fields against `header`.
    pub fn new(header: &Header, config: &ParserConfig, source: S) -> Result<Self, ParseError> {
        let layout = TableLayout {
            width: header.len(),
            participant: header.column(config.identity_column())?,
            resolution: header.column(&config.columns.resolution)?,
            viewport: header.column(&config.columns.viewport)?,
            custom: header.resolve(&config.custom_fields)?,
        };
        Ok(Self {
            layout,
            source,
            state: SegmenterState::NoParticipant,
            participants: RawParticipantMap::new(),
            diagnostics: Diagnostics::default(),
        })
    }

    pub fn state(&self) -> &SegmenterState {
        &self.state
    }

    pub fn participants(&self) -> &RawParticipantMap {
        &self.participants
    }

    /// Process one record. Records whose length differs from the header
    /// are counted in `skipped_rows` and otherwise ignored.
    pub fn feed(&mut self, row: &[String]) -> Result<(), ParseError> {
        if row.len() != self.layout.width {
            self.diagnostics.skipped_rows += 1;
            debug!(
                expected = self.layout.width,
                found = row.len(),
                "skipping record with mismatched field count"
            );
            return Ok(());
        }
        let id = row[self.layout.participant].as_str();

        if self.state.participant() != Some(id) {
            let (participant, created) = self.participants.get_or_insert(id);
            participant.fill_screen(
                non_empty(&row[self.layout.resolution]),
                non_empty(&row[self.layout.viewport]),
            );
            if created {
                debug!(participant = id, "new participant");
            } else {
                debug!(participant = id, "participant reappears; appending to existing trials");
            }
            self.state = SegmenterState::ParticipantNoTrial {
                participant: id.to_string(),
            };
        }

        let Some(participant) = self.participants.get_mut(id) else {
            return Ok(());
        };

        if self.source.opens_trial(row, &mut self.diagnostics) {
            let mut trial = RawTrial::new();
            for (name, value) in self.layout.custom.fields(row) {
                trial.push_message(Message::new(name, value.as_str()));
            }
            participant.trials.push(trial);
            self.state = SegmenterState::ParticipantInTrial {
                participant: id.to_string(),
            };
        }

        if !matches!(self.state, SegmenterState::ParticipantInTrial { .. }) {
            self.diagnostics.pre_trial_rows += 1;
            return Ok(());
        }

        self.source.absorb(row, participant, &mut self.diagnostics)
    }

    pub fn finish(self) -> (RawParticipantMap, Diagnostics) {
        (self.participants, self.diagnostics)
    }
}

/// Run a whole table through a segmenter.
pub fn segment<S, I>(
    header: &Header,
    rows: I,
    config: &ParserConfig,
    source: S,
) -> Result<(RawParticipantMap, Diagnostics), ParseError>
where
    S: SampleSource,
    I: Iterator<Item = Result<Vec<String>, ParseError>>,
{
    let mut segmenter = Segmenter::new(header, config, source)?;
    let mut records = Records::new(header, rows);
    for row in records.by_ref() {
        segmenter.feed(&row?)?;
    }
    let skipped = records.skipped();

    let (participants, mut diagnostics) = segmenter.finish();
    diagnostics.skipped_rows += skipped;
    info!(
        participants = participants.len(),
        trials = participants.trial_count(),
        skipped_rows = diagnostics.skipped_rows,
        pre_trial_rows = diagnostics.pre_trial_rows,
        "segmented table"
    );
    Ok((participants, diagnostics))
}

/// Sample source for tables that carry coordinates inline.
///
/// Rows whose zone is the coordinate marker hold an `"x y"` response and an
/// onset time; every other row in a trial, the trial-start row included,
/// becomes a `(zone, response)` message.
pub struct InlineSource<'c> {
    config: &'c ParserConfig,
    trial_start: &'c str,
    zone: usize,
    response: usize,
    onset: usize,
}

impl<'c> InlineSource<'c> {
    pub fn new(header: &Header, config: &'c ParserConfig) -> Result<Self, ParseError> {
        let trial_start = config
            .trial_start_zone
            .as_deref()
            .ok_or(ParseError::MissingSetting("trial_start_zone"))?;
        Ok(Self {
            config,
            trial_start,
            zone: header.column(&config.columns.zone)?,
            response: header.column(&config.columns.response)?,
            onset: header.column(&config.columns.onset)?,
        })
    }
}

impl SampleSource for InlineSource<'_> {
    fn opens_trial(&mut self, row: &[String], _diagnostics: &mut Diagnostics) -> bool {
        row[self.zone] == self.trial_start
    }

    fn absorb(
        &mut self,
        row: &[String],
        participant: &mut Participant<RawTrial>,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), ParseError> {
        let zone = &row[self.zone];
        let response = &row[self.response];
        let trial_index = participant.trials.len().saturating_sub(1);
        let Some(trial) = participant.trials.last_mut() else {
            return Ok(());
        };

        if *zone != self.config.coordinate_zone {
            trial.push_message(Message::new(zone.as_str(), response.as_str()));
            return Ok(());
        }

        match split_coordinates(response) {
            Some((x, y)) => {
                trial.push_sample(
                    RawValue::Text(row[self.onset].clone()),
                    RawValue::Text(x.to_string()),
                    RawValue::Text(y.to_string()),
                );
                Ok(())
            }
            None => match self.config.sample_policy {
                SamplePolicy::Abort => Err(ParseError::MalformedSample {
                    participant: participant.id.clone(),
                    trial: trial_index,
                    value: response.clone(),
                }),
                SamplePolicy::Skip => {
                    diagnostics.skipped_samples += 1;
                    warn!(
                        participant = %participant.id,
                        trial = trial_index,
                        value = %response,
                        "skipping malformed coordinate sample"
                    );
                    Ok(())
                }
            },
        }
    }
}

/// Split `"x y"` on a single space into exactly two tokens.
fn split_coordinates(response: &str) -> Option<(&str, &str)> {
    let mut parts = response.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(x), Some(y), None) => Some((x, y)),
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
