//! Per-trial spreadsheet parser
//!
//! A per-trial file holds exactly one trial. Rows of the sample type carry one
//! trajectory point each; every other row describes a zone and becomes a
//! message. The screen zone's geometry gives the participant's viewport.

use crate::config::ParserConfig;
use crate::error::ParseError;
use crate::records::{Header, Records};
use crate::sheet::{coerce_nan_tolerant, format_number, Cell, CellCoercion, Sheet};
use crate::types::{Message, RawTrial, RawValue};
use tracing::debug;

/// Everything recovered from one per-trial file.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialFile {
    /// Participant id reported by the file's first data row
    pub participant_id: Option<String>,
    pub trial: RawTrial,
    /// `"{width}x{height}"` of the first screen zone row
    pub viewport: Option<String>,
    /// Rows skipped for a mismatched field count
    pub skipped_rows: usize,
}

/// Column positions of a per-trial sheet.
struct SheetLayout {
    participant: usize,
    record_type: usize,
    zone_name: usize,
    zone_x: usize,
    zone_y: usize,
    zone_width: usize,
    zone_height: usize,
    timestamp: usize,
    x: usize,
    y: usize,
}

impl SheetLayout {
    fn resolve(header: &Header, config: &ParserConfig) -> Result<Self, ParseError> {
        let cols = &config.sheet_columns;
        Ok(Self {
            participant: header.column(config.sheet_identity_column())?,
            record_type: header.column(&cols.record_type)?,
            zone_name: header.column(&cols.zone_name)?,
            zone_x: header.column(&cols.zone_x)?,
            zone_y: header.column(&cols.zone_y)?,
            zone_width: header.column(&cols.zone_width)?,
            zone_height: header.column(&cols.zone_height)?,
            timestamp: header.column(&cols.timestamp)?,
            x: header.column(&cols.x)?,
            y: header.column(&cols.y)?,
        })
    }
}

/// Parser for single-trial spreadsheets.
#[derive(Clone, Copy)]
pub struct TrialFileParser<'c> {
    config: &'c ParserConfig,
    coerce: CellCoercion,
}

impl<'c> TrialFileParser<'c> {
    /// Parser using NaN-tolerant cell coercion.
    pub fn new(config: &'c ParserConfig) -> Self {
        Self {
            config,
            coerce: coerce_nan_tolerant,
        }
    }

    /// Replace the coercion applied to every numeric cell.
    pub fn with_coercion(mut self, coerce: CellCoercion) -> Self {
        self.coerce = coerce;
        self
    }

    pub fn parse(&self, sheet: Sheet) -> Result<TrialFile, ParseError> {
        let Sheet { header, rows } = sheet;
        let layout = SheetLayout::resolve(&header, self.config)?;
        let num = |cell: &Cell| (self.coerce)(cell);

        let mut participant_id = None;
        let mut viewport = None;
        let mut trial = RawTrial::new();

        let mut records = Records::new(&header, rows.into_iter().map(Ok::<_, ParseError>));
        for row in records.by_ref() {
            let row = row?;
            if participant_id.is_none() {
                participant_id = Some(row[layout.participant].as_text());
            }

            let zone = row[layout.zone_name].as_text();
            if viewport.is_none() && zone == self.config.screen_zone {
                viewport = Some(format!(
                    "{}x{}",
                    format_number(num(&row[layout.zone_width])),
                    format_number(num(&row[layout.zone_height]))
                ));
            }

            let kind = row[layout.record_type].as_text();
            if kind == self.config.sample_type {
                trial.push_sample(
                    RawValue::Number(num(&row[layout.timestamp])),
                    RawValue::Number(num(&row[layout.x])),
                    RawValue::Number(num(&row[layout.y])),
                );
            } else {
                let descriptor = format!(
                    "type={} zone={} x={} y={} width={} height={}",
                    kind,
                    zone,
                    format_number(num(&row[layout.zone_x])),
                    format_number(num(&row[layout.zone_y])),
                    format_number(num(&row[layout.zone_width])),
                    format_number(num(&row[layout.zone_height])),
                );
                trial.push_message(Message::new(num(&row[layout.timestamp]), descriptor));
            }
        }

        let skipped_rows = records.skipped();
        debug!(
            participant = participant_id.as_deref().unwrap_or(""),
            samples = trial.sample_count(),
            messages = trial.messages.len(),
            skipped_rows,
            "parsed per-trial sheet"
        );

        Ok(TrialFile {
            participant_id,
            trial,
            viewport,
            skipped_rows,
        })
    }
}
