//! Sample normalization
//!
//! Converts every accumulated sample value into a number of the run-wide
//! precision. Messages pass through untouched.

use crate::config::Precision;
use crate::error::ParseError;
use crate::types::{Participant, RawParticipantMap, RawTrial, RawValue, Trial, TrajectoryMap};

/// Normalizer for turning raw participants into numeric trajectories
pub struct Normalizer;

impl Normalizer {
    /// Normalize all trials of all participants.
    pub fn normalize(
        participants: RawParticipantMap,
        precision: Precision,
    ) -> Result<TrajectoryMap, ParseError> {
        participants
            .into_iter()
            .map(|p| normalize_participant(p, precision))
            .collect()
    }
}

fn normalize_participant(
    participant: Participant<RawTrial>,
    precision: Precision,
) -> Result<Participant<Trial>, ParseError> {
    let Participant {
        id,
        resolution,
        viewport,
        trials,
    } = participant;

    let trials = trials
        .into_iter()
        .enumerate()
        .map(|(index, raw)| normalize_trial(&id, index, raw, precision))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Participant {
        id,
        resolution,
        viewport,
        trials,
    })
}

fn normalize_trial(
    participant: &str,
    index: usize,
    raw: RawTrial,
    precision: Precision,
) -> Result<Trial, ParseError> {
    let column = |values: &[RawValue], field: &'static str| -> Result<Vec<f64>, ParseError> {
        values
            .iter()
            .map(|v| {
                to_number(v, precision).ok_or_else(|| ParseError::NumericParse {
                    participant: participant.to_string(),
                    trial: index,
                    field,
                    value: match v {
                        RawValue::Text(s) => s.clone(),
                        RawValue::Number(n) => n.to_string(),
                    },
                })
            })
            .collect()
    };

    let time = column(raw.time(), "time")?;
    let x = column(raw.x(), "x")?;
    let y = column(raw.y(), "y")?;

    Ok(Trial {
        time,
        x,
        y,
        messages: raw.messages,
        trial_number: raw.trial_number,
    })
}

fn to_number(value: &RawValue, precision: Precision) -> Option<f64> {
    match (value, precision) {
        (RawValue::Number(n), Precision::Double) => Some(*n),
        (RawValue::Number(n), Precision::Single) => Some(*n as f32 as f64),
        (RawValue::Text(s), Precision::Double) => s.trim().parse::<f64>().ok(),
        (RawValue::Text(s), Precision::Single) => s.trim().parse::<f32>().ok().map(f64::from),
    }
}
