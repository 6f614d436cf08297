//! Core types for trajectory reconstruction
//!
//! Participants own their trials; trials own their samples and messages.
//! Every parser first fills the raw form ([`RawTrial`], whose sample values
//! may still be text) and the normalization pass turns it into the canonical
//! form ([`Trial`], numeric throughout).

use serde::Serialize;
use std::collections::HashMap;

/// Value attached to a trial message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageValue {
    Text(String),
    Number(f64),
}

impl From<&str> for MessageValue {
    fn from(value: &str) -> Self {
        MessageValue::Text(value.to_string())
    }
}

impl From<String> for MessageValue {
    fn from(value: String) -> Self {
        MessageValue::Text(value)
    }
}

impl From<f64> for MessageValue {
    fn from(value: f64) -> Self {
        MessageValue::Number(value)
    }
}

/// One side-channel event recorded during a trial.
///
/// Custom fields and zone events are `(name, text)` pairs. Events from
/// per-trial spreadsheet files pair the numeric timestamp with a composed
/// zone descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub label: MessageValue,
    pub value: MessageValue,
}

impl Message {
    pub fn new(label: impl Into<MessageValue>, value: impl Into<MessageValue>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A sample value as it was read, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Text taken verbatim from a delimited table
    Text(String),
    /// Number already coerced from a typed spreadsheet cell
    Number(f64),
}

/// Trial under construction.
///
/// Samples are only ever pushed as complete `(time, x, y)` triples, so the
/// three sequences stay the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTrial {
    time: Vec<RawValue>,
    x: Vec<RawValue>,
    y: Vec<RawValue>,
    pub messages: Vec<Message>,
    pub trial_number: Option<String>,
}

impl RawTrial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_sample(&mut self, time: RawValue, x: RawValue, y: RawValue) {
        self.time.push(time);
        self.x.push(x);
        self.y.push(y);
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn sample_count(&self) -> usize {
        self.time.len()
    }

    pub fn time(&self) -> &[RawValue] {
        &self.time
    }

    pub fn x(&self) -> &[RawValue] {
        &self.x
    }

    pub fn y(&self) -> &[RawValue] {
        &self.y
    }

    /// Move samples and messages of `other` onto the end of this trial.
    pub fn absorb(&mut self, other: RawTrial) {
        self.time.extend(other.time);
        self.x.extend(other.x);
        self.y.extend(other.y);
        self.messages.extend(other.messages);
        if self.trial_number.is_none() {
            self.trial_number = other.trial_number;
        }
    }
}

/// A normalized trial: numeric trajectory plus ordered messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trial {
    pub time: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub messages: Vec<Message>,
    pub trial_number: Option<String>,
}

impl Trial {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// One participant and the trials recorded for them, in encounter order.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant<T> {
    pub id: String,
    /// Monitor resolution, `"WIDTHxHEIGHT"`
    pub resolution: Option<String>,
    /// Viewport size, `"WIDTHxHEIGHT"`
    pub viewport: Option<String>,
    pub trials: Vec<T>,
}

impl<T> Participant<T> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resolution: None,
            viewport: None,
            trials: Vec::new(),
        }
    }

    /// Fill resolution and viewport where they are still unknown.
    pub fn fill_screen(&mut self, resolution: Option<String>, viewport: Option<String>) {
        if self.resolution.is_none() {
            self.resolution = resolution;
        }
        if self.viewport.is_none() {
            self.viewport = viewport;
        }
    }
}

/// Participants keyed by id, iterating in first-encounter order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantMap<T> {
    entries: Vec<Participant<T>>,
    index: HashMap<String, usize>,
}

impl<T> Default for ParticipantMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> ParticipantMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Participant<T>> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Participant<T>> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.entries[i]),
            None => None,
        }
    }

    /// Return the participant for `id`, creating it if this is the first
    /// sighting. The flag is `true` when the entry was created.
    pub fn get_or_insert(&mut self, id: &str) -> (&mut Participant<T>, bool) {
        match self.index.get(id) {
            Some(&i) => (&mut self.entries[i], false),
            None => {
                let i = self.entries.len();
                self.entries.push(Participant::new(id));
                self.index.insert(id.to_string(), i);
                (&mut self.entries[i], true)
            }
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|p| p.id.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Participant<T>> {
        self.entries.iter()
    }

    pub fn trial_count(&self) -> usize {
        self.entries.iter().map(|p| p.trials.len()).sum()
    }
}

impl<T> IntoIterator for ParticipantMap<T> {
    type Item = Participant<T>;
    type IntoIter = std::vec::IntoIter<Participant<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ParticipantMap<T> {
    type Item = &'a Participant<T>;
    type IntoIter = std::slice::Iter<'a, Participant<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<T> FromIterator<Participant<T>> for ParticipantMap<T> {
    fn from_iter<I: IntoIterator<Item = Participant<T>>>(iter: I) -> Self {
        let mut map = ParticipantMap::new();
        for participant in iter {
            map.index.insert(participant.id.clone(), map.entries.len());
            map.entries.push(participant);
        }
        map
    }
}

/// Participants as accumulated by the parsers.
pub type RawParticipantMap = ParticipantMap<RawTrial>;

/// Participants after the normalization pass.
pub type TrajectoryMap = ParticipantMap<Trial>;

/// Counters for tolerated defects seen during one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Rows whose field count differs from the header
    pub skipped_rows: usize,
    /// Coordinate rows dropped under the skip policy
    pub skipped_samples: usize,
    /// Rows seen before the participant's first trial
    pub pre_trial_rows: usize,
    /// Index rows referencing a remote URL
    pub remote_skipped: usize,
    /// Referenced per-trial files that do not exist
    pub missing_files: usize,
    /// Per-trial files without any data row
    pub empty_files: usize,
    /// Folder entries that are not per-trial spreadsheets
    pub skipped_entries: usize,
}

impl Diagnostics {
    pub fn merge(&mut self, other: &Diagnostics) {
        self.skipped_rows += other.skipped_rows;
        self.skipped_samples += other.skipped_samples;
        self.pre_trial_rows += other.pre_trial_rows;
        self.remote_skipped += other.remote_skipped;
        self.missing_files += other.missing_files;
        self.empty_files += other.empty_files;
        self.skipped_entries += other.skipped_entries;
    }
}

/// Result of a complete parse run.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub participants: TrajectoryMap,
    pub diagnostics: Diagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_map_keeps_first_encounter_order() {
        let mut map: RawParticipantMap = ParticipantMap::new();
        map.get_or_insert("p2");
        map.get_or_insert("p1");
        let (_, created) = map.get_or_insert("p2");

        assert!(!created);
        assert_eq!(map.ids().collect::<Vec<_>>(), vec!["p2", "p1"]);
    }

    #[test]
    fn test_fill_screen_only_once() {
        let mut p: Participant<Trial> = Participant::new("p1");
        p.fill_screen(Some("1920x1080".into()), None);
        p.fill_screen(Some("800x600".into()), Some("1280x720".into()));

        assert_eq!(p.resolution.as_deref(), Some("1920x1080"));
        assert_eq!(p.viewport.as_deref(), Some("1280x720"));
    }

    #[test]
    fn test_raw_trial_absorb_keeps_lengths_equal() {
        let mut trial = RawTrial::new();
        trial.push_message(Message::new("condition", "a"));
        let mut other = RawTrial::new();
        other.push_sample(RawValue::Number(0.0), RawValue::Number(1.0), RawValue::Number(2.0));
        other.push_message(Message::new(0.0, "type=zone zone=screen"));

        trial.absorb(other);

        assert_eq!(trial.sample_count(), 1);
        assert_eq!(trial.x().len(), trial.y().len());
        assert_eq!(trial.messages[0].label, MessageValue::from("condition"));
        assert_eq!(trial.messages.len(), 2);
    }
}
