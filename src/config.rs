//! Parser configuration
//!
//! Column names and marker values default to the ones Gorilla writes into its
//! exports. All of them can be overridden, either in code through the
//! `with_*` builders or from a JSON file via [`ParserConfig::load`].

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Which participant identifier keys the output map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    #[default]
    Private,
    Public,
}

/// Effective precision of normalized sample values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    /// Values parsed as `f32`, then widened
    Single,
    #[default]
    Double,
}

/// What to do with a coordinate row whose response is not an `"x y"` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplePolicy {
    /// Fail the whole parse with [`ParseError::MalformedSample`]
    #[default]
    Abort,
    /// Drop the sample, count it, and keep going
    Skip,
}

/// Column names in the consolidated table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableColumns {
    pub private_id: String,
    pub public_id: String,
    pub resolution: String,
    pub viewport: String,
    /// Zone column used by inline tables
    pub zone: String,
    /// Zone column used when the table references per-trial files
    pub zone_type: String,
    pub response: String,
    pub onset: String,
    pub trial_number: String,
}

impl Default for TableColumns {
    fn default() -> Self {
        Self {
            private_id: "Participant Private ID".to_string(),
            public_id: "Participant Public ID".to_string(),
            resolution: "Participant Monitor Size".to_string(),
            viewport: "Participant Viewport Size".to_string(),
            zone: "Zone Name".to_string(),
            zone_type: "Zone Type".to_string(),
            response: "Response".to_string(),
            onset: "Reaction Onset".to_string(),
            trial_number: "Trial Number".to_string(),
        }
    }
}

/// Column names in per-trial spreadsheet files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetColumns {
    pub private_id: String,
    pub public_id: String,
    pub record_type: String,
    pub zone_name: String,
    pub zone_x: String,
    pub zone_y: String,
    pub zone_width: String,
    pub zone_height: String,
    pub timestamp: String,
    pub x: String,
    pub y: String,
}

impl Default for SheetColumns {
    fn default() -> Self {
        Self {
            private_id: "Participant Private ID".to_string(),
            public_id: "Participant Public ID".to_string(),
            record_type: "Type".to_string(),
            zone_name: "Zone Name".to_string(),
            zone_x: "Zone X".to_string(),
            zone_y: "Zone Y".to_string(),
            zone_width: "Zone W".to_string(),
            zone_height: "Zone H".to_string(),
            timestamp: "Time Stamp".to_string(),
            x: "X".to_string(),
            y: "Y".to_string(),
        }
    }
}

/// Configuration shared by every parser entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Zone value that opens a new trial in inline tables
    pub trial_start_zone: Option<String>,
    /// Extra columns captured once per trial as leading messages
    pub custom_fields: Vec<String>,
    /// Delimiter override for consolidated tables
    pub delimiter: Option<char>,
    pub identity: IdentitySource,
    pub precision: Precision,
    pub sample_policy: SamplePolicy,
    /// Parse folder files on the rayon pool
    pub parallel: bool,
    /// Zone value of rows carrying an inline `"x y"` sample
    pub coordinate_zone: String,
    /// Zone type of index rows that reference a per-trial file
    pub file_reference_zone: String,
    /// Row type of sample rows in per-trial files
    pub sample_type: String,
    /// Zone name whose geometry gives the viewport in per-trial files
    pub screen_zone: String,
    pub columns: TableColumns,
    pub sheet_columns: SheetColumns,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            trial_start_zone: None,
            custom_fields: Vec::new(),
            delimiter: None,
            identity: IdentitySource::default(),
            precision: Precision::default(),
            sample_policy: SamplePolicy::default(),
            parallel: false,
            coordinate_zone: "coordinate".to_string(),
            file_reference_zone: "mouse tracking".to_string(),
            sample_type: "mouse".to_string(),
            screen_zone: "screen".to_string(),
            columns: TableColumns::default(),
            sheet_columns: SheetColumns::default(),
        }
    }
}

impl ParserConfig {
    /// Configuration for inline tables whose trials start at `trial_start_zone`.
    pub fn new(trial_start_zone: impl Into<String>) -> Self {
        Self {
            trial_start_zone: Some(trial_start_zone.into()),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        if !path.exists() {
            return Err(ParseError::NotFound(path.to_path_buf()));
        }
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn with_custom_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_identity(mut self, identity: IdentitySource) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_sample_policy(mut self, policy: SamplePolicy) -> Self {
        self.sample_policy = policy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Identity column of the consolidated table.
    pub fn identity_column(&self) -> &str {
        match self.identity {
            IdentitySource::Private => &self.columns.private_id,
            IdentitySource::Public => &self.columns.public_id,
        }
    }

    /// Identity column of per-trial spreadsheet files.
    pub fn sheet_identity_column(&self) -> &str {
        match self.identity {
            IdentitySource::Private => &self.sheet_columns.private_id,
            IdentitySource::Public => &self.sheet_columns.public_id,
        }
    }
}
