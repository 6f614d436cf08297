//! Batch aggregation of per-trial spreadsheet files
//!
//! Two ways in:
//! - folder mode ([`aggregate_folder`]): every `.xls`/`.xlsx` file in a
//!   folder is one trial, grouped under the participant id the file reports;
//! - index+file mode ([`FileSource`]): a consolidated table lists the file of
//!   each trial, and the segmenter opens one trial per listed file.

use crate::config::ParserConfig;
use crate::delimited::extension;
use crate::error::ParseError;
use crate::records::Header;
use crate::segmenter::SampleSource;
use crate::sheet::{CellCoercion, SheetReader, LOCK_FILE_PREFIX, SHEET_EXTENSIONS};
use crate::trial_file::{TrialFile, TrialFileParser};
use crate::types::{Diagnostics, Participant, RawParticipantMap, RawTrial};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Per-trial spreadsheet files in `folder`, sorted by file name.
///
/// Lock files and files with other extensions are left out; the number of
/// left-out entries is returned alongside.
pub fn eligible_files(folder: &Path) -> Result<(Vec<PathBuf>, usize), ParseError> {
    if !folder.is_dir() {
        return Err(ParseError::NotFound(folder.to_path_buf()));
    }

    let mut files = Vec::new();
    let mut skipped = 0;
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !path.is_file() || name.starts_with(LOCK_FILE_PREFIX) {
            debug!(entry = %name, "ignoring folder entry");
            skipped += 1;
            continue;
        }
        if !SHEET_EXTENSIONS.contains(&extension(&path).as_str()) {
            debug!(entry = %name, "ignoring file with unsupported extension");
            skipped += 1;
            continue;
        }
        files.push(path);
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok((files, skipped))
}

/// Parse every per-trial file in `folder` and group the trials by participant.
///
/// With `config.parallel` the files are parsed on the rayon pool; merging
/// always happens afterwards, on this thread, in file-name order.
pub fn aggregate_folder(
    folder: &Path,
    config: &ParserConfig,
    reader: &dyn SheetReader,
    coerce: CellCoercion,
) -> Result<(RawParticipantMap, Diagnostics), ParseError> {
    let (files, skipped_entries) = eligible_files(folder)?;
    let parser = TrialFileParser::new(config).with_coercion(coerce);
    let parse_one = |path: &PathBuf| -> Result<TrialFile, ParseError> {
        debug!(file = %path.display(), "parsing per-trial file");
        parser.parse(reader.read(path)?)
    };

    let parsed: Vec<Result<TrialFile, ParseError>> = if config.parallel {
        files.par_iter().map(|p| parse_one(p)).collect()
    } else {
        files.iter().map(|p| parse_one(p)).collect()
    };

    let mut participants = RawParticipantMap::new();
    let mut diagnostics = Diagnostics {
        skipped_entries,
        ..Diagnostics::default()
    };
    for (path, result) in files.iter().zip(parsed) {
        merge_trial_file(&mut participants, path, result?, &mut diagnostics);
    }

    info!(
        folder = %folder.display(),
        files = files.len(),
        participants = participants.len(),
        trials = participants.trial_count(),
        "aggregated per-trial files"
    );
    Ok((participants, diagnostics))
}

fn merge_trial_file(
    participants: &mut RawParticipantMap,
    path: &Path,
    file: TrialFile,
    diagnostics: &mut Diagnostics,
) {
    diagnostics.skipped_rows += file.skipped_rows;
    let Some(id) = file.participant_id else {
        diagnostics.empty_files += 1;
        warn!(file = %path.display(), "per-trial file has no data rows; skipping");
        return;
    };

    let (participant, created) = participants.get_or_insert(&id);
    if created {
        participant.resolution = file.viewport.clone();
        participant.viewport = file.viewport;
    }
    participant.trials.push(file.trial);
}

/// Sample source for consolidated tables that reference per-trial files.
///
/// An index row opens a trial when its zone type is the file-reference
/// marker and its response names a local file. Remote URLs are skipped;
/// files that do not exist leave the trial empty.
pub struct FileSource<'a> {
    config: &'a ParserConfig,
    reader: &'a dyn SheetReader,
    parser: TrialFileParser<'a>,
    trial_folder: PathBuf,
    zone: usize,
    response: usize,
    trial_number: usize,
}

impl<'a> FileSource<'a> {
    pub fn new(
        header: &Header,
        config: &'a ParserConfig,
        reader: &'a dyn SheetReader,
        trial_folder: &Path,
        coerce: CellCoercion,
    ) -> Result<Self, ParseError> {
        if !trial_folder.is_dir() {
            return Err(ParseError::NotFound(trial_folder.to_path_buf()));
        }
        Ok(Self {
            config,
            reader,
            parser: TrialFileParser::new(config).with_coercion(coerce),
            trial_folder: trial_folder.to_path_buf(),
            zone: header.column(&config.columns.zone_type)?,
            response: header.column(&config.columns.response)?,
            trial_number: header.column(&config.columns.trial_number)?,
        })
    }

    fn references_file(&self, row: &[String]) -> bool {
        row[self.zone] == self.config.file_reference_zone && !is_remote(&row[self.response])
    }
}

impl SampleSource for FileSource<'_> {
    fn opens_trial(&mut self, row: &[String], diagnostics: &mut Diagnostics) -> bool {
        if row[self.zone] != self.config.file_reference_zone {
            return false;
        }
        if is_remote(&row[self.response]) {
            diagnostics.remote_skipped += 1;
            debug!(url = %row[self.response], "skipping remote trial file");
            return false;
        }
        true
    }

    fn absorb(
        &mut self,
        row: &[String],
        participant: &mut Participant<RawTrial>,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), ParseError> {
        if !self.references_file(row) {
            return Ok(());
        }
        let Some(trial) = participant.trials.last_mut() else {
            return Ok(());
        };

        let number = row[self.trial_number].trim();
        if !number.is_empty() {
            trial.trial_number = Some(number.to_string());
        }

        let name = &row[self.response];
        let path = self.trial_folder.join(name);
        if !path.is_file() {
            diagnostics.missing_files += 1;
            warn!(file = %path.display(), participant = %participant.id, "trial file not found; recording an empty trial");
            return Ok(());
        }

        let file = self.parser.parse(self.reader.read(&path)?)?;
        diagnostics.skipped_rows += file.skipped_rows;
        match file.participant_id.as_deref() {
            Some(file_id) if file_id != participant.id => {
                return Err(ParseError::IdentityMismatch {
                    file: name.clone(),
                    index_id: participant.id.clone(),
                    file_id: file_id.to_string(),
                });
            }
            Some(_) => {}
            None => {
                diagnostics.empty_files += 1;
                warn!(file = %path.display(), "trial file has no data rows");
            }
        }

        if participant.viewport.is_none() {
            participant.viewport = file.viewport;
        }
        trial.absorb(file.trial);
        Ok(())
    }
}

fn is_remote(reference: &str) -> bool {
    let lower = reference.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sheet::{coerce_nan_tolerant, Cell, Sheet};
    use crate::trial_file::tests::{mouse_row, sheet, zone_row};
    use crate::types::{Message, RawValue};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// Serves sheets by file name; the files on disk only need to exist.
    #[derive(Default)]
    pub(crate) struct MemoryReader {
        sheets: HashMap<String, Sheet>,
    }

    impl MemoryReader {
        pub(crate) fn with(self, name: &str, rows: Vec<Vec<Cell>>) -> Self {
            self.with_sheet(name, sheet(rows))
        }

        pub(crate) fn with_sheet(mut self, name: &str, sheet: Sheet) -> Self {
            self.sheets.insert(name.to_string(), sheet);
            self
        }
    }

    impl SheetReader for MemoryReader {
        fn read(&self, path: &Path) -> Result<Sheet, ParseError> {
            let name = path.file_name().unwrap().to_string_lossy();
            self.sheets
                .get(&*name)
                .cloned()
                .ok_or_else(|| ParseError::NotFound(path.to_path_buf()))
        }
    }

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), b"").unwrap();
        }
    }

    #[test]
    fn test_eligible_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            &["b.xlsx", "a.XLS", "~$b.xlsx", "notes.txt", "c.xlsx"],
        );
        fs::create_dir(dir.path().join("sub.xlsx")).unwrap();

        let (files, skipped) = eligible_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.XLS", "b.xlsx", "c.xlsx"]);
        assert_eq!(skipped, 3);
    }

    #[test]
    fn test_missing_folder() {
        let err = eligible_files(Path::new("/nonexistent/trials")).unwrap_err();
        assert!(matches!(err, ParseError::NotFound(_)));
    }

    #[test]
    fn test_folder_groups_by_participant_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["t2.xlsx", "t1.xlsx", "t3.xlsx"]);
        let reader = MemoryReader::default()
            .with(
                "t1.xlsx",
                vec![
                    zone_row("7", "screen", 1280.0, 720.0, 0.0),
                    mouse_row("7", 1.0, 10.0, 20.0),
                ],
            )
            .with(
                "t2.xlsx",
                vec![
                    zone_row("7", "screen", 800.0, 600.0, 0.0),
                    mouse_row("7", 1.0, 30.0, 40.0),
                ],
            )
            .with("t3.xlsx", vec![mouse_row("8", 1.0, 5.0, 5.0)]);
        let config = ParserConfig::default();

        let (participants, _) =
            aggregate_folder(dir.path(), &config, &reader, coerce_nan_tolerant).unwrap();

        assert_eq!(participants.ids().collect::<Vec<_>>(), vec!["7", "8"]);
        let p7 = participants.get("7").unwrap();
        assert_eq!(p7.viewport.as_deref(), Some("1280x720"));
        assert_eq!(p7.resolution.as_deref(), Some("1280x720"));
        assert_eq!(p7.trials.len(), 2);
        assert_eq!(p7.trials[1].x(), &[RawValue::Number(30.0)]);
        assert_eq!(participants.get("8").unwrap().viewport, None);
    }

    #[test]
    fn test_parallel_parse_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..12).map(|i| format!("trial_{i:02}.xlsx")).collect();
        let mut reader = MemoryReader::default();
        for (i, name) in names.iter().enumerate() {
            fs::write(dir.path().join(name), b"").unwrap();
            let id = if i % 2 == 0 { "even" } else { "odd" };
            reader = reader.with(name, vec![mouse_row(id, i as f64, i as f64, 0.0)]);
        }

        let sequential = ParserConfig::default();
        let parallel = ParserConfig::default().with_parallel(true);
        let (a, _) = aggregate_folder(dir.path(), &sequential, &reader, coerce_nan_tolerant).unwrap();
        let (b, _) = aggregate_folder(dir.path(), &parallel, &reader, coerce_nan_tolerant).unwrap();

        assert_eq!(a, b);
        assert_eq!(b.get("even").unwrap().trials.len(), 6);
    }

    #[test]
    fn test_empty_file_is_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["a.xlsx", "b.xlsx"]);
        let reader = MemoryReader::default()
            .with("a.xlsx", Vec::new())
            .with("b.xlsx", vec![mouse_row("1", 0.0, 0.0, 0.0)]);

        let (participants, diagnostics) =
            aggregate_folder(dir.path(), &ParserConfig::default(), &reader, coerce_nan_tolerant)
                .unwrap();
        assert_eq!(diagnostics.empty_files, 1);
        assert_eq!(participants.len(), 1);
    }

    #[test]
    fn test_remote_detection() {
        assert!(is_remote("https://example.org/trial.xlsx"));
        assert!(is_remote("HTTP://example.org/trial.xlsx"));
        assert!(!is_remote("uploads/trial.xlsx"));
    }

    #[test]
    fn test_file_source_requires_trial_folder() {
        let header = Header::new(["Zone Type", "Response", "Trial Number"]);
        let config = ParserConfig::default();
        let reader = MemoryReader::default();
        let err = FileSource::new(
            &header,
            &config,
            &reader,
            Path::new("/nonexistent/trials"),
            coerce_nan_tolerant,
        )
        .err()
        .unwrap();
        assert!(matches!(err, ParseError::NotFound(_)));
    }

    #[test]
    fn test_file_source_appends_after_existing_messages() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["t1.xlsx"]);
        let reader = MemoryReader::default().with("t1.xlsx", vec![mouse_row("p1", 0.0, 3.0, 4.0)]);
        let header = Header::new(["Zone Type", "Response", "Trial Number"]);
        let config = ParserConfig::default();
        let mut source =
            FileSource::new(&header, &config, &reader, dir.path(), coerce_nan_tolerant).unwrap();

        let row: Vec<String> = ["mouse tracking", "t1.xlsx", "3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut participant = Participant::new("p1");
        let mut trial = RawTrial::new();
        trial.push_message(Message::new("condition", "a"));
        participant.trials.push(trial);
        let mut diagnostics = Diagnostics::default();

        assert!(source.opens_trial(&row, &mut diagnostics));
        source.absorb(&row, &mut participant, &mut diagnostics).unwrap();

        let trial = &participant.trials[0];
        assert_eq!(trial.trial_number.as_deref(), Some("3"));
        assert_eq!(trial.messages[0], Message::new("condition", "a"));
        assert_eq!(trial.sample_count(), 1);
    }
}
