use gorilla_trajectories::records::Header;
use gorilla_trajectories::{
    read_consolidated, Cell, GorillaReader, Message, ParseError, ParserConfig, Sheet, SheetReader,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::{Builder, TempDir};

const SHEET_HEADER: [&str; 10] = [
    "Participant Private ID",
    "Type",
    "Zone Name",
    "Zone X",
    "Zone Y",
    "Zone W",
    "Zone H",
    "Time Stamp",
    "X",
    "Y",
];

/// Trial sheets kept in memory, looked up by file name.
#[derive(Default)]
struct Sheets(HashMap<String, Vec<Vec<Cell>>>);

impl Sheets {
    fn add(&mut self, dir: &Path, name: &str, rows: Vec<Vec<Cell>>) {
        fs::write(dir.join(name), b"").unwrap();
        self.0.insert(name.to_string(), rows);
    }
}

impl SheetReader for Sheets {
    fn read(&self, path: &Path) -> Result<Sheet, ParseError> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        let rows = self
            .0
            .get(&name)
            .cloned()
            .ok_or_else(|| ParseError::NotFound(path.to_path_buf()))?;
        Ok(Sheet::new(Header::new(SHEET_HEADER), rows))
    }
}

fn screen(id: &str, w: f64, h: f64) -> Vec<Cell> {
    vec![
        Cell::from(id),
        Cell::from("zone"),
        Cell::from("screen"),
        Cell::Number(0.0),
        Cell::Number(0.0),
        Cell::Number(w),
        Cell::Number(h),
        Cell::Number(0.0),
        Cell::Empty,
        Cell::Empty,
    ]
}

fn mouse(id: &str, t: f64, x: f64, y: f64) -> Vec<Cell> {
    vec![
        Cell::from(id),
        Cell::from("mouse"),
        Cell::Empty,
        Cell::Empty,
        Cell::Empty,
        Cell::Empty,
        Cell::Empty,
        Cell::Number(t),
        Cell::Number(x),
        Cell::Number(y),
    ]
}

fn write_table(suffix: &str, lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file
}

#[test]
fn consolidated_tsv_with_custom_fields() {
    let file = write_table(
        ".tsv",
        &[
            "Participant Private ID\tParticipant Monitor Size\tParticipant Viewport Size\tZone Name\tResponse\tReaction Onset\tblock\tcondition",
            "101\t1920x1080\t1280x720\tinstructions\tok\t0\tpractice\tnone",
            "101\t1920x1080\t1280x720\tfixation\t\t0\t1\tcongruent",
            "101\t1920x1080\t1280x720\tcoordinate\t10 20\t16.6\t1\tcongruent",
            "101\t1920x1080\t1280x720\tcoordinate\t11 21\t33.3\t1\tcongruent",
            "101\t1920x1080\t1280x720\tresponse\tleft\t500\t1\tcongruent",
            "101\t1920x1080\t1280x720\tfixation\t\t0\t2\tincongruent",
            "101\t1920x1080\t1280x720\tcoordinate\t12 22\t16.6\t2\tincongruent",
            "102\t1366x768\t1366x600\tcoordinate\t1 1\t5\t1\tcongruent",
            "102\t1366x768\t1366x600\tfixation\t\t0\t1\tcongruent",
            "102\t1366x768\t1366x600\tcoordinate\t2 2\t5\t1\tcongruent",
        ],
    );
    let config = ParserConfig::new("fixation").with_custom_fields(["condition", "block"]);

    let outcome = read_consolidated(file.path(), &config).unwrap();

    assert_eq!(outcome.participants.ids().collect::<Vec<_>>(), vec!["101", "102"]);
    let p101 = outcome.participants.get("101").unwrap();
    assert_eq!(p101.trials.len(), 2);
    assert_eq!(p101.trials[0].time, vec![16.6, 33.3]);
    assert_eq!(p101.trials[0].x, vec![10.0, 11.0]);
    assert_eq!(p101.trials[0].y, vec![20.0, 21.0]);
    assert_eq!(
        p101.trials[0].messages,
        vec![
            Message::new("condition", "congruent"),
            Message::new("block", "1"),
            Message::new("fixation", ""),
            Message::new("response", "left"),
        ]
    );
    assert_eq!(p101.trials[1].messages[..2], [
        Message::new("condition", "incongruent"),
        Message::new("block", "2"),
    ]);

    let p102 = outcome.participants.get("102").unwrap();
    assert_eq!(p102.viewport.as_deref(), Some("1366x600"));
    assert_eq!(p102.trials[0].x, vec![2.0]);
    assert_eq!(outcome.diagnostics.pre_trial_rows, 2);

    for p in &outcome.participants {
        for t in &p.trials {
            assert_eq!(t.time.len(), t.x.len());
            assert_eq!(t.x.len(), t.y.len());
        }
    }
}

#[test]
fn consolidated_non_numeric_onset_fails_normalization() {
    let file = write_table(
        ".csv",
        &[
            "Participant Private ID,Participant Monitor Size,Participant Viewport Size,Zone Name,Response,Reaction Onset",
            "1,1x1,1x1,start,,0",
            "1,1x1,1x1,coordinate,1 2,soon",
        ],
    );
    let err = read_consolidated(file.path(), &ParserConfig::new("start")).unwrap_err();
    assert!(matches!(err, ParseError::NumericParse { field: "time", trial: 0, .. }));
}

#[test]
fn consolidated_missing_file() {
    let err = read_consolidated(Path::new("/nonexistent/data.csv"), &ParserConfig::new("start"))
        .unwrap_err();
    assert!(matches!(err, ParseError::NotFound(_)));
}

#[test]
fn folder_mode_orders_by_file_name_and_keeps_first_viewport() {
    let dir = TempDir::new().unwrap();
    let mut sheets = Sheets::default();
    sheets.add(dir.path(), "task-2.xlsx", vec![screen("5", 800.0, 600.0), mouse("5", 0.0, 2.0, 2.0)]);
    sheets.add(dir.path(), "task-1.xlsx", vec![screen("5", 1024.0, 768.0), mouse("5", 0.0, 1.0, 1.0)]);
    sheets.add(dir.path(), "~$task-1.xlsx", Vec::new());
    fs::write(dir.path().join("readme.md"), b"notes").unwrap();

    let outcome = GorillaReader::new(ParserConfig::default())
        .with_sheet_reader(sheets)
        .folder(dir.path())
        .unwrap();

    let p5 = outcome.participants.get("5").unwrap();
    assert_eq!(p5.viewport.as_deref(), Some("1024x768"));
    assert_eq!(p5.resolution.as_deref(), Some("1024x768"));
    assert_eq!(p5.trials[0].x, vec![1.0]);
    assert_eq!(p5.trials[1].x, vec![2.0]);
    assert_eq!(outcome.diagnostics.skipped_entries, 2);
}

#[test]
fn indexed_mode_identity_and_remote_rules() {
    let dir = TempDir::new().unwrap();
    let mut sheets = Sheets::default();
    sheets.add(dir.path(), "trial1.xlsx", vec![mouse("77", 0.0, 3.0, 4.0)]);
    sheets.add(dir.path(), "trial2.xlsx", vec![mouse("78", 0.0, 3.0, 4.0)]);
    let header = "Participant Private ID,Participant Monitor Size,Participant Viewport Size,Zone Type,Response,Trial Number";

    let ok = write_table(
        ".csv",
        &[
            header,
            "77,1920x1080,1280x720,mouse tracking,https://storage.example/trial9.xlsx,9",
            "77,1920x1080,1280x720,mouse tracking,trial1.xlsx,1",
        ],
    );
    let outcome = GorillaReader::new(ParserConfig::default())
        .with_sheet_reader(sheets)
        .indexed(ok.path(), dir.path())
        .unwrap();
    let p77 = outcome.participants.get("77").unwrap();
    assert_eq!(p77.trials.len(), 1);
    assert_eq!(p77.trials[0].x, vec![3.0]);
    assert_eq!(outcome.diagnostics.remote_skipped, 1);

    let mut sheets = Sheets::default();
    sheets.add(dir.path(), "trial2.xlsx", vec![mouse("78", 0.0, 3.0, 4.0)]);
    let bad = write_table(".csv", &[header, "77,1920x1080,1280x720,mouse tracking,trial2.xlsx,2"]);
    let err = GorillaReader::new(ParserConfig::default())
        .with_sheet_reader(sheets)
        .indexed(bad.path(), dir.path())
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("'77'"), "{message}");
    assert!(message.contains("'78'"), "{message}");
    assert!(message.contains("trial2.xlsx"), "{message}");
}
