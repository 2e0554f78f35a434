//! CSV and workbook sources and the `fan_out_file` entry point.

use cvfanout::{
    CsvSource, DispatchError, ExcelSource, Opts, PoolConfig, RunState, SourceError, TableSource,
    fan_out_file,
};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn test_headers_and_ids() {
    let data = "Name, Category ,skills\nAda,Eng,Rust\nBob,Ops,Bash\n";
    let source = CsvSource::from_reader(Cursor::new(data)).unwrap();
    assert_eq!(source.headers(), ["Name", "Category", "skills"]);

    let items: Vec<_> = source.map(|r| r.unwrap()).collect();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, 0);
    assert_eq!(items[1].id, 1);
    assert_eq!(items[1].get("Category"), Some("Ops"));
    assert_eq!(
        items[0].fields,
        vec![
            ("Name".to_string(), "Ada".to_string()),
            ("Category".to_string(), "Eng".to_string()),
            ("skills".to_string(), "Rust".to_string()),
        ]
    );
}

#[test]
fn test_ragged_rows_are_kept() {
    let data = "Name,Category\nAda\nBob,Ops,extra\n";
    let items: Vec<_> = CsvSource::from_reader(Cursor::new(data))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(items[0].fields.len(), 1);
    assert_eq!(items[0].get("Category"), None);
    assert_eq!(items[1].get("column_2"), Some("extra"));
}

#[test]
fn test_empty_cells_are_empty_strings() {
    let data = "Name,Category\nAda,\n";
    let items: Vec<_> = CsvSource::from_reader(Cursor::new(data))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(items[0].get("Category"), Some(""));
}

#[test]
fn test_quoted_fields_with_commas_and_newlines() {
    let data = "Name,Category\n\"Lovelace, Ada\",\"Research\nand Dev\"\n";
    let items: Vec<_> = CsvSource::from_reader(Cursor::new(data))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].get("Name"), Some("Lovelace, Ada"));
    assert_eq!(items[0].get("Category"), Some("Research\nand Dev"));
}

#[test]
fn test_invalid_utf8_row_is_a_row_error() {
    let mut data = b"Name,Category\nAda,Eng\n".to_vec();
    data.extend_from_slice(b"B\xffb,Ops\n");
    data.extend_from_slice(b"Cy,Eng\n");
    let rows: Vec<_> = CsvSource::from_reader(Cursor::new(data)).unwrap().collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].is_ok());
    let err = rows[1].as_ref().unwrap_err();
    assert_eq!(err.id, 1);
    assert_eq!(rows[2].as_ref().unwrap().id, 2);
}

#[test]
fn test_missing_file_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let err = CsvSource::open(&tmp.path().join("nope.csv")).err().unwrap();
    assert!(matches!(err, SourceError::Open { .. }));
    assert!(err.to_string().contains("nope.csv"));
}

fn opts(root: &Path) -> Opts {
    Opts {
        output: root.to_path_buf(),
        pool: PoolConfig {
            worker_count: 3,
            queue_capacity: 2,
            max_concurrent_active: None,
            join_timeout: Duration::from_secs(30),
        },
        ..Opts::default()
    }
}

#[test]
fn test_fan_out_file_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("cvs.csv");
    fs::write(
        &input,
        "Name,Category,skills,Titre\nAda,Eng,,\nBob,,Python,\nCy,,,Chef\nDee,,,\nEve,Data/ML,,\n",
    )
    .unwrap();
    let out = tmp.path().join("out");

    let summary = fan_out_file(&input, &opts(&out), None).unwrap();
    assert_eq!(summary.drained_via, RunState::Joined);
    assert_eq!((summary.submitted, summary.succeeded, summary.failed), (5, 5, 0));
    for rel in [
        "Eng/item_0.txt",
        "Python/item_1.txt",
        "Chef/item_2.txt",
        "Unknown/item_3.txt",
        "Data_ML/item_4.txt",
    ] {
        assert!(out.join(rel).is_file(), "{rel}");
    }
    assert_eq!(
        fs::read_to_string(out.join("Chef/item_2.txt")).unwrap(),
        "=== CV 2 ===\nName: Cy\nCategory: \nskills: \nTitre: Chef\n"
    );
}

#[test]
fn test_fan_out_file_missing_input_creates_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    let err = fan_out_file(&tmp.path().join("missing.csv"), &opts(&out), None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DispatchError>(),
        Some(DispatchError::Source(SourceError::Open { .. }))
    ));
    assert!(!out.exists());
}

#[test]
fn test_fan_out_file_header_only() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("empty.csv");
    fs::write(&input, "Name,Category\n").unwrap();
    let summary = fan_out_file(&input, &opts(&tmp.path().join("out")), None).unwrap();
    assert_eq!(summary.submitted, 0);
    assert_eq!(summary.drained_via, RunState::Joined);
}

// --- workbooks ---

#[test]
fn test_excel_headers_ids_and_cells() {
    let source = ExcelSource::open(&fixture("cvs.xlsx")).unwrap();
    assert_eq!(source.headers(), ["Name", "Category", "skills", "Titre", "Years"]);
    assert_eq!(source.remaining(), 4);

    let items: Vec<_> = source.map(|r| r.unwrap()).collect();
    let ids: Vec<u64> = items.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    assert_eq!(items[0].get("Category"), Some("Eng"));
    // Numbers keep their display form, missing cells are empty strings.
    assert_eq!(items[0].get("Years"), Some("3"));
    assert_eq!(items[1].get("Years"), Some("5.5"));
    assert_eq!(items[0].get("skills"), Some(""));
    assert_eq!(items[3].fields.len(), 5);
}

#[test]
fn test_table_source_picks_reader_by_extension() {
    let tmp = tempfile::tempdir().unwrap();
    let csv = tmp.path().join("in.csv");
    fs::write(&csv, "Name\nAda\n").unwrap();
    let upper = tmp.path().join("IN.XLSX");
    fs::copy(fixture("cvs.xlsx"), &upper).unwrap();

    let source = TableSource::open(&csv).unwrap();
    assert!(matches!(source, TableSource::Csv(_)));
    assert_eq!(source.len_hint(), None);

    let source = TableSource::open(&upper).unwrap();
    assert!(matches!(source, TableSource::Excel(_)));
    assert_eq!(source.len_hint(), Some(4));
    assert_eq!(source.headers()[0], "Name");
}

#[test]
fn test_unreadable_workbook_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let bogus = tmp.path().join("bogus.xlsx");
    fs::write(&bogus, "Name,Category\nAda,Eng\n").unwrap();
    let err = ExcelSource::open(&bogus).unwrap_err();
    assert!(matches!(err, SourceError::Workbook { .. }));
    assert!(err.to_string().contains("bogus.xlsx"));

    let err = ExcelSource::open(&tmp.path().join("missing.xlsx")).unwrap_err();
    assert!(matches!(err, SourceError::Workbook { .. }));
}

#[test]
fn test_fan_out_workbook_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    let opts = Opts {
        verbose: true,
        ..opts(&out)
    };
    let summary = fan_out_file(&fixture("cvs.xlsx"), &opts, None).unwrap();
    assert_eq!(summary.drained_via, RunState::Joined);
    assert_eq!((summary.submitted, summary.succeeded, summary.failed), (4, 4, 0));
    for rel in [
        "Eng/item_0.txt",
        "Python/item_1.txt",
        "Chef/item_2.txt",
        "Unknown/item_3.txt",
    ] {
        assert!(out.join(rel).is_file(), "{rel}");
    }
    assert_eq!(
        fs::read_to_string(out.join("Python/item_1.txt")).unwrap(),
        "=== CV 1 ===\nName: Bob\nCategory: \nskills: Python\nTitre: \nYears: 5.5\n"
    );
}

#[test]
fn test_fan_out_file_waits_for_stragglers_before_returning() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("many.csv");
    let mut data = String::from("Name,Category\n");
    for n in 0..60 {
        data.push_str(&format!("p{n},Eng\n"));
    }
    fs::write(&input, data).unwrap();
    let out = tmp.path().join("out");
    let mut opts = opts(&out);
    opts.pool.join_timeout = Duration::ZERO;

    let summary = fan_out_file(&input, &opts, None).unwrap();
    assert_eq!(summary.submitted, 60);
    // Whether or not the zero timeout caught workers mid-write, every write is complete now.
    let names: Vec<String> = fs::read_dir(out.join("Eng"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 60);
    assert!(names.iter().all(|n| n.ends_with(".txt")), "{names:?}");
}
