use std::fs;

use fieldmap_cli::source::{parse_hint, read_source_fields};
use fieldmap_model::FieldDataType;
use tempfile::TempDir;

fn write_csv(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("upload.csv");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn headers_become_fields_with_samples() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "fname, Email ,phone\nAda,ada@example.com,555-0100\nGrace,grace@example.com,555-0101\n",
    );

    let fields = read_source_fields(&path, 5).unwrap();
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["fname", "Email", "phone"]);
    assert_eq!(fields[0].samples, ["Ada", "Grace"]);
    assert_eq!(fields[1].samples, ["ada@example.com", "grace@example.com"]);
    assert!(fields.iter().all(|f| f.column_type.is_none()));
}

#[test]
fn sampling_stops_at_the_row_limit() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "city\nOslo\nLima\nPune\nKyiv\n");

    let fields = read_source_fields(&path, 2).unwrap();
    assert_eq!(fields[0].samples, ["Oslo", "Lima"]);

    let headers_only = read_source_fields(&path, 0).unwrap();
    assert_eq!(headers_only.len(), 1);
    assert!(headers_only[0].samples.is_empty());
}

#[test]
fn blank_cells_and_ragged_rows_are_tolerated() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "a,b,c\n1,,3\n4\n7,8,9,10\n");

    let fields = read_source_fields(&path, 10).unwrap();
    assert_eq!(fields[0].samples, ["1", "4", "7"]);
    assert_eq!(fields[1].samples, ["8"]);
    assert_eq!(fields[2].samples, ["3", "9"]);
}

#[test]
fn missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let error = read_source_fields(&dir.path().join("absent.csv"), 5).unwrap_err();
    assert!(format!("{error:#}").contains("absent.csv"));
}

#[test]
fn hints_parse_column_and_type() {
    assert_eq!(
        parse_hint("contact=email").unwrap(),
        ("contact".to_string(), FieldDataType::Email)
    );
    assert_eq!(
        parse_hint(" start = date").unwrap(),
        ("start".to_string(), FieldDataType::Date)
    );
    assert_eq!(
        parse_hint("a=b=int").unwrap(),
        ("a=b".to_string(), FieldDataType::Number)
    );
}

#[test]
fn malformed_hints_are_rejected() {
    assert!(parse_hint("contact").is_err());
    assert!(parse_hint("=email").is_err());
    assert!(parse_hint("contact=blob").is_err());
}
