mod common;

use assert_matches::assert_matches;

use strutture::error::StruttureError;
use strutture::filter::{self, ChoiceRank, FilterSpec};
use strutture::records::{self, Dataset};
use strutture::workbook;

#[test]
fn reads_sheet_names_and_grid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dataset.xlsx");
    common::write_xlsx(
        &path,
        "Foglio1",
        &[
            &["LUOGO", "TIPO NEVE"],
            &["Dobbiaco", "fresca"],
            &[],
            &["Livigno", "trasformata"],
        ],
    );

    assert_eq!(workbook::sheet_names(&path).unwrap(), vec!["Foglio1"]);
    assert!(workbook::has_sheet(&path, "Foglio1").unwrap());
    assert!(!workbook::has_sheet(&path, "Foglio2").unwrap());

    let grid = workbook::read_sheet(&path, "Foglio1").unwrap();
    assert_eq!(grid.len(), 4);
    assert_eq!(grid[1], vec!["Dobbiaco".to_string(), "fresca".to_string()]);
    // Separator rows come back as blank rows, not as dropped rows.
    assert!(grid[2].is_empty());
    assert_eq!(grid[3], vec!["Livigno".to_string(), "trasformata".to_string()]);
}

#[test]
fn missing_sheet_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dataset.xlsx");
    common::write_xlsx(&path, "Altro", &[&["LUOGO"]]);

    assert_matches!(
        workbook::read_sheet(&path, "Foglio1"),
        Err(StruttureError::MissingSheet { sheet, .. }) if sheet == "Foglio1"
    );
}

#[test]
fn truncated_container_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dataset.xlsx");
    std::fs::write(&path, b"PK\x03\x04 not a real archive").unwrap();

    assert_matches!(
        workbook::sheet_names(&path),
        Err(StruttureError::Workbook(_))
    );
}

// Full pipeline over a workbook: read, group on blank rows, filter.
#[test]
fn grouped_filtering_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dataset.xlsx");
    common::write_xlsx(
        &path,
        "Foglio1",
        &[
            &[
                "LUOGO",
                "TEST o GARA",
                "TEMP. ARIA INIZIO",
                "TEMP. ARIA FINE",
                "CONSIDERAZIONE POST GARA o TEST",
            ],
            &["Dobbiaco", "GARA", "-5,2", "", "PRIMA SCELTA"],
            &["Dobbiaco", "GARA", "", "-4,9", ""],
            &[],
            &["Livigno", "TEST", "2", "", "2° set"],
        ],
    );

    let dataset = Dataset::from_grid(workbook::read_sheet(&path, "Foglio1").unwrap());
    let header = dataset.header.clone();
    let groups = records::group_rows(dataset.rows);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].len(), 2);

    // Numeric tolerance match against any start/end cell of any row.
    let spec = FilterSpec {
        air_temp: Some("-4,95".to_string()),
        ..FilterSpec::default()
    };
    let retained = filter::apply(&header, &groups, &spec);
    assert_eq!(retained.len(), 1);
    assert_eq!(retained[0].len(), 2);

    // Choice classification keeps the whole matching group.
    let spec = FilterSpec {
        choice: Some(ChoiceRank::Second),
        ..FilterSpec::default()
    };
    let retained = filter::apply(&header, &groups, &spec);
    assert_eq!(retained.len(), 1);
    assert_eq!(header.value(&retained[0].rows()[0], "LUOGO"), "Livigno");
}
