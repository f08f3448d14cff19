//! Tests for error types

use grade_affinity::model::ModelType;
use grade_affinity::Error;

#[test]
fn test_data_mismatch_error() {
    let error = Error::DataMismatch("test features (3 rows) and test labels (2 rows)".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Data mismatch"));
    assert!(error_str.contains("3 rows"));
}

#[test]
fn test_missing_column_error() {
    let error = Error::MissingColumn {
        column: "VDW_REP".to_string(),
        table: "GRADE.csv".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("'VDW_REP'"));
    assert!(error_str.contains("GRADE.csv"));
}

#[test]
fn test_unknown_model_type_lists_choices() {
    let error = "Perceptron".parse::<ModelType>().unwrap_err();
    assert!(matches!(error, Error::UnknownModelType(ref name) if name == "Perceptron"));
    let error_str = format!("{error}");
    assert!(error_str.contains("Unexpected model type 'Perceptron'"));
    for model in ModelType::ALL {
        assert!(error_str.contains(model.as_str()));
    }
}

#[test]
fn test_parse_error() {
    let error = Error::Parse {
        column: "ES".to_string(),
        row: 4,
        value: "n/a".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("column 'ES'"));
    assert!(error_str.contains("row 4"));
    assert!(error_str.contains("'n/a'"));
}

#[test]
fn test_structure_error() {
    let error = Error::Structure("receptor.pdb: no ATOM or HETATM records".to_string());
    assert!(format!("{error}").starts_with("Structure error: receptor.pdb"));
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("IO error"));
    assert!(error_str.contains("file not found"));
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: Error = json_error.into();
    assert!(format!("{error}").contains("JSON error"));
}

#[test]
fn test_error_debug() {
    let error = Error::InvalidState("session has not been evaluated".to_string());
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("InvalidState"));
}
