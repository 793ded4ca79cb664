use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::{Value, json};

use dragontail_fetch::champions::generate;
use dragontail_fetch::error::DragontailError;

fn paths() -> (tempfile::TempDir, Utf8PathBuf, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root.join("champion.json"), root.join("data/champions.json"))
}

#[test]
fn generate_projects_and_overwrites() {
    let (_temp, source, output) = paths();
    fs::write(
        &source,
        json!({
            "type": "champion",
            "data": {
                "Aatrox": {"id": "Aatrox", "name": "Aatrox", "blurb": "..."},
                "KSante": {"id": "KSante", "name": "K'Sante"},
                "Unnamed": {"id": "Unnamed"}
            }
        })
        .to_string(),
    )
    .unwrap();
    fs::create_dir_all(output.parent().unwrap()).unwrap();
    fs::write(&output, "{\"Old\": \"Entry\"}").unwrap();

    let table = generate(&source, &output).unwrap();
    assert_eq!(table.len(), 3);

    let written: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(
        written,
        json!({"Aatrox": "Aatrox", "KSante": "K'Sante", "Unnamed": null})
    );
    let keys: Vec<_> = written.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["Aatrox", "KSante", "Unnamed"]);
}

#[test]
fn missing_source_is_missing_input() {
    let (_temp, source, output) = paths();
    let err = generate(&source, &output).unwrap_err();
    assert_matches!(err, DragontailError::MissingInput(path) if path == source);
    assert!(!output.exists());
}

#[test]
fn invalid_json_is_malformed_input() {
    let (_temp, source, output) = paths();
    fs::write(&source, "{\"data\": {").unwrap();
    let err = generate(&source, &output).unwrap_err();
    assert_matches!(err, DragontailError::MalformedInput { path, .. } if path == source);
}

#[test]
fn empty_data_writes_empty_table() {
    let (_temp, source, output) = paths();
    fs::write(&source, "{\"data\": {}}").unwrap();
    let table = generate(&source, &output).unwrap();
    assert!(table.is_empty());
    assert_eq!(fs::read_to_string(&output).unwrap(), "{}");
}
