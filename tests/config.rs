use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;

use dragontail_fetch::config::{CONFIG_FILE_NAME, Config, ConfigLoader, ResolvedConfig};
use dragontail_fetch::error::DragontailError;

#[test]
fn project_file_overrides_defaults() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(
        temp.path().join(CONFIG_FILE_NAME),
        r#"{"locale": "ko_KR", "copy_workers": 2, "request_timeout_secs": 5}"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(None, temp.path()).unwrap();
    assert_eq!(resolved.locale, "ko_KR");
    assert_eq!(resolved.copy_workers, 2);
    assert_eq!(resolved.request_timeout, Duration::from_secs(5));
    assert_eq!(resolved.versions_url, ResolvedConfig::default().versions_url);
}

#[test]
fn explicit_path_wins() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join(CONFIG_FILE_NAME), r#"{"locale": "ko_KR"}"#).unwrap();
    let explicit = temp.path().join("ci.json");
    fs::write(
        &explicit,
        r#"{"versions_url": "http://127.0.0.1:8080/versions.json", "archive_url_template": "http://127.0.0.1:8080/{version}.tgz"}"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(Some(explicit.as_path()), temp.path()).unwrap();
    assert_eq!(resolved.locale, "en_US");
    assert_eq!(resolved.versions_url, "http://127.0.0.1:8080/versions.json");
    assert_eq!(
        resolved.archive_url(&"14.1.1".parse().unwrap()),
        "http://127.0.0.1:8080/14.1.1.tgz"
    );
}

#[test]
fn missing_explicit_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let err = ConfigLoader::resolve(Some(temp.path().join("nope.json").as_path()), temp.path()).unwrap_err();
    assert_matches!(err, DragontailError::ConfigRead(_));
}

#[test]
fn malformed_file_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join(CONFIG_FILE_NAME);
    fs::write(&path, "{ locale: en_US").unwrap();

    let err = ConfigLoader::resolve(Some(path.as_path()), temp.path()).unwrap_err();
    assert_matches!(err, DragontailError::ConfigParse(_));
}

#[test]
fn invalid_values_are_rejected() {
    let zero_workers = Config {
        copy_workers: Some(0),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(zero_workers),
        Err(DragontailError::InvalidConfig(_))
    );

    let zero_chunk = Config {
        chunk_size: Some(0),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(zero_chunk),
        Err(DragontailError::InvalidConfig(_))
    );

    let bad_locale = Config {
        locale: Some("../en_US".to_string()),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(bad_locale),
        Err(DragontailError::InvalidConfig(_))
    );
}
