use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use dataseer_report::config::{Config, ConfigLoader, TemplateEntry, TemplateEntryObject};
use dataseer_report::domain::ReportKind;
use dataseer_report::error::ReportError;
use dataseer_report::templates::builtin_layout;

#[test]
fn parse_config_shorthand() {
    let mut config = Config {
        folder_id: Some("folder-1".to_string()),
        pace_ms: Some(250),
        ..Config::default()
    };
    config.templates.insert(
        "ASAP-PPMI".to_string(),
        TemplateEntry::Shorthand("tmpl-ppmi".to_string()),
    );
    config.templates.insert(
        "generic".to_string(),
        TemplateEntry::Detailed(TemplateEntryObject {
            file_id: "tmpl-generic".to_string(),
            layout: None,
        }),
    );

    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.schema_version, 1);
    assert_eq!(resolved.folder_id().unwrap(), "folder-1");
    assert_eq!(resolved.api.pace, Duration::from_millis(250));
    assert_eq!(resolved.template(ReportKind::AsapPpmi).unwrap().file_id, "tmpl-ppmi");
    assert_eq!(
        resolved.template(ReportKind::Generic).unwrap().layout(ReportKind::Generic).unwrap(),
        builtin_layout(ReportKind::Generic)
    );
}

#[test]
fn unknown_kind_is_rejected() {
    let mut config = Config::default();
    config.templates.insert(
        "nature".to_string(),
        TemplateEntry::Shorthand("tmpl".to_string()),
    );
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(ReportError::InvalidReportKind(_))
    );
}

#[test]
fn missing_folder_is_reported() {
    let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
    assert_matches!(resolved.folder_id(), Err(ReportError::ConfigParse(_)));
}

#[test]
fn layout_paths_are_relative_to_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

    let layout = builtin_layout(ReportKind::Hhmi);
    fs::write(
        root.join("hhmi-layout.json"),
        serde_json::to_string_pretty(&layout).unwrap(),
    )
    .unwrap();
    fs::write(
        root.join("ds-report.json"),
        r#"{
            "folder_id": "folder-9",
            "max_retries": 2,
            "templates": {
                "HHMI": {"file_id": "tmpl-hhmi", "layout": "hhmi-layout.json"}
            },
            "share": {"role": "reader", "type": "domain"}
        }"#,
    )
    .unwrap();

    let config_path = root.join("ds-report.json");
    let resolved = ConfigLoader::resolve(Some(config_path.as_str())).unwrap();
    let template = resolved.template(ReportKind::Hhmi).unwrap();
    assert_eq!(template.layout.as_deref(), Some(root.join("hhmi-layout.json").as_path()));
    assert_eq!(template.layout(ReportKind::Hhmi).unwrap(), layout);
    assert_eq!(resolved.api.max_retries, 2);
    assert_eq!(resolved.share.unwrap().grantee_type, "domain");
}

#[test]
fn unreadable_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.json");
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(ReportError::ConfigRead(_))
    );

    let bad = dir.path().join("bad.json");
    fs::write(&bad, "{ not json").unwrap();
    assert_matches!(
        ConfigLoader::resolve(bad.to_str()),
        Err(ReportError::ConfigParse(_))
    );
}
