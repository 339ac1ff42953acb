use std::str::FromStr;

use assert_matches::assert_matches;

use dataseer_report::domain::{ObjectKind, ReportInput, ReportKind, rule_key};
use dataseer_report::error::ReportError;

#[test]
fn report_kinds_parse_from_cli_and_rules_keys() {
    assert_eq!(ReportKind::from_str("asap-ppmi").unwrap(), ReportKind::AsapPpmi);
    assert_eq!(ReportKind::from_str("AmNat").unwrap(), ReportKind::Amnat);
    assert_eq!(ReportKind::from_str(" HHMI ").unwrap(), ReportKind::Hhmi);
    assert_matches!(
        ReportKind::from_str("plos"),
        Err(ReportError::InvalidReportKind(_))
    );
}

#[test]
fn object_kinds_accept_reagents() {
    assert_eq!(ObjectKind::from_str("reagents").unwrap(), ObjectKind::Materials);
    assert_matches!(
        ObjectKind::from_str("figures"),
        Err(ReportError::InvalidObjectKind(_))
    );
}

#[test]
fn rule_keys() {
    assert_eq!(rule_key("Verify citation[2]"), Some(2));
    assert_eq!(rule_key("x[1][2]"), None);
    assert_eq!(rule_key("x"), None);
    assert_eq!(rule_key("x[a]"), None);
    assert_eq!(rule_key("x[2] tail"), None);
}

#[test]
fn parses_extraction_output() {
    let input = ReportInput::from_json(
        r#"{
            "document": {"name": "MS-3", "journal": "eLife", "submitted": "2024-02-01"},
            "datasets": [{
                "name": "Proteomics",
                "DOI": "10.5061/dryad.x",
                "reuse": true,
                "issues": true,
                "notes": "embargoed",
                "sentences": ["Data are in Dryad.", {"text": "See methods."}],
                "type": {"label": "Tabular data", "url": "https://example.org/types/tabular"},
                "rules": {"ASAP": {"rule": "Action Not Required[0]"}}
            }],
            "code": [{"name": "pipeline", "url": "https://github.com/lab/pipeline", "type": "Code"}]
        }"#,
    )
    .unwrap();

    let dataset = &input.datasets[0];
    assert_eq!(dataset.doi.as_deref(), Some("10.5061/dryad.x"));
    assert!(dataset.reuse && dataset.issue);
    assert_eq!(dataset.comments.as_deref(), Some("embargoed"));
    assert_eq!(dataset.sentences_text(), "Data are in Dryad.\nSee methods.");
    assert_eq!(dataset.rule_key(ReportKind::Asap), Some(0));
    assert_eq!(dataset.rule_label(ReportKind::Asap), Some("Action Not Required"));
    assert_eq!(
        ObjectKind::Datasets.identifier(dataset),
        Some("10.5061/dryad.x")
    );

    let code = &input.code[0];
    assert_eq!(code.object_type.as_ref().unwrap().label, "Code");
    assert_eq!(
        ObjectKind::Code.identifier(code),
        Some("https://github.com/lab/pipeline")
    );
    assert!(input.records(ObjectKind::Protocols).is_empty());
}

#[test]
fn input_files_are_read_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("input.json")).unwrap();
    std::fs::write(&path, r#"{"document": {"name": "MS-9"}}"#).unwrap();

    assert_eq!(ReportInput::load(&path).unwrap().document.name, "MS-9");
    assert_matches!(
        ReportInput::load(&path.with_file_name("missing.json")),
        Err(ReportError::InputRead(_))
    );
}
