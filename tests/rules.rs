use std::collections::BTreeSet;

use assert_matches::assert_matches;

use dataseer_report::domain::{AssignedRule, DataObjectRecord, ObjectKind, ReportInput, ReportKind};
use dataseer_report::rules::{UnclassifiedReason, partition, partition_input};

fn record(name: &str, kind: ReportKind, rule: &str, reuse: bool) -> DataObjectRecord {
    let mut record = DataObjectRecord {
        name: name.to_string(),
        reuse,
        ..DataObjectRecord::default()
    };
    record.rules.insert(
        kind.rules_key().to_string(),
        AssignedRule {
            rule: rule.to_string(),
        },
    );
    record
}

#[test]
fn hhmi_key_zero_is_shared() {
    let records = vec![record(
        "GSE1",
        ReportKind::Hhmi,
        "Deposit to appropriate repository and cite PID in text[0]",
        false,
    )];
    let partition = partition(ReportKind::Hhmi, ObjectKind::Datasets, &records);

    assert_eq!(partition.bucket("shared").unwrap().len(), 1);
    assert!(partition.bucket("not-shared").unwrap().is_empty());
    assert!(partition.unclassified.is_empty());
}

#[test]
fn asap_splits_new_and_reused() {
    let kind = ReportKind::Asap;
    let records = vec![
        record("a", kind, "Action Required[1]", false),
        record("b", kind, "Action Not Required[0]", false),
        record("c", kind, "Action Required[1]", true),
        record("d", kind, "Action Not Required[0]", true),
        record("e", kind, "Action Required[1]", false),
    ];
    let partition = partition(kind, ObjectKind::Datasets, &records);

    let names = |id: &str| {
        partition
            .bucket(id)
            .unwrap()
            .records
            .iter()
            .map(|record| record.name.as_str())
            .collect::<Vec<_>>()
    };
    assert_eq!(names("new-identified"), vec!["a", "e"]);
    assert_eq!(names("new-shared"), vec!["b"]);
    assert_eq!(names("reuse-identified"), vec!["c"]);
    assert_eq!(names("reuse-shared"), vec!["d"]);
}

#[test]
fn asap_rules_shared_by_family_keys() {
    let records = vec![record("ppmi", ReportKind::AsapPpmi, "Action Required[1]", false)];
    let ppmi = partition(ReportKind::AsapPpmi, ObjectKind::Code, &records);
    assert_eq!(ppmi.bucket("new-identified").unwrap().len(), 1);

    // The plain ASAP kind reads its own rules key and finds nothing.
    let asap = partition(ReportKind::Asap, ObjectKind::Code, &records);
    assert_eq!(asap.classified_len(), 0);
    assert_matches!(
        asap.unclassified[0].reason,
        UnclassifiedReason::MissingRule
    );
}

#[test]
fn unusable_keys_are_kept_aside() {
    let kind = ReportKind::Amnat;
    let records = vec![
        record("missing-bracket", kind, "Verify citation", false),
        record("unknown", kind, "Something else[7]", false),
        record("fine", kind, "Verify citation[1]", false),
        DataObjectRecord {
            name: "no-rule".to_string(),
            ..DataObjectRecord::default()
        },
    ];
    let partition = partition(kind, ObjectKind::Software, &records);

    assert_eq!(partition.bucket("verify").unwrap().len(), 1);
    let reasons = partition
        .unclassified
        .iter()
        .map(|item| (item.record.name.as_str(), item.reason))
        .collect::<Vec<_>>();
    assert_eq!(
        reasons,
        vec![
            ("missing-bracket", UnclassifiedReason::MalformedKey),
            ("unknown", UnclassifiedReason::UnknownKey(7)),
            ("no-rule", UnclassifiedReason::MissingRule),
        ]
    );
}

#[test]
fn generic_commercial_bucket_only_for_materials() {
    let records = vec![record("antibody", ReportKind::Generic, "Commercial[3]", false)];

    let materials = partition(ReportKind::Generic, ObjectKind::Materials, &records);
    assert_eq!(materials.bucket("commercial").unwrap().len(), 1);

    let datasets = partition(ReportKind::Generic, ObjectKind::Datasets, &records);
    assert!(datasets.bucket("commercial").is_none());
    assert_eq!(datasets.unclassified.len(), 1);
}

#[test]
fn partition_covers_every_record_once() {
    let rules = [
        "Action Required[2]",
        "Add identifier[3]",
        "Verify citation[1]",
        "No action[0]",
        "Broken",
        "Unknown[9]",
    ];
    for kind in ReportKind::ALL {
        let records = (0..30)
            .map(|index| {
                record(
                    &format!("r{index}"),
                    kind,
                    rules[index % rules.len()],
                    index % 4 == 0,
                )
            })
            .collect::<Vec<_>>();
        for object_kind in ObjectKind::ALL {
            let partition = partition(kind, object_kind, &records);
            let mut seen = BTreeSet::new();
            for bucket in &partition.buckets {
                for record in &bucket.records {
                    assert!(seen.insert(record.name.clone()), "{kind}: {} twice", record.name);
                }
            }
            for item in &partition.unclassified {
                assert!(seen.insert(item.record.name.clone()));
            }
            assert_eq!(seen.len(), records.len(), "{kind} {object_kind}");
        }
    }
}

#[test]
fn partition_input_reads_every_field() {
    let input = ReportInput::from_json(
        r#"{
            "document": {"name": "MS-42"},
            "datasets": [{"name": "d", "rules": {"HHMI": {"rule": "Shared[0]"}}}],
            "reagents": [{"name": "m", "rules": {"HHMI": {"rule": "Not shared[1]"}}}]
        }"#,
    )
    .unwrap();
    let partitions = partition_input(ReportKind::Hhmi, &input);

    assert_eq!(partitions.len(), ObjectKind::ALL.len());
    let materials = partitions
        .iter()
        .find(|partition| partition.object_kind == ObjectKind::Materials)
        .unwrap();
    assert_eq!(materials.bucket("not-shared").unwrap().len(), 1);
    assert!(
        partitions
            .iter()
            .filter(|partition| partition.object_kind == ObjectKind::Code)
            .all(|partition| partition.is_empty())
    );
}
