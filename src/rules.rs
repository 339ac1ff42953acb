use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{DataObjectRecord, ObjectKind, ReportInput, ReportKind};

/// One "action required" category of a rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRule {
    pub id: String,
    pub label: String,
    pub key: u32,
    /// Restricts the bucket to newly generated (`false`) or reused (`true`) objects.
    #[serde(default)]
    pub reuse: Option<bool>,
}

impl BucketRule {
    fn new(id: &str, label: &str, key: u32, reuse: Option<bool>) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            key,
            reuse,
        }
    }

    pub fn matches(&self, key: u32, record: &DataObjectRecord) -> bool {
        self.key == key && self.reuse.is_none_or(|reuse| reuse == record.reuse)
    }
}

/// Ordered buckets for one report kind and object kind. Order is document
/// order, most action required first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    pub buckets: Vec<BucketRule>,
}

impl RuleTable {
    pub fn builtin(kind: ReportKind, object_kind: ObjectKind) -> Self {
        let buckets = match kind {
            ReportKind::Asap | ReportKind::AsapPpmi | ReportKind::AsapGp2 => vec![
                BucketRule::new("new-identified", "Action Required", 1, Some(false)),
                BucketRule::new("new-shared", "Action Not Required", 0, Some(false)),
                BucketRule::new("reuse-identified", "Action Required", 1, Some(true)),
                BucketRule::new("reuse-shared", "Action Not Required", 0, Some(true)),
            ],
            ReportKind::Hhmi => vec![
                BucketRule::new(
                    "not-shared",
                    "Deposit to appropriate repository and cite PID in text",
                    1,
                    None,
                ),
                BucketRule::new("shared", "Action Not Required", 0, None),
            ],
            ReportKind::Amnat => vec![
                BucketRule::new("deposit", "Deposit required", 2, None),
                BucketRule::new("verify", "Verify citation", 1, None),
                BucketRule::new("shared", "Action Not Required", 0, None),
            ],
            ReportKind::Generic => {
                let mut buckets = vec![
                    BucketRule::new("action-required", "Action Required", 2, None),
                    BucketRule::new("verify", "Verify citation", 1, None),
                ];
                if object_kind == ObjectKind::Materials {
                    buckets.push(BucketRule::new(
                        "commercial",
                        "Cite catalog number or RRID",
                        3,
                        None,
                    ));
                }
                buckets.push(BucketRule::new("no-action", "Action Not Required", 0, None));
                buckets
            }
            ReportKind::Universal => vec![
                BucketRule::new("action-required", "Action Required", 2, None),
                BucketRule::new("add-identifier", "Add persistent identifier", 3, None),
                BucketRule::new("verify", "Verify citation", 1, None),
                BucketRule::new("no-action", "Action Not Required", 0, None),
            ],
        };
        Self { buckets }
    }

    pub fn bucket(&self, id: &str) -> Option<&BucketRule> {
        self.buckets.iter().find(|bucket| bucket.id == id)
    }

    fn classify(&self, key: u32, record: &DataObjectRecord) -> Option<usize> {
        self.buckets
            .iter()
            .position(|bucket| bucket.matches(key, record))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "key", rename_all = "kebab-case")]
pub enum UnclassifiedReason {
    MissingRule,
    MalformedKey,
    UnknownKey(u32),
}

#[derive(Debug, Clone, Serialize)]
pub struct Bucket<'a> {
    pub rule: BucketRule,
    pub records: Vec<&'a DataObjectRecord>,
}

impl Bucket<'_> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Unclassified<'a> {
    pub record: &'a DataObjectRecord,
    #[serde(flatten)]
    pub reason: UnclassifiedReason,
}

/// Disjoint, ordered split of one record field.
#[derive(Debug, Clone, Serialize)]
pub struct Partition<'a> {
    pub object_kind: ObjectKind,
    pub buckets: Vec<Bucket<'a>>,
    pub unclassified: Vec<Unclassified<'a>>,
}

impl<'a> Partition<'a> {
    pub fn bucket(&self, id: &str) -> Option<&Bucket<'a>> {
        self.buckets.iter().find(|bucket| bucket.rule.id == id)
    }

    pub fn classified_len(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Bucket::is_empty)
    }
}

pub fn partition<'a>(
    kind: ReportKind,
    object_kind: ObjectKind,
    records: &'a [DataObjectRecord],
) -> Partition<'a> {
    partition_with(
        &RuleTable::builtin(kind, object_kind),
        kind,
        object_kind,
        records,
    )
}

/// Each record goes to the first bucket whose key (and reuse filter)
/// matches; records without a usable key are kept aside.
pub fn partition_with<'a>(
    table: &RuleTable,
    kind: ReportKind,
    object_kind: ObjectKind,
    records: &'a [DataObjectRecord],
) -> Partition<'a> {
    let mut buckets = table
        .buckets
        .iter()
        .map(|rule| Bucket {
            rule: rule.clone(),
            records: Vec::new(),
        })
        .collect::<Vec<_>>();
    let mut unclassified = Vec::new();

    for record in records {
        let outcome = match record.assigned_rule(kind) {
            None => Err(UnclassifiedReason::MissingRule),
            Some(_) => match record.rule_key(kind) {
                None => Err(UnclassifiedReason::MalformedKey),
                Some(key) => table
                    .classify(key, record)
                    .ok_or(UnclassifiedReason::UnknownKey(key)),
            },
        };
        match outcome {
            Ok(index) => buckets[index].records.push(record),
            Err(reason) => {
                warn!(
                    report = %kind,
                    field = %object_kind,
                    name = %record.name,
                    ?reason,
                    "record matches no bucket"
                );
                unclassified.push(Unclassified { record, reason });
            }
        }
    }

    Partition {
        object_kind,
        buckets,
        unclassified,
    }
}

pub fn partition_input(kind: ReportKind, input: &ReportInput) -> Vec<Partition<'_>> {
    ObjectKind::ALL
        .into_iter()
        .map(|object_kind| partition(kind, object_kind, input.records(object_kind)))
        .collect()
}
