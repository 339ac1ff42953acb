use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ReportError;

static RULE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("rule key pattern"));

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    Asap,
    AsapPpmi,
    AsapGp2,
    Hhmi,
    Amnat,
    Generic,
    Universal,
}

impl ReportKind {
    pub const ALL: [ReportKind; 7] = [
        ReportKind::Asap,
        ReportKind::AsapPpmi,
        ReportKind::AsapGp2,
        ReportKind::Hhmi,
        ReportKind::Amnat,
        ReportKind::Generic,
        ReportKind::Universal,
    ];

    /// Key under which the extraction system stores this kind's rule in
    /// `record.rules`.
    pub fn rules_key(&self) -> &'static str {
        match self {
            ReportKind::Asap => "ASAP",
            ReportKind::AsapPpmi => "ASAP-PPMI",
            ReportKind::AsapGp2 => "ASAP-GP2",
            ReportKind::Hhmi => "HHMI",
            ReportKind::Amnat => "AmNat",
            ReportKind::Generic => "Generic",
            ReportKind::Universal => "Universal",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportKind::Asap => "ASAP Report",
            ReportKind::AsapPpmi => "ASAP-PPMI Report",
            ReportKind::AsapGp2 => "ASAP-GP2 Report",
            ReportKind::Hhmi => "HHMI Report",
            ReportKind::Amnat => "AmNat Report",
            ReportKind::Generic => "DataSeer Generic Report",
            ReportKind::Universal => "Universal Journal Report",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Asap => write!(f, "asap"),
            ReportKind::AsapPpmi => write!(f, "asap-ppmi"),
            ReportKind::AsapGp2 => write!(f, "asap-gp2"),
            ReportKind::Hhmi => write!(f, "hhmi"),
            ReportKind::Amnat => write!(f, "amnat"),
            ReportKind::Generic => write!(f, "generic"),
            ReportKind::Universal => write!(f, "universal"),
        }
    }
}

impl FromStr for ReportKind {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        ReportKind::ALL
            .into_iter()
            .find(|kind| {
                kind.to_string() == normalized || kind.rules_key().to_lowercase() == normalized
            })
            .ok_or_else(|| ReportError::InvalidReportKind(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Datasets,
    Code,
    Software,
    Materials,
    Protocols,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 5] = [
        ObjectKind::Datasets,
        ObjectKind::Code,
        ObjectKind::Software,
        ObjectKind::Materials,
        ObjectKind::Protocols,
    ];

    /// Best identifier for a record of this kind, skipping blank fields.
    pub fn identifier<'a>(&self, record: &'a DataObjectRecord) -> Option<&'a str> {
        let order: [&Option<String>; 4] = match self {
            ObjectKind::Datasets => [&record.pid, &record.doi, &record.url, &record.rrid],
            ObjectKind::Code | ObjectKind::Software => {
                [&record.url, &record.doi, &record.rrid, &record.pid]
            }
            ObjectKind::Materials => [&record.rrid, &record.url, &record.doi, &record.pid],
            ObjectKind::Protocols => [&record.doi, &record.url, &record.pid, &record.rrid],
        };
        order
            .into_iter()
            .filter_map(|value| value.as_deref())
            .map(str::trim)
            .find(|value| !value.is_empty())
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Datasets => write!(f, "datasets"),
            ObjectKind::Code => write!(f, "code"),
            ObjectKind::Software => write!(f, "software"),
            ObjectKind::Materials => write!(f, "materials"),
            ObjectKind::Protocols => write!(f, "protocols"),
        }
    }
}

impl FromStr for ObjectKind {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "datasets" | "dataset" => Ok(ObjectKind::Datasets),
            "code" => Ok(ObjectKind::Code),
            "software" => Ok(ObjectKind::Software),
            "materials" | "material" | "reagents" => Ok(ObjectKind::Materials),
            "protocols" | "protocol" => Ok(ObjectKind::Protocols),
            _ => Err(ReportError::InvalidObjectKind(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedRule {
    pub rule: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sentence {
    Text(String),
    Span { text: String },
}

impl Sentence {
    pub fn text(&self) -> &str {
        match self {
            Sentence::Text(text) => text,
            Sentence::Span { text } => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum ObjectTypeRepr {
    Label(String),
    Detailed {
        label: String,
        #[serde(default)]
        url: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ObjectTypeRepr")]
pub struct ObjectType {
    pub label: String,
    pub url: Option<String>,
}

impl From<ObjectTypeRepr> for ObjectType {
    fn from(repr: ObjectTypeRepr) -> Self {
        match repr {
            ObjectTypeRepr::Label(label) => ObjectType { label, url: None },
            ObjectTypeRepr::Detailed { label, url } => ObjectType { label, url },
        }
    }
}

/// One extracted data-sharing claim from a manuscript.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataObjectRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "URL", alias = "url")]
    pub url: Option<String>,
    #[serde(default, rename = "DOI", alias = "doi")]
    pub doi: Option<String>,
    #[serde(default, rename = "PID", alias = "pid")]
    pub pid: Option<String>,
    #[serde(default, rename = "RRID", alias = "rrid")]
    pub rrid: Option<String>,
    #[serde(default)]
    pub reuse: bool,
    #[serde(default, alias = "issues")]
    pub issue: bool,
    #[serde(default, alias = "notes")]
    pub comments: Option<String>,
    #[serde(default)]
    pub sentences: Vec<Sentence>,
    #[serde(default, rename = "type")]
    pub object_type: Option<ObjectType>,
    #[serde(default)]
    pub rules: BTreeMap<String, AssignedRule>,
}

impl DataObjectRecord {
    pub fn assigned_rule(&self, kind: ReportKind) -> Option<&str> {
        self.rules
            .get(kind.rules_key())
            .map(|assigned| assigned.rule.as_str())
    }

    pub fn rule_key(&self, kind: ReportKind) -> Option<u32> {
        self.assigned_rule(kind).and_then(rule_key)
    }

    /// Assigned rule with the trailing `[n]` stripped. `None` whenever
    /// [`rule_key`] finds no key.
    pub fn rule_label(&self, kind: ReportKind) -> Option<&str> {
        let rule = self.assigned_rule(kind)?;
        rule_key(rule)?;
        let found = RULE_KEY_RE.find(rule)?;
        Some(rule[..found.start()].trim_end())
    }

    pub fn sentences_text(&self) -> String {
        self.sentences
            .iter()
            .map(Sentence::text)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Extracts the numeric key from a rule string shaped like `"Verify citation[2]"`.
///
/// The string must carry exactly one bracketed integer and it must be the
/// suffix; anything else has no key.
pub fn rule_key(rule: &str) -> Option<u32> {
    let trimmed = rule.trim_end();
    let mut matches = RULE_KEY_RE.captures_iter(trimmed);
    let captures = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    let whole = captures.get(0)?;
    if whole.end() != trimmed.len() {
        return None;
    }
    captures.get(1)?.as_str().parse().ok()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "DOI")]
    pub doi: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    /// ISO date (`YYYY-MM-DD`) the manuscript was submitted.
    #[serde(default)]
    pub submitted: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportInput {
    #[serde(default)]
    pub document: DocumentInfo,
    #[serde(default)]
    pub datasets: Vec<DataObjectRecord>,
    #[serde(default)]
    pub code: Vec<DataObjectRecord>,
    #[serde(default)]
    pub software: Vec<DataObjectRecord>,
    #[serde(default, alias = "reagents")]
    pub materials: Vec<DataObjectRecord>,
    #[serde(default)]
    pub protocols: Vec<DataObjectRecord>,
}

impl ReportInput {
    pub fn records(&self, kind: ObjectKind) -> &[DataObjectRecord] {
        match kind {
            ObjectKind::Datasets => &self.datasets,
            ObjectKind::Code => &self.code,
            ObjectKind::Software => &self.software,
            ObjectKind::Materials => &self.materials,
            ObjectKind::Protocols => &self.protocols,
        }
    }

    pub fn from_json(content: &str) -> Result<Self, ReportError> {
        serde_json::from_str(content).map_err(|err| ReportError::InputParse(err.to_string()))
    }

    pub fn load(path: &camino::Utf8Path) -> Result<Self, ReportError> {
        let content = std::fs::read_to_string(path.as_std_path())
            .map_err(|_| ReportError::InputRead(path.as_std_path().to_path_buf()))?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn rule_key_suffix() {
        assert_eq!(rule_key("Verify citation[2]"), Some(2));
        assert_eq!(rule_key("Action Not Required[0] "), Some(0));
    }

    #[test]
    fn rule_key_rejects_malformed() {
        assert_eq!(rule_key("Verify citation"), None);
        assert_eq!(rule_key("Verify[1] citation[2]"), None);
        assert_eq!(rule_key("Verify citation[a]"), None);
        assert_eq!(rule_key("Verify citation[2] later"), None);
        assert_eq!(rule_key(""), None);
    }

    #[test]
    fn parse_report_kind() {
        assert_eq!("hhmi".parse::<ReportKind>().unwrap(), ReportKind::Hhmi);
        assert_eq!("ASAP-PPMI".parse::<ReportKind>().unwrap(), ReportKind::AsapPpmi);
        assert_eq!("AmNat".parse::<ReportKind>().unwrap(), ReportKind::Amnat);
        let err = "nature".parse::<ReportKind>().unwrap_err();
        assert_matches!(err, ReportError::InvalidReportKind(_));
    }

    #[test]
    fn rule_label_strips_key() {
        let mut record = DataObjectRecord::default();
        record.rules.insert(
            "HHMI".to_string(),
            AssignedRule {
                rule: "Verify citation[2]".to_string(),
            },
        );
        assert_eq!(record.rule_label(ReportKind::Hhmi), Some("Verify citation"));
        assert_eq!(record.rule_key(ReportKind::Hhmi), Some(2));
        assert_eq!(record.rule_key(ReportKind::Asap), None);
    }

    #[test]
    fn rule_label_needs_a_key() {
        let mut record = DataObjectRecord::default();
        for rule in ["Verify[1] citation[2]", "Verify citation[2] later", "Verify citation"] {
            record.rules.insert(
                "HHMI".to_string(),
                AssignedRule {
                    rule: rule.to_string(),
                },
            );
            assert_eq!(record.rule_key(ReportKind::Hhmi), None, "{rule}");
            assert_eq!(record.rule_label(ReportKind::Hhmi), None, "{rule}");
        }
    }
}
