use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::config::ResolvedConfig;
use crate::domain::{ObjectKind, ReportInput, ReportKind};
use crate::error::ReportError;
use crate::google::drive::get_report_file_id;
use crate::google::sheets::get_sheet_id;
use crate::google::{DriveClient, SheetsClient};
use crate::layout::{LayoutPlan, PlanContext, ReportLayout, plan_report};
use crate::rules::{BucketRule, Partition, RuleTable, partition_input};

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub name: Option<String>,
    pub overwrite: bool,
    pub dry_run: bool,
    pub report_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketSummary {
    pub id: String,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldSummary {
    pub field: ObjectKind,
    pub classified: usize,
    pub unclassified: usize,
    pub buckets: Vec<BucketSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyResult<'a> {
    pub kind: ReportKind,
    pub partitions: Vec<Partition<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub kind: ReportKind,
    pub name: String,
    /// `planned`, `created` or `replaced`.
    pub action: String,
    pub spreadsheet_id: Option<String>,
    pub url: Option<String>,
    pub fields: Vec<FieldSummary>,
    pub structural_requests: usize,
    pub value_ranges: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<LayoutPlan>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FindResult {
    pub name: String,
    pub file_id: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct KindRules {
    pub field: ObjectKind,
    pub buckets: Vec<BucketRule>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KindInfo {
    pub kind: ReportKind,
    pub rules_key: &'static str,
    pub label: &'static str,
    pub fields: Vec<KindRules>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn emit(sink: &dyn ProgressSink, message: String, elapsed: Option<Duration>) {
    info!("{message}");
    sink.event(ProgressEvent { message, elapsed });
}

pub fn summarize(partitions: &[Partition<'_>]) -> Vec<FieldSummary> {
    partitions
        .iter()
        .map(|partition| FieldSummary {
            field: partition.object_kind,
            classified: partition.classified_len(),
            unclassified: partition.unclassified.len(),
            buckets: partition
                .buckets
                .iter()
                .map(|bucket| BucketSummary {
                    id: bucket.rule.id.clone(),
                    label: bucket.rule.label.clone(),
                    count: bucket.len(),
                })
                .collect(),
        })
        .collect()
}

/// Built-in rule tables for every report kind.
pub fn kinds() -> Vec<KindInfo> {
    ReportKind::ALL
        .iter()
        .map(|kind| KindInfo {
            kind: *kind,
            rules_key: kind.rules_key(),
            label: kind.label(),
            fields: ObjectKind::ALL
                .iter()
                .map(|field| KindRules {
                    field: *field,
                    buckets: RuleTable::builtin(*kind, *field).buckets,
                })
                .collect(),
        })
        .collect()
}

pub fn classify(kind: ReportKind, input: &ReportInput) -> ClassifyResult<'_> {
    ClassifyResult {
        kind,
        partitions: partition_input(kind, input),
    }
}

/// Plans a report without touching any API; sheet ids follow template order.
pub fn plan_offline(
    kind: ReportKind,
    layout: &ReportLayout,
    input: &ReportInput,
    report_date: NaiveDate,
) -> Result<LayoutPlan, ReportError> {
    let partitions = partition_input(kind, input);
    let sheet_ids = (0..layout.sheets.len() as i64).collect::<Vec<_>>();
    let ctx = PlanContext {
        kind,
        document: &input.document,
        partitions: &partitions,
        report_date,
    };
    plan_report(layout, &sheet_ids, &ctx)
}

pub fn report_name(kind: ReportKind, input: &ReportInput, options: &BuildOptions) -> String {
    match &options.name {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => {
            let document = input.document.name.trim();
            if document.is_empty() {
                kind.label().to_string()
            } else {
                format!("{document} - {}", kind.label())
            }
        }
    }
}

pub fn spreadsheet_url(spreadsheet_id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{spreadsheet_id}/edit")
}

pub struct Reporter<S: SheetsClient, D: DriveClient> {
    config: ResolvedConfig,
    sheets: S,
    drive: D,
}

impl<S: SheetsClient, D: DriveClient> Reporter<S, D> {
    pub fn new(config: ResolvedConfig, sheets: S, drive: D) -> Self {
        Self {
            config,
            sheets,
            drive,
        }
    }

    pub fn clients(&self) -> (&S, &D) {
        (&self.sheets, &self.drive)
    }

    pub fn find(&self, name: &str) -> Result<FindResult, ReportError> {
        let folder_id = self.config.folder_id()?;
        let file_id = get_report_file_id(&self.drive, folder_id, name)?;
        Ok(FindResult {
            name: name.to_string(),
            url: spreadsheet_url(&file_id),
            file_id,
        })
    }

    /// Builds one report. Steps run strictly in sequence and the first failure
    /// aborts the build; a spreadsheet already copied is left as it is.
    pub fn build(
        &self,
        kind: ReportKind,
        input: &ReportInput,
        options: BuildOptions,
        sink: &dyn ProgressSink,
    ) -> Result<BuildResult, ReportError> {
        let template = self.config.template(kind)?;
        let layout = template.layout(kind)?;
        let name = report_name(kind, input, &options);
        let report_date = options
            .report_date
            .unwrap_or_else(|| chrono::Local::now().date_naive());

        emit(sink, format!("phase=Classify; {kind} report {name}"), None);
        let partitions = partition_input(kind, input);
        let fields = summarize(&partitions);
        let ctx = PlanContext {
            kind,
            document: &input.document,
            partitions: &partitions,
            report_date,
        };

        if options.dry_run {
            let sheet_ids = (0..layout.sheets.len() as i64).collect::<Vec<_>>();
            let plan = plan_report(&layout, &sheet_ids, &ctx)?;
            emit(sink, "phase=Plan; dry run, nothing submitted".to_string(), None);
            return Ok(BuildResult {
                kind,
                name,
                action: "planned".to_string(),
                spreadsheet_id: None,
                url: None,
                fields,
                structural_requests: plan.structural().len(),
                value_ranges: plan.values().len(),
                plan: Some(plan),
            });
        }

        let folder_id = self.config.folder_id()?;
        let start = Instant::now();
        emit(sink, format!("phase=Resolve; looking up {name}"), None);
        let existing = match get_report_file_id(&self.drive, folder_id, &name) {
            Ok(file_id) => Some(file_id),
            Err(ReportError::ReportNotFound(_)) => None,
            Err(err) => return Err(err),
        };
        let action = match existing {
            Some(file_id) if options.overwrite => {
                emit(sink, format!("phase=Resolve; deleting previous report {file_id}"), None);
                self.drive.delete_file(&file_id)?;
                "replaced"
            }
            Some(_) => return Err(ReportError::ReportExists(name)),
            None => "created",
        };

        emit(sink, "phase=Copy; copying template".to_string(), None);
        let copied = self.drive.copy_file(&template.file_id, &name, folder_id)?;
        if let Some(permission) = &self.config.share {
            emit(
                sink,
                format!("phase=Share; granting {} to {}", permission.role, permission.grantee_type),
                None,
            );
            self.drive.create_permission(&copied.id, permission)?;
        }

        let properties = self.sheets.sheet_properties(&copied.id)?;
        let sheet_ids = layout
            .sheets
            .iter()
            .map(|sheet| get_sheet_id(&properties, &sheet.sheet))
            .collect::<Result<Vec<_>, _>>()?;

        emit(sink, "phase=Plan; laying out rows".to_string(), None);
        let plan = plan_report(&layout, &sheet_ids, &ctx)?;
        let structural = plan.structural();
        let values = plan.values();
        let finalize = plan.finalize();

        if !structural.is_empty() {
            emit(
                sink,
                format!("phase=Rows; {} structural requests", structural.len()),
                None,
            );
            self.sheets.batch_update(&copied.id, &structural)?;
        }
        if !values.is_empty() {
            emit(sink, format!("phase=Values; {} ranges", values.len()), None);
            self.sheets.values_batch_update(&copied.id, &values)?;
        }
        if !finalize.is_empty() {
            emit(sink, "phase=Finalize; renaming sheets".to_string(), None);
            self.sheets.batch_update(&copied.id, &finalize)?;
        }
        emit(
            sink,
            format!("phase=Done; report {}", copied.id),
            Some(start.elapsed()),
        );

        Ok(BuildResult {
            kind,
            name,
            action: action.to_string(),
            url: Some(spreadsheet_url(&copied.id)),
            spreadsheet_id: Some(copied.id),
            fields,
            structural_requests: structural.len(),
            value_ranges: values.len(),
            plan: None,
        })
    }
}
