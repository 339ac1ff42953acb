//! Row-block layout planning.
//!
//! A [`SheetTemplate`] describes the pristine template sheet: for each
//! section a header span and one row block per bucket. Planning folds over
//! sections and buckets top to bottom, tracking how far every later row has
//! moved, and yields two batches: structural requests (row insertions and
//! deletions issued bottom-up in pristine coordinates, then merges, borders
//! and validation in final coordinates) and cell values in final
//! coordinates.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::a1::{self, formula_string};
use crate::domain::{DataObjectRecord, DocumentInfo, ObjectKind, ReportKind};
use crate::error::ReportError;
use crate::requests::{self, BorderStyle, GridRange, Request, ValueRange};
use crate::rules::Partition;

/// A bucket's rows in the pristine template. `insert` is the "no data"
/// placeholder row that records replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    pub min: u32,
    pub max: u32,
    pub insert: u32,
}

impl RowRange {
    pub fn span(&self) -> u32 {
        self.max - self.min + 1
    }

    fn shifted(&self, offset: i64) -> Option<RowRange> {
        Some(RowRange {
            min: shift(self.min, offset)?,
            max: shift(self.max, offset)?,
            insert: shift(self.insert, offset)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSpan {
    pub first: u32,
    pub last: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellSource {
    /// 1-based position of the record inside its bucket.
    Index,
    Name,
    Identifier,
    /// Identifier written as a `HYPERLINK` formula when it resolves to a URL.
    Link,
    Reuse,
    Issue,
    Comments,
    Sentences,
    Type,
    TypeLink,
    RuleLabel,
    BucketLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentField {
    Name,
    Title,
    Doi,
    Journal,
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HeadValue {
    Literal { value: String },
    Document { field: DocumentField },
    ReportKind,
    ReportDate,
    BucketCount { field: ObjectKind, bucket: String },
    FieldCount { field: ObjectKind },
    UnclassifiedCount,
}

/// A fixed cell written once per report, at its pristine position moved by
/// whatever row blocks precede it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadCell {
    pub column: String,
    pub row: u32,
    pub value: HeadValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub column: String,
    pub source: CellSource,
    /// Last column of a merged cell starting at `column`.
    #[serde(default)]
    pub merge_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpan {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationColumn {
    pub column: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTemplate {
    pub id: String,
    pub rows: RowRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTemplate {
    pub field: ObjectKind,
    pub header: RowSpan,
    pub buckets: Vec<BucketTemplate>,
    pub columns: Vec<ColumnMap>,
    #[serde(default)]
    pub border: Option<ColumnSpan>,
    #[serde(default)]
    pub validations: Vec<ValidationColumn>,
}

impl SectionTemplate {
    fn last_row(&self) -> u32 {
        self.buckets
            .iter()
            .map(|bucket| bucket.rows.max)
            .max()
            .unwrap_or(self.header.last)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetTemplate {
    /// Sheet title in the template file.
    pub sheet: String,
    /// Title given to the sheet once the report is filled.
    #[serde(default)]
    pub rename_to: Option<String>,
    #[serde(default)]
    pub head_cells: Vec<HeadCell>,
    #[serde(default)]
    pub sections: Vec<SectionTemplate>,
}

impl SheetTemplate {
    /// Checks the ordering the offset fold relies on: sections and bucket
    /// blocks ascend without overlapping, and every placeholder lies in its
    /// block.
    pub fn validate(&self) -> Result<(), ReportError> {
        let mut floor = 0u32;
        for (index, section) in self.sections.iter().enumerate() {
            if self.sections[..index].iter().any(|s| s.field == section.field) {
                return Err(self.invalid(format!("{} laid out twice", section.field)));
            }
            let header = section.header;
            if header.first == 0 || header.last < header.first || header.first <= floor {
                return Err(self.invalid(format!(
                    "{} header {}..={}",
                    section.field, header.first, header.last
                )));
            }
            if section.buckets.is_empty() {
                return Err(self.invalid(format!("{} has no buckets", section.field)));
            }
            floor = header.last;
            for bucket in &section.buckets {
                let rows = bucket.rows;
                let ordered = rows.min <= rows.insert && rows.insert <= rows.max;
                if !ordered || rows.min <= floor {
                    return Err(self.invalid(format!(
                        "{} bucket {} rows {}..={} insert {}",
                        section.field, bucket.id, rows.min, rows.max, rows.insert
                    )));
                }
                floor = rows.max;
            }
            if section.columns.is_empty() {
                return Err(self.invalid(format!("{} has no columns", section.field)));
            }
        }
        Ok(())
    }

    fn invalid(&self, detail: String) -> ReportError {
        ReportError::Layout(format!("sheet {}: {detail}", self.sheet))
    }
}

/// Every sheet the report fills, in template order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLayout {
    pub sheets: Vec<SheetTemplate>,
}

impl ReportLayout {
    pub fn from_json(content: &str) -> Result<Self, ReportError> {
        let layout: ReportLayout = serde_json::from_str(content)
            .map_err(|err| ReportError::LayoutParse(err.to_string()))?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn load(path: &camino::Utf8Path) -> Result<Self, ReportError> {
        let content = std::fs::read_to_string(path.as_std_path())
            .map_err(|err| ReportError::Filesystem(format!("read layout {path}: {err}")))?;
        Self::from_json(&content)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if self.sheets.is_empty() {
            return Err(ReportError::Layout("layout has no sheets".to_string()));
        }
        self.sheets.iter().try_for_each(SheetTemplate::validate)
    }
}

/// Inputs shared by every sheet of one report.
pub struct PlanContext<'a, 'r> {
    pub kind: ReportKind,
    pub document: &'a DocumentInfo,
    pub partitions: &'a [Partition<'r>],
    pub report_date: NaiveDate,
}

impl<'r> PlanContext<'_, 'r> {
    fn partition(&self, field: ObjectKind) -> Option<&Partition<'r>> {
        self.partitions
            .iter()
            .find(|partition| partition.object_kind == field)
    }

    fn bucket_len(&self, field: ObjectKind, bucket: &str) -> usize {
        self.partition(field)
            .and_then(|partition| partition.bucket(bucket))
            .map(|bucket| bucket.len())
            .unwrap_or(0)
    }
}

/// What happened to one pristine row block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RowEvent {
    /// `count` rows replace the placeholder row at `insert`.
    Filled { insert: u32, count: u32 },
    /// Rows `first..=last` are removed.
    Dropped { first: u32, last: u32 },
}

impl RowEvent {
    fn first(&self) -> u32 {
        match self {
            RowEvent::Filled { insert, .. } => *insert,
            RowEvent::Dropped { first, .. } => *first,
        }
    }

    fn last(&self) -> u32 {
        match self {
            RowEvent::Filled { insert, .. } => *insert,
            RowEvent::Dropped { last, .. } => *last,
        }
    }

    fn delta(&self) -> i64 {
        match self {
            RowEvent::Filled { count, .. } => *count as i64 - 1,
            RowEvent::Dropped { first, last } => -((*last - *first + 1) as i64),
        }
    }

    fn requests(&self, sheet_id: i64) -> Result<Vec<Request>, ReportError> {
        match *self {
            RowEvent::Filled { insert, count } => Ok(vec![
                requests::insert_rows(sheet_id, insert, count)?,
                requests::delete_rows(sheet_id, insert + count, 1)?,
            ]),
            RowEvent::Dropped { first, last } => {
                Ok(vec![requests::delete_rows(sheet_id, first, last - first + 1)?])
            }
        }
    }
}

/// Ascending, non-overlapping row events of one sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowShifts {
    events: Vec<RowEvent>,
}

impl RowShifts {
    pub fn events(&self) -> &[RowEvent] {
        &self.events
    }

    /// Net movement of a pristine row from every event strictly above it.
    pub fn offset_before(&self, row: u32) -> i64 {
        self.events
            .iter()
            .take_while(|event| event.last() < row)
            .map(RowEvent::delta)
            .sum()
    }

    /// Final position of a pristine row, or `None` when the row is deleted
    /// or replaced by records.
    pub fn map_row(&self, row: u32) -> Option<u32> {
        let inside = self
            .events
            .iter()
            .any(|event| event.first() <= row && row <= event.last());
        if inside {
            return None;
        }
        shift(row, self.offset_before(row))
    }
}

/// A bucket block after the fold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub field: ObjectKind,
    pub bucket: String,
    pub count: usize,
    /// Template rows moved by every preceding block.
    pub rows: RowRange,
    pub dropped: bool,
}

impl Placement {
    /// Rows holding records, if any.
    pub fn record_rows(&self) -> Option<(u32, u32)> {
        if self.dropped || self.count == 0 {
            return None;
        }
        Some((self.rows.insert, self.rows.insert + self.count as u32 - 1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetPlan {
    pub sheet: String,
    pub sheet_id: i64,
    pub shifts: RowShifts,
    pub placements: Vec<Placement>,
    pub structural: Vec<Request>,
    pub values: Vec<ValueRange>,
    pub finalize: Vec<Request>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutPlan {
    pub sheets: Vec<SheetPlan>,
}

impl LayoutPlan {
    pub fn structural(&self) -> Vec<Request> {
        self.sheets
            .iter()
            .flat_map(|sheet| sheet.structural.iter().cloned())
            .collect()
    }

    pub fn values(&self) -> Vec<ValueRange> {
        self.sheets
            .iter()
            .flat_map(|sheet| sheet.values.iter().cloned())
            .collect()
    }

    pub fn finalize(&self) -> Vec<Request> {
        self.sheets
            .iter()
            .flat_map(|sheet| sheet.finalize.iter().cloned())
            .collect()
    }
}

/// Plans every sheet of `layout`; `sheet_ids` lines up with `layout.sheets`.
pub fn plan_report(
    layout: &ReportLayout,
    sheet_ids: &[i64],
    ctx: &PlanContext<'_, '_>,
) -> Result<LayoutPlan, ReportError> {
    if sheet_ids.len() != layout.sheets.len() {
        return Err(ReportError::Layout(format!(
            "{} sheet ids for {} sheets",
            sheet_ids.len(),
            layout.sheets.len()
        )));
    }
    let sheets = layout
        .sheets
        .iter()
        .zip(sheet_ids)
        .map(|(sheet, sheet_id)| plan_sheet(sheet, *sheet_id, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(LayoutPlan { sheets })
}

pub fn plan_sheet(
    template: &SheetTemplate,
    sheet_id: i64,
    ctx: &PlanContext<'_, '_>,
) -> Result<SheetPlan, ReportError> {
    template.validate()?;
    check_buckets(template, ctx)?;

    let mut events = Vec::new();
    let mut placements = Vec::new();
    let mut offset: i64 = 0;

    for section in &template.sections {
        let counts = section
            .buckets
            .iter()
            .map(|bucket| ctx.bucket_len(section.field, &bucket.id))
            .collect::<Vec<_>>();

        if counts.iter().all(|count| *count == 0) {
            let event = RowEvent::Dropped {
                first: section.header.first,
                last: section.last_row(),
            };
            for bucket in &section.buckets {
                placements.push(placement(section, bucket, 0, offset, true)?);
            }
            offset += event.delta();
            events.push(event);
            continue;
        }

        for (bucket, count) in section.buckets.iter().zip(counts) {
            let event = if count > 0 {
                RowEvent::Filled {
                    insert: bucket.rows.insert,
                    count: count as u32,
                }
            } else {
                RowEvent::Dropped {
                    first: bucket.rows.min,
                    last: bucket.rows.max,
                }
            };
            placements.push(placement(section, bucket, count, offset, count == 0)?);
            offset += event.delta();
            events.push(event);
        }
    }

    let shifts = RowShifts { events };

    let mut structural = Vec::new();
    for event in shifts.events.iter().rev() {
        structural.extend(event.requests(sheet_id)?);
    }
    for section in &template.sections {
        for placed in placements.iter().filter(|p| p.field == section.field) {
            if let Some(rows) = placed.record_rows() {
                structural.extend(block_formatting(section, sheet_id, rows)?);
            }
        }
    }

    let mut values = Vec::new();
    for section in &template.sections {
        for placed in placements.iter().filter(|p| p.field == section.field) {
            if let Some((first, _)) = placed.record_rows() {
                values.extend(block_values(template, section, placed, first, ctx)?);
            }
        }
    }
    for head in &template.head_cells {
        let Some(row) = shifts.map_row(head.row) else {
            continue;
        };
        let value = head_value(&head.value, ctx);
        values.push(requests::update_cells(
            &a1::cell(&template.sheet, &head.column, row),
            vec![vec![value]],
        )?);
    }

    let finalize = match &template.rename_to {
        Some(title) if title != &template.sheet => vec![requests::rename_sheet(sheet_id, title)?],
        _ => Vec::new(),
    };

    Ok(SheetPlan {
        sheet: template.sheet.clone(),
        sheet_id,
        shifts,
        placements,
        structural,
        values,
        finalize,
    })
}

fn placement(
    section: &SectionTemplate,
    bucket: &BucketTemplate,
    count: usize,
    offset: i64,
    dropped: bool,
) -> Result<Placement, ReportError> {
    let rows = bucket.rows.shifted(offset).ok_or_else(|| {
        ReportError::Layout(format!(
            "bucket {} of {} shifted above row 1",
            bucket.id, section.field
        ))
    })?;
    Ok(Placement {
        field: section.field,
        bucket: bucket.id.clone(),
        count,
        rows,
        dropped,
    })
}

/// Every non-empty bucket of a laid-out field needs rows in the template,
/// and every template bucket must exist in the rule table.
fn check_buckets(template: &SheetTemplate, ctx: &PlanContext<'_, '_>) -> Result<(), ReportError> {
    for section in &template.sections {
        let Some(partition) = ctx.partition(section.field) else {
            continue;
        };
        for bucket in &section.buckets {
            if partition.bucket(&bucket.id).is_none() {
                return Err(ReportError::Layout(format!(
                    "sheet {}: bucket {} is not a {} {} bucket",
                    template.sheet,
                    bucket.id,
                    ctx.kind,
                    section.field
                )));
            }
        }
        for bucket in &partition.buckets {
            let placed = section.buckets.iter().any(|b| b.id == bucket.rule.id);
            if !placed && !bucket.is_empty() {
                return Err(ReportError::Layout(format!(
                    "sheet {}: {} records in {} bucket {} have no rows",
                    template.sheet,
                    bucket.len(),
                    section.field,
                    bucket.rule.id
                )));
            }
        }
    }
    Ok(())
}

fn block_formatting(
    section: &SectionTemplate,
    sheet_id: i64,
    rows: (u32, u32),
) -> Result<Vec<Request>, ReportError> {
    let mut out = Vec::new();
    for column in &section.columns {
        if let Some(to) = &column.merge_to {
            out.push(requests::merge_cells(GridRange::block(
                sheet_id,
                rows,
                (&column.column, to),
            )?)?);
        }
    }
    if let Some(border) = &section.border {
        out.push(requests::update_borders(
            GridRange::block(sheet_id, rows, (&border.from, &border.to))?,
            BorderStyle::Solid,
        )?);
    }
    for validation in &section.validations {
        let values = validation.values.iter().map(String::as_str).collect::<Vec<_>>();
        out.push(requests::data_validation_list(
            GridRange::block(sheet_id, rows, (&validation.column, &validation.column))?,
            &values,
        )?);
    }
    Ok(out)
}

fn block_values(
    template: &SheetTemplate,
    section: &SectionTemplate,
    placed: &Placement,
    first_row: u32,
    ctx: &PlanContext<'_, '_>,
) -> Result<Vec<ValueRange>, ReportError> {
    let Some(bucket) = ctx
        .partition(section.field)
        .and_then(|partition| partition.bucket(&placed.bucket))
    else {
        return Ok(Vec::new());
    };
    let last_row = first_row + bucket.len() as u32 - 1;
    section
        .columns
        .iter()
        .map(|column| {
            let values = bucket
                .records
                .iter()
                .enumerate()
                .map(|(index, record)| {
                    vec![cell_value(
                        column.source,
                        record,
                        index,
                        &bucket.rule.label,
                        section.field,
                        ctx.kind,
                    )]
                })
                .collect();
            requests::update_cells(
                &a1::range(
                    &template.sheet,
                    (&column.column, first_row),
                    (&column.column, last_row),
                ),
                values,
            )
        })
        .collect()
}

pub fn cell_value(
    source: CellSource,
    record: &DataObjectRecord,
    index: usize,
    bucket_label: &str,
    field: ObjectKind,
    kind: ReportKind,
) -> Value {
    let text = match source {
        CellSource::Index => return Value::from(index as u64 + 1),
        CellSource::Name => escape_literal(&record.name),
        CellSource::Identifier => escape_literal(field.identifier(record).unwrap_or_default()),
        CellSource::Link => match field.identifier(record) {
            Some(identifier) => match identifier_url(identifier) {
                Some(url) => hyperlink(&url, identifier),
                None => escape_literal(identifier),
            },
            None => String::new(),
        },
        CellSource::Reuse => yes_no(record.reuse).to_string(),
        CellSource::Issue => if record.issue { "Yes" } else { "" }.to_string(),
        CellSource::Comments => escape_literal(record.comments.as_deref().unwrap_or_default()),
        CellSource::Sentences => escape_literal(&record.sentences_text()),
        CellSource::Type => record
            .object_type
            .as_ref()
            .map(|object_type| escape_literal(&object_type.label))
            .unwrap_or_default(),
        CellSource::TypeLink => match &record.object_type {
            Some(object_type) => match &object_type.url {
                Some(url) if !url.trim().is_empty() => hyperlink(url, &object_type.label),
                _ => escape_literal(&object_type.label),
            },
            None => String::new(),
        },
        CellSource::RuleLabel => escape_literal(record.rule_label(kind).unwrap_or_default()),
        CellSource::BucketLabel => escape_literal(bucket_label),
    };
    Value::String(text)
}

fn head_value(value: &HeadValue, ctx: &PlanContext<'_, '_>) -> Value {
    let document = ctx.document;
    match value {
        HeadValue::Literal { value } => Value::String(value.clone()),
        HeadValue::Document { field } => Value::String(match field {
            DocumentField::Name => escape_literal(&document.name),
            DocumentField::Title => escape_literal(document.title.as_deref().unwrap_or_default()),
            DocumentField::Doi => match document.doi.as_deref().map(str::trim) {
                Some(doi) if !doi.is_empty() => identifier_url(doi)
                    .map(|url| hyperlink(&url, doi))
                    .unwrap_or_else(|| escape_literal(doi)),
                _ => String::new(),
            },
            DocumentField::Journal => {
                escape_literal(document.journal.as_deref().unwrap_or_default())
            }
            DocumentField::Submitted => match document.submitted.as_deref() {
                Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                    .map(|date| date_formula(&date))
                    .unwrap_or_else(|_| escape_literal(raw)),
                None => String::new(),
            },
        }),
        HeadValue::ReportKind => Value::String(ctx.kind.label().to_string()),
        HeadValue::ReportDate => Value::String(date_formula(&ctx.report_date)),
        HeadValue::BucketCount { field, bucket } => {
            Value::from(ctx.bucket_len(*field, bucket) as u64)
        }
        HeadValue::FieldCount { field } => Value::from(
            ctx.partition(*field)
                .map(|partition| partition.classified_len())
                .unwrap_or(0) as u64,
        ),
        HeadValue::UnclassifiedCount => Value::from(
            ctx.partitions
                .iter()
                .map(|partition| partition.unclassified.len())
                .sum::<usize>() as u64,
        ),
    }
}

/// Resolvable URL for an identifier: URLs as-is, DOIs via doi.org, RRIDs via
/// the SciCrunch resolver.
pub fn identifier_url(identifier: &str) -> Option<String> {
    let trimmed = identifier.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Some(trimmed.to_string());
    }
    let bare = trimmed
        .strip_prefix("doi:")
        .or_else(|| trimmed.strip_prefix("DOI:"))
        .unwrap_or(trimmed)
        .trim();
    if bare.starts_with("10.") && bare.contains('/') {
        return Some(format!("https://doi.org/{bare}"));
    }
    if trimmed.starts_with("RRID:") {
        return Some(format!("https://scicrunch.org/resolver/{trimmed}"));
    }
    None
}

/// Text written under `USER_ENTERED` that Sheets would read as a formula,
/// number, date or boolean gets a leading `'` so it lands verbatim.
pub fn escape_literal(text: &str) -> String {
    if parses_as_input(text) {
        format!("'{text}")
    } else {
        text.to_string()
    }
}

fn parses_as_input(text: &str) -> bool {
    if text.starts_with(['=', '+', '-', '@', '\'']) {
        return true;
    }
    if text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false") {
        return true;
    }
    let numeric = |c: char| {
        c.is_ascii_digit() || matches!(c, ' ' | '.' | ',' | '/' | ':' | '-' | '%' | '$')
    };
    text.chars().any(|c| c.is_ascii_digit()) && text.chars().all(numeric)
}

pub fn hyperlink(url: &str, label: &str) -> String {
    format!("=HYPERLINK({},{})", formula_string(url), formula_string(label))
}

pub fn date_formula(date: &NaiveDate) -> String {
    format!("=DATE({},{},{})", date.year(), date.month(), date.day())
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

fn shift(row: u32, offset: i64) -> Option<u32> {
    let moved = row as i64 + offset;
    (moved >= 1).then_some(moved as u32)
}
