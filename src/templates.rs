//! Built-in sheet layouts for each report kind.
//!
//! Every kind shares one section shape per object kind; kinds differ in which
//! sheets exist, which fields each sheet carries and which buckets the rule
//! table defines. Custom layouts can be supplied as JSON instead (see
//! [`ReportLayout::load`]).

use crate::domain::{ObjectKind, ReportKind};
use crate::layout::{
    BucketTemplate, CellSource, ColumnMap, ColumnSpan, DocumentField, HeadCell, HeadValue,
    ReportLayout, RowRange, RowSpan, SectionTemplate, SheetTemplate, ValidationColumn,
};
use crate::rules::RuleTable;

const SECTION_FIRST_ROW: u32 = 3;
const HEADER_ROWS: u32 = 2;
const BUCKET_ROWS: u32 = 3;
const STATUS_VALUES: [&str; 3] = ["Open", "Resolved", "Not applicable"];

pub fn builtin_layout(kind: ReportKind) -> ReportLayout {
    let mut sheets = vec![summary_sheet(kind)];
    for (title, fields) in data_sheets(kind) {
        sheets.push(data_sheet(kind, title, fields));
    }
    ReportLayout { sheets }
}

const DATASETS: &[ObjectKind] = &[ObjectKind::Datasets];
const CODE_AND_SOFTWARE: &[ObjectKind] = &[ObjectKind::Code, ObjectKind::Software];
const MATERIALS: &[ObjectKind] = &[ObjectKind::Materials];
const PROTOCOLS: &[ObjectKind] = &[ObjectKind::Protocols];
const MATERIALS_AND_PROTOCOLS: &[ObjectKind] = &[ObjectKind::Materials, ObjectKind::Protocols];
const DATA_AND_CODE: &[ObjectKind] =
    &[ObjectKind::Datasets, ObjectKind::Code, ObjectKind::Software];
const EVERYTHING: &[ObjectKind] = &ObjectKind::ALL;

fn data_sheets(kind: ReportKind) -> Vec<(&'static str, &'static [ObjectKind])> {
    match kind {
        ReportKind::Asap | ReportKind::AsapPpmi | ReportKind::AsapGp2 => vec![
            ("Datasets", DATASETS),
            ("Code & Software", CODE_AND_SOFTWARE),
            ("Lab Materials", MATERIALS),
            ("Protocols", PROTOCOLS),
        ],
        ReportKind::Hhmi | ReportKind::Generic => vec![("Data Objects", EVERYTHING)],
        ReportKind::Amnat => vec![("Data & Code", DATA_AND_CODE)],
        ReportKind::Universal => vec![
            ("Datasets", DATASETS),
            ("Code & Software", CODE_AND_SOFTWARE),
            ("Materials & Protocols", MATERIALS_AND_PROTOCOLS),
        ],
    }
}

fn summary_sheet(kind: ReportKind) -> SheetTemplate {
    let document = [
        DocumentField::Name,
        DocumentField::Title,
        DocumentField::Doi,
        DocumentField::Journal,
        DocumentField::Submitted,
    ];
    let mut head_cells = document
        .into_iter()
        .zip(2u32..)
        .map(|(field, row)| head("B", row, HeadValue::Document { field }))
        .collect::<Vec<_>>();
    head_cells.push(head("B", 7, HeadValue::ReportDate));
    head_cells.push(head("B", 8, HeadValue::ReportKind));

    let mut row = 10;
    for (_, fields) in data_sheets(kind) {
        for field in fields {
            head_cells.push(head("B", row, HeadValue::FieldCount { field: *field }));
            row += 1;
        }
    }
    head_cells.push(head("B", row + 1, HeadValue::UnclassifiedCount));

    SheetTemplate {
        sheet: "Summary".to_string(),
        rename_to: Some(format!("{} Summary", kind.rules_key())),
        head_cells,
        sections: Vec::new(),
    }
}

fn data_sheet(kind: ReportKind, title: &str, fields: &[ObjectKind]) -> SheetTemplate {
    let mut head_cells = vec![
        head(
            "A",
            1,
            HeadValue::Literal {
                value: format!("{} - {title}", kind.label()),
            },
        ),
        head("B", 2, HeadValue::Document { field: DocumentField::Name }),
    ];
    let mut sections = Vec::new();
    let mut row = SECTION_FIRST_ROW;

    for field in fields {
        let header = RowSpan {
            first: row,
            last: row + HEADER_ROWS - 1,
        };
        head_cells.push(head(
            "A",
            header.first,
            HeadValue::Literal {
                value: section_title(*field).to_string(),
            },
        ));
        row = header.last + 1;

        let table = RuleTable::builtin(kind, *field);
        let mut buckets = Vec::new();
        for rule in &table.buckets {
            let rows = RowRange {
                min: row,
                max: row + BUCKET_ROWS - 1,
                insert: row + 1,
            };
            head_cells.push(head(
                "A",
                rows.min,
                HeadValue::Literal {
                    value: rule.label.clone(),
                },
            ));
            head_cells.push(head(
                "C",
                rows.min,
                HeadValue::BucketCount {
                    field: *field,
                    bucket: rule.id.clone(),
                },
            ));
            buckets.push(BucketTemplate {
                id: rule.id.clone(),
                rows,
            });
            row = rows.max + 1;
        }

        let (columns, last_column, status_column) = section_columns(*field);
        sections.push(SectionTemplate {
            field: *field,
            header,
            buckets,
            columns,
            border: Some(ColumnSpan {
                from: "A".to_string(),
                to: last_column.to_string(),
            }),
            validations: vec![ValidationColumn {
                column: status_column.to_string(),
                values: STATUS_VALUES.iter().map(|value| value.to_string()).collect(),
            }],
        });
        // blank spacer row between sections
        row += 1;
    }

    SheetTemplate {
        sheet: title.to_string(),
        rename_to: None,
        head_cells,
        sections,
    }
}

fn section_title(field: ObjectKind) -> &'static str {
    match field {
        ObjectKind::Datasets => "Datasets",
        ObjectKind::Code => "Code",
        ObjectKind::Software => "Software",
        ObjectKind::Materials => "Lab Materials",
        ObjectKind::Protocols => "Protocols",
    }
}

/// Column map, last bordered column and status column of a section.
fn section_columns(field: ObjectKind) -> (Vec<ColumnMap>, &'static str, &'static str) {
    match field {
        ObjectKind::Datasets => (
            vec![
                column("A", CellSource::Index),
                column("B", CellSource::Name),
                column("C", CellSource::Link),
                column("D", CellSource::TypeLink),
                column("E", CellSource::Reuse),
                merged("F", "H", CellSource::Sentences),
                column("I", CellSource::Comments),
                column("J", CellSource::Issue),
            ],
            "K",
            "K",
        ),
        ObjectKind::Code | ObjectKind::Software => (
            vec![
                column("A", CellSource::Index),
                column("B", CellSource::Name),
                column("C", CellSource::Link),
                column("D", CellSource::Reuse),
                merged("E", "G", CellSource::Sentences),
                column("H", CellSource::Comments),
                column("I", CellSource::Issue),
            ],
            "J",
            "J",
        ),
        ObjectKind::Materials => (
            vec![
                column("A", CellSource::Index),
                column("B", CellSource::Name),
                column("C", CellSource::Link),
                column("D", CellSource::Type),
                merged("E", "G", CellSource::Sentences),
                column("H", CellSource::Comments),
                column("I", CellSource::Issue),
            ],
            "J",
            "J",
        ),
        ObjectKind::Protocols => (
            vec![
                column("A", CellSource::Index),
                column("B", CellSource::Name),
                column("C", CellSource::Link),
                merged("D", "F", CellSource::Sentences),
                column("G", CellSource::Comments),
                column("H", CellSource::Issue),
            ],
            "I",
            "I",
        ),
    }
}

fn head(column: &str, row: u32, value: HeadValue) -> HeadCell {
    HeadCell {
        column: column.to_string(),
        row,
        value,
    }
}

fn column(column: &str, source: CellSource) -> ColumnMap {
    ColumnMap {
        column: column.to_string(),
        source,
        merge_to: None,
    }
}

fn merged(column: &str, to: &str, source: CellSource) -> ColumnMap {
    ColumnMap {
        column: column.to_string(),
        source,
        merge_to: Some(to.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_layouts_validate() {
        for kind in ReportKind::ALL {
            let layout = builtin_layout(kind);
            layout.validate().unwrap();
            assert_eq!(layout.sheets[0].sheet, "Summary");
        }
    }

    #[test]
    fn hhmi_sections_stack() {
        let layout = builtin_layout(ReportKind::Hhmi);
        let sheet = &layout.sheets[1];
        assert_eq!(sheet.sections.len(), 5);
        let datasets = &sheet.sections[0];
        assert_eq!(datasets.header, RowSpan { first: 3, last: 4 });
        assert_eq!(
            datasets.buckets[0].rows,
            RowRange {
                min: 5,
                max: 7,
                insert: 6
            }
        );
        assert_eq!(sheet.sections[1].header.first, 12);
    }

    #[test]
    fn json_layout_roundtrip() {
        let layout = builtin_layout(ReportKind::Amnat);
        let json = serde_json::to_string(&layout).unwrap();
        let parsed = ReportLayout::from_json(&json).unwrap();
        assert_eq!(parsed, layout);
    }
}
