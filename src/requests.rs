//! Request payloads for `spreadsheets.batchUpdate` and
//! `spreadsheets.values.batchUpdate`.
//!
//! Rows passed to the builders are 1-based and inclusive, the way they read
//! in the sheet; the payloads carry the API's 0-based half-open indices.

use serde::Serialize;
use serde_json::Value;

use crate::a1::column_index;
use crate::error::ReportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dimension {
    Rows,
    Columns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeType {
    MergeAll,
    MergeColumns,
    MergeRows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BorderStyle {
    Solid,
    SolidMedium,
    SolidThick,
    Dotted,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PasteType {
    PasteNormal,
    PasteValues,
    PasteFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionRange {
    pub sheet_id: i64,
    pub dimension: Dimension,
    pub start_index: u32,
    pub end_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    pub sheet_id: i64,
    pub start_row_index: u32,
    pub end_row_index: u32,
    pub start_column_index: u32,
    pub end_column_index: u32,
}

impl GridRange {
    /// Block spanning `rows` (1-based, inclusive) and `columns` (letters, inclusive).
    pub fn block(
        sheet_id: i64,
        rows: (u32, u32),
        columns: (&str, &str),
    ) -> Result<Self, ReportError> {
        let (first_row, last_row) = rows;
        if first_row == 0 || last_row < first_row {
            return Err(ReportError::InvalidRequest(format!(
                "invalid row span {first_row}..={last_row}"
            )));
        }
        let first_column = column_index(columns.0)?;
        let last_column = column_index(columns.1)?;
        if last_column < first_column {
            return Err(ReportError::InvalidRequest(format!(
                "invalid column span {}:{}",
                columns.0, columns.1
            )));
        }
        Ok(Self {
            sheet_id,
            start_row_index: first_row - 1,
            end_row_index: last_row,
            start_column_index: first_column,
            end_column_index: last_column + 1,
        })
    }

    /// Zero for empty or inverted ranges.
    pub fn cell_count(&self) -> u64 {
        let rows = self.end_row_index.saturating_sub(self.start_row_index);
        let columns = self.end_column_index.saturating_sub(self.start_column_index);
        u64::from(rows) * u64::from(columns)
    }

    pub fn is_inverted(&self) -> bool {
        self.end_row_index < self.start_row_index
            || self.end_column_index < self.start_column_index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCoordinate {
    pub sheet_id: i64,
    pub row_index: u32,
    pub column_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Border {
    pub style: BorderStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetPropertiesUpdate {
    pub sheet_id: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionValue {
    pub user_entered_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BooleanCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub values: Vec<ConditionValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValidationRule {
    pub condition: BooleanCondition,
    pub strict: bool,
    pub show_custom_ui: bool,
}

/// One entry of a `spreadsheets.batchUpdate` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    InsertDimension {
        range: DimensionRange,
        inherit_from_before: bool,
    },
    DeleteDimension {
        range: DimensionRange,
    },
    InsertRange {
        range: GridRange,
        shift_dimension: Dimension,
    },
    DeleteRange {
        range: GridRange,
        shift_dimension: Dimension,
    },
    MergeCells {
        range: GridRange,
        merge_type: MergeType,
    },
    UpdateSheetProperties {
        properties: SheetPropertiesUpdate,
        fields: String,
    },
    UpdateBorders {
        range: GridRange,
        top: Border,
        bottom: Border,
        left: Border,
        right: Border,
        inner_horizontal: Border,
        inner_vertical: Border,
    },
    SetDataValidation {
        range: GridRange,
        rule: DataValidationRule,
    },
    CopyPaste {
        source: GridRange,
        destination: GridRange,
        paste_type: PasteType,
    },
    CutPaste {
        source: GridRange,
        destination: GridCoordinate,
        paste_type: PasteType,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchUpdateRequest {
    pub requests: Vec<Request>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    pub range: String,
    pub major_dimension: Dimension,
    pub values: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuesBatchUpdateRequest {
    pub value_input_option: String,
    pub data: Vec<ValueRange>,
}

impl ValuesBatchUpdateRequest {
    /// Values are parsed as if typed in the UI, so formulas evaluate.
    pub fn user_entered(data: Vec<ValueRange>) -> Self {
        Self {
            value_input_option: "USER_ENTERED".to_string(),
            data,
        }
    }
}

fn row_span(sheet_id: i64, first_row: u32, count: u32) -> Result<DimensionRange, ReportError> {
    if first_row == 0 {
        return Err(ReportError::InvalidRequest(
            "rows are numbered from 1".to_string(),
        ));
    }
    if count == 0 {
        return Err(ReportError::InvalidRequest(
            "row count must be positive".to_string(),
        ));
    }
    Ok(DimensionRange {
        sheet_id,
        dimension: Dimension::Rows,
        start_index: first_row - 1,
        end_index: first_row - 1 + count,
    })
}

pub fn update_cells(range: &str, values: Vec<Vec<Value>>) -> Result<ValueRange, ReportError> {
    if range.trim().is_empty() {
        return Err(ReportError::InvalidRequest("missing range".to_string()));
    }
    if values.is_empty() || values.iter().any(Vec::is_empty) {
        return Err(ReportError::InvalidRequest(format!(
            "no values for range {range}"
        )));
    }
    Ok(ValueRange {
        range: range.to_string(),
        major_dimension: Dimension::Rows,
        values,
    })
}

/// Inserts `count` rows so that the first new row is `at_row`. New rows take
/// the formatting of the row they push down.
pub fn insert_rows(sheet_id: i64, at_row: u32, count: u32) -> Result<Request, ReportError> {
    Ok(Request::InsertDimension {
        range: row_span(sheet_id, at_row, count)?,
        inherit_from_before: false,
    })
}

pub fn delete_rows(sheet_id: i64, first_row: u32, count: u32) -> Result<Request, ReportError> {
    Ok(Request::DeleteDimension {
        range: row_span(sheet_id, first_row, count)?,
    })
}

pub fn delete_range(range: GridRange) -> Result<Request, ReportError> {
    non_empty(&range)?;
    Ok(Request::DeleteRange {
        range,
        shift_dimension: Dimension::Rows,
    })
}

pub fn insert_range(range: GridRange) -> Result<Request, ReportError> {
    non_empty(&range)?;
    Ok(Request::InsertRange {
        range,
        shift_dimension: Dimension::Rows,
    })
}

pub fn merge_cells(range: GridRange) -> Result<Request, ReportError> {
    if range.cell_count() < 2 {
        return Err(ReportError::InvalidRequest(
            "merge needs at least two cells".to_string(),
        ));
    }
    Ok(Request::MergeCells {
        range,
        merge_type: MergeType::MergeRows,
    })
}

pub fn rename_sheet(sheet_id: i64, title: &str) -> Result<Request, ReportError> {
    if title.trim().is_empty() {
        return Err(ReportError::InvalidRequest(
            "sheet title must not be empty".to_string(),
        ));
    }
    Ok(Request::UpdateSheetProperties {
        properties: SheetPropertiesUpdate {
            sheet_id,
            title: title.to_string(),
        },
        fields: "title".to_string(),
    })
}

pub fn update_borders(range: GridRange, style: BorderStyle) -> Result<Request, ReportError> {
    non_empty(&range)?;
    let border = Border { style };
    Ok(Request::UpdateBorders {
        range,
        top: border,
        bottom: border,
        left: border,
        right: border,
        inner_horizontal: border,
        inner_vertical: border,
    })
}

pub fn data_validation_list(range: GridRange, values: &[&str]) -> Result<Request, ReportError> {
    non_empty(&range)?;
    if values.is_empty() {
        return Err(ReportError::InvalidRequest(
            "validation list must not be empty".to_string(),
        ));
    }
    Ok(Request::SetDataValidation {
        range,
        rule: DataValidationRule {
            condition: BooleanCondition {
                condition_type: "ONE_OF_LIST".to_string(),
                values: values
                    .iter()
                    .map(|value| ConditionValue {
                        user_entered_value: value.to_string(),
                    })
                    .collect(),
            },
            strict: true,
            show_custom_ui: true,
        },
    })
}

pub fn copy_paste(source: GridRange, destination: GridRange) -> Result<Request, ReportError> {
    non_empty(&source)?;
    non_empty(&destination)?;
    Ok(Request::CopyPaste {
        source,
        destination,
        paste_type: PasteType::PasteNormal,
    })
}

pub fn cut_paste(source: GridRange, destination: GridCoordinate) -> Result<Request, ReportError> {
    non_empty(&source)?;
    Ok(Request::CutPaste {
        source,
        destination,
        paste_type: PasteType::PasteNormal,
    })
}

fn non_empty(range: &GridRange) -> Result<(), ReportError> {
    if range.is_inverted() {
        return Err(ReportError::InvalidRequest(format!(
            "inverted range on sheet {}",
            range.sheet_id
        )));
    }
    if range.cell_count() == 0 {
        return Err(ReportError::InvalidRequest(format!(
            "empty range on sheet {}",
            range.sheet_id
        )));
    }
    Ok(())
}
