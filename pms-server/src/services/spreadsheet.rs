//! Task spreadsheets: blank template, export and validated import
//!
//! One worksheet, one header row, one task per row:
//!
//! | Title | Description | Phase | Status | Priority | Assignee Email | Start Date | Due Date | Estimate Hours |
//!
//! Import is all-or-nothing: every row is validated first and any error
//! rejects the whole file.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use chrono::{NaiveDate, TimeDelta};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde::Serialize;
use uuid::Uuid;

use crate::db::{MemberWithUser, NewTask, Phase, Task};
use crate::models::{
    check_range, description, parse_date, parse_loose, Priority, TaskStatus, Title, ValidationError,
};

pub const COLUMNS: [&str; 9] = [
    "Title",
    "Description",
    "Phase",
    "Status",
    "Priority",
    "Assignee Email",
    "Start Date",
    "Due Date",
    "Estimate Hours",
];

const COLUMN_WIDTHS: [f64; 9] = [40.0, 50.0, 20.0, 14.0, 12.0, 28.0, 12.0, 12.0, 15.0];

const TASKS_SHEET: &str = "Tasks";
const REFERENCE_SHEET: &str = "Reference";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum SpreadsheetError {
    #[error("failed to write workbook: {0}")]
    Write(#[from] XlsxError),

    #[error("not a readable xlsx workbook: {0}")]
    Read(String),

    #[error("workbook has no worksheet")]
    NoSheet,

    #[error("unexpected header row; expected columns: {}", COLUMNS.join(", "))]
    Header,
}

/// Validation failure of one spreadsheet row (1-based, as shown in Excel)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row: u32,
    pub message: String,
}

/// Project data that imported rows refer to by name
pub struct ImportContext {
    phases: HashMap<String, Uuid>,
    members: HashMap<String, Uuid>,
}

impl ImportContext {
    pub fn new(phases: &[Phase], members: &[MemberWithUser]) -> Self {
        Self {
            phases: phases
                .iter()
                .map(|p| (p.name.trim().to_lowercase(), p.id))
                .collect(),
            members: members
                .iter()
                .map(|m| (m.email.to_lowercase(), m.member.user_id))
                .collect(),
        }
    }
}

fn write_header(sheet: &mut Worksheet) -> Result<(), XlsxError> {
    let bold = Format::new().set_bold();
    for (col, (name, width)) in COLUMNS.iter().zip(COLUMN_WIDTHS).enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &bold)?;
        sheet.set_column_width(col as u16, width)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn write_reference(workbook: &mut Workbook) -> Result<(), XlsxError> {
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(REFERENCE_SHEET)?;
    sheet.write_string_with_format(0, 0, "Status", &bold)?;
    sheet.write_string_with_format(0, 1, "Priority", &bold)?;
    for (row, status) in TaskStatus::ALL.iter().enumerate() {
        sheet.write_string(row as u32 + 1, 0, status.to_string())?;
    }
    for (row, priority) in Priority::ALL.iter().enumerate() {
        sheet.write_string(row as u32 + 1, 1, priority.to_string())?;
    }
    sheet.write_string(0, 3, "Dates use YYYY-MM-DD. Status, Priority and Estimate Hours may be left blank.")?;
    Ok(())
}

/// Empty import template with a reference sheet of allowed values.
pub fn template() -> Result<Vec<u8>, SpreadsheetError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(TASKS_SHEET)?;
    write_header(sheet)?;
    write_reference(&mut workbook)?;
    Ok(workbook.save_to_buffer()?)
}

/// All tasks of a project in import format.
pub fn export(
    tasks: &[Task],
    phases: &[Phase],
    members: &[MemberWithUser],
) -> Result<Vec<u8>, SpreadsheetError> {
    let phase_names: HashMap<Uuid, &str> = phases.iter().map(|p| (p.id, p.name.as_str())).collect();
    let emails: HashMap<Uuid, &str> = members
        .iter()
        .map(|m| (m.member.user_id, m.email.as_str()))
        .collect();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(TASKS_SHEET)?;
    write_header(sheet)?;

    for (i, task) in tasks.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, &task.title)?;
        if let Some(text) = &task.description {
            sheet.write_string(row, 1, text)?;
        }
        if let Some(name) = task.phase_id.and_then(|id| phase_names.get(&id)) {
            sheet.write_string(row, 2, *name)?;
        }
        sheet.write_string(row, 3, task.status.to_string())?;
        sheet.write_string(row, 4, task.priority.to_string())?;
        if let Some(email) = task.assignee_id.and_then(|id| emails.get(&id)) {
            sheet.write_string(row, 5, *email)?;
        }
        if let Some(date) = task.start_date {
            sheet.write_string(row, 6, date.format(DATE_FORMAT).to_string())?;
        }
        if let Some(date) = task.due_date {
            sheet.write_string(row, 7, date.format(DATE_FORMAT).to_string())?;
        }
        if let Some(hours) = task.estimate_hours {
            sheet.write_number(row, 8, hours)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Parse and validate an uploaded workbook.
///
/// `Err(SpreadsheetError)` means the file itself is unusable; the inner
/// `Err(Vec<RowError>)` lists every invalid row.
pub fn import(
    bytes: &[u8],
    ctx: &ImportContext,
) -> Result<Result<Vec<NewTask>, Vec<RowError>>, SpreadsheetError> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).map_err(|e| SpreadsheetError::Read(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::NoSheet)?
        .map_err(|e| SpreadsheetError::Read(e.to_string()))?;

    let first_row = range.start().map(|(row, _)| row).unwrap_or(0);
    let mut rows = range.rows();

    let header = rows.next().ok_or(SpreadsheetError::Header)?;
    let header_ok = COLUMNS.iter().enumerate().all(|(col, expected)| {
        header
            .get(col)
            .and_then(text)
            .is_some_and(|name| name.eq_ignore_ascii_case(expected))
    });
    if !header_ok {
        return Err(SpreadsheetError::Header);
    }

    let mut tasks = Vec::new();
    let mut errors = Vec::new();

    for (i, cells) in rows.enumerate() {
        // header is the range's first row; Excel rows are 1-based
        let row_number = first_row + i as u32 + 2;

        if cells.iter().all(|c| text(c).is_none()) {
            continue;
        }

        match parse_row(cells, ctx) {
            Ok(task) => tasks.push(task),
            Err(messages) => errors.extend(messages.into_iter().map(|message| RowError {
                row: row_number,
                message,
            })),
        }
    }

    if errors.is_empty() {
        Ok(Ok(tasks))
    } else {
        Ok(Err(errors))
    }
}

fn keep<T>(errors: &mut Vec<String>, result: Result<T, ValidationError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            errors.push(e.to_string());
            None
        }
    }
}

fn parse_row(cells: &[Data], ctx: &ImportContext) -> Result<NewTask, Vec<String>> {
    let cell = |col: usize| cells.get(col).unwrap_or(&Data::Empty);
    let mut errors = Vec::new();

    let title = keep(&mut errors, Title::new(&text(cell(0)).unwrap_or_default()));
    let desc = keep(&mut errors, description(text(cell(1)).as_deref()));
    let status = keep(
        &mut errors,
        text(cell(3)).map_or(Ok(TaskStatus::default()), |raw| parse_loose("status", &raw)),
    );
    let priority = keep(
        &mut errors,
        text(cell(4)).map_or(Ok(Priority::default()), |raw| parse_loose("priority", &raw)),
    );
    let start_date = keep(&mut errors, date(cell(6), "start_date"));
    let due_date = keep(&mut errors, date(cell(7), "due_date"));
    let estimate_hours = keep(&mut errors, hours(cell(8)));
    if let (Some(start), Some(due)) = (start_date, due_date) {
        keep(&mut errors, check_range(start, due, "start_date", "due_date"));
    }

    let mut phase_id = None;
    if let Some(name) = text(cell(2)) {
        match ctx.phases.get(&name.to_lowercase()) {
            Some(id) => phase_id = Some(*id),
            None => errors.push(format!("unknown phase '{name}'")),
        }
    }

    let mut assignee_id = None;
    if let Some(email) = text(cell(5)) {
        match ctx.members.get(&email.to_lowercase()) {
            Some(id) => assignee_id = Some(*id),
            None => errors.push(format!("'{email}' is not a member of this project")),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    match (title, desc, status, priority, start_date, due_date, estimate_hours) {
        (
            Some(title),
            Some(description),
            Some(status),
            Some(priority),
            Some(start_date),
            Some(due_date),
            Some(estimate_hours),
        ) => Ok(NewTask {
            phase_id,
            title,
            description,
            status,
            priority,
            assignee_id,
            start_date,
            due_date,
            estimate_hours,
        }),
        _ => Err(errors),
    }
}

/// Trimmed cell text, `None` for blank cells.
fn text(cell: &Data) -> Option<String> {
    let raw = match cell {
        Data::Empty => return None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    };
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Days between Excel's 1900-system epoch and the serial number.
/// Largest serial Excel accepts (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

fn from_excel_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_EXCEL_SERIAL + 1.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(TimeDelta::try_days(serial.floor() as i64)?)
}

fn date(cell: &Data, field: &'static str) -> Result<Option<NaiveDate>, ValidationError> {
    let invalid = ValidationError::InvalidFormat {
        field,
        reason: "expected a date formatted as YYYY-MM-DD",
    };
    match cell {
        Data::Empty => Ok(None),
        Data::DateTime(dt) => from_excel_serial(dt.as_f64()).map(Some).ok_or(invalid),
        Data::Float(serial) => from_excel_serial(*serial).map(Some).ok_or(invalid),
        Data::Int(serial) => from_excel_serial(*serial as f64).map(Some).ok_or(invalid),
        Data::DateTimeIso(s) => parse_date(field, s.get(..10).unwrap_or(s)).map(Some),
        other => match text(other) {
            None => Ok(None),
            Some(raw) => parse_date(field, &raw).map(Some),
        },
    }
}

fn hours(cell: &Data) -> Result<Option<f64>, ValidationError> {
    let value = match cell {
        Data::Empty => return Ok(None),
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        other => match text(other) {
            None => return Ok(None),
            Some(raw) => raw.parse::<f64>().map_err(|_| ValidationError::InvalidFormat {
                field: "estimate_hours",
                reason: "expected a number",
            })?,
        },
    };

    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidFormat {
            field: "estimate_hours",
            reason: "must be a non-negative number",
        });
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::ProjectMember;
    use crate::models::{PhaseStatus, Role};

    fn phase(name: &str) -> Phase {
        let now = Utc::now();
        Phase {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            name: name.into(),
            description: None,
            status: PhaseStatus::NotStarted,
            start_date: None,
            end_date: None,
            position: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn member(email: &str) -> MemberWithUser {
        MemberWithUser {
            member: ProjectMember {
                project_id: Uuid::nil(),
                user_id: Uuid::new_v4(),
                role: Role::Developer,
                allocation_percent: 100,
                joined_at: Utc::now(),
            },
            email: email.into(),
            display_name: "Dev".into(),
        }
    }

    /// Workbook with the standard header and the given rows of text cells.
    fn workbook(rows: &[[&str; 9]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        write_header(sheet).unwrap();
        for (r, cells) in rows.iter().enumerate() {
            for (c, value) in cells.iter().enumerate() {
                if !value.is_empty() {
                    sheet.write_string(r as u32 + 1, c as u16, *value).unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn template_has_only_header() {
        let bytes = template().unwrap();
        let ctx = ImportContext::new(&[], &[]);
        assert_eq!(import(&bytes, &ctx).unwrap().unwrap().len(), 0);
    }

    #[test]
    fn valid_rows_import() {
        let build = phase("Build");
        let dev = member("dev@acme.test");
        let ctx = ImportContext::new(&[build.clone()], &[dev.clone()]);

        let bytes = workbook(&[
            ["Login page", "OAuth + password", "build", "In Progress", "HIGH", "Dev@Acme.test", "2024-05-01", "2024-05-10", "6.5"],
            ["", "", "", "", "", "", "", "", ""],
            ["Logout", "", "", "", "", "", "", "", ""],
        ]);

        let tasks = import(&bytes, &ctx).unwrap().unwrap();
        assert_eq!(tasks.len(), 2);

        let login = &tasks[0];
        assert_eq!(login.title.as_str(), "Login page");
        assert_eq!(login.phase_id, Some(build.id));
        assert_eq!(login.status, TaskStatus::InProgress);
        assert_eq!(login.priority, Priority::High);
        assert_eq!(login.assignee_id, Some(dev.member.user_id));
        assert_eq!(login.due_date, NaiveDate::from_ymd_opt(2024, 5, 10));
        assert_eq!(login.estimate_hours, Some(6.5));

        let logout = &tasks[1];
        assert_eq!(logout.status, TaskStatus::Todo);
        assert_eq!(logout.priority, Priority::Medium);
        assert_eq!(logout.description, None);
    }

    #[test]
    fn every_bad_row_is_reported() {
        let ctx = ImportContext::new(&[], &[]);
        let bytes = workbook(&[
            ["Fine", "", "", "", "", "", "", "", ""],
            ["", "no title", "", "", "", "", "", "", ""],
            ["Bad enums", "", "", "Blocked", "Critical", "", "", "", ""],
            ["Bad refs", "", "Nowhere", "", "", "ghost@acme.test", "", "", "-2"],
            ["Bad dates", "", "", "", "", "", "2024-05-10", "2024-05-01", ""],
        ]);

        let errors = import(&bytes, &ctx).unwrap().unwrap_err();
        let rows: Vec<u32> = errors.iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![3, 4, 4, 5, 5, 5, 6]);
        assert!(errors[0].message.contains("title"));
        assert!(errors[1].message.contains("Blocked"));
        assert!(errors.iter().any(|e| e.message.contains("unknown phase 'Nowhere'")));
        assert!(errors.iter().any(|e| e.message.contains("ghost@acme.test")));
        assert!(errors.iter().any(|e| e.message.contains("estimate_hours")));
        assert!(errors[6].message.contains("due_date"));
    }

    #[test]
    fn wrong_header_is_rejected() {
        let mut workbook = Workbook::new();
        workbook.add_worksheet().write_string(0, 0, "Name").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let ctx = ImportContext::new(&[], &[]);
        assert!(matches!(import(&bytes, &ctx), Err(SpreadsheetError::Header)));
    }

    #[test]
    fn garbage_is_not_a_workbook() {
        let ctx = ImportContext::new(&[], &[]);
        assert!(matches!(
            import(b"definitely not a zip", &ctx),
            Err(SpreadsheetError::Read(_))
        ));
    }

    #[test]
    fn excel_serial_dates() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        write_header(sheet).unwrap();
        sheet.write_string(1, 0, "Serial").unwrap();
        sheet.write_number(1, 7, 45292.0).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let tasks = import(&bytes, &ImportContext::new(&[], &[])).unwrap().unwrap();
        assert_eq!(tasks[0].due_date, NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn out_of_range_serial_dates_are_row_errors() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        write_header(sheet).unwrap();
        sheet.write_string(1, 0, "Far future").unwrap();
        sheet.write_number(1, 7, 1e18).unwrap();
        sheet.write_string(2, 0, "Before epoch").unwrap();
        sheet.write_number(2, 6, -5.0).unwrap();
        sheet.write_string(3, 0, "Last day").unwrap();
        sheet.write_number(3, 7, 2_958_465.0).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let errors = import(&bytes, &ImportContext::new(&[], &[])).unwrap().unwrap_err();
        let rows: Vec<u32> = errors.iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![2, 3]);
        assert!(errors[0].message.contains("due_date"));
        assert!(errors[1].message.contains("start_date"));
        assert_eq!(from_excel_serial(2_958_465.0), NaiveDate::from_ymd_opt(9999, 12, 31));
        assert_eq!(from_excel_serial(f64::NAN), None);
    }

    #[test]
    fn export_round_trips() {
        let build = phase("Build");
        let dev = member("dev@acme.test");
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            phase_id: Some(build.id),
            title: "Checkout flow".into(),
            description: Some("Stripe".into()),
            status: TaskStatus::InReview,
            priority: Priority::Urgent,
            assignee_id: Some(dev.member.user_id),
            start_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            due_date: NaiveDate::from_ymd_opt(2024, 2, 29),
            estimate_hours: Some(12.0),
            position: 0,
            created_by: Uuid::nil(),
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        let bytes = export(&[task.clone()], &[build.clone()], &[dev.clone()]).unwrap();
        let ctx = ImportContext::new(&[build], &[dev]);
        let imported = import(&bytes, &ctx).unwrap().unwrap();

        assert_eq!(imported.len(), 1);
        let back = &imported[0];
        assert_eq!(back.title.as_str(), task.title);
        assert_eq!(back.description, task.description);
        assert_eq!(back.phase_id, task.phase_id);
        assert_eq!(back.status, task.status);
        assert_eq!(back.priority, task.priority);
        assert_eq!(back.assignee_id, task.assignee_id);
        assert_eq!(back.start_date, task.start_date);
        assert_eq!(back.due_date, task.due_date);
        assert_eq!(back.estimate_hours, task.estimate_hours);
    }
}
