// Import necessary crates and modules
use crate::util::{first_f64, first_str, json_datetime, json_f64, json_u64};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// A student enrolled in a classroom, as listed on the People tab.
///
/// Fields:
/// - `id`: SCMS user id.
/// - `student_number`: School-issued id shown next to the name, when known.
/// - `name`: Display name ("First Last").
/// - `email`: Login email.
/// - `avatar`: Stored profile picture path, resolved with `util::resolve_avatar`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Student {
    pub id: u64,
    pub student_number: Option<String>,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub joined_at: Option<DateTime<Utc>>,
}

impl Student {
    /// Converts a roster entry. Names arrive either whole or split in
    /// `first_name`/`last_name`.
    pub fn convert_json_to_student(j: &Value) -> Option<Student> {
        let id = json_u64(&j["id"])
            .or_else(|| json_u64(&j["student_id"]))
            .or_else(|| json_u64(&j["user_id"]))?;
        let name = first_str(j, &["name", "full_name"]).or_else(|| {
            let first = first_str(j, &["first_name"]).unwrap_or_default();
            let last = first_str(j, &["last_name"]).unwrap_or_default();
            let joined = format!("{} {}", first, last).trim().to_string();
            if joined.is_empty() {
                None
            } else {
                Some(joined)
            }
        })?;
        Some(Student {
            id,
            student_number: first_str(j, &["student_number", "student_num", "id_number"]),
            name,
            email: first_str(j, &["email"]).unwrap_or_default(),
            avatar: first_str(j, &["profile_pic", "avatar"]),
            joined_at: json_datetime(&j["joined_at"]).or_else(|| json_datetime(&j["enrolled_at"])),
        })
    }

    /// Last word of the display name, used for roster ordering.
    pub fn last_name(&self) -> &str {
        self.name.split_whitespace().last().unwrap_or("")
    }
}

pub fn convert_json_to_students(value: &Value) -> Vec<Student> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Student::convert_json_to_student).collect())
        .unwrap_or_default()
}

/// Sorts a roster by last name, then full name, case-insensitively.
pub fn sort_roster(students: &mut [Student]) {
    students.sort_by(|a, b| {
        a.last_name()
            .to_lowercase()
            .cmp(&b.last_name().to_lowercase())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

/// Students whose name, email or student number contains `query`.
pub fn search_roster<'a>(students: &'a [Student], query: &str) -> Vec<&'a Student> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return students.iter().collect();
    }
    students
        .iter()
        .filter(|s| {
            s.name.to_lowercase().contains(&query)
                || s.email.to_lowercase().contains(&query)
                || s.student_number
                    .as_deref()
                    .map_or(false, |n| n.to_lowercase().contains(&query))
        })
        .collect()
}

/// Splits the invite box (commas, semicolons, whitespace) into valid and invalid emails.
///
/// Valid addresses are lowercased and de-duplicated in input order.
pub fn parse_invite_emails(raw: &str) -> (Vec<String>, Vec<String>) {
    let mut valid: Vec<String> = Vec::new();
    let mut invalid = Vec::new();
    for token in raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if EMAIL.is_match(token) {
            let email = token.to_lowercase();
            if !valid.contains(&email) {
                valid.push(email);
            }
        } else {
            invalid.push(token.to_string());
        }
    }
    (valid, invalid)
}

/// Attendance counts of one student for the grading period.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct AttendanceRecord {
    pub present_sessions: f64,
    pub excused_sessions: f64,
    pub late_sessions: f64,
    pub absent_sessions: f64,
}

impl AttendanceRecord {
    pub fn convert_json_to_attendance(j: &Value) -> Option<AttendanceRecord> {
        if !j.is_object() {
            return None;
        }
        let count = |keys: &[&str]| first_f64(j, keys).unwrap_or(0.0);
        Some(AttendanceRecord {
            present_sessions: count(&["present_sessions", "present"]),
            excused_sessions: count(&["excused_sessions", "excused"]),
            late_sessions: count(&["late_sessions", "late"]),
            absent_sessions: count(&["absent_sessions", "absent"]),
        })
    }

    pub fn total_sessions(&self) -> f64 {
        self.present_sessions + self.excused_sessions + self.late_sessions + self.absent_sessions
    }
}

/// A student's result for one task. `grade` is `None` when nothing was graded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct StudentAssignmentRecord {
    pub task_id: u64,
    pub grade: Option<f64>,
    pub points: Option<f64>,
}

impl StudentAssignmentRecord {
    /// Reads the raw score from the first present of `grade`, `graded`, `score`, `raw_score`.
    pub fn convert_json_to_record(j: &Value) -> Option<StudentAssignmentRecord> {
        let task_id = json_u64(&j["task_id"])
            .or_else(|| json_u64(&j["assignment_id"]))
            .or_else(|| json_u64(&j["id"]))?;
        Some(StudentAssignmentRecord {
            task_id,
            grade: first_f64(j, &["grade", "graded", "score", "raw_score"]),
            points: json_f64(&j["points"]).or_else(|| json_f64(&j["max_score"])),
        })
    }
}

/// One student's row from the classroom grades endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct StudentGradeRecord {
    pub student: Student,
    pub assignments: Vec<StudentAssignmentRecord>,
    pub attendance: Option<AttendanceRecord>,
}

impl StudentGradeRecord {
    pub fn convert_json_to_grade_record(j: &Value) -> Option<StudentGradeRecord> {
        let student_json = if j["student"].is_object() { &j["student"] } else { j };
        let student = Student::convert_json_to_student(student_json)?;
        let assignments = j["assignments"]
            .as_array()
            .or_else(|| j["grades"].as_array())
            .map(|items| {
                let mut records: Vec<StudentAssignmentRecord> = Vec::new();
                for record in items.iter().filter_map(StudentAssignmentRecord::convert_json_to_record) {
                    // One record per task; the first one wins.
                    if !records.iter().any(|r| r.task_id == record.task_id) {
                        records.push(record);
                    }
                }
                records
            })
            .unwrap_or_default();
        Some(StudentGradeRecord {
            student,
            assignments,
            attendance: AttendanceRecord::convert_json_to_attendance(&j["attendance"]),
        })
    }

    pub fn record_for(&self, task_id: u64) -> Option<&StudentAssignmentRecord> {
        self.assignments.iter().find(|r| r.task_id == task_id)
    }
}
