// Import necessary crates and modules
use crate::attachment::{ExternalLink, LocalAttachment, RemoteAttachment};
use crate::stream::Comment;
use crate::util::{first_f64, first_str, json_bool, json_datetime, json_u64};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Point value the task form pre-fills. A task still carrying it is treated
/// as "not explicitly set" by the exam max-score rule.
pub const DEFAULT_TASK_POINTS: f64 = 100.0;

/// Kinds of task a teacher can post.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    Assignment,
    Quiz,
    Activity,
    Project,
    Exam,
    MidtermExam,
    FinalExam,
}

impl TaskType {
    pub fn as_str(&self) -> &str {
        match self {
            TaskType::Assignment => "assignment",
            TaskType::Quiz => "quiz",
            TaskType::Activity => "activity",
            TaskType::Project => "project",
            TaskType::Exam => "exam",
            TaskType::MidtermExam => "midterm_exam",
            TaskType::FinalExam => "final_exam",
        }
    }

    /// Lenient parse; `midterm` and `final` are accepted as shorthands.
    pub fn parse(raw: &str) -> Option<TaskType> {
        match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "assignment" => Some(TaskType::Assignment),
            "quiz" => Some(TaskType::Quiz),
            "activity" => Some(TaskType::Activity),
            "project" => Some(TaskType::Project),
            "exam" => Some(TaskType::Exam),
            "midterm_exam" | "midterm" => Some(TaskType::MidtermExam),
            "final_exam" | "final" => Some(TaskType::FinalExam),
            _ => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            TaskType::Assignment => "Assignment",
            TaskType::Quiz => "Quiz",
            TaskType::Activity => "Activity",
            TaskType::Project => "Project",
            TaskType::Exam => "Exam",
            TaskType::MidtermExam => "Midterm Exam",
            TaskType::FinalExam => "Final Exam",
        }
    }
}

/// Explicit exam classification sent by the server.
///
/// When present it decides whether the task feeds the midterm or final
/// column; tasks without it fall back to the type/title heuristics in
/// `grading`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExamKind {
    Midterm,
    Final,
    None,
}

impl ExamKind {
    pub fn parse(raw: &str) -> Option<ExamKind> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "midterm" | "midterm_exam" => Some(ExamKind::Midterm),
            "final" | "final_exam" => Some(ExamKind::Final),
            "none" | "regular" | "not_exam" => Some(ExamKind::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ExamKind::Midterm => "midterm",
            ExamKind::Final => "final",
            ExamKind::None => "none",
        }
    }
}

/// Publication state of a task or stream post.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    #[default]
    Published,
    Draft,
    Scheduled,
}

impl PublishStatus {
    pub fn parse(raw: &str) -> PublishStatus {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => PublishStatus::Draft,
            "scheduled" => PublishStatus::Scheduled,
            _ => PublishStatus::Published,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PublishStatus::Published => "published",
            PublishStatus::Draft => "draft",
            PublishStatus::Scheduled => "scheduled",
        }
    }
}

/// A task (assignment, quiz, activity, project or exam) of a classroom.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Task {
    pub id: u64,
    pub classroom_code: Option<String>,
    pub title: String,
    pub task_type: TaskType,
    pub points: Option<f64>,
    pub due_date: Option<DateTime<Utc>>,
    pub instructions: Option<String>,
    pub status: PublishStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub allow_comments: bool,
    pub exam_kind: Option<ExamKind>,
    pub attachments: Vec<RemoteAttachment>,
    pub links: Vec<ExternalLink>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Where a task stands relative to its due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueStatus {
    NoDueDate,
    Upcoming,
    DueSoon,
    PastDue,
}

impl Task {
    /// Converts a task object from the API.
    ///
    /// Field names vary between endpoints (`type`/`task_type`,
    /// `points`/`max_score`/`total_points`, `due_date`/`due_at`), so the
    /// object is read field by field. Returns `None` without an id or title.
    pub fn convert_json_to_task(base_url: &str, j: &Value) -> Option<Task> {
        let id = json_u64(&j["id"])?;
        let title = first_str(j, &["title", "name"])?;
        let task_type = first_str(j, &["type", "task_type"])
            .and_then(|t| TaskType::parse(&t))
            .unwrap_or_default();
        let attachments = j["attachments"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|a| RemoteAttachment::convert_json_to_attachment(base_url, a))
                    .collect()
            })
            .unwrap_or_default();
        let links = read_links(j);

        Some(Task {
            id,
            classroom_code: first_str(j, &["classroom_code", "class_code"]),
            title,
            task_type,
            points: first_f64(j, &["points", "max_score", "total_points"]),
            due_date: json_datetime(&j["due_date"]).or_else(|| json_datetime(&j["due_at"])),
            instructions: first_str(j, &["instructions", "description"]),
            status: first_str(j, &["status"])
                .map(|s| PublishStatus::parse(&s))
                .unwrap_or_default(),
            scheduled_at: json_datetime(&j["scheduled_at"]),
            allow_comments: json_bool(&j["allow_comments"]).unwrap_or(true),
            exam_kind: first_str(j, &["exam_kind", "category"]).and_then(|k| ExamKind::parse(&k)),
            attachments,
            links,
            created_at: json_datetime(&j["created_at"]),
        })
    }

    /// Max points of the task, 0 when the server sent none.
    pub fn max_points(&self) -> f64 {
        self.points.unwrap_or(0.0)
    }

    pub fn due_status(&self, now: DateTime<Utc>) -> DueStatus {
        match self.due_date {
            None => DueStatus::NoDueDate,
            Some(due) if due < now => DueStatus::PastDue,
            Some(due) if due - now <= Duration::hours(24) => DueStatus::DueSoon,
            Some(_) => DueStatus::Upcoming,
        }
    }
}

/// Reads `external_links`, which arrives either as an array or as a JSON string.
pub(crate) fn read_links(j: &Value) -> Vec<ExternalLink> {
    let raw = match &j["external_links"] {
        Value::String(s) => serde_json::from_str::<Value>(s).unwrap_or(Value::Null),
        other => other.clone(),
    };
    raw.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(url) => ExternalLink::parse(url),
                    other => serde_json::from_value::<ExternalLink>(other.clone())
                        .ok()
                        .or_else(|| other["url"].as_str().and_then(ExternalLink::parse)),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Payload for creating or updating a task.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub classroom_code: String,
    pub title: String,
    pub task_type: TaskType,
    pub points: f64,
    pub due_date: Option<DateTime<Utc>>,
    pub instructions: String,
    pub allow_comments: bool,
    pub status: PublishStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Explicit exam column; `None` leaves classification to the server's heuristics.
    pub exam_kind: Option<ExamKind>,
    pub attachments: Vec<LocalAttachment>,
    pub links: Vec<ExternalLink>,
}

impl NewTask {
    /// Text fields shared by the JSON and multipart variants of the request.
    pub fn text_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("classroom_code".to_string(), self.classroom_code.clone()),
            ("title".to_string(), self.title.clone()),
            ("type".to_string(), self.task_type.as_str().to_string()),
            ("points".to_string(), self.points.to_string()),
            ("instructions".to_string(), self.instructions.clone()),
            (
                "allow_comments".to_string(),
                if self.allow_comments { "1" } else { "0" }.to_string(),
            ),
            ("status".to_string(), self.status.as_str().to_string()),
        ];
        if let Some(due) = self.due_date {
            fields.push(("due_date".to_string(), due.to_rfc3339()));
        }
        if let Some(at) = self.scheduled_at {
            fields.push(("scheduled_at".to_string(), at.to_rfc3339()));
        }
        if let Some(kind) = self.exam_kind {
            fields.push(("exam_kind".to_string(), kind.as_str().to_string()));
        }
        fields
    }

    pub fn to_json(&self) -> Value {
        json!({
            "classroom_code": self.classroom_code,
            "title": self.title,
            "type": self.task_type.as_str(),
            "points": self.points,
            "due_date": self.due_date.map(|d| d.to_rfc3339()),
            "instructions": self.instructions,
            "allow_comments": self.allow_comments,
            "status": self.status.as_str(),
            "scheduled_at": self.scheduled_at.map(|d| d.to_rfc3339()),
            "exam_kind": self.exam_kind.map(|k| k.as_str().to_string()),
            "external_links": self.links,
        })
    }

    pub fn has_uploads(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// A task together with its comment thread, as shown in the task detail panel.
#[derive(Debug, Clone, Default)]
pub struct TaskThread {
    pub task: Task,
    pub comments: Vec<Comment>,
}
