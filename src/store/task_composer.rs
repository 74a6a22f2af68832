use super::stream_composer::PostMode;
use super::ComposerError;
use crate::attachment::{ExternalLink, LocalAttachment};
use crate::task::{ExamKind, NewTask, PublishStatus, Task, TaskType, DEFAULT_TASK_POINTS};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub enum TaskComposerAction {
    SetTitle(String),
    SetType(TaskType),
    /// Pins the exam column; `None` lets the server classify by type and title.
    SetExamKind(Option<ExamKind>),
    SetPoints(f64),
    SetDueDate(Option<DateTime<Utc>>),
    SetInstructions(String),
    SetAllowComments(bool),
    SetMode(PostMode),
    SetSchedule(Option<DateTime<Utc>>),
    AddAttachment(LocalAttachment),
    RemoveAttachment(usize),
    AddLink(String),
    RemoveLink(usize),
    /// Loads an existing task into the form for editing.
    EditTask(Task),
    SubmitStarted,
    SubmitSucceeded,
    SubmitFailed(String),
    Reset,
}

/// State of the create/edit task dialog of one classroom.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskComposer {
    pub classroom_code: String,
    pub title: String,
    pub task_type: TaskType,
    pub exam_kind: Option<ExamKind>,
    pub points: f64,
    pub due_date: Option<DateTime<Utc>>,
    pub instructions: String,
    pub allow_comments: bool,
    pub mode: PostMode,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub attachments: Vec<LocalAttachment>,
    pub links: Vec<ExternalLink>,
    pub editing_task: Option<u64>,
    pub submitting: bool,
    pub error: Option<String>,
}

impl TaskComposer {
    pub fn new(classroom_code: &str) -> Self {
        TaskComposer {
            classroom_code: classroom_code.to_string(),
            title: String::new(),
            task_type: TaskType::default(),
            exam_kind: None,
            points: DEFAULT_TASK_POINTS,
            due_date: None,
            instructions: String::new(),
            allow_comments: true,
            mode: PostMode::Publish,
            scheduled_at: None,
            attachments: Vec::new(),
            links: Vec::new(),
            editing_task: None,
            submitting: false,
            error: None,
        }
    }

    pub fn reduce(&mut self, action: TaskComposerAction) {
        match action {
            TaskComposerAction::SetTitle(title) => self.title = title,
            TaskComposerAction::SetType(task_type) => self.task_type = task_type,
            TaskComposerAction::SetExamKind(kind) => self.exam_kind = kind,
            TaskComposerAction::SetPoints(points) => self.points = points,
            TaskComposerAction::SetDueDate(due) => self.due_date = due,
            TaskComposerAction::SetInstructions(text) => self.instructions = text,
            TaskComposerAction::SetAllowComments(allow) => self.allow_comments = allow,
            TaskComposerAction::SetMode(mode) => {
                self.mode = mode;
                if mode != PostMode::Schedule {
                    self.scheduled_at = None;
                }
            }
            TaskComposerAction::SetSchedule(at) => {
                self.scheduled_at = at;
                if at.is_some() {
                    self.mode = PostMode::Schedule;
                }
            }
            TaskComposerAction::AddAttachment(file) => self.attachments.push(file),
            TaskComposerAction::RemoveAttachment(index) => {
                if index < self.attachments.len() {
                    self.attachments.remove(index);
                }
            }
            TaskComposerAction::AddLink(raw) => match ExternalLink::parse(&raw) {
                Some(link) => {
                    if !self.links.iter().any(|l| l.url == link.url) {
                        self.links.push(link);
                    }
                    self.error = None;
                }
                None => self.error = Some(ComposerError::InvalidLink(raw).to_string()),
            },
            TaskComposerAction::RemoveLink(index) => {
                if index < self.links.len() {
                    self.links.remove(index);
                }
            }
            TaskComposerAction::EditTask(task) => {
                let code = task
                    .classroom_code
                    .clone()
                    .unwrap_or_else(|| self.classroom_code.clone());
                *self = TaskComposer {
                    title: task.title,
                    task_type: task.task_type,
                    exam_kind: task.exam_kind,
                    points: task.points.unwrap_or(DEFAULT_TASK_POINTS),
                    due_date: task.due_date,
                    instructions: task.instructions.unwrap_or_default(),
                    allow_comments: task.allow_comments,
                    mode: match task.status {
                        PublishStatus::Published => PostMode::Publish,
                        PublishStatus::Draft => PostMode::Draft,
                        PublishStatus::Scheduled => PostMode::Schedule,
                    },
                    scheduled_at: task.scheduled_at,
                    links: task.links,
                    editing_task: Some(task.id),
                    ..TaskComposer::new(&code)
                };
            }
            TaskComposerAction::SubmitStarted => {
                self.submitting = true;
                self.error = None;
            }
            TaskComposerAction::SubmitSucceeded | TaskComposerAction::Reset => {
                *self = TaskComposer::new(&self.classroom_code);
            }
            TaskComposerAction::SubmitFailed(message) => {
                self.submitting = false;
                self.error = Some(message);
            }
        }
    }

    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ComposerError> {
        if self.submitting {
            return Err(ComposerError::AlreadySubmitting);
        }
        if self.title.trim().is_empty() {
            return Err(ComposerError::MissingTitle);
        }
        if !(self.points.is_finite() && self.points > 0.0) {
            return Err(ComposerError::InvalidPoints(self.points));
        }
        if self.mode == PostMode::Schedule {
            match self.scheduled_at {
                None => return Err(ComposerError::MissingSchedule),
                Some(at) if at <= now => return Err(ComposerError::ScheduleInPast),
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn to_submission(&self, now: DateTime<Utc>) -> Result<NewTask, ComposerError> {
        self.validate(now)?;
        Ok(NewTask {
            classroom_code: self.classroom_code.clone(),
            title: self.title.trim().to_string(),
            task_type: self.task_type,
            points: self.points,
            due_date: self.due_date,
            instructions: self.instructions.trim().to_string(),
            allow_comments: self.allow_comments,
            status: match self.mode {
                PostMode::Publish => PublishStatus::Published,
                PostMode::Draft => PublishStatus::Draft,
                PostMode::Schedule => PublishStatus::Scheduled,
            },
            scheduled_at: if self.mode == PostMode::Schedule { self.scheduled_at } else { None },
            exam_kind: self.exam_kind,
            attachments: self.attachments.clone(),
            links: self.links.clone(),
        })
    }
}
