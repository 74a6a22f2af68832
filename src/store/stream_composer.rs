use super::ComposerError;
use crate::attachment::{ExternalLink, LocalAttachment};
use crate::stream::{NewStreamPost, StreamPost};
use crate::task::PublishStatus;
use chrono::{DateTime, Utc};

/// What the composer's send button does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostMode {
    #[default]
    Publish,
    Draft,
    Schedule,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamComposerAction {
    SetTitle(String),
    SetContent(String),
    AddAttachment(LocalAttachment),
    RemoveAttachment(usize),
    /// Raw URL typed in the link box; rejected URLs set `error`.
    AddLink(String),
    RemoveLink(usize),
    SetAllowComments(bool),
    SetMode(PostMode),
    SetSchedule(Option<DateTime<Utc>>),
    /// Loads an existing draft for editing.
    EditDraft(StreamPost),
    SubmitStarted,
    SubmitSucceeded,
    SubmitFailed(String),
    Reset,
}

/// State of the stream "announce something" form.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamComposer {
    pub title: String,
    pub content: String,
    pub attachments: Vec<LocalAttachment>,
    pub links: Vec<ExternalLink>,
    pub allow_comments: bool,
    pub mode: PostMode,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Id of the draft being edited, if any.
    pub editing_draft: Option<u64>,
    pub submitting: bool,
    pub error: Option<String>,
}

impl Default for StreamComposer {
    fn default() -> Self {
        StreamComposer {
            title: String::new(),
            content: String::new(),
            attachments: Vec::new(),
            links: Vec::new(),
            allow_comments: true,
            mode: PostMode::Publish,
            scheduled_at: None,
            editing_draft: None,
            submitting: false,
            error: None,
        }
    }
}

impl StreamComposer {
    pub fn reduce(&mut self, action: StreamComposerAction) {
        match action {
            StreamComposerAction::SetTitle(title) => self.title = title,
            StreamComposerAction::SetContent(content) => self.content = content,
            StreamComposerAction::AddAttachment(file) => self.attachments.push(file),
            StreamComposerAction::RemoveAttachment(index) => {
                if index < self.attachments.len() {
                    self.attachments.remove(index);
                }
            }
            StreamComposerAction::AddLink(raw) => match ExternalLink::parse(&raw) {
                Some(link) => {
                    if !self.links.iter().any(|l| l.url == link.url) {
                        self.links.push(link);
                    }
                    self.error = None;
                }
                None => self.error = Some(ComposerError::InvalidLink(raw).to_string()),
            },
            StreamComposerAction::RemoveLink(index) => {
                if index < self.links.len() {
                    self.links.remove(index);
                }
            }
            StreamComposerAction::SetAllowComments(allow) => self.allow_comments = allow,
            StreamComposerAction::SetMode(mode) => {
                self.mode = mode;
                if mode != PostMode::Schedule {
                    self.scheduled_at = None;
                }
            }
            StreamComposerAction::SetSchedule(at) => {
                self.scheduled_at = at;
                if at.is_some() {
                    self.mode = PostMode::Schedule;
                }
            }
            StreamComposerAction::EditDraft(post) => {
                *self = StreamComposer {
                    title: post.title.unwrap_or_default(),
                    content: post.content,
                    links: post.links,
                    allow_comments: post.allow_comments,
                    mode: PostMode::Draft,
                    editing_draft: Some(post.id),
                    ..StreamComposer::default()
                };
            }
            StreamComposerAction::SubmitStarted => {
                self.submitting = true;
                self.error = None;
            }
            StreamComposerAction::SubmitSucceeded => *self = StreamComposer::default(),
            StreamComposerAction::SubmitFailed(message) => {
                self.submitting = false;
                self.error = Some(message);
            }
            StreamComposerAction::Reset => *self = StreamComposer::default(),
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty() || !self.attachments.is_empty() || !self.links.is_empty()
    }

    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ComposerError> {
        if self.submitting {
            return Err(ComposerError::AlreadySubmitting);
        }
        if !self.has_content() {
            return Err(ComposerError::EmptyContent);
        }
        if self.editing_draft.is_some() && !self.attachments.is_empty() {
            return Err(ComposerError::DraftUploadsUnsupported);
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

    /// Builds the request payload, or the reason the form cannot be sent yet.
    pub fn to_submission(&self, now: DateTime<Utc>) -> Result<NewStreamPost, ComposerError> {
        self.validate(now)?;
        let title = self.title.trim();
        Ok(NewStreamPost {
            title: if title.is_empty() { None } else { Some(title.to_string()) },
            content: self.content.trim().to_string(),
            status: match self.mode {
                PostMode::Publish => PublishStatus::Published,
                PostMode::Draft => PublishStatus::Draft,
                PostMode::Schedule => PublishStatus::Scheduled,
            },
            scheduled_at: if self.mode == PostMode::Schedule { self.scheduled_at } else { None },
            allow_comments: self.allow_comments,
            attachments: self.attachments.clone(),
            links: self.links.clone(),
        })
    }
}
