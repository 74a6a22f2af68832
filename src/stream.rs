// Import necessary crates and modules
use crate::attachment::{ExternalLink, LocalAttachment, RemoteAttachment};
use crate::task::{read_links, PublishStatus};
use crate::util::{first_str, json_bool, json_datetime, json_u64, format_relative_time};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// A comment on a stream post or on a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Comment {
    pub id: u64,
    pub author_id: Option<u64>,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub edited: bool,
}

impl Comment {
    pub fn convert_json_to_comment(j: &Value) -> Option<Comment> {
        let id = json_u64(&j["id"])?;
        let content = first_str(j, &["content", "comment", "text"])?;
        let author = &j["user"];
        let author_name = first_str(j, &["author_name", "user_name"])
            .or_else(|| first_str(author, &["name", "full_name"]))
            .unwrap_or_else(|| "Unknown".to_string());
        let created_at = json_datetime(&j["created_at"]);
        let updated_at = json_datetime(&j["updated_at"]);
        Some(Comment {
            id,
            author_id: json_u64(&j["user_id"]).or_else(|| json_u64(&author["id"])),
            author_name,
            author_avatar: first_str(j, &["author_avatar", "profile_pic"])
                .or_else(|| first_str(author, &["profile_pic", "avatar"])),
            content,
            created_at,
            edited: json_bool(&j["edited"])
                .unwrap_or(matches!((created_at, updated_at), (Some(c), Some(u)) if u > c)),
        })
    }

    pub fn posted_label(&self, now: DateTime<Utc>) -> String {
        match self.created_at {
            Some(at) => format_relative_time(at, now),
            None => String::new(),
        }
    }
}

pub fn convert_json_to_comments(value: &Value) -> Vec<Comment> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Comment::convert_json_to_comment).collect())
        .unwrap_or_default()
}

/// A post in the classroom stream (announcement, draft or scheduled post).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct StreamPost {
    pub id: u64,
    pub title: Option<String>,
    pub content: String,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub status: PublishStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub is_pinned: bool,
    pub allow_comments: bool,
    pub attachments: Vec<RemoteAttachment>,
    pub links: Vec<ExternalLink>,
    pub reactions: HashMap<String, u32>,
    pub my_reaction: Option<String>,
    pub comment_count: usize,
}

impl StreamPost {
    /// Converts a stream post from the API, tolerating the field spellings of
    /// the teacher, draft, scheduled and student endpoints.
    pub fn convert_json_to_post(base_url: &str, j: &Value) -> Option<StreamPost> {
        let id = json_u64(&j["id"])?;
        let content = first_str(j, &["content", "message", "body"]).unwrap_or_default();
        let title = first_str(j, &["title"]);
        let author = &j["user"];
        let mut attachments: Vec<RemoteAttachment> = j["attachments"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|a| RemoteAttachment::convert_json_to_attachment(base_url, a))
                    .collect()
            })
            .unwrap_or_default();
        // Older posts carry a single attachment in flat fields.
        if attachments.is_empty() && j["attachment_url"].is_string() {
            let flat = json!({
                "url": j["attachment_url"],
                "name": j["attachment_name"],
                "type": j["attachment_type"],
            });
            attachments.extend(RemoteAttachment::convert_json_to_attachment(base_url, &flat));
        }
        let links = read_links(j);
        if content.is_empty() && title.is_none() && attachments.is_empty() && links.is_empty() {
            return None;
        }
        let reactions = j["reactions"]
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_u64().map(|n| (k.clone(), n as u32)))
                    .collect()
            })
            .unwrap_or_default();
        let comment_count = j["comments_count"]
            .as_u64()
            .map(|n| n as usize)
            .or_else(|| j["comments"].as_array().map(Vec::len))
            .unwrap_or(0);

        Some(StreamPost {
            id,
            title,
            content,
            author_name: first_str(j, &["author_name", "teacher_name"])
                .or_else(|| first_str(author, &["name", "full_name"]))
                .unwrap_or_else(|| "Unknown".to_string()),
            author_avatar: first_str(j, &["author_avatar", "profile_pic"])
                .or_else(|| first_str(author, &["profile_pic", "avatar"])),
            status: first_str(j, &["status"])
                .map(|s| PublishStatus::parse(&s))
                .unwrap_or(if json_bool(&j["is_draft"]).unwrap_or(false) {
                    PublishStatus::Draft
                } else if j["scheduled_at"].is_string() {
                    PublishStatus::Scheduled
                } else {
                    PublishStatus::Published
                }),
            scheduled_at: json_datetime(&j["scheduled_at"]),
            created_at: json_datetime(&j["created_at"]),
            is_pinned: json_bool(&j["is_pinned"]).unwrap_or(false),
            allow_comments: json_bool(&j["allow_comments"]).unwrap_or(true),
            attachments,
            links,
            reactions,
            my_reaction: first_str(j, &["my_reaction", "user_reaction"]),
            comment_count,
        })
    }

    pub fn total_reactions(&self) -> u32 {
        self.reactions.values().sum()
    }

    /// Applies the viewer's reaction locally: toggles it off when repeated,
    /// moves the count when switching to a different reaction.
    pub fn toggle_reaction(&mut self, reaction: &str) {
        if let Some(previous) = self.my_reaction.take() {
            if let Some(count) = self.reactions.get_mut(&previous) {
                *count = count.saturating_sub(1);
            }
            self.reactions.retain(|_, n| *n > 0);
            if previous == reaction {
                return;
            }
        }
        *self.reactions.entry(reaction.to_string()).or_insert(0) += 1;
        self.my_reaction = Some(reaction.to_string());
    }
}

pub fn convert_json_to_posts(base_url: &str, value: &Value) -> Vec<StreamPost> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|p| StreamPost::convert_json_to_post(base_url, p))
                .collect()
        })
        .unwrap_or_default()
}

/// Payload for a new stream post, draft or scheduled post.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewStreamPost {
    pub title: Option<String>,
    pub content: String,
    pub status: PublishStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub allow_comments: bool,
    pub attachments: Vec<LocalAttachment>,
    pub links: Vec<ExternalLink>,
}

impl NewStreamPost {
    pub fn text_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("content".to_string(), self.content.clone()),
            (
                "is_draft".to_string(),
                if self.status == PublishStatus::Draft { "1" } else { "0" }.to_string(),
            ),
            (
                "allow_comments".to_string(),
                if self.allow_comments { "1" } else { "0" }.to_string(),
            ),
        ];
        if let Some(title) = &self.title {
            fields.push(("title".to_string(), title.clone()));
        }
        if let Some(at) = self.scheduled_at {
            fields.push(("is_scheduled".to_string(), "1".to_string()));
            fields.push(("scheduled_at".to_string(), at.to_rfc3339()));
        }
        fields
    }

    pub fn to_json(&self) -> Value {
        json!({
            "title": self.title,
            "content": self.content,
            "is_draft": self.status == PublishStatus::Draft,
            "is_scheduled": self.scheduled_at.is_some(),
            "scheduled_at": self.scheduled_at.map(|d| d.to_rfc3339()),
            "allow_comments": self.allow_comments,
            "external_links": self.links,
        })
    }

    pub fn has_uploads(&self) -> bool {
        !self.attachments.is_empty()
    }
}
