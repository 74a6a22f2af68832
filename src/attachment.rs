use crate::util::{first_str, json_u64};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use std::path::Path;

static YOUTUBE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:youtube\.com/(?:watch\?(?:.*&)?v=|embed/|shorts/|live/)|youtu\.be/)([A-Za-z0-9_-]{11})")
        .expect("valid youtube regex")
});

static DRIVE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:drive|docs)\.google\.com/(?:file/d/|document/d/|spreadsheets/d/|presentation/d/|open\?id=|uc\?(?:.*&)?id=)([A-Za-z0-9_-]{10,})")
        .expect("valid drive regex")
});

/// Broad category of an attachment, used for icons and preview decisions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    Pdf,
    Document,
    Spreadsheet,
    Presentation,
    Archive,
    Text,
    Link,
    YouTube,
    GoogleDrive,
    Other,
}

impl AttachmentKind {
    /// Guesses the kind from a file name's extension.
    pub fn from_file_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "svg" | "heic" => AttachmentKind::Image,
            "mp4" | "webm" | "mov" | "mkv" | "avi" | "m4v" => AttachmentKind::Video,
            "mp3" | "wav" | "ogg" | "m4a" | "aac" | "flac" | "weba" => AttachmentKind::Audio,
            "pdf" => AttachmentKind::Pdf,
            "doc" | "docx" | "odt" | "rtf" => AttachmentKind::Document,
            "xls" | "xlsx" | "ods" | "csv" => AttachmentKind::Spreadsheet,
            "ppt" | "pptx" | "odp" => AttachmentKind::Presentation,
            "zip" | "rar" | "7z" | "tar" | "gz" => AttachmentKind::Archive,
            "txt" | "md" => AttachmentKind::Text,
            _ => AttachmentKind::Other,
        }
    }

    /// Kind from a MIME type, falling back to the file name when the type is generic.
    pub fn from_mime(mime: &str, file_name: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("image/") {
            AttachmentKind::Image
        } else if mime.starts_with("video/") {
            AttachmentKind::Video
        } else if mime.starts_with("audio/") {
            AttachmentKind::Audio
        } else if mime == "application/pdf" {
            AttachmentKind::Pdf
        } else {
            AttachmentKind::from_file_name(file_name)
        }
    }

    /// Icon name shown next to the attachment (Font Awesome naming).
    pub fn icon(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "file-image",
            AttachmentKind::Video => "file-video",
            AttachmentKind::Audio => "file-audio",
            AttachmentKind::Pdf => "file-pdf",
            AttachmentKind::Document => "file-word",
            AttachmentKind::Spreadsheet => "file-excel",
            AttachmentKind::Presentation => "file-powerpoint",
            AttachmentKind::Archive => "file-archive",
            AttachmentKind::Text => "file-alt",
            AttachmentKind::Link => "link",
            AttachmentKind::YouTube => "youtube",
            AttachmentKind::GoogleDrive => "google-drive",
            AttachmentKind::Other => "file",
        }
    }

    /// Whether the attachment can be previewed inline (image viewer, audio/video player).
    pub fn is_previewable(&self) -> bool {
        matches!(
            self,
            AttachmentKind::Image
                | AttachmentKind::Video
                | AttachmentKind::Audio
                | AttachmentKind::Pdf
                | AttachmentKind::YouTube
        )
    }

    pub fn mime_type(&self, file_name: &str) -> &'static str {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "mp4" => "video/mp4",
            "webm" => "video/webm",
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "ogg" => "audio/ogg",
            "pdf" => "application/pdf",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            "txt" => "text/plain",
            "csv" => "text/csv",
            "zip" => "application/zip",
            _ => "application/octet-stream",
        }
    }
}

/// "1.5 MB" style sizes for attachment chips.
pub fn human_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

/// A file picked (or captured) locally and waiting to be uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl LocalAttachment {
    pub fn new(file_name: &str, bytes: Vec<u8>) -> Self {
        let kind = AttachmentKind::from_file_name(file_name);
        LocalAttachment {
            file_name: file_name.to_string(),
            mime_type: kind.mime_type(file_name).to_string(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, Box<dyn Error>> {
        let file_name = path
            .file_name()
            .and_then(std::ffi::OsStr::to_str)
            .ok_or("Invalid file name")?;
        let bytes = std::fs::read(path)?;
        Ok(LocalAttachment::new(file_name, bytes))
    }

    pub fn kind(&self) -> AttachmentKind {
        AttachmentKind::from_mime(&self.mime_type, &self.file_name)
    }

    pub fn size_label(&self) -> String {
        human_file_size(self.bytes.len() as u64)
    }
}

/// An attachment already stored on the server, as returned with posts and tasks.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RemoteAttachment {
    pub id: Option<u64>,
    pub name: String,
    pub url: String,
    pub kind: AttachmentKind,
}

impl RemoteAttachment {
    pub fn convert_json_to_attachment(base_url: &str, j: &Value) -> Option<RemoteAttachment> {
        let url = first_str(j, &["url", "file_url", "path", "file_path"])?;
        let name = first_str(j, &["name", "original_name", "file_name"]).unwrap_or_else(|| {
            url.rsplit('/').next().unwrap_or("attachment").to_string()
        });
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url
        } else {
            format!("{}/{}", base_url.trim_end_matches('/'), url.trim_start_matches('/'))
        };
        let kind = match j["mime_type"].as_str().or(j["type"].as_str()) {
            Some(mime) if mime.contains('/') => AttachmentKind::from_mime(mime, &name),
            _ => AttachmentKind::from_file_name(&name),
        };
        Some(RemoteAttachment {
            id: json_u64(&j["id"]),
            name,
            url,
            kind,
        })
    }
}

/// The three link flavours the upload endpoints distinguish.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Link,
    Youtube,
    Gdrive,
}

impl LinkKind {
    fn field_prefix(&self) -> &'static str {
        match self {
            LinkKind::Link => "link",
            LinkKind::Youtube => "youtube",
            LinkKind::Gdrive => "gdrive",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExternalLink {
    #[serde(rename = "type")]
    pub kind: LinkKind,
    pub url: String,
    pub name: String,
}

impl ExternalLink {
    /// Classifies a pasted URL. Returns `None` for anything that is not http(s).
    ///
    /// A scheme is added when the user pasted a bare host ("youtu.be/...").
    pub fn parse(raw: &str) -> Option<ExternalLink> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
            return None;
        }
        let url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else if trimmed.contains("://") || !trimmed.contains('.') {
            return None;
        } else {
            format!("https://{}", trimmed)
        };

        let kind = if YOUTUBE_ID.is_match(&url) {
            LinkKind::Youtube
        } else if DRIVE_ID.is_match(&url) {
            LinkKind::Gdrive
        } else {
            LinkKind::Link
        };
        let name = match kind {
            LinkKind::Youtube => "YouTube Video".to_string(),
            LinkKind::Gdrive => "Google Drive File".to_string(),
            LinkKind::Link => url
                .split("://")
                .nth(1)
                .and_then(|rest| rest.split('/').next())
                .unwrap_or(&url)
                .to_string(),
        };
        Some(ExternalLink { kind, url, name })
    }

    pub fn attachment_kind(&self) -> AttachmentKind {
        match self.kind {
            LinkKind::Link => AttachmentKind::Link,
            LinkKind::Youtube => AttachmentKind::YouTube,
            LinkKind::Gdrive => AttachmentKind::GoogleDrive,
        }
    }
}

pub fn youtube_video_id(url: &str) -> Option<String> {
    YOUTUBE_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Embeddable player URL for the inline video preview.
pub fn youtube_embed_url(url: &str) -> Option<String> {
    youtube_video_id(url).map(|id| format!("https://www.youtube.com/embed/{}", id))
}

pub fn youtube_thumbnail_url(url: &str) -> Option<String> {
    youtube_video_id(url).map(|id| format!("https://img.youtube.com/vi/{}/hqdefault.jpg", id))
}

pub fn gdrive_file_id(url: &str) -> Option<String> {
    DRIVE_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn gdrive_preview_url(url: &str) -> Option<String> {
    gdrive_file_id(url).map(|id| format!("https://drive.google.com/file/d/{}/preview", id))
}

/// Multipart field name of the `index`-th file: `attachment`, `attachment1`, `attachment2`, ...
pub fn attachment_field_name(index: usize) -> String {
    if index == 0 {
        "attachment".to_string()
    } else {
        format!("attachment{}", index)
    }
}

/// Multipart field names for links, numbered from 0 per kind (`link_0`, `youtube_0`, `link_1`, ...).
pub fn link_field_names(links: &[ExternalLink]) -> Vec<String> {
    let mut counters = [0usize; 3];
    links
        .iter()
        .map(|link| {
            let slot = match link.kind {
                LinkKind::Link => 0,
                LinkKind::Youtube => 1,
                LinkKind::Gdrive => 2,
            };
            let name = format!("{}_{}", link.kind.field_prefix(), counters[slot]);
            counters[slot] += 1;
            name
        })
        .collect()
}

/// Plan of the multipart fields an upload will carry, independent of reqwest.
#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    Text(String, String),
    File {
        field: String,
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
}

/// Lays out text fields, files and links using the SCMS field conventions.
pub fn plan_form_fields(
    text: &[(String, String)],
    files: &[LocalAttachment],
    links: &[ExternalLink],
) -> Vec<FormField> {
    let mut fields: Vec<FormField> = text
        .iter()
        .map(|(k, v)| FormField::Text(k.clone(), v.clone()))
        .collect();

    for (index, file) in files.iter().enumerate() {
        fields.push(FormField::File {
            field: attachment_field_name(index),
            file_name: file.file_name.clone(),
            mime_type: file.mime_type.clone(),
            bytes: file.bytes.clone(),
        });
    }

    if !links.is_empty() {
        for (name, link) in link_field_names(links).into_iter().zip(links) {
            fields.push(FormField::Text(name, link.url.clone()));
        }
        let external: Vec<Value> = links
            .iter()
            .map(|l| json!({ "type": l.kind, "url": l.url, "name": l.name }))
            .collect();
        fields.push(FormField::Text(
            "external_links".to_string(),
            Value::Array(external).to_string(),
        ));
    }
    fields
}

/// Turns a field plan into a reqwest multipart form.
pub fn build_form(fields: Vec<FormField>) -> Result<Form, Box<dyn Error>> {
    let mut form = Form::new();
    for field in fields {
        form = match field {
            FormField::Text(key, value) => form.text(key, value),
            FormField::File {
                field,
                file_name,
                mime_type,
                bytes,
            } => form.part(
                field,
                Part::bytes(bytes).file_name(file_name).mime_str(&mime_type)?,
            ),
        };
    }
    Ok(form)
}
