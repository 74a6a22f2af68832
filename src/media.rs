//! Camera capture, QR payloads and inline media previews.
//!
//! The device APIs stay with the front end: it hands over the captured frame
//! bytes or the decoded QR text, and these helpers turn them into attachments,
//! links or class codes.
use crate::attachment::{
    gdrive_preview_url, youtube_embed_url, AttachmentKind, ExternalLink, LinkKind,
    LocalAttachment, RemoteAttachment,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static CLASS_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{6,8}$").expect("valid class code regex"));

static JOIN_URL_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:/join/|[?&](?:code|class_code)=)([A-Za-z0-9]{6,8})(?:[/?&#]|$)")
        .expect("valid join url regex")
});

/// JPEG magic bytes.
const JPEG_SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Wraps a frame taken with the camera as an attachment ready for upload.
///
/// The name encodes the capture time (`camera_20250310_081500.jpg`); PNG
/// frames keep a `.png` extension. Empty or unrecognised frames are rejected.
pub fn captured_photo(bytes: Vec<u8>, taken_at: DateTime<Utc>) -> Result<LocalAttachment, String> {
    let extension = if bytes.starts_with(&JPEG_SOI) {
        "jpg"
    } else if bytes.starts_with(&PNG_SIGNATURE) {
        "png"
    } else {
        return Err("Captured frame is not a JPEG or PNG image".to_string());
    };
    let name = format!("camera_{}.{}", taken_at.format("%Y%m%d_%H%M%S"), extension);
    Ok(LocalAttachment::new(&name, bytes))
}

/// Recorded audio/video clip from the media recorder (WebM container).
pub fn captured_recording(
    bytes: Vec<u8>,
    taken_at: DateTime<Utc>,
    video: bool,
) -> Result<LocalAttachment, String> {
    if bytes.is_empty() {
        return Err("Recording is empty".to_string());
    }
    let prefix = if video { "video" } else { "audio" };
    let name = format!("{}_{}.webm", prefix, taken_at.format("%Y%m%d_%H%M%S"));
    let mut attachment = LocalAttachment::new(&name, bytes);
    attachment.mime_type = format!("{}/webm", prefix);
    Ok(attachment)
}

/// What a scanned QR code turned out to contain.
#[derive(Debug, Clone, PartialEq)]
pub enum QrPayload {
    ClassCode(String),
    Link(ExternalLink),
    Text(String),
}

/// Interprets decoded QR text.
///
/// Bare 6-8 character codes and SCMS join URLs (`.../join/ABC123`,
/// `...?code=ABC123`) yield a class code (uppercased); other URLs become
/// links that can be attached to a post; anything else is plain text.
pub fn interpret_qr_payload(text: &str) -> Option<QrPayload> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if CLASS_CODE.is_match(text) {
        return Some(QrPayload::ClassCode(text.to_uppercase()));
    }
    if let Some(code) = JOIN_URL_CODE.captures(text).and_then(|c| c.get(1)) {
        return Some(QrPayload::ClassCode(code.as_str().to_uppercase()));
    }
    match ExternalLink::parse(text) {
        Some(link) if text.contains("://") => Some(QrPayload::Link(link)),
        _ => Some(QrPayload::Text(text.to_string())),
    }
}

/// How an attachment should be shown inline.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaPreview {
    Image { src: String },
    Audio { src: String },
    Video { src: String },
    Pdf { src: String },
    Embed { src: String },
    None,
}

pub fn preview_for_attachment(attachment: &RemoteAttachment) -> MediaPreview {
    let src = attachment.url.clone();
    match attachment.kind {
        AttachmentKind::Image => MediaPreview::Image { src },
        AttachmentKind::Audio => MediaPreview::Audio { src },
        AttachmentKind::Video => MediaPreview::Video { src },
        AttachmentKind::Pdf => MediaPreview::Pdf { src },
        _ => MediaPreview::None,
    }
}

pub fn preview_for_link(link: &ExternalLink) -> MediaPreview {
    let embed = match link.kind {
        LinkKind::Youtube => youtube_embed_url(&link.url),
        LinkKind::Gdrive => gdrive_preview_url(&link.url),
        LinkKind::Link => None,
    };
    embed.map_or(MediaPreview::None, |src| MediaPreview::Embed { src })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn taken() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 8, 15, 0).unwrap()
    }

    #[test]
    fn test_captured_photo_naming() {
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0];
        let photo = captured_photo(jpeg, taken()).unwrap();
        assert_eq!(photo.file_name, "camera_20250310_081500.jpg");
        assert_eq!(photo.mime_type, "image/jpeg");
        assert_eq!(photo.kind(), AttachmentKind::Image);

        let png = PNG_SIGNATURE.to_vec();
        assert_eq!(captured_photo(png, taken()).unwrap().file_name, "camera_20250310_081500.png");

        assert!(captured_photo(vec![1, 2, 3], taken()).is_err());
        assert!(captured_photo(Vec::new(), taken()).is_err());
    }

    #[test]
    fn test_captured_recording() {
        let clip = captured_recording(vec![0x1A, 0x45], taken(), false).unwrap();
        assert_eq!(clip.file_name, "audio_20250310_081500.webm");
        assert_eq!(clip.kind(), AttachmentKind::Audio);
        let video = captured_recording(vec![0x1A], taken(), true).unwrap();
        assert_eq!(video.kind(), AttachmentKind::Video);
        assert!(captured_recording(Vec::new(), taken(), true).is_err());
    }

    #[test]
    fn test_qr_payloads() {
        assert_eq!(
            interpret_qr_payload(" ab12cd "),
            Some(QrPayload::ClassCode("AB12CD".into()))
        );
        assert_eq!(
            interpret_qr_payload("https://scms.example.edu/join/XYZ789"),
            Some(QrPayload::ClassCode("XYZ789".into()))
        );
        assert_eq!(
            interpret_qr_payload("https://scms.example.edu/student?code=QWE123&x=1"),
            Some(QrPayload::ClassCode("QWE123".into()))
        );
        match interpret_qr_payload("https://youtu.be/dQw4w9WgXcQ") {
            Some(QrPayload::Link(link)) => assert_eq!(link.kind, LinkKind::Youtube),
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(
            interpret_qr_payload("Room 204, bring calculators"),
            Some(QrPayload::Text("Room 204, bring calculators".into()))
        );
        assert_eq!(interpret_qr_payload("   "), None);
    }

    #[test]
    fn test_previews() {
        let audio = RemoteAttachment {
            id: None,
            name: "speech.mp3".into(),
            url: "https://scms.example.edu/storage/speech.mp3".into(),
            kind: AttachmentKind::Audio,
        };
        assert_eq!(
            preview_for_attachment(&audio),
            MediaPreview::Audio { src: audio.url.clone() }
        );
        let link = ExternalLink::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(
            preview_for_link(&link),
            MediaPreview::Embed { src: "https://www.youtube.com/embed/dQw4w9WgXcQ".into() }
        );
        let plain = ExternalLink::parse("https://example.org").unwrap();
        assert_eq!(preview_for_link(&plain), MediaPreview::None);
    }
}
