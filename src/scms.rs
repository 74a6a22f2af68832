use crate::attachment::{build_form, plan_form_fields, ExternalLink, LocalAttachment};
use crate::classroom::{Classroom, ClassroomInfo};
use crate::connection::{
    request_json, send_http_request, send_multipart_request, server_message, unwrap_data,
    ApiError, HttpMethod,
};
use crate::gradebook::{class_name_from_grades, convert_json_to_grade_records};
use crate::stream::{convert_json_to_comments, convert_json_to_posts, Comment, NewStreamPost, StreamPost};
use crate::student::{convert_json_to_students, Student, StudentGradeRecord};
use crate::task::{NewTask, Task};
use crate::util::{first_str, json_u64};
use crate::ScmsCredentials;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use log::{debug, info};
use reqwest::blocking::Response;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use std::sync::{Arc, Mutex};

/// Enum to represent the result of fetching the teacher's classrooms.
pub enum ScmsResultClassrooms {
    Ok(Vec<Classroom>),     // Success case with every classroom the teacher owns.
    ErrConnection(String),  // The server could not be reached or answered garbage.
    ErrCredentials(String), // The token was rejected.
}

/// Enum to represent the result of fetching a single classroom by code.
pub enum ScmsResultSingleClassroom {
    Ok(Classroom),
    ErrConnection(String),
    ErrCredentials(String),
}

/// Main entry point to the SCMS API.
///
/// Example:
/// ```no_run
/// use scms_connector::{Scms, ScmsCredentials, ScmsResultClassrooms};
/// let credentials = ScmsCredentials::new("https://scms.example.edu", "token");
/// match Scms::fetch_classrooms_with_credentials(&credentials) {
///     ScmsResultClassrooms::Ok(classrooms) => println!("{} classrooms", classrooms.len()),
///     ScmsResultClassrooms::ErrConnection(err) => eprintln!("Connection error: {}", err),
///     ScmsResultClassrooms::ErrCredentials(err) => eprintln!("Credentials error: {}", err),
/// }
/// ```
pub struct Scms {}

/// The logged-in account, as returned by `GET /api/user`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct UserProfile {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Option<String>,
    pub avatar: Option<String>,
}

impl UserProfile {
    pub fn convert_json_to_user(j: &Value) -> Option<UserProfile> {
        let j = if j["user"].is_object() { &j["user"] } else { j };
        Some(UserProfile {
            id: json_u64(&j["id"])?,
            name: first_str(j, &["name", "full_name"])?,
            email: first_str(j, &["email"]).unwrap_or_default(),
            role: first_str(j, &["role", "user_type"]),
            avatar: first_str(j, &["profile_pic", "avatar"]),
        })
    }

    pub fn is_teacher(&self) -> bool {
        self.role.as_deref().map_or(false, |r| r.eq_ignore_ascii_case("teacher"))
    }
}

/// Light classroom record used for the student class list and the local cache.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ClassroomSummary {
    pub id: u64,
    pub name: String,
    pub code: String,
    pub section: Option<String>,
    pub subject: Option<String>,
    pub teacher_name: Option<String>,
}

impl ClassroomSummary {
    pub fn convert_json_to_summary(j: &Value) -> Option<ClassroomSummary> {
        let j = if j["classroom"].is_object() { &j["classroom"] } else { j };
        Some(ClassroomSummary {
            id: json_u64(&j["id"])?,
            name: first_str(j, &["name", "class_name"])?,
            code: first_str(j, &["code", "class_code", "classroom_code"])?,
            section: first_str(j, &["section"]),
            subject: first_str(j, &["subject"]),
            teacher_name: first_str(j, &["teacher_name"])
                .or_else(|| first_str(&j["teacher"], &["name"])),
        })
    }
}

/// What the server reported back for an invite batch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct InviteOutcome {
    pub invited: Vec<String>,
    pub rejected: Vec<String>,
    pub message: Option<String>,
}

impl InviteOutcome {
    /// Reads `invited` / `failed` lists; when the server omits them every submitted address counts as invited.
    fn convert_json_to_outcome(j: &Value, submitted: &[String]) -> InviteOutcome {
        let list = |keys: &[&str]| -> Option<Vec<String>> {
            keys.iter().find_map(|k| {
                j[*k].as_array().map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(String::from).or_else(|| first_str(v, &["email"])))
                        .collect()
                })
            })
        };
        InviteOutcome {
            invited: list(&["invited", "sent"]).unwrap_or_else(|| submitted.to_vec()),
            rejected: list(&["failed", "rejected", "already_enrolled"]).unwrap_or_default(),
            message: server_message(j),
        }
    }
}

/// Grades payload of a classroom: the class name when sent, plus one record per student.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassroomGrades {
    pub class_name: Option<String>,
    pub records: Vec<StudentGradeRecord>,
}

impl Scms {
    /// Fetches every classroom owned by the authenticated teacher.
    pub fn fetch_classrooms_with_credentials(info: &ScmsCredentials) -> ScmsResultClassrooms {
        let credentials = Arc::new(info.clone());
        match get_teacher_classrooms(&credentials) {
            Ok(classrooms) => ScmsResultClassrooms::Ok(classrooms),
            Err(e) => match failure_kind("Failed to fetch classrooms", e.as_ref()) {
                FailureKind::Credentials(msg) => ScmsResultClassrooms::ErrCredentials(msg),
                FailureKind::Connection(msg) => ScmsResultClassrooms::ErrConnection(msg),
            },
        }
    }

    /// Fetches one classroom by its class code.
    pub fn fetch_single_classroom_with_credentials(
        info: &ScmsCredentials,
        code: &str,
    ) -> ScmsResultSingleClassroom {
        let credentials = Arc::new(info.clone());
        match get_classroom_by_code(&credentials, code) {
            Ok(classroom) => ScmsResultSingleClassroom::Ok(classroom),
            Err(e) => match failure_kind(&format!("Failed to fetch classroom {}", code), e.as_ref()) {
                FailureKind::Credentials(msg) => ScmsResultSingleClassroom::ErrCredentials(msg),
                FailureKind::Connection(msg) => ScmsResultSingleClassroom::ErrConnection(msg),
            },
        }
    }

    /// Converts a classroom object into a `Classroom` bound to `credentials`.
    pub(crate) fn convert_json_to_classroom(
        credentials: &Arc<ScmsCredentials>,
        j: &Value,
    ) -> Option<Classroom> {
        let summary = ClassroomSummary::convert_json_to_summary(j)?;
        Some(Classroom {
            info: Arc::new(ClassroomInfo {
                id: summary.id,
                name: summary.name,
                code: summary.code,
                section: summary.section,
                subject: summary.subject,
                credentials: Arc::clone(credentials),
                students_cache: Mutex::new(Vec::new()),
                tasks_cache: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn choose_classroom() -> Option<Classroom> {
        let credentials = ScmsCredentials::credentials();
        println!("Fetching classrooms...");
        let classrooms = match Scms::fetch_classrooms_with_credentials(&credentials) {
            ScmsResultClassrooms::Ok(classrooms) => classrooms,
            ScmsResultClassrooms::ErrConnection(msg) => {
                eprintln!("Connection error: {}", msg);
                std::process::exit(1);
            }
            ScmsResultClassrooms::ErrCredentials(msg) => {
                eprintln!("Credential error: {}", msg);
                std::process::exit(1);
            }
        };

        let mut menu_str: Vec<String> = classrooms.iter().map(|c| c.menu_label()).collect();
        // Add EXIT at the end of the list
        menu_str.push("EXIT".to_string());

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Choose a classroom")
            .items(&menu_str)
            .default(0)
            .interact()
            .ok()?;

        if selection == menu_str.len() - 1 {
            return None;
        }
        classrooms.into_iter().nth(selection)
    }
}

enum FailureKind {
    Credentials(String),
    Connection(String),
}

/// Sorts a fetch error into the result enum variants; `context` prefixes the message.
fn failure_kind(context: &str, e: &(dyn Error + 'static)) -> FailureKind {
    match e.downcast_ref::<ApiError>() {
        Some(api) if api.is_unauthorized() => FailureKind::Credentials(format!("{}: {}", context, api)),
        _ => FailureKind::Connection(format!("{}: {}", context, e)),
    }
}

/// Endpoint paths, relative to the deployment root.
mod paths {
    pub const CURRENT_USER: &str = "/api/user";
    pub const TEACHER_CLASSROOMS: &str = "/api/teacher/classrooms";
    pub const TEACHER_TASKS: &str = "/api/teacher/tasks";
    pub const CREATE_TASK: &str = "/api/teacher/tasks/create";
    pub const STUDENT_CLASSES: &str = "/api/student/classes";
    pub const JOIN_CLASSROOM: &str = "/api/student/join";

    pub fn classroom(code: &str) -> String {
        format!("/api/teacher/classroom/{}", code)
    }

    pub fn students(code: &str) -> String {
        format!("{}/students", classroom(code))
    }

    pub fn invite(code: &str) -> String {
        format!("{}/invite", classroom(code))
    }

    pub fn grades(code: &str) -> String {
        format!("{}/grades", classroom(code))
    }

    pub fn task(id: u64) -> String {
        format!("{}/{}", TEACHER_TASKS, id)
    }

    pub fn task_comments(id: u64) -> String {
        format!("{}/comments", task(id))
    }

    pub fn stream(code: &str) -> String {
        format!("{}/stream", classroom(code))
    }

    pub fn stream_post(code: &str, post_id: u64) -> String {
        format!("{}/{}", stream(code), post_id)
    }

    pub fn stream_drafts(code: &str) -> String {
        format!("{}/drafts", stream(code))
    }

    pub fn stream_draft(code: &str, draft_id: u64) -> String {
        format!("{}/{}", stream_drafts(code), draft_id)
    }

    pub fn stream_scheduled(code: &str) -> String {
        format!("{}/scheduled", stream(code))
    }

    pub fn stream_reaction(code: &str, post_id: u64) -> String {
        format!("{}/react", stream_post(code, post_id))
    }

    pub fn stream_comments(code: &str, post_id: u64) -> String {
        format!("{}/comments", stream_post(code, post_id))
    }

    pub fn stream_comment(code: &str, post_id: u64, comment_id: u64) -> String {
        format!("{}/{}", stream_comments(code, post_id), comment_id)
    }

    pub fn student_stream(code: &str) -> String {
        format!("/api/student/classroom/{}/stream", code)
    }
}

/// Returns `value[key]` when it holds an object, otherwise `value` itself.
///
/// Create and update endpoints answer with the record alone or nested
/// (`{ "task": {...} }`, `{ "post": {...} }`).
fn nested<'a>(value: &'a Value, key: &str) -> &'a Value {
    if value[key].is_object() {
        &value[key]
    } else {
        value
    }
}

/// List payloads come bare or under a named key (`{ "tasks": [...] }`).
fn list<'a>(value: &'a Value, key: &str) -> &'a Value {
    if value[key].is_array() {
        &value[key]
    } else {
        value
    }
}

fn read_full_json(url: &str, response: Response) -> Result<Value, Box<dyn Error>> {
    let text = response.text()?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text)
        .map_err(|e| format!("Failed to parse response from {}: {}", url, e).into())
}

/// Generic GET of an ad hoc API path, `data` envelope removed.
pub fn get(
    credentials: &ScmsCredentials,
    path: &str,
    params: Vec<(String, String)>,
) -> Result<Value, Box<dyn Error>> {
    request_json(HttpMethod::Get, &credentials.api_url(path), credentials, params)
}

/// Generic JSON POST of an ad hoc API path, `data` envelope removed.
pub fn post(credentials: &ScmsCredentials, path: &str, body: Value) -> Result<Value, Box<dyn Error>> {
    request_json(HttpMethod::Post(body), &credentials.api_url(path), credentials, vec![])
}

fn put(credentials: &ScmsCredentials, path: &str, body: Value) -> Result<Value, Box<dyn Error>> {
    request_json(HttpMethod::Put(body), &credentials.api_url(path), credentials, vec![])
}

fn delete(credentials: &ScmsCredentials, path: &str) -> Result<(), Box<dyn Error>> {
    send_http_request(HttpMethod::Delete, &credentials.api_url(path), credentials, vec![])?;
    Ok(())
}

fn post_multipart(
    credentials: &ScmsCredentials,
    path: &str,
    text: &[(String, String)],
    files: &[LocalAttachment],
    links: &[ExternalLink],
) -> Result<Value, Box<dyn Error>> {
    let url = credentials.api_url(path);
    let form = build_form(plan_form_fields(text, files, links))?;
    debug!(
        "multipart upload to {}: {} files, {} links",
        url,
        files.len(),
        links.len()
    );
    let response = send_multipart_request(&url, credentials, form)?;
    Ok(unwrap_data(read_full_json(&url, response)?))
}

pub fn get_current_user(credentials: &ScmsCredentials) -> Result<UserProfile, Box<dyn Error>> {
    let value = get(credentials, paths::CURRENT_USER, vec![])?;
    UserProfile::convert_json_to_user(&value).ok_or_else(|| "Failed to parse user data".into())
}

pub fn get_classroom_by_code(
    credentials: &Arc<ScmsCredentials>,
    code: &str,
) -> Result<Classroom, Box<dyn Error>> {
    let value = get(credentials, &paths::classroom(code), vec![])?;
    Scms::convert_json_to_classroom(credentials, &value)
        .ok_or_else(|| format!("Failed to parse classroom {}", code).into())
}

pub fn get_teacher_classrooms(credentials: &Arc<ScmsCredentials>) -> Result<Vec<Classroom>, Box<dyn Error>> {
    let value = get(credentials, paths::TEACHER_CLASSROOMS, vec![])?;
    let classrooms: Vec<Classroom> = list(&value, "classrooms")
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|c| Scms::convert_json_to_classroom(credentials, c))
                .collect()
        })
        .unwrap_or_default();
    info!("fetched {} classrooms", classrooms.len());
    Ok(classrooms)
}

pub fn get_classroom_students(
    credentials: &ScmsCredentials,
    code: &str,
) -> Result<Vec<Student>, Box<dyn Error>> {
    let value = get(credentials, &paths::students(code), vec![])?;
    Ok(convert_json_to_students(list(&value, "students")))
}

pub fn invite_students(
    credentials: &ScmsCredentials,
    code: &str,
    emails: &[String],
) -> Result<InviteOutcome, Box<dyn Error>> {
    let url = credentials.api_url(&paths::invite(code));
    let response = send_http_request(
        HttpMethod::Post(json!({ "emails": emails })),
        &url,
        credentials,
        vec![],
    )?;
    let value = read_full_json(&url, response)?;
    let outcome = InviteOutcome::convert_json_to_outcome(nested(&value, "data"), emails);
    info!("invited {} students to {}", outcome.invited.len(), code);
    Ok(InviteOutcome {
        message: outcome.message.or_else(|| server_message(&value)),
        ..outcome
    })
}

pub fn get_teacher_tasks(credentials: &ScmsCredentials, code: &str) -> Result<Vec<Task>, Box<dyn Error>> {
    let value = get(
        credentials,
        paths::TEACHER_TASKS,
        vec![("classroom_code".to_string(), code.to_string())],
    )?;
    Ok(list(&value, "tasks")
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|t| Task::convert_json_to_task(&credentials.url_scms, t))
                .collect()
        })
        .unwrap_or_default())
}

fn parse_task(credentials: &ScmsCredentials, value: &Value) -> Result<Task, Box<dyn Error>> {
    Task::convert_json_to_task(&credentials.url_scms, nested(value, "task"))
        .ok_or_else(|| "Failed to parse task in server response".into())
}

pub fn create_task(credentials: &ScmsCredentials, task: &NewTask) -> Result<Task, Box<dyn Error>> {
    let value = post(credentials, paths::CREATE_TASK, task.to_json())?;
    parse_task(credentials, &value)
}

/// Creates a task with its files and links in a single multipart request.
pub fn create_task_with_files(credentials: &ScmsCredentials, task: &NewTask) -> Result<Task, Box<dyn Error>> {
    let value = post_multipart(
        credentials,
        paths::CREATE_TASK,
        &task.text_fields(),
        &task.attachments,
        &task.links,
    )?;
    parse_task(credentials, &value)
}

pub fn update_task(credentials: &ScmsCredentials, task_id: u64, task: &NewTask) -> Result<Task, Box<dyn Error>> {
    let value = put(credentials, &paths::task(task_id), task.to_json())?;
    parse_task(credentials, &value)
}

pub fn delete_task(credentials: &ScmsCredentials, task_id: u64) -> Result<(), Box<dyn Error>> {
    delete(credentials, &paths::task(task_id))
}

pub fn get_task_comments(credentials: &ScmsCredentials, task_id: u64) -> Result<Vec<Comment>, Box<dyn Error>> {
    let value = get(credentials, &paths::task_comments(task_id), vec![])?;
    Ok(convert_json_to_comments(list(&value, "comments")))
}

fn parse_comment(value: &Value) -> Result<Comment, Box<dyn Error>> {
    Comment::convert_json_to_comment(nested(value, "comment"))
        .ok_or_else(|| "Failed to parse comment in server response".into())
}

pub fn add_task_comment(
    credentials: &ScmsCredentials,
    task_id: u64,
    content: &str,
) -> Result<Comment, Box<dyn Error>> {
    let value = post(credentials, &paths::task_comments(task_id), json!({ "content": content }))?;
    parse_comment(&value)
}

fn parse_posts(credentials: &ScmsCredentials, value: &Value) -> Vec<StreamPost> {
    convert_json_to_posts(&credentials.url_scms, list(value, "posts"))
}

fn parse_post(credentials: &ScmsCredentials, value: &Value) -> Result<StreamPost, Box<dyn Error>> {
    StreamPost::convert_json_to_post(&credentials.url_scms, nested(value, "post"))
        .ok_or_else(|| "Failed to parse stream post in server response".into())
}

pub fn get_classroom_stream(credentials: &ScmsCredentials, code: &str) -> Result<Vec<StreamPost>, Box<dyn Error>> {
    let value = get(credentials, &paths::stream(code), vec![])?;
    Ok(parse_posts(credentials, &value))
}

/// Creates a text-only post, draft or scheduled post.
pub fn create_classroom_stream_post(
    credentials: &ScmsCredentials,
    code: &str,
    post_data: &NewStreamPost,
) -> Result<StreamPost, Box<dyn Error>> {
    let value = post(credentials, &paths::stream(code), post_data.to_json())?;
    parse_post(credentials, &value)
}

/// Creates a post carrying files only; links on `post_data` are not sent.
pub fn create_classroom_stream_post_with_files(
    credentials: &ScmsCredentials,
    code: &str,
    post_data: &NewStreamPost,
) -> Result<StreamPost, Box<dyn Error>> {
    let value = post_multipart(
        credentials,
        &paths::stream(code),
        &post_data.text_fields(),
        &post_data.attachments,
        &[],
    )?;
    parse_post(credentials, &value)
}

/// Creates a post carrying external links only; files on `post_data` are not sent.
pub fn create_classroom_stream_post_with_links(
    credentials: &ScmsCredentials,
    code: &str,
    post_data: &NewStreamPost,
) -> Result<StreamPost, Box<dyn Error>> {
    let value = post_multipart(
        credentials,
        &paths::stream(code),
        &post_data.text_fields(),
        &[],
        &post_data.links,
    )?;
    parse_post(credentials, &value)
}

/// Files and links in one multipart request. A partial server-side failure is not rolled back.
pub fn create_classroom_stream_post_with_mixed_attachments(
    credentials: &ScmsCredentials,
    code: &str,
    post_data: &NewStreamPost,
) -> Result<StreamPost, Box<dyn Error>> {
    let value = post_multipart(
        credentials,
        &paths::stream(code),
        &post_data.text_fields(),
        &post_data.attachments,
        &post_data.links,
    )?;
    parse_post(credentials, &value)
}

/// Picks the create variant matching what the post carries.
pub fn submit_stream_post(
    credentials: &ScmsCredentials,
    code: &str,
    post_data: &NewStreamPost,
) -> Result<StreamPost, Box<dyn Error>> {
    match (post_data.attachments.is_empty(), post_data.links.is_empty()) {
        (true, true) => create_classroom_stream_post(credentials, code, post_data),
        (false, true) => create_classroom_stream_post_with_files(credentials, code, post_data),
        (true, false) => create_classroom_stream_post_with_links(credentials, code, post_data),
        (false, false) => {
            create_classroom_stream_post_with_mixed_attachments(credentials, code, post_data)
        }
    }
}

pub fn get_classroom_stream_drafts(
    credentials: &ScmsCredentials,
    code: &str,
) -> Result<Vec<StreamPost>, Box<dyn Error>> {
    let value = get(credentials, &paths::stream_drafts(code), vec![])?;
    Ok(parse_posts(credentials, &value))
}

pub fn get_classroom_stream_scheduled(
    credentials: &ScmsCredentials,
    code: &str,
) -> Result<Vec<StreamPost>, Box<dyn Error>> {
    let value = get(credentials, &paths::stream_scheduled(code), vec![])?;
    Ok(parse_posts(credentials, &value))
}

pub fn update_classroom_stream_draft(
    credentials: &ScmsCredentials,
    code: &str,
    draft_id: u64,
    post_data: &NewStreamPost,
) -> Result<StreamPost, Box<dyn Error>> {
    // The draft endpoint only takes JSON; files cannot be added to an existing draft.
    if post_data.has_uploads() {
        return Err("Files cannot be added to a saved draft. Publish it or create a new post.".into());
    }
    let value = put(credentials, &paths::stream_draft(code, draft_id), post_data.to_json())?;
    parse_post(credentials, &value)
}

pub fn publish_classroom_stream_draft(
    credentials: &ScmsCredentials,
    code: &str,
    draft_id: u64,
) -> Result<StreamPost, Box<dyn Error>> {
    let path = format!("{}/publish", paths::stream_draft(code, draft_id));
    let value = post(credentials, &path, json!({}))?;
    parse_post(credentials, &value)
}

pub fn delete_classroom_stream_post(
    credentials: &ScmsCredentials,
    code: &str,
    post_id: u64,
) -> Result<(), Box<dyn Error>> {
    delete(credentials, &paths::stream_post(code, post_id))
}

pub fn react_to_stream_post(
    credentials: &ScmsCredentials,
    code: &str,
    post_id: u64,
    reaction: &str,
) -> Result<(), Box<dyn Error>> {
    post(
        credentials,
        &paths::stream_reaction(code, post_id),
        json!({ "reaction": reaction }),
    )?;
    Ok(())
}

pub fn get_teacher_stream_comments(
    credentials: &ScmsCredentials,
    code: &str,
    post_id: u64,
) -> Result<Vec<Comment>, Box<dyn Error>> {
    let value = get(credentials, &paths::stream_comments(code, post_id), vec![])?;
    Ok(convert_json_to_comments(list(&value, "comments")))
}

pub fn add_teacher_stream_comment(
    credentials: &ScmsCredentials,
    code: &str,
    post_id: u64,
    content: &str,
) -> Result<Comment, Box<dyn Error>> {
    let value = post(
        credentials,
        &paths::stream_comments(code, post_id),
        json!({ "content": content }),
    )?;
    parse_comment(&value)
}

pub fn edit_teacher_stream_comment(
    credentials: &ScmsCredentials,
    code: &str,
    post_id: u64,
    comment_id: u64,
    content: &str,
) -> Result<Comment, Box<dyn Error>> {
    let value = put(
        credentials,
        &paths::stream_comment(code, post_id, comment_id),
        json!({ "content": content }),
    )?;
    parse_comment(&value)
}

pub fn delete_teacher_stream_comment(
    credentials: &ScmsCredentials,
    code: &str,
    post_id: u64,
    comment_id: u64,
) -> Result<(), Box<dyn Error>> {
    delete(credentials, &paths::stream_comment(code, post_id, comment_id))
}

pub fn get_student_classes(credentials: &ScmsCredentials) -> Result<Vec<ClassroomSummary>, Box<dyn Error>> {
    let value = get(credentials, paths::STUDENT_CLASSES, vec![])?;
    Ok(list(&value, "classes")
        .as_array()
        .map(|items| items.iter().filter_map(ClassroomSummary::convert_json_to_summary).collect())
        .unwrap_or_default())
}

pub fn get_student_stream_posts(
    credentials: &ScmsCredentials,
    code: &str,
) -> Result<Vec<StreamPost>, Box<dyn Error>> {
    let value = get(credentials, &paths::student_stream(code), vec![])?;
    Ok(parse_posts(credentials, &value))
}

/// Joins a classroom by code, as a student. Returns the classroom when the server sends it back.
pub fn join_classroom(
    credentials: &ScmsCredentials,
    class_code: &str,
) -> Result<Option<ClassroomSummary>, Box<dyn Error>> {
    let value = post(
        credentials,
        paths::JOIN_CLASSROOM,
        json!({ "class_code": class_code.trim() }),
    )?;
    info!("joined classroom {}", class_code.trim());
    Ok(ClassroomSummary::convert_json_to_summary(&value))
}

pub fn get_classroom_grades(credentials: &ScmsCredentials, code: &str) -> Result<ClassroomGrades, Box<dyn Error>> {
    let value = get(credentials, &paths::grades(code), vec![])?;
    let records = convert_json_to_grade_records(&value);
    debug!("grades of {}: {} student rows", code, records.len());
    Ok(ClassroomGrades {
        class_name: class_name_from_grades(&value),
        records,
    })
}
