// Necessary imports from standard and external crates.
use crate::export::export_grade_table;
use crate::gradebook::GradeTable;
use crate::grading::GradingBreakdown;
use crate::scms::{self, ClassroomSummary, InviteOutcome};
use crate::stream::{Comment, NewStreamPost, StreamPost};
use crate::student::{parse_invite_emails, sort_roster, Student};
use crate::task::{NewTask, Task, TaskThread};
use crate::tracked::{optimistic_insert, optimistic_remove, Position, TrackedList};
use crate::ScmsCredentials;
use chrono::Local;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Structure holding detailed information about a SCMS classroom.
///
/// Fields:
/// - `id`: Unique identifier of the classroom.
/// - `name`: Display name ("Science 7 - Rizal").
/// - `code`: Class code students join with; every classroom endpoint is keyed by it.
/// - `credentials`: Shared reference to the API URL and token.
/// - `students_cache` / `tasks_cache`: Last fetched roster and task list.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ClassroomInfo {
    pub id: u64,
    pub name: String,
    pub code: String,
    pub section: Option<String>,
    pub subject: Option<String>,
    #[serde(skip)]
    pub credentials: Arc<ScmsCredentials>,
    #[serde(skip)]
    pub students_cache: Mutex<Vec<Student>>,
    #[serde(skip)]
    pub tasks_cache: Mutex<Vec<Task>>,
}

/// High-level handle on a classroom; cheap to clone, caches are shared.
#[derive(Clone, Debug)]
pub struct Classroom {
    pub info: Arc<ClassroomInfo>,
}

// A poisoned cache still holds usable data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Clone for ClassroomInfo {
    fn clone(&self) -> Self {
        ClassroomInfo {
            id: self.id,
            name: self.name.clone(),
            code: self.code.clone(),
            section: self.section.clone(),
            subject: self.subject.clone(),
            credentials: Arc::clone(&self.credentials),
            students_cache: Mutex::new(lock(&self.students_cache).clone()),
            tasks_cache: Mutex::new(lock(&self.tasks_cache).clone()),
        }
    }
}

impl ClassroomInfo {
    /// Enrolled students sorted by last name, served from the cache when filled.
    pub fn fetch_students(&self) -> Result<Vec<Student>, Box<dyn Error>> {
        {
            let students_cache = lock(&self.students_cache);
            if !students_cache.is_empty() {
                return Ok(students_cache.clone());
            }
        }
        let mut students = scms::get_classroom_students(&self.credentials, &self.code)?;
        sort_roster(&mut students);
        let mut students_cache = lock(&self.students_cache);
        *students_cache = students;
        Ok(students_cache.clone())
    }

    /// Task list of the classroom, served from the cache when filled.
    pub fn fetch_tasks(&self) -> Result<Vec<Task>, Box<dyn Error>> {
        {
            let tasks_cache = lock(&self.tasks_cache);
            if !tasks_cache.is_empty() {
                return Ok(tasks_cache.clone());
            }
        }
        let tasks = scms::get_teacher_tasks(&self.credentials, &self.code)?;
        let mut tasks_cache = lock(&self.tasks_cache);
        *tasks_cache = tasks;
        Ok(tasks_cache.clone())
    }

    pub fn clear_cache(&self) {
        lock(&self.students_cache).clear();
        lock(&self.tasks_cache).clear();
    }
}

impl Classroom {
    pub fn fetch_students(&self) -> Result<Vec<Student>, Box<dyn Error>> {
        self.info.fetch_students()
    }

    pub fn fetch_tasks(&self) -> Result<Vec<Task>, Box<dyn Error>> {
        self.info.fetch_tasks()
    }

    pub fn clear_cache(&self) {
        self.info.clear_cache();
    }

    pub fn summary(&self) -> ClassroomSummary {
        ClassroomSummary {
            id: self.info.id,
            name: self.info.name.clone(),
            code: self.info.code.clone(),
            section: self.info.section.clone(),
            subject: self.info.subject.clone(),
            teacher_name: None,
        }
    }

    /// Line shown in the interactive classroom chooser.
    pub fn menu_label(&self) -> String {
        match &self.info.section {
            Some(section) => format!("{} ({}) [{}]", self.info.name, section, self.info.code),
            None => format!("{} [{}]", self.info.name, self.info.code),
        }
    }

    /// Invites the addresses typed in the invite box.
    ///
    /// Invalid addresses are reported back without a request; the roster
    /// cache is dropped after a successful call.
    pub fn invite_students(&self, raw_emails: &str) -> Result<InviteOutcome, Box<dyn Error>> {
        let (valid, invalid) = parse_invite_emails(raw_emails);
        if valid.is_empty() {
            let message = if invalid.is_empty() {
                "Enter at least one email address".to_string()
            } else {
                format!("Invalid email address: {}", invalid.join(", "))
            };
            return Err(message.into());
        }
        let mut outcome = scms::invite_students(&self.info.credentials, &self.info.code, &valid)?;
        outcome.rejected.extend(invalid);
        lock(&self.info.students_cache).clear();
        Ok(outcome)
    }

    /// Creates a task, as multipart when it carries files.
    pub fn create_task(&self, task: &NewTask) -> Result<Task, Box<dyn Error>> {
        let created = if task.has_uploads() {
            scms::create_task_with_files(&self.info.credentials, task)?
        } else {
            scms::create_task(&self.info.credentials, task)?
        };
        let mut tasks_cache = lock(&self.info.tasks_cache);
        if !tasks_cache.is_empty() {
            tasks_cache.push(created.clone());
        }
        Ok(created)
    }

    pub fn update_task(&self, task_id: u64, task: &NewTask) -> Result<Task, Box<dyn Error>> {
        let updated = scms::update_task(&self.info.credentials, task_id, task)?;
        for cached in lock(&self.info.tasks_cache).iter_mut() {
            if cached.id == task_id {
                *cached = updated.clone();
            }
        }
        Ok(updated)
    }

    pub fn delete_task(&self, task_id: u64) -> Result<(), Box<dyn Error>> {
        scms::delete_task(&self.info.credentials, task_id)?;
        lock(&self.info.tasks_cache).retain(|t| t.id != task_id);
        Ok(())
    }

    /// A task together with its comment thread.
    pub fn fetch_task_thread(&self, task: Task) -> Result<TaskThread, Box<dyn Error>> {
        let comments = scms::get_task_comments(&self.info.credentials, task.id)?;
        Ok(TaskThread { task, comments })
    }

    pub fn add_task_comment(&self, task_id: u64, content: &str) -> Result<Comment, Box<dyn Error>> {
        scms::add_task_comment(&self.info.credentials, task_id, content)
    }

    pub fn fetch_stream(&self) -> Result<Vec<StreamPost>, Box<dyn Error>> {
        scms::get_classroom_stream(&self.info.credentials, &self.info.code)
    }

    pub fn fetch_drafts(&self) -> Result<Vec<StreamPost>, Box<dyn Error>> {
        scms::get_classroom_stream_drafts(&self.info.credentials, &self.info.code)
    }

    pub fn fetch_scheduled(&self) -> Result<Vec<StreamPost>, Box<dyn Error>> {
        scms::get_classroom_stream_scheduled(&self.info.credentials, &self.info.code)
    }

    pub fn post_to_stream(&self, post: &NewStreamPost) -> Result<StreamPost, Box<dyn Error>> {
        scms::submit_stream_post(&self.info.credentials, &self.info.code, post)
    }

    pub fn update_draft(&self, draft_id: u64, post: &NewStreamPost) -> Result<StreamPost, Box<dyn Error>> {
        scms::update_classroom_stream_draft(&self.info.credentials, &self.info.code, draft_id, post)
    }

    pub fn publish_draft(&self, draft_id: u64) -> Result<StreamPost, Box<dyn Error>> {
        scms::publish_classroom_stream_draft(&self.info.credentials, &self.info.code, draft_id)
    }

    pub fn delete_post(&self, post_id: u64) -> Result<(), Box<dyn Error>> {
        scms::delete_classroom_stream_post(&self.info.credentials, &self.info.code, post_id)
    }

    pub fn react(&self, post_id: u64, reaction: &str) -> Result<(), Box<dyn Error>> {
        scms::react_to_stream_post(&self.info.credentials, &self.info.code, post_id, reaction)
    }

    pub fn fetch_post_comments(&self, post_id: u64) -> Result<Vec<Comment>, Box<dyn Error>> {
        scms::get_teacher_stream_comments(&self.info.credentials, &self.info.code, post_id)
    }

    pub fn add_post_comment(&self, post_id: u64, content: &str) -> Result<Comment, Box<dyn Error>> {
        scms::add_teacher_stream_comment(&self.info.credentials, &self.info.code, post_id, content)
    }

    pub fn edit_post_comment(
        &self,
        post_id: u64,
        comment_id: u64,
        content: &str,
    ) -> Result<Comment, Box<dyn Error>> {
        scms::edit_teacher_stream_comment(
            &self.info.credentials,
            &self.info.code,
            post_id,
            comment_id,
            content,
        )
    }

    pub fn delete_post_comment(&self, post_id: u64, comment_id: u64) -> Result<(), Box<dyn Error>> {
        scms::delete_teacher_stream_comment(&self.info.credentials, &self.info.code, post_id, comment_id)
    }

    /// Deletes a post shown in `stream`; the post reappears if the server refuses.
    pub fn delete_post_from(&self, stream: &mut TrackedList<StreamPost>, post_id: u64) -> Result<(), Box<dyn Error>> {
        let key = stream
            .find_key(|p| p.id == post_id)
            .ok_or_else(|| format!("Post {} is not in the stream", post_id))?;
        optimistic_remove(stream, key, |_| self.delete_post(post_id))?;
        Ok(())
    }

    /// Shows the comment in `thread` at once and replaces it with the stored one.
    pub fn add_post_comment_to(
        &self,
        thread: &mut TrackedList<Comment>,
        post_id: u64,
        content: &str,
    ) -> Result<Comment, Box<dyn Error>> {
        let pending = Comment {
            content: content.to_string(),
            ..Default::default()
        };
        let key = optimistic_insert(thread, pending, Position::Back, |_| {
            self.add_post_comment(post_id, content)
        })?;
        thread
            .get(key)
            .map(|entry| entry.item.clone())
            .ok_or_else(|| "Comment missing after commit".into())
    }

    /// Fetches tasks and grades and computes the grade table.
    pub fn fetch_grade_table(&self, breakdown: GradingBreakdown) -> Result<GradeTable, Box<dyn Error>> {
        let tasks = self.fetch_tasks()?;
        let grades = scms::get_classroom_grades(&self.info.credentials, &self.info.code)?;
        let name = grades.class_name.unwrap_or_else(|| self.info.name.clone());
        Ok(GradeTable::build(&name, &self.info.code, &tasks, grades.records, breakdown))
    }

    /// Computes the grade table and writes it as `.xlsx` into `output_dir`.
    pub fn export_grades(
        &self,
        breakdown: GradingBreakdown,
        output_dir: &Path,
    ) -> Result<PathBuf, Box<dyn Error>> {
        let table = self.fetch_grade_table(breakdown).map_err(|e| {
            warn!("could not load grades of {}: {}", self.info.code, e);
            e
        })?;
        let path = export_grade_table(&table, output_dir, Local::now().date_naive())?;
        info!("grade export of {} ready", self.info.code);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classroom_with_cache() -> Classroom {
        let info = ClassroomInfo {
            id: 1,
            name: "Science 7".to_string(),
            code: "SCI7AB".to_string(),
            section: Some("Rizal".to_string()),
            credentials: Arc::new(ScmsCredentials::new("http://127.0.0.1:9", "t")),
            ..Default::default()
        };
        *lock(&info.students_cache) = vec![Student {
            id: 7,
            name: "Ana Lim".to_string(),
            ..Default::default()
        }];
        *lock(&info.tasks_cache) = vec![Task {
            id: 3,
            title: "Quiz 1".to_string(),
            ..Default::default()
        }];
        Classroom { info: Arc::new(info) }
    }

    #[test]
    fn test_cached_fetches_skip_the_network() {
        let classroom = classroom_with_cache();
        assert_eq!(classroom.fetch_students().unwrap()[0].id, 7);
        assert_eq!(classroom.fetch_tasks().unwrap()[0].title, "Quiz 1");
        classroom.clear_cache();
        assert!(lock(&classroom.info.students_cache).is_empty());
        assert!(lock(&classroom.info.tasks_cache).is_empty());
    }

    #[test]
    fn test_clone_copies_caches() {
        let classroom = classroom_with_cache();
        let copy = (*classroom.info).clone();
        classroom.clear_cache();
        assert_eq!(lock(&copy.students_cache).len(), 1);
        assert_eq!(copy.code, "SCI7AB");
    }

    #[test]
    fn test_invite_rejects_without_valid_addresses() {
        let classroom = classroom_with_cache();
        let err = classroom.invite_students("not-an-email").unwrap_err();
        assert_eq!(err.to_string(), "Invalid email address: not-an-email");
        let empty = classroom.invite_students("  ").unwrap_err();
        assert_eq!(empty.to_string(), "Enter at least one email address");
    }

    #[test]
    fn test_delete_unknown_post_leaves_stream() {
        let classroom = classroom_with_cache();
        let mut stream = TrackedList::from_committed(vec![StreamPost {
            id: 5,
            ..Default::default()
        }]);
        let err = classroom.delete_post_from(&mut stream, 6).unwrap_err();
        assert_eq!(err.to_string(), "Post 6 is not in the stream");
        assert_eq!(stream.visible().len(), 1);
    }

    #[test]
    fn test_labels_and_summary() {
        let classroom = classroom_with_cache();
        assert_eq!(classroom.menu_label(), "Science 7 (Rizal) [SCI7AB]");
        let summary = classroom.summary();
        assert_eq!(summary.code, "SCI7AB");
        assert_eq!(summary.section.as_deref(), Some("Rizal"));
    }
}
