//! # SCMS API Integration Library
//!
//! This Rust library provides functionalities for interacting with the SCMS classroom
//! management API. It covers the teacher's classroom page (stream, tasks, rosters) and
//! turns the classroom's grade data into weighted quarterly grades that can be exported
//! as an Excel workbook whose cells recompute from formulas.
//! The library utilizes the `reqwest` crate for HTTP requests and incorporates concurrency
//! control for efficient request handling.
//!
//! ## Core Features
//!
//! - **Authentication and Configuration:** Handles SCMS API credentials, supporting both environment-based and system keyring storage.
//! - **Classroom Management:** Fetches the teacher's classrooms and caches their students and tasks.
//! - **Stream and Tasks:** Posts, drafts, scheduled posts, reactions, comments and tasks with file or link attachments.
//! - **Grades:** Attendance, activity, midterm and final exam metrics combined into a quarterly grade.
//! - **Export:** Writes the grade table to `SCMS_Grades_<code>_<date>.xlsx`.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! scms_connector = "0.1"
//! ```
//!
//! The primary functions are `fetch_classrooms_with_credentials` and `fetch_single_classroom_with_credentials`.
//! Both take a reference to `ScmsCredentials` and return `ScmsResultClassrooms` or
//! `ScmsResultSingleClassroom`, telling a successful fetch apart from connection and
//! credential errors.
//!
//! ### Examples
//!
//! Exporting the grades of a classroom:
//! ```no_run
//! use scms_connector::{GradingBreakdown, Scms, ScmsCredentials, ScmsResultSingleClassroom};
//! let credentials = ScmsCredentials::new("https://scms.example.edu", "token");
//! match Scms::fetch_single_classroom_with_credentials(&credentials, "SCI7AB") {
//!     ScmsResultSingleClassroom::Ok(classroom) => {
//!         match classroom.export_grades(GradingBreakdown::default(), std::path::Path::new(".")) {
//!             Ok(path) => println!("Saved {}", path.display()),
//!             Err(e) => eprintln!("Export failed: {}", e),
//!         }
//!     }
//!     ScmsResultSingleClassroom::ErrConnection(err) => eprintln!("Connection error: {}", err),
//!     ScmsResultSingleClassroom::ErrCredentials(err) => eprintln!("Credentials error: {}", err),
//! }
//! ```
pub mod attachment; // File and link attachments, multipart form planning.
pub mod classroom; // Contains functionalities related to SCMS classrooms.
mod connection; // Manages HTTP connections and requests to the SCMS API.
pub mod credentials; // Handles the storage and retrieval of SCMS API credentials.
pub mod export;
pub mod gradebook;
pub mod grading; // Weighted grade computation.
pub mod local_state;
pub mod media;
pub mod scheduler;
pub mod scms;
pub mod store;
pub mod stream;
pub mod student; // Rosters, attendance and per-student grade records.
pub mod task;
pub mod tracked;
pub mod util;

// Exports key structures for external use.
pub use attachment::{ExternalLink, LocalAttachment, RemoteAttachment};
pub use classroom::{Classroom, ClassroomInfo};
pub use connection::ApiError;
pub use credentials::ScmsCredentials;
pub use gradebook::{GradeRow, GradeTable};
pub use grading::GradingBreakdown;
pub use local_state::{LocalState, Theme};
pub use scheduler::{ScheduleBoard, ScheduleEvent, POLL_INTERVAL};
pub use scms::{ClassroomSummary, Scms, ScmsResultClassrooms, ScmsResultSingleClassroom, UserProfile};
pub use store::{GradingSettings, StreamComposer, TaskComposer};
pub use stream::{Comment, NewStreamPost, StreamPost};
pub use student::{AttendanceRecord, Student, StudentGradeRecord};
pub use task::{NewTask, PublishStatus, Task, TaskType};
pub use tracked::TrackedList;
