//! Weighted grade computation.
//!
//! Every category follows the same shape: a raw score (RS) out of a maximum,
//! the percentage score `PS = RS / max * 100` (0 when max is 0) and the
//! weighted score `WS = PS * weight / 100`. PS is not clamped, so a raw score
//! above the configured max yields more than 100 %.
use crate::student::{AttendanceRecord, StudentGradeRecord};
use crate::task::{ExamKind, Task, TaskType, DEFAULT_TASK_POINTS};
use serde::{Deserialize, Serialize};

/// Late sessions count for 70 % of a present session.
pub const LATE_SESSION_CREDIT: f64 = 0.7;

/// Teacher-configured weights (percent) and max scores.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradingBreakdown {
    pub attendance: f64,
    pub activity: f64,
    pub assignment: f64,
    pub midterm_exam: f64,
    pub final_exam: f64,
    pub max_attendance_score: f64,
    pub max_midterm_score: f64,
    pub max_final_exam_score: f64,
}

impl Default for GradingBreakdown {
    fn default() -> Self {
        GradingBreakdown {
            attendance: 10.0,
            activity: 50.0,
            assignment: 0.0,
            midterm_exam: 40.0,
            final_exam: 40.0,
            max_attendance_score: 10.0,
            max_midterm_score: 60.0,
            max_final_exam_score: 60.0,
        }
    }
}

impl GradingBreakdown {
    /// Sum of the weights that make up the quarterly grade.
    pub fn quarterly_weight_total(&self) -> f64 {
        self.attendance + self.activity + self.midterm_exam
    }
}

pub fn percentage(raw: f64, max: f64) -> f64 {
    if max == 0.0 {
        0.0
    } else {
        raw / max * 100.0
    }
}

pub fn weighted(percentage: f64, weight: f64) -> f64 {
    percentage * weight / 100.0
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMetrics {
    pub raw_score: f64,
    pub max_possible_score: f64,
    pub percentage: f64,
    pub weighted: f64,
}

impl CategoryMetrics {
    fn new(raw_score: f64, max_possible_score: f64, weight: f64) -> Self {
        let percentage = percentage(raw_score, max_possible_score);
        CategoryMetrics {
            raw_score,
            max_possible_score,
            percentage,
            weighted: weighted(percentage, weight),
        }
    }
}

pub type AttendanceMetrics = CategoryMetrics;
pub type AssignmentMetrics = CategoryMetrics;

/// Midterm or final exam result; `has_task` is false when the class has no such exam.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExamMetrics {
    pub has_task: bool,
    pub task_id: Option<u64>,
    pub raw_score: f64,
    pub max_possible_score: f64,
    pub percentage: f64,
    pub weighted: f64,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct QuarterlyGrade {
    pub exact: f64,
    pub rounded: i64,
}

/// `present + excused + late * 0.7` out of the configured max.
///
/// A student without an attendance record gets all zeros.
pub fn attendance_metrics(
    attendance: Option<&AttendanceRecord>,
    breakdown: &GradingBreakdown,
) -> AttendanceMetrics {
    match attendance {
        None => AttendanceMetrics::default(),
        Some(a) => {
            let raw = a.present_sessions + a.excused_sessions + a.late_sessions * LATE_SESSION_CREDIT;
            CategoryMetrics::new(raw, breakdown.max_attendance_score, breakdown.attendance)
        }
    }
}

fn title_is_midterm(title: &str) -> bool {
    let title = title.to_lowercase();
    title.contains("midterm") || title.contains("mid term") || title.contains("mid-term")
}

fn title_is_final(title: &str) -> bool {
    // "final exam" and "final-exam" are covered by "final".
    title.to_lowercase().contains("final")
}

/// Which exam column, if any, a task feeds.
///
/// An explicit `exam_kind` from the server decides. Without it, the task type
/// is checked first, then the title: any title containing "final" counts as
/// the final exam, so "Final Project Presentation" is classified as one.
pub fn classify_exam(task: &Task) -> ExamKind {
    if let Some(kind) = task.exam_kind {
        return kind;
    }
    match task.task_type {
        TaskType::MidtermExam => ExamKind::Midterm,
        TaskType::FinalExam => ExamKind::Final,
        _ if title_is_midterm(&task.title) => ExamKind::Midterm,
        _ if title_is_final(&task.title) => ExamKind::Final,
        _ => ExamKind::None,
    }
}

pub fn is_exam_task(task: &Task) -> bool {
    classify_exam(task) != ExamKind::None
}

/// Tasks that count towards the activity category, in list order.
pub fn activity_tasks(tasks: &[Task]) -> Vec<&Task> {
    tasks.iter().filter(|t| !is_exam_task(t)).collect()
}

/// Sums every non-exam task, counting ungraded or missing submissions as 0
/// while still adding the task's max points.
pub fn assignment_metrics(
    record: &StudentGradeRecord,
    tasks: &[Task],
    breakdown: &GradingBreakdown,
) -> AssignmentMetrics {
    let (raw, max) = activity_tasks(tasks).iter().fold((0.0, 0.0), |(raw, max), task| {
        let grade = record.record_for(task.id).and_then(|r| r.grade).unwrap_or(0.0);
        (raw + grade, max + task.max_points())
    });
    CategoryMetrics::new(raw, max, breakdown.activity)
}

/// First task classified as `kind`.
pub fn find_exam_task(tasks: &[Task], kind: ExamKind) -> Option<&Task> {
    tasks.iter().find(|t| classify_exam(t) == kind)
}

/// Max score of an exam: the task's own points if explicitly set, otherwise the configured value.
pub fn exam_max_score(task: &Task, configured_max: f64) -> f64 {
    match task.points {
        Some(points) if points > 0.0 && points != DEFAULT_TASK_POINTS => points,
        _ => configured_max,
    }
}

fn exam_metrics(
    record: &StudentGradeRecord,
    tasks: &[Task],
    kind: ExamKind,
    configured_max: f64,
    weight: f64,
) -> ExamMetrics {
    let task = match find_exam_task(tasks, kind) {
        Some(task) => task,
        None => {
            return ExamMetrics {
                has_task: false,
                max_possible_score: configured_max,
                ..Default::default()
            }
        }
    };
    let raw = record.record_for(task.id).and_then(|r| r.grade).unwrap_or(0.0);
    let metrics = CategoryMetrics::new(raw, exam_max_score(task, configured_max), weight);
    ExamMetrics {
        has_task: true,
        task_id: Some(task.id),
        raw_score: metrics.raw_score,
        max_possible_score: metrics.max_possible_score,
        percentage: metrics.percentage,
        weighted: metrics.weighted,
    }
}

pub fn midterm_metrics(
    record: &StudentGradeRecord,
    tasks: &[Task],
    breakdown: &GradingBreakdown,
) -> ExamMetrics {
    exam_metrics(
        record,
        tasks,
        ExamKind::Midterm,
        breakdown.max_midterm_score,
        breakdown.midterm_exam,
    )
}

pub fn final_exam_metrics(
    record: &StudentGradeRecord,
    tasks: &[Task],
    breakdown: &GradingBreakdown,
) -> ExamMetrics {
    exam_metrics(
        record,
        tasks,
        ExamKind::Final,
        breakdown.max_final_exam_score,
        breakdown.final_exam,
    )
}

/// Attendance + activity + midterm weighted scores. The final exam is not
/// part of the quarterly grade.
pub fn quarterly_grade(
    attendance: &AttendanceMetrics,
    activity: &AssignmentMetrics,
    midterm: &ExamMetrics,
) -> QuarterlyGrade {
    let exact = attendance.weighted + activity.weighted + midterm.weighted;
    QuarterlyGrade {
        exact,
        rounded: exact.round() as i64,
    }
}

/// Two-decimal display used by the grade table ("75.00").
pub fn format_score(value: f64) -> String {
    format!("{:.2}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::student::StudentAssignmentRecord;

    fn task(id: u64, title: &str, task_type: TaskType, points: f64) -> Task {
        Task {
            id,
            title: title.to_string(),
            task_type,
            points: Some(points),
            ..Default::default()
        }
    }

    fn record(grades: &[(u64, Option<f64>)]) -> StudentGradeRecord {
        StudentGradeRecord {
            assignments: grades
                .iter()
                .map(|&(task_id, grade)| StudentAssignmentRecord {
                    task_id,
                    grade,
                    points: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_attendance_example() {
        let breakdown = GradingBreakdown {
            attendance: 10.0,
            max_attendance_score: 6.0,
            ..Default::default()
        };
        let attendance = AttendanceRecord {
            present_sessions: 5.0,
            excused_sessions: 0.0,
            late_sessions: 1.0,
            absent_sessions: 0.0,
        };
        let m = attendance_metrics(Some(&attendance), &breakdown);
        assert!(close(m.raw_score, 5.7));
        assert_eq!(m.max_possible_score, 6.0);
        assert!(close(m.percentage, 95.0));
        assert!(close(m.weighted, 9.5));
    }

    #[test]
    fn test_attendance_formula_holds_for_counts() {
        let breakdown = GradingBreakdown {
            attendance: 15.0,
            max_attendance_score: 20.0,
            ..Default::default()
        };
        for present in 0..6 {
            for excused in 0..3 {
                for late in 0..4 {
                    let a = AttendanceRecord {
                        present_sessions: present as f64,
                        excused_sessions: excused as f64,
                        late_sessions: late as f64,
                        absent_sessions: 2.0,
                    };
                    let expected = (present as f64 + excused as f64 + late as f64 * 0.7) / 20.0
                        * 100.0
                        * 15.0
                        / 100.0;
                    assert!(close(attendance_metrics(Some(&a), &breakdown).weighted, expected));
                }
            }
        }
    }

    #[test]
    fn test_attendance_zero_cases() {
        let breakdown = GradingBreakdown {
            max_attendance_score: 0.0,
            ..Default::default()
        };
        let a = AttendanceRecord {
            present_sessions: 4.0,
            ..Default::default()
        };
        let m = attendance_metrics(Some(&a), &breakdown);
        assert_eq!(m.percentage, 0.0);
        assert_eq!(m.weighted, 0.0);

        let missing = attendance_metrics(None, &GradingBreakdown::default());
        assert_eq!(missing, AttendanceMetrics::default());
    }

    #[test]
    fn test_assignment_metrics_sums_non_exam_tasks() {
        let tasks = vec![
            task(1, "Quiz 1", TaskType::Quiz, 20.0),
            task(2, "Lab 1", TaskType::Activity, 30.0),
            task(3, "Midterm Exam", TaskType::Exam, 68.0),
            task(4, "Essay", TaskType::Assignment, 50.0),
        ];
        // Task 4 never submitted: counts 0 of 50.
        let r = record(&[(1, Some(15.0)), (2, Some(30.0)), (3, Some(60.0))]);
        let breakdown = GradingBreakdown {
            activity: 50.0,
            ..Default::default()
        };
        let m = assignment_metrics(&r, &tasks, &breakdown);
        assert_eq!(m.raw_score, 45.0);
        assert_eq!(m.max_possible_score, 100.0);
        assert!(close(m.percentage, 45.0));
        assert!(close(m.weighted, 22.5));
    }

    #[test]
    fn test_assignment_percentage_zero_without_points() {
        let tasks = vec![
            task(1, "Reflection", TaskType::Activity, 0.0),
            task(2, "Final Exam", TaskType::FinalExam, 100.0),
        ];
        let r = record(&[(1, Some(5.0)), (2, Some(80.0))]);
        let m = assignment_metrics(&r, &tasks, &GradingBreakdown::default());
        assert_eq!(m.max_possible_score, 0.0);
        assert_eq!(m.percentage, 0.0);
        assert_eq!(m.weighted, 0.0);

        let empty = assignment_metrics(&r, &[], &GradingBreakdown::default());
        assert_eq!(empty.percentage, 0.0);
    }

    #[test]
    fn test_midterm_example_uses_configured_max() {
        // Task still carries the form default of 100 points.
        let tasks = vec![task(9, "Mid-Term Examination", TaskType::Exam, 100.0)];
        let breakdown = GradingBreakdown {
            midterm_exam: 40.0,
            max_midterm_score: 68.0,
            ..Default::default()
        };
        let m = midterm_metrics(&record(&[(9, Some(51.0))]), &tasks, &breakdown);
        assert!(m.has_task);
        assert_eq!(m.task_id, Some(9));
        assert_eq!(m.max_possible_score, 68.0);
        assert_eq!(format_score(m.percentage), "75.00");
        assert_eq!(format_score(m.weighted), "30.00");
    }

    #[test]
    fn test_exam_explicit_points_override_configured_max() {
        let t = task(9, "Midterm", TaskType::MidtermExam, 80.0);
        assert_eq!(exam_max_score(&t, 68.0), 80.0);
        let unset = Task {
            points: None,
            ..t.clone()
        };
        assert_eq!(exam_max_score(&unset, 68.0), 68.0);
        let zero = Task {
            points: Some(0.0),
            ..t
        };
        assert_eq!(exam_max_score(&zero, 68.0), 68.0);
    }

    #[test]
    fn test_missing_final_falls_back() {
        let tasks = vec![task(1, "Quiz 1", TaskType::Quiz, 20.0)];
        let breakdown = GradingBreakdown {
            max_final_exam_score: 75.0,
            ..Default::default()
        };
        let m = final_exam_metrics(&record(&[(1, Some(20.0))]), &tasks, &breakdown);
        assert!(!m.has_task);
        assert_eq!(m.task_id, None);
        assert_eq!(m.weighted, 0.0);
        assert_eq!(m.raw_score, 0.0);
        assert_eq!(m.max_possible_score, 75.0);
    }

    #[test]
    fn test_ungraded_exam_counts_zero() {
        let tasks = vec![task(5, "Final Exam", TaskType::FinalExam, 100.0)];
        let m = final_exam_metrics(&record(&[]), &tasks, &GradingBreakdown::default());
        assert!(m.has_task);
        assert_eq!(m.raw_score, 0.0);
        assert_eq!(m.percentage, 0.0);
    }

    #[test]
    fn test_exam_title_heuristics() {
        for title in ["Midterm", "MID TERM quiz", "mid-term exam"] {
            assert_eq!(
                classify_exam(&task(1, title, TaskType::Assignment, 10.0)),
                ExamKind::Midterm,
                "{}",
                title
            );
        }
        for title in ["FINAL EXAM", "final-exam", "Finals"] {
            assert_eq!(
                classify_exam(&task(1, title, TaskType::Assignment, 10.0)),
                ExamKind::Final,
                "{}",
                title
            );
        }
        assert_eq!(
            classify_exam(&task(1, "Lab 3", TaskType::Exam, 10.0)),
            ExamKind::None
        );
        assert_eq!(
            classify_exam(&task(1, "Unit test", TaskType::FinalExam, 10.0)),
            ExamKind::Final
        );
    }

    #[test]
    fn test_final_project_title_is_misclassified_without_exam_kind() {
        let project = task(7, "Final Project Presentation", TaskType::Project, 50.0);
        assert_eq!(classify_exam(&project), ExamKind::Final);
        assert!(activity_tasks(std::slice::from_ref(&project)).is_empty());

        let tagged = Task {
            exam_kind: Some(ExamKind::None),
            ..project
        };
        assert_eq!(classify_exam(&tagged), ExamKind::None);
        assert_eq!(activity_tasks(std::slice::from_ref(&tagged)).len(), 1);
    }

    #[test]
    fn test_explicit_exam_kind_wins_over_type() {
        let t = Task {
            exam_kind: Some(ExamKind::Midterm),
            ..task(3, "Final Review", TaskType::FinalExam, 100.0)
        };
        assert_eq!(classify_exam(&t), ExamKind::Midterm);
    }

    #[test]
    fn test_quarterly_excludes_final() {
        let tasks = vec![
            task(1, "Quiz 1", TaskType::Quiz, 20.0),
            task(2, "Midterm Exam", TaskType::MidtermExam, 50.0),
            task(3, "Final Exam", TaskType::FinalExam, 50.0),
        ];
        let breakdown = GradingBreakdown {
            attendance: 10.0,
            activity: 50.0,
            midterm_exam: 40.0,
            final_exam: 40.0,
            max_attendance_score: 6.0,
            ..Default::default()
        };
        let r = StudentGradeRecord {
            attendance: Some(AttendanceRecord {
                present_sessions: 5.0,
                late_sessions: 1.0,
                ..Default::default()
            }),
            ..record(&[(1, Some(17.0)), (2, Some(41.0)), (3, Some(50.0))])
        };
        let att = attendance_metrics(r.attendance.as_ref(), &breakdown);
        let act = assignment_metrics(&r, &tasks, &breakdown);
        let mid = midterm_metrics(&r, &tasks, &breakdown);
        let fin = final_exam_metrics(&r, &tasks, &breakdown);
        let q = quarterly_grade(&att, &act, &mid);

        assert_eq!(q.exact, att.weighted + act.weighted + mid.weighted);
        assert!(fin.weighted > 0.0);
        // 9.5 + 42.5 + 32.8
        assert!(close(q.exact, 84.8));
        assert_eq!(q.rounded, 85);
    }

    #[test]
    fn test_percentage_is_not_clamped() {
        assert!(close(percentage(80.0, 68.0), 117.64705882352942));
        assert_eq!(percentage(-3.0, 0.0), 0.0);
    }

    #[test]
    fn test_quarterly_rounding_half_up() {
        let m = |w| CategoryMetrics {
            weighted: w,
            ..Default::default()
        };
        let mid = ExamMetrics {
            weighted: 30.0,
            ..Default::default()
        };
        assert_eq!(quarterly_grade(&m(10.0), &m(34.5), &mid).rounded, 75);
        assert_eq!(quarterly_grade(&m(10.0), &m(34.49), &mid).rounded, 74);
    }
}
