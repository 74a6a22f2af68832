//! The grade table: one computed row per student, shared by the on-screen
//! table and the spreadsheet export so both show the same numbers.
use crate::grading::{
    activity_tasks, assignment_metrics, attendance_metrics, final_exam_metrics, find_exam_task,
    exam_max_score, midterm_metrics, percentage, quarterly_grade, AssignmentMetrics,
    AttendanceMetrics, ExamMetrics, GradingBreakdown, QuarterlyGrade,
};
use crate::student::StudentGradeRecord;
use crate::task::{ExamKind, Task};
use crate::util::first_str;
use log::debug;
use serde::Serialize;
use serde_json::Value;

/// Raw score and percentage of one student on one activity task.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct TaskCell {
    pub task_id: u64,
    pub raw: Option<f64>,
    pub max: f64,
    pub percentage: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GradeRow {
    pub record: StudentGradeRecord,
    pub attendance: AttendanceMetrics,
    pub tasks: Vec<TaskCell>,
    pub activity: AssignmentMetrics,
    pub midterm: ExamMetrics,
    pub final_exam: ExamMetrics,
    pub quarterly: QuarterlyGrade,
}

impl GradeRow {
    pub fn compute(record: StudentGradeRecord, tasks: &[Task], breakdown: &GradingBreakdown) -> GradeRow {
        let attendance = attendance_metrics(record.attendance.as_ref(), breakdown);
        let activity = assignment_metrics(&record, tasks, breakdown);
        let midterm = midterm_metrics(&record, tasks, breakdown);
        let final_exam = final_exam_metrics(&record, tasks, breakdown);
        let quarterly = quarterly_grade(&attendance, &activity, &midterm);
        let cells = activity_tasks(tasks)
            .into_iter()
            .map(|task| {
                let raw = record.record_for(task.id).and_then(|r| r.grade);
                TaskCell {
                    task_id: task.id,
                    raw,
                    max: task.max_points(),
                    percentage: percentage(raw.unwrap_or(0.0), task.max_points()),
                }
            })
            .collect();
        GradeRow {
            record,
            attendance,
            tasks: cells,
            activity,
            midterm,
            final_exam,
            quarterly,
        }
    }
}

/// Everything the Grades tab shows for a classroom.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GradeTable {
    pub class_name: String,
    pub class_code: String,
    pub breakdown: GradingBreakdown,
    /// Activity (non-exam) tasks, in column order.
    pub activity_tasks: Vec<Task>,
    pub midterm_task: Option<Task>,
    pub final_task: Option<Task>,
    pub rows: Vec<GradeRow>,
}

impl GradeTable {
    pub fn build(
        class_name: &str,
        class_code: &str,
        tasks: &[Task],
        records: Vec<StudentGradeRecord>,
        breakdown: GradingBreakdown,
    ) -> GradeTable {
        let rows: Vec<GradeRow> = records
            .into_iter()
            .map(|record| GradeRow::compute(record, tasks, &breakdown))
            .collect();
        debug!(
            "grade table for {}: {} students, {} tasks",
            class_code,
            rows.len(),
            tasks.len()
        );
        GradeTable {
            class_name: class_name.to_string(),
            class_code: class_code.to_string(),
            breakdown,
            activity_tasks: activity_tasks(tasks).into_iter().cloned().collect(),
            midterm_task: find_exam_task(tasks, ExamKind::Midterm).cloned(),
            final_task: find_exam_task(tasks, ExamKind::Final).cloned(),
            rows,
        }
    }

    /// Recomputes every row after the grading settings changed.
    pub fn apply_breakdown(&mut self, breakdown: GradingBreakdown) {
        let mut tasks = self.activity_tasks.clone();
        tasks.extend(self.midterm_task.clone());
        tasks.extend(self.final_task.clone());
        self.breakdown = breakdown;
        let records: Vec<StudentGradeRecord> = self.rows.drain(..).map(|r| r.record).collect();
        self.rows = records
            .into_iter()
            .map(|record| GradeRow::compute(record, &tasks, &breakdown))
            .collect();
    }

    /// Highest possible attendance score (the "HPS" row).
    pub fn attendance_max(&self) -> f64 {
        self.breakdown.max_attendance_score
    }

    pub fn activity_max(&self) -> f64 {
        self.activity_tasks.iter().map(Task::max_points).sum()
    }

    pub fn midterm_max(&self) -> f64 {
        self.midterm_task
            .as_ref()
            .map_or(self.breakdown.max_midterm_score, |t| {
                exam_max_score(t, self.breakdown.max_midterm_score)
            })
    }

    pub fn final_max(&self) -> f64 {
        self.final_task
            .as_ref()
            .map_or(self.breakdown.max_final_exam_score, |t| {
                exam_max_score(t, self.breakdown.max_final_exam_score)
            })
    }

    /// Class average of the exact quarterly grade, `None` for an empty class.
    pub fn class_average(&self) -> Option<f64> {
        if self.rows.is_empty() {
            return None;
        }
        Some(self.rows.iter().map(|r| r.quarterly.exact).sum::<f64>() / self.rows.len() as f64)
    }
}

/// Reads the student rows of the grades endpoint.
///
/// The endpoint answers with `{ "students": [...] }` or a bare array. A row
/// may nest the student under `student` or carry the roster fields inline.
pub fn convert_json_to_grade_records(value: &Value) -> Vec<StudentGradeRecord> {
    let rows = if value["students"].is_array() {
        &value["students"]
    } else {
        value
    };
    rows.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(StudentGradeRecord::convert_json_to_grade_record)
                .collect()
        })
        .unwrap_or_default()
}

/// Class name sent along with the grades payload, when present.
pub fn class_name_from_grades(value: &Value) -> Option<String> {
    first_str(&value["classroom"], &["name", "class_name"]).or_else(|| first_str(value, &["class_name"]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::student::{AttendanceRecord, Student, StudentAssignmentRecord};
    use crate::task::TaskType;
    use serde_json::json;

    fn sample_tasks() -> Vec<Task> {
        let t = |id, title: &str, task_type, points| Task {
            id,
            title: title.to_string(),
            task_type,
            points: Some(points),
            ..Default::default()
        };
        vec![
            t(1, "Quiz 1", TaskType::Quiz, 20.0),
            t(2, "Midterm Exam", TaskType::MidtermExam, 100.0),
            t(3, "Lab 1", TaskType::Activity, 30.0),
            t(4, "Final Exam", TaskType::FinalExam, 50.0),
        ]
    }

    fn sample_record(id: u64, grades: &[(u64, f64)]) -> StudentGradeRecord {
        StudentGradeRecord {
            student: Student {
                id,
                name: format!("Student {}", id),
                ..Default::default()
            },
            assignments: grades
                .iter()
                .map(|&(task_id, g)| StudentAssignmentRecord {
                    task_id,
                    grade: Some(g),
                    points: None,
                })
                .collect(),
            attendance: Some(AttendanceRecord {
                present_sessions: 8.0,
                late_sessions: 2.0,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_table_columns_and_maxima() {
        let table = GradeTable::build(
            "Science 7",
            "SCI7AB",
            &sample_tasks(),
            vec![sample_record(1, &[(1, 18.0), (3, 24.0), (2, 50.0)])],
            GradingBreakdown::default(),
        );
        let ids: Vec<u64> = table.activity_tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(table.activity_max(), 50.0);
        // Midterm still carries the default 100 points.
        assert_eq!(table.midterm_max(), 60.0);
        assert_eq!(table.final_max(), 50.0);

        let row = &table.rows[0];
        assert_eq!(row.tasks.len(), 2);
        assert_eq!(row.tasks[1].raw, Some(24.0));
        assert!((row.tasks[1].percentage - 80.0).abs() < 1e-9);
        assert!(row.midterm.has_task);
        assert_eq!(row.midterm.max_possible_score, table.midterm_max());
    }

    #[test]
    fn test_apply_breakdown_recomputes() {
        let mut table = GradeTable::build(
            "Science 7",
            "SCI7AB",
            &sample_tasks(),
            vec![sample_record(1, &[(1, 20.0), (3, 30.0)])],
            GradingBreakdown::default(),
        );
        let before = table.rows[0].activity.weighted;
        let mut breakdown = GradingBreakdown::default();
        breakdown.activity = 25.0;
        table.apply_breakdown(breakdown);
        assert!((before - 50.0).abs() < 1e-9);
        assert!((table.rows[0].activity.weighted - 25.0).abs() < 1e-9);
        assert!(table.rows[0].midterm.has_task);
    }

    #[test]
    fn test_class_average() {
        let empty = GradeTable::build("", "", &[], Vec::new(), GradingBreakdown::default());
        assert_eq!(empty.class_average(), None);
        let no_exams = GradeTable::build(
            "",
            "",
            &sample_tasks()[..1],
            vec![sample_record(1, &[(1, 20.0)]), sample_record(2, &[(1, 10.0)])],
            GradingBreakdown::default(),
        );
        let expected = (no_exams.rows[0].quarterly.exact + no_exams.rows[1].quarterly.exact) / 2.0;
        assert_eq!(no_exams.class_average(), Some(expected));
    }

    #[test]
    fn test_grade_records_from_payload() {
        let payload = json!({
            "classroom": {"name": "Science 7"},
            "students": [
                {"student": {"id": 1, "name": "Ana"}, "assignments": [{"task_id": 1, "score": 19}]},
                {"student": {"id": 2, "name": "Ben"}, "assignments": []}
            ]
        });
        let records = convert_json_to_grade_records(&payload);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_for(1).unwrap().grade, Some(19.0));
        assert_eq!(class_name_from_grades(&payload).as_deref(), Some("Science 7"));
    }
}
