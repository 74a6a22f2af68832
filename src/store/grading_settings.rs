use crate::grading::GradingBreakdown;
use log::debug;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradingSettingsAction {
    SetAttendanceWeight(f64),
    SetActivityWeight(f64),
    SetAssignmentWeight(f64),
    SetMidtermWeight(f64),
    SetFinalExamWeight(f64),
    SetMaxAttendanceScore(f64),
    SetMaxMidtermScore(f64),
    SetMaxFinalExamScore(f64),
    RestoreDefaults,
    Save,
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsError {
    /// Field name and offending value.
    Negative(&'static str, f64),
    NotANumber(&'static str),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Negative(field, value) => {
                write!(f, "{} cannot be negative (got {})", field, value)
            }
            SettingsError::NotANumber(field) => write!(f, "{} must be a number", field),
        }
    }
}

impl Error for SettingsError {}

/// Grading settings dialog: edits a draft copy and commits it on save.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GradingSettings {
    pub saved: GradingBreakdown,
    pub draft: GradingBreakdown,
    pub error: Option<String>,
}

impl GradingSettings {
    pub fn new(saved: GradingBreakdown) -> Self {
        GradingSettings {
            saved,
            draft: saved,
            error: None,
        }
    }

    pub fn reduce(&mut self, action: GradingSettingsAction) {
        match action {
            GradingSettingsAction::SetAttendanceWeight(v) => self.draft.attendance = v,
            GradingSettingsAction::SetActivityWeight(v) => self.draft.activity = v,
            GradingSettingsAction::SetAssignmentWeight(v) => self.draft.assignment = v,
            GradingSettingsAction::SetMidtermWeight(v) => self.draft.midterm_exam = v,
            GradingSettingsAction::SetFinalExamWeight(v) => self.draft.final_exam = v,
            GradingSettingsAction::SetMaxAttendanceScore(v) => self.draft.max_attendance_score = v,
            GradingSettingsAction::SetMaxMidtermScore(v) => self.draft.max_midterm_score = v,
            GradingSettingsAction::SetMaxFinalExamScore(v) => self.draft.max_final_exam_score = v,
            GradingSettingsAction::RestoreDefaults => self.draft = GradingBreakdown::default(),
            GradingSettingsAction::Save => {
                if let Err(e) = self.save() {
                    self.error = Some(e.to_string());
                }
            }
            GradingSettingsAction::Cancel => {
                self.draft = self.saved;
                self.error = None;
            }
        }
    }

    /// Validates the draft and makes it the active breakdown.
    pub fn save(&mut self) -> Result<GradingBreakdown, SettingsError> {
        validate(&self.draft)?;
        self.saved = self.draft;
        self.error = None;
        debug!(
            "grading breakdown saved: quarterly weights total {}",
            self.saved.quarterly_weight_total()
        );
        Ok(self.saved)
    }

    pub fn is_dirty(&self) -> bool {
        self.draft != self.saved
    }

    /// Quarterly weight total of the draft when it does not add up to 100.
    pub fn weight_total_warning(&self) -> Option<f64> {
        let total = self.draft.quarterly_weight_total();
        if (total - 100.0).abs() > 1e-9 {
            Some(total)
        } else {
            None
        }
    }
}

pub fn validate(breakdown: &GradingBreakdown) -> Result<(), SettingsError> {
    let fields: [(&'static str, f64); 8] = [
        ("Attendance weight", breakdown.attendance),
        ("Activity weight", breakdown.activity),
        ("Assignment weight", breakdown.assignment),
        ("Midterm exam weight", breakdown.midterm_exam),
        ("Final exam weight", breakdown.final_exam),
        ("Max attendance score", breakdown.max_attendance_score),
        ("Max midterm score", breakdown.max_midterm_score),
        ("Max final exam score", breakdown.max_final_exam_score),
    ];
    for (name, value) in fields {
        if !value.is_finite() {
            return Err(SettingsError::NotANumber(name));
        }
        if value < 0.0 {
            return Err(SettingsError::Negative(name, value));
        }
    }
    Ok(())
}
