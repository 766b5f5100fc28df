use chrono::NaiveDate;

/// Daily study hours preselected in the form.
pub const DEFAULT_DAILY_HOURS: u32 = 4;

/// Accepted range for daily study hours.
pub const DAILY_HOURS_RANGE: std::ops::RangeInclusive<u32> = 1..=24;

/// Reasons a submission is rejected before any external call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanRequestError {
    #[error("Please upload a PDF or paste text first.")]
    MissingSyllabus,
    #[error("Please select your exam date first.")]
    MissingExamDate,
    #[error("Daily study hours must be between 1 and 24 (got {0}).")]
    HoursOutOfRange(u32),
}

/// A validated plan request. Transient: never persisted.
///
/// Doubles as the memoization key for generated plans, so two requests
/// compare equal exactly when all three inputs match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanRequest {
    syllabus_text: String,
    exam_date: NaiveDate,
    daily_hours: u32,
}

impl PlanRequest {
    /// Validate raw form input.
    ///
    /// Checks run in form order: syllabus, then exam date, then hours.
    pub fn new(
        syllabus_text: impl Into<String>,
        exam_date: Option<NaiveDate>,
        daily_hours: u32,
    ) -> Result<Self, PlanRequestError> {
        let syllabus_text = syllabus_text.into();
        if syllabus_text.trim().is_empty() {
            return Err(PlanRequestError::MissingSyllabus);
        }
        let exam_date = exam_date.ok_or(PlanRequestError::MissingExamDate)?;
        if !DAILY_HOURS_RANGE.contains(&daily_hours) {
            return Err(PlanRequestError::HoursOutOfRange(daily_hours));
        }
        Ok(Self {
            syllabus_text,
            exam_date,
            daily_hours,
        })
    }

    /// The full syllabus as submitted (not yet truncated).
    pub fn syllabus_text(&self) -> &str {
        &self.syllabus_text
    }

    pub fn exam_date(&self) -> NaiveDate {
        self.exam_date
    }

    pub fn daily_hours(&self) -> u32 {
        self.daily_hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2026, 12, 1)
    }

    #[test]
    fn accepts_valid_input() {
        let req = PlanRequest::new("Kinematics", date(), 4).unwrap();
        assert_eq!(req.syllabus_text(), "Kinematics");
        assert_eq!(req.exam_date(), date().unwrap());
        assert_eq!(req.daily_hours(), 4);
    }

    #[test]
    fn rejects_empty_and_blank_syllabus() {
        assert_eq!(
            PlanRequest::new("", date(), 4).unwrap_err(),
            PlanRequestError::MissingSyllabus
        );
        assert_eq!(
            PlanRequest::new("  \n\t", date(), 4).unwrap_err(),
            PlanRequestError::MissingSyllabus
        );
    }

    #[test]
    fn rejects_missing_date() {
        assert_eq!(
            PlanRequest::new("Optics", None, 4).unwrap_err(),
            PlanRequestError::MissingExamDate
        );
    }

    #[test]
    fn syllabus_is_checked_before_date() {
        assert_eq!(
            PlanRequest::new("", None, 4).unwrap_err(),
            PlanRequestError::MissingSyllabus
        );
    }

    #[test]
    fn hours_bounds_are_inclusive() {
        assert!(PlanRequest::new("x", date(), 1).is_ok());
        assert!(PlanRequest::new("x", date(), 24).is_ok());
        assert_eq!(
            PlanRequest::new("x", date(), 0).unwrap_err(),
            PlanRequestError::HoursOutOfRange(0)
        );
        assert_eq!(
            PlanRequest::new("x", date(), 25).unwrap_err(),
            PlanRequestError::HoursOutOfRange(25)
        );
    }

    #[test]
    fn warnings_read_like_form_messages() {
        assert_eq!(
            PlanRequestError::MissingSyllabus.to_string(),
            "Please upload a PDF or paste text first."
        );
        assert_eq!(
            PlanRequestError::MissingExamDate.to_string(),
            "Please select your exam date first."
        );
    }
}
