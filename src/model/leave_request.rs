use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveType {
    Vacation,
    Sick,
    Personal,
    Other,
}

crate::model::text_column!(LeaveType);

impl LeaveType {
    pub fn label(&self) -> &'static str {
        match self {
            LeaveType::Vacation => "Vacation",
            LeaveType::Sick => "Sick leave",
            LeaveType::Personal => "Personal",
            LeaveType::Other => "Other",
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

crate::model::text_column!(LeaveStatus);

impl LeaveStatus {
    pub fn label(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "Pending",
            LeaveStatus::Approved => "Approved",
            LeaveStatus::Rejected => "Rejected",
            LeaveStatus::Cancelled => "Cancelled",
        }
    }
}

/// Transition requested on a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveAction {
    Approve,
    Reject,
    Cancel,
}

impl LeaveAction {
    pub fn target(&self) -> LeaveStatus {
        match self {
            LeaveAction::Approve => LeaveStatus::Approved,
            LeaveAction::Reject => LeaveStatus::Rejected,
            LeaveAction::Cancel => LeaveStatus::Cancelled,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LeaveError {
    #[error("start_date cannot be in the past")]
    StartInPast,

    #[error("end_date cannot be before start_date")]
    EndBeforeStart,

    #[error("period overlaps an approved leave from {start} to {end}")]
    Overlap { start: NaiveDate, end: NaiveDate },

    #[error("only pending requests can change status (current: {0})")]
    NotPending(LeaveStatus),
}

/// Inclusive calendar-day interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
        }
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start_date <= other.end_date && self.end_date >= other.start_date
    }

    pub fn days(&self) -> i64 {
        duration_days(self.start_date, self.end_date)
    }
}

/// Number of leave days, both ends included.
pub fn duration_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

pub fn validate_dates(range: &DateRange, today: NaiveDate) -> Result<(), LeaveError> {
    if range.start_date < today {
        return Err(LeaveError::StartInPast);
    }
    if range.end_date < range.start_date {
        return Err(LeaveError::EndBeforeStart);
    }
    Ok(())
}

/// `approved` holds the employee's APPROVED intervals.
pub fn check_overlap(range: &DateRange, approved: &[DateRange]) -> Result<(), LeaveError> {
    match approved.iter().find(|existing| existing.overlaps(range)) {
        Some(existing) => Err(LeaveError::Overlap {
            start: existing.start_date,
            end: existing.end_date,
        }),
        None => Ok(()),
    }
}

pub fn transition(current: LeaveStatus, action: LeaveAction) -> Result<LeaveStatus, LeaveError> {
    match current {
        LeaveStatus::Pending => Ok(action.target()),
        resolved => Err(LeaveError::NotPending(resolved)),
    }
}

/// Yearly leave allowance after approved days are deducted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeaveBalance {
    pub days_used: i64,
    pub days_remaining: i64,
    pub total_quota: i64,
}

impl LeaveBalance {
    pub fn compute(quota: i64, approved: &[DateRange]) -> Self {
        let days_used = approved.iter().map(DateRange::days).sum();
        Self {
            days_used,
            days_remaining: quota - days_used,
            total_quota: quota,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LeaveRequest {
    pub id: u64,
    pub employee_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_type: LeaveType,
    pub reason: String,
    pub status: LeaveStatus,
    pub request_date: DateTime<Utc>,
    pub response_date: Option<DateTime<Utc>>,
    pub response_by: Option<u64>,
    /// Display name of `response_by`, joined in by queries
    pub processed_by: Option<String>,
}

impl LeaveRequest {
    pub fn duration(&self) -> i64 {
        duration_days(self.start_date, self.end_date)
    }

    pub fn can_cancel(&self) -> bool {
        self.status == LeaveStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn duration_is_inclusive() {
        assert_eq!(duration_days(d(2024, 1, 1), d(2024, 1, 5)), 5);
        assert_eq!(duration_days(d(2024, 1, 1), d(2024, 1, 1)), 1);
    }

    #[test]
    fn end_before_start_fails_validation() {
        let range = DateRange::new(d(2024, 6, 10), d(2024, 6, 9));
        assert_eq!(
            validate_dates(&range, d(2024, 6, 1)),
            Err(LeaveError::EndBeforeStart)
        );
    }

    #[test]
    fn start_before_today_fails_validation() {
        let range = DateRange::new(d(2024, 5, 31), d(2024, 6, 3));
        assert_eq!(
            validate_dates(&range, d(2024, 6, 1)),
            Err(LeaveError::StartInPast)
        );
        let today_start = DateRange::new(d(2024, 6, 1), d(2024, 6, 1));
        assert!(validate_dates(&today_start, d(2024, 6, 1)).is_ok());
    }

    #[test]
    fn overlapping_approved_leave_is_rejected() {
        let approved = [DateRange::new(d(2024, 6, 14), d(2024, 6, 20))];
        let requested = DateRange::new(d(2024, 6, 10), d(2024, 6, 15));
        assert_eq!(
            check_overlap(&requested, &approved),
            Err(LeaveError::Overlap {
                start: d(2024, 6, 14),
                end: d(2024, 6, 20),
            })
        );
    }

    #[test]
    fn touching_intervals_overlap_but_adjacent_ones_do_not() {
        let approved = [DateRange::new(d(2024, 6, 14), d(2024, 6, 20))];
        assert!(check_overlap(&DateRange::new(d(2024, 6, 20), d(2024, 6, 22)), &approved).is_err());
        assert!(check_overlap(&DateRange::new(d(2024, 6, 21), d(2024, 6, 22)), &approved).is_ok());
        assert!(check_overlap(&DateRange::new(d(2024, 6, 1), d(2024, 6, 13)), &approved).is_ok());
        assert!(check_overlap(&DateRange::new(d(2024, 6, 15), d(2024, 6, 16)), &approved).is_err());
    }

    #[test]
    fn only_pending_requests_transition() {
        assert_eq!(
            transition(LeaveStatus::Pending, LeaveAction::Approve),
            Ok(LeaveStatus::Approved)
        );
        assert_eq!(
            transition(LeaveStatus::Pending, LeaveAction::Cancel),
            Ok(LeaveStatus::Cancelled)
        );
        for status in LeaveStatus::iter().filter(|s| *s != LeaveStatus::Pending) {
            for action in [LeaveAction::Approve, LeaveAction::Reject, LeaveAction::Cancel] {
                assert_eq!(transition(status, action), Err(LeaveError::NotPending(status)));
            }
        }
    }

    #[test]
    fn balance_deducts_approved_days() {
        let approved = [
            DateRange::new(d(2024, 3, 4), d(2024, 3, 8)),
            DateRange::new(d(2024, 7, 1), d(2024, 7, 3)),
        ];
        let balance = LeaveBalance::compute(25, &approved);
        assert_eq!(balance.days_used, 8);
        assert_eq!(balance.days_remaining, 17);
        assert_eq!(balance.total_quota, 25);
    }

    #[test]
    fn enums_use_upper_snake_text() {
        assert_eq!(LeaveStatus::Pending.as_ref(), "PENDING");
        assert_eq!("VACATION".parse::<LeaveType>().unwrap(), LeaveType::Vacation);
        assert_eq!("cancel".parse::<LeaveAction>().unwrap(), LeaveAction::Cancel);
        let parsed: LeaveType = serde_json::from_str("\"SICK\"").unwrap();
        assert_eq!(parsed, LeaveType::Sick);
    }
}
