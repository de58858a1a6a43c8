use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;
use utoipa::ToSchema;

/// Kind of clock event recorded for an employee
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
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
pub enum RecordType {
    In,
    Out,
    BreakStart,
    BreakEnd,
}

crate::model::text_column!(RecordType);

impl RecordType {
    pub fn label(&self) -> &'static str {
        match self {
            RecordType::In => "Clock In",
            RecordType::Out => "Clock Out",
            RecordType::BreakStart => "Break Start",
            RecordType::BreakEnd => "Break End",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            RecordType::In => "Record your arrival",
            RecordType::Out => "Record your departure",
            RecordType::BreakStart => "Start a break",
            RecordType::BreakEnd => "End your break",
        }
    }
}

/// Record types accepted after `last`; `None` means no history at all.
pub fn next_types(last: Option<RecordType>) -> &'static [RecordType] {
    match last {
        None | Some(RecordType::Out) => &[RecordType::In],
        Some(RecordType::In) | Some(RecordType::BreakEnd) => {
            &[RecordType::Out, RecordType::BreakStart]
        }
        Some(RecordType::BreakStart) => &[RecordType::BreakEnd],
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ClockAction {
    #[schema(example = "IN")]
    pub value: RecordType,
    #[schema(example = "Clock In")]
    pub label: String,
    #[schema(example = "Record your arrival")]
    pub description: String,
}

impl From<RecordType> for ClockAction {
    fn from(value: RecordType) -> Self {
        Self {
            value,
            label: value.label().to_string(),
            description: value.description().to_string(),
        }
    }
}

pub fn available_actions(last: Option<RecordType>) -> Vec<ClockAction> {
    next_types(last).iter().copied().map(ClockAction::from).collect()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttendanceError {
    #[error("Record type '{requested}' is inconsistent with the current state (last: {})", describe(.last))]
    StateMismatch {
        requested: RecordType,
        last: Option<RecordType>,
    },
}

fn describe(last: &Option<RecordType>) -> String {
    last.map(|t| t.to_string()).unwrap_or_else(|| "none".to_string())
}

pub fn ensure_transition(
    last: Option<RecordType>,
    requested: RecordType,
) -> Result<(), AttendanceError> {
    if next_types(last).contains(&requested) {
        Ok(())
    } else {
        Err(AttendanceError::StateMismatch { requested, last })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-01-05T08:58:12Z", format = "date-time", value_type = String)]
    pub timestamp: DateTime<Utc>,
    pub record_type: RecordType,
    #[schema(example = "Main office", nullable = true)]
    pub location: Option<String>,
    #[schema(nullable = true)]
    pub note: Option<String>,
}

/// Worked time for one day of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DaySummary {
    pub total_hours: i64,
    pub total_minutes: i64,
    #[schema(example = "7h 30min")]
    pub formatted_duration: String,
    pub records_count: usize,
}

/// Sum of IN→OUT spans minus BREAK_START→BREAK_END spans, floored at zero.
/// `events` must be in chronological order.
pub fn worked_duration(events: &[(NaiveDateTime, RecordType)]) -> Duration {
    let mut total = Duration::zero();
    let mut clocked_in: Option<NaiveDateTime> = None;
    let mut break_started: Option<NaiveDateTime> = None;

    for &(at, kind) in events {
        match kind {
            RecordType::In => clocked_in = Some(at),
            RecordType::Out => {
                if let Some(start) = clocked_in.take() {
                    total = total + (at - start);
                }
            }
            RecordType::BreakStart => break_started = Some(at),
            RecordType::BreakEnd => {
                if let Some(start) = break_started.take() {
                    total = total - (at - start);
                }
            }
        }
    }

    total.max(Duration::zero())
}

pub fn summarize_day(events: &[(NaiveDateTime, RecordType)]) -> DaySummary {
    let minutes = worked_duration(events).num_minutes();
    let (hours, minutes) = (minutes / 60, minutes % 60);
    DaySummary {
        total_hours: hours,
        total_minutes: minutes,
        formatted_duration: format!("{hours}h {minutes:02}min"),
        records_count: events.len(),
    }
}

/// Monday to Friday days in `[start, end]`.
pub fn count_workdays(start: NaiveDate, end: NaiveDate) -> i64 {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as i64
}

/// History window requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = match self {
            Period::Day => today,
            Period::Week => today - Duration::days(today.weekday().num_days_from_monday() as i64),
            Period::Month => today.with_day(1).unwrap_or(today),
            Period::Year => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        };
        (start, today)
    }
}

/// Resolves the history date range. An explicit `start`/`end` pair wins over
/// `period`; if either side fails to parse the range is left open.
pub fn resolve_range(
    period: Option<Period>,
    start: Option<&str>,
    end: Option<&str>,
    today: NaiveDate,
) -> Option<(NaiveDate, NaiveDate)> {
    match (start, end) {
        (Some(s), Some(e)) => {
            let s = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
            let e = NaiveDate::parse_from_str(e, "%Y-%m-%d").ok()?;
            Some((s, e))
        }
        _ => Some(period.unwrap_or(Period::Week).bounds(today)),
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryEntry {
    pub id: u64,
    #[schema(example = "08:58:12")]
    pub time: String,
    pub record_type: RecordType,
    #[schema(example = "Clock In")]
    pub record_type_display: String,
    pub location: String,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DayHistory {
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "Monday")]
    pub day_name: String,
    pub records: Vec<HistoryEntry>,
    pub summary: DaySummary,
}

/// Groups records (local time) per calendar day: newest day first, records oldest first.
pub fn group_by_day(records: &[(NaiveDateTime, &AttendanceRecord)]) -> Vec<DayHistory> {
    let mut sorted: Vec<_> = records.to_vec();
    sorted.sort_by_key(|(at, r)| (*at, r.id));

    let mut days: Vec<DayHistory> = Vec::new();
    let mut events: Vec<Vec<(NaiveDateTime, RecordType)>> = Vec::new();

    for (at, record) in sorted {
        let date = at.date();
        if days.last().map(|d| d.date) != Some(date) {
            days.push(DayHistory {
                date,
                day_name: date.format("%A").to_string(),
                records: Vec::new(),
                summary: summarize_day(&[]),
            });
            events.push(Vec::new());
        }
        if let (Some(day), Some(day_events)) = (days.last_mut(), events.last_mut()) {
            day.records.push(HistoryEntry {
                id: record.id,
                time: at.format("%H:%M:%S").to_string(),
                record_type: record.record_type,
                record_type_display: record.record_type.label().to_string(),
                location: record.location.clone().unwrap_or_default(),
                note: record.note.clone().unwrap_or_default(),
            });
            day_events.push((at, record.record_type));
        }
    }

    for (day, day_events) in days.iter_mut().zip(events.iter()) {
        day.summary = summarize_day(day_events);
    }

    days.reverse();
    days
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonthStats {
    #[schema(example = "January 2026")]
    pub name: String,
    pub days_present: i64,
    pub days_absent: i64,
    pub total_days: i64,
    pub presence_percentage: f64,
    pub total_hours_worked: f64,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Presence figures from `month_start` through `today`, from local-time events.
pub fn month_stats(
    events: &[(NaiveDateTime, RecordType)],
    month_start: NaiveDate,
    today: NaiveDate,
) -> MonthStats {
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|(at, _)| *at);

    let mut present_days: Vec<NaiveDate> = sorted
        .iter()
        .filter(|(_, kind)| *kind == RecordType::In)
        .map(|(at, _)| at.date())
        .collect();
    present_days.dedup();
    let days_present = present_days.len() as i64;

    let mut minutes = 0i64;
    for chunk in sorted.chunk_by(|a, b| a.0.date() == b.0.date()) {
        minutes += worked_duration(chunk).num_minutes();
    }

    let total_days = count_workdays(month_start, today);
    let presence_percentage = if total_days > 0 {
        round1(days_present as f64 / total_days as f64 * 100.0)
    } else {
        0.0
    };

    MonthStats {
        name: today.format("%B %Y").to_string(),
        days_present,
        days_absent: (total_days - days_present).max(0),
        total_days,
        presence_percentage,
        total_hours_worked: round1(minutes as f64 / 60.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn values(last: Option<RecordType>) -> Vec<RecordType> {
        available_actions(last).into_iter().map(|a| a.value).collect()
    }

    #[test]
    fn no_history_or_out_allows_only_in() {
        assert_eq!(values(None), vec![RecordType::In]);
        assert_eq!(values(Some(RecordType::Out)), vec![RecordType::In]);
    }

    #[test]
    fn clocked_in_allows_out_or_break() {
        assert_eq!(
            values(Some(RecordType::In)),
            vec![RecordType::Out, RecordType::BreakStart]
        );
        assert_eq!(
            values(Some(RecordType::BreakEnd)),
            vec![RecordType::Out, RecordType::BreakStart]
        );
        assert_eq!(values(Some(RecordType::BreakStart)), vec![RecordType::BreakEnd]);
    }

    #[test]
    fn every_request_outside_the_valid_set_is_rejected() {
        let states = std::iter::once(None).chain(RecordType::iter().map(Some));
        for last in states {
            for requested in RecordType::iter() {
                let allowed = next_types(last).contains(&requested);
                assert_eq!(ensure_transition(last, requested).is_ok(), allowed);
            }
        }
    }

    #[test]
    fn break_then_out_is_rejected_and_break_end_accepted() {
        let last = Some(RecordType::BreakStart);
        assert_eq!(
            ensure_transition(last, RecordType::Out),
            Err(AttendanceError::StateMismatch {
                requested: RecordType::Out,
                last,
            })
        );
        assert!(ensure_transition(last, RecordType::BreakEnd).is_ok());
        assert_eq!(
            values(Some(RecordType::BreakEnd)),
            vec![RecordType::Out, RecordType::BreakStart]
        );
    }

    #[test]
    fn record_type_round_trips_through_text() {
        assert_eq!(RecordType::BreakStart.as_ref(), "BREAK_START");
        assert_eq!("BREAK_END".parse::<RecordType>().unwrap(), RecordType::BreakEnd);
        assert!("LUNCH".parse::<RecordType>().is_err());
        assert_eq!(
            serde_json::to_string(&RecordType::In).unwrap(),
            "\"IN\""
        );
    }

    #[test]
    fn day_summary_subtracts_breaks() {
        let events = [
            (at(3, 9, 0), RecordType::In),
            (at(3, 12, 0), RecordType::BreakStart),
            (at(3, 12, 30), RecordType::BreakEnd),
            (at(3, 17, 0), RecordType::Out),
        ];
        let summary = summarize_day(&events);
        assert_eq!(summary.total_hours, 7);
        assert_eq!(summary.total_minutes, 30);
        assert_eq!(summary.formatted_duration, "7h 30min");
        assert_eq!(summary.records_count, 4);
    }

    #[test]
    fn open_shift_with_break_never_goes_negative() {
        let events = [
            (at(3, 9, 0), RecordType::In),
            (at(3, 12, 0), RecordType::BreakStart),
            (at(3, 12, 30), RecordType::BreakEnd),
        ];
        assert_eq!(worked_duration(&events), Duration::zero());
    }

    #[test]
    fn workdays_skip_weekends() {
        let mon = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let sun = NaiveDate::from_ymd_opt(2024, 6, 9).unwrap();
        assert_eq!(count_workdays(mon, sun), 5);
        assert_eq!(count_workdays(sun, mon), 0);
    }

    #[test]
    fn week_period_starts_on_monday() {
        let thursday = NaiveDate::from_ymd_opt(2024, 6, 6).unwrap();
        let (start, end) = Period::Week.bounds(thursday);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
        assert_eq!(end, thursday);
    }

    #[test]
    fn explicit_range_wins_and_bad_dates_disable_filter() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 6).unwrap();
        assert_eq!(
            resolve_range(Some(Period::Year), Some("2024-02-01"), Some("2024-02-10"), today),
            Some((
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()
            ))
        );
        assert_eq!(resolve_range(None, Some("02/01/2024"), Some("2024-02-10"), today), None);
        assert_eq!(
            resolve_range(Some(Period::Month), None, None, today),
            Some((NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), today))
        );
    }

    #[test]
    fn history_groups_newest_day_first() {
        let rec = |id, kind| AttendanceRecord {
            id,
            employee_id: 7,
            timestamp: Utc::now(),
            record_type: kind,
            location: None,
            note: None,
        };
        let r1 = rec(1, RecordType::In);
        let r2 = rec(2, RecordType::Out);
        let r3 = rec(3, RecordType::In);
        let rows = vec![
            (at(4, 8, 0), &r3),
            (at(3, 9, 0), &r1),
            (at(3, 17, 0), &r2),
        ];

        let days = group_by_day(&rows);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 6, 4).unwrap());
        assert_eq!(days[1].records[0].id, 1);
        assert_eq!(days[1].records[1].time, "17:00:00");
        assert_eq!(days[1].summary.formatted_duration, "8h 00min");
        assert_eq!(days[0].summary.records_count, 1);
    }

    #[test]
    fn month_stats_counts_presence_and_hours() {
        let events = [
            (at(3, 9, 0), RecordType::In),
            (at(3, 17, 0), RecordType::Out),
            (at(4, 9, 0), RecordType::In),
            (at(4, 13, 30), RecordType::Out),
        ];
        let stats = month_stats(
            &events,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 7).unwrap(),
        );
        assert_eq!(stats.days_present, 2);
        assert_eq!(stats.total_days, 5);
        assert_eq!(stats.days_absent, 3);
        assert_eq!(stats.presence_percentage, 40.0);
        assert_eq!(stats.total_hours_worked, 12.5);
        assert_eq!(stats.name, "June 2024");
    }
}
