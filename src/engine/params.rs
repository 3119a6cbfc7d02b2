//! Typed parsing of slot queries and booking requests.
//!
//! Query strings and JSON bodies arrive as loose strings; everything here
//! turns them into checked values before they reach the slot computation
//! or the ledger.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Deserialize;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

const DEFAULT_START: &str = "12:00";
const DEFAULT_END: &str = "00:00";
const DEFAULT_DURATION_MINUTES: u32 = 60;
const DEFAULT_STEP_MINUTES: u32 = 30;
const DEFAULT_COUNT: u32 = 1;

/// Raw `/api/slots` query string. Empty values count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotParams {
    pub date: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub duration_minutes: Option<String>,
    pub step_minutes: Option<String>,
    pub count: Option<String>,
    pub group_id: Option<String>,
}

/// A validated slot search on one naive local day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotQuery {
    pub date: NaiveDate,
    /// Minute of day, `0..1440`.
    pub start_minute: u32,
    /// Minute of day as requested; see [`SlotQuery::effective_end_minute`].
    pub end_minute: u32,
    pub duration_minutes: u32,
    pub step_minutes: u32,
    /// Stations that must be free at once for a slot to be reported.
    pub count: u32,
    /// Restrict capacity to one hall.
    pub group_id: Option<GroupId>,
}

impl SlotQuery {
    pub fn new(
        date: NaiveDate,
        start_minute: u32,
        end_minute: u32,
        duration_minutes: u32,
        step_minutes: u32,
        count: u32,
    ) -> Result<Self, EngineError> {
        if start_minute >= MINUTES_PER_DAY || end_minute >= MINUTES_PER_DAY {
            return Err(EngineError::LimitExceeded("minute of day out of range"));
        }
        let positive = |field: &'static str, value: u32| {
            if value == 0 {
                Err(EngineError::InvalidNumber {
                    field,
                    value: value.to_string(),
                })
            } else {
                Ok(value)
            }
        };
        positive("duration_minutes", duration_minutes)?;
        positive("step_minutes", step_minutes)?;
        positive("count", count)?;
        // The window reaches the next midnight, so that day must exist too.
        if date.succ_opt().is_none() {
            return Err(EngineError::InvalidDate(date.to_string()));
        }
        Ok(Self {
            date,
            start_minute,
            end_minute,
            duration_minutes,
            step_minutes,
            count,
            group_id: None,
        })
    }

    pub fn in_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// An end at midnight, or at or before the start, means the end of
    /// `date` (minute 1440).
    pub fn effective_end_minute(&self) -> u32 {
        if self.end_minute == 0 || self.end_minute <= self.start_minute {
            MINUTES_PER_DAY
        } else {
            self.end_minute
        }
    }

    /// Absolute instant `minute` minutes after the start of `date`,
    /// saturating at the end of chrono's range.
    pub fn instant(&self, minute: u32) -> NaiveDateTime {
        self.date
            .and_time(NaiveTime::default())
            .checked_add_signed(Duration::minutes(i64::from(minute)))
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// The resolved search window.
    pub fn window(&self) -> Span {
        Span::new(
            self.instant(self.start_minute),
            self.instant(self.effective_end_minute()),
        )
    }
}

impl TryFrom<SlotParams> for SlotQuery {
    type Error = EngineError;

    fn try_from(params: SlotParams) -> Result<Self, Self::Error> {
        let date = present(params.date.as_deref()).ok_or(EngineError::MissingDate)?;
        let date = parse_date(date)?;
        let start = parse_minute_of_day(present(params.start.as_deref()).unwrap_or(DEFAULT_START))?;
        let end = parse_minute_of_day(present(params.end.as_deref()).unwrap_or(DEFAULT_END))?;
        let duration = parse_positive(
            "duration_minutes",
            params.duration_minutes.as_deref(),
            DEFAULT_DURATION_MINUTES,
        )?;
        let step = parse_positive("step_minutes", params.step_minutes.as_deref(), DEFAULT_STEP_MINUTES)?;
        let count = parse_positive("count", params.count.as_deref(), DEFAULT_COUNT)?;

        let query = SlotQuery::new(date, start, end, duration, step, count)?;
        match present(params.group_id.as_deref()) {
            Some(raw) => {
                let group_id = raw.parse().map_err(|_| EngineError::InvalidNumber {
                    field: "group_id",
                    value: raw.to_string(),
                })?;
                Ok(query.in_group(group_id))
            }
            None => Ok(query),
        }
    }
}

/// JSON body of `POST /api/book`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub hosts: Vec<StationId>,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub client_phone: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
}

impl TryFrom<BookingRequest> for NewReservation {
    type Error = EngineError;

    fn try_from(request: BookingRequest) -> Result<Self, Self::Error> {
        let from = parse_timestamp(&request.from)?;
        let to = parse_timestamp(&request.to)?;
        if from >= to {
            return Err(EngineError::EmptySpan);
        }
        Ok(NewReservation {
            stations: request.hosts,
            span: Span::new(from, to),
            comment: non_empty(request.comment),
            client_phone: non_empty(request.client_phone),
            client_name: non_empty(request.client_name),
        })
    }
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

fn parse_positive(field: &'static str, raw: Option<&str>, default: u32) -> Result<u32, EngineError> {
    let Some(raw) = present(raw) else {
        return Ok(default);
    };
    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(EngineError::InvalidNumber {
            field,
            value: raw.to_string(),
        }),
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| EngineError::InvalidDate(raw.to_string()))
}

/// `HH:MM` or `HH:MM:SS` to minute of day. Seconds are dropped.
pub fn parse_minute_of_day(raw: &str) -> Result<u32, EngineError> {
    let raw = raw.trim();
    let time = NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| EngineError::InvalidTime(raw.to_string()))?;
    Ok(time.hour() * 60 + time.minute())
}

/// Naive local timestamp. Accepts the kiosk's `YYYY-MM-DD HH:MM:SS`, ISO
/// `YYYY-MM-DDTHH:MM[:SS[.fff]]`, or RFC 3339 with an offset, in which case
/// the wall time in that offset is kept.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, EngineError> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    let raw = raw.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|t| t.naive_local()))
        .ok_or_else(|| EngineError::InvalidTimestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(date: &str) -> SlotParams {
        SlotParams {
            date: Some(date.into()),
            ..SlotParams::default()
        }
    }

    #[test]
    fn defaults_apply() {
        let query = SlotQuery::try_from(params("2024-06-01")).unwrap();
        assert_eq!(query.date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(query.start_minute, 12 * 60);
        assert_eq!(query.end_minute, 0);
        assert_eq!(query.duration_minutes, 60);
        assert_eq!(query.step_minutes, 30);
        assert_eq!(query.count, 1);
        assert_eq!(query.group_id, None);
    }

    #[test]
    fn empty_values_fall_back_to_defaults() {
        let query = SlotQuery::try_from(SlotParams {
            start: Some(String::new()),
            count: Some(" ".into()),
            ..params("2024-06-01")
        })
        .unwrap();
        assert_eq!(query.start_minute, 720);
        assert_eq!(query.count, 1);
    }

    #[test]
    fn missing_date_is_rejected() {
        let err = SlotQuery::try_from(SlotParams::default()).unwrap_err();
        assert!(matches!(err, EngineError::MissingDate));
        let err = SlotQuery::try_from(params("")).unwrap_err();
        assert!(matches!(err, EngineError::MissingDate));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            SlotQuery::try_from(params("2024-13-01")),
            Err(EngineError::InvalidDate(_))
        ));
        assert!(matches!(
            SlotQuery::try_from(SlotParams {
                start: Some("noon".into()),
                ..params("2024-06-01")
            }),
            Err(EngineError::InvalidTime(_))
        ));
        for (field, value) in [("duration", "0"), ("step", "-30"), ("count", "two")] {
            let mut p = params("2024-06-01");
            match field {
                "duration" => p.duration_minutes = Some(value.into()),
                "step" => p.step_minutes = Some(value.into()),
                _ => p.count = Some(value.into()),
            }
            assert!(
                matches!(SlotQuery::try_from(p), Err(EngineError::InvalidNumber { .. })),
                "{field}={value} should be rejected"
            );
        }
    }

    #[test]
    fn long_duration_and_step_are_accepted() {
        let query = SlotQuery::try_from(SlotParams {
            duration_minutes: Some("1500".into()),
            step_minutes: Some("2000".into()),
            ..params("2024-06-01")
        })
        .unwrap();
        assert_eq!(query.duration_minutes, 1500);
        assert_eq!(query.step_minutes, 2000);
    }

    #[test]
    fn last_representable_date_is_rejected() {
        let err = SlotQuery::try_from(params(&NaiveDate::MAX.format("%Y-%m-%d").to_string()))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidDate(_)));

        let eve = NaiveDate::MAX.pred_opt().unwrap();
        let query = SlotQuery::new(eve, 720, 0, 60, 30, 1).unwrap();
        assert_eq!(query.window().end, NaiveDate::MAX.and_time(NaiveTime::default()));
    }

    #[test]
    fn group_scope_parses() {
        let query = SlotQuery::try_from(SlotParams {
            group_id: Some("2".into()),
            ..params("2024-06-01")
        })
        .unwrap();
        assert_eq!(query.group_id, Some(2));
    }

    #[test]
    fn end_resolution() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let at = |start, end| SlotQuery::new(date, start, end, 60, 30, 1).unwrap();
        assert_eq!(at(720, 0).effective_end_minute(), 1440);
        assert_eq!(at(720, 600).effective_end_minute(), 1440);
        assert_eq!(at(720, 720).effective_end_minute(), 1440);
        assert_eq!(at(540, 720).effective_end_minute(), 720);
    }

    #[test]
    fn window_reaches_next_midnight() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let query = SlotQuery::new(date, 720, 0, 60, 30, 1).unwrap();
        let window = query.window();
        assert_eq!(window.start.to_string(), "2024-06-01 12:00:00");
        assert_eq!(window.end.to_string(), "2024-06-02 00:00:00");
    }

    #[test]
    fn minute_of_day_formats() {
        assert_eq!(parse_minute_of_day("00:00").unwrap(), 0);
        assert_eq!(parse_minute_of_day("09:30").unwrap(), 570);
        assert_eq!(parse_minute_of_day("23:59:59").unwrap(), 1439);
        assert!(parse_minute_of_day("24:00").is_err());
        assert!(parse_minute_of_day("9").is_err());
    }

    #[test]
    fn timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        for raw in [
            "2024-06-01 12:00:00",
            "2024-06-01T12:00:00",
            "2024-06-01T12:00:00.000",
            "2024-06-01T12:00",
            "2024-06-01 12:00",
            "2024-06-01T12:00:00+05:00",
            "2024-06-01T12:00:00Z",
        ] {
            assert_eq!(parse_timestamp(raw).unwrap(), expected, "{raw}");
        }
        assert!(parse_timestamp("tomorrow").is_err());
        assert!(parse_timestamp("2024-06-01").is_err());
    }

    #[test]
    fn booking_request_parses() {
        let request: BookingRequest = serde_json::from_value(serde_json::json!({
            "hosts": [1, 2],
            "from": "2024-06-01 18:00:00",
            "to": "2024-06-01 19:00:00",
            "comment": "",
            "clientPhone": "+7 700 123 45 67"
        }))
        .unwrap();
        let new = NewReservation::try_from(request).unwrap();
        assert_eq!(new.stations, vec![1, 2]);
        assert_eq!(new.span.duration_minutes(), 60);
        assert_eq!(new.comment, None);
        assert_eq!(new.client_phone.as_deref(), Some("+7 700 123 45 67"));
        assert_eq!(new.client_name, None);
    }

    #[test]
    fn booking_request_rejects_backwards_span() {
        let request = BookingRequest {
            hosts: vec![1],
            from: "2024-06-01 19:00:00".into(),
            to: "2024-06-01 19:00:00".into(),
            comment: None,
            client_phone: None,
            client_name: None,
        };
        assert!(matches!(
            NewReservation::try_from(request),
            Err(EngineError::EmptySpan)
        ));
    }
}
