use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Column headers of the backing CSV file, in order.
pub const COLUMNS: [&str; 3] = ["Date", "Task", "Duration"];

// US layouts come before `%Y/%m/%d` because chrono's `%Y` also takes one or
// two digit years.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%Y/%m/%d"];
const MIN_YEAR: i32 = 1000;
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// One logged chore: when it happened, what it was and how long it took.
///
/// Fields hold the text exactly as it was written to the backing file, so a
/// record always survives a store/load cycle unchanged. Typed values are
/// obtained through [`Record::parsed_date`] and [`Record::parsed_duration`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Date")]
    pub date: String,

    #[serde(rename = "Task")]
    pub task: String,

    /// Duration in minutes
    #[serde(rename = "Duration")]
    pub duration: String,
}

impl Record {
    pub fn new(date: impl Into<String>, task: impl Into<String>, duration: impl Into<String>) -> Self {
        Record {
            date: date.into(),
            task: task.into(),
            duration: duration.into(),
        }
    }

    /// Builds a record from a numeric duration, as submitted by the entry form.
    pub fn with_minutes(date: impl Into<String>, task: impl Into<String>, minutes: f64) -> Self {
        Record::new(date, task, minutes.to_string())
    }

    /// Builds a record from the raw fields of the entry form.
    ///
    /// Unlike rows read back from the file, a submitted duration has to be a
    /// finite, non-negative number.
    pub fn from_entry(date: &str, task: &str, duration: &str) -> Result<Self> {
        let minutes = parse_duration(duration).ok_or_else(|| {
            TrackerError::InvalidEntry(format!("duration {:?} is not a number", duration))
        })?;
        if minutes < 0.0 {
            return Err(TrackerError::InvalidEntry(format!(
                "duration must not be negative, got {}",
                minutes
            )));
        }

        Ok(Record::with_minutes(date.trim(), task.trim(), minutes))
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_date(&self.date)
    }

    pub fn parsed_duration(&self) -> Option<f64> {
        parse_duration(&self.duration)
    }
}

/// Ordered collection of records, in insertion order. Duplicates are allowed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new() -> Self {
        RecordSet::default()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn columns(&self) -> [&'static str; 3] {
        COLUMNS
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        RecordSet { records }
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        RecordSet {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Coerces free text to a calendar date.
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, `MM/DD/YYYY`, `MM/DD/YY` (read as
/// 20YY or 19YY), ISO date-times with either a `T` or a space separator, and
/// RFC 3339 timestamps. Returns `None` for anything else instead of failing,
/// including dates before the year 1000.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    parse_any_date(text.trim()).filter(|date| date.year() >= MIN_YEAR)
}

fn parse_any_date(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime.date());
        }
    }

    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|datetime| datetime.date_naive())
}

/// Coerces free text to a number of minutes.
///
/// Empty, non-numeric and non-finite text yields `None`. Negative values are
/// passed through untouched.
pub fn parse_duration(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
