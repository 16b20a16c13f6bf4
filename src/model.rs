//! The records kept in the catalog and exchanged on the wire.
//!
//! Field names are serialized in camelCase (`birdName`, `sightingDateTime`, ...) and dates
//! use chrono's default serde representation, i.e. ISO-8601 `2023-05-01T09:30:00` for a
//! date/time and `2023-05-01` for a date.
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{BirdsError, Result};

/// the format of a sighting date/time entered on the client command line
pub const DATE_TIME_INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// the format of a date entered on the client command line, also used for printing
pub const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";

/// A bird, uniquely identified by its `name`.
///
/// None of the descriptive fields are interpreted, they are stored as entered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bird {
    /// the unique name of the bird
    pub name: String,
    /// the color of the bird
    pub color: String,
    /// the weight of the bird
    pub weight: String,
    /// the height of the bird
    pub height: String,
}

impl Bird {
    /// builds a new `Bird` from its four fields
    pub fn new(
        name: impl Into<String>,
        color: impl Into<String>,
        weight: impl Into<String>,
        height: impl Into<String>,
    ) -> Self {
        Bird {
            name: name.into(),
            color: color.into(),
            weight: weight.into(),
            height: height.into(),
        }
    }
}

/// A single observation of a bird at some location and time.
///
/// Two sightings are equal when all three fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sighting {
    /// name of the bird that was seen
    pub bird_name: String,
    /// where the bird was seen
    pub location: String,
    /// when the bird was seen
    pub sighting_date_time: NaiveDateTime,
}

impl Sighting {
    /// builds a new `Sighting`
    pub fn new(
        bird_name: impl Into<String>,
        location: impl Into<String>,
        sighting_date_time: NaiveDateTime,
    ) -> Self {
        Sighting {
            bird_name: bird_name.into(),
            location: location.into(),
            sighting_date_time,
        }
    }
}

/// The parameters of a LIST_SIGHTING request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SightingsQuery {
    /// a regular expression that must match the whole bird name
    pub bird_name_pattern: String,
    /// first day of the period to search
    pub sighting_date_start: NaiveDate,
    /// last day of the period to search
    pub sighting_date_end: NaiveDate,
}

impl SightingsQuery {
    /// builds a new query
    pub fn new(
        bird_name_pattern: impl Into<String>,
        sighting_date_start: NaiveDate,
        sighting_date_end: NaiveDate,
    ) -> Self {
        SightingsQuery {
            bird_name_pattern: bird_name_pattern.into(),
            sighting_date_start,
            sighting_date_end,
        }
    }

    /// returns true if `at` falls inside the query period.
    ///
    /// Both ends are exclusive: `at` must be after midnight of the start date and before the
    /// last nanosecond of the end date. A sighting at exactly midnight of the start date is
    /// therefore not included.
    pub fn contains(&self, at: &NaiveDateTime) -> bool {
        let after_start = self
            .sighting_date_start
            .and_hms_opt(0, 0, 0)
            .map_or(false, |start| *at > start);
        let before_end = self
            .sighting_date_end
            .and_hms_nano_opt(23, 59, 59, 999_999_999)
            .map_or(false, |end| *at < end);
        after_start && before_end
    }
}

/// parses a date/time entered as `yyyy-MM-dd HH:mm`
///
/// # Errors
/// returns [`BirdsError::BadFormat`] if `input` is not in that format
pub fn parse_date_time(input: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(input.trim(), DATE_TIME_INPUT_FORMAT)
        .map_err(|e| BirdsError::BadFormat(format!("{:?} is not a 'yyyy-MM-dd HH:mm' date/time: {}", input, e)))
}

/// parses a date entered as `yyyy-MM-dd`
///
/// # Errors
/// returns [`BirdsError::BadFormat`] if `input` is not in that format
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_INPUT_FORMAT)
        .map_err(|e| BirdsError::BadFormat(format!("{:?} is not a 'yyyy-MM-dd' date: {}", input, e)))
}
