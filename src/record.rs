//! The record builder.
//!
//! A record pairs a fixed name and power per category with a level drawn at
//! random and offset by the day of month. Time and randomness are injected
//! into `OutputRecord::new` so tests can pin them; `build` uses the real ones.

use crate::error::RecordError;
use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Constant label carried by every record.
pub const RECORD_TEXT: &str = "Greetings from the command line";

/// Format used for `OutputRecord::timestamp`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Bounds of the random draw added to the day of month. Upper bound is exclusive.
pub const LEVEL_DRAW_MIN: u32 = 1;
pub const LEVEL_DRAW_MAX: u32 = 99;

lazy_static::lazy_static! {
    static ref TIMESTAMP_RE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").unwrap();
}

/// The closed set of categories a record can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Hero,
    Champion,
}

impl Category {
    /// Every accepted category, in display order.
    pub const ALL: [Category; 2] = [Category::Hero, Category::Champion];

    /// The label accepted on the command line and printed in records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Hero => "Hero",
            Category::Champion => "Champion",
        }
    }

    /// The fixed `(name, power)` pair for this category.
    pub fn detail_pair(&self) -> (&'static str, &'static str) {
        match self {
            Category::Hero => ("Cmdlet Crusader", "Command Mastery"),
            Category::Champion => ("Pipeline Paladin", "Seamless Integration"),
        }
    }

    /// Comma separated list of the accepted labels, used in error messages.
    pub fn allowed() -> String {
        Self::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RecordError::InvalidCategory {
                value: s.to_string(),
                allowed: Self::allowed(),
            })
    }
}

/// Nested detail of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detail {
    /// Fixed per category.
    pub name: String,
    /// Fixed per category.
    pub power: String,
    /// Random draw plus the day of month of the build time.
    pub level: u32,
}

/// The record produced by a single invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Build time, formatted as `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    pub text: String,
    pub category: Category,
    pub detail: Detail,
}

impl OutputRecord {
    /// Builds a record for `category` as of `now`, drawing the level from `rng`.
    ///
    /// The level is a draw from `[LEVEL_DRAW_MIN, LEVEL_DRAW_MAX)` plus the day of month
    /// of `now`, so it always lies in `day + 1 ..= day + 98`.
    pub fn new<Tz, R>(category: Category, now: DateTime<Tz>, rng: &mut R) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
        R: Rng,
    {
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        let draw = rng.gen_range(LEVEL_DRAW_MIN..LEVEL_DRAW_MAX);
        let level = draw + now.day();
        let (name, power) = category.detail_pair();

        tracing::debug!(%category, draw, level, "built record");

        Self {
            timestamp,
            text: RECORD_TEXT.to_string(),
            category,
            detail: Detail {
                name: name.to_string(),
                power: power.to_string(),
                level,
            },
        }
    }

    /// Returns true when `timestamp` has the expected shape and is a real date and time.
    pub fn timestamp_is_well_formed(&self) -> bool {
        TIMESTAMP_RE.is_match(&self.timestamp)
            && NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT).is_ok()
    }

    /// Day of month encoded in `timestamp`, if it parses.
    pub fn day_of_month(&self) -> Option<u32> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .ok()
            .map(|t| t.day())
    }

    /// Serializes the record as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Validates `category` and builds a record for it at the current local time.
pub fn build(category: &str) -> Result<OutputRecord, RecordError> {
    let category: Category = category.parse()?;
    Ok(OutputRecord::new(
        category,
        Local::now(),
        &mut rand::thread_rng(),
    ))
}
