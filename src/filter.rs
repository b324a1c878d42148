use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

use crate::records::{
    COL_AIR_TEMP_END, COL_AIR_TEMP_START, COL_CONSIDERATION, COL_EVENT, COL_HUMIDITY_END,
    COL_HUMIDITY_START, COL_LOCATION, COL_SNOW_TEMP_END, COL_SNOW_TEMP_START, COL_SNOW_TYPE,
    COL_WEATHER, Group, Header,
};

/// Numeric predicates accept a cell when its distance from the target is
/// strictly below this tolerance.
pub const NUMERIC_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Test,
    Race,
}

impl EventType {
    /// Token as it appears in the `TEST o GARA` column.
    pub fn sheet_token(self) -> &'static str {
        match self {
            EventType::Test => "TEST",
            EventType::Race => "GARA",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_token())
    }
}

/// Informal three-level classification of a group's post-event assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChoiceRank {
    First,
    Second,
    Third,
}

impl ChoiceRank {
    /// Keyword sets are configuration data, not logic: the explicit label, the
    /// ordinal word, the ordinal-numeral marker, and (for First only) an
    /// informal superlative synonym. Kept verbatim from the operators' usage;
    /// additions go through product review, not code.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            ChoiceRank::First => &["PRIMA SCELTA", "PRIMO", "MIGLIORE", "1°"],
            ChoiceRank::Second => &["SECONDA SCELTA", "SECONDO", "2°"],
            ChoiceRank::Third => &["TERZA SCELTA", "TERZO", "3°"],
        }
    }
}

impl fmt::Display for ChoiceRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChoiceRank::First => write!(f, "first"),
            ChoiceRank::Second => write!(f, "second"),
            ChoiceRank::Third => write!(f, "third"),
        }
    }
}

/// Classifies free consideration text into a single choice rank for
/// presentation highlighting. Ambiguous text resolves to the highest matching
/// rank; unlabelled text yields no match.
///
/// Filtering does not go through this: it tests the requested rank's keywords
/// directly, so text naming several ranks satisfies a filter on any of them.
pub fn classify_choice(text: &str) -> Option<ChoiceRank> {
    let upper = text.to_uppercase();
    [ChoiceRank::First, ChoiceRank::Second, ChoiceRank::Third]
        .into_iter()
        .find(|rank| rank.keywords().iter().any(|keyword| upper.contains(keyword)))
}

/// One predicate per field; unset fields impose no constraint. Numeric fields
/// carry the operator's raw text and are parsed at application time.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    pub location: Option<String>,
    pub event_type: Option<EventType>,
    pub weather: Option<String>,
    pub air_temp: Option<String>,
    pub snow_temp: Option<String>,
    pub snow_type: Option<String>,
    pub humidity: Option<String>,
    pub choice: Option<ChoiceRank>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.location.is_none()
            && self.event_type.is_none()
            && self.weather.is_none()
            && self.air_temp.is_none()
            && self.snow_temp.is_none()
            && self.snow_type.is_none()
            && self.humidity.is_none()
            && self.choice.is_none()
    }
}

/// Retains the groups satisfying every set predicate, in input order.
/// Retention is group-level: one matching row keeps the whole group.
pub fn apply(header: &Header, groups: &[Group], spec: &FilterSpec) -> Vec<Group> {
    groups
        .iter()
        .filter(|group| retains(header, group, spec))
        .cloned()
        .collect()
}

fn retains(header: &Header, group: &Group, spec: &FilterSpec) -> bool {
    if let Some(location) = &spec.location {
        if !contains_match(header, group, COL_LOCATION, location) {
            return false;
        }
    }
    if let Some(event_type) = spec.event_type {
        if !contains_match(header, group, COL_EVENT, event_type.sheet_token()) {
            return false;
        }
    }
    if let Some(weather) = &spec.weather {
        if !contains_match(header, group, COL_WEATHER, weather) {
            return false;
        }
    }
    if let Some(air_temp) = &spec.air_temp {
        if !numeric_match(
            header,
            group,
            [COL_AIR_TEMP_START, COL_AIR_TEMP_END],
            air_temp,
            false,
        ) {
            return false;
        }
    }
    if let Some(snow_temp) = &spec.snow_temp {
        if !numeric_match(
            header,
            group,
            [COL_SNOW_TEMP_START, COL_SNOW_TEMP_END],
            snow_temp,
            false,
        ) {
            return false;
        }
    }
    if let Some(snow_type) = &spec.snow_type {
        if !contains_match(header, group, COL_SNOW_TYPE, snow_type) {
            return false;
        }
    }
    if let Some(humidity) = &spec.humidity {
        if !numeric_match(
            header,
            group,
            [COL_HUMIDITY_START, COL_HUMIDITY_END],
            humidity,
            true,
        ) {
            return false;
        }
    }
    if let Some(choice) = spec.choice {
        if !choice_match(header, group, choice) {
            return false;
        }
    }
    true
}

// Case-insensitive substring over the named column, any-row semantics.
fn contains_match(header: &Header, group: &Group, column: &str, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    group
        .rows()
        .iter()
        .any(|row| header.value(row, column).to_lowercase().contains(&needle))
}

// Accepts the group when any start/end cell in any row lies strictly within
// tolerance of the target. Unparsable spec text rejects the group outright;
// unparsable cells are merely skipped.
fn numeric_match(
    header: &Header,
    group: &Group,
    columns: [&str; 2],
    spec_text: &str,
    strip_percent: bool,
) -> bool {
    let Some(target) = parse_decimal(spec_text, strip_percent) else {
        return false;
    };
    group.rows().iter().any(|row| {
        columns.iter().any(|column| {
            parse_decimal(header.value(row, column), strip_percent)
                .is_some_and(|value| (value - target).abs() < NUMERIC_TOLERANCE)
        })
    })
}

// Containment of the requested rank's keywords, independent of other ranks
// also appearing in the same text.
fn choice_match(header: &Header, group: &Group, choice: ChoiceRank) -> bool {
    group.rows().iter().any(|row| {
        let text = header.value(row, COL_CONSIDERATION).to_uppercase();
        choice.keywords().iter().any(|keyword| text.contains(keyword))
    })
}

/// Parses a decimal accepting comma as separator; optionally strips a
/// trailing `%`. Empty or non-numeric text yields `None`.
pub fn parse_decimal(text: &str, strip_percent: bool) -> Option<f64> {
    let mut trimmed = text.trim();
    if strip_percent {
        trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    }
    if trimmed.is_empty() {
        return None;
    }
    trimmed.replace(',', ".").parse::<f64>().ok()
}
