use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date, OffsetDateTime};

pub const MEAL_SLOTS: [MealSlot; 4] = [MealSlot(1), MealSlot(2), MealSlot(3), MealSlot(4)];

/// One of the four numbered meals of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MealSlot(u8);

impl MealSlot {
    pub fn new(n: u8) -> Option<Self> {
        (1..=4).contains(&n).then_some(Self(n))
    }

    /// Accepts `3` as well as `meal3`.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits = raw.strip_prefix("meal").unwrap_or(raw);
        digits.parse::<u8>().ok().and_then(Self::new)
    }

    /// `meal3`
    pub fn key(self) -> String {
        format!("meal{}", self.0)
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated `YYYY-MM-DD` key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(String);

impl DateKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let format = format_description!("[year]-[month]-[day]");
        Date::parse(raw, format).ok()?;
        // `time` accepts a sign and more than four year digits
        (raw.len() == 10).then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Completion timestamps, keyed `meal{N}_time` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealTimes {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
    pub meal1_time: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
    pub meal2_time: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
    pub meal3_time: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
    pub meal4_time: Option<OffsetDateTime>,
}

impl MealTimes {
    pub fn set(&mut self, slot: MealSlot, at: Option<OffsetDateTime>) {
        match slot.0 {
            1 => self.meal1_time = at,
            2 => self.meal2_time = at,
            3 => self.meal3_time = at,
            _ => self.meal4_time = at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimesheetRecord {
    #[serde(default)]
    pub meal1: bool,
    #[serde(default)]
    pub meal2: bool,
    #[serde(default)]
    pub meal3: bool,
    #[serde(default)]
    pub meal4: bool,
    #[serde(default)]
    pub note: String,
    #[serde(flatten)]
    pub times: MealTimes,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub videos: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TimesheetRecord {
    /// Sets the flag and keeps the paired timestamp in step with it.
    pub fn set_meal(&mut self, slot: MealSlot, done: bool, now: OffsetDateTime) {
        match slot.0 {
            1 => self.meal1 = done,
            2 => self.meal2 = done,
            3 => self.meal3 = done,
            _ => self.meal4 = done,
        }
        self.times.set(slot, done.then_some(now));
    }

    /// A time only stands next to a checked meal.
    pub fn drop_orphan_times(&mut self) {
        for (slot, done) in MEAL_SLOTS.into_iter().zip([self.meal1, self.meal2, self.meal3, self.meal4]) {
            if !done {
                self.times.set(slot, None);
            }
        }
    }

    pub fn apply(&mut self, patch: &RecordPatch, now: OffsetDateTime) {
        for slot in MEAL_SLOTS {
            if let Some(done) = patch.meal(slot) {
                self.set_meal(slot, done, now);
            }
        }
        if let Some(note) = &patch.note {
            self.note = note.clone();
        }
    }
}

/// The subset of fields a client may write.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecordPatch {
    pub meal1: Option<bool>,
    pub meal2: Option<bool>,
    pub meal3: Option<bool>,
    pub meal4: Option<bool>,
    pub note: Option<String>,
}

impl RecordPatch {
    pub fn meal(&self, slot: MealSlot) -> Option<bool> {
        match slot.0 {
            1 => self.meal1,
            2 => self.meal2,
            3 => self.meal3,
            _ => self.meal4,
        }
    }
}

/// Note column content written before times and extra had their own columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyNote {
    pub note: String,
    pub times: MealTimes,
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct PackedNote {
    #[serde(default)]
    note: String,
    #[serde(default)]
    times: BTreeMap<String, String>,
    #[serde(default)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl LegacyNote {
    /// Anything that isn't a packed object is a plain note.
    pub fn decode(raw: &str) -> Self {
        let bare = || Self {
            note: raw.to_string(),
            ..Self::default()
        };
        if !raw.trim_start().starts_with('{') {
            return bare();
        }
        let Ok(packed) = serde_json::from_str::<PackedNote>(raw) else {
            return bare();
        };

        let mut times = MealTimes::default();
        for (key, value) in &packed.times {
            let Some(slot) = MealSlot::parse(key) else {
                continue;
            };
            if let Ok(at) = OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339) {
                times.set(slot, Some(at));
            }
        }
        Self {
            note: packed.note,
            times,
            extra: packed.extra,
        }
    }
}
