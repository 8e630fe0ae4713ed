//! Habit streaks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Habits that carry a streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakKind {
    Workout,
    #[serde(rename = "checkin")]
    CheckIn,
    Water,
    Sleep,
}

impl StreakKind {
    pub const ALL: [StreakKind; 4] = [
        StreakKind::Workout,
        StreakKind::CheckIn,
        StreakKind::Water,
        StreakKind::Sleep,
    ];
}

/// Continuity record for one habit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Streak {
    #[serde(rename = "type")]
    pub kind: StreakKind,
    pub current: u32,
    pub longest: u32,
    /// Last day a completion was recorded. Stored as `""` when never.
    #[serde(with = "date_or_empty")]
    pub last_date: Option<NaiveDate>,
}

impl Streak {
    pub fn new(kind: StreakKind) -> Self {
        Self {
            kind,
            current: 0,
            longest: 0,
            last_date: None,
        }
    }

    /// Record a completion on `completed_on`.
    ///
    /// - same day as the last completion: unchanged
    /// - the day after: `current + 1`
    /// - any later day, or no previous completion: `current = 1`
    ///
    /// Completions dated before `last_date` are ignored rather than treated
    /// as a gap. Restarting at 1 would move `last_date` backwards and let a
    /// day count twice.
    pub fn advance(&self, completed_on: NaiveDate) -> Streak {
        let current = match self.last_date {
            Some(last) if completed_on <= last => return self.clone(),
            Some(last) if last.succ_opt() == Some(completed_on) => self.current + 1,
            _ => 1,
        };

        Streak {
            kind: self.kind,
            current,
            longest: self.longest.max(current),
            last_date: Some(completed_on),
        }
    }

    /// Reset `current` to 0 when the streak was neither extended today nor
    /// yesterday. `longest` and `last_date` are kept.
    pub fn check_lapse(&self, today: NaiveDate) -> Streak {
        let alive = match self.last_date {
            None => true,
            Some(last) => last >= today || last.succ_opt() == Some(today),
        };
        if alive || self.current == 0 {
            return self.clone();
        }

        Streak {
            current: 0,
            ..self.clone()
        }
    }
}

/// Apply [`Streak::check_lapse`] to every streak. Returns the new streaks and
/// whether any of them changed.
pub fn evaluate_lapses(streaks: &[Streak], today: NaiveDate) -> (Vec<Streak>, bool) {
    let mut changed = false;
    let evaluated = streaks
        .iter()
        .map(|streak| {
            let next = streak.check_lapse(today);
            changed |= next != *streak;
            next
        })
        .collect();
    (evaluated, changed)
}

mod date_or_empty {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => s.serialize_str(&date.format(FORMAT).to_string()),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(d)?.unwrap_or_default();
        if raw.is_empty() {
            return Ok(None);
        }
        // Older clients stored full ISO timestamps.
        let day = raw.get(..10).unwrap_or(&raw);
        NaiveDate::parse_from_str(day, FORMAT)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}
