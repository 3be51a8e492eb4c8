use std::fmt;
use std::str::FromStr;

/// Day of the week a lesson recurs on. Numbering follows the calendar
/// convention used on the wire: Sunday = 0 through Saturday = 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Day {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Sunday,
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];

    pub fn number(self) -> u8 {
        match self {
            Day::Sunday => 0,
            Day::Monday => 1,
            Day::Tuesday => 2,
            Day::Wednesday => 3,
            Day::Thursday => 4,
            Day::Friday => 5,
            Day::Saturday => 6,
        }
    }

    /// Inverse of [`Day::number`]. Anything outside 0..=6 is rejected.
    pub fn from_number(n: u8) -> Option<Day> {
        match n {
            0 => Some(Day::Sunday),
            1 => Some(Day::Monday),
            2 => Some(Day::Tuesday),
            3 => Some(Day::Wednesday),
            4 => Some(Day::Thursday),
            5 => Some(Day::Friday),
            6 => Some(Day::Saturday),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Day::Sunday => "Sunday",
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
        }
    }

    pub fn is_weekend(self) -> bool {
        matches!(self, Day::Saturday | Day::Sunday)
    }

    /// Position of this day in a week that starts on `first`.
    pub fn offset_from(self, first: Day) -> u8 {
        (self.number() + 7 - first.number()) % 7
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown day of week: {0:?}")]
pub struct UnknownDay(pub String);

impl FromStr for Day {
    type Err = UnknownDay;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Day::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownDay(s.to_string()))
    }
}
