use chrono::NaiveTime;

pub const MIN_LESSON_MINUTES: i64 = 30;
pub const MAX_LESSON_MINUTES: i64 = 180;

const CLOCK_FORMAT: &str = "%H:%M";

/// How touching endpoints are treated when testing two spans for overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// `s1 <= e2 && e1 >= s2`: a lesson ending at 09:50 blocks one starting at 09:50.
    #[default]
    Inclusive,
    /// `s1 < e2 && e1 > s2`: back-to-back lessons are allowed.
    AllowAdjacent,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpanError {
    #[error("end time {end} must be after start time {start}")]
    NotAfterStart { start: String, end: String },
    #[error("lesson is {minutes} minutes; minimum is {}", MIN_LESSON_MINUTES)]
    TooShort { minutes: i64 },
    #[error("lesson is {minutes} minutes; maximum is {}", MAX_LESSON_MINUTES)]
    TooLong { minutes: i64 },
}

pub fn parse_clock(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), CLOCK_FORMAT).ok()
}

pub fn format_clock(t: NaiveTime) -> String {
    t.format(CLOCK_FORMAT).to_string()
}

/// A same-day wall-clock interval `[start, end)` that satisfies the lesson
/// duration bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpan {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeSpan {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, SpanError> {
        if end <= start {
            return Err(SpanError::NotAfterStart {
                start: format_clock(start),
                end: format_clock(end),
            });
        }
        let minutes = (end - start).num_minutes();
        if minutes < MIN_LESSON_MINUTES {
            return Err(SpanError::TooShort { minutes });
        }
        if minutes > MAX_LESSON_MINUTES {
            return Err(SpanError::TooLong { minutes });
        }
        Ok(Self { start, end })
    }

    /// Span of a stored lesson. Stored rows already passed [`TimeSpan::new`]
    /// so only ordering is enforced here.
    pub fn stored(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn overlaps(&self, other: &TimeSpan, policy: OverlapPolicy) -> bool {
        match policy {
            OverlapPolicy::Inclusive => self.start <= other.end && self.end >= other.start,
            OverlapPolicy::AllowAdjacent => self.start < other.end && self.end > other.start,
        }
    }
}
