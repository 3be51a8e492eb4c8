//! Weekly lesson placement: duration and qualification checks plus
//! teacher/class overlap detection against a [`LessonRepository`].

mod day;
mod entity;
mod error;
mod repository;
mod span;
mod validator;

pub use day::Day;
pub use entity::EntityKind;
pub use error::ScheduleError;
pub use repository::{LessonFilter, SqliteRepository};
pub use span::OverlapPolicy;
pub use validator::{
    reschedule_lesson, schedule_lesson, CalendarEvent, PlacementRequest, Scheduled,
};
