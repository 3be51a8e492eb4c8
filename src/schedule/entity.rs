use std::collections::HashSet;
use std::fmt;

use super::day::Day;
use super::span::TimeSpan;

/// The entity tables the scheduler and its CRUD surface touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Class,
    Teacher,
    Subject,
    Lesson,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Class => "class",
            EntityKind::Teacher => "teacher",
            EntityKind::Subject => "subject",
            EntityKind::Lesson => "lesson",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Class => "classes",
            EntityKind::Teacher => "teachers",
            EntityKind::Subject => "subjects",
            EntityKind::Lesson => "lessons",
        }
    }

    /// Column on `lessons` that references this entity, if any.
    pub fn lesson_column(self) -> Option<&'static str> {
        match self {
            EntityKind::Class => Some("class_id"),
            EntityKind::Teacher => Some("teacher_id"),
            EntityKind::Subject => Some("subject_id"),
            EntityKind::Lesson => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRecord {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherRecord {
    pub id: String,
    pub name: String,
    pub subject_ids: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRecord {
    pub id: String,
    pub name: String,
    pub teacher_ids: HashSet<String>,
}

/// A stored lesson with the display names of its class, teacher and subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonRecord {
    pub id: String,
    pub name: String,
    pub day: Day,
    pub span: TimeSpan,
    pub class_id: String,
    pub class_name: String,
    pub teacher_id: String,
    pub teacher_name: String,
    pub subject_id: String,
    pub subject_name: String,
}

/// Fields written when a placement is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLesson {
    pub name: String,
    pub day: Day,
    pub span: TimeSpan,
    pub class_id: String,
    pub teacher_id: String,
    pub subject_id: String,
}

pub fn lesson_name(subject: &str, class: &str) -> String {
    format!("{} - {}", subject, class)
}
