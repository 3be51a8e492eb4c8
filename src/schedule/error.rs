use std::fmt;

use super::entity::EntityKind;
use super::span::SpanError;

/// Which side of a placement collided with an existing lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSide {
    Teacher,
    Class,
}

impl ConflictSide {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictSide::Teacher => "teacher",
            ConflictSide::Class => "class",
        }
    }
}

impl fmt::Display for ConflictSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which half of the teacher/subject qualification pairing is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualificationGap {
    /// The teacher's qualified subjects do not include the subject.
    TeacherLacksSubject,
    /// The subject's qualified teachers do not include the teacher.
    SubjectLacksTeacher,
}

impl QualificationGap {
    pub fn as_str(self) -> &'static str {
        match self {
            QualificationGap::TeacherLacksSubject => "teacherLacksSubject",
            QualificationGap::SubjectLacksTeacher => "subjectLacksTeacher",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid {field}: {message}")]
    InvalidInput { field: &'static str, message: String },

    #[error("invalid lesson duration: {0}")]
    InvalidDuration(#[from] SpanError),

    #[error("{kind} not found: {name}")]
    NotFound { kind: EntityKind, name: String },

    #[error("{}", not_qualified_message(.gap, .teacher, .subject))]
    NotQualified {
        gap: QualificationGap,
        teacher: String,
        subject: String,
    },

    #[error("{side} {who} already has {subject} ({start}-{end}) at that time")]
    ScheduleConflict {
        side: ConflictSide,
        who: String,
        subject: String,
        lesson_id: String,
        start: String,
        end: String,
    },

    #[error("repository failure: {message}")]
    Repository { message: String },
}

fn not_qualified_message(gap: &QualificationGap, teacher: &str, subject: &str) -> String {
    match gap {
        QualificationGap::TeacherLacksSubject => {
            format!("teacher {} is not qualified to teach {}", teacher, subject)
        }
        QualificationGap::SubjectLacksTeacher => {
            format!("subject {} does not list {} as a qualified teacher", subject, teacher)
        }
    }
}

impl ScheduleError {
    /// Wrap a collaborator failure. Logged here since it is the one kind
    /// that is not an expected outcome.
    pub fn repository(e: anyhow::Error) -> Self {
        let message = format!("{:#}", e);
        tracing::error!(error = %message, "lesson repository failure");
        ScheduleError::Repository { message }
    }

    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        ScheduleError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Stable machine-readable code, used as the IPC error code.
    pub fn code(&self) -> &'static str {
        match self {
            ScheduleError::InvalidInput { .. } => "bad_params",
            ScheduleError::InvalidDuration(_) => "invalid_duration",
            ScheduleError::NotFound { .. } => "not_found",
            ScheduleError::NotQualified { .. } => "not_qualified",
            ScheduleError::ScheduleConflict { .. } => "schedule_conflict",
            ScheduleError::Repository { .. } => "repository_failure",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ScheduleError::InvalidInput { field, .. } => {
                Some(serde_json::json!({ "field": field }))
            }
            ScheduleError::NotFound { kind, name } => {
                Some(serde_json::json!({ "entity": kind.label(), "name": name }))
            }
            ScheduleError::NotQualified {
                gap,
                teacher,
                subject,
            } => Some(serde_json::json!({
                "direction": gap.as_str(),
                "teacher": teacher,
                "subject": subject
            })),
            ScheduleError::ScheduleConflict {
                side,
                subject,
                lesson_id,
                start,
                end,
                ..
            } => Some(serde_json::json!({
                "side": side.as_str(),
                "subject": subject,
                "lessonId": lesson_id,
                "startTime": start,
                "endTime": end
            })),
            ScheduleError::InvalidDuration(_) | ScheduleError::Repository { .. } => None,
        }
    }
}
