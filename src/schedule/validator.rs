use serde::{Deserialize, Serialize};

use super::day::Day;
use super::entity::{
    lesson_name, ClassRecord, EntityKind, LessonRecord, NewLesson, SubjectRecord, TeacherRecord,
};
use super::error::{ConflictSide, QualificationGap, ScheduleError};
use super::repository::LessonRepository;
use super::span::{format_clock, parse_clock, OverlapPolicy, TimeSpan};

/// A proposed weekly lesson, addressed by display names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRequest {
    pub subject: String,
    pub class: String,
    pub teacher: String,
    pub day: String,
    pub start_time: String,
    pub end_time: String,
}

/// Shape consumed by calendar views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub day_of_week: u8,
    pub class: String,
    pub teacher: String,
}

impl From<&LessonRecord> for CalendarEvent {
    fn from(l: &LessonRecord) -> Self {
        CalendarEvent {
            title: l.name.clone(),
            start_time: format_clock(l.span.start()),
            end_time: format_clock(l.span.end()),
            day_of_week: l.day.number(),
            class: l.class_name.clone(),
            teacher: l.teacher_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheduled {
    pub lesson_id: String,
    pub event: CalendarEvent,
}

/// A placement that passed every check and can be written.
#[derive(Debug, Clone)]
pub struct Placement {
    pub class: ClassRecord,
    pub teacher: TeacherRecord,
    pub subject: SubjectRecord,
    pub day: Day,
    pub span: TimeSpan,
}

impl Placement {
    pub fn to_new_lesson(&self) -> NewLesson {
        NewLesson {
            name: lesson_name(&self.subject.name, &self.class.name),
            day: self.day,
            span: self.span,
            class_id: self.class.id.clone(),
            teacher_id: self.teacher.id.clone(),
            subject_id: self.subject.id.clone(),
        }
    }
}

fn parse_slot(req: &PlacementRequest) -> Result<(Day, TimeSpan), ScheduleError> {
    let day = req
        .day
        .parse::<Day>()
        .map_err(|e| ScheduleError::InvalidInput {
            field: "day",
            message: e.to_string(),
        })?;
    let start = parse_clock(&req.start_time).ok_or_else(|| ScheduleError::InvalidInput {
        field: "startTime",
        message: format!("expected HH:MM, got {:?}", req.start_time),
    })?;
    let end = parse_clock(&req.end_time).ok_or_else(|| ScheduleError::InvalidInput {
        field: "endTime",
        message: format!("expected HH:MM, got {:?}", req.end_time),
    })?;
    let span = TimeSpan::new(start, end)?;
    Ok((day, span))
}

fn resolve<R: LessonRepository + ?Sized>(
    repo: &R,
    req: &PlacementRequest,
) -> Result<(ClassRecord, SubjectRecord, TeacherRecord), ScheduleError> {
    let class = repo
        .find_class_by_name(&req.class)
        .map_err(ScheduleError::repository)?
        .ok_or_else(|| ScheduleError::not_found(EntityKind::Class, req.class.trim()))?;
    let subject = repo
        .find_subject_by_name(&req.subject)
        .map_err(ScheduleError::repository)?
        .ok_or_else(|| ScheduleError::not_found(EntityKind::Subject, req.subject.trim()))?;
    let teacher = repo
        .find_teacher_by_name(&req.teacher)
        .map_err(ScheduleError::repository)?
        .ok_or_else(|| ScheduleError::not_found(EntityKind::Teacher, req.teacher.trim()))?;
    Ok((class, subject, teacher))
}

fn check_qualification(
    teacher: &TeacherRecord,
    subject: &SubjectRecord,
) -> Result<(), ScheduleError> {
    let gap = if !teacher.subject_ids.contains(&subject.id) {
        Some(QualificationGap::TeacherLacksSubject)
    } else if !subject.teacher_ids.contains(&teacher.id) {
        Some(QualificationGap::SubjectLacksTeacher)
    } else {
        None
    };
    match gap {
        Some(gap) => Err(ScheduleError::NotQualified {
            gap,
            teacher: teacher.name.clone(),
            subject: subject.name.clone(),
        }),
        None => Ok(()),
    }
}

/// First lesson the placement collides with. Teacher clashes win over class
/// clashes; within a side the earliest-starting lesson is reported.
fn find_conflict<'a>(
    existing: &'a [LessonRecord],
    placement: &Placement,
    policy: OverlapPolicy,
    moving: Option<&str>,
) -> Option<(ConflictSide, &'a LessonRecord)> {
    let clashing = move |side: ConflictSide| {
        existing
            .iter()
            .filter(|l| l.day == placement.day)
            .filter(|l| moving != Some(l.id.as_str()))
            .filter(|l| match side {
                ConflictSide::Teacher => l.teacher_id == placement.teacher.id,
                ConflictSide::Class => l.class_id == placement.class.id,
            })
            .filter(|l| l.span.overlaps(&placement.span, policy))
            .min_by(|a, b| {
                a.span
                    .start()
                    .cmp(&b.span.start())
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|l| (side, l))
    };
    clashing(ConflictSide::Teacher).or_else(|| clashing(ConflictSide::Class))
}

/// Runs every check short of writing. `moving` names a lesson that is being
/// rescheduled and must not conflict with itself.
pub fn check_placement<R: LessonRepository + ?Sized>(
    repo: &R,
    req: &PlacementRequest,
    policy: OverlapPolicy,
    moving: Option<&str>,
) -> Result<Placement, ScheduleError> {
    let (day, span) = parse_slot(req)?;
    let (class, subject, teacher) = resolve(repo, req)?;
    check_qualification(&teacher, &subject)?;

    let placement = Placement {
        class,
        teacher,
        subject,
        day,
        span,
    };
    let existing = repo
        .find_lessons_by_day(day)
        .map_err(ScheduleError::repository)?;
    if let Some((side, lesson)) = find_conflict(&existing, &placement, policy, moving) {
        let who = match side {
            ConflictSide::Teacher => placement.teacher.name.clone(),
            ConflictSide::Class => placement.class.name.clone(),
        };
        return Err(ScheduleError::ScheduleConflict {
            side,
            who,
            subject: lesson.subject_name.clone(),
            lesson_id: lesson.id.clone(),
            start: format_clock(lesson.span.start()),
            end: format_clock(lesson.span.end()),
        });
    }
    Ok(placement)
}

fn log_rejection(action: &str, req: &PlacementRequest, e: &ScheduleError) {
    if !matches!(e, ScheduleError::Repository { .. }) {
        tracing::debug!(
            code = e.code(),
            class = %req.class,
            teacher = %req.teacher,
            day = %req.day,
            "{} rejected: {}",
            action,
            e
        );
    }
}

/// Validates a placement and, if it is legal, persists it. Nothing is durable
/// until the caller commits its unit of work.
pub fn schedule_lesson<R: LessonRepository + ?Sized>(
    repo: &R,
    req: &PlacementRequest,
    policy: OverlapPolicy,
) -> Result<Scheduled, ScheduleError> {
    let placement = check_placement(repo, req, policy, None).inspect_err(|e| {
        log_rejection("placement", req, e);
    })?;
    let lesson = repo
        .create_lesson(&placement.to_new_lesson())
        .map_err(ScheduleError::repository)?;
    Ok(Scheduled {
        lesson_id: lesson.id.clone(),
        event: CalendarEvent::from(&lesson),
    })
}

/// Moves an existing lesson, re-running every check against the other lessons.
pub fn reschedule_lesson<R: LessonRepository + ?Sized>(
    repo: &R,
    lesson_id: &str,
    req: &PlacementRequest,
    policy: OverlapPolicy,
) -> Result<Scheduled, ScheduleError> {
    let existing = repo
        .find_lesson(lesson_id)
        .map_err(ScheduleError::repository)?;
    if existing.is_none() {
        return Err(ScheduleError::not_found(EntityKind::Lesson, lesson_id));
    }
    let placement = check_placement(repo, req, policy, Some(lesson_id)).inspect_err(|e| {
        log_rejection("reschedule", req, e);
    })?;
    let lesson = repo
        .update_lesson(lesson_id, &placement.to_new_lesson())
        .map_err(ScheduleError::repository)?;
    Ok(Scheduled {
        lesson_id: lesson.id.clone(),
        event: CalendarEvent::from(&lesson),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;

    /// In-memory store whose qualification sets are kept per side so tests
    /// can make them disagree.
    #[derive(Default)]
    struct MemoryRepository {
        classes: Vec<ClassRecord>,
        teachers: Vec<TeacherRecord>,
        subjects: Vec<SubjectRecord>,
        lessons: RefCell<Vec<LessonRecord>>,
        next_id: Cell<u32>,
        fail_lesson_reads: bool,
    }

    impl MemoryRepository {
        fn class(mut self, name: &str) -> Self {
            self.classes.push(ClassRecord {
                id: format!("class:{}", name),
                name: name.to_string(),
            });
            self
        }

        fn teacher(mut self, name: &str, subjects: &[&str]) -> Self {
            self.teachers.push(TeacherRecord {
                id: format!("teacher:{}", name),
                name: name.to_string(),
                subject_ids: subjects.iter().map(|s| format!("subject:{}", s)).collect(),
            });
            self
        }

        fn subject(mut self, name: &str, teachers: &[&str]) -> Self {
            self.subjects.push(SubjectRecord {
                id: format!("subject:{}", name),
                name: name.to_string(),
                teacher_ids: teachers.iter().map(|t| format!("teacher:{}", t)).collect(),
            });
            self
        }

        fn lesson_count(&self) -> usize {
            self.lessons.borrow().len()
        }

        fn materialize(&self, id: String, lesson: &NewLesson) -> LessonRecord {
            LessonRecord {
                id,
                name: lesson.name.clone(),
                day: lesson.day,
                span: lesson.span,
                class_id: lesson.class_id.clone(),
                class_name: self
                    .classes
                    .iter()
                    .find(|c| c.id == lesson.class_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                teacher_id: lesson.teacher_id.clone(),
                teacher_name: self
                    .teachers
                    .iter()
                    .find(|t| t.id == lesson.teacher_id)
                    .map(|t| t.name.clone())
                    .unwrap_or_default(),
                subject_id: lesson.subject_id.clone(),
                subject_name: self
                    .subjects
                    .iter()
                    .find(|s| s.id == lesson.subject_id)
                    .map(|s| s.name.clone())
                    .unwrap_or_default(),
            }
        }
    }

    impl LessonRepository for MemoryRepository {
        fn find_class_by_name(&self, name: &str) -> anyhow::Result<Option<ClassRecord>> {
            Ok(self.classes.iter().find(|c| c.name == name).cloned())
        }

        fn find_subject_by_name(&self, name: &str) -> anyhow::Result<Option<SubjectRecord>> {
            Ok(self.subjects.iter().find(|s| s.name == name).cloned())
        }

        fn find_teacher_by_name(&self, name: &str) -> anyhow::Result<Option<TeacherRecord>> {
            Ok(self.teachers.iter().find(|t| t.name == name).cloned())
        }

        fn find_lessons_by_day(&self, day: Day) -> anyhow::Result<Vec<LessonRecord>> {
            if self.fail_lesson_reads {
                return Err(anyhow!("disk I/O error"));
            }
            Ok(self
                .lessons
                .borrow()
                .iter()
                .filter(|l| l.day == day)
                .cloned()
                .collect())
        }

        fn find_lesson(&self, id: &str) -> anyhow::Result<Option<LessonRecord>> {
            Ok(self.lessons.borrow().iter().find(|l| l.id == id).cloned())
        }

        fn create_lesson(&self, lesson: &NewLesson) -> anyhow::Result<LessonRecord> {
            self.next_id.set(self.next_id.get() + 1);
            let record = self.materialize(format!("lesson-{}", self.next_id.get()), lesson);
            self.lessons.borrow_mut().push(record.clone());
            Ok(record)
        }

        fn update_lesson(&self, id: &str, lesson: &NewLesson) -> anyhow::Result<LessonRecord> {
            let record = self.materialize(id.to_string(), lesson);
            let mut lessons = self.lessons.borrow_mut();
            let slot = lessons
                .iter_mut()
                .find(|l| l.id == id)
                .ok_or_else(|| anyhow!("no lesson {}", id))?;
            *slot = record.clone();
            Ok(record)
        }
    }

    fn school() -> MemoryRepository {
        MemoryRepository::default()
            .class("ClassA")
            .class("ClassB")
            .teacher("Smith", &["Math"])
            .teacher("Jones", &["Math", "English"])
            .subject("Math", &["Smith", "Jones"])
            .subject("English", &["Jones"])
    }

    fn request(
        subject: &str,
        class: &str,
        teacher: &str,
        day: &str,
        start: &str,
        end: &str,
    ) -> PlacementRequest {
        PlacementRequest {
            subject: subject.into(),
            class: class.into(),
            teacher: teacher.into(),
            day: day.into(),
            start_time: start.into(),
            end_time: end.into(),
        }
    }

    fn place(repo: &MemoryRepository, req: PlacementRequest) -> Result<Scheduled, ScheduleError> {
        schedule_lesson(repo, &req, OverlapPolicy::Inclusive)
    }

    /// Wednesday slots tried in order, and whether each is accepted once the
    /// earlier ones are on the calendar.
    const WEDNESDAY_SLOTS: [(&str, &str, bool); 8] = [
        ("08:00", "08:45", true),
        ("08:30", "09:15", false),
        ("08:45", "09:30", false),
        ("09:31", "10:15", true),
        ("10:00", "11:00", false),
        ("10:16", "11:00", true),
        ("11:01", "14:01", true),
        ("11:01", "14:00", false),
    ];

    fn assert_pairwise_disjoint<'a>(lessons: impl Iterator<Item = &'a LessonRecord> + Clone) {
        for (i, a) in lessons.clone().enumerate() {
            for b in lessons.clone().skip(i + 1) {
                assert!(
                    !a.span.overlaps(&b.span, OverlapPolicy::Inclusive),
                    "{:?} overlaps {:?}",
                    a.span,
                    b.span
                );
            }
        }
    }

    #[test]
    fn accepted_placement_matches_input() {
        let repo = school();
        let req = request("Math", "ClassA", "Smith", "Monday", "09:00", "09:50");
        let scheduled = place(&repo, req).expect("scheduled");
        assert_eq!(
            scheduled.event,
            CalendarEvent {
                title: "Math - ClassA".into(),
                start_time: "09:00".into(),
                end_time: "09:50".into(),
                day_of_week: 1,
                class: "ClassA".into(),
                teacher: "Smith".into(),
            }
        );
        let stored = repo.lessons.borrow()[0].clone();
        assert_eq!(stored.id, scheduled.lesson_id);
        assert_eq!(stored.name, "Math - ClassA");
        assert_eq!(stored.day, Day::Monday);
        assert_eq!(format_clock(stored.span.start()), "09:00");
        assert_eq!(format_clock(stored.span.end()), "09:50");
    }

    #[test]
    fn duration_boundaries() {
        let repo = school();
        let cases = [
            ("Monday", "08:00", "08:30", true),
            ("Tuesday", "08:00", "08:29", false),
            ("Wednesday", "08:00", "11:00", true),
            ("Thursday", "08:00", "11:01", false),
            ("Friday", "08:00", "08:00", false),
            ("Friday", "09:00", "08:00", false),
        ];
        for (day, start, end, ok) in cases {
            let result = place(&repo, request("Math", "ClassA", "Smith", day, start, end));
            if ok {
                assert!(result.is_ok(), "{} {}-{} should pass", day, start, end);
            } else {
                assert!(
                    matches!(result, Err(ScheduleError::InvalidDuration(_))),
                    "{} {}-{} should be invalid duration",
                    day,
                    start,
                    end
                );
            }
        }
        assert_eq!(repo.lesson_count(), 2);
    }

    #[test]
    fn malformed_day_or_time_is_invalid_input() {
        let repo = school();
        let req = request("Math", "ClassA", "Smith", "Funday", "09:00", "09:50");
        assert!(matches!(
            place(&repo, req),
            Err(ScheduleError::InvalidInput { field: "day", .. })
        ));
        let req = request("Math", "ClassA", "Smith", "Monday", "9 o'clock", "09:50");
        assert!(matches!(
            place(&repo, req),
            Err(ScheduleError::InvalidInput {
                field: "startTime",
                ..
            })
        ));
        assert_eq!(repo.lesson_count(), 0);
    }

    #[test]
    fn duration_is_checked_before_entities() {
        let repo = school();
        let req = request("Math", "Nope", "Nobody", "Monday", "09:00", "09:10");
        assert!(matches!(
            place(&repo, req),
            Err(ScheduleError::InvalidDuration(_))
        ));
    }

    #[test]
    fn missing_entities_are_named() {
        let repo = school();
        let cases = [
            ("Math", "ClassZ", "Smith", EntityKind::Class, "ClassZ"),
            ("Art", "ClassA", "Smith", EntityKind::Subject, "Art"),
            ("Math", "ClassA", "Dr. Who", EntityKind::Teacher, "Dr. Who"),
        ];
        for (subject, class, teacher, kind, name) in cases {
            let req = request(subject, class, teacher, "Monday", "09:00", "09:50");
            match place(&repo, req) {
                Err(ScheduleError::NotFound { kind: k, name: n }) => {
                    assert_eq!(k, kind);
                    assert_eq!(n, name);
                }
                other => panic!("expected not found, got {:?}", other),
            }
        }
    }

    #[test]
    fn unqualified_teacher_is_rejected() {
        let repo = school();
        let req = request("English", "ClassA", "Smith", "Monday", "09:00", "09:50");
        match place(&repo, req) {
            Err(ScheduleError::NotQualified {
                gap,
                teacher,
                subject,
            }) => {
                assert_eq!(gap, QualificationGap::TeacherLacksSubject);
                assert_eq!(teacher, "Smith");
                assert_eq!(subject, "English");
            }
            other => panic!("expected not qualified, got {:?}", other),
        }
        assert_eq!(repo.lesson_count(), 0);
    }

    #[test]
    fn diverging_qualification_sets_fail_either_way() {
        // Subject forgot the teacher; teacher still lists the subject.
        let repo = MemoryRepository::default()
            .class("ClassA")
            .teacher("Smith", &["Math"])
            .subject("Math", &[]);
        let req = request("Math", "ClassA", "Smith", "Monday", "09:00", "09:50");
        assert!(matches!(
            place(&repo, req),
            Err(ScheduleError::NotQualified {
                gap: QualificationGap::SubjectLacksTeacher,
                ..
            })
        ));

        // And the mirror image.
        let repo = MemoryRepository::default()
            .class("ClassA")
            .teacher("Smith", &[])
            .subject("Math", &["Smith"]);
        let req = request("Math", "ClassA", "Smith", "Monday", "09:00", "09:50");
        assert!(matches!(
            place(&repo, req),
            Err(ScheduleError::NotQualified {
                gap: QualificationGap::TeacherLacksSubject,
                ..
            })
        ));
        assert_eq!(repo.lesson_count(), 0);
    }

    #[test]
    fn teacher_conflict_scenario() {
        let repo = school();
        let first = request("Math", "ClassA", "Smith", "Monday", "09:00", "09:50");
        place(&repo, first).expect("first");

        let clash = request("Math", "ClassB", "Smith", "Monday", "09:30", "10:20");
        match place(&repo, clash) {
            Err(ScheduleError::ScheduleConflict {
                side,
                subject,
                start,
                end,
                ..
            }) => {
                assert_eq!(side, ConflictSide::Teacher);
                assert_eq!(subject, "Math");
                assert_eq!((start.as_str(), end.as_str()), ("09:00", "09:50"));
            }
            other => panic!("expected conflict, got {:?}", other),
        }

        let later = request("Math", "ClassA", "Smith", "Monday", "10:00", "10:50");
        place(&repo, later).expect("later slot");
        assert_eq!(repo.lesson_count(), 2);
    }

    #[test]
    fn class_conflict_with_other_teacher() {
        let repo = school();
        let first = request("Math", "ClassA", "Smith", "Monday", "09:00", "09:50");
        place(&repo, first).expect("first");
        let clash = request("English", "ClassA", "Jones", "Monday", "09:10", "10:00");
        assert!(matches!(
            place(&repo, clash),
            Err(ScheduleError::ScheduleConflict {
                side: ConflictSide::Class,
                ..
            })
        ));
        // Same slot, different class and teacher is fine.
        let parallel = request("English", "ClassB", "Jones", "Monday", "09:10", "10:00");
        place(&repo, parallel).expect("parallel");
        // Same slot on another day is fine.
        let tuesday = request("English", "ClassA", "Jones", "Tuesday", "09:10", "10:00");
        place(&repo, tuesday).expect("tuesday");
    }

    #[test]
    fn teacher_side_reported_before_class_side() {
        let repo = school();
        let smith = request("Math", "ClassB", "Smith", "Monday", "09:30", "10:20");
        place(&repo, smith).expect("smith");
        let jones = request("English", "ClassA", "Jones", "Monday", "09:00", "09:40");
        place(&repo, jones).expect("jones");
        let clash = request("Math", "ClassA", "Smith", "Monday", "09:00", "10:00");
        assert!(matches!(
            place(&repo, clash),
            Err(ScheduleError::ScheduleConflict {
                side: ConflictSide::Teacher,
                ..
            })
        ));
    }

    #[test]
    fn earliest_conflicting_lesson_is_reported() {
        let repo = school();
        let late = request("Math", "ClassA", "Jones", "Monday", "10:00", "10:30");
        place(&repo, late).expect("late");
        let early = request("English", "ClassB", "Jones", "Monday", "09:00", "09:30");
        place(&repo, early).expect("early");
        let clash = request("Math", "ClassA", "Jones", "Monday", "09:15", "10:15");
        match place(&repo, clash) {
            Err(ScheduleError::ScheduleConflict { subject, start, .. }) => {
                assert_eq!(subject, "English");
                assert_eq!(start, "09:00");
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn touching_endpoints_follow_policy() {
        let repo = school();
        let first = request("Math", "ClassA", "Smith", "Monday", "09:00", "09:50");
        place(&repo, first).expect("first");
        let touching = request("Math", "ClassB", "Smith", "Monday", "09:50", "10:40");
        assert!(matches!(
            schedule_lesson(&repo, &touching, OverlapPolicy::Inclusive),
            Err(ScheduleError::ScheduleConflict { .. })
        ));
        schedule_lesson(&repo, &touching, OverlapPolicy::AllowAdjacent).expect("adjacent allowed");
    }

    #[test]
    fn repeated_conflicting_request_is_rejected_identically() {
        let repo = school();
        let first = request("Math", "ClassA", "Smith", "Monday", "09:00", "09:50");
        place(&repo, first).expect("first");
        let req = request("Math", "ClassB", "Smith", "Monday", "09:30", "10:20");
        let first = place(&repo, req.clone()).expect_err("first rejection");
        let second = place(&repo, req).expect_err("second rejection");
        assert_eq!(first.code(), "schedule_conflict");
        assert_eq!(first.code(), second.code());
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(repo.lesson_count(), 1);
    }

    #[test]
    fn no_two_lessons_of_a_teacher_overlap() {
        let repo = school();
        for (i, (start, end, accepted)) in WEDNESDAY_SLOTS.into_iter().enumerate() {
            let class = if i % 2 == 0 { "ClassA" } else { "ClassB" };
            let req = request("Math", class, "Jones", "Wednesday", start, end);
            match place(&repo, req) {
                Ok(_) => assert!(accepted, "{}-{} should conflict", start, end),
                Err(ScheduleError::ScheduleConflict { side, .. }) => {
                    assert!(!accepted, "{}-{} should be accepted", start, end);
                    assert_eq!(side, ConflictSide::Teacher);
                }
                Err(other) => panic!("{}-{}: unexpected {:?}", start, end, other),
            }
        }
        assert_eq!(repo.lesson_count(), 4);
        let lessons = repo.lessons.borrow();
        assert_pairwise_disjoint(lessons.iter().filter(|l| l.teacher_name == "Jones"));
    }

    #[test]
    fn no_two_lessons_of_a_class_overlap() {
        let repo = school();
        for (i, (start, end, accepted)) in WEDNESDAY_SLOTS.into_iter().enumerate() {
            let teacher = if i % 2 == 0 { "Smith" } else { "Jones" };
            let req = request("Math", "ClassA", teacher, "Wednesday", start, end);
            match place(&repo, req) {
                Ok(_) => assert!(accepted, "{}-{} should conflict", start, end),
                Err(ScheduleError::ScheduleConflict { .. }) => {
                    assert!(!accepted, "{}-{} should be accepted", start, end);
                }
                Err(other) => panic!("{}-{}: unexpected {:?}", start, end, other),
            }
        }
        assert_eq!(repo.lesson_count(), 4);
        let lessons = repo.lessons.borrow();
        assert_pairwise_disjoint(lessons.iter().filter(|l| l.class_name == "ClassA"));
    }

    #[test]
    fn repository_failure_is_wrapped_and_nothing_is_written() {
        let mut repo = school();
        repo.fail_lesson_reads = true;
        let req = request("Math", "ClassA", "Smith", "Monday", "09:00", "09:50");
        match place(&repo, req) {
            Err(ScheduleError::Repository { message }) => {
                assert!(message.contains("disk I/O error"))
            }
            other => panic!("expected repository failure, got {:?}", other),
        }
        assert_eq!(repo.lesson_count(), 0);
    }

    #[test]
    fn reschedule_ignores_itself_but_not_others() {
        let repo = school();
        let policy = OverlapPolicy::Inclusive;
        let a = request("Math", "ClassA", "Smith", "Monday", "09:00", "09:50");
        let a = place(&repo, a).expect("a");
        let b = request("Math", "ClassB", "Smith", "Monday", "11:00", "11:50");
        place(&repo, b).expect("b");

        // Stretching within its own slot is fine.
        let stretch = request("Math", "ClassA", "Smith", "Monday", "09:00", "10:00");
        let moved = reschedule_lesson(&repo, &a.lesson_id, &stretch, policy).expect("stretch");
        assert_eq!(moved.lesson_id, a.lesson_id);
        assert_eq!(moved.event.end_time, "10:00");

        // Moving onto the other lesson is not.
        let onto_b = request("Math", "ClassA", "Smith", "Monday", "11:30", "12:20");
        let clash = reschedule_lesson(&repo, &a.lesson_id, &onto_b, policy);
        assert!(matches!(clash, Err(ScheduleError::ScheduleConflict { .. })));
        let end = repo.lessons.borrow()[0].span.end();
        assert_eq!(end, parse_clock("10:00").expect("t"));

        let elsewhere = request("Math", "ClassA", "Smith", "Monday", "13:00", "13:50");
        let missing = reschedule_lesson(&repo, "lesson-404", &elsewhere, policy);
        assert!(matches!(
            missing,
            Err(ScheduleError::NotFound {
                kind: EntityKind::Lesson,
                ..
            })
        ));
        assert_eq!(repo.lesson_count(), 2);
    }

    #[test]
    fn placement_request_uses_camel_case_fields() {
        let req: PlacementRequest = serde_json::from_value(serde_json::json!({
            "subject": "Math",
            "class": "ClassA",
            "teacher": "Mr. Smith",
            "day": "Monday",
            "startTime": "09:00",
            "endTime": "09:50"
        }))
        .expect("deserialize");
        assert_eq!(req.start_time, "09:00");

        let missing: Result<PlacementRequest, _> =
            serde_json::from_value(serde_json::json!({ "subject": "Math" }));
        assert!(missing.is_err());
    }

    #[test]
    fn calendar_event_serializes_wire_names() {
        let event = CalendarEvent {
            title: "Math - ClassA".into(),
            start_time: "09:00".into(),
            end_time: "09:50".into(),
            day_of_week: 1,
            class: "ClassA".into(),
            teacher: "Mr. Smith".into(),
        };
        let v = serde_json::to_value(&event).expect("serialize");
        assert_eq!(v["startTime"], "09:00");
        assert_eq!(v["endTime"], "09:50");
        assert_eq!(v["dayOfWeek"], 1);
        let keys: HashSet<&str> = ["title", "class", "teacher"].into_iter().collect();
        for key in keys {
            assert!(v.get(key).is_some(), "missing {}", key);
        }
    }
}
