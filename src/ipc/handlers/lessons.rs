use super::entities::required_entity;
use super::setup::{calendar_prefs, overlap_policy};
use crate::ipc::error::{err, ok, schedule_err};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{
    reschedule_lesson, schedule_lesson, CalendarEvent, Day, EntityKind, LessonFilter,
    OverlapPolicy, PlacementRequest, ScheduleError, Scheduled, SqliteRepository,
};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LessonView {
    id: String,
    subject: String,
    day: &'static str,
    class_id: String,
    teacher_id: String,
    subject_id: String,
    #[serde(flatten)]
    event: CalendarEvent,
}

fn placement_input(req: &Request) -> Result<PlacementRequest, serde_json::Value> {
    let Some(input) = req.params.get("input") else {
        return Err(err(&req.id, "bad_params", "missing input", None));
    };
    serde_json::from_value(input.clone())
        .map_err(|e| err(&req.id, "bad_params", format!("input: {}", e), None))
}

/// Runs a placement inside an immediate transaction so the conflict scan and
/// the write see the same lesson table; no other writer can slip in between.
/// Store failures on this path surface as `repository_failure`.
fn with_write_lock<F>(conn: &Connection, req: &Request, action: &str, place: F) -> serde_json::Value
where
    F: FnOnce(&SqliteRepository<'_>) -> Result<Scheduled, ScheduleError>,
{
    let tx = match Transaction::new_unchecked(conn, TransactionBehavior::Immediate) {
        Ok(t) => t,
        Err(e) => {
            let e = anyhow::Error::from(e).context("failed to begin lesson transaction");
            return schedule_err(&req.id, &ScheduleError::repository(e));
        }
    };
    let scheduled = match place(&SqliteRepository::new(&tx)) {
        Ok(v) => v,
        Err(e) => {
            let _ = tx.rollback();
            return schedule_err(&req.id, &e);
        }
    };
    if let Err(e) = tx.commit() {
        let e = anyhow::Error::from(e).context("failed to commit lesson");
        return schedule_err(&req.id, &ScheduleError::repository(e));
    }

    let event = &scheduled.event;
    tracing::info!(
        lesson_id = %scheduled.lesson_id,
        day = event.day_of_week,
        start = %event.start_time,
        end = %event.end_time,
        "lesson {}: {}",
        action,
        event.title
    );
    match serde_json::to_value(&scheduled) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

fn load_policy(conn: &Connection, req: &Request) -> Result<OverlapPolicy, serde_json::Value> {
    overlap_policy(conn).map_err(|e| {
        let e = e.context("failed to read scheduling settings");
        schedule_err(&req.id, &ScheduleError::repository(e))
    })
}

fn handle_lessons_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match state.conn(req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let input = match placement_input(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let policy = match load_policy(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_write_lock(conn, req, "scheduled", |repo| schedule_lesson(repo, &input, policy))
}

fn handle_lessons_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match state.conn(req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let lesson_id = match req.required_str("lessonId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input = match placement_input(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let policy = match load_policy(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_write_lock(conn, req, "rescheduled", |repo| {
        reschedule_lesson(repo, &lesson_id, &input, policy)
    })
}

fn handle_lessons_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "lessons": [] }));
    };
    let day = match req.opt_str("day") {
        Ok(Some(raw)) => match raw.parse::<Day>() {
            Ok(d) => Some(d),
            Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
        },
        Ok(None) => None,
        Err(e) => return e,
    };
    let class_id = match req.opt_str("classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_id = match req.opt_str("teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let prefs = match calendar_prefs(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let filter = LessonFilter {
        day,
        class_id,
        teacher_id,
    };
    let mut lessons = match SqliteRepository::new(conn).list_lessons(&filter) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };
    if day.is_none() && !prefs.show_weekends {
        lessons.retain(|l| !l.day.is_weekend());
    }
    lessons.sort_by(|a, b| {
        a.day
            .offset_from(prefs.week_starts_on)
            .cmp(&b.day.offset_from(prefs.week_starts_on))
            .then_with(|| a.span.start().cmp(&b.span.start()))
            .then_with(|| a.id.cmp(&b.id))
    });

    let views: Vec<LessonView> = lessons
        .iter()
        .map(|l| LessonView {
            id: l.id.clone(),
            subject: l.subject_name.clone(),
            day: l.day.name(),
            class_id: l.class_id.clone(),
            teacher_id: l.teacher_id.clone(),
            subject_id: l.subject_id.clone(),
            event: CalendarEvent::from(l),
        })
        .collect();
    ok(&req.id, json!({ "lessons": views }))
}

fn handle_lessons_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match state.conn(req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let lesson_id = match required_entity(conn, req, EntityKind::Lesson, "lessonId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = conn.execute("DELETE FROM lessons WHERE id = ?", [&lesson_id]) {
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }
    tracing::info!(lesson_id = %lesson_id, "lesson deleted");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "lessons.list" => Some(handle_lessons_list(state, req)),
        "lessons.create" => Some(handle_lessons_create(state, req)),
        "lessons.update" => Some(handle_lessons_update(state, req)),
        "lessons.delete" => Some(handle_lessons_delete(state, req)),
        _ => None,
    }
}
