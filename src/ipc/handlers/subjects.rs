use super::entities::{handle_create_named, handle_delete};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::schedule::EntityKind;
use serde_json::json;

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "subjects": [] }));
    };

    let mut stmt = match conn.prepare(
        "SELECT s.id, s.name,
           (SELECT COUNT(*) FROM lessons l WHERE l.subject_id = s.id) AS lesson_count
         FROM subjects s
         ORDER BY s.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let subjects = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let subjects = match subjects {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut teacher_stmt = match conn.prepare(
        "SELECT t.name
         FROM teacher_subjects ts
         JOIN teachers t ON t.id = ts.teacher_id
         WHERE ts.subject_id = ?
         ORDER BY t.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut out = Vec::with_capacity(subjects.len());
    for (id, name, lesson_count) in subjects {
        let teachers = match teacher_stmt
            .query_map([&id], |r| r.get::<_, String>(0))
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        out.push(json!({
            "id": id,
            "name": name,
            "teachers": teachers,
            "lessonCount": lesson_count
        }));
    }
    ok(&req.id, json!({ "subjects": out }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_create_named(
            state,
            req,
            EntityKind::Subject,
            "subjectId",
        )),
        "subjects.delete" => Some(handle_delete(state, req, EntityKind::Subject, "subjectId")),
        _ => None,
    }
}
