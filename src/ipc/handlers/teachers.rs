use super::entities::{handle_create_named, handle_delete, required_entity};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::schedule::EntityKind;
use serde_json::json;
use std::collections::BTreeMap;

fn handle_teachers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "teachers": [] }));
    };

    let mut stmt = match conn.prepare(
        "SELECT t.id, t.name, s.name
         FROM teachers t
         LEFT JOIN teacher_subjects ts ON ts.teacher_id = t.id
         LEFT JOIN subjects s ON s.id = ts.subject_id
         ORDER BY t.name, s.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let rows = match rows {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // (name, id) keeps the output in name order.
    let mut grouped: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    for (id, name, subject) in rows {
        let entry = grouped.entry((name, id)).or_default();
        if let Some(s) = subject {
            entry.push(s);
        }
    }
    let teachers: Vec<serde_json::Value> = grouped
        .into_iter()
        .map(|((name, id), subjects)| json!({ "id": id, "name": name, "subjects": subjects }))
        .collect();
    ok(&req.id, json!({ "teachers": teachers }))
}

fn qualification_ids(
    state: &AppState,
    req: &Request,
) -> Result<(String, String), serde_json::Value> {
    let conn = state.conn(req)?;
    let teacher_id = required_entity(conn, req, EntityKind::Teacher, "teacherId")?;
    let subject_id = required_entity(conn, req, EntityKind::Subject, "subjectId")?;
    Ok((teacher_id, subject_id))
}

fn handle_teachers_qualify(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (teacher_id, subject_id) = match qualification_ids(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let conn = match state.conn(req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    if let Err(e) = conn.execute(
        "INSERT OR IGNORE INTO teacher_subjects(teacher_id, subject_id) VALUES(?, ?)",
        (&teacher_id, &subject_id),
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    tracing::info!(teacher_id = %teacher_id, subject_id = %subject_id, "teacher qualified");
    ok(&req.id, json!({ "ok": true }))
}

/// Removes a qualification. Lessons already taught under it are kept; only
/// new placements are checked.
fn handle_teachers_disqualify(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (teacher_id, subject_id) = match qualification_ids(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let conn = match state.conn(req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match conn.execute(
        "DELETE FROM teacher_subjects WHERE teacher_id = ? AND subject_id = ?",
        (&teacher_id, &subject_id),
    ) {
        Ok(n) => ok(&req.id, json!({ "ok": true, "removed": n > 0 })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(handle_teachers_list(state, req)),
        "teachers.create" => Some(handle_create_named(
            state,
            req,
            EntityKind::Teacher,
            "teacherId",
        )),
        "teachers.delete" => Some(handle_delete(state, req, EntityKind::Teacher, "teacherId")),
        "teachers.qualify" => Some(handle_teachers_qualify(state, req)),
        "teachers.disqualify" => Some(handle_teachers_disqualify(state, req)),
        _ => None,
    }
}
