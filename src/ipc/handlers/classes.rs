use super::entities::{handle_create_named, handle_delete, required_entity};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::schedule::EntityKind;
use serde_json::json;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };

    let mut stmt = match conn.prepare(
        "SELECT
           c.id,
           c.name,
           (SELECT COUNT(*) FROM lessons l WHERE l.class_id = c.id) AS lesson_count
         FROM classes c
         ORDER BY c.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let lesson_count: i64 = row.get(2)?;
            Ok(json!({
                "id": id,
                "name": name,
                "lessonCount": lesson_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_classes_rename(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match state.conn(req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_entity(conn, req, EntityKind::Class, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match req.required_str("name") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Err(e) = tx.execute("UPDATE classes SET name = ? WHERE id = ?", (&name, &class_id)) {
        let _ = tx.rollback();
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    // Lesson display names embed the class name.
    if let Err(e) = tx.execute(
        "UPDATE lessons
         SET name = (SELECT s.name FROM subjects s WHERE s.id = lessons.subject_id) || ' - ' || ?
         WHERE class_id = ?",
        (&name, &class_id),
    ) {
        let _ = tx.rollback();
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(handle_create_named(state, req, EntityKind::Class, "classId")),
        "classes.rename" => Some(handle_classes_rename(state, req)),
        "classes.delete" => Some(handle_delete(state, req, EntityKind::Class, "classId")),
        _ => None,
    }
}
