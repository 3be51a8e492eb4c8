//! Create/delete plumbing shared by the class, teacher and subject handlers.

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::schedule::EntityKind;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

pub fn entity_exists(conn: &Connection, kind: EntityKind, id: &str) -> rusqlite::Result<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ? LIMIT 1", kind.table());
    Ok(conn
        .query_row(&sql, [id], |_r| Ok(()))
        .optional()?
        .is_some())
}

/// Looks up `params[id_key]` and checks it names an existing row of `kind`.
pub fn required_entity(
    conn: &Connection,
    req: &Request,
    kind: EntityKind,
    id_key: &str,
) -> Result<String, serde_json::Value> {
    let id = req.required_str(id_key)?;
    match entity_exists(conn, kind, &id) {
        Ok(true) => Ok(id),
        Ok(false) => Err(err(
            &req.id,
            "not_found",
            format!("{} not found", kind.label()),
            Some(json!({ "entity": kind.label(), "id": id })),
        )),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

pub fn handle_create_named(
    state: &mut AppState,
    req: &Request,
    kind: EntityKind,
    id_key: &str,
) -> serde_json::Value {
    let conn = match state.conn(req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match req.required_str("name") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let id = Uuid::new_v4().to_string();
    let sql = format!("INSERT INTO {}(id, name) VALUES(?, ?)", kind.table());
    if let Err(e) = conn.execute(&sql, (&id, &name)) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": kind.table() })),
        );
    }
    tracing::info!(entity = kind.label(), id = %id, name = %name, "created");
    ok(&req.id, json!({ id_key: id, "name": name }))
}

/// Deletes a class, teacher or subject along with every lesson that refers
/// to it and, for teachers and subjects, their qualification edges.
pub fn handle_delete(
    state: &mut AppState,
    req: &Request,
    kind: EntityKind,
    id_key: &str,
) -> serde_json::Value {
    let conn = match state.conn(req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_entity(conn, req, kind, id_key) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // No ON DELETE CASCADE; children first.
    let mut deleted_lessons = 0usize;
    if let Some(column) = kind.lesson_column() {
        let sql = format!("DELETE FROM lessons WHERE {} = ?", column);
        match tx.execute(&sql, [&id]) {
            Ok(n) => deleted_lessons = n,
            Err(e) => {
                let _ = tx.rollback();
                return err(
                    &req.id,
                    "db_delete_failed",
                    e.to_string(),
                    Some(json!({ "table": "lessons" })),
                );
            }
        }
    }
    let edge_column = match kind {
        EntityKind::Teacher => Some("teacher_id"),
        EntityKind::Subject => Some("subject_id"),
        EntityKind::Class | EntityKind::Lesson => None,
    };
    if let Some(column) = edge_column {
        let sql = format!("DELETE FROM teacher_subjects WHERE {} = ?", column);
        if let Err(e) = tx.execute(&sql, [&id]) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "teacher_subjects" })),
            );
        }
    }
    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
    if let Err(e) = tx.execute(&sql, [&id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": kind.table() })),
        );
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    tracing::info!(entity = kind.label(), id = %id, deleted_lessons, "deleted");
    ok(&req.id, json!({ "ok": true, "deletedLessons": deleted_lessons }))
}
