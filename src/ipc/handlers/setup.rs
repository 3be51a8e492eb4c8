use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{Day, OverlapPolicy};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Scheduling,
    Calendar,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduling" => Some(Self::Scheduling),
            "calendar" => Some(Self::Calendar),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Scheduling => "setup.scheduling",
            Self::Calendar => "setup.calendar",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Scheduling => json!({
            "adjacentLessonsConflict": true
        }),
        SetupSection::Calendar => json!({
            "weekStartsOn": "sunday",
            "showWeekends": true
        }),
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Scheduling => match k.as_str() {
                "adjacentLessonsConflict" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown scheduling field: {}", k)),
            },
            SetupSection::Calendar => match k.as_str() {
                "weekStartsOn" => {
                    let s = v
                        .as_str()
                        .ok_or_else(|| format!("{} must be string", k))?
                        .trim()
                        .to_ascii_lowercase();
                    if s != "sunday" && s != "monday" {
                        return Err("weekStartsOn must be one of: sunday, monday".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                "showWeekends" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown calendar field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults field by field.
            for (k, v) in saved_obj {
                let mut one = Map::new();
                one.insert(k.clone(), v.clone());
                if let Err(e) = merge_section_patch(section, &mut current, &one) {
                    tracing::warn!(key = section.key(), error = %e, "ignoring saved setting");
                }
            }
        }
    }
    Ok(current)
}

/// Overlap rule for new placements, from `setup.scheduling`.
pub fn overlap_policy(conn: &Connection) -> anyhow::Result<OverlapPolicy> {
    let section = load_section(conn, SetupSection::Scheduling)?;
    let adjacent_conflicts = section
        .get("adjacentLessonsConflict")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    Ok(if adjacent_conflicts {
        OverlapPolicy::Inclusive
    } else {
        OverlapPolicy::AllowAdjacent
    })
}

#[derive(Debug, Clone, Copy)]
pub struct CalendarPrefs {
    pub week_starts_on: Day,
    pub show_weekends: bool,
}

pub fn calendar_prefs(conn: &Connection) -> anyhow::Result<CalendarPrefs> {
    let section = load_section(conn, SetupSection::Calendar)?;
    let week_starts_on = match section.get("weekStartsOn").and_then(|v| v.as_str()) {
        Some("monday") => Day::Monday,
        _ => Day::Sunday,
    };
    let show_weekends = section
        .get("showWeekends")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    Ok(CalendarPrefs {
        week_starts_on,
        show_weekends,
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match state.conn(req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let scheduling = match load_section(conn, SetupSection::Scheduling) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let calendar = match load_section(conn, SetupSection::Calendar) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(
        &req.id,
        json!({
            "scheduling": scheduling,
            "calendar": calendar
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match state.conn(req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(key = section.key(), "setup updated");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
