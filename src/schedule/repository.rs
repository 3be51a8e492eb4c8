use anyhow::{anyhow, Context};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use super::day::Day;
use super::entity::{
    ClassRecord, EntityKind, LessonRecord, NewLesson, SubjectRecord, TeacherRecord,
};
use super::span::{format_clock, parse_clock, TimeSpan};

/// Reads and writes the scheduler needs from the persistent store.
///
/// Implementations are expected to be used inside whatever unit of work makes
/// the conflict scan and the following write atomic (for SQLite, an
/// immediate transaction opened by the caller).
pub trait LessonRepository {
    fn find_class_by_name(&self, name: &str) -> anyhow::Result<Option<ClassRecord>>;

    /// Subject together with the ids of the teachers qualified to teach it.
    fn find_subject_by_name(&self, name: &str) -> anyhow::Result<Option<SubjectRecord>>;

    /// Teacher together with the ids of the subjects they are qualified for.
    fn find_teacher_by_name(&self, name: &str) -> anyhow::Result<Option<TeacherRecord>>;

    /// Every lesson on `day`, regardless of class or teacher.
    fn find_lessons_by_day(&self, day: Day) -> anyhow::Result<Vec<LessonRecord>>;

    fn find_lesson(&self, id: &str) -> anyhow::Result<Option<LessonRecord>>;

    fn create_lesson(&self, lesson: &NewLesson) -> anyhow::Result<LessonRecord>;

    fn update_lesson(&self, id: &str, lesson: &NewLesson) -> anyhow::Result<LessonRecord>;
}

const LESSON_SELECT: &str = "SELECT
       l.id, l.name, l.day, l.start_time, l.end_time,
       l.class_id, c.name, l.teacher_id, t.name, l.subject_id, s.name
     FROM lessons l
     JOIN classes c ON c.id = l.class_id
     JOIN teachers t ON t.id = l.teacher_id
     JOIN subjects s ON s.id = l.subject_id";

struct LessonRow {
    id: String,
    name: String,
    day: i64,
    start_time: String,
    end_time: String,
    class_id: String,
    class_name: String,
    teacher_id: String,
    teacher_name: String,
    subject_id: String,
    subject_name: String,
}

impl LessonRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            day: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            class_id: row.get(5)?,
            class_name: row.get(6)?,
            teacher_id: row.get(7)?,
            teacher_name: row.get(8)?,
            subject_id: row.get(9)?,
            subject_name: row.get(10)?,
        })
    }

    fn into_record(self) -> anyhow::Result<LessonRecord> {
        let day = u8::try_from(self.day)
            .ok()
            .and_then(Day::from_number)
            .ok_or_else(|| anyhow!("lesson {} has invalid day {}", self.id, self.day))?;
        let start = parse_clock(&self.start_time).ok_or_else(|| {
            anyhow!("lesson {} has invalid start time {:?}", self.id, self.start_time)
        })?;
        let end = parse_clock(&self.end_time).ok_or_else(|| {
            anyhow!("lesson {} has invalid end time {:?}", self.id, self.end_time)
        })?;
        let span = TimeSpan::stored(start, end)
            .ok_or_else(|| anyhow!("lesson {} ends before it starts", self.id))?;
        Ok(LessonRecord {
            id: self.id,
            name: self.name,
            day,
            span,
            class_id: self.class_id,
            class_name: self.class_name,
            teacher_id: self.teacher_id,
            teacher_name: self.teacher_name,
            subject_id: self.subject_id,
            subject_name: self.subject_name,
        })
    }
}

/// Optional narrowing for calendar listings.
#[derive(Debug, Clone, Default)]
pub struct LessonFilter {
    pub day: Option<Day>,
    pub class_id: Option<String>,
    pub teacher_id: Option<String>,
}

fn now_ts() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

pub struct SqliteRepository<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn query_lessons(
        &self,
        where_clause: &str,
        values: Vec<rusqlite::types::Value>,
    ) -> anyhow::Result<Vec<LessonRecord>> {
        let sql = format!(
            "{} WHERE {} ORDER BY l.day, l.start_time, l.id",
            LESSON_SELECT, where_clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values), LessonRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(LessonRow::into_record).collect()
    }

    pub fn list_lessons(&self, filter: &LessonFilter) -> anyhow::Result<Vec<LessonRecord>> {
        use rusqlite::types::Value;

        let mut where_clause = String::from("1 = 1");
        let mut values: Vec<Value> = Vec::new();
        if let Some(day) = filter.day {
            where_clause.push_str(" AND l.day = ?");
            values.push(Value::Integer(i64::from(day.number())));
        }
        if let Some(ref class_id) = filter.class_id {
            where_clause.push_str(" AND l.class_id = ?");
            values.push(Value::Text(class_id.clone()));
        }
        if let Some(ref teacher_id) = filter.teacher_id {
            where_clause.push_str(" AND l.teacher_id = ?");
            values.push(Value::Text(teacher_id.clone()));
        }
        self.query_lessons(&where_clause, values)
            .context("failed to list lessons")
    }

    fn id_set(&self, sql: &str, key: &str) -> anyhow::Result<HashSet<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map([key], |r| r.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    fn find_id_name(
        &self,
        kind: EntityKind,
        name: &str,
    ) -> anyhow::Result<Option<(String, String)>> {
        let sql = format!("SELECT id, name FROM {} WHERE name = ?", kind.table());
        let found = self
            .conn
            .query_row(&sql, [name.trim()], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })
            .optional()?;
        Ok(found)
    }
}

impl LessonRepository for SqliteRepository<'_> {
    fn find_class_by_name(&self, name: &str) -> anyhow::Result<Option<ClassRecord>> {
        let found = self
            .find_id_name(EntityKind::Class, name)
            .context("failed to look up class")?;
        Ok(found.map(|(id, name)| ClassRecord { id, name }))
    }

    fn find_subject_by_name(&self, name: &str) -> anyhow::Result<Option<SubjectRecord>> {
        let Some((id, name)) = self
            .find_id_name(EntityKind::Subject, name)
            .context("failed to look up subject")?
        else {
            return Ok(None);
        };
        let teacher_ids = self
            .id_set(
                "SELECT teacher_id FROM teacher_subjects WHERE subject_id = ?",
                &id,
            )
            .context("failed to read subject teachers")?;
        Ok(Some(SubjectRecord {
            id,
            name,
            teacher_ids,
        }))
    }

    fn find_teacher_by_name(&self, name: &str) -> anyhow::Result<Option<TeacherRecord>> {
        let Some((id, name)) = self
            .find_id_name(EntityKind::Teacher, name)
            .context("failed to look up teacher")?
        else {
            return Ok(None);
        };
        let subject_ids = self
            .id_set(
                "SELECT subject_id FROM teacher_subjects WHERE teacher_id = ?",
                &id,
            )
            .context("failed to read teacher subjects")?;
        Ok(Some(TeacherRecord {
            id,
            name,
            subject_ids,
        }))
    }

    fn find_lessons_by_day(&self, day: Day) -> anyhow::Result<Vec<LessonRecord>> {
        self.query_lessons(
            "l.day = ?",
            vec![rusqlite::types::Value::Integer(i64::from(day.number()))],
        )
        .with_context(|| format!("failed to read lessons for {}", day))
    }

    fn find_lesson(&self, id: &str) -> anyhow::Result<Option<LessonRecord>> {
        let mut found = self
            .query_lessons("l.id = ?", vec![rusqlite::types::Value::Text(id.to_string())])
            .context("failed to read lesson")?;
        Ok(found.pop())
    }

    fn create_lesson(&self, lesson: &NewLesson) -> anyhow::Result<LessonRecord> {
        let lesson_id = Uuid::new_v4().to_string();
        let ts = now_ts();
        self.conn
            .execute(
                "INSERT INTO lessons(
                    id, name, day, start_time, end_time,
                    class_id, teacher_id, subject_id, created_at, updated_at
                 ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    lesson_id,
                    lesson.name,
                    i64::from(lesson.day.number()),
                    format_clock(lesson.span.start()),
                    format_clock(lesson.span.end()),
                    lesson.class_id,
                    lesson.teacher_id,
                    lesson.subject_id,
                    ts,
                    ts
                ],
            )
            .context("failed to insert lesson")?;
        self.find_lesson(&lesson_id)?
            .ok_or_else(|| anyhow!("inserted lesson {} could not be read back", lesson_id))
    }

    fn update_lesson(&self, id: &str, lesson: &NewLesson) -> anyhow::Result<LessonRecord> {
        let changed = self
            .conn
            .execute(
                "UPDATE lessons
                 SET name = ?, day = ?, start_time = ?, end_time = ?,
                     class_id = ?, teacher_id = ?, subject_id = ?, updated_at = ?
                 WHERE id = ?",
                params![
                    lesson.name,
                    i64::from(lesson.day.number()),
                    format_clock(lesson.span.start()),
                    format_clock(lesson.span.end()),
                    lesson.class_id,
                    lesson.teacher_id,
                    lesson.subject_id,
                    now_ts(),
                    id
                ],
            )
            .context("failed to update lesson")?;
        if changed == 0 {
            return Err(anyhow!("lesson {} disappeared during update", id));
        }
        self.find_lesson(id)?
            .ok_or_else(|| anyhow!("updated lesson {} could not be read back", id))
    }
}
