#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_lessond");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn lessond");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

/// Sends a request expected to fail and returns its `error` object.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value.get("error").cloned().unwrap_or(serde_json::Value::Null)
}

pub fn error_code(error: &serde_json::Value) -> &str {
    error.get("code").and_then(|v| v.as_str()).unwrap_or("")
}

/// Owns a running sidecar and numbers requests automatically.
pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Sidecar {
    pub fn start() -> Self {
        let (child, stdin, reader) = spawn_sidecar();
        Self {
            child,
            stdin,
            reader,
            next_id: 0,
        }
    }

    /// Starts a sidecar with `path` already selected as its workspace.
    pub fn open(path: &std::path::Path) -> Self {
        let mut s = Self::start();
        s.ok("workspace.select", json!({ "path": path.to_string_lossy() }));
        s
    }

    fn id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    pub fn raw(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let id = self.id();
        request(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    pub fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let id = self.id();
        request_ok(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    pub fn err(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let id = self.id();
        request_err(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    pub fn create(&mut self, method: &str, name: &str, id_key: &str) -> String {
        let created = self.ok(method, json!({ "name": name }));
        created
            .get(id_key)
            .and_then(|v| v.as_str())
            .expect(id_key)
            .to_string()
    }

    pub fn lessons(&mut self, params: serde_json::Value) -> Vec<serde_json::Value> {
        self.ok("lessons.list", params)
            .get("lessons")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
    }

    pub fn write_line(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write line");
        self.stdin.flush().expect("flush line");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read line");
        serde_json::from_str(out.trim()).expect("parse response json")
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Ids of a small school: two classes, Mr. Smith (Math) and Ms. Jones
/// (Math, English).
pub struct School {
    pub class_a: String,
    pub class_b: String,
    pub smith: String,
    pub jones: String,
    pub math: String,
    pub english: String,
}

pub fn seed_school(s: &mut Sidecar) -> School {
    let class_a = s.create("classes.create", "ClassA", "classId");
    let class_b = s.create("classes.create", "ClassB", "classId");
    let smith = s.create("teachers.create", "Mr. Smith", "teacherId");
    let jones = s.create("teachers.create", "Ms. Jones", "teacherId");
    let math = s.create("subjects.create", "Math", "subjectId");
    let english = s.create("subjects.create", "English", "subjectId");
    for (teacher, subject) in [(&smith, &math), (&jones, &math), (&jones, &english)] {
        s.ok(
            "teachers.qualify",
            json!({ "teacherId": teacher, "subjectId": subject }),
        );
    }
    School {
        class_a,
        class_b,
        smith,
        jones,
        math,
        english,
    }
}

pub fn placement(
    subject: &str,
    class: &str,
    teacher: &str,
    day: &str,
    start: &str,
    end: &str,
) -> serde_json::Value {
    json!({
        "subject": subject,
        "class": class,
        "teacher": teacher,
        "day": day,
        "startTime": start,
        "endTime": end
    })
}
