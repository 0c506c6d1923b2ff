use anyhow::Result;
use chrono::Utc;
use serde_json::{Value, json};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

static APPEND_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone)]
pub struct RunEvent {
    pub run_id: String,
    pub event: String,
    pub week: Option<String>,
    pub details: Value,
}

impl RunEvent {
    pub fn new(run_id: &str, event: &str, week: Option<String>, details: Value) -> Self {
        Self {
            run_id: run_id.to_string(),
            event: event.to_string(),
            week,
            details,
        }
    }
}

pub fn mirror_event(path: &Path, ev: &RunEvent) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let line = json!({
        "ts": Utc::now().to_rfc3339(),
        "run_id": ev.run_id,
        "event": ev.event,
        "week": ev.week,
        "details": ev.details
    });
    let _guard = APPEND_LOCK.lock().map_err(|_| anyhow::anyhow!("log lock poisoned"))?;
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{}", line)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_json_line_per_event() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logs").join("run.ndjson");
        mirror_event(
            &path,
            &RunEvent::new("r1", "week_started", Some("2013_06_16".into()), json!({})),
        )
        .unwrap();
        mirror_event(
            &path,
            &RunEvent::new("r1", "week_completed", None, json!({"categories": 2})),
        )
        .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines = raw
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "week_started");
        assert_eq!(lines[0]["week"], "2013_06_16");
        assert_eq!(lines[1]["week"], Value::Null);
        assert_eq!(lines[1]["details"]["categories"], 2);
    }
}
