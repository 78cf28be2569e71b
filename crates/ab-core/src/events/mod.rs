//! Progress event emission.
//!
//! Long-running fits report progress through a [`ProgressEmitter`] handed in
//! via `FitOptions::progress`. The VBEM engine emits one `vbem_iteration`
//! event per iteration; every engine brackets its work with `fit_started`
//! and `fit_complete`. The CLI sends events to stderr and/or a file through
//! a [`FanoutEmitter`] wrapped in a [`RunEmitter`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Standard progress event names.
pub mod event_names {
    pub const FIT_STARTED: &str = "fit_started";
    pub const FIT_COMPLETE: &str = "fit_complete";

    pub const VBEM_ITERATION: &str = "vbem_iteration";

    pub const COMPARE_STARTED: &str = "compare_started";
    pub const COMPARE_CANDIDATE: &str = "compare_candidate";
    pub const COMPARE_COMPLETE: &str = "compare_complete";
}

/// Stage a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Fit,
    Vbem,
    Compare,
}

/// Progress counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Structured progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub stage: ProgressStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, Value>,
}

impl ProgressEvent {
    pub fn new(event: impl Into<String>, stage: ProgressStage) -> Self {
        Self {
            event: event.into(),
            timestamp: Utc::now(),
            run_id: None,
            stage,
            progress: None,
            iteration: None,
            details: HashMap::new(),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_progress(mut self, current: u64, total: Option<u64>) -> Self {
        self.progress = Some(Progress { current, total });
        self
    }

    pub fn with_iteration(mut self, iteration: u64) -> Self {
        self.iteration = Some(iteration);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.insert(key.into(), v);
        }
        self
    }

    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.event
            )
        })
    }
}

/// Trait for emitting progress events.
pub trait ProgressEmitter: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// JSONL writer for progress events.
pub struct JsonlWriter<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> ProgressEmitter for JsonlWriter<W> {
    fn emit(&self, event: ProgressEvent) {
        let line = event.to_jsonl();
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
        }
    }
}

/// Forwards events to several emitters.
pub struct FanoutEmitter {
    emitters: Vec<Arc<dyn ProgressEmitter>>,
}

impl FanoutEmitter {
    pub fn new(emitters: Vec<Arc<dyn ProgressEmitter>>) -> Self {
        Self { emitters }
    }
}

impl ProgressEmitter for FanoutEmitter {
    fn emit(&self, event: ProgressEvent) {
        for emitter in &self.emitters {
            emitter.emit(event.clone());
        }
    }
}

/// Stamps a run ID onto events that lack one, such as `vbem_iteration`.
pub struct RunEmitter {
    run_id: String,
    inner: Arc<dyn ProgressEmitter>,
}

impl RunEmitter {
    pub fn new(run_id: impl Into<String>, inner: Arc<dyn ProgressEmitter>) -> Self {
        Self {
            run_id: run_id.into(),
            inner,
        }
    }
}

impl ProgressEmitter for RunEmitter {
    fn emit(&self, mut event: ProgressEvent) {
        if event.run_id.is_none() {
            event.run_id = Some(self.run_id.clone());
        }
        self.inner.emit(event);
    }
}

/// Keeps every event in memory; handy for callers that inspect progress
/// after the fit returns.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events whose name matches `name`.
    pub fn named(&self, name: &str) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event == name)
            .collect()
    }
}

impl ProgressEmitter for RecordingEmitter {
    fn emit(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_jsonl() {
        let event = ProgressEvent::new(event_names::VBEM_ITERATION, ProgressStage::Vbem)
            .with_run_id("run-1")
            .with_progress(3, Some(100))
            .with_iteration(3)
            .with_detail("elbo", -42.5);
        let json = event.to_jsonl();
        assert!(json.contains(r#""event":"vbem_iteration""#));
        assert!(json.contains(r#""stage":"vbem""#));
        assert!(json.contains(r#""iteration":3"#));
        assert!(json.contains(r#""elbo":-42.5"#));
    }

    #[test]
    fn test_run_emitter_attaches_run_id() {
        let capture = Arc::new(RecordingEmitter::new());
        let emitter = RunEmitter::new("run-123", capture.clone());
        emitter.emit(ProgressEvent::new(event_names::FIT_STARTED, ProgressStage::Fit));
        let recorded = capture.events();
        assert_eq!(recorded[0].run_id.as_deref(), Some("run-123"));
    }

    #[test]
    fn test_fanout_and_jsonl_writer() {
        let capture = Arc::new(RecordingEmitter::new());
        let writer = Arc::new(JsonlWriter::new(Vec::<u8>::new()));
        let emitters: Vec<Arc<dyn ProgressEmitter>> = vec![capture.clone(), writer.clone()];
        let fanout = FanoutEmitter::new(emitters);
        fanout.emit(ProgressEvent::new(event_names::COMPARE_STARTED, ProgressStage::Compare));
        assert_eq!(capture.named(event_names::COMPARE_STARTED).len(), 1);
        let buf = writer.writer.lock().unwrap();
        assert!(String::from_utf8_lossy(&buf).ends_with('\n'));
    }
}
