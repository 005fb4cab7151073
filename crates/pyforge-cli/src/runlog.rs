//! Per-run transcript file: prompts, responses, extracted code and issues.

use anyhow::{Context, Result};
use chrono::Local;
use pyforge_core::{Attempt, RunState};
use pyforge_engine::RunObserver;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct RunLog {
    path: PathBuf,
    out: Mutex<BufWriter<File>>,
}

/// `pyforge_run_<YYYYmmdd_HHMMSS_micros>.log`
pub fn log_file_name(now: chrono::DateTime<Local>) -> String {
    format!("pyforge_run_{}.log", now.format("%Y%m%d_%H%M%S_%6f"))
}

impl RunLog {
    /// Create a fresh log file in `dir`, creating the directory if needed.
    pub fn create(dir: &Path, query: &str, model: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let path = dir.join(log_file_name(Local::now()));
        let file = File::create(&path)
            .with_context(|| format!("failed to create run log {}", path.display()))?;

        let log = Self {
            path,
            out: Mutex::new(BufWriter::new(file)),
        };
        log.write(&format!(
            "=== pyforge run started {} ===\nModel: {}\nQuery: {}\n",
            Local::now().to_rfc3339(),
            model,
            query
        ));
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the terminal status and flush.
    pub fn finish(&self, state: &RunState) {
        let mut text = format!("\n=== run finished: {} ===\n", state.status());
        if let pyforge_core::RunStatus::Aborted { reason } = state.status() {
            text.push_str(&format!("Reason: {}\n", reason));
        }
        text.push_str(&format!("Model calls: {}\n", state.model_calls()));
        self.write(&text);
        if let Ok(mut out) = self.out.lock()
            && let Err(e) = out.flush()
        {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to flush run log");
        }
    }

    fn write(&self, text: &str) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        if let Err(e) = out.write_all(text.as_bytes()) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write run log");
        }
    }
}

impl RunObserver for RunLog {
    fn attempt_started(&self, index: usize, max_attempts: usize) {
        self.write(&format!("\n--- Attempt {}/{} ---\n", index, max_attempts));
    }

    fn attempt_finished(&self, attempt: &Attempt) {
        self.write(&format_attempt(attempt));
    }
}

fn format_attempt(attempt: &Attempt) -> String {
    let mut text = format!("[prompt]\n{}\n", attempt.prompt);
    match &attempt.response {
        Some(response) => text.push_str(&format!("[response]\n{}\n", response)),
        None => text.push_str("[response]\n<none: model call failed>\n"),
    }
    match &attempt.code {
        Some(code) => text.push_str(&format!("[code]\n{}\n", code)),
        None => text.push_str("[code]\n<none>\n"),
    }
    if attempt.issues.is_empty() {
        text.push_str("[issues]\nnone\n");
    } else {
        text.push_str("[issues]\n");
        for issue in &attempt.issues {
            text.push_str(&format!("- {}\n", issue));
        }
    }
    text.push_str(&format!(
        "[outcome] {:?} in {} ms\n",
        attempt.outcome, attempt.elapsed_ms
    ));
    text
}
