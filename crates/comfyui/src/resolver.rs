//! Job resolution: turning a submitted job id into a terminal state.
//!
//! The completion oracle is queue absence: a job is complete when it no
//! longer appears in a *successfully fetched* queue snapshot. A failed
//! snapshot fetch is a retry, never a completion signal. After apparent
//! completion the history is consulted once per check; a missing history
//! entry means the backend is lagging and the job is still pending.

use std::time::Duration;

use crate::api::GenerationBackend;

/// Default seconds between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default poll budget (~2 minutes at the default interval).
pub const DEFAULT_POLL_BUDGET: u32 = 120;

/// What kind of output a locator points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Image,
    Animation,
}

/// Canonical location of a job's output on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocator {
    pub filename: String,
    /// Possibly empty; changes the URL form when present.
    pub subfolder: String,
    pub kind: OutputKind,
}

impl OutputLocator {
    /// Public URL of the output under `base`.
    pub fn public_url(&self, base: &str) -> String {
        if self.subfolder.is_empty() {
            format!("{}/output/{}", base, self.filename)
        } else {
            format!("{}/output/{}/{}", base, self.subfolder, self.filename)
        }
    }
}

/// Terminal result of a full poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The job produced a recognizable output.
    Output(OutputLocator),
    /// The backend reports completion but no image or animation output.
    NoOutput,
    /// The poll budget was exhausted; treated identically to a
    /// backend-side failure.
    TimedOut,
}

/// Result of a single-shot completion check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobCheck {
    /// Still queued, running, or unobservable; check again later.
    Pending,
    /// Complete with an output.
    Output(OutputLocator),
    /// Complete with no recognizable output.
    NoOutput,
}

/// Scan a history `outputs` map node-by-node, in the backend's
/// enumeration order, and return the first image or animation entry.
///
/// Within each node an `images` entry is preferred over a `gifs` entry;
/// across nodes, first match wins.
pub fn first_output(outputs: &serde_json::Value) -> Option<OutputLocator> {
    let nodes = outputs.as_object()?;
    for node_output in nodes.values() {
        for (key, kind) in [("images", OutputKind::Image), ("gifs", OutputKind::Animation)] {
            let Some(entries) = node_output.get(key).and_then(|v| v.as_array()) else {
                continue;
            };
            let Some(entry) = entries.first() else {
                continue;
            };
            let Some(filename) = entry.get("filename").and_then(|v| v.as_str()) else {
                continue;
            };
            let subfolder = entry
                .get("subfolder")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            return Some(OutputLocator {
                filename: filename.to_string(),
                subfolder: subfolder.to_string(),
                kind,
            });
        }
    }
    None
}

/// Polling loop configuration. One resolver instance is shared per
/// process; all state lives on the backend.
#[derive(Debug, Clone)]
pub struct JobResolver {
    pub poll_interval: Duration,
    pub poll_budget: u32,
}

impl Default for JobResolver {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_budget: DEFAULT_POLL_BUDGET,
        }
    }
}

impl JobResolver {
    pub fn new(poll_interval: Duration, poll_budget: u32) -> Self {
        Self {
            poll_interval,
            poll_budget,
        }
    }

    /// One idempotent completion check. Never sleeps; safe to call from
    /// interactive status queries at any frequency.
    pub async fn check_once(&self, backend: &dyn GenerationBackend, job_id: &str) -> JobCheck {
        let snapshot = match backend.queue_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // A failed fetch says nothing about the job; retry.
                tracing::debug!(job_id, error = %e, "Queue snapshot failed; will retry");
                return JobCheck::Pending;
            }
        };

        if snapshot.contains(job_id) {
            return JobCheck::Pending;
        }

        // Absent from the queue: completion is plausible, confirm via
        // history. The backend may lag, so a missing entry keeps the job
        // pending rather than concluding failure.
        let Some(history) = backend.get_history(job_id).await else {
            return JobCheck::Pending;
        };
        let Some(entry) = history.get(job_id) else {
            return JobCheck::Pending;
        };

        let outputs = entry.get("outputs").cloned().unwrap_or_default();
        match first_output(&outputs) {
            Some(locator) => JobCheck::Output(locator),
            None => JobCheck::NoOutput,
        }
    }

    /// Poll until the job resolves or the budget is exhausted.
    ///
    /// Used by batch/admin flows; interactive flows call
    /// [`check_once`](Self::check_once) per status request instead. The
    /// budget guarantees this returns rather than hanging.
    pub async fn wait(&self, backend: &dyn GenerationBackend, job_id: &str) -> Resolution {
        for attempt in 0..self.poll_budget {
            // Check before sleeping: an already-finished job resolves
            // without paying a poll interval.
            if attempt > 0 {
                tokio::time::sleep(self.poll_interval).await;
            }
            match self.check_once(backend, job_id).await {
                JobCheck::Pending => continue,
                JobCheck::Output(locator) => return Resolution::Output(locator),
                JobCheck::NoOutput => return Resolution::NoOutput,
            }
        }
        tracing::warn!(job_id, budget = self.poll_budget, "Job poll budget exhausted");
        Resolution::TimedOut
    }
}
