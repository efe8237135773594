use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::info;

use crate::modules::toast::{ToastDispatcher, ToastSignal};

#[derive(Debug, Clone)]
pub struct LeaveRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reason: String,
    pub submitted_at: DateTime<Local>,
}

impl LeaveRequest {
    /// Calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Leave requests filed during this session. Submissions report back through
/// the toast dispatcher rather than touching notifications directly.
pub struct LeaveRequestsModule {
    pub requests: Vec<LeaveRequest>,
    toasts: ToastDispatcher,
    confirm_delay: Duration,
}

impl LeaveRequestsModule {
    pub fn new(toasts: ToastDispatcher, confirm_delay: Duration) -> Self {
        Self {
            requests: Vec::new(),
            toasts,
            confirm_delay,
        }
    }

    /// Parses `start|end|reason` and files the request. The confirmation toast
    /// is raised from a background task once the simulated round-trip ends.
    pub fn submit_from_string(&mut self, input: &str) -> Result<JoinHandle<()>> {
        let (start, end, reason) = match parse_leave_input(input) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.toasts
                    .publish(ToastSignal::new("error", "Leave request failed", e.to_string()));
                return Err(e);
            }
        };

        let request = LeaveRequest {
            start,
            end,
            reason,
            submitted_at: Local::now(),
        };
        let message = format!(
            "{} to {} ({} day{}): {}",
            request.start,
            request.end,
            request.days(),
            if request.days() == 1 { "" } else { "s" },
            request.reason
        );
        info!(start = %request.start, end = %request.end, "leave request filed");
        self.requests.insert(0, request);

        let toasts = self.toasts.clone();
        let delay = self.confirm_delay;
        Ok(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            toasts.publish(ToastSignal::new("success", "Leave request submitted", message));
        }))
    }

    pub fn total_days(&self) -> i64 {
        self.requests.iter().map(LeaveRequest::days).sum()
    }
}

pub fn parse_leave_input(input: &str) -> Result<(NaiveDate, NaiveDate, String)> {
    let parts: Vec<&str> = input.split('|').map(str::trim).collect();
    if parts.len() != 3 {
        anyhow::bail!("Invalid format. Use: YYYY-MM-DD|YYYY-MM-DD|reason");
    }
    let start = NaiveDate::parse_from_str(parts[0], "%Y-%m-%d")
        .with_context(|| format!("Invalid start date {:?}", parts[0]))?;
    let end = NaiveDate::parse_from_str(parts[1], "%Y-%m-%d")
        .with_context(|| format!("Invalid end date {:?}", parts[1]))?;
    if end < start {
        anyhow::bail!("End date {} is before start date {}", end, start);
    }
    if parts[2].is_empty() {
        anyhow::bail!("A reason is required");
    }
    Ok((start, end, parts[2].to_string()))
}
