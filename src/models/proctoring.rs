use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProctoringEventType {
    TabSwitch,
    FullscreenExit,
    CopyPaste,
    DevtoolsOpen,
    Other,
}

impl ProctoringEventType {
    pub fn severity(self) -> Severity {
        match self {
            ProctoringEventType::TabSwitch | ProctoringEventType::FullscreenExit => {
                Severity::Medium
            }
            ProctoringEventType::DevtoolsOpen => Severity::High,
            ProctoringEventType::CopyPaste | ProctoringEventType::Other => Severity::Low,
        }
    }

    pub fn default_description(self) -> &'static str {
        match self {
            ProctoringEventType::TabSwitch => "Candidate left the test tab",
            ProctoringEventType::FullscreenExit => "Candidate exited fullscreen mode",
            ProctoringEventType::CopyPaste => "Copy or paste attempt detected",
            ProctoringEventType::DevtoolsOpen => "Developer tools appear to be open",
            ProctoringEventType::Other => "Proctoring event",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Append-only audit entry on a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProctoringEvent {
    pub event_type: ProctoringEventType,
    pub severity: Severity,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Counters and derived verdict kept on each session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProctoringCounters {
    pub tab_switches: u32,
    pub fullscreen_exits: u32,
    pub copy_paste_attempts: u32,
    pub devtools_opened: u32,
}

impl ProctoringCounters {
    /// Counts one event. Counters only ever grow.
    pub fn record(&mut self, event_type: ProctoringEventType) {
        match event_type {
            ProctoringEventType::TabSwitch => self.tab_switches += 1,
            ProctoringEventType::FullscreenExit => self.fullscreen_exits += 1,
            ProctoringEventType::CopyPaste => self.copy_paste_attempts += 1,
            ProctoringEventType::DevtoolsOpen => self.devtools_opened += 1,
            ProctoringEventType::Other => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProctoringSnapshot {
    #[serde(flatten)]
    pub counters: ProctoringCounters,
    pub security_score: u32,
    pub blocked: bool,
}

impl Default for ProctoringSnapshot {
    fn default() -> Self {
        Self {
            counters: ProctoringCounters::default(),
            security_score: 100,
            blocked: false,
        }
    }
}
