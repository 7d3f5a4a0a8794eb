use crate::config::ProctoringPolicy;
use crate::models::proctoring::{ProctoringCounters, ProctoringSnapshot};

const TAB_SWITCH_PENALTY: u32 = 10;
const FULLSCREEN_EXIT_PENALTY: u32 = 15;
const COPY_PASTE_PENALTY: u32 = 5;
const DEVTOOLS_PENALTY: u32 = 25;

/// Derives the security verdict for a session from its violation counters.
/// Observational only: it can log and threshold browser actions, never prevent them.
#[derive(Debug, Clone)]
pub struct ProctoringMonitor {
    policy: ProctoringPolicy,
}

impl ProctoringMonitor {
    pub fn new(policy: ProctoringPolicy) -> Self {
        Self { policy }
    }

    /// `100` minus weighted penalties, floored at `0`.
    pub fn security_score(counters: &ProctoringCounters) -> u32 {
        let penalty = counters
            .tab_switches
            .saturating_mul(TAB_SWITCH_PENALTY)
            .saturating_add(counters.fullscreen_exits.saturating_mul(FULLSCREEN_EXIT_PENALTY))
            .saturating_add(counters.copy_paste_attempts.saturating_mul(COPY_PASTE_PENALTY))
            .saturating_add(counters.devtools_opened.saturating_mul(DEVTOOLS_PENALTY));
        100u32.saturating_sub(penalty)
    }

    pub fn is_blocked(&self, counters: &ProctoringCounters) -> bool {
        counters.tab_switches > self.policy.max_tab_switches
            || counters.fullscreen_exits > self.policy.max_fullscreen_exits
            || counters.copy_paste_attempts > self.policy.max_copy_paste
            || counters.devtools_opened > self.policy.max_devtools
    }

    pub fn snapshot(&self, counters: &ProctoringCounters) -> ProctoringSnapshot {
        ProctoringSnapshot {
            counters: *counters,
            security_score: Self::security_score(counters),
            blocked: self.is_blocked(counters),
        }
    }

    /// Whether a blocked session should be closed right away.
    pub fn should_auto_submit(&self, counters: &ProctoringCounters) -> bool {
        self.policy.auto_submit && self.is_blocked(counters)
    }
}
