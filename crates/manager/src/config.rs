//! Manager tuning knobs

use std::time::Duration;

/// Timeouts applied by a coordinator when driving a commit round.
///
/// A peer that does not answer inside the window is treated exactly like a
/// refusal: silence counts against the transaction.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// How long to wait for each prepare vote
    pub prepare_timeout: Duration,
    /// How long to wait for each commit acknowledgement
    pub commit_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            prepare_timeout: Duration::from_secs(5),
            commit_timeout: Duration::from_secs(5),
        }
    }
}
