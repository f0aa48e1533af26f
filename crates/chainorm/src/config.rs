//! Query-layer configuration, per-chain sessions and cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};

/// Defaults applied to every chain started from a [`crate::Db`].
///
/// ```ignore
/// let config = DbConfig::new().allow_global_delete(true).debug(true);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Permit UPDATE without caller conditions.
    pub allow_global_update: bool,
    /// Permit DELETE without caller conditions.
    pub allow_global_delete: bool,
    /// Log every dispatched statement at INFO instead of DEBUG.
    pub debug: bool,
}

impl DbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_global_update(mut self, allow: bool) -> Self {
        self.allow_global_update = allow;
        self
    }

    pub fn allow_global_delete(mut self, allow: bool) -> Self {
        self.allow_global_delete = allow;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Per-chain overrides. Unset fields keep the current value.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub allow_global_update: Option<bool>,
    pub allow_global_delete: Option<bool>,
    pub debug: Option<bool>,
    pub cancel: Option<CancelSignal>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_global_update(mut self, allow: bool) -> Self {
        self.allow_global_update = Some(allow);
        self
    }

    pub fn allow_global_delete(mut self, allow: bool) -> Self {
        self.allow_global_delete = Some(allow);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub(crate) fn apply(&self, config: &mut DbConfig) {
        if let Some(v) = self.allow_global_update {
            config.allow_global_update = v;
        }
        if let Some(v) = self.allow_global_delete {
            config.allow_global_delete = v;
        }
        if let Some(v) = self.debug {
            config.debug = v;
        }
    }
}

/// Cooperative cancellation: a shared flag plus an optional deadline.
///
/// Checked once, right before a built statement is handed to the executor.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel every clone of this signal.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn check(&self) -> OrmResult<()> {
        if self.is_cancelled() {
            return Err(OrmError::cancelled("request cancelled"));
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(OrmError::cancelled("deadline exceeded"))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_overrides_only_set_fields() {
        let mut config = DbConfig::new().allow_global_delete(true);
        Session::new().allow_global_update(true).apply(&mut config);
        assert!(config.allow_global_update);
        assert!(config.allow_global_delete);
        assert!(!config.debug);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: DbConfig = serde_json::from_str(r#"{"debug": true}"#).unwrap();
        assert_eq!(config, DbConfig::new().debug(true));
    }

    #[test]
    fn cancel_signal_is_shared_by_clones() {
        let signal = CancelSignal::new();
        let clone = signal.clone();
        assert!(clone.check().is_ok());
        signal.cancel();
        assert!(clone.check().unwrap_err().is_cancelled());
    }

    #[test]
    fn past_deadline_cancels() {
        let signal = CancelSignal::new().with_deadline(Instant::now());
        assert!(signal.check().unwrap_err().is_cancelled());
        assert!(CancelSignal::new().with_timeout(Duration::from_secs(60)).check().is_ok());
    }
}
