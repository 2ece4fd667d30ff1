//! Interruption flag shared between the signal handler and the orchestrator.
//!
//! Passes only observe the flag between steps. While the run is blocked on
//! operator input nothing would observe it, so readers mark that time with
//! [`Interrupt::while_waiting`] and the signal handler exits instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
    waiting: Arc<AtomicBool>,
    stage: Arc<Mutex<String>>,
}

/// What the signal handler should do after [`Interrupt::signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// The run is blocked reading from the operator; exit now.
    ExitNow,
    /// The orchestrator sees the flag at its next check.
    StopAtNextCheck,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Raise the flag on behalf of a signal.
    pub fn signal(&self) -> SignalAction {
        self.raise();
        if self.is_waiting() {
            SignalAction::ExitNow
        } else {
            SignalAction::StopAtNextCheck
        }
    }

    /// Run `f`, a blocking read on the operator, with the waiting mark set.
    pub fn while_waiting<T>(&self, f: impl FnOnce() -> T) -> T {
        let _mark = WaitMark::set(&self.waiting);
        f()
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn enter(&self, stage: &str) {
        if let Ok(mut s) = self.stage.lock() {
            *s = stage.to_string();
        }
    }

    /// The stage the run was in last, for the interruption log line.
    pub fn stage(&self) -> String {
        self.stage
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

/// Clears the waiting mark on drop, including on unwind.
struct WaitMark<'a>(&'a AtomicBool);

impl<'a> WaitMark<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for WaitMark<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let a = Interrupt::new();
        let b = a.clone();
        a.enter("ssh");
        b.raise();
        assert!(a.is_raised());
        assert_eq!(b.stage(), "ssh");
    }

    #[test]
    fn signal_while_waiting_asks_for_exit() {
        let interrupt = Interrupt::new();
        let handler = interrupt.clone();
        let action = interrupt.while_waiting(|| {
            assert!(handler.is_waiting());
            handler.signal()
        });
        assert_eq!(action, SignalAction::ExitNow);
        assert!(!interrupt.is_waiting());
        assert!(interrupt.is_raised());
    }

    #[test]
    fn signal_between_reads_waits_for_the_next_check() {
        let interrupt = Interrupt::new();
        assert_eq!(interrupt.while_waiting(|| 7), 7);
        assert_eq!(interrupt.signal(), SignalAction::StopAtNextCheck);
        assert!(interrupt.is_raised());
    }
}
