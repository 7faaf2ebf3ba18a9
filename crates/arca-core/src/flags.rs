//! Process-wide runtime flags
//!
//! One shared flag set per process, accessed through typed methods. The
//! download flags default to true on startup so no downloads run before the
//! config import finishes; `enable_downloads` flips them after import.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    refreshing: AtomicBool,
    downloads_disabled: AtomicBool,
    downloads_stopped: AtomicBool,
    wrol_mode: AtomicBool,
}

/// Shared runtime flags. Cheap to clone.
#[derive(Clone, Debug)]
pub struct RuntimeFlags {
    inner: Arc<Inner>,
}

impl RuntimeFlags {
    pub fn new() -> Self {
        let inner = Inner {
            refreshing: AtomicBool::new(false),
            downloads_disabled: AtomicBool::new(true),
            downloads_stopped: AtomicBool::new(true),
            wrol_mode: AtomicBool::new(false),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Try to start a refresh. Returns `None` when a refresh is already in
    /// progress. The returned guard clears the flag on drop, so the flag is
    /// released even when the refresh aborts early.
    pub fn begin_refresh(&self) -> Option<RefreshGuard> {
        let already = self
            .inner
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err();
        if already {
            None
        } else {
            Some(RefreshGuard {
                flags: self.clone(),
            })
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refreshing.load(Ordering::SeqCst)
    }

    pub fn downloads_disabled(&self) -> bool {
        self.inner.downloads_disabled.load(Ordering::SeqCst)
    }

    pub fn downloads_stopped(&self) -> bool {
        self.inner.downloads_stopped.load(Ordering::SeqCst)
    }

    pub fn set_downloads_disabled(&self, value: bool) {
        self.inner.downloads_disabled.store(value, Ordering::SeqCst);
    }

    pub fn set_downloads_stopped(&self, value: bool) {
        self.inner.downloads_stopped.store(value, Ordering::SeqCst);
    }

    /// Allow download workers to pull new work. Called once configs have
    /// finished importing.
    pub fn enable_downloads(&self) {
        self.set_downloads_disabled(false);
        self.set_downloads_stopped(false);
    }

    pub fn is_wrol_mode(&self) -> bool {
        self.inner.wrol_mode.load(Ordering::SeqCst)
    }

    pub fn set_wrol_mode(&self, value: bool) {
        self.inner.wrol_mode.store(value, Ordering::SeqCst);
    }
}

impl Default for RuntimeFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the refreshing flag when dropped.
pub struct RefreshGuard {
    flags: RuntimeFlags,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.flags.inner.refreshing.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downloads_start_disabled_and_stopped() {
        let flags = RuntimeFlags::new();
        assert!(flags.downloads_disabled());
        assert!(flags.downloads_stopped());

        flags.enable_downloads();
        assert!(!flags.downloads_disabled());
        assert!(!flags.downloads_stopped());
    }

    #[test]
    fn refresh_is_single_flight() {
        let flags = RuntimeFlags::new();
        let guard = flags.begin_refresh().expect("first refresh starts");
        assert!(flags.is_refreshing());
        assert!(flags.begin_refresh().is_none());

        drop(guard);
        assert!(!flags.is_refreshing());
        assert!(flags.begin_refresh().is_some());
    }

    #[test]
    fn clones_share_state() {
        let flags = RuntimeFlags::new();
        let other = flags.clone();
        flags.set_wrol_mode(true);
        assert!(other.is_wrol_mode());
    }
}
