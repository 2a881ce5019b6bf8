use std::sync::{Arc, RwLock};

/// `current/total` progress of the remote inventory scan.
///
/// Cloning shares the underlying state. Only the inventory phase writes it;
/// the reporter reads it on every render.
#[derive(Clone, Debug, Default)]
pub struct ScanProgress {
    inner: Arc<RwLock<Counts>>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    current: u64,
    total: u64,
}

/// Callback handed to the inventory phase.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

impl ScanProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, current: u64, total: u64) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Counts { current, total };
    }

    /// Percentage read so far. An unknown total (`0`) reads as complete.
    pub fn percent(&self) -> u32 {
        let Counts { current, total } = *self.inner.read().unwrap_or_else(|e| e.into_inner());
        if total == 0 {
            return 100;
        }
        (100 * current.min(total) / total) as u32
    }

    pub fn callback(&self) -> ProgressFn {
        let this = self.clone();
        Arc::new(move |current, total| this.update(current, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_total_is_complete() {
        let p = ScanProgress::new();
        assert_eq!(p.percent(), 100);
        p.update(0, 0);
        assert_eq!(p.percent(), 100);
    }

    #[test]
    fn quarter_then_full() {
        let p = ScanProgress::new();
        p.update(50, 200);
        assert_eq!(p.percent(), 25);
        p.update(200, 200);
        assert_eq!(p.percent(), 100);
    }

    #[test]
    fn percent_is_monotonic_and_bounded() {
        let p = ScanProgress::new();
        let mut last = 0;
        for v in (0..=997).step_by(7) {
            p.update(v, 997);
            let pct = p.percent();
            assert!(pct >= last && pct <= 100);
            last = pct;
        }
    }

    #[test]
    fn callback_updates_shared_state() {
        let p = ScanProgress::new();
        let cb = p.callback();
        cb(3, 4);
        assert_eq!(p.percent(), 75);
    }
}
