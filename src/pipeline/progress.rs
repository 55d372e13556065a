/// Frame counter that reports through `tracing` at coarse intervals.
///
/// With a known total it reports every 10% (and on the last frame); otherwise every
/// [`UNBOUNDED_REPORT_EVERY`] frames.
#[derive(Debug, Clone)]
pub struct Progress {
    label: &'static str,
    total: Option<u64>,
    done: u64,
    next_report: u64,
}

pub const UNBOUNDED_REPORT_EVERY: u64 = 100;

impl Progress {
    pub fn new(label: &'static str, total: Option<u64>) -> Self {
        let mut p = Self {
            label,
            total,
            done: 0,
            next_report: 0,
        };
        p.next_report = p.step();
        p
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn done(&self) -> u64 {
        self.done
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Count one frame. Returns `true` when this frame triggered a report.
    pub fn advance(&mut self) -> bool {
        self.done += 1;
        if self.done < self.next_report {
            return false;
        }

        match self.total {
            Some(total) if total > 0 => {
                let percent = self.done.saturating_mul(100) / total;
                tracing::info!(done = self.done, total, percent, "{}", self.label);
            }
            _ => tracing::info!(done = self.done, "{}", self.label),
        }
        self.next_report = match self.total {
            Some(total) if self.done < total => (self.done + self.step()).min(total),
            Some(_) => u64::MAX,
            None => self.done + self.step(),
        };
        true
    }

    fn step(&self) -> u64 {
        match self.total {
            Some(total) => (total / 10).max(1),
            None => UNBOUNDED_REPORT_EVERY,
        }
    }
}
