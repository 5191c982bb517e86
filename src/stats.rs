use std::time::Instant;

use tracing::info;

use crate::dispatch::Outbound;

/// Link counters for the slave loop.
#[derive(Debug, Clone)]
pub struct Stats {
    pub frames: u64,
    pub errors: u64,
    pub telemetry: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    t0: Instant,
    last: Instant,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            frames: 0,
            errors: 0,
            telemetry: 0,
            bytes_in: 0,
            bytes_out: 0,
            t0: Instant::now(),
            last: Instant::now(),
        }
    }
    pub fn add_in(&mut self, n: usize) {
        self.bytes_in += n as u64;
    }
    pub fn add_out(&mut self, n: usize) {
        self.bytes_out += n as u64;
    }
    pub fn record(&mut self, out: &Outbound) {
        self.frames += 1;
        if out.is_error() {
            self.errors += 1;
        }
    }
    pub fn inc_telemetry(&mut self) {
        self.telemetry += 1;
    }

    /// Log a summary line every `interval` seconds; 0 or less disables it.
    pub fn maybe_log(&mut self, interval: f64) {
        if interval <= 0.0 || self.last.elapsed().as_secs_f64() < interval {
            return;
        }
        let dur = self.t0.elapsed().as_secs_f64().max(1e-3);
        info!(
            "[link] frames={} errors={} telemetry={} in={}B out={}B over {:.1}s",
            self.frames, self.errors, self.telemetry, self.bytes_in, self.bytes_out, dur
        );
        self.last = Instant::now();
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}
