//! Append-only per-rank timing registry, printed at shutdown.

use std::time::{Duration, Instant};

/// Named phase durations for one rank.
#[derive(Debug, Default)]
pub struct Summary {
    entries: Vec<(String, Duration)>,
}

impl Summary {
    pub fn new() -> Self {
        Summary::default()
    }

    /// Run `f`, recording its wall time under `name`.
    pub fn time<R>(&mut self, name: &str, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let out = f();
        self.entries.push((name.to_string(), start.elapsed()));
        out
    }

    pub fn record(&mut self, name: &str, elapsed: Duration) {
        self.entries.push((name.to_string(), elapsed));
    }

    pub fn entries(&self) -> &[(String, Duration)] {
        &self.entries
    }

    /// Human-readable table, one line per phase.
    pub fn print(&self, rank: usize) {
        println!("summary (rank {rank})");
        for (name, elapsed) in &self.entries {
            println!("  {name}: {:.3} ms", elapsed.as_secs_f64() * 1e3);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_records_in_call_order() {
        let mut summary = Summary::new();
        let x = summary.time("first", || 40 + 2);
        assert_eq!(x, 42);
        summary.record("second", Duration::from_millis(1));
        let names: Vec<&str> = summary.entries().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
