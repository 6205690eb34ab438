use std::time::Instant;

use forgedb::statement::QueryResult;

/// Prints a row-count/timing line after a statement executes. Always
/// shown in the REPL; gated by `show_stats` in batch mode (§2.10).
pub struct Show {
    enabled: bool,
    start: Instant,
}

impl Show {
    pub fn new(is_repl: bool, show_stats: bool) -> Self {
        Self::new_with_start(is_repl, show_stats, Instant::now())
    }

    pub fn new_with_start(is_repl: bool, show_stats: bool, start: Instant) -> Self {
        Show { enabled: is_repl || show_stats, start }
    }

    pub fn output(&self, result: &QueryResult) {
        if !self.enabled {
            return;
        }
        if !result.ok {
            return;
        }
        let elapsed = self.start.elapsed().as_secs_f64();
        if result.headers.is_empty() {
            eprintln!("{} ({:.3} sec)", result.message, elapsed);
        } else {
            eprintln!("{} row(s) in ({:.3} sec)", result.rows.len(), elapsed);
        }
    }
}
