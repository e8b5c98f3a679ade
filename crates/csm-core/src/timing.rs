//! Per-command timing for `--timing` / `CSM_TIMING`.
//!
//! Samples are kept per thread; a CLI invocation runs on one thread, so the
//! report printed at exit covers every instrumented step of that command.

use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static ENABLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static SAMPLES: RefCell<Vec<(&'static str, Duration)>> = const { RefCell::new(Vec::new()) };
}

/// Latency summary for one instrumented step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepTiming {
    pub name: &'static str,
    pub count: usize,
    #[serde(rename = "p50_us", serialize_with = "as_micros")]
    pub p50: Duration,
    #[serde(rename = "p95_us", serialize_with = "as_micros")]
    pub p95: Duration,
    #[serde(rename = "total_us", serialize_with = "as_micros")]
    pub total: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimingReport {
    pub steps: Vec<StepTiming>,
}

/// `CSM_TIMING` set to `1`, `true`, `yes` or `on`.
#[must_use]
pub fn enabled_from_env() -> bool {
    std::env::var("CSM_TIMING").is_ok_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
    if !enabled {
        SAMPLES.with(|s| s.borrow_mut().clear());
    }
}

#[must_use]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Run `f`, recording its wall time under `name` when timing is on.
pub fn timed<R>(name: &'static str, f: impl FnOnce() -> R) -> R {
    if !is_enabled() {
        return f();
    }
    let started = Instant::now();
    let out = f();
    record(name, started.elapsed());
    out
}

fn record(name: &'static str, elapsed: Duration) {
    SAMPLES.with(|s| s.borrow_mut().push((name, elapsed)));
}

/// Drain this thread's samples into a report grouped by step name.
#[must_use]
pub fn collect_report() -> TimingReport {
    let samples = SAMPLES.with(|s| std::mem::take(&mut *s.borrow_mut()));
    let mut grouped: BTreeMap<&'static str, Vec<Duration>> = BTreeMap::new();
    for (name, elapsed) in samples {
        grouped.entry(name).or_default().push(elapsed);
    }

    let steps = grouped
        .into_iter()
        .map(|(name, mut values)| {
            values.sort_unstable();
            StepTiming {
                name,
                count: values.len(),
                p50: nearest_rank(&values, 50),
                p95: nearest_rank(&values, 95),
                total: values.iter().sum(),
            }
        })
        .collect();
    TimingReport { steps }
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Fixed-width table for stderr.
    #[must_use]
    pub fn display_table(&self) -> String {
        if self.steps.is_empty() {
            return "no timing samples recorded\n".to_string();
        }
        let mut out = format!(
            "{:<24} {:>5} {:>10} {:>10} {:>10}\n",
            "step", "count", "p50", "p95", "total"
        );
        out.push_str(&"-".repeat(63));
        out.push('\n');
        for step in &self.steps {
            let _ = writeln!(
                out,
                "{:<24} {:>5} {:>10} {:>10} {:>10}",
                step.name,
                step.count,
                human(step.p50),
                human(step.p95),
                human(step.total)
            );
        }
        out
    }
}

fn nearest_rank(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (pct.min(100) * sorted.len()).div_ceil(100);
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

fn human(d: Duration) -> String {
    let micros = d.as_micros();
    match micros {
        0..1_000 => format!("{micros}µs"),
        1_000..1_000_000 => format!("{:.2}ms", d.as_secs_f64() * 1_000.0),
        _ => format!("{:.3}s", d.as_secs_f64()),
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_micros<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u128(d.as_micros())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn disabled_timing_records_nothing() {
        let _g = GUARD.lock().expect("guard");
        set_enabled(false);
        assert_eq!(timed("task.list", || 3), 3);
        assert!(collect_report().is_empty());
    }

    #[test]
    fn enabled_timing_groups_by_step() {
        let _g = GUARD.lock().expect("guard");
        set_enabled(true);
        timed("task.add", || ());
        timed("task.add", || ());
        timed("okr.show", || ());
        let report = collect_report();
        set_enabled(false);

        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.steps[0].name, "okr.show");
        assert_eq!(report.steps[1].count, 2);
    }

    #[test]
    fn percentiles_use_nearest_rank() {
        let _g = GUARD.lock().expect("guard");
        set_enabled(true);
        for ms in [4, 1, 3, 2] {
            record("import.tasks", Duration::from_millis(ms));
        }
        let report = collect_report();
        set_enabled(false);

        let step = &report.steps[0];
        assert_eq!(step.p50, Duration::from_millis(2));
        assert_eq!(step.p95, Duration::from_millis(4));
        assert_eq!(step.total, Duration::from_millis(10));
    }

    #[test]
    fn report_renders_table_and_json() {
        let _g = GUARD.lock().expect("guard");
        set_enabled(true);
        record("export.accounts", Duration::from_micros(1_500));
        let report = collect_report();
        set_enabled(false);

        let table = report.display_table();
        assert!(table.contains("export.accounts"));
        assert!(table.contains("1.50ms"));

        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["steps"][0]["p50_us"], 1_500);
        assert_eq!(json["steps"][0]["count"], 1);
    }

    #[test]
    fn store_steps_are_sampled_per_call() {
        let _g = GUARD.lock().expect("guard");
        let dir = tempfile::tempdir().expect("temp dir");
        set_enabled(true);
        let mut session = crate::Session::new(
            dir.path().join("csm.sqlite3"),
            crate::config::StorageKeys::default(),
        );
        let input = "ID,Name,ARR,Renewal Date,Vertical,Sub-Vertical\n\
                     ,Acme,,,,\n\
                     ,Globex,,,,\n\
                     ,Initech,,,,\n";
        let imported = crate::transfer::import_accounts(&mut session, input);
        let report = collect_report();
        set_enabled(false);

        assert_eq!(imported.expect("import").imported, 3);
        let count = |name: &str| {
            report
                .steps
                .iter()
                .find(|s| s.name == name)
                .map_or(0, |s| s.count)
        };
        assert_eq!(count("store.open"), 1);
        assert_eq!(count("store.migrate"), 1);
        assert_eq!(count("import.row"), 3);
        assert!(count("store.put") >= 3);
    }
}
