use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// A snapshot of query profiling metrics.
///
/// Profiling is enabled via the `JOBSCOPE_PROFILE` environment variable and
/// tracks time spent compiling criteria, executing statements and hydrating
/// entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryProfileSnapshot {
    /// Total nanoseconds spent compiling predicates.
    pub compile_ns: u64,
    /// Number of predicate compilations.
    pub compile_count: u64,
    /// Total nanoseconds spent executing statements.
    pub execute_ns: u64,
    /// Number of executed statements.
    pub execute_count: u64,
    /// Total nanoseconds spent hydrating entities.
    pub hydrate_ns: u64,
    /// Number of hydrated pages or single entities.
    pub hydrate_count: u64,
}

#[derive(Default)]
struct QueryProfileCounters {
    compile_ns: AtomicU64,
    compile_count: AtomicU64,
    execute_ns: AtomicU64,
    execute_count: AtomicU64,
    hydrate_ns: AtomicU64,
    hydrate_count: AtomicU64,
}

static PROFILE_ENABLED: OnceLock<bool> = OnceLock::new();
static PROFILE_COUNTERS: OnceLock<QueryProfileCounters> = OnceLock::new();

fn profiling_enabled() -> bool {
    *PROFILE_ENABLED.get_or_init(|| std::env::var_os("JOBSCOPE_PROFILE").is_some())
}

fn counters() -> Option<&'static QueryProfileCounters> {
    profiling_enabled().then(|| PROFILE_COUNTERS.get_or_init(QueryProfileCounters::default))
}

pub(crate) fn profile_timer() -> Option<Instant> {
    profiling_enabled().then(Instant::now)
}

pub(crate) enum QueryProfileKind {
    /// Criteria compilation.
    Compile,
    /// Statement execution.
    Execute,
    /// Entity hydration.
    Hydrate,
}

pub(crate) fn record_profile_timer(kind: QueryProfileKind, start: Option<Instant>) {
    let Some(start) = start else {
        return;
    };
    let Some(counters) = counters() else {
        return;
    };
    let nanos = start.elapsed().as_nanos().min(u64::MAX as u128) as u64;
    let (ns, count) = match kind {
        QueryProfileKind::Compile => (&counters.compile_ns, &counters.compile_count),
        QueryProfileKind::Execute => (&counters.execute_ns, &counters.execute_count),
        QueryProfileKind::Hydrate => (&counters.hydrate_ns, &counters.hydrate_count),
    };
    ns.fetch_add(nanos, Ordering::Relaxed);
    count.fetch_add(1, Ordering::Relaxed);
}

/// Retrieves a snapshot of current profiling counters.
///
/// Returns `None` unless `JOBSCOPE_PROFILE` is set. With `reset`, counters are
/// zeroed after reading.
pub fn profile_snapshot(reset: bool) -> Option<QueryProfileSnapshot> {
    let counters = counters()?;
    let read = |value: &AtomicU64| {
        if reset {
            value.swap(0, Ordering::Relaxed)
        } else {
            value.load(Ordering::Relaxed)
        }
    };
    Some(QueryProfileSnapshot {
        compile_ns: read(&counters.compile_ns),
        compile_count: read(&counters.compile_count),
        execute_ns: read(&counters.execute_ns),
        execute_count: read(&counters.execute_count),
        hydrate_ns: read(&counters.hydrate_ns),
        hydrate_count: read(&counters.hydrate_count),
    })
}
