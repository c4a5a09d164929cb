use std::sync::OnceLock;

static HARDWARE_CONCURRENCY: OnceLock<u32> = OnceLock::new();

/// Number of logical CPUs, computed once per process. Never returns 0.
///
/// Concurrent first calls may all compute the value, they publish the same
/// result.
pub fn hardware_concurrency() -> u32 {
    *HARDWARE_CONCURRENCY.get_or_init(|| {
        let cpus = num_cpus::get();
        u32::try_from(cpus).unwrap_or(u32::MAX).max(1)
    })
}

/// Resolves a requested fan-out, where 0 means "use every CPU".
pub fn resolve_concurrency(requested: u32) -> u32 {
    if requested == 0 {
        hardware_concurrency()
    } else {
        requested
    }
}
