//! Threaded worlds of SimBoxes over the memory transport.

use meso_simbox::{InitialState, SimBox, SimBoxConfig};
use meso_transport_memory::{MemoryConfig, MemoryTransport, MemoryWorld};
use std::thread;
use std::time::Duration;

/// Memory transport settings for tests: a peer that never answers fails the
/// test within seconds instead of hanging it.
pub fn test_transport_config() -> MemoryConfig {
    MemoryConfig::default()
        .with_stall_warning(Duration::from_secs(1))
        .with_wait_deadline(Duration::from_secs(10))
}

/// Run `f` once per rank, each on its own thread, and collect the results
/// ordered by rank.
///
/// # Panics
///
/// Re-raises the panic of any rank.
pub fn run_ranks<R, F>(size: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(MemoryTransport) -> R + Sync,
{
    let endpoints = MemoryWorld::connect(size, test_transport_config()).into_endpoints();
    thread::scope(|scope| {
        let f = &f;
        let handles: Vec<_> = endpoints
            .into_iter()
            .map(|transport| scope.spawn(move || f(transport)))
            .collect();
        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

/// Build, assemble and load one SimBox per rank of `config.grid`, then run
/// `f` on each.
///
/// # Panics
///
/// Panics if any rank fails to assemble or load.
pub fn run_simboxes<R, F>(config: &SimBoxConfig, state: &InitialState, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(&mut SimBox<MemoryTransport>) -> R + Sync,
{
    run_ranks(config.grid.process_count(), |transport| {
        let mut simbox = SimBox::new(transport, config.clone()).expect("valid configuration");
        simbox.assemble().expect("assembly succeeds");
        simbox.load(state).expect("initial state loads");
        f(&mut simbox)
    })
}
