//! Subordinate role: link thread and scan thread over one shared context.

use std::thread;

use esp_idf_svc::sys::{esp_get_free_heap_size, heap_caps_get_total_size, MALLOC_CAP_DEFAULT};

use scanchain::comm::Clock;
use scanchain::config::Timing;
use scanchain::context::NodeContext;
use scanchain::link::ChainLinks;
use scanchain::subordinate::{run_scan_cycle, ScanCycle, Subordinate};

use crate::uart::{EspClock, UartPort};
use crate::wifi::EspScanner;

static CONTEXT: NodeContext = NodeContext::new();

/// Free heap as a percentage of the default-capability heap.
fn free_heap_percent() -> u8 {
    let (free, total) = unsafe { (esp_get_free_heap_size(), heap_caps_get_total_size(MALLOC_CAP_DEFAULT)) };
    if total == 0 {
        return 0;
    }
    ((free as u64 * 100) / total as u64).min(100) as u8
}

pub fn run(upstream: UartPort, downstream: UartPort, mut scanner: EspScanner, clock: EspClock) -> anyhow::Result<()> {
    let timing = Timing::new();

    thread::Builder::new()
        .name("link".into())
        .stack_size(8192)
        .spawn(move || {
            log::info!("Link thread started");
            let mut node = Subordinate::new(&CONTEXT, ChainLinks::new(upstream, Some(downstream)), clock, timing);
            loop {
                node.poll();
            }
        })?;

    thread::Builder::new()
        .name("scan".into())
        .stack_size(8192)
        .spawn(move || {
            log::info!("Scan thread started");
            loop {
                if let ScanCycle::Scanned { observed, new } = run_scan_cycle(&CONTEXT, &mut scanner, &clock) {
                    log::debug!("Scanned: {} observed, {} new", observed, new);
                }
                let heap = free_heap_percent();
                CONTEXT.with_session(|s| s.status.free_heap = heap);
                clock.delay_ms(timing.scan_tick_ms);
            }
        })?;

    log::info!("Subordinate threads spawned, waiting for address assignment");
    Ok(())
}
