//! Controller role: state machine on the main thread, NDJSON on the console.

use scanchain::config::Timing;
use scanchain::controller::Controller;
use scanchain::protocol::{Address, WiFiScanResult};
use scanchain::report::{serialize_network, serialize_report, Report, MAX_REPORT_LEN};
use scanchain::scanner::{NoGps, ResultSink};

use crate::uart::{EspClock, UartPort};

/// Writes every record and summary as one NDJSON line.
struct ConsoleSink;

fn emit(serialize: impl FnOnce(&mut [u8]) -> Option<usize>) {
    let mut buf: heapless::Vec<u8, MAX_REPORT_LEN> = heapless::Vec::new();
    buf.resize_default(MAX_REPORT_LEN).ok();
    let Some(len) = serialize(&mut buf[..]) else {
        log::warn!("Report did not fit in {} bytes", MAX_REPORT_LEN);
        return;
    };
    buf.truncate(len);
    if let Ok(line) = core::str::from_utf8(&buf) {
        log::info!("{}", line.trim_end());
    }
}

impl ResultSink for ConsoleSink {
    fn append(&mut self, source: Address, record: &WiFiScanResult) {
        emit(|buf| serialize_network(source, record, buf));
    }

    fn report(&mut self, report: &Report<'_>) {
        emit(|buf| serialize_report(report, buf));
    }
}

pub fn run(downstream: UartPort, clock: EspClock) -> anyhow::Result<()> {
    let mut controller = Controller::new(downstream, clock, Timing::new());
    let mut sink = ConsoleSink;
    // No GPS receiver is wired on this board
    let mut gps = NoGps;
    loop {
        controller.step(&mut gps, &mut sink);
    }
}
