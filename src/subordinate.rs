/// Subordinate node: link servicing, command handling and the scan cycle.
///
/// Two tasks share one `NodeContext`. The link task owns both serial links
/// and calls `Subordinate::poll` in a loop; the scan task calls
/// `run_scan_cycle` every tick.
use crate::comm::{Clock, SerialPort};
use crate::config::Timing;
use crate::context::NodeContext;
use crate::discovery;
use crate::frame::{Message, MessageKind, Sequence};
use crate::link::{ChainLinks, LinkDir, LinkError};
use crate::protocol::{
    Address, CommandType, ErrorCode, GpsPosition, ResponseType, ScanMode, ScanParams, StatusInfo,
    SubordinateState, WirePayload,
};
use crate::router::{Route, Router};
use crate::scanner::{ObservationList, ScanError, ScanRequest, WifiScanner};
use crate::seen::Sighting;

/// Reply to a single command
#[derive(Debug, Clone, Copy, PartialEq)]
enum Reply {
    Ack,
    Nack(ErrorCode),
    Status(StatusInfo),
}

pub struct Subordinate<'a, U, D, C> {
    ctx: &'a NodeContext,
    links: ChainLinks<U, D>,
    clock: C,
    timing: Timing,
    seq: Sequence,
}

impl<'a, U, D, C> Subordinate<'a, U, D, C>
where
    U: SerialPort,
    D: SerialPort,
    C: Clock,
{
    pub fn new(ctx: &'a NodeContext, links: ChainLinks<U, D>, clock: C, timing: Timing) -> Self {
        Self {
            ctx,
            links,
            clock,
            timing,
            seq: Sequence::new(),
        }
    }

    pub fn links(&self) -> &ChainLinks<U, D> {
        &self.links
    }

    fn router(&self) -> Router {
        let identity = &self.ctx.identity;
        Router::new(
            identity.address(),
            true,
            self.links.has_downstream() && !identity.is_chain_end(),
        )
    }

    /// Service both links once: upstream first, then downstream.
    pub fn poll(&mut self) {
        if let Some(msg) = self.links.poll(LinkDir::Upstream, &self.clock, self.timing.link_poll_ms) {
            self.dispatch(msg, LinkDir::Upstream);
        }
        if let Some(msg) = self.links.poll(LinkDir::Downstream, &self.clock, self.timing.link_poll_ms) {
            self.dispatch(msg, LinkDir::Downstream);
        }
    }

    fn dispatch(&mut self, msg: Message, from: LinkDir) {
        let router = self.router();
        let assigned = self.ctx.identity.is_assigned();

        match router.route(msg.destination, from) {
            Route::Discovery => {
                if let Some(outcome) = discovery::accept_assignment(
                    &self.ctx.identity,
                    &mut self.links,
                    &self.clock,
                    self.timing.assignment_timeout_ms,
                    self.timing.link_poll_ms,
                    &mut self.seq,
                    &msg,
                ) {
                    log::info!(
                        "Discovery complete: address {}, chain end: {}",
                        outcome.address,
                        outcome.is_chain_end
                    );
                }
            }
            Route::Local if !assigned => {
                log::trace!("Unaddressed, ignoring frame for {}", msg.destination);
            }
            Route::Local => {
                if msg.destination == Address::BROADCAST {
                    if from == LinkDir::Downstream {
                        log::trace!("Dropping upstream-bound broadcast");
                        return;
                    }
                    if router.has_downstream {
                        self.forward(LinkDir::Downstream, &msg);
                    }
                }
                self.handle(&msg);
            }
            Route::Forward(_) if !assigned => {
                log::trace!("Unaddressed, not forwarding frame for {}", msg.destination);
            }
            Route::Forward(dir) => self.forward(dir, &msg),
            Route::Drop(reason) => {
                log::trace!("Dropped frame for {}: {:?}", msg.destination, reason);
            }
        }
    }

    fn forward(&mut self, dir: LinkDir, msg: &Message) {
        if let Err(e) = self.links.send(dir, msg) {
            log::warn!("Forward {} failed: {}", dir.as_str(), e);
        }
    }

    fn handle(&mut self, msg: &Message) {
        let MessageKind::Command(command) = msg.kind() else {
            log::debug!("Ignoring non-command type {:#04x} from {}", msg.type_code, msg.source);
            return;
        };
        if msg.payload.len() != command.payload_len() {
            log::warn!(
                "Ignoring {:?}: payload {} bytes, expected {}",
                command,
                msg.payload.len(),
                command.payload_len()
            );
            return;
        }
        let broadcast = msg.destination == Address::BROADCAST;

        let reply = match command {
            CommandType::Ping => Some(Reply::Ack),
            CommandType::AssignAddress => None,
            CommandType::SetScanParams => Some(match ScanParams::decode(&msg.payload) {
                Ok(params) => {
                    self.ctx.with_session(|s| s.set_params(params));
                    log::info!(
                        "Scan params: {} ch{} interval {} ms",
                        params.band.as_str(),
                        params.channel,
                        params.interval_ms
                    );
                    Reply::Ack
                }
                Err(e) => {
                    log::warn!("Rejecting scan params: {}", e);
                    Reply::Nack(ErrorCode::InvalidParams)
                }
            }),
            CommandType::StartScan => {
                self.ctx.with_session(|s| s.start());
                log::info!("Scanning started");
                Some(Reply::Ack)
            }
            CommandType::StopScan => {
                self.ctx.with_session(|s| s.stop());
                log::info!("Scanning stopped");
                Some(Reply::Ack)
            }
            CommandType::GetStatus => {
                let uptime = self.clock.now_ms() / 1000;
                let status = self.ctx.with_session(|s| {
                    s.status.uptime = uptime;
                    s.status.result_count = s.results.len() as u16;
                    s.status
                });
                Some(Reply::Status(status))
            }
            CommandType::SetChannel => {
                let channel = msg.payload[0];
                self.ctx.with_session(|s| s.set_channel(channel));
                Some(Reply::Ack)
            }
            CommandType::SetScanMode => Some(match ScanMode::from_u8(msg.payload[0]) {
                Some(mode) => {
                    self.ctx.with_session(|s| s.params.mode = mode);
                    Reply::Ack
                }
                None => Reply::Nack(ErrorCode::InvalidParams),
            }),
            CommandType::SetScanInterval => {
                let interval = u16::from_le_bytes([msg.payload[0], msg.payload[1]]);
                Some(if interval == 0 {
                    Reply::Nack(ErrorCode::InvalidParams)
                } else {
                    self.ctx.with_session(|s| s.params.interval_ms = interval);
                    Reply::Ack
                })
            }
            CommandType::GetScanResults => {
                if !broadcast {
                    self.send_results(msg.sequence);
                }
                None
            }
            CommandType::ClearResults => {
                self.ctx.with_session(|s| s.clear_delivered());
                None
            }
            CommandType::GpsUpdate => {
                match GpsPosition::decode(&msg.payload) {
                    Ok(fix) => self.ctx.with_session(|s| s.gps = Some(fix)),
                    Err(e) => log::warn!("Bad GPS update: {}", e),
                }
                None
            }
            CommandType::Reset => {
                self.ctx.with_session(|s| s.reset());
                log::info!("Reset");
                Some(Reply::Ack)
            }
        };

        if let (Some(reply), false) = (reply, broadcast) {
            if let Err(e) = self.reply(reply, msg.sequence) {
                log::warn!("Reply to {:?} failed: {}", command, e);
            }
        }
    }

    fn upstream_response(&self, kind: ResponseType, sequence: u8) -> Message {
        Message::response(Address::CONTROLLER, self.ctx.identity.address(), kind, sequence)
    }

    fn reply(&mut self, reply: Reply, sequence: u8) -> Result<(), LinkError> {
        let msg = match reply {
            Reply::Ack => self.upstream_response(ResponseType::Ack, sequence),
            Reply::Nack(code) => self
                .upstream_response(ResponseType::Nack, sequence)
                .with_bytes(&[code as u8])?,
            Reply::Status(status) => self
                .upstream_response(ResponseType::Status, sequence)
                .with_payload(&status)?,
        };
        self.links.send(LinkDir::Upstream, &msg)
    }

    /// Stream every buffered record upstream, then a closing ACK.
    ///
    /// Records are copied out one at a time so the scan task is never locked
    /// out for the whole transfer. Anything it appends meanwhile stays for
    /// the next poll.
    fn send_results(&mut self, sequence: u8) {
        let count = self.ctx.with_session(|s| s.results.len());
        let mut sent = 0;
        for i in 0..count {
            let Some(record) = self.ctx.with_session(|s| s.results.get(i).cloned()) else {
                break;
            };
            let seq = self.seq.next();
            let result = self
                .upstream_response(ResponseType::ScanResult, seq)
                .with_payload(&record)
                .map_err(LinkError::from)
                .and_then(|msg| self.links.send(LinkDir::Upstream, &msg));
            if let Err(e) = result {
                log::warn!("SCAN_RESULT send failed: {}", e);
            }
            sent += 1;
            self.clock.delay_ms(self.timing.result_spacing_ms);
        }
        self.ctx.with_session(|s| s.delivered = sent);
        log::debug!("Delivered {} results", sent);
        if let Err(e) = self.reply(Reply::Ack, sequence) {
            log::warn!("Closing ACK failed: {}", e);
        }
    }
}

/// What one scan-task tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanCycle {
    /// Not scanning, or not yet addressed
    Idle,
    /// Interval not yet elapsed
    NotDue,
    Scanned { observed: usize, new: usize },
    Failed(ScanError),
}

/// One scan-task tick: scan if due, then dedup and buffer what was seen.
///
/// The radio scan runs without the session lock held.
pub fn run_scan_cycle<S, C>(ctx: &NodeContext, scanner: &mut S, clock: &C) -> ScanCycle
where
    S: WifiScanner,
    C: Clock,
{
    if !ctx.identity.is_assigned() {
        return ScanCycle::Idle;
    }
    let now = clock.now_ms();
    let request = ctx.with_session(|s| {
        if !s.scanning {
            return Err(ScanCycle::Idle);
        }
        let due = s
            .last_scan_ms
            .map_or(true, |last| now.wrapping_sub(last) >= s.params.interval_ms as u32);
        if !due {
            return Err(ScanCycle::NotDue);
        }
        s.last_scan_ms = Some(now);
        s.status.state = SubordinateState::Scanning;
        Ok(ScanRequest::from_params(&s.params))
    });
    let request = match request {
        Ok(r) => r,
        Err(cycle) => return cycle,
    };

    let mut observations = ObservationList::new();
    let scanned = scanner.scan(&request, &mut observations);
    let captured = clock.now_ms();

    ctx.with_session(|s| {
        if let Err(e) = scanned {
            log::warn!("Scan failed: {}", e);
            s.status.last_error = ErrorCode::ScanFailed;
            return ScanCycle::Failed(e);
        }
        s.status.scan_count = s.status.scan_count.wrapping_add(1);
        s.status.state = SubordinateState::Processing;

        let mut new = 0;
        for obs in &observations {
            if s.results.is_full() {
                s.status.last_error = ErrorCode::BufferFull;
                log::warn!("Result buffer full, {} observations dropped", observations.len());
                break;
            }
            if s.seen.observe(obs.bssid, captured) == Sighting::New {
                let record = obs.to_result(captured, s.gps.as_ref());
                if s.results.push(record).is_ok() {
                    new += 1;
                }
            }
        }
        s.status.result_count = s.results.len() as u16;
        s.status.state = if s.scanning {
            SubordinateState::Scanning
        } else {
            SubordinateState::Idle
        };
        if new > 0 {
            log::debug!("Scan: {} seen, {} new, {} buffered", observations.len(), new, s.results.len());
        }
        ScanCycle::Scanned {
            observed: observations.len(),
            new,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{DEFAULT_SCAN_PARAMS, RESULT_CAPACITY};
    use crate::protocol::{Band, SsidString, WiFiScanResult};
    use crate::scanner::Observation;
    use crate::testing::{ManualClock, MockPort, Peer};
    use std::vec::Vec;

    struct Rig<'a> {
        node: Subordinate<'a, MockPort, MockPort, ManualClock>,
        clock: ManualClock,
        up: Peer,
        down: Peer,
    }

    fn rig(ctx: &NodeContext) -> Rig<'_> {
        let clock = ManualClock::new();
        let (u, up) = MockPort::new(&clock);
        let (d, down) = MockPort::new(&clock);
        let node = Subordinate::new(ctx, ChainLinks::new(u, Some(d)), clock.clone(), Timing::new());
        Rig { node, clock, up, down }
    }

    fn addressed(address: u8) -> NodeContext {
        let ctx = NodeContext::new();
        assert!(ctx.identity.claim(Address(address)));
        ctx
    }

    fn cmd(dst: u8, command: CommandType, seq: u8) -> Message {
        Message::command(Address(dst), Address::CONTROLLER, command, seq)
    }

    impl Rig<'_> {
        fn from_upstream(&mut self, msg: &Message) -> Vec<Message> {
            self.up.inject(msg);
            self.node.poll();
            self.up.take_sent()
        }
    }

    struct FakeScanner {
        batches: Vec<Result<Vec<[u8; 6]>, ScanError>>,
        requests: Vec<ScanRequest>,
    }

    impl FakeScanner {
        fn new(batches: Vec<Result<Vec<[u8; 6]>, ScanError>>) -> Self {
            Self { batches, requests: Vec::new() }
        }
    }

    impl WifiScanner for FakeScanner {
        fn scan(&mut self, request: &ScanRequest, out: &mut ObservationList) -> Result<(), ScanError> {
            self.requests.push(*request);
            let batch = if self.batches.is_empty() { Ok(Vec::new()) } else { self.batches.remove(0) };
            for bssid in batch? {
                let _ = out.push(Observation {
                    bssid,
                    ssid: SsidString::try_from("net").unwrap(),
                    rssi: -60,
                    channel: request.channel,
                    auth_mode: 3,
                });
            }
            Ok(())
        }
    }

    fn record(n: u8) -> WiFiScanResult {
        WiFiScanResult {
            bssid: [0x0A, 0, 0, 0, 0, n],
            ssid: SsidString::new(),
            rssi: -40,
            channel: 36,
            band: Band::Band5GHz,
            auth_mode: 0,
            timestamp: n as u32,
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            gps_quality: 0,
        }
    }

    // ── Commands ────────────────────────────────────────────────────

    #[test]
    fn ping_acks_with_echoed_sequence() {
        let ctx = addressed(2);
        let mut r = rig(&ctx);
        let sent = r.from_upstream(&cmd(2, CommandType::Ping, 77));
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind(), MessageKind::Response(ResponseType::Ack));
        assert_eq!(sent[0].destination, Address::CONTROLLER);
        assert_eq!(sent[0].source, Address(2));
        assert_eq!(sent[0].sequence, 77);
    }

    #[test]
    fn short_scan_params_ignored() {
        let ctx = addressed(1);
        let mut r = rig(&ctx);
        let msg = cmd(1, CommandType::SetScanParams, 3)
            .with_bytes(&[0x01, 6, 0x02, 100, 0, 0xF4])
            .unwrap();
        assert!(r.from_upstream(&msg).is_empty());
        assert_eq!(ctx.with_session(|s| s.params), DEFAULT_SCAN_PARAMS);
    }

    #[test]
    fn scan_params_applied_and_mirrored() {
        let ctx = addressed(1);
        let mut r = rig(&ctx);
        let params = ScanParams {
            band: Band::Band2_4GHz,
            channel: 11,
            mode: ScanMode::Passive,
            scan_time_ms: 200,
            interval_ms: 500,
            hidden: false,
            show_hidden: false,
        };
        let sent = r.from_upstream(&cmd(1, CommandType::SetScanParams, 3).with_payload(&params).unwrap());
        assert_eq!(sent[0].kind(), MessageKind::Response(ResponseType::Ack));
        ctx.with_session(|s| {
            assert_eq!(s.params, params);
            assert_eq!(s.status.channel, 11);
            assert_eq!(s.status.band, Band::Band2_4GHz);
        });
    }

    #[test]
    fn invalid_band_is_nacked() {
        let ctx = addressed(1);
        let mut r = rig(&ctx);
        let msg = cmd(1, CommandType::SetScanParams, 3)
            .with_bytes(&[0x09, 6, 0x01, 100, 0, 0xF4, 0x01, 0, 0])
            .unwrap();
        let sent = r.from_upstream(&msg);
        assert_eq!(sent[0].kind(), MessageKind::Response(ResponseType::Nack));
        assert_eq!(sent[0].payload.as_slice(), &[ErrorCode::InvalidParams as u8]);
        assert_eq!(ctx.with_session(|s| s.params), DEFAULT_SCAN_PARAMS);
    }

    #[test]
    fn single_byte_setters() {
        let ctx = addressed(1);
        let mut r = rig(&ctx);
        r.from_upstream(&cmd(1, CommandType::SetChannel, 0).with_bytes(&[149]).unwrap());
        r.from_upstream(&cmd(1, CommandType::SetScanMode, 1).with_bytes(&[2]).unwrap());
        r.from_upstream(&cmd(1, CommandType::SetScanInterval, 2).with_bytes(&[0xD0, 0x07]).unwrap());
        let zero = r.from_upstream(&cmd(1, CommandType::SetScanInterval, 3).with_bytes(&[0, 0]).unwrap());
        assert_eq!(zero[0].kind(), MessageKind::Response(ResponseType::Nack));
        let bad_mode = r.from_upstream(&cmd(1, CommandType::SetScanMode, 4).with_bytes(&[9]).unwrap());
        assert_eq!(bad_mode[0].kind(), MessageKind::Response(ResponseType::Nack));
        ctx.with_session(|s| {
            assert_eq!(s.params.channel, 149);
            assert_eq!(s.params.mode, ScanMode::Passive);
            assert_eq!(s.params.interval_ms, 2000);
        });
    }

    #[test]
    fn status_reports_uptime_and_buffer() {
        let ctx = addressed(4);
        let mut r = rig(&ctx);
        ctx.with_session(|s| s.results.push(record(1)).unwrap());
        r.clock.set(61_500);
        let sent = r.from_upstream(&cmd(4, CommandType::GetStatus, 9));
        assert_eq!(sent[0].kind(), MessageKind::Response(ResponseType::Status));
        let status: StatusInfo = sent[0].decode_payload().unwrap();
        assert_eq!(status.uptime, 61);
        assert_eq!(status.result_count, 1);
        assert_eq!(status.channel, 36);
    }

    #[test]
    fn start_stop_toggle_scanning() {
        let ctx = addressed(1);
        let mut r = rig(&ctx);
        r.from_upstream(&cmd(1, CommandType::StartScan, 0));
        assert!(ctx.with_session(|s| s.scanning));
        r.from_upstream(&cmd(1, CommandType::StopScan, 1));
        assert!(!ctx.with_session(|s| s.scanning));
    }

    #[test]
    fn results_delivered_then_cleared() {
        let ctx = addressed(3);
        let mut r = rig(&ctx);
        ctx.with_session(|s| {
            s.results.push(record(1)).unwrap();
            s.results.push(record(2)).unwrap();
        });
        let sent = r.from_upstream(&cmd(3, CommandType::GetScanResults, 50));
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].kind(), MessageKind::Response(ResponseType::ScanResult));
        assert_eq!(sent[0].decode_payload::<WiFiScanResult>().unwrap(), record(1));
        assert_eq!(sent[1].decode_payload::<WiFiScanResult>().unwrap(), record(2));
        assert_eq!(sent[2].kind(), MessageKind::Response(ResponseType::Ack));
        assert_eq!(sent[2].sequence, 50);

        // A record captured between collection and clear survives
        ctx.with_session(|s| s.results.push(record(3)).unwrap());
        assert!(r.from_upstream(&cmd(3, CommandType::ClearResults, 51)).is_empty());
        ctx.with_session(|s| {
            assert_eq!(s.results.len(), 1);
            assert_eq!(s.results.get(0).unwrap().bssid, record(3).bssid);
        });
    }

    #[test]
    fn gps_update_cached_silently() {
        let ctx = addressed(1);
        let mut r = rig(&ctx);
        let fix = GpsPosition {
            latitude: 45.0,
            longitude: -93.0,
            altitude: 250.0,
            satellites: 8,
            fix_quality: 1,
            timestamp: 12,
        };
        let msg = Message::command(Address::BROADCAST, Address::CONTROLLER, CommandType::GpsUpdate, 5)
            .with_payload(&fix)
            .unwrap();
        assert!(r.from_upstream(&msg).is_empty());
        assert_eq!(ctx.with_session(|s| s.gps), Some(fix));
        // Relayed to the rest of the chain
        assert_eq!(r.down.take_sent(), std::vec![msg]);
    }

    #[test]
    fn broadcast_applied_without_reply() {
        let ctx = addressed(2);
        let mut r = rig(&ctx);
        let start = Message::command(Address::BROADCAST, Address::CONTROLLER, CommandType::StartScan, 0);
        assert!(r.from_upstream(&start).is_empty());
        assert!(ctx.with_session(|s| s.scanning));
    }

    #[test]
    fn terminal_node_does_not_relay_broadcast() {
        let ctx = addressed(2);
        ctx.identity.set_chain_end(true);
        let mut r = rig(&ctx);
        let msg = Message::command(Address::BROADCAST, Address::CONTROLLER, CommandType::StopScan, 0);
        r.from_upstream(&msg);
        assert!(r.down.take_sent().is_empty());
    }

    #[test]
    fn broadcast_from_downstream_goes_nowhere() {
        let ctx = addressed(2);
        let mut r = rig(&ctx);
        r.down.inject(&Message::command(Address::BROADCAST, Address::CONTROLLER, CommandType::StartScan, 0));
        r.node.poll();
        assert!(r.up.take_sent().is_empty());
        assert!(!ctx.with_session(|s| s.scanning));
    }

    #[test]
    fn reset_keeps_address() {
        let ctx = addressed(5);
        let mut r = rig(&ctx);
        ctx.with_session(|s| s.start());
        let sent = r.from_upstream(&cmd(5, CommandType::Reset, 0));
        assert_eq!(sent[0].kind(), MessageKind::Response(ResponseType::Ack));
        assert_eq!(ctx.identity.address(), Address(5));
        assert!(!ctx.with_session(|s| s.scanning));
    }

    // ── Routing ─────────────────────────────────────────────────────

    #[test]
    fn forwards_by_address() {
        let ctx = addressed(2);
        let mut r = rig(&ctx);
        let onward = cmd(4, CommandType::Ping, 0);
        r.up.inject(&onward);
        r.node.poll();
        assert_eq!(r.down.take_sent(), std::vec![onward]);

        let reply = Message::response(Address::CONTROLLER, Address(4), ResponseType::Ack, 0);
        r.down.inject(&reply);
        r.node.poll();
        assert_eq!(r.up.take_sent(), std::vec![reply]);
    }

    #[test]
    fn unaddressed_node_ignores_traffic() {
        let ctx = NodeContext::new();
        let mut r = rig(&ctx);
        assert!(r.from_upstream(&cmd(1, CommandType::Ping, 0)).is_empty());
        assert!(r.from_upstream(&Message::command(Address::BROADCAST, Address::CONTROLLER, CommandType::StartScan, 0)).is_empty());
        assert!(r.down.take_sent().is_empty());
        assert!(!ctx.with_session(|s| s.scanning));
    }

    #[test]
    fn assignment_through_poll() {
        let ctx = NodeContext::new();
        let mut r = rig(&ctx);
        r.down.inject(&Message::response(Address(1), Address(2), ResponseType::Ack, 0));
        let sent = r.from_upstream(&discovery::bootstrap_command(0).unwrap());
        assert_eq!(ctx.identity.address(), Address(1));
        assert_eq!(sent.len(), 2);
        // Replayed assignment is now dropped by the router
        assert!(r.from_upstream(&discovery::bootstrap_command(1).unwrap()).is_empty());
        assert_eq!(r.down.take_sent().len(), 1);
    }

    // ── Scan cycle ──────────────────────────────────────────────────

    #[test]
    fn idle_until_started() {
        let ctx = addressed(1);
        let clock = ManualClock::new();
        let mut scanner = FakeScanner::new(Vec::new());
        assert_eq!(run_scan_cycle(&ctx, &mut scanner, &clock), ScanCycle::Idle);
        assert!(scanner.requests.is_empty());
    }

    #[test]
    fn dedups_across_cycles_and_honours_interval() {
        let ctx = addressed(1);
        let clock = ManualClock::new();
        let a = [1, 1, 1, 1, 1, 1];
        let b = [2, 2, 2, 2, 2, 2];
        let mut scanner = FakeScanner::new(std::vec![Ok(std::vec![a, b]), Ok(std::vec![a, b, a])]);
        ctx.with_session(|s| s.start());

        assert_eq!(
            run_scan_cycle(&ctx, &mut scanner, &clock),
            ScanCycle::Scanned { observed: 2, new: 2 }
        );
        clock.advance(500);
        assert_eq!(run_scan_cycle(&ctx, &mut scanner, &clock), ScanCycle::NotDue);
        clock.advance(500);
        assert_eq!(
            run_scan_cycle(&ctx, &mut scanner, &clock),
            ScanCycle::Scanned { observed: 3, new: 0 }
        );
        ctx.with_session(|s| {
            assert_eq!(s.results.len(), 2);
            assert_eq!(s.status.scan_count, 2);
            assert_eq!(s.seen.get(&a).unwrap().count, 3);
        });
    }

    #[test]
    fn results_stamped_with_cached_gps() {
        let ctx = addressed(1);
        let clock = ManualClock::new();
        clock.set(4242);
        let fix = GpsPosition {
            latitude: 1.0,
            longitude: 2.0,
            altitude: 3.0,
            satellites: 5,
            fix_quality: 2,
            timestamp: 0,
        };
        ctx.with_session(|s| {
            s.gps = Some(fix);
            s.start();
        });
        let mut scanner = FakeScanner::new(std::vec![Ok(std::vec![[9; 6]])]);
        run_scan_cycle(&ctx, &mut scanner, &clock);
        let r = ctx.with_session(|s| s.results.get(0).cloned()).unwrap();
        assert_eq!(r.timestamp, 4242);
        assert_eq!(r.gps_quality, 2);
        assert_eq!(r.altitude, 3.0);
        assert_eq!(scanner.requests[0].channel, 36);
    }

    #[test]
    fn scan_failure_recorded_and_scanning_continues() {
        let ctx = addressed(1);
        let clock = ManualClock::new();
        let mut scanner = FakeScanner::new(std::vec![Err(ScanError::Radio(-1))]);
        ctx.with_session(|s| s.start());
        assert_eq!(
            run_scan_cycle(&ctx, &mut scanner, &clock),
            ScanCycle::Failed(ScanError::Radio(-1))
        );
        ctx.with_session(|s| {
            assert!(s.scanning);
            assert_eq!(s.status.last_error, ErrorCode::ScanFailed);
            assert_eq!(s.status.scan_count, 0);
        });
    }

    #[test]
    fn full_buffer_flags_error() {
        let ctx = addressed(1);
        let clock = ManualClock::new();
        ctx.with_session(|s| {
            for n in 0..RESULT_CAPACITY {
                s.results.push(record(n as u8)).unwrap();
            }
            s.start();
        });
        let mut scanner = FakeScanner::new(std::vec![Ok(std::vec![[7; 6]])]);
        assert_eq!(
            run_scan_cycle(&ctx, &mut scanner, &clock),
            ScanCycle::Scanned { observed: 1, new: 0 }
        );
        ctx.with_session(|s| {
            assert_eq!(s.status.last_error, ErrorCode::BufferFull);
            // Not marked seen, so it is reported once there is room
            assert!(s.seen.get(&[7; 6]).is_none());
        });
    }
}
