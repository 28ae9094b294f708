/// Controller state machine: discovery, configuration and round-robin
/// result collection.
///
/// `Init → AutoDiscovering → Configuring → Scanning → Idle`, strictly
/// linear. The controller is the chain's root: it has only a downstream link,
/// originates every command and terminates every response.
use crate::comm::{Clock, SerialPort};
use crate::config::Timing;
use crate::defaults::{CONTROLLER_SCAN_PARAMS, MAX_MISSED_POLLS, OFFLINE_REPROBE_EVERY};
use crate::discovery::{self, DiscoveryLedger};
use crate::frame::{Message, MessageKind, Sequence};
use crate::link::{Link, LinkDir, LinkError, LinkStats};
use crate::protocol::{
    Address, AddressAssignment, Band, CommandType, ErrorCode, ResponseType, ScanParams, StatusInfo,
    WiFiScanResult, MAX_SUBORDINATES,
};
use crate::report::Report;
use crate::router::{Route, Router};
use crate::scanner::{channel_5ghz, GpsSource, ResultSink};

/// Frames handled per `step` before the state machine gets a turn
const MAX_FRAMES_PER_STEP: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Init,
    AutoDiscovering,
    Configuring,
    Scanning,
    Idle,
}

// ── Registry ────────────────────────────────────────────────────────────

/// What the controller knows about one subordinate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SubordinateInfo {
    /// Heard from at least once this session; stays in the poll rotation
    pub known: bool,
    pub online: bool,
    pub last_seen_ms: u32,
    pub total_results: u32,
    pub status: Option<StatusInfo>,
    /// Consecutive polls that timed out
    pub missed_polls: u8,
    /// Rotation visits passed over while offline
    skipped: u8,
}

impl SubordinateInfo {
    const UNKNOWN: Self = Self {
        known: false,
        online: false,
        last_seen_ms: 0,
        total_results: 0,
        status: None,
        missed_polls: 0,
        skipped: 0,
    };
}

pub struct Registry {
    nodes: [SubordinateInfo; MAX_SUBORDINATES as usize],
}

impl Registry {
    pub const fn new() -> Self {
        Self {
            nodes: [SubordinateInfo::UNKNOWN; MAX_SUBORDINATES as usize],
        }
    }

    pub fn get(&self, address: Address) -> Option<&SubordinateInfo> {
        self.nodes.get(address.index()?)
    }

    fn get_mut(&mut self, address: Address) -> Option<&mut SubordinateInfo> {
        self.nodes.get_mut(address.index()?)
    }

    /// Any frame from a subordinate marks it online and refreshes last-seen.
    fn touch(&mut self, address: Address, now_ms: u32) {
        if let Some(node) = self.get_mut(address) {
            node.known = true;
            node.online = true;
            node.last_seen_ms = now_ms;
        }
    }

    pub fn online(&self) -> impl Iterator<Item = Address> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.online)
            .map(|(i, _)| Address(i as u8 + 1))
    }

    pub fn online_count(&self) -> u8 {
        self.online().count() as u8
    }

    pub fn known_count(&self) -> u8 {
        self.nodes.iter().filter(|n| n.known).count() as u8
    }

    /// Next subordinate to poll after `after`, wrapping around.
    ///
    /// Offline nodes stay in the rotation but are only polled on every
    /// `reprobe_every`-th visit, so a node that comes back is collected again.
    fn next_to_poll(&mut self, after: Address, reprobe_every: u8) -> Option<Address> {
        let reprobe_every = reprobe_every.max(1);
        let len = self.nodes.len();
        let start = after.index().map_or(0, |i| i + 1);
        for k in 0..len * reprobe_every as usize {
            let i = (start + k) % len;
            let node = &mut self.nodes[i];
            if !node.known {
                continue;
            }
            if !node.online {
                node.skipped += 1;
                if node.skipped < reprobe_every {
                    continue;
                }
                node.skipped = 0;
            }
            return Some(Address(i as u8 + 1));
        }
        None
    }

    fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Controller ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingPoll {
    address: Address,
    sequence: u8,
    sent_at: u32,
}

pub struct Controller<D, C> {
    link: Link<D>,
    clock: C,
    timing: Timing,
    state: ControllerState,
    state_since: u32,
    registry: Registry,
    ledger: DiscoveryLedger,
    base_params: ScanParams,
    seq: Sequence,
    pending: Option<PendingPoll>,
    cursor: Address,
    last_gps_ms: u32,
    last_stats_ms: u32,
    total_results: u32,
}

impl<D: SerialPort, C: Clock> Controller<D, C> {
    pub fn new(downstream: D, clock: C, timing: Timing) -> Self {
        let now = clock.now_ms();
        Self {
            link: Link::new(downstream, LinkDir::Downstream),
            clock,
            timing,
            state: ControllerState::Init,
            state_since: now,
            registry: Registry::new(),
            ledger: DiscoveryLedger::new(),
            base_params: CONTROLLER_SCAN_PARAMS,
            seq: Sequence::new(),
            pending: None,
            cursor: Address::CONTROLLER,
            last_gps_ms: now,
            last_stats_ms: now,
            total_results: 0,
        }
    }

    /// Parameters every subordinate is configured with, before the
    /// per-position channel is applied.
    pub fn with_scan_params(mut self, params: ScanParams) -> Self {
        self.base_params = params;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn ledger(&self) -> &DiscoveryLedger {
        &self.ledger
    }

    pub fn subordinate_count(&self) -> u8 {
        self.ledger.count()
    }

    pub fn total_results(&self) -> u32 {
        self.total_results
    }

    pub fn link_stats(&self) -> LinkStats {
        self.link.stats()
    }

    pub fn discovery_summary(&self) -> Report<'static> {
        Report::Discovery {
            count: self.ledger.count(),
            last: self.ledger.terminal().map(Address::raw),
            complete: self.ledger.is_complete(),
        }
    }

    pub fn stats_report(&self) -> Report<'static> {
        Report::Stats {
            networks: self.total_results,
            active: self.registry.online_count(),
            uptime: self.clock.now_ms() / 1000,
        }
    }

    fn enter(&mut self, next: ControllerState) {
        log::info!("Controller: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.state_since = self.clock.now_ms();
    }

    fn send(&mut self, msg: &Message) -> Result<(), LinkError> {
        self.link.send(msg)
    }

    fn command(&mut self, to: Address, command: CommandType) -> Message {
        Message::command(to, Address::CONTROLLER, command, self.seq.next())
    }

    /// Drain received frames, then advance the state machine.
    pub fn step<G, S>(&mut self, gps: &mut G, sink: &mut S)
    where
        G: GpsSource,
        S: ResultSink,
    {
        for _ in 0..MAX_FRAMES_PER_STEP {
            let Some(msg) = self.link.poll(&self.clock, self.timing.link_poll_ms) else {
                break;
            };
            self.handle(msg, sink);
        }

        let in_state = self.clock.elapsed_ms(self.state_since);
        match self.state {
            ControllerState::Init => self.start_discovery(),
            ControllerState::AutoDiscovering if in_state >= self.timing.discovery_dwell_ms => {
                let summary = self.discovery_summary();
                log::info!(
                    "Discovery finished: {} subordinates{}",
                    self.ledger.count(),
                    if self.ledger.is_complete() { "" } else { " (incomplete)" }
                );
                sink.report(&summary);
                self.enter(ControllerState::Configuring);
                self.configure_all();
            }
            ControllerState::Configuring if in_state >= self.timing.configure_settle_ms => {
                self.start_all();
                self.enter(ControllerState::Scanning);
                self.last_gps_ms = self.clock.now_ms();
                self.last_stats_ms = self.clock.now_ms();
            }
            ControllerState::Scanning => self.scan_step(gps, sink),
            _ => {}
        }
    }

    fn start_discovery(&mut self) {
        self.registry.clear();
        self.ledger.clear();
        match discovery::bootstrap_command(self.seq.next()) {
            Ok(msg) => {
                if let Err(e) = self.send(&msg) {
                    log::warn!("Bootstrap assignment failed: {}", e);
                }
            }
            Err(e) => log::warn!("Bootstrap assignment encode failed: {}", e),
        }
        log::info!("Sent address assignment");
        self.enter(ControllerState::AutoDiscovering);
    }

    fn configure_all(&mut self) {
        let targets: heapless::Vec<Address, { MAX_SUBORDINATES as usize }> = self.registry.online().collect();
        for address in targets {
            let params = ScanParams {
                band: Band::Band5GHz,
                channel: channel_5ghz(address),
                ..self.base_params
            };
            let sent = self
                .command(address, CommandType::SetScanParams)
                .with_payload(&params)
                .map_err(LinkError::from)
                .and_then(|msg| self.send(&msg));
            match sent {
                Ok(()) => log::info!("Configured {} on channel {}", address, params.channel),
                Err(e) => log::warn!("Configuring {} failed: {}", address, e),
            }
            self.clock.delay_ms(self.timing.configure_spacing_ms);
        }
    }

    fn start_all(&mut self) {
        let targets: heapless::Vec<Address, { MAX_SUBORDINATES as usize }> = self.registry.online().collect();
        for address in targets {
            let msg = self.command(address, CommandType::StartScan);
            if let Err(e) = self.send(&msg) {
                log::warn!("START_SCAN to {} failed: {}", address, e);
            }
            self.clock.delay_ms(self.timing.start_spacing_ms);
        }
    }

    fn scan_step<G: GpsSource, S: ResultSink>(&mut self, gps: &mut G, sink: &mut S) {
        let now = self.clock.now_ms();

        if let Some(poll) = self.pending {
            if now.wrapping_sub(poll.sent_at) >= self.timing.poll_timeout_ms {
                log::warn!("Poll of {} timed out", poll.address);
                self.pending = None;
                if let Some(node) = self.registry.get_mut(poll.address) {
                    node.missed_polls = node.missed_polls.saturating_add(1);
                    if node.missed_polls >= MAX_MISSED_POLLS {
                        if node.online {
                            log::warn!("{} marked offline after {} missed polls", poll.address, node.missed_polls);
                        }
                        node.online = false;
                    }
                }
            }
        }

        if self.pending.is_none() {
            match self.registry.next_to_poll(self.cursor, OFFLINE_REPROBE_EVERY) {
                Some(address) => self.poll(address, now),
                None => {
                    log::warn!("No subordinates registered");
                    self.enter(ControllerState::Idle);
                    return;
                }
            }
        }

        if now.wrapping_sub(self.last_gps_ms) >= self.timing.gps_broadcast_ms {
            self.last_gps_ms = now;
            if let Some(fix) = gps.current_fix().filter(|f| f.has_fix()) {
                let sent = self
                    .command(Address::BROADCAST, CommandType::GpsUpdate)
                    .with_payload(&fix)
                    .map_err(LinkError::from)
                    .and_then(|msg| self.send(&msg));
                if let Err(e) = sent {
                    log::warn!("GPS broadcast failed: {}", e);
                }
            }
        }

        if now.wrapping_sub(self.last_stats_ms) >= self.timing.stats_interval_ms {
            self.last_stats_ms = now;
            log::info!(
                "Stats: {} networks from {} active subordinates",
                self.total_results,
                self.registry.online_count()
            );
            sink.report(&self.stats_report());
        }
    }

    fn poll(&mut self, address: Address, now: u32) {
        let msg = self.command(address, CommandType::GetScanResults);
        if let Err(e) = self.send(&msg) {
            log::warn!("Poll of {} failed: {}", address, e);
        }
        self.cursor = address;
        self.pending = Some(PendingPoll {
            address,
            sequence: msg.sequence,
            sent_at: now,
        });
    }

    /// Broadcast STOP_SCAN and go idle.
    pub fn stop(&mut self) {
        let msg = self.command(Address::BROADCAST, CommandType::StopScan);
        if let Err(e) = self.send(&msg) {
            log::warn!("STOP_SCAN broadcast failed: {}", e);
        }
        self.pending = None;
        self.enter(ControllerState::Idle);
    }

    fn handle<S: ResultSink>(&mut self, msg: Message, sink: &mut S) {
        if Router::for_controller().route(msg.destination, LinkDir::Downstream) != Route::Local {
            log::trace!("Ignoring frame for {}", msg.destination);
            return;
        }
        if !msg.source.is_subordinate() {
            log::trace!("Ignoring frame from {}", msg.source);
            return;
        }
        let now = self.clock.now_ms();
        self.registry.touch(msg.source, now);

        match msg.kind() {
            MessageKind::Response(ResponseType::Ack) => self.on_ack(&msg),
            MessageKind::Response(ResponseType::AddressAssigned) => {
                match msg.decode_payload::<AddressAssignment>() {
                    Ok(report) => {
                        if self.ledger.record(&report) {
                            log::info!(
                                "Subordinate {} registered{}",
                                report.address,
                                if report.is_last { " (last node)" } else { "" }
                            );
                        }
                        self.registry.touch(report.address, now);
                    }
                    Err(e) => log::warn!("Bad ADDRESS_ASSIGNED from {}: {}", msg.source, e),
                }
            }
            MessageKind::Response(ResponseType::ScanResult) => match msg.decode_payload::<WiFiScanResult>() {
                Ok(record) => {
                    self.total_results = self.total_results.wrapping_add(1);
                    if let Some(node) = self.registry.get_mut(msg.source) {
                        node.total_results = node.total_results.wrapping_add(1);
                    }
                    log::info!(
                        "[{} ch{}] {:02X?} {} {} dBm",
                        msg.source,
                        record.channel,
                        record.bssid,
                        record.ssid.as_str(),
                        record.rssi
                    );
                    sink.append(msg.source, &record);
                }
                Err(e) => log::warn!("Bad SCAN_RESULT from {}: {}", msg.source, e),
            },
            MessageKind::Response(ResponseType::Status) => match msg.decode_payload::<StatusInfo>() {
                Ok(status) => {
                    if let Some(node) = self.registry.get_mut(msg.source) {
                        node.status = Some(status);
                    }
                    sink.report(&Report::status(msg.source, &status));
                }
                Err(e) => log::warn!("Bad STATUS from {}: {}", msg.source, e),
            },
            MessageKind::Response(ResponseType::Nack) => {
                let code = msg.payload.first().map_or(ErrorCode::Unknown, |&b| ErrorCode::from_u8(b));
                log::warn!("NACK from {} (seq {}): {:?}", msg.source, msg.sequence, code);
            }
            MessageKind::Response(ResponseType::Error) => {
                log::warn!("ERROR from {} (seq {})", msg.source, msg.sequence);
            }
            other => log::debug!("Unhandled {:?} from {}", other, msg.source),
        }
    }

    /// An ACK closes the outstanding poll only if source and sequence match.
    fn on_ack(&mut self, msg: &Message) {
        let Some(poll) = self.pending else {
            return;
        };
        if poll.address != msg.source || poll.sequence != msg.sequence {
            log::trace!("Unmatched ACK from {} seq {}", msg.source, msg.sequence);
            return;
        }
        self.pending = None;
        if let Some(node) = self.registry.get_mut(poll.address) {
            node.missed_polls = 0;
        }
        let clear = self.command(poll.address, CommandType::ClearResults);
        if let Err(e) = self.send(&clear) {
            log::warn!("CLEAR_RESULTS to {} failed: {}", poll.address, e);
        }
    }
}
