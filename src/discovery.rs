/// Cascading address assignment.
///
/// The controller sends ASSIGN_ADDRESS(1) to the unassigned sentinel. Each
/// unaddressed subordinate adopts the carried address, acknowledges the node
/// that assigned it, passes ASSIGN_ADDRESS(n + 1) downstream and waits a
/// bounded time for its own acknowledgment. Silence downstream means the
/// node terminates the chain. Either way it reports ADDRESS_ASSIGNED to the
/// controller.
use crate::comm::{Clock, SerialPort};
use crate::context::Identity;
use crate::frame::{FrameError, Message, MessageKind, Sequence};
use crate::link::{ChainLinks, LinkDir};
use crate::protocol::{Address, AddressAssignment, CommandType, ResponseType, MAX_SUBORDINATES};

/// The controller's opening assignment.
pub fn bootstrap_command(sequence: u8) -> Result<Message, FrameError> {
    assignment_command(Address::CONTROLLER, Address::FIRST_SUBORDINATE, sequence)
}

fn assignment_command(from: Address, grant: Address, sequence: u8) -> Result<Message, FrameError> {
    Message::command(Address::UNASSIGNED, from, CommandType::AssignAddress, sequence).with_payload(
        &AddressAssignment {
            address: grant,
            is_last: false,
        },
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryOutcome {
    pub address: Address,
    pub is_chain_end: bool,
}

/// Handle an ASSIGN_ADDRESS that reached an unaddressed subordinate.
///
/// Returns `None` without side effects when the payload is malformed, the
/// granted address is out of range, or the node already holds an address.
pub fn accept_assignment<U, D, C>(
    identity: &Identity,
    links: &mut ChainLinks<U, D>,
    clock: &C,
    timeout_ms: u32,
    link_poll_ms: u32,
    seq: &mut Sequence,
    msg: &Message,
) -> Option<DiscoveryOutcome>
where
    U: SerialPort,
    D: SerialPort,
    C: Clock,
{
    let assignment = match msg.decode_payload::<AddressAssignment>() {
        Ok(a) => a,
        Err(e) => {
            log::warn!("Ignoring malformed address assignment: {}", e);
            return None;
        }
    };
    let address = assignment.address;
    if !address.is_subordinate() {
        log::warn!("Ignoring assignment of out-of-range address {:#04x}", address.raw());
        return None;
    }
    if !identity.claim(address) {
        log::debug!("Already addressed as {}, ignoring assignment", identity.address());
        return None;
    }
    log::info!("Assigned address {}", address);

    let ack = Message::response(msg.source, address, ResponseType::Ack, msg.sequence);
    if let Err(e) = links.send(LinkDir::Upstream, &ack) {
        log::warn!("Assignment ACK failed: {}", e);
    }

    let acked = match address.next() {
        Some(next) if links.has_downstream() => cascade(address, next, links, clock, timeout_ms, link_poll_ms, seq),
        _ => false,
    };
    let is_chain_end = !acked;
    identity.set_chain_end(is_chain_end);
    if is_chain_end {
        log::info!("{} is the end of the chain", address);
    }

    let report = Message::response(Address::CONTROLLER, address, ResponseType::AddressAssigned, seq.next())
        .with_payload(&AddressAssignment {
            address,
            is_last: is_chain_end,
        });
    match report {
        Ok(report) => {
            if let Err(e) = links.send(LinkDir::Upstream, &report) {
                log::warn!("ADDRESS_ASSIGNED send failed: {}", e);
            }
        }
        Err(e) => log::warn!("ADDRESS_ASSIGNED encode failed: {}", e),
    }

    Some(DiscoveryOutcome { address, is_chain_end })
}

/// Pass the next address downstream and wait for the neighbour's ACK.
/// Frames that are not the ACK and are bound upstream are relayed meanwhile.
fn cascade<U, D, C>(
    address: Address,
    next: Address,
    links: &mut ChainLinks<U, D>,
    clock: &C,
    timeout_ms: u32,
    link_poll_ms: u32,
    seq: &mut Sequence,
) -> bool
where
    U: SerialPort,
    D: SerialPort,
    C: Clock,
{
    let command = match assignment_command(address, next, seq.next()) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Assignment encode failed: {}", e);
            return false;
        }
    };
    if let Err(e) = links.send(LinkDir::Downstream, &command) {
        log::warn!("Downstream assignment failed: {}", e);
        return false;
    }

    let started = clock.now_ms();
    while clock.elapsed_ms(started) < timeout_ms {
        let Some(reply) = links.poll(LinkDir::Downstream, clock, link_poll_ms) else {
            continue;
        };
        if reply.destination == address && reply.kind() == MessageKind::Response(ResponseType::Ack) {
            log::debug!("{} acknowledged by {}", address, reply.source);
            return true;
        }
        if reply.destination < address {
            if let Err(e) = links.send(LinkDir::Upstream, &reply) {
                log::warn!("Relay upstream during discovery failed: {}", e);
            }
        }
    }
    log::warn!("No downstream acknowledgment within {} ms", timeout_ms);
    false
}

/// The controller's record of discovery confirmations.
pub struct DiscoveryLedger {
    confirmed: [bool; MAX_SUBORDINATES as usize],
    count: u8,
    terminal: Option<Address>,
}

impl DiscoveryLedger {
    pub const fn new() -> Self {
        Self {
            confirmed: [false; MAX_SUBORDINATES as usize],
            count: 0,
            terminal: None,
        }
    }

    /// Record an ADDRESS_ASSIGNED report. Returns true the first time an
    /// address is confirmed.
    pub fn record(&mut self, report: &AddressAssignment) -> bool {
        let Some(i) = report.address.index() else {
            return false;
        };
        if report.is_last {
            self.terminal = Some(report.address);
        }
        if self.confirmed[i] {
            return false;
        }
        self.confirmed[i] = true;
        self.count += 1;
        true
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn terminal(&self) -> Option<Address> {
        self.terminal
    }

    pub fn is_confirmed(&self, address: Address) -> bool {
        address.index().is_some_and(|i| self.confirmed[i])
    }

    /// Every position up to the terminal node has reported.
    pub fn is_complete(&self) -> bool {
        self.terminal.is_some_and(|t| self.count == t.raw())
    }

    pub fn confirmed(&self) -> impl Iterator<Item = Address> + '_ {
        self.confirmed
            .iter()
            .enumerate()
            .filter(|(_, &c)| c)
            .map(|(i, _)| Address(i as u8 + 1))
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Default for DiscoveryLedger {
    fn default() -> Self {
        Self::new()
    }
}
