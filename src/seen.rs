/// Per-session duplicate suppression and the pending-report buffer.
///
/// `SeenSet` is a fixed-capacity recency cache: an array arena threaded by an
/// intrusive doubly linked list, most recent at the head. Promotion and
/// eviction are O(1); lookup is a linear scan of the occupied slots.
use heapless::Vec;

use crate::protocol::WiFiScanResult;

const NIL: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeenEntry {
    pub bssid: [u8; 6],
    pub last_seen_ms: u32,
    pub count: u16,
}

#[derive(Clone, Copy)]
struct Slot {
    entry: SeenEntry,
    prev: u16,
    next: u16,
}

impl Slot {
    const EMPTY: Self = Self {
        entry: SeenEntry {
            bssid: [0; 6],
            last_seen_ms: 0,
            count: 0,
        },
        prev: NIL,
        next: NIL,
    };
}

/// Outcome of observing a BSSID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    /// First time this session; report it
    New,
    /// Already reported; suppressed
    Repeat { count: u16 },
}

pub struct SeenSet<const N: usize> {
    slots: [Slot; N],
    len: usize,
    head: u16,
    tail: u16,
    evictions: u32,
}

impl<const N: usize> SeenSet<N> {
    const CAPACITY_FITS: () = assert!(N > 0 && N < NIL as usize);

    pub const fn new() -> Self {
        let () = Self::CAPACITY_FITS;
        Self {
            slots: [Slot::EMPTY; N],
            len: 0,
            head: NIL,
            tail: NIL,
            evictions: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn evictions(&self) -> u32 {
        self.evictions
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.head = NIL;
        self.tail = NIL;
    }

    fn find(&self, bssid: &[u8; 6]) -> Option<u16> {
        self.slots[..self.len]
            .iter()
            .position(|slot| slot.entry.bssid == *bssid)
            .map(|i| i as u16)
    }

    pub fn get(&self, bssid: &[u8; 6]) -> Option<&SeenEntry> {
        self.find(bssid).map(|i| &self.slots[i as usize].entry)
    }

    fn unlink(&mut self, i: u16) {
        let Slot { prev, next, .. } = self.slots[i as usize];
        if prev == NIL {
            self.head = next;
        } else {
            self.slots[prev as usize].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.slots[next as usize].prev = prev;
        }
    }

    fn push_front(&mut self, i: u16) {
        let old_head = self.head;
        let slot = &mut self.slots[i as usize];
        slot.prev = NIL;
        slot.next = old_head;
        if old_head == NIL {
            self.tail = i;
        } else {
            self.slots[old_head as usize].prev = i;
        }
        self.head = i;
    }

    /// Record a sighting. New BSSIDs go to the front, evicting the least
    /// recently seen entry when full; known ones are promoted.
    pub fn observe(&mut self, bssid: [u8; 6], now_ms: u32) -> Sighting {
        if let Some(i) = self.find(&bssid) {
            let entry = &mut self.slots[i as usize].entry;
            entry.last_seen_ms = now_ms;
            entry.count = entry.count.saturating_add(1);
            let count = entry.count;
            if self.head != i {
                self.unlink(i);
                self.push_front(i);
            }
            return Sighting::Repeat { count };
        }

        let i = if self.len < N {
            self.len += 1;
            (self.len - 1) as u16
        } else {
            let victim = self.tail;
            self.unlink(victim);
            self.evictions += 1;
            victim
        };
        self.slots[i as usize].entry = SeenEntry {
            bssid,
            last_seen_ms: now_ms,
            count: 1,
        };
        self.push_front(i);
        Sighting::New
    }

    /// Entries from most to least recently seen.
    pub fn iter(&self) -> impl Iterator<Item = &SeenEntry> + '_ {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            if cursor == NIL {
                return None;
            }
            let slot = &self.slots[cursor as usize];
            cursor = slot.next;
            Some(&slot.entry)
        })
    }
}

impl<const N: usize> Default for SeenSet<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Newly observed networks waiting for the controller's next poll.
pub struct ResultBuffer<const N: usize> {
    items: Vec<WiFiScanResult, N>,
}

impl<const N: usize> ResultBuffer<N> {
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Append a record; hands it back if the buffer is full.
    pub fn push(&mut self, result: WiFiScanResult) -> Result<(), WiFiScanResult> {
        self.items.push(result)
    }

    pub fn get(&self, index: usize) -> Option<&WiFiScanResult> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.is_full()
    }

    /// Remove the oldest `n` records, keeping anything that arrived after them.
    pub fn drain_front(&mut self, n: usize) {
        let n = n.min(self.items.len());
        let keep = self.items.len() - n;
        self.items.as_mut_slice().rotate_left(n);
        self.items.truncate(keep);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &WiFiScanResult> {
        self.items.iter()
    }
}

impl<const N: usize> Default for ResultBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Band, SsidString};

    fn mac(n: u8) -> [u8; 6] {
        [0x02, 0, 0, 0, 0, n]
    }

    fn order<const N: usize>(set: &SeenSet<N>) -> std::vec::Vec<u8> {
        set.iter().map(|e| e.bssid[5]).collect()
    }

    // ── SeenSet ─────────────────────────────────────────────────────

    #[test]
    fn repeat_is_suppressed_and_promoted() {
        let mut set: SeenSet<4> = SeenSet::new();
        assert_eq!(set.observe(mac(1), 10), Sighting::New);
        assert_eq!(set.observe(mac(2), 20), Sighting::New);
        assert_eq!(set.observe(mac(1), 30), Sighting::Repeat { count: 2 });
        assert_eq!(set.len(), 2);
        assert_eq!(order(&set), [1, 2]);
        assert_eq!(set.get(&mac(1)).unwrap().last_seen_ms, 30);
    }

    #[test]
    fn evicts_least_recently_seen() {
        let mut set: SeenSet<3> = SeenSet::new();
        set.observe(mac(1), 0);
        set.observe(mac(2), 1);
        set.observe(mac(3), 2);
        // Refresh 1 so 2 becomes the oldest
        set.observe(mac(1), 3);
        assert_eq!(set.observe(mac(4), 4), Sighting::New);
        assert_eq!(set.len(), 3);
        assert_eq!(order(&set), [4, 1, 3]);
        assert!(set.get(&mac(2)).is_none());
        assert_eq!(set.evictions(), 1);
        // Evicted entry is new again
        assert_eq!(set.observe(mac(2), 5), Sighting::New);
        assert_eq!(order(&set), [2, 4, 1]);
    }

    #[test]
    fn promote_tail_and_middle() {
        let mut set: SeenSet<5> = SeenSet::new();
        for n in 1..=4 {
            set.observe(mac(n), n as u32);
        }
        assert_eq!(order(&set), [4, 3, 2, 1]);
        set.observe(mac(1), 10);
        assert_eq!(order(&set), [1, 4, 3, 2]);
        set.observe(mac(3), 11);
        assert_eq!(order(&set), [3, 1, 4, 2]);
        set.observe(mac(3), 12);
        assert_eq!(order(&set), [3, 1, 4, 2]);
    }

    #[test]
    fn single_slot() {
        let mut set: SeenSet<1> = SeenSet::new();
        set.observe(mac(1), 0);
        assert_eq!(set.observe(mac(2), 1), Sighting::New);
        assert_eq!(order(&set), [2]);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut set: SeenSet<4> = SeenSet::new();
        set.observe(mac(1), 0);
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.iter().count(), 0);
        assert_eq!(set.observe(mac(1), 1), Sighting::New);
    }

    #[test]
    fn fills_to_capacity_before_evicting() {
        let mut set: SeenSet<500> = SeenSet::new();
        for n in 0..500u32 {
            let b = n.to_le_bytes();
            assert_eq!(set.observe([b[0], b[1], 0, 0, 0, 0], n), Sighting::New);
        }
        assert_eq!(set.len(), 500);
        assert_eq!(set.evictions(), 0);
        set.observe([0xFF; 6], 501);
        assert_eq!(set.len(), 500);
        assert_eq!(set.evictions(), 1);
        assert!(set.get(&[0, 0, 0, 0, 0, 0]).is_none());
    }

    // ── ResultBuffer ────────────────────────────────────────────────

    fn record(n: u8) -> WiFiScanResult {
        WiFiScanResult {
            bssid: mac(n),
            ssid: SsidString::new(),
            rssi: -50,
            channel: 36,
            band: Band::Band5GHz,
            auth_mode: 0,
            timestamp: 0,
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            gps_quality: 0,
        }
    }

    #[test]
    fn drain_front_keeps_later_arrivals() {
        let mut buf: ResultBuffer<4> = ResultBuffer::new();
        for n in 1..=3 {
            buf.push(record(n)).unwrap();
        }
        buf.drain_front(2);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.get(0).unwrap().bssid, mac(3));
        buf.drain_front(10);
        assert!(buf.is_empty());
    }

    #[test]
    fn push_refuses_when_full() {
        let mut buf: ResultBuffer<1> = ResultBuffer::new();
        buf.push(record(1)).unwrap();
        assert!(buf.is_full());
        assert_eq!(buf.push(record(2)).unwrap_err().bssid, mac(2));
    }
}
