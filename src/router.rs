/// Hop-by-hop routing by address comparison.
///
/// Subordinate addresses equal chain positions, so a node needs nothing but
/// its own address to pick a direction: smaller destinations live upstream,
/// larger ones downstream.
use crate::link::LinkDir;
use crate::protocol::Address;

/// What to do with a reassembled frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Addressed to this node, or broadcast
    Local,
    /// Assignment for an unaddressed node; hand to discovery
    Discovery,
    Forward(LinkDir),
    Drop(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Unassigned-sentinel traffic reaching a node that already has an address
    AlreadyAssigned,
    /// Unassigned-sentinel traffic from the wrong side
    WrongSide,
    /// Next hop is back the way the frame came
    Echo,
    /// No link in the required direction
    NoRoute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Router {
    pub local: Address,
    pub has_upstream: bool,
    pub has_downstream: bool,
}

impl Router {
    pub const fn new(local: Address, has_upstream: bool, has_downstream: bool) -> Self {
        Self {
            local,
            has_upstream,
            has_downstream,
        }
    }

    /// The controller is the root: no upstream, and it never forwards.
    pub const fn for_controller() -> Self {
        Self::new(Address::CONTROLLER, false, true)
    }

    pub fn route(&self, destination: Address, arrived_on: LinkDir) -> Route {
        if destination == Address::BROADCAST {
            return Route::Local;
        }
        if destination == Address::UNASSIGNED {
            return match (self.local == Address::UNASSIGNED, arrived_on) {
                (true, LinkDir::Upstream) => Route::Discovery,
                (true, LinkDir::Downstream) => Route::Drop(DropReason::WrongSide),
                (false, _) => Route::Drop(DropReason::AlreadyAssigned),
            };
        }
        if destination == self.local {
            return Route::Local;
        }
        if self.local == Address::CONTROLLER {
            // Root terminates everything
            return Route::Drop(DropReason::NoRoute);
        }

        let dir = if destination < self.local {
            LinkDir::Upstream
        } else {
            LinkDir::Downstream
        };
        if dir == arrived_on {
            return Route::Drop(DropReason::Echo);
        }
        let available = match dir {
            LinkDir::Upstream => self.has_upstream,
            LinkDir::Downstream => self.has_downstream,
        };
        if available {
            log::trace!("route {} via {}", destination, dir.as_str());
            Route::Forward(dir)
        } else {
            Route::Drop(DropReason::NoRoute)
        }
    }
}
