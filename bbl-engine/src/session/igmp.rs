//
// Per-session IGMP group membership: each session can join
// and leave multicast groups independently of its own PPP/DHCP lifecycle,
// and the control socket's `igmp-join`/`igmp-leave`/`igmp-info` commands
// operate on this per-session list, mirroring the zapping counters a real
// BNG Blaster session tracks.
//

use std::net::Ipv4Addr;
use std::time::Instant;

use bbl_packet::igmp::IgmpMessage;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GroupState {
    Idle,
    Joining,
    Joined,
    Leaving,
}

#[derive(Debug)]
pub struct GroupMembership {
    pub group: Ipv4Addr,
    pub state: GroupState,
    /// Set when a zapping test is timing the join-to-first-packet latency.
    pub join_started_at: Option<Instant>,
    pub join_delay: Option<std::time::Duration>,
    pub leave_delay: Option<std::time::Duration>,
    pub packets_received: u64,
}

impl GroupMembership {
    pub fn new(group: Ipv4Addr) -> Self {
        GroupMembership {
            group,
            state: GroupState::Idle,
            join_started_at: None,
            join_delay: None,
            leave_delay: None,
            packets_received: 0,
        }
    }

    pub fn join(&mut self, now: Instant) -> IgmpMessage {
        self.state = GroupState::Joining;
        self.join_started_at = Some(now);
        IgmpMessage::V2Report { group: self.group }
    }

    pub fn leave(&mut self, now: Instant) -> IgmpMessage {
        self.state = GroupState::Leaving;
        self.join_started_at = Some(now);
        IgmpMessage::V2Leave { group: self.group }
    }

    /// Multicast traffic packet arrives for this group: while `Joining`,
    /// completes the join and records the join-to-first-packet zap delay;
    /// while `Leaving`, keeps bumping `leave_delay` to the gap between the
    /// leave report and the most recent datagram, per "the wallclock gap
    /// between the first member report and the first/last received
    /// multicast datagram for the group".
    pub fn data_received(&mut self, now: Instant) {
        self.packets_received += 1;
        match self.state {
            GroupState::Joining => {
                if let Some(started) = self.join_started_at.take() {
                    self.join_delay = Some(now.duration_since(started));
                }
                self.state = GroupState::Joined;
            }
            GroupState::Leaving => {
                if let Some(started) = self.join_started_at {
                    self.leave_delay = Some(now.duration_since(started));
                }
            }
            GroupState::Idle | GroupState::Joined => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn join_then_data_records_zap_delay() {
        let now = Instant::now();
        let mut membership = GroupMembership::new(Ipv4Addr::new(239, 1, 1, 1));
        membership.join(now);
        assert_eq!(membership.state, GroupState::Joining);
        membership.data_received(now + Duration::from_millis(50));
        assert_eq!(membership.state, GroupState::Joined);
        assert_eq!(membership.join_delay, Some(Duration::from_millis(50)));
    }

    #[test]
    fn leave_then_data_records_leave_delay_of_last_datagram() {
        let now = Instant::now();
        let mut membership = GroupMembership::new(Ipv4Addr::new(239, 1, 1, 1));
        membership.leave(now);
        assert_eq!(membership.state, GroupState::Leaving);
        membership.data_received(now + Duration::from_millis(10));
        membership.data_received(now + Duration::from_millis(30));
        assert_eq!(membership.state, GroupState::Leaving);
        assert_eq!(membership.leave_delay, Some(Duration::from_millis(30)));
    }
}
