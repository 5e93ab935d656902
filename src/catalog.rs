//! Channels and the deduplicated result catalog of a run.

use std::collections::HashSet;
use std::net::Ipv4Addr;

/// A single UDP channel. Identity is `(group, port)`; the name is metadata
/// and may be missing for streams that carry no service name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: Option<String>,
    pub group: Ipv4Addr,
    pub port: u16,
}

impl Channel {
    pub fn new(name: Option<String>, group: Ipv4Addr, port: u16) -> Self {
        Self { name, group, port }
    }

    pub fn key(&self) -> (Ipv4Addr, u16) {
        (self.group, self.port)
    }

    pub fn url(&self) -> String {
        format!("udp://@{}:{}", self.group, self.port)
    }

    /// Display name; unnamed channels fall back to their address.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("Channel: {}:{}", self.group, self.port),
        }
    }
}

/// Insertion-ordered channel set keyed by `(group, port)`. Append-only
/// during a run; inserting an already-present key is a no-op.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<Channel>,
    seen: HashSet<(Ipv4Addr, u16)>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a channel unless its `(group, port)` is already present.
    /// Returns whether the channel was actually added; the first write wins.
    pub fn insert(&mut self, channel: Channel) -> bool {
        if !self.seen.insert(channel.key()) {
            return false;
        }
        self.entries.push(channel);
        true
    }

    /// Mark a pair as already known (e.g. listed in an input playlist) so a
    /// later discovery of it is skipped instead of re-catalogued.
    pub fn mark_known(&mut self, group: Ipv4Addr, port: u16) {
        self.seen.insert((group, port));
    }

    pub fn contains(&self, group: Ipv4Addr, port: u16) -> bool {
        self.seen.contains(&(group, port))
    }

    /// Number of catalogued channels. Pairs only marked known don't count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Channels in discovery (insertion) order.
    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(name: Option<&str>, last_octet: u8, port: u16) -> Channel {
        Channel::new(
            name.map(str::to_string),
            Ipv4Addr::new(239, 0, 0, last_octet),
            port,
        )
    }

    #[test]
    fn insert_is_idempotent_first_write_wins() {
        let mut catalog = Catalog::new();
        assert!(catalog.insert(channel(Some("One"), 1, 1234)));
        assert!(!catalog.insert(channel(Some("Other name"), 1, 1234)));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.iter().next().unwrap().name.as_deref(), Some("One"));
    }

    #[test]
    fn same_group_different_port_is_a_new_entry() {
        let mut catalog = Catalog::new();
        assert!(catalog.insert(channel(None, 1, 1234)));
        assert!(catalog.insert(channel(None, 1, 5500)));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn preserves_insertion_order() {
        let mut catalog = Catalog::new();
        catalog.insert(channel(Some("B"), 2, 1234));
        catalog.insert(channel(Some("A"), 1, 1234));
        catalog.insert(channel(Some("C"), 3, 1234));
        let names: Vec<_> = catalog.iter().map(|c| c.display_name()).collect();
        assert_eq!(names, ["B", "A", "C"]);
    }

    #[test]
    fn known_pairs_are_skipped_but_not_listed() {
        let mut catalog = Catalog::new();
        catalog.mark_known(Ipv4Addr::new(239, 0, 0, 9), 1234);
        assert!(catalog.contains(Ipv4Addr::new(239, 0, 0, 9), 1234));
        assert!(!catalog.insert(channel(Some("Dup"), 9, 1234)));
        assert!(catalog.is_empty());
    }

    #[test]
    fn unnamed_channels_fall_back_to_address() {
        let ch = channel(None, 7, 1234);
        assert_eq!(ch.display_name(), "Channel: 239.0.0.7:1234");
        assert_eq!(ch.url(), "udp://@239.0.0.7:1234");
    }
}
