//! Payloads carried by [`DescRing`](crate::DescRing).

/// Length of an 802.1Q tag inserted between the MAC addresses and the
/// ethertype.
pub const VLAN_HLEN: usize = 4;

/// An owned buffer a descriptor ring can carry.
///
/// `wire_len` is sampled once when the payload is queued and cached in the
/// descriptor, so it must not depend on state that changes while queued.
pub trait Payload: Send {
    /// Number of bytes the payload occupies on the wire.
    fn wire_len(&self) -> usize;
}

impl Payload for Vec<u8> {
    #[inline]
    fn wire_len(&self) -> usize {
        self.len()
    }
}

impl Payload for Box<[u8]> {
    #[inline]
    fn wire_len(&self) -> usize {
        self.len()
    }
}

impl<P: Payload + ?Sized> Payload for Box<P> {
    #[inline]
    fn wire_len(&self) -> usize {
        (**self).wire_len()
    }
}

/// A frame plus the VLAN tag the hardware stripped from it, if any.
///
/// The tag is re-inserted on transmit, so it counts towards
/// [`wire_len`](Payload::wire_len).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    data: Vec<u8>,
    vlan_tag: Option<u16>,
}

impl Packet {
    /// Creates an untagged packet.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            vlan_tag: None,
        }
    }

    /// Attaches a VLAN tag.
    #[must_use]
    pub fn with_vlan(mut self, tci: u16) -> Self {
        self.vlan_tag = Some(tci);
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn vlan_tag(&self) -> Option<u16> {
        self.vlan_tag
    }

    /// Returns true if a VLAN tag is present.
    #[inline]
    pub fn has_vlan(&self) -> bool {
        self.vlan_tag.is_some()
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for Packet {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl Payload for Packet {
    #[inline]
    fn wire_len(&self) -> usize {
        if self.has_vlan() {
            self.data.len() + VLAN_HLEN
        } else {
            self.data.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_len() {
        let pkt = Packet::new(vec![0; 60]);
        assert!(!pkt.has_vlan());
        assert_eq!(pkt.wire_len(), 60);
    }

    #[test]
    fn test_tagged_len_adds_header() {
        let pkt = Packet::from(vec![0; 60]).with_vlan(100);
        assert_eq!(pkt.vlan_tag(), Some(100));
        assert_eq!(pkt.wire_len(), 60 + VLAN_HLEN);
        assert_eq!(pkt.into_data().len(), 60);
    }

    #[test]
    fn test_byte_buffers() {
        assert_eq!(vec![1u8, 2, 3].wire_len(), 3);
        let boxed: Box<[u8]> = vec![0u8; 9].into_boxed_slice();
        assert_eq!(boxed.wire_len(), 9);
        assert_eq!(Box::new(Packet::new(vec![0; 5]).with_vlan(1)).wire_len(), 9);
    }
}
