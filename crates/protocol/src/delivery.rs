//! Delivery semantics for outbound frames
//!
//! Transports map these to their own channel kinds:
//! - `Reliable` → reliable-ordered
//! - `Unreliable` → best-effort, may drop or reorder
//! - `UnreliableSequenced` → sequenced-drop-old: stale datagrams are
//!   discarded, nothing is retransmitted

/// How a frame should be delivered by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeliveryMode {
    /// Guaranteed, in-order delivery. The default for all RPCs.
    #[default]
    Reliable,

    /// Fire-and-forget. May be dropped, duplicated, or reordered.
    Unreliable,

    /// No retransmission, but late datagrams are dropped so the receiver
    /// only ever observes the newest frame on the channel.
    UnreliableSequenced,
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMode::Reliable => write!(f, "Reliable"),
            DeliveryMode::Unreliable => write!(f, "Unreliable"),
            DeliveryMode::UnreliableSequenced => write!(f, "UnreliableSequenced"),
        }
    }
}
