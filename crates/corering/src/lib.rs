//! corering - Bounded FIFO Rings with Split Producer/Consumer Locks
//!
//! Two ring flavours share one locking model: producers serialize on a
//! producer lock, consumers on a consumer lock, and the two sides only meet
//! through acquire/release ordering on the ring's indices or slot validity.
//!
//! - [`CoreRing`] is generic over a [`SlotOps`] implementation that decides
//!   what a slot holds and how "this slot is live" is tested. Capacity may be
//!   any value (0 disables the ring) and the ring can be resized in place.
//! - [`DescRing`] queues packet descriptors: an owned payload plus its wire
//!   length, cached so that [`DescRing::peek_length`] never takes a lock.
//!
//! Every operation that takes a lock has an `*_in` form accepting an
//! [`ExecContext`], which says how to bracket the critical section when the
//! other side may run from an interrupt handler.
//!
//! # Key Features
//!
//! - Cache-padded producer and consumer state (no false sharing)
//! - Batch consumption with a single index publish
//! - Fallible allocation (`AllocationFailure` instead of an abort)
//! - Full rings hand the element back ([`NoSpace`]) rather than dropping it
//!
//! # Example
//!
//! ```
//! use corering::{Config, DescRing, ExecContext, Packet, PtrRing};
//!
//! let ring = PtrRing::<u64>::new(Config::new(4, false)).unwrap();
//! ring.produce(Box::new(42)).unwrap();
//! assert_eq!(*ring.consume().unwrap(), 42);
//!
//! let rx = DescRing::new(Config::new(256, true)).unwrap();
//! rx.queue_in(ExecContext::SoftIrq, Packet::new(vec![0; 60]).with_vlan(7)).unwrap();
//! assert_eq!(rx.peek_length(), 64);
//! let pkt = rx.dequeue().unwrap();
//! assert_eq!(pkt.vlan_tag(), Some(7));
//! ```

mod backoff;
mod config;
pub mod context;
mod desc;
mod error;
mod ida;
mod invariants;
mod lock;
mod metrics;
mod packet;
mod ring;
mod slot;

pub use backoff::Backoff;
pub use config::{Config, HIGH_THROUGHPUT_CONFIG, LOW_LATENCY_CONFIG};
pub use context::{ContextState, ExecContext};
pub use desc::DescRing;
pub use error::{NoSpace, RingError};
pub use ida::IndexPool;
pub use lock::{SpinGuard, SpinLock};
pub use metrics::{Metrics, MetricsSnapshot};
pub use packet::{Packet, Payload, VLAN_HLEN};
pub use ring::{CoreRing, FlagRing, HandleRing, PtrRing};
pub use slot::{FlagSlot, FlagSlots, HandleSlots, PtrSlot, PtrSlots, SlotOps, SlotStore};
