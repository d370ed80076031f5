//! A simulated NIC receive path.
//!
//! Each device gets an id from the global `IndexPool`. An "interrupt" thread
//! takes buffer handles from a free ring, wraps them into packets and queues
//! them on the device's descriptor ring; the "stack" thread dequeues packets
//! and returns the buffer handles to the free ring.

use corering::{
    Config, DescRing, ExecContext, HandleRing, IndexPool, NoSpace, Packet, HIGH_THROUGHPUT_CONFIG,
};
use std::num::NonZeroU64;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

const PACKETS: usize = 200_000;
const BUFFERS: u64 = 512;

fn main() {
    println!("corering Packet Ring Example");
    println!("============================\n");

    let dev_id = IndexPool::global().acquire().expect("device id");
    let rx = Arc::new(DescRing::<Packet>::new(HIGH_THROUGHPUT_CONFIG).expect("rx ring"));
    let free = Arc::new(HandleRing::new(Config::new(BUFFERS as usize, false)).expect("free ring"));
    for handle in 1..=BUFFERS {
        free.produce(NonZeroU64::new(handle).expect("non-zero")).expect("free ring has room");
    }

    println!("Device eth{dev_id}:");
    println!("  RX ring capacity: {} descriptors", rx.capacity());
    println!("  Buffer pool: {} handles\n", BUFFERS);

    let start = Instant::now();

    let irq = {
        let rx = Arc::clone(&rx);
        let free = Arc::clone(&free);
        thread::spawn(move || {
            let mut dropped = 0usize;
            for i in 0..PACKETS {
                let Ok(handle) = free.consume_in(ExecContext::SoftIrq) else {
                    dropped += 1;
                    thread::yield_now();
                    continue;
                };
                let mut data = handle.get().to_le_bytes().to_vec();
                data.resize(60 + i % 64, 0);
                let mut pkt = Packet::new(data);
                if i % 4 == 0 {
                    pkt = pkt.with_vlan(100);
                }
                if let Err(NoSpace(pkt)) = rx.queue_in(ExecContext::Irq, pkt) {
                    // ring full: drop the frame, keep the buffer
                    dropped += 1;
                    let _ = free.produce_in(ExecContext::SoftIrq, buffer_of(&pkt));
                }
            }
            dropped
        })
    };

    let mut received = 0usize;
    let mut bytes = 0usize;
    loop {
        match rx.dequeue_in(ExecContext::SoftIrq) {
            Ok(pkt) => {
                received += 1;
                bytes += pkt.data().len();
                let _ = free.produce(buffer_of(&pkt));
            }
            Err(_) if irq.is_finished() && rx.is_empty() => break,
            Err(_) => thread::yield_now(),
        }
    }

    let dropped = irq.join().expect("irq thread");
    let elapsed = start.elapsed();

    let m = rx.metrics();
    println!("Results:");
    println!("  Received: {received} packets, {bytes} bytes");
    println!("  Dropped:  {dropped}");
    println!("  Ring metrics: queued={} dequeued={} full={}", m.produced, m.consumed, m.rejected_full);
    println!("  Duration: {:.2?}", elapsed);
    println!(
        "  Throughput: {:.2} M packets/sec",
        received as f64 / elapsed.as_secs_f64() / 1e6
    );

    rx.purge();
    IndexPool::global().release(dev_id);
}

fn buffer_of(pkt: &Packet) -> NonZeroU64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&pkt.data()[..8]);
    NonZeroU64::new(u64::from_le_bytes(raw)).expect("handles are non-zero")
}
