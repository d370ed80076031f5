use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use corering::{Config, DescRing, ExecContext, FlagRing, NoSpace, Packet, PtrRing};
use std::sync::Arc;
use std::thread;

const MSG_COUNT: u64 = 1_000_000;
const BATCH_SIZE: usize = 256;

// =============================================================================
// SINGLE-THREADED (no cross-core traffic)
// =============================================================================

fn bench_single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_thread");
    group.throughput(Throughput::Elements(MSG_COUNT));

    group.bench_function("flag_ring_produce_consume", |b| {
        let ring = FlagRing::<u64>::new(Config::default()).unwrap();
        b.iter(|| {
            for i in 0..MSG_COUNT {
                ring.produce(i).unwrap();
                black_box(ring.consume().unwrap());
            }
        });
    });

    group.bench_function("desc_ring_queue_dequeue", |b| {
        let rx = DescRing::<Box<[u8]>>::new(Config::default()).unwrap();
        b.iter(|| {
            let mut buf: Box<[u8]> = vec![0u8; 64].into_boxed_slice();
            for _ in 0..MSG_COUNT {
                if let Err(NoSpace(back)) = rx.queue(buf) {
                    buf = back;
                    continue;
                }
                black_box(rx.peek_length());
                buf = rx.dequeue().unwrap();
            }
        });
    });

    group.finish();
}

// =============================================================================
// SPSC ACROSS THREADS
// =============================================================================

fn bench_spsc(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc");
    group.throughput(Throughput::Elements(MSG_COUNT));

    group.bench_function("ptr_ring_batched", |b| {
        b.iter(|| {
            let ring = Arc::new(PtrRing::<u64>::new(Config::default()).unwrap());

            let producer_ring = Arc::clone(&ring);
            let producer = thread::spawn(move || {
                for i in 0..MSG_COUNT {
                    let mut item = Box::new(i);
                    while let Err(NoSpace(back)) = producer_ring.produce_in(ExecContext::SoftIrq, item) {
                        item = back;
                        std::hint::spin_loop();
                    }
                }
            });

            let mut count = 0u64;
            while count < MSG_COUNT {
                count += ring.consume_up_to_in(ExecContext::SoftIrq, BATCH_SIZE, |item| {
                    black_box(item);
                }) as u64;
            }
            producer.join().unwrap();
        });
    });

    group.bench_function("desc_ring_packets", |b| {
        b.iter(|| {
            let rx = Arc::new(DescRing::<Packet>::new(Config::default()).unwrap());

            let writer_rx = Arc::clone(&rx);
            let writer = thread::spawn(move || {
                for i in 0..MSG_COUNT {
                    let mut pkt = Packet::new(vec![0u8; 64]).with_vlan(i as u16);
                    while let Err(NoSpace(back)) = writer_rx.queue_in(ExecContext::SoftIrq, pkt) {
                        pkt = back;
                        std::hint::spin_loop();
                    }
                }
            });

            let mut count = 0u64;
            while count < MSG_COUNT {
                if let Ok(pkt) = rx.dequeue_in(ExecContext::SoftIrq) {
                    black_box(pkt);
                    count += 1;
                }
            }
            writer.join().unwrap();
        });
    });

    group.finish();
}

// =============================================================================
// MULTI-PRODUCER CONTENTION ON THE PRODUCER LOCK
// =============================================================================

fn bench_mpsc(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpsc");
    let per_producer = MSG_COUNT / 4;

    for num_producers in [2usize, 4].iter() {
        let total = per_producer * *num_producers as u64;
        group.throughput(Throughput::Elements(total));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}P_1C", num_producers)),
            num_producers,
            |b, &n| {
                b.iter(|| {
                    let ring = Arc::new(FlagRing::<u64>::new(Config::with_bits(12, false)).unwrap());

                    let producers: Vec<_> = (0..n)
                        .map(|_| {
                            let ring = Arc::clone(&ring);
                            thread::spawn(move || {
                                for i in 0..per_producer {
                                    let mut item = i;
                                    while let Err(NoSpace(back)) = ring.produce(item) {
                                        item = back;
                                        std::hint::spin_loop();
                                    }
                                }
                            })
                        })
                        .collect();

                    let mut out = Vec::with_capacity(BATCH_SIZE);
                    let mut count = 0u64;
                    while count < total {
                        out.clear();
                        count += ring.consume_batched(&mut out, BATCH_SIZE) as u64;
                        black_box(&out);
                    }

                    for p in producers {
                        p.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_single_thread, bench_spsc, bench_mpsc);
criterion_main!(benches);
