//! Demonstrates one producer and one consumer coordinating over a named
//! shared-memory segment, as two independent handles would across two
//! operating-system processes.

use shm_disruptor::{ops, DisruptorError, SegmentConfig};
use std::thread;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), DisruptorError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🚀 shm-disruptor: two-handle simulation");

    let name = format!("/shm-disruptor-demo-{}", std::process::id());
    let num_elements = 1024;
    let element_size = 64;
    let message_count = 100_000u64;

    let producer_cfg = SegmentConfig::new(&name, num_elements, element_size)?
        .with_num_consumers(1)
        .with_init(true)
        .with_spin_sleep(0);
    let consumer_cfg = SegmentConfig::new(&name, num_elements, element_size)?
        .with_num_consumers(1)
        .with_consumer_index(0)
        .with_spin_sleep(0);

    let producer = ops::open(&producer_cfg)?;
    let consumer_name = name.clone();

    let consumer_thread = thread::spawn(move || -> Result<u64, DisruptorError> {
        let consumer = ops::open(&consumer_cfg)?;
        let mut received = 0u64;
        while received < message_count {
            let spans = ops::consume_new_sync(&consumer)?;
            for span in &spans {
                received += span.len() as u64 / element_size as u64;
            }
            ops::consume_commit(&consumer);
        }
        println!("  consumer on {consumer_name:?} drained {received} messages");
        Ok(received)
    });

    for i in 0..message_count {
        loop {
            let mut span = ops::produce_claim_sync(&producer);
            if span.is_empty() {
                std::thread::yield_now();
                continue;
            }
            span.as_mut_slice()[..8].copy_from_slice(&i.to_le_bytes());
            ops::produce_commit_sync(&producer, span.seq());
            break;
        }
    }

    let received = consumer_thread.join().expect("consumer thread panicked")?;
    println!("✅ produced and consumed {received} messages over {name:?}");

    nix::sys::mman::shm_unlink(std::ffi::CString::new(name).unwrap().as_c_str()).ok();
    Ok(())
}
