//! Demonstrates the ownership-transfer protocol of `SpillVec`.
//!
//! A spilled container's heap allocation can move between containers, and
//! even out to raw-pointer custody and back, without a single element being
//! copied.

use spill_vec::{Error, HeapBlock, SpillVec};

fn main() -> Result<(), Error> {
    println!("=== SpillVec Memory Hand-off Examples ===");
    println!();

    // Example 1: stealing a spilled allocation in constant time.
    println!("Example 1: transfer_from");
    println!("------------------------");

    let mut producer: SpillVec<u64, 4> = SpillVec::new();
    for value in 0..10_000 {
        producer.push(value)?;
    }

    let mut consumer: SpillVec<u64, 4> = SpillVec::new();
    consumer.transfer_from(&mut producer)?;

    println!("Transferred {} elements:", consumer.len());
    println!("  Producer is now empty: {}", producer.is_empty());
    println!("  Producer is inline again: {}", producer.is_inline());
    println!();

    // Example 2: detaching the allocation entirely.
    println!("Example 2: detach_memory / attach_memory");
    println!("----------------------------------------");

    let block = consumer
        .detach_memory()?
        .expect("consumer had spilled to the heap");

    println!("Detached a block of {} bytes ({} elements)", block.byte_len(), block.len());

    let mut archive: SpillVec<u64, 4> = SpillVec::new();
    archive.attach_memory(block);
    println!("  Reattached elsewhere: length {}", archive.len());
    println!();

    // Example 3: raw custody across a subsystem boundary.
    println!("Example 3: raw parts");
    println!("--------------------");

    let block = archive
        .detach_memory()?
        .expect("archive had spilled to the heap");
    let (ptr, len) = block.into_raw_parts();

    println!("Block dismantled into ({ptr:p}, {len})");

    // The pointer could now cross an FFI-like boundary. Reconstituting it
    // restores normal RAII custody.
    // SAFETY: the parts came straight out of into_raw_parts.
    let block = unsafe { HeapBlock::from_raw_parts(ptr, len) };
    println!("  Reconstituted block of {} elements", block.len());

    println!();
    println!("All examples completed successfully!");
    Ok(())
}
