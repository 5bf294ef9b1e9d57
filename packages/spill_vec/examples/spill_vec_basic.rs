//! Demonstrates basic usage of `SpillVec`.
//!
//! This example shows how the container stays inline for small element
//! counts, spills to the heap when its fixed capacity is exceeded, and
//! exposes the familiar slice surface throughout.

use spill_vec::{Error, SpillVec};

fn main() -> Result<(), Error> {
    println!("=== SpillVec Basic Examples ===");
    println!();

    // Example 1: small sequences never allocate.
    println!("Example 1: staying inline");
    println!("-------------------------");

    let mut axes: SpillVec<u32, 8> = SpillVec::new();
    for value in [10, 20, 30] {
        axes.push(value)?;
    }

    println!("Pushed {} elements into an 8-slot container:", axes.len());
    println!("  Contents: {axes:?}");
    println!("  Capacity: {}", axes.capacity());
    println!("  Inline:   {}", axes.is_inline());
    println!();

    // Example 2: growth past the inline capacity spills to the heap.
    println!("Example 2: spilling to the heap");
    println!("-------------------------------");

    for value in 0..20 {
        axes.push(value)?;
    }

    println!("After pushing 20 more elements:");
    println!("  Length:   {}", axes.len());
    println!("  Capacity: {}", axes.capacity());
    println!("  Inline:   {}", axes.is_inline());
    println!();

    // Example 3: the whole slice API is available.
    println!("Example 3: slice surface");
    println!("------------------------");

    axes.sort_unstable();
    println!("  Sorted:  first = {:?}, last = {:?}", axes.first(), axes.last());
    println!("  Checked: at(1000) = {:?}", axes.at(1000));

    // Example 4: resizing and shrinking.
    println!();
    println!("Example 4: resize and shrink");
    println!("----------------------------");

    axes.resize(4)?;
    axes.shrink_to_fit()?;
    println!("  After resize(4) + shrink_to_fit: {axes:?}, capacity {}", axes.capacity());

    println!();
    println!("All examples completed successfully!");
    Ok(())
}
