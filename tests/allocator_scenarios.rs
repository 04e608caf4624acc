//! End-to-end allocator scenarios through the public API

use memslab::error::Error;
use memslab::slab::{resolve, ChunkAllocator, POWER_BLOCK, POWER_LARGEST, POWER_SMALLEST};
use memslab::{AllocatorConfig, ChunkHandle, SharedAllocator, SlabAllocator, Strategy};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_small_and_oversized_requests() {
    let mut allocator = SlabAllocator::new(0);
    allocator.init(0);

    assert!(allocator.allocate(8).is_ok());
    assert_eq!(
        allocator.allocate(2_000_000),
        Err(Error::UnsupportedSize(2_000_000))
    );
}

#[test]
fn test_single_block_ceiling() -> memslab::error::Result<()> {
    let mut allocator = SlabAllocator::new(0);
    allocator.init(1_048_576);

    let first = allocator.allocate(8)?;
    let per_slab = allocator.class(3).unwrap().chunks_per_slab;
    assert_eq!(per_slab, 131_072);

    let mut held = vec![first];
    for _ in 1..per_slab {
        held.push(allocator.allocate(8)?);
    }
    assert_eq!(allocator.class(3).unwrap().bump_remaining(), 0);
    assert_eq!(allocator.memory_committed(), POWER_BLOCK);

    assert!(matches!(
        allocator.allocate(8),
        Err(Error::OutOfBudget { .. })
    ));
    assert_eq!(allocator.memory_committed(), POWER_BLOCK);

    // A freed chunk is served even though the budget is spent
    let last = held.pop().unwrap();
    let addr = last.addr();
    unsafe { allocator.free(last, 8) };
    assert_eq!(allocator.allocate(8)?.addr(), addr);
    Ok(())
}

#[test]
fn test_unbounded_ceiling_never_refuses_for_budget() -> memslab::error::Result<()> {
    let mut allocator = SlabAllocator::new(0);

    for _ in 0..24 {
        allocator.allocate(POWER_BLOCK)?;
    }
    assert_eq!(allocator.memory_committed(), 24 * POWER_BLOCK);
    Ok(())
}

#[test]
fn test_committed_memory_stays_under_ceiling() {
    let ceiling = 5 * POWER_BLOCK + 1000;
    let mut allocator = SlabAllocator::new(ceiling);
    let mut served = 0;

    for size in [8usize, 300, 5000, 70_000, 1 << 20].iter().cycle().take(200) {
        if allocator.allocate(*size).is_ok() {
            served += 1;
        }
        assert!(allocator.memory_committed() <= ceiling);
    }
    assert!(served > 0);
    assert_eq!(allocator.memory_committed(), 5 * POWER_BLOCK);
}

#[test]
fn test_report_consistency() -> memslab::error::Result<()> {
    let mut allocator = SlabAllocator::new(0);

    let mut chunks = Vec::new();
    for _ in 0..20 {
        chunks.push(allocator.allocate(200)?);
    }
    for chunk in chunks.drain(..7) {
        unsafe { allocator.free(chunk, 200) };
    }

    let id = resolve(200);
    let stats = allocator.stats();
    let class = stats.class(id).unwrap();
    let slabs = class.total_pages;
    assert_eq!(class.total_chunks, slabs * class.chunks_per_page);
    assert_eq!(class.used_chunks, slabs * class.chunks_per_page - 7);
    assert_eq!(class.free_chunks, 7);

    let report = allocator.report();
    assert!(report.contains(&format!("STAT {}:chunk_size 256\r\n", id)));
    assert!(report.contains(&format!("STAT {}:free_chunks 7\r\n", id)));
    assert!(report.ends_with(&format!(
        "STAT active_slabs 1\r\nSTAT total_malloced {}\r\n",
        POWER_BLOCK
    )));
    Ok(())
}

#[test]
fn test_every_class_is_servable() -> memslab::error::Result<()> {
    let mut allocator = SlabAllocator::new(0);

    for id in POWER_SMALLEST..=POWER_LARGEST {
        let chunk = allocator.allocate(1 << id)?;
        assert_eq!(chunk.addr() % (1usize << id).min(4096), 0);
    }
    assert_eq!(
        allocator.stats().active_slabs,
        POWER_LARGEST - POWER_SMALLEST + 1
    );
    Ok(())
}

#[test]
fn test_shared_allocator_across_threads() {
    let shared = SharedAllocator::new(Box::new(SlabAllocator::new(0)));
    let threads = 4;
    let per_thread = 2_000;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let shared = shared.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut held: Vec<ChunkHandle> = Vec::new();
                for i in 0..per_thread {
                    let chunk = shared.allocate(64).expect("allocate");
                    unsafe { chunk.as_ptr().write_bytes(t as u8, 64) };
                    held.push(chunk);
                    if i % 3 == 0 {
                        let chunk = held.swap_remove(0);
                        unsafe { shared.free(chunk, 64) };
                    }
                }
                held
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for chunk in handle.join().expect("thread") {
            assert!(seen.insert(chunk.addr()), "chunk handed out twice");
        }
    }

    let stats = shared.stats();
    let class = stats.class(6).unwrap();
    assert_eq!(class.free_chunks + seen.len(), class.total_chunks - class.free_chunks_end);
}

#[test]
fn test_configured_strategies() -> memslab::error::Result<()> {
    let config = AllocatorConfig::from_toml_str("memory_limit = 1000\nstrategy = \"system\"")?;
    let shared = SharedAllocator::from_config(&config);
    assert_eq!(shared.strategy(), Strategy::System);

    let chunk = shared.allocate(600)?;
    assert!(matches!(
        shared.allocate(600),
        Err(Error::OutOfBudget { .. })
    ));
    unsafe { shared.free(chunk, 600) };
    assert_eq!(shared.memory_committed(), 0);

    let mut slab: Box<dyn ChunkAllocator> = AllocatorConfig::default().build();
    let chunk = slab.allocate(100)?;
    let addr = chunk.addr();
    unsafe { slab.free(chunk, 100) };
    assert_eq!(slab.allocate(100)?.addr(), addr);
    Ok(())
}
