//! Integration tests for fencealloc.

use fencealloc::diagnostics::set_thread_sink;
use fencealloc::{
    ArenaConfig, ArenaError, ArenaEvent, CollectingSink, DummyDevice, PageArena, PageState, Sleep,
    Spin,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const PAGE: usize = 65536;

fn config() -> ArenaConfig {
    ArenaConfig::default().with_page_size(PAGE)
}

#[test]
fn test_streaming_cycle() {
    let device = DummyDevice::new();
    let mut queue = device.queue();
    let mut arena = PageArena::new(device.clone(), config()).unwrap();

    let a = arena.suballocate(4096, 256).unwrap();
    let b = arena.suballocate(4096, 256).unwrap();
    assert_eq!(a.offset(), 0);
    assert_eq!(b.offset(), 4096);
    assert_eq!(a.page(), b.page());

    assert_eq!(arena.commit(&mut queue).unwrap(), 1);
    assert_eq!(arena.used_count(), 0);
    assert_eq!(arena.page_state(a.page()), Some(PageState::Pending));

    // Device has not finished yet.
    assert_eq!(arena.retire(), 0);
    assert_eq!(arena.page_state(a.page()), Some(PageState::Pending));

    device.process_all();
    assert_eq!(arena.retire(), 1);
    assert_eq!(arena.page_state(a.page()), Some(PageState::Unused));
    assert_eq!(arena.page_cursor(a.page()), Some(0));
}

#[test]
fn test_invalid_sizes() {
    let device = DummyDevice::new();
    let mut arena = PageArena::new(device, config()).unwrap();

    assert!(matches!(
        arena.suballocate(PAGE + 1, 0),
        Err(ArenaError::InvalidArgument(_))
    ));
    assert!(matches!(arena.suballocate(0, 0), Err(ArenaError::InvalidArgument(_))));
    assert!(matches!(
        arena.find_page_for_alloc(0, 16),
        Err(ArenaError::InvalidArgument(_))
    ));
}

#[test]
fn test_invalid_requests_emit_diagnostics() {
    let sink = Arc::new(CollectingSink::new());
    set_thread_sink(Some(sink.clone()));

    let mut arena = PageArena::new(DummyDevice::new(), config()).unwrap();
    let _ = arena.suballocate(0, 0);
    let _ = arena.suballocate(PAGE + 1, 0);
    let _ = arena.suballocate(16, PAGE * 4);

    set_thread_sink(None);
    assert_eq!(sink.codes(), vec!["FE001", "FE002", "FE003"]);
}

#[test]
fn test_zero_page_size_rejected() {
    let result = PageArena::new(DummyDevice::new(), ArenaConfig::default().with_page_size(0));
    assert!(matches!(result, Err(ArenaError::InvalidArgument(_))));
}

#[test]
fn test_allocations_stay_in_bounds_and_aligned() {
    let device = DummyDevice::new();
    let mut arena = PageArena::new(device, config()).unwrap();

    for shift in 0..=16 {
        let alignment = 1usize << shift;
        for size in [1, 7, 255, 4096, PAGE / 2, PAGE] {
            let alloc = arena.suballocate(size, alignment).unwrap();
            assert_eq!(alloc.offset() % alignment, 0);
            assert!(alloc.offset() + alloc.size() <= PAGE);
        }
    }
}

#[test]
fn test_allocations_never_overlap() {
    let device = DummyDevice::new();
    let mut arena = PageArena::new(device, ArenaConfig::small()).unwrap();

    let mut last_end = 0;
    let first = arena.suballocate(16, 16).unwrap();
    let page = first.page();
    last_end = last_end.max(first.offset() + first.size());

    loop {
        let alloc = arena.suballocate(24, 8).unwrap();
        if alloc.page() != page {
            break;
        }
        assert!(alloc.offset() >= last_end);
        last_end = alloc.offset() + alloc.size();
    }
}

#[test]
fn test_memory_is_writable_through_allocation() {
    let device = DummyDevice::new();
    let mut arena = PageArena::new(device, config()).unwrap();

    let a = arena.suballocate(8, 8).unwrap();
    let b = arena.suballocate(8, 8).unwrap();
    unsafe {
        a.copy_from_slice(&[1; 8]);
        b.copy_from_slice(&[2; 8]);
        assert_eq!(a.as_mut_slice(), &[1u8; 8]);
        assert_eq!(b.as_mut_slice(), &[2u8; 8]);
    }
    assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 8);
}

#[test]
fn test_retire_clears_page_when_configured() {
    let device = DummyDevice::new();
    let mut queue = device.queue();
    let mut arena = PageArena::new(device.clone(), config().with_clear_on_retire(true)).unwrap();

    let a = arena.suballocate(64, 0).unwrap();
    unsafe { a.copy_from_slice(&[0xFF; 64]) };
    arena.commit(&mut queue).unwrap();
    device.process_all();
    arena.retire();

    let again = arena.suballocate(64, 0).unwrap();
    assert_eq!(again.as_ptr(), a.as_ptr());
    assert!(unsafe { again.as_mut_slice() }.iter().all(|&b| b == 0));
}

#[test]
fn test_pages_retire_independently() {
    let device = DummyDevice::new();
    let mut queue = device.queue();
    let mut arena = PageArena::new(device.clone(), config()).unwrap();

    let first = arena.suballocate(PAGE, 0).unwrap();
    arena.commit(&mut queue).unwrap();
    let second = arena.suballocate(PAGE, 0).unwrap();
    arena.commit(&mut queue).unwrap();
    assert_eq!(device.queued_signals(), 2);

    // Complete only the oldest signal.
    assert!(device.process_one());
    assert_eq!(arena.retire(), 1);
    assert_eq!(arena.page_state(first.page()), Some(PageState::Unused));
    assert_eq!(arena.page_state(second.page()), Some(PageState::Pending));

    device.process_all();
}

#[test]
fn test_preallocation_rounds_up() {
    let device = DummyDevice::new();
    let arena = PageArena::new(device.clone(), config().with_preallocate(PAGE * 2 + 1)).unwrap();

    assert_eq!(arena.total_pages(), 3);
    assert_eq!(arena.unused_count(), 3);
    assert_eq!(device.live_pages(), 3);
    assert_eq!(device.live_bytes(), PAGE * 3);
}

#[test]
fn test_preallocation_failure_releases_pages() {
    let device = DummyDevice::new();
    device.fail_after(2);

    let result = PageArena::new(device.clone(), config().with_preallocate(PAGE * 4));
    assert!(matches!(result, Err(ArenaError::OutOfMemory)));
    assert_eq!(device.live_pages(), 0);
    assert_eq!(device.live_fences(), 0);
}

#[test]
fn test_page_creation_failure_is_out_of_memory() {
    let device = DummyDevice::new();
    let mut arena = PageArena::new(device.clone(), config()).unwrap();

    device.fail_after(1);
    arena.suballocate(PAGE, 0).unwrap();
    assert!(matches!(arena.suballocate(PAGE, 0), Err(ArenaError::OutOfMemory)));
    assert_eq!(arena.total_pages(), 1);

    device.clear_failure();
    assert!(arena.suballocate(PAGE, 0).is_ok());
}

#[test]
fn test_fence_creation_failure_releases_page() {
    let device = DummyDevice::new();
    let mut arena = PageArena::new(device.clone(), config()).unwrap();

    device.fail_fences_after(0);
    assert!(matches!(arena.suballocate(64, 0), Err(ArenaError::OutOfMemory)));
    assert_eq!(arena.total_pages(), 0);
    assert_eq!(device.live_pages(), 0);
    assert_eq!(device.live_fences(), 0);

    device.clear_failure();
    assert!(arena.suballocate(64, 0).is_ok());
    assert_eq!(device.live_fences(), 1);
}

#[test]
fn test_reused_page_completes_out_of_order() {
    let device = DummyDevice::new();
    let mut queue = device.queue();
    let mut arena = PageArena::new(device.clone(), config()).unwrap();

    let first = arena.suballocate(PAGE, 0).unwrap().page();
    arena.commit(&mut queue).unwrap();
    device.process_all();
    assert_eq!(arena.retire(), 1);

    // Second round: the recycled page goes out again, then a fresh one.
    assert_eq!(arena.suballocate(PAGE, 0).unwrap().page(), first);
    arena.commit(&mut queue).unwrap();
    let second = arena.suballocate(PAGE, 0).unwrap().page();
    arena.commit(&mut queue).unwrap();
    assert_ne!(first, second);
    assert_eq!(arena.page_pending_fence(first), Some(2));

    // The recycled page's work finishes ahead of the queue.
    let fence = arena.page_fence(first).unwrap();
    device.complete_fence(fence, 2);
    assert_eq!(arena.retire(), 1);
    assert_eq!(arena.page_state(first), Some(PageState::Unused));
    assert_eq!(arena.page_state(second), Some(PageState::Pending));

    // Stale queued signals must not regress the completed value.
    device.process_all();
    assert_eq!(arena.retire(), 1);
    assert_eq!(arena.pending_count(), 0);
    assert!(arena.validate().is_ok());
}

#[test]
fn test_shrink_keeps_busy_pages() {
    let device = DummyDevice::new();
    let mut queue = device.queue();
    let mut arena = PageArena::new(device.clone(), config().with_preallocate(PAGE * 4)).unwrap();

    arena.suballocate(PAGE, 0).unwrap();
    arena.commit(&mut queue).unwrap();
    arena.suballocate(16, 0).unwrap();

    assert_eq!(arena.shrink(), 2);
    assert_eq!(arena.pending_count(), 1);
    assert_eq!(arena.used_count(), 1);
    assert_eq!(device.live_pages(), 2);
    assert_eq!(arena.stats().pages_destroyed, 2);

    device.process_all();
}

#[test]
fn test_retain_holds_page_across_commits() {
    let device = DummyDevice::new();
    let mut queue = device.queue();
    let mut arena = PageArena::new(device.clone(), config()).unwrap();

    let alloc = arena.suballocate(128, 0).unwrap();
    arena.retain(alloc.page()).unwrap();
    arena.retain(alloc.page()).unwrap();
    assert_eq!(arena.page_ref_count(alloc.page()), Some(2));

    assert_eq!(arena.commit(&mut queue).unwrap(), 0);
    arena.release(alloc.page()).unwrap();
    assert_eq!(arena.commit(&mut queue).unwrap(), 0);
    arena.release(alloc.page()).unwrap();
    assert_eq!(arena.commit(&mut queue).unwrap(), 1);

    assert_eq!(arena.page_state(alloc.page()), Some(PageState::Pending));
    assert!(matches!(
        arena.release(alloc.page()),
        Err(ArenaError::InvalidArgument(_))
    ));

    device.process_all();
}

#[test]
fn test_debug_name_reaches_every_page() {
    let device = DummyDevice::new();
    let mut queue = device.queue();
    let mut arena = PageArena::new(device.clone(), config().with_preallocate(PAGE)).unwrap();

    arena.suballocate(PAGE, 0).unwrap();
    arena.commit(&mut queue).unwrap();
    arena.suballocate(PAGE, 0).unwrap();
    arena.suballocate(PAGE, 0).unwrap();

    arena.set_debug_name("frame constants");
    assert_eq!(arena.debug_name(), Some("frame constants"));
    assert_eq!(device.debug_names().len(), 3);

    // Pages created later pick up the name too.
    arena.suballocate(PAGE, 0).unwrap();
    let names = device.debug_names();
    assert_eq!(names.len(), 4);
    assert!(names.iter().all(|name| name == "frame constants"));

    device.process_all();
}

#[test]
fn test_config_debug_name_applies_on_creation() {
    let device = DummyDevice::new();
    let _arena = PageArena::new(
        device.clone(),
        config().with_preallocate(PAGE * 2).with_debug_name("upload"),
    )
    .unwrap();

    assert_eq!(device.debug_names(), vec!["upload".to_string(), "upload".to_string()]);
}

#[test]
fn test_wait_for_all_pending_with_closure() {
    let device = DummyDevice::new();
    let mut queue = device.queue();
    let mut arena = PageArena::new(device.clone(), config()).unwrap();

    for _ in 0..3 {
        arena.suballocate(PAGE, 0).unwrap();
        arena.commit(&mut queue).unwrap();
    }

    let mut polls = 0;
    arena.wait_for_all_pending(|| {
        polls += 1;
        device.process_one();
    });

    assert_eq!(polls, 3);
    assert_eq!(arena.pending_count(), 0);
    assert_eq!(arena.unused_count(), 3);
}

#[test]
fn test_shutdown_blocks_until_device_finishes() {
    let device = DummyDevice::new();
    let mut queue = device.queue();
    let mut arena = PageArena::new(device.clone(), config()).unwrap();

    arena.suballocate(4096, 0).unwrap();
    arena.commit(&mut queue).unwrap();

    let finished = Arc::new(AtomicBool::new(false));
    let gpu = {
        let device = device.clone();
        let finished = finished.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            finished.store(true, Ordering::SeqCst);
            device.process_all();
        })
    };

    arena.shutdown(Sleep(Duration::from_millis(1)));
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(device.live_pages(), 0);
    assert_eq!(device.live_fences(), 0);

    gpu.join().unwrap();
}

#[test]
fn test_drop_waits_and_warns() {
    let device = DummyDevice::new();
    let mut queue = device.queue();
    let mut arena = PageArena::new(device.clone(), config()).unwrap();

    arena.suballocate(4096, 0).unwrap();
    arena.commit(&mut queue).unwrap();
    arena.suballocate(4096, 0).unwrap();

    let gpu = {
        let device = device.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            device.process_all();
        })
    };

    let sink = Arc::new(CollectingSink::new());
    set_thread_sink(Some(sink.clone()));
    drop(arena);
    set_thread_sink(None);

    assert_eq!(sink.codes(), vec!["FE202", "FE201"]);
    assert_eq!(device.live_pages(), 0);
    gpu.join().unwrap();
}

#[test]
fn test_explicit_shutdown_has_no_blocking_warning() {
    let device = DummyDevice::new();
    let mut queue = device.queue();
    let mut arena = PageArena::new(device.clone(), config()).unwrap();

    arena.suballocate(16, 0).unwrap();
    arena.commit(&mut queue).unwrap();
    device.process_all();

    let sink = Arc::new(CollectingSink::new());
    set_thread_sink(Some(sink.clone()));
    arena.shutdown(Spin);
    set_thread_sink(None);

    assert!(sink.codes().is_empty());
    assert_eq!(device.live_pages(), 0);
}

#[test]
fn test_event_hook_sees_lifecycle() {
    let device = DummyDevice::new();
    let mut queue = device.queue();
    let mut arena = PageArena::new(device.clone(), config()).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    arena.set_event_hook(move |event| sink.lock().unwrap().push(event.clone()));

    let alloc = arena.suballocate(16, 0).unwrap();
    arena.commit(&mut queue).unwrap();
    device.process_all();
    arena.retire();
    arena.shrink();

    let page = alloc.page();
    let address = alloc.device_address();
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            ArenaEvent::PageCreated {
                page,
                device_address: address
            },
            ArenaEvent::PageAcquired { page },
            ArenaEvent::PagesCommitted { count: 1 },
            ArenaEvent::PageRetired {
                page,
                fence_value: 1
            },
            ArenaEvent::PageFreed { page },
        ]
    );

    arena.clear_event_hook();
    arena.suballocate(16, 0).unwrap();
    assert_eq!(events.lock().unwrap().len(), 5);
}

#[test]
fn test_stats_display() {
    let device = DummyDevice::new();
    let mut arena = PageArena::new(device, config()).unwrap();
    arena.suballocate(1000, 0).unwrap();

    let stats = arena.stats();
    assert_eq!(stats.total_pages, 1);
    assert_eq!(stats.bytes_in_use, 1000);
    assert!(stats.to_string().contains("64.00 KB"));
}

/// Tiny deterministic generator so the sweep is reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

#[test]
fn test_randomized_invariants() {
    let device = DummyDevice::new();
    let mut queue = device.queue();
    let mut arena = PageArena::new(device.clone(), ArenaConfig::small()).unwrap();
    let page_size = arena.page_size();
    let mut rng = Lcg(0x5EED);
    let mut retained = Vec::new();

    for step in 0..2000 {
        match rng.below(10) {
            0..=4 => {
                let size = 1 + rng.below(page_size as u64) as usize;
                let alignment = match rng.below(4) {
                    0 => 0,
                    _ => 1 << rng.below(9),
                };
                let alloc = arena.suballocate(size, alignment).unwrap();
                assert_eq!(arena.page_state(alloc.page()), Some(PageState::Used));
                if alignment != 0 {
                    assert_eq!(alloc.offset() % alignment, 0);
                }
                assert!(alloc.offset() + size <= page_size);

                if rng.below(8) == 0 {
                    arena.retain(alloc.page()).unwrap();
                    retained.push(alloc.page());
                }
            }
            5 => {
                if let Some(page) = retained.pop() {
                    arena.release(page).unwrap();
                }
            }
            6 => {
                arena.commit(&mut queue).unwrap();
                for &page in &retained {
                    assert_eq!(arena.page_state(page), Some(PageState::Used));
                }
            }
            7 => {
                if rng.below(2) == 0 {
                    device.process_one();
                } else {
                    device.process_all();
                }
            }
            8 => {
                arena.retire();
            }
            _ => {
                arena.shrink();
            }
        }

        let stats = arena.stats();
        assert_eq!(
            stats.unused_pages + stats.used_pages + stats.pending_pages,
            stats.total_pages,
            "step {}",
            step
        );
        assert_eq!(
            stats.pages_created - stats.pages_destroyed,
            stats.total_pages as u64
        );
        assert_eq!(device.live_pages(), stats.total_pages);
        assert!(arena.validate().is_ok(), "step {}", step);
    }

    for page in retained.drain(..) {
        arena.release(page).unwrap();
    }
    arena.commit(&mut queue).unwrap();
    arena.shutdown(|| {
        device.process_all();
    });
    assert_eq!(device.live_pages(), 0);
}
