/*!
 * Slot Pool Tests
 * Swap-based partition bookkeeping and leak-freedom
 */

use proptest::prelude::*;
use slotfs::native::OpKind;
use slotfs::requests::SlotPool;

fn arm_next(pool: &mut SlotPool) -> u32 {
    let slot = pool.acquire();
    slot.arm(OpKind::Stat, None, Box::new(|_| {}));
    slot.identity()
}

#[test]
fn test_release_moves_last_active_into_hole() {
    let mut pool = SlotPool::new();
    for expected in 0..3 {
        assert_eq!(arm_next(&mut pool), expected);
    }

    // Releasing 0 swaps slot 2 into position 0
    let released = pool.release(0).unwrap();
    assert_eq!(released.identity(), 2);
    released.detach();

    assert_eq!(pool.active(), 2);
    for id in 0..pool.len() as u32 {
        assert_eq!(pool.get(id).unwrap().identity(), id);
    }
}

#[test]
fn test_release_of_idle_slot_is_rejected() {
    let mut pool = SlotPool::with_capacity(4);
    arm_next(&mut pool);
    assert!(pool.release(1).is_err());
    assert!(pool.release(0).is_ok());
    assert!(pool.release(0).is_err());
}

#[test]
fn test_sequential_operations_reuse_one_slot() {
    let mut pool = SlotPool::new();
    for _ in 0..1000 {
        let id = arm_next(&mut pool);
        pool.release(id).unwrap().detach();
    }
    assert_eq!(pool.len(), 1);

    let stats = pool.stats();
    assert_eq!(stats.submissions, 1000);
    assert_eq!(stats.completions, 1000);
    assert_eq!(stats.active, 0);
}

#[derive(Debug, Clone)]
enum Step {
    Acquire,
    Release(usize),
}

fn steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        prop_oneof![Just(Step::Acquire), any::<usize>().prop_map(Step::Release)],
        1..200,
    )
}

proptest! {
    #[test]
    fn prop_pool_never_exceeds_peak_concurrency(steps in steps()) {
        let mut pool = SlotPool::new();
        let mut peak = 0;

        for step in steps {
            match step {
                Step::Acquire => {
                    arm_next(&mut pool);
                }
                Step::Release(pick) if pool.active() > 0 => {
                    let id = (pick % pool.active()) as u32;
                    let slot = pool.release(id).unwrap();
                    prop_assert!(slot.detach().continuation.is_some());
                }
                Step::Release(_) => {}
            }
            peak = peak.max(pool.active());

            prop_assert_eq!(pool.len(), peak);
            for id in 0..pool.len() as u32 {
                let slot = pool.get(id).unwrap();
                prop_assert_eq!(slot.identity(), id);
                prop_assert_eq!(slot.is_armed(), (id as usize) < pool.active());
            }
        }
    }
}
