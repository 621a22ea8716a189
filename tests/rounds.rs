use std::{thread, time::Duration};

use partition_merge::{CollectErr, MultiCollector, Phase};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Runs one round where worker `i` contributes `blocks[i]`.
fn run_round(collector: &MultiCollector<u32>, blocks: &[Vec<u32>]) -> Result<(), CollectErr> {
    thread::scope(|s| {
        let handles: Vec<_> = blocks
            .iter()
            .enumerate()
            .map(|(index, block)| {
                s.spawn(move || {
                    let mut worker = collector.worker(index)?;
                    worker.extend(block.iter().copied());
                    worker.finish_round()
                })
            })
            .collect();

        handles
            .into_iter()
            .try_for_each(|handle| handle.join().unwrap())
    })
}

fn expected(blocks: &[Vec<u32>]) -> Vec<u32> {
    blocks.iter().flatten().copied().collect()
}

#[test]
fn four_workers_each_contribute_a_block() -> Result<(), CollectErr> {
    init_logger();

    const WORKERS: usize = 4;
    const PER_WORKER: u32 = 1000;

    let collector = MultiCollector::new(WORKERS);
    let blocks = vec![(0..PER_WORKER).collect::<Vec<_>>(); WORKERS];

    run_round(&collector, &blocks)?;
    collector.wait_for_round_completion();

    let merged = collector.to_vec()?;
    assert_eq!(merged.len(), 4000);

    for (i, block) in merged.chunks(PER_WORKER as usize).enumerate() {
        assert!(
            block.iter().copied().eq(0..PER_WORKER),
            "block {i} out of order"
        );
    }
    Ok(())
}

#[test]
fn blocks_start_at_prefix_sums() -> Result<(), CollectErr> {
    init_logger();

    let blocks: Vec<Vec<u32>> = [3, 17, 1, 0, 42, 8]
        .iter()
        .enumerate()
        .map(|(worker, &count)| (0..count).map(|v| worker as u32 * 1000 + v).collect())
        .collect();

    let collector = MultiCollector::new(blocks.len());
    run_round(&collector, &blocks)?;

    let merged = collector.to_vec()?;
    assert_eq!(merged, expected(&blocks));

    let mut offset = 0;
    for block in &blocks {
        assert_eq!(&merged[offset..offset + block.len()], block.as_slice());
        offset += block.len();
    }
    Ok(())
}

#[test]
fn idle_worker_leaves_no_gap() -> Result<(), CollectErr> {
    let blocks = vec![vec![1, 2], vec![], vec![3], vec![]];
    let collector = MultiCollector::new(blocks.len());

    run_round(&collector, &blocks)?;

    assert_eq!(collector.to_vec()?, [1, 2, 3]);
    Ok(())
}

#[test]
fn every_worker_idle() -> Result<(), CollectErr> {
    let blocks = vec![vec![]; 3];
    let collector = MultiCollector::new(blocks.len());

    run_round(&collector, &blocks)?;

    assert!(collector.is_empty());
    assert_eq!(collector.completed_rounds(), 1);
    Ok(())
}

#[test]
fn single_worker_is_a_plain_copy() -> Result<(), CollectErr> {
    let collector = MultiCollector::new(1);
    let mut worker = collector.worker(0)?;

    worker.extend([9, 8, 7]);
    assert_eq!(worker.enter_merge_barrier()?, 0);
    worker.merge()?;

    assert!(worker.is_empty());
    assert_eq!(collector.to_vec()?, [9, 8, 7]);
    Ok(())
}

#[test]
fn second_round_has_no_residue() -> Result<(), CollectErr> {
    init_logger();

    let collector = MultiCollector::new(3);

    let first = vec![vec![1; 50], vec![2; 10], vec![3; 30]];
    run_round(&collector, &first)?;
    assert_eq!(collector.to_vec()?, expected(&first));

    let second = vec![vec![4; 2], vec![], vec![6; 5]];
    run_round(&collector, &second)?;
    assert_eq!(collector.to_vec()?, expected(&second));

    assert_eq!(collector.completed_rounds(), 2);
    Ok(())
}

#[test]
fn many_rounds_with_long_lived_workers() {
    init_logger();

    const WORKERS: usize = 3;
    const ROUNDS: u32 = 50;

    let collector = MultiCollector::<u32>::new(WORKERS);

    thread::scope(|s| {
        for index in 0..WORKERS {
            let collector = &collector;
            s.spawn(move || {
                let mut worker = collector.worker(index).unwrap();

                for round in 0..ROUNDS {
                    let count = (round as usize + index) % 4;
                    worker.extend((0..count as u32).map(|v| round * 100 + v));
                    worker.finish_round().unwrap();

                    // A new arrival is rejected until every worker has merged.
                    collector.wait_for_rounds(u64::from(round) + 1);
                }
            });
        }
    });

    assert_eq!(collector.completed_rounds(), u64::from(ROUNDS));

    let last = ROUNDS - 1;
    let expected: Vec<u32> = (0..WORKERS)
        .flat_map(|index| {
            let count = (last as usize + index) % 4;
            (0..count as u32).map(move |v| last * 100 + v)
        })
        .collect();
    assert_eq!(collector.to_vec().unwrap(), expected);
}

#[test]
fn coordinator_waits_for_the_merge() {
    init_logger();

    const WORKERS: usize = 4;

    let collector = MultiCollector::<u32>::new(WORKERS);

    thread::scope(|s| {
        let coordinator = s.spawn(|| {
            let completed = collector.wait_for_rounds(1);
            (completed, collector.to_vec())
        });

        for index in 0..WORKERS {
            let collector = &collector;
            s.spawn(move || {
                let mut worker = collector.worker(index).unwrap();
                worker.push(index as u32);
                worker.finish_round().unwrap();
            });
        }

        let (completed, merged) = coordinator.join().unwrap();
        assert_eq!(completed, 1);
        assert_eq!(merged.unwrap(), [0, 1, 2, 3]);
    });

    assert_eq!(collector.phase(), Phase::Collecting);
}

#[test]
fn round_completion_waits_for_the_last_merge() -> Result<(), CollectErr> {
    init_logger();

    let collector = MultiCollector::<u32>::new(2);
    let mut first = collector.worker(0)?;
    let mut second = collector.worker(1)?;
    first.push(1);
    second.push(2);

    let mut second = thread::scope(|s| {
        let other = s.spawn(move || {
            second.enter_merge_barrier().unwrap();
            second
        });
        first.enter_merge_barrier().unwrap();
        other.join().unwrap()
    });

    assert_eq!(collector.phase(), Phase::OffsetsReady);
    second.merge()?;
    assert_eq!(collector.phase(), Phase::Merging);

    thread::scope(|s| {
        let coordinator = s.spawn(|| {
            collector.wait_for_round_completion();
            collector.to_vec()
        });

        thread::sleep(Duration::from_millis(100));
        assert!(
            !coordinator.is_finished(),
            "coordinator returned before the round completed"
        );

        first.merge().unwrap();

        assert_eq!(coordinator.join().unwrap().unwrap(), [1, 2]);
    });

    assert_eq!(collector.completed_rounds(), 1);
    Ok(())
}

#[test]
fn no_workers_never_blocks_the_coordinator() {
    let collector = MultiCollector::<u32>::new(0);

    collector.wait_for_round_completion();
    assert_eq!(collector.wait_for_rounds(1), 0);
    assert!(collector.is_empty());
}

#[test]
fn preallocation_keeps_sizes() -> Result<(), CollectErr> {
    let mut collector = MultiCollector::<u64>::new(5);
    collector.preallocate_evenly(5000);

    for index in 0..5 {
        let worker = collector.worker(index)?;
        assert!(worker.capacity() >= 1001);
        assert_eq!(worker.len(), 0);
    }

    assert!(collector.is_empty());
    Ok(())
}
