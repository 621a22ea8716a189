use std::{env, thread};

use anyhow::{Context, bail};
use log::{info, warn};
use partition_merge::{CollectorConfig, MultiCollector};

const DEFAULT_WORKERS: usize = 5;
const DEFAULT_PER_WORKER: i32 = 1000;

fn load_config() -> anyhow::Result<CollectorConfig> {
    match env::args().nth(1) {
        Some(path) => CollectorConfig::from_path(&path)
            .with_context(|| format!("failed to load config from '{path}'")),
        None => {
            let total = DEFAULT_WORKERS * DEFAULT_PER_WORKER as usize;
            Ok(CollectorConfig::new(DEFAULT_WORKERS).with_expected_total(total))
        }
    }
}

fn per_worker() -> anyhow::Result<i32> {
    match env::var("PER_WORKER") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("PER_WORKER must be an integer, got '{value}'")),
        Err(_) => Ok(DEFAULT_PER_WORKER),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = load_config()?;
    let per_worker = per_worker()?;
    let collector = MultiCollector::<i32>::from_config(&config);

    info!(
        "collecting {per_worker} value(s) from each of {} worker(s)",
        collector.workers()
    );

    thread::scope(|s| -> anyhow::Result<()> {
        let handles: Vec<_> = (0..collector.workers())
            .map(|index| {
                let collector = &collector;
                s.spawn(move || {
                    let mut worker = collector.worker(index)?;
                    worker.extend(0..per_worker);
                    worker.finish_round()
                })
            })
            .collect();

        let completed = collector.wait_for_rounds(1);
        info!("coordinator observed {completed} completed round(s)");

        for (index, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(res) => res.with_context(|| format!("worker {index} failed"))?,
                Err(_) => bail!("worker {index} panicked"),
            }
        }

        Ok(())
    })?;

    let summary = collector.with_result(|values| {
        let ordered = values
            .chunks(per_worker.max(1) as usize)
            .all(|block| block.iter().copied().eq(0..block.len() as i32));
        (values.len(), ordered)
    })?;

    match summary {
        (len, true) => info!("merged {len} value(s) in worker order"),
        (len, false) => warn!("merged {len} value(s) out of worker order"),
    }

    Ok(())
}
