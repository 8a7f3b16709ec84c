use std::thread;
use std::time::{Duration, Instant};

use simple_logger::SimpleLogger;

use task_pool::thread_pool_builder::ThreadPoolBuilder;

pub fn main() -> Result<(), anyhow::Error> {
    SimpleLogger::new().init()?;

    let tp = ThreadPoolBuilder::new()
        .name_str("example")
        .threads(4)
        .build()?;

    let start = Instant::now();
    let mut handles = Vec::new();
    for i in 0..10_u64 {
        handles.push(tp.enqueue(move || {
            thread::sleep(Duration::from_millis(50 + i * 10));
            let result = format!("Task {i} completed");
            log::debug!("{result} in {}", thread::current().name().unwrap_or("unnamed"));
            result
        })?);
    }

    for handle in handles {
        match handle.get() {
            Ok(result) => log::info!("{result}"),
            Err(e) => log::error!("concurrent task failed: {e}"),
        }
    }
    log::info!("all tasks completed in {:?} on {} threads", start.elapsed(), tp.size());

    tp.shutdown()?;
    Ok(())
}
