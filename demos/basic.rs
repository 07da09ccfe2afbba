//! Basic pool usage: mixed tasks, a failure, and a graceful shutdown
//!
//! Run with `RUST_LOG=fixpool=debug cargo run --example basic` to see the
//! pool lifecycle.

use fixpool::prelude::*;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Overflow;

impl std::fmt::Display for Overflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "calculation overflowed")
    }
}

impl std::error::Error for Overflow {}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    println!("=== Fixed Worker Pool Example ===\n");

    let pool = Pool::new(3)?;

    let big = pool.submit(|| {
        let start = Instant::now();
        std::thread::sleep(Duration::from_millis(200));
        println!("Big calculation was completed");
        start.elapsed()
    })?;
    let square = pool.submit(|| 4 * 4)?;
    let overflow = pool.submit_fallible(|| Err::<u64, _>(Overflow))?;
    let lambda = pool.submit(|| println!("Work with lambda object"))?;

    pool.start()?;

    println!("square = {}", square.wait().unwrap_or_default());
    match overflow.wait() {
        Ok(v) => println!("overflow task returned {}", v),
        Err(e) => println!("overflow task: {}", e),
    }
    if let Some(Ok(())) = lambda.wait_timeout(Duration::from_secs(1)) {
        println!("lambda finished");
    }

    pool.shutdown(ShutdownMode::Graceful);

    if let Some(Ok(took)) = big.get() {
        println!("big calculation took {:?}", took);
    }
    println!("\n{:#?}", pool.stats());

    Ok(())
}
