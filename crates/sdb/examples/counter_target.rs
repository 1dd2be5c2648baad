//! Counting target program for exercising attach/continue/detach.
//!
//! Counts once per 100ms and prints a line every 10 ticks, so it is easy to
//! see when `sdb` has it stopped and when it runs again after detaching.
//! Ctrl+C (SIGINT) shuts it down cleanly.
//!
//! ```bash
//! # Terminal 1
//! cargo run --example counter_target
//!
//! # Terminal 2 (note the PID from terminal 1)
//! sdb -p <PID>
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

static RUNNING: AtomicBool = AtomicBool::new(true);

fn main()
{
    println!("Counter target starting, PID: {}", std::process::id());

    ctrlc::set_handler(|| {
        println!("\nReceived interrupt signal, shutting down...");
        RUNNING.store(false, Ordering::Relaxed);
    })
    .expect("Error setting signal handler");

    let mut counter = 0u64;
    while RUNNING.load(Ordering::Relaxed) {
        counter += 1;
        if counter % 10 == 0 {
            println!("tick {counter}");
        }
        thread::sleep(Duration::from_millis(100));
    }

    println!("Counter target stopped after {counter} ticks");
}
