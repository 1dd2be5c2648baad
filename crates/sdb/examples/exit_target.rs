//! Target program that exits immediately with a chosen status.
//!
//! ```bash
//! cargo build --example exit_target
//! sdb target/debug/examples/exit_target 3
//! sdb> continue
//! Process 12345 exited with status 3
//! ```

fn main()
{
    let code = std::env::args().nth(1).and_then(|arg| arg.parse::<i32>().ok()).unwrap_or(0);
    println!("exit_target (PID {}) exiting with status {code}", std::process::id());
    std::process::exit(code);
}
