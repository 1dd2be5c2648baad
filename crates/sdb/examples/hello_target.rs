/// Simple target program for `sdb -p <PID>`.
///
/// Prints its PID and then sleeps in a loop, giving you time to attach.
/// Detaching with `sdb` leaves it running; stop it with Ctrl+C.
fn main()
{
    let pid = std::process::id();
    println!("Hello! I am process {pid}");
    println!("Waiting for sdb to attach... (Press Ctrl+C to exit)");

    loop {
        std::thread::sleep(std::time::Duration::from_secs(1));
    }
}
