// demos/send_datagram.rs
//! Sends one line from stdin (or the first argument) as a UDP datagram
//!
//! ```text
//! cargo run --example send_datagram -- "hello" 127.0.0.1:8888
//! ```

use std::io::{self, BufRead, Write};
use std::net::UdpSocket;

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let message = match args.next() {
        Some(message) => message,
        None => {
            print!("Enter message to send: ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            line
        }
    };
    let target = args.next().unwrap_or_else(|| "127.0.0.1:8888".to_string());

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    let sent = socket.send_to(message.as_bytes(), &target)?;
    println!("Sent {} bytes to {}", sent, target);

    Ok(())
}
