// demos/ring_stream.rs
//! Shows the ring's byte-pipe behaviour: merging, wraparound and overflow

use udpring::prelude::*;

fn main() -> Result<(), InitError> {
    println!("=== Datagrams Become One Byte Stream ===\n");

    let mut stream = RingBuffer::with_capacity(1024)?;

    let datagrams: Vec<&[u8]> = vec![
        b"first datagram|",
        b"second datagram|",
        b"third datagram",
    ];

    for (i, datagram) in datagrams.iter().enumerate() {
        let accepted = stream.write(datagram);
        println!(
            "Datagram {}: accepted {} bytes (ring: {}/{})",
            i + 1,
            accepted,
            stream.used(),
            stream.capacity()
        );
    }

    // A worker reads whatever is there, up to its chunk size
    println!("\nDraining in 20-byte chunks:");
    let mut chunk_num = 1;
    while !stream.is_empty() {
        let mut output = vec![0u8; 20];
        let read = stream.read(&mut output);
        output.truncate(read);
        println!("Chunk {}: {:?}", chunk_num, String::from_utf8_lossy(&output));
        chunk_num += 1;
    }

    println!("\n=== Wraparound ===\n");

    let mut ring = RingBuffer::with_capacity(64)?;
    ring.write(b"1234567890123456789012345678901234567890");
    println!("Initial write: {} bytes", ring.used());

    let mut discard = vec![0u8; 20];
    ring.read(&mut discard);
    println!(
        "After reading 20 bytes: {} used, {} available",
        ring.used(),
        ring.available()
    );

    ring.write(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ");
    println!("After wraparound write: {} used", ring.used());

    let mut peek = vec![0u8; 10];
    ring.peek(&mut peek);
    println!("Peeked: {:?}", String::from_utf8_lossy(&peek));

    println!("\n=== Overflow ===\n");

    let mut small = RingBuffer::with_capacity(16)?;
    let payload = b"twenty bytes payload";
    let accepted = small.write(payload);
    println!(
        "Wrote {} byte datagram into 16 byte ring: {} accepted, {} dropped",
        payload.len(),
        accepted,
        payload.len() - accepted
    );

    small.release();
    println!("Released ring, storage zeroed: {}", small.is_released());

    Ok(())
}
