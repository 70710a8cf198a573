//! Streaming MD5 fingerprints for change detection.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use dirmirror_core::Fingerprint;

/// Read size when streaming a file through the hasher (64 KiB).
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Fingerprint a file by streaming it in [`CHUNK_SIZE`] chunks.
pub fn fingerprint_file(path: &Path) -> io::Result<Fingerprint> {
    let file = File::open(path)?;
    fingerprint_reader(file)
}

/// Fingerprint everything `reader` yields until EOF.
pub fn fingerprint_reader(mut reader: impl Read) -> io::Result<Fingerprint> {
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        context.consume(&buffer[..read]);
    }

    Ok(Fingerprint::from_digest(context.compute().0))
}

/// Fingerprint in-memory content.
pub fn fingerprint_bytes(data: &[u8]) -> Fingerprint {
    Fingerprint::from_digest(md5::compute(data).0)
}
