use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use sha2::{Sha256, Digest};

use crate::constants::HASH_BUFFER_SIZE;

/// Calculate the SHA-256 hash of a file, streaming it in 1MB chunks
pub fn calculate_sha256(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    sha256_reader(BufReader::new(file))
}

/// Calculate the SHA-256 hash of everything a reader yields
pub fn sha256_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA-256 of an in-memory buffer
pub fn sha256_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
