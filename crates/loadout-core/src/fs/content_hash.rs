//! Deterministic content hashing for ledger fingerprints.
//!
//! Hash format for a file set: `blake3(path || 0x00 || content || 0xFF ...)`
//! with paths sorted lexicographically. Output is a lowercase hex string.

use crate::resource::ResourceFile;

pub fn hash_bytes(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

pub fn hash_files(files: &[ResourceFile]) -> String {
    let mut sorted: Vec<&ResourceFile> = files.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut hasher = blake3::Hasher::new();
    for file in sorted {
        hasher.update(file.path.as_bytes());
        hasher.update(&[0x00]);
        hasher.update(file.content.as_bytes());
        hasher.update(&[0xFF]);
    }
    hasher.finalize().to_hex().to_string()
}
