pub fn u8s_from_u64(seed: u64) -> [u8; 32] {
    blake3::hash(&seed.to_le_bytes()).into()
}

/// Derives an independent 32 byte seed for one task of a parallel region.
///
/// The stream is identified by a list of indices (for example pass number and
/// row), so two tasks never share a random stream and the derived seeds do not
/// depend on which worker thread runs the task.
pub fn derive_seed(base: &[u8; 32], stream: &[u64]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(base);
    for index in stream {
        hasher.update(&index.to_le_bytes());
    }
    hasher.finalize().into()
}
