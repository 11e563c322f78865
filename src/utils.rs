/// Generates a random ID.
pub fn random_id() -> u64 {
    rand::random()
}

/// Generates a prefixed, hex encoded record ID (e.g. `pos-0a1b2c3d4e5f6071`).
pub fn record_id(prefix: &str) -> String {
    format!("{prefix}-{:016x}", random_id())
}

#[cfg(test)]
#[test]
fn record_id_has_prefix() {
    let id = record_id("ord");
    assert!(id.starts_with("ord-"));
    assert_eq!(id.len(), 20);
    assert_ne!(id, record_id("ord"));
}
