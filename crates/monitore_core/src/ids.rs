use rand::RngCore;

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    let mut out = String::with_capacity(bytes * 2);
    for byte in buf {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Opaque row identifier, 128 bits of randomness.
pub fn new_id() -> String {
    random_hex(16)
}

/// Session bearer token. Longer than row ids since it is a credential.
pub fn new_token() -> String {
    random_hex(32)
}
