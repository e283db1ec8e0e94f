use rand::{Rng, RngCore};

/// 6-digit numeric one-time code in 100000..=999999.
pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    code.to_string()
}

/// 256-bit random token, hex encoded (64 chars). Used for email
/// verification and password reset links.
pub fn generate_link_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
