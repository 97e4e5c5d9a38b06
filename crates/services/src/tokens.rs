//! Random tokens: captcha ids, captcha solutions and delete codes.

use rand::distributions::Alphanumeric;
use rand::Rng;

pub const CAPTCHA_ID_LEN: usize = 4;
pub const CAPTCHA_SOLUTION_LEN: usize = 4;

/// Mixed-case ASCII letters and digits.
pub fn alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Decimal digits only.
pub fn digits(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// True when `id` could have been produced by `alphanumeric(CAPTCHA_ID_LEN)`.
pub fn is_captcha_id(id: &str) -> bool {
    id.len() == CAPTCHA_ID_LEN && id.bytes().all(|b| b.is_ascii_alphanumeric())
}
