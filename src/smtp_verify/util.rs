use rand::{Rng, distributions::Alphanumeric};

/// Random lowercase alias for catch-all detection, 6..=32 characters.
pub(crate) fn random_local_part(len: usize) -> String {
    let length = len.clamp(6, 32);
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect()
}
