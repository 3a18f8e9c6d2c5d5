//! Outbound message identifiers.
//!
//! The messaging backend expects `msgId` to be the send time, reduced and
//! rounded to a 100ms bucket, offset by the device id's 32-bit string hash.

/// Modulus applied to the millisecond timestamp before rounding.
pub const TIMESTAMP_MODULUS: i64 = 2_147_483_547;

/// 32-bit polynomial string hash (multiplier 31) over UTF-16 code units,
/// with two's-complement wrapping.
pub fn java_string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Message id for `device_id` sending at `timestamp_ms`.
pub fn generate(device_id: &str, timestamp_ms: i64) -> i64 {
    let rounded = timestamp_ms.rem_euclid(TIMESTAMP_MODULUS) / 100 * 100;
    rounded + i64::from(java_string_hash(device_id))
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
