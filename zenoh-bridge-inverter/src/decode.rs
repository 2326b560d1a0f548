//! Raw register word decoding.
//!
//! Two-register values are big-endian word order (first word is the high
//! 16 bits) and always unsigned. Devices that report signed quantities in a
//! register pair will read as large positive numbers.

/// Compose one or two register words into an unsigned integer.
///
/// Returns `None` for any other number of words.
pub fn compose(raw: &[u16]) -> Option<u32> {
    match *raw {
        [word] => Some(u32::from(word)),
        [high, low] => Some((u32::from(high) << 16) | u32::from(low)),
        _ => None,
    }
}

/// Decode a raw reading into a physical value.
///
/// An absent reading stays absent; it is never coerced to zero.
pub fn decode(raw: Option<&[u16]>, scale: f64) -> Option<f64> {
    raw.and_then(compose).map(|value| f64::from(value) * scale)
}
