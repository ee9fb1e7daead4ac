//! Base64 variable-length quantities as used by the `mappings` field.

use super::SourceMapError;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const CONTINUATION: u32 = 1 << 5;
const MASK: u32 = CONTINUATION - 1;

pub fn encode(value: i64, out: &mut String) {
    // Sign goes in the lowest bit.
    let mut rest = if value < 0 {
        ((value.unsigned_abs() << 1) | 1) as u64
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (rest & MASK as u64) as u32;
        rest >>= 5;
        if rest > 0 {
            digit |= CONTINUATION;
        }
        out.push(ALPHABET[digit as usize] as char);
        if rest == 0 {
            break;
        }
    }
}

fn digit_value(c: u8) -> Option<u32> {
    let value = match c {
        b'A'..=b'Z' => c - b'A',
        b'a'..=b'z' => c - b'a' + 26,
        b'0'..=b'9' => c - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(value as u32)
}

/// Decode one value starting at `*pos`, advancing past it.
pub fn decode(input: &[u8], pos: &mut usize) -> Result<i64, SourceMapError> {
    let mut result: u64 = 0;
    let mut shift = 0;
    loop {
        let Some(&c) = input.get(*pos) else {
            return Err(SourceMapError::Truncated);
        };
        let digit = digit_value(c).ok_or(SourceMapError::InvalidBase64(c as char))?;
        *pos += 1;
        if shift > 60 {
            return Err(SourceMapError::Overflow);
        }
        result |= ((digit & MASK) as u64) << shift;
        shift += 5;
        if digit & CONTINUATION == 0 {
            break;
        }
    }
    let magnitude = (result >> 1) as i64;
    Ok(if result & 1 == 1 { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: i64) -> String {
        let mut out = String::new();
        encode(value, &mut out);
        out
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(encoded(0), "A");
        assert_eq!(encoded(1), "C");
        assert_eq!(encoded(-1), "D");
        assert_eq!(encoded(15), "e");
        assert_eq!(encoded(16), "gB");
        assert_eq!(encoded(-1000), "x+B");
    }

    #[test]
    fn test_decode_sequence() {
        let input = b"AAgBC";
        let mut pos = 0;
        let values: Vec<i64> = std::iter::from_fn(|| (pos < input.len()).then(|| decode(input, &mut pos).unwrap())).collect();
        assert_eq!(values, vec![0, 0, 16, 1]);
    }

    #[test]
    fn test_decode_errors() {
        let mut pos = 0;
        assert!(matches!(decode(b"g", &mut pos), Err(SourceMapError::Truncated)));
        let mut pos = 0;
        assert!(matches!(decode(b"!", &mut pos), Err(SourceMapError::InvalidBase64('!'))));
    }
}
