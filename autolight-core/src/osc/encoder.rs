//! OSC 1.0 single-float message codec.
//!
//! ## Wire format
//!
//! ```text
//! address:   ASCII, NUL-terminated, zero-padded to a multiple of 4
//! type tags: ",f\0\0"
//! argument:  f32, big-endian
//! ```

use bytes::{BufMut, Bytes, BytesMut};

const TYPE_TAG_FLOAT: &[u8; 4] = b",f\0\0";

/// Length of `s` plus its NUL terminator, rounded up to 4.
fn padded_len(len: usize) -> usize {
    (len + 1).div_ceil(4) * 4
}

fn put_padded_str(dst: &mut BytesMut, s: &str) {
    dst.put_slice(s.as_bytes());
    dst.put_bytes(0, padded_len(s.len()) - s.len());
}

/// Encode a message carrying one float argument.
pub fn encode_message(address: &str, value: f32) -> Bytes {
    let mut buf = BytesMut::with_capacity(padded_len(address.len()) + TYPE_TAG_FLOAT.len() + 4);
    put_padded_str(&mut buf, address);
    buf.put_slice(TYPE_TAG_FLOAT);
    buf.put_f32(value);
    buf.freeze()
}

/// Decode a message produced by [`encode_message`].
///
/// Returns `None` for anything that is not a well-formed single-float
/// message.
pub fn decode_message(data: &[u8]) -> Option<(String, f32)> {
    let nul = data.iter().position(|&b| b == 0)?;
    let address = std::str::from_utf8(&data[..nul]).ok()?;
    let tags_at = padded_len(nul);
    let arg_at = tags_at + TYPE_TAG_FLOAT.len();
    if data.len() != arg_at + 4 || &data[tags_at..arg_at] != TYPE_TAG_FLOAT {
        return None;
    }
    let arg: [u8; 4] = data[arg_at..].try_into().ok()?;
    Some((address.to_string(), f32::from_be_bytes(arg)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_layout() {
        let msg = encode_message("/avatar/parameters/AL_Red", 1.0);
        // 25 chars + NUL = 26, padded to 28.
        assert_eq!(msg.len(), 28 + 4 + 4);
        assert_eq!(&msg[..25], b"/avatar/parameters/AL_Red");
        assert_eq!(&msg[25..28], &[0, 0, 0]);
        assert_eq!(&msg[28..32], b",f\0\0");
        assert_eq!(&msg[32..], &[0x3F, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn address_on_word_boundary_gets_full_pad() {
        // 4 chars need a NUL, so a whole extra word.
        let msg = encode_message("/abc", -1.0);
        assert_eq!(&msg[..8], b"/abc\0\0\0\0");
        assert_eq!(&msg[12..], &(-1.0f32).to_be_bytes());
    }

    #[test]
    fn decode_accepts_own_output() {
        let msg = encode_message("/avatar/parameters/AL_Green", 0.004);
        assert_eq!(
            decode_message(&msg),
            Some(("/avatar/parameters/AL_Green".to_string(), 0.004))
        );
    }

    #[test]
    fn decode_rejects_malformed() {
        assert_eq!(decode_message(b""), None);
        assert_eq!(decode_message(b"/abc\0\0\0\0,i\0\0\0\0\0\x01"), None);
        assert_eq!(decode_message(b"/abc\0\0\0\0,f\0\0\0\0"), None);
    }
}
