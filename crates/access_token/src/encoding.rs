use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};

pub(crate) fn b64e(bytes: &[u8]) -> String {
    Base64UrlUnpadded::encode_string(bytes)
}

pub(crate) fn b64d(s: &str) -> Option<Vec<u8>> {
    Base64UrlUnpadded::decode_vec(s).ok()
}

pub(crate) fn b64e_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(b64e(&json))
}

pub(crate) fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Option<T> {
    let bytes = b64d(s)?;
    serde_json::from_slice(&bytes).ok()
}

/// Split a compact token into `(header, payload, signature)`.
///
/// Anything after the second dot belongs to the signature segment, so a
/// damaged signature is reported as a signature problem rather than a
/// structural one.
pub(crate) fn split_compact(token: &str) -> Option<(&str, &str, &str)> {
    let mut parts = token.splitn(3, '.');
    let header = parts.next()?;
    let payload = parts.next()?;
    let signature = parts.next()?;
    if header.is_empty() || payload.is_empty() {
        return None;
    }
    Some((header, payload, signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_compact_requires_three_segments() {
        assert_eq!(split_compact("a.b.c"), Some(("a", "b", "c")));
        assert_eq!(split_compact("a.b.c.d"), Some(("a", "b", "c.d")));
        assert_eq!(split_compact("a.b"), None);
        assert_eq!(split_compact(".b.c"), None);
        assert_eq!(split_compact(""), None);
    }

    #[test]
    fn b64d_rejects_padding_and_garbage() {
        assert_eq!(b64d(&b64e(b"hello")).as_deref(), Some(b"hello".as_slice()));
        assert!(b64d("aGVsbG8=").is_none());
        assert!(b64d("***").is_none());
    }
}
