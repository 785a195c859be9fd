use bytes::BytesMut;
use tracing::trace;

/// Grow `buf` so its length is at least `target_len`.
///
/// Never shrinks and always preserves existing content. When the current
/// capacity already covers `target_len` the buffer is resized in place;
/// otherwise it is reallocated with `slack` extra bytes of headroom.
/// New bytes are zero-filled.
pub fn extend(buf: &mut BytesMut, target_len: usize, slack: usize) {
    let len = buf.len();
    if len >= target_len {
        return;
    }

    if buf.capacity() < target_len {
        trace!(
            capacity = buf.capacity(),
            target_len,
            slack,
            "reallocating codec buffer"
        );
        buf.reserve(target_len.saturating_add(slack) - len);
    }
    buf.resize(target_len, 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_shrinks() {
        let mut buf = BytesMut::from(&b"abcdef"[..]);
        extend(&mut buf, 2, 16);
        assert_eq!(buf.as_ref(), b"abcdef");
    }

    #[test]
    fn grows_in_place_when_capacity_suffices() {
        let mut buf = BytesMut::with_capacity(64);
        buf.extend_from_slice(b"xy");
        let before = buf.capacity();

        extend(&mut buf, 10, 1024);

        assert_eq!(buf.len(), 10);
        assert_eq!(buf.capacity(), before);
        assert_eq!(&buf[..2], b"xy");
        assert!(buf[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn reallocates_with_slack() {
        let mut buf = BytesMut::from(&b"head"[..]);
        extend(&mut buf, 100, 50);

        assert_eq!(buf.len(), 100);
        assert!(buf.capacity() >= 150);
        assert_eq!(&buf[..4], b"head");
    }
}
