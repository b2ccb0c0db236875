//! Terminal escape sequence stripping.
//!
//! CI logs carry colour codes, cursor movement and window-title updates that
//! are noise once a line has been stored. The stripper recognises:
//!
//! - CSI sequences: `ESC [` parameters (`0-9 ; : ? space`) and one optional final letter
//! - OSC sequences: `ESC ]` up to BEL or `ESC \`
//! - DCS, SOS, PM and APC strings: `ESC P|X|^|_` up to `ESC \`
//! - any other character after ESC, consumed together with the ESC
//!
//! Truncated sequences at the end of input are consumed silently. The output
//! never contains an ESC byte, so stripping is idempotent.
//!
//! Returns `Cow::Borrowed` when the input holds no ESC byte (zero allocation).

use memchr::memchr;
use std::borrow::Cow;

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

/// Strip terminal escape sequences from text
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let Some(first) = memchr(ESC, bytes) else {
        return Cow::Borrowed(text);
    };

    let mut output = String::with_capacity(text.len());
    let mut pos = 0;
    let mut esc = first;

    // Every cut lands right after an ASCII byte or a whole scalar, so the
    // slices below always sit on char boundaries.
    loop {
        output.push_str(&text[pos..esc]);
        pos = sequence_end(bytes, esc);
        match memchr(ESC, &bytes[pos..]) {
            Some(offset) => esc = pos + offset,
            None => {
                output.push_str(&text[pos..]);
                break;
            }
        }
    }

    Cow::Owned(output)
}

/// Strip terminal escape sequences from raw bytes
pub fn strip_ansi_bytes(input: &[u8]) -> Cow<'_, [u8]> {
    let Some(first) = memchr(ESC, input) else {
        return Cow::Borrowed(input);
    };

    let mut output = Vec::with_capacity(input.len());
    let mut pos = 0;
    let mut esc = first;

    loop {
        output.extend_from_slice(&input[pos..esc]);
        pos = sequence_end(input, esc);
        match memchr(ESC, &input[pos..]) {
            Some(offset) => esc = pos + offset,
            None => {
                output.extend_from_slice(&input[pos..]);
                break;
            }
        }
    }

    Cow::Owned(output)
}

/// Index one past the escape sequence that starts at `esc`
fn sequence_end(bytes: &[u8], esc: usize) -> usize {
    let len = bytes.len();
    let mut i = esc + 1;
    if i >= len {
        // Lone ESC at end of input
        return len;
    }

    match bytes[i] {
        b'[' => {
            i += 1;
            while i < len && is_csi_parameter(bytes[i]) {
                i += 1;
            }
            if i < len && bytes[i].is_ascii_alphabetic() {
                i += 1;
            }
            i
        }
        b']' => {
            i += 1;
            while i < len {
                match bytes[i] {
                    BEL => return i + 1,
                    ESC if bytes.get(i + 1) == Some(&b'\\') => return i + 2,
                    _ => i += 1,
                }
            }
            len
        }
        b'P' | b'X' | b'^' | b'_' => string_terminator_end(bytes, i + 1),
        lead => (i + utf8_width(lead)).min(len),
    }
}

/// Find the end of an `ESC \` terminated control string starting at `from`
fn string_terminator_end(bytes: &[u8], mut from: usize) -> usize {
    while let Some(offset) = memchr(ESC, &bytes[from..]) {
        let esc = from + offset;
        if bytes.get(esc + 1) == Some(&b'\\') {
            return esc + 2;
        }
        from = esc + 1;
    }
    bytes.len()
}

fn is_csi_parameter(byte: u8) -> bool {
    byte.is_ascii_digit() || matches!(byte, b';' | b':' | b'?' | b' ')
}

fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_text_is_borrowed() {
        let input = "Plain text without escapes";
        match strip_ansi(input) {
            Cow::Borrowed(s) => assert_eq!(s, input),
            Cow::Owned(_) => panic!("Should not have allocated"),
        }
    }

    #[test]
    fn test_colour_codes() {
        assert_eq!(strip_ansi("\x1b[31mred text\x1b[0m"), "red text");
        assert_eq!(strip_ansi("\x1b[1;31;40mbold red on black\x1b[0m"), "bold red on black");
        assert_eq!(
            strip_ansi("mixed \x1b[31mred\x1b[0m and \x1b[32mgreen\x1b[0m text"),
            "mixed red and green text"
        );
    }

    #[test]
    fn test_cursor_control() {
        assert_eq!(strip_ansi("\x1b[2J\x1b[H\x1b[31mcomplex\x1b[0m"), "complex");
        assert_eq!(strip_ansi("\x1b[?25lhidden cursor\x1b[?25h"), "hidden cursor");
    }

    #[test]
    fn test_osc_sequences() {
        assert_eq!(strip_ansi("\x1b]0;title\x07content"), "content");
        assert_eq!(strip_ansi("\x1b]0;title\x1b\\content"), "content");
        assert_eq!(
            strip_ansi("\x1b]8;;https://example.com\x07Link\x1b]8;;\x07"),
            "Link"
        );
    }

    #[test]
    fn test_control_strings() {
        assert_eq!(strip_ansi("\x1bP+q544e\x1b\\dcs"), "dcs");
        assert_eq!(strip_ansi("\x1b_bk;t=123\x1b\\after"), "after");
        assert_eq!(strip_ansi("\x1bXsos \x1b payload\x1b\\tail"), "tail");
    }

    #[test]
    fn test_truncated_sequences() {
        assert_eq!(strip_ansi(""), "");
        assert_eq!(strip_ansi("\x1b"), "");
        assert_eq!(strip_ansi("\x1b["), "");
        assert_eq!(strip_ansi("\x1b[31"), "");
        assert_eq!(strip_ansi("text\x1b]0;never closed"), "text");
        assert_eq!(strip_ansi("text\x1bPunterminated"), "text");
    }

    #[test]
    fn test_simple_escape_consumes_one_character() {
        assert_eq!(strip_ansi("a\x1bMb"), "ab");
        assert_eq!(strip_ansi("a\x1b\u{e9}b"), "ab");
    }

    #[test]
    fn test_real_world_line() {
        assert_eq!(
            strip_ansi("real world \x1b[90m[2023-01-01 12:00:00]\x1b[0m \x1b[32m\u{2713}\x1b[0m test passed"),
            "real world [2023-01-01 12:00:00] \u{2713} test passed"
        );
    }

    #[test]
    fn test_bytes_variant_matches_text_variant() {
        let input = "\x1b[32mINFO\x1b[0m message \x1b]0;t\x07done";
        assert_eq!(
            strip_ansi_bytes(input.as_bytes()).as_ref(),
            strip_ansi(input).as_bytes()
        );
        assert!(matches!(strip_ansi_bytes(b"plain"), Cow::Borrowed(_)));
    }

    proptest! {
        #[test]
        fn prop_strip_is_idempotent(input in "(\\PC|\x1b|\x07|\\[|\\]|;|[0-9]|\\\\)*") {
            let once = strip_ansi(&input).into_owned();
            let twice = strip_ansi(&once).into_owned();
            prop_assert_eq!(&once, &twice);
            prop_assert!(!once.contains('\x1b'));
            prop_assert!(once.len() <= input.len());
        }

        #[test]
        fn prop_no_escape_means_unchanged(input in "[^\x1b]*") {
            prop_assert_eq!(strip_ansi(&input), Cow::Borrowed(input.as_str()));
        }

        #[test]
        fn prop_bytes_never_panic(input in proptest::collection::vec(any::<u8>(), 0..256)) {
            let stripped = strip_ansi_bytes(&input);
            prop_assert!(!stripped.contains(&ESC));
        }
    }
}
