//! Text decoding for archive entries and Unicode normalization of the parsed book.

use unicode_normalization::UnicodeNormalization;

use crate::document::Book;
use crate::structured::{ImagePlaceholder, UNIT_SEPARATOR};

/// Decode entry bytes as text. Handles UTF-8 and UTF-16 byte order marks;
/// anything else is read as UTF-8 with invalid sequences replaced.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    String::from_utf8_lossy(bytes).into_owned()
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Collapse every run of whitespace into one space, keeping a single leading
/// or trailing space when the input had one.
pub fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Bring all human-readable text of a book into Unicode NFC. Archive paths,
/// including those inside image tokens, keep their original form.
pub fn normalize_book(book: &mut Book) {
    fn nfc(s: &str) -> String {
        s.nfc().collect()
    }

    book.title = nfc(&book.title);
    book.file_name = nfc(&book.file_name);
    if let Some(ref a) = book.author {
        book.author = Some(nfc(a));
    }
    if let Some(ref d) = book.description {
        book.description = Some(nfc(d));
    }
    for chapter in &mut book.chapters {
        if let Some(ref t) = chapter.title {
            chapter.title = Some(nfc(t));
        }
        chapter.body = chapter
            .body
            .split(UNIT_SEPARATOR)
            .map(|unit| match ImagePlaceholder::parse(unit) {
                Some(_) => unit.to_string(),
                None => nfc(unit),
            })
            .collect::<Vec<_>>()
            .join(UNIT_SEPARATOR);
    }
    for entry in &mut book.toc {
        entry.title = nfc(&entry.title);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_bom() {
        let with_bom = [0xEF, 0xBB, 0xBF, b'H', b'i'];
        assert_eq!(decode_text(&with_bom), "Hi");
    }

    #[test]
    fn test_utf16_le() {
        let bytes = [0xFF, 0xFE, b'O', 0, b'K', 0];
        assert_eq!(decode_text(&bytes), "OK");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        assert_eq!(decode_text(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), " a b ");
        assert_eq!(collapse_whitespace("plain"), "plain");
    }

    #[test]
    fn test_normalize_book_composes_accents() {
        let mut book = Book {
            file_name: "Cafe\u{301}".into(),
            title: "Cafe\u{301}".into(),
            author: None,
            description: None,
            cover: None,
            chapters: vec![crate::document::Chapter {
                path: "c.xhtml".into(),
                title: None,
                body: "e\u{301}\n\n".into(),
                ordinal: 0,
            }],
            images: Vec::new(),
            toc: Vec::new(),
        };
        normalize_book(&mut book);
        assert_eq!(book.title, "Caf\u{e9}");
        assert_eq!(book.chapters[0].body, "\u{e9}\n\n");
    }

    #[test]
    fn test_normalize_book_keeps_token_paths() {
        let token = "<img src=\"img/cafe\u{301}.png\" yrel=\"1.00\">";
        let mut book = Book {
            file_name: "b".into(),
            title: "b".into(),
            author: None,
            description: None,
            cover: None,
            chapters: vec![crate::document::Chapter {
                path: "c.xhtml".into(),
                title: None,
                body: format!("Cafe\u{301}\n\n{token}\n\nline e\u{301}\nnext\n\n"),
                ordinal: 0,
            }],
            images: Vec::new(),
            toc: Vec::new(),
        };
        normalize_book(&mut book);
        assert_eq!(
            book.chapters[0].body,
            format!("Caf\u{e9}\n\n{token}\n\nline \u{e9}\nnext\n\n")
        );
    }
}
