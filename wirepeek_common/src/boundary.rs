//! Quoted-string boundary scanning
//!
//! All positions are char offsets. `"` and `'` are quote characters; a quote
//! preceded by an odd number of backslashes is escaped and never opens or
//! closes a string.

/// A closed quoted string, `end` exclusive (one past the closing quote)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringRange {
    pub start: usize,
    pub end: usize,
    pub quote: char,
}

impl StringRange {
    /// Containment with both bounds inclusive, as used for snapping
    fn touches(&self, position: usize) -> bool {
        position >= self.start && position <= self.end
    }
}

/// Scan the text left to right, returning every closed string in order
///
/// An unterminated trailing string is dropped.
pub fn scan_strings(text: &str) -> Vec<StringRange> {
    let chars: Vec<char> = text.chars().collect();
    let mut ranges = Vec::new();
    let mut open: Option<(usize, char)> = None;

    for (i, &ch) in chars.iter().enumerate() {
        if !is_quote(ch) || is_escaped(&chars, i) {
            continue;
        }
        match open {
            None => open = Some((i, ch)),
            Some((start, quote)) if quote == ch => {
                ranges.push(StringRange {
                    start,
                    end: i + 1,
                    quote,
                });
                open = None;
            }
            Some(_) => {}
        }
    }

    ranges
}

/// Boundary of the string containing `position`
///
/// Returns the range start (`find_start`) or end of the enclosing string, or
/// `0` / the text length when the position is not inside any string.
pub fn find_boundary(text: &str, position: usize, find_start: bool) -> usize {
    match enclosing_range(text, position) {
        Some(range) if find_start => range.start,
        Some(range) => range.end,
        None if find_start => 0,
        None => text.chars().count(),
    }
}

/// Whether `position` lies within `[start, end)` of some string
pub fn is_inside_string(text: &str, position: usize) -> bool {
    scan_strings(text)
        .iter()
        .any(|range| position >= range.start && position < range.end)
}

/// First string whose inclusive bounds contain `position`
pub fn enclosing_range(text: &str, position: usize) -> Option<StringRange> {
    scan_strings(text)
        .into_iter()
        .find(|range| range.touches(position))
}

/// Expand a selection outward so that any end touching a string covers it fully
///
/// Ends outside every string are left where they are.
pub fn snap_selection(text: &str, start: usize, end: usize) -> (usize, usize) {
    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    let ranges = scan_strings(text);

    let snapped_start = ranges
        .iter()
        .find(|range| range.touches(start))
        .map_or(start, |range| range.start);
    let snapped_end = ranges
        .iter()
        .find(|range| range.touches(end))
        .map_or(end, |range| range.end);

    (snapped_start, snapped_end)
}

fn is_quote(ch: char) -> bool {
    ch == '"' || ch == '\''
}

fn is_escaped(chars: &[char], position: usize) -> bool {
    let backslashes = chars[..position]
        .iter()
        .rev()
        .take_while(|&&c| c == '\\')
        .count();
    backslashes % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_simple_strings() {
        let ranges = scan_strings(r#"{"a": 'b'}"#);
        assert_eq!(
            ranges,
            vec![
                StringRange { start: 1, end: 4, quote: '"' },
                StringRange { start: 6, end: 9, quote: '\'' },
            ]
        );
    }

    #[test]
    fn test_other_quote_inside_string_is_literal() {
        let ranges = scan_strings(r#""it's" x"#);
        assert_eq!(ranges, vec![StringRange { start: 0, end: 6, quote: '"' }]);
    }

    #[test]
    fn test_escaped_quotes_do_not_toggle() {
        let text = r#"a \"b\" c"d""#;
        assert_eq!(scan_strings(text), vec![StringRange { start: 9, end: 12, quote: '"' }]);
        assert!(is_inside_string(text, 9));
        assert!(is_inside_string(text, 11));
        assert!(!is_inside_string(text, 12));
        assert!(!is_inside_string(text, 4));
    }

    #[test]
    fn test_double_backslash_is_not_an_escape() {
        // The quote after `\\` closes the string
        let text = r#""a\\" b"#;
        assert_eq!(scan_strings(text), vec![StringRange { start: 0, end: 5, quote: '"' }]);
    }

    #[test]
    fn test_unterminated_string_is_dropped() {
        assert!(scan_strings(r#""closed" "open"#).len() == 1);
        assert!(scan_strings("'").is_empty());
    }

    #[test]
    fn test_find_boundary() {
        let text = r#"key: "value" tail"#;
        assert_eq!(find_boundary(text, 8, true), 5);
        assert_eq!(find_boundary(text, 8, false), 12);
        // Inclusive at the quotes themselves
        assert_eq!(find_boundary(text, 5, true), 5);
        assert_eq!(find_boundary(text, 12, false), 12);
        // Outside every string
        assert_eq!(find_boundary(text, 1, true), 0);
        assert_eq!(find_boundary(text, 15, false), text.chars().count());
    }

    #[test]
    fn test_find_boundary_round_trip() {
        let text = r#"{"outer": "some value", "n": 1}"#;
        for p in 11..22 {
            let start = find_boundary(text, p, true);
            assert_eq!(start, 10);
            assert_eq!(find_boundary(text, start, false), 22);
        }
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(find_boundary("", 0, true), 0);
        assert_eq!(find_boundary("", 0, false), 0);
        assert_eq!(find_boundary("", 10, false), 0);
        assert!(!is_inside_string("", 0));
    }

    #[test]
    fn test_char_offsets_with_multibyte_text() {
        let text = r#"名字: "张三" ok"#;
        let ranges = scan_strings(text);
        assert_eq!(ranges, vec![StringRange { start: 4, end: 8, quote: '"' }]);
        assert_eq!(find_boundary(text, 6, false), 8);
    }

    #[test]
    fn test_snap_selection() {
        let text = r#"{"name": "alice", "age": 3}"#;
        // Partial selection inside "alice" snaps to the quotes
        assert_eq!(snap_selection(text, 11, 13), (9, 16));
        // Selection spanning two strings snaps both ends
        assert_eq!(snap_selection(text, 3, 12), (1, 16));
        // Ends outside strings stay put
        assert_eq!(snap_selection(text, 25, 26), (25, 26));
        // Reversed selections are normalized
        assert_eq!(snap_selection(text, 13, 11), (9, 16));
    }
}
