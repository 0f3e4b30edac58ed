//! Text transforms for the serialized envelope.
//!
//! Two independent, layered transforms:
//!
//! - [`escape_string`] rewrites markup characters to entity references so
//!   text can sit inside element content. `]` is escaped too, because of the
//!   end-of-section sentinel in the envelope.
//! - [`slashify`] / [`unslashify`] escape control characters and spaces in
//!   machine tokens reversibly: `unslashify(slashify(s)) == s` for every
//!   string.
//!
//! On export, values go through `slashify` then `escape_string`; on import,
//! entity decoding ([`resolve_entity`], driven by the XML reader's reference
//! events) then [`unslashify`].

/// Entity replacement for one markup character, if it needs one.
#[must_use]
pub fn escape_char(c: char) -> Option<&'static str> {
    match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '\'' => Some("&apos;"),
        '"' => Some("&quot;"),
        '&' => Some("&amp;"),
        ']' => Some("&#93;"),
        _ => None,
    }
}

/// Escape markup characters for element content.
#[must_use]
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match escape_char(c) {
            Some(escaped) => out.push_str(escaped),
            None => out.push(c),
        }
    }
    out
}

/// Resolve an entity or character reference name (the text between `&` and
/// `;`) to the character it denotes.
///
/// Covers the five predefined entities and decimal/hex character references;
/// anything else is unknown and yields `None`.
#[must_use]
pub fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => {
            let digits = name.strip_prefix('#')?;
            let (digits, radix) = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => (hex, 16),
                None => (digits, 10),
            };
            char::from_u32(u32::from_str_radix(digits, radix).ok()?)
        }
    }
}

/// Escape control characters and spaces with backslash sequences.
#[must_use]
pub fn slashify(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 4);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\u{c}' => out.push_str("\\f"),
            ' ' => out.push_str("\\_"),
            _ => out.push(c),
        }
    }
    out
}

/// Exact inverse of [`slashify`].
///
/// An unknown escape sequence decodes to the escaped character itself; a
/// trailing lone backslash is kept as-is.
#[must_use]
pub fn unslashify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('f') => out.push('\u{c}'),
            Some('_') => out.push(' '),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
