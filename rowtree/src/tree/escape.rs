/// Standard markup escaping for text content.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attribute(text: &str) -> String {
    escape(text).replace('"', "&quot;")
}

/// Escaping that leaves existing entity references alone.
///
/// An ampersand that already starts a well-formed reference (`&amp;`,
/// `&#169;`, `&#x2014;`) or is followed by whitespace is copied through; any
/// other bare ampersand becomes `&amp;`. `<` and `>` are always escaped.
pub fn escape_lenient(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        match c {
            '&' => {
                let rest = &text[i + 1..];
                let passes = rest.starts_with(char::is_whitespace)
                    || entity_len(rest).is_some();
                out.push_str(if passes { "&" } else { "&amp;" });
            }
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Length of the entity body (`amp;`, `#169;`) at the start of `s`, if any.
fn entity_len(s: &str) -> Option<usize> {
    let end = s.find(';')?;
    let body = &s[..end];
    let valid = if let Some(num) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
        !num.is_empty() && num.chars().all(|c| c.is_ascii_hexdigit())
    } else if let Some(num) = body.strip_prefix('#') {
        !num.is_empty() && num.chars().all(|c| c.is_ascii_digit())
    } else {
        !body.is_empty()
            && body.len() <= 32
            && body.chars().all(|c| c.is_ascii_alphanumeric())
    };
    valid.then_some(end + 1)
}

/// Decode the predefined entities and numeric character references.
/// Unknown named entities are left as written.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let decoded = entity_len(tail).and_then(|len| {
            let body = &tail[..len - 1];
            let c = match body {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => {
                    if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
                    } else if let Some(dec) = body.strip_prefix('#') {
                        dec.parse::<u32>().ok().and_then(char::from_u32)
                    } else {
                        None
                    }
                }
            };
            c.map(|c| (c, len))
        });
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}
