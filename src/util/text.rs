use std::borrow::Cow;

fn is_stripped_control(c: char) -> bool {
    c == '\x7f' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'))
}

/// Strip C0 control characters (except tab, newline, CR), DEL, and ANSI
/// CSI/OSC escape sequences from feed-supplied text.
///
/// Returns `Cow::Borrowed` when there is nothing to strip.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(|c| c == '\x1b' || is_stripped_control(c)) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            match chars.peek() {
                // CSI: parameters run until a final byte in 0x40..=0x7E
                Some('[') => {
                    chars.next();
                    for p in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&p) {
                            break;
                        }
                    }
                }
                // OSC: terminated by BEL or ST (ESC \)
                Some(']') => {
                    chars.next();
                    while let Some(p) = chars.next() {
                        if p == '\x07' {
                            break;
                        }
                        if p == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            }
        } else if !is_stripped_control(c) {
            out.push(c);
        }
    }

    Cow::Owned(out)
}

/// Strip control characters, collapse runs of whitespace to a single space
/// and trim. Returns `None` when nothing printable is left.
pub fn clean_text(s: &str) -> Option<String> {
    let stripped = strip_control_chars(s);
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}
