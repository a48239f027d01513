enum Escape {
    Start,
    Csi,
    String,
    StringEsc,
}

pub fn sanitize_inline(input: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(input.len().min(max_chars));
    let mut esc: Option<Escape> = None;
    let mut count = 0usize;

    for c in input.chars() {
        if let Some(state) = esc.as_ref() {
            esc = match state {
                Escape::Start => match c {
                    '[' => Some(Escape::Csi),
                    ']' | 'P' | 'X' | '^' | '_' => Some(Escape::String),
                    _ => None,
                },
                Escape::Csi => (!('@'..='~').contains(&c)).then_some(Escape::Csi),
                Escape::String => match c {
                    '\x07' => None,
                    '\x1b' => Some(Escape::StringEsc),
                    _ => Some(Escape::String),
                },
                Escape::StringEsc => match c {
                    '\\' => None,
                    '\x1b' => Some(Escape::StringEsc),
                    _ => Some(Escape::String),
                },
            };
            continue;
        }

        let c = match c {
            '\x1b' => {
                esc = Some(Escape::Start);
                continue;
            }
            '\t' | '\n' | '\r' => ' ',
            c if c.is_control() || is_bidi_control(c) => continue,
            c => c,
        };

        if count == max_chars {
            out.push('…');
            break;
        }
        out.push(c);
        count += 1;
    }

    out
}

fn is_bidi_control(c: char) -> bool {
    matches!(c, '\u{061C}' | '\u{200E}' | '\u{200F}')
        || ('\u{202A}'..='\u{202E}').contains(&c)
        || ('\u{2066}'..='\u{2069}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::sanitize_inline;

    #[test]
    fn strips_color_and_title_sequences() {
        let got = sanitize_inline("svc \u{1b}[31mred\u{1b}[0m \u{1b}]0;title\u{7}ok", 64);
        assert_eq!(got, "svc red ok");
    }

    #[test]
    fn flattens_line_breaks_and_drops_bidi_overrides() {
        let got = sanitize_inline("a\tb\nc\u{202e}d", 64);
        assert_eq!(got, "a b cd");
    }

    #[test]
    fn caps_length_with_ellipsis() {
        assert_eq!(sanitize_inline("abcdef", 3), "abc…");
        assert_eq!(sanitize_inline("abc", 3), "abc");
    }
}
