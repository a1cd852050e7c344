//! Text shaping for the overlay: whitespace folding, wrapping and ffmpeg escaping.

const ELLIPSIS: char = '…';

/// Characters a title line may break after.
fn is_break(ch: char) -> bool {
    ch.is_whitespace()
        || matches!(
            ch,
            '/' | '|' | '｜' | '・' | '、' | '。' | ',' | '.' | '-' | '–' | '—' | '_' | '#'
                | '(' | ')' | '[' | ']' | '【' | '】' | '「' | '」' | '『' | '』'
        )
}

pub fn normalize_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Shortens `s` to `max_chars` characters, ending in `…` when cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
    let s = normalize_spaces(s);

    if s.chars().count() <= max_chars {
        return s;
    }

    let mut out = s.chars().take(max_chars.saturating_sub(1)).collect::<String>();
    out.push(ELLIPSIS);

    out
}

/// Splits into runs of ordinary characters, each break character standing alone.
fn tokens(s: &str) -> Vec<String> {
    let mut tokens = vec![];
    let mut run = String::new();

    for ch in s.chars() {
        if is_break(ch) {
            if !run.is_empty() {
                tokens.push(std::mem::take(&mut run));
            }

            tokens.push(ch.to_string());
        } else {
            run.push(ch);
        }
    }

    if !run.is_empty() {
        tokens.push(run);
    }

    tokens
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn is_break_token(token: &str) -> bool {
    token.chars().all(is_break)
}

fn push_line(lines: &mut Vec<String>, line: &str) {
    let line = line.trim();

    if !line.is_empty() {
        lines.push(line.to_string());
    }
}

/// Wraps `s` into at most `max_lines` lines of at most `width` characters, preferring to
/// break at spaces and punctuation. A cut-off tail is marked with `…` on the last line.
pub fn smart_wrap(s: &str, width: usize, max_lines: usize) -> Vec<String> {
    let s = normalize_spaces(s);

    if s.is_empty() || width == 0 || max_lines == 0 {
        return vec![String::new()];
    }

    let mut lines: Vec<String> = vec![];
    let mut cur = String::new();
    let mut truncated = false;
    let mut tokens = tokens(&s).into_iter();

    while let Some(token) = tokens.next() {
        // no line starts with a break character
        if cur.is_empty() && is_break_token(&token) {
            continue;
        }

        if char_len(&cur) + char_len(&token) <= width {
            cur.push_str(&token);
            continue;
        }

        if !cur.trim().is_empty() {
            push_line(&mut lines, &cur);
            cur = if is_break_token(&token) {
                String::new()
            } else {
                token
            };
        } else {
            cur = token;
        }

        // a single token longer than a line is split hard
        while char_len(&cur) > width && lines.len() < max_lines {
            let head = cur.chars().take(width).collect::<String>();
            cur = cur.chars().skip(width).collect();
            push_line(&mut lines, &head);
        }

        if lines.len() >= max_lines {
            truncated = !cur.trim().is_empty() || tokens.any(|t| !is_break_token(&t));
            cur.clear();
            break;
        }
    }

    if !cur.trim().is_empty() {
        push_line(&mut lines, &cur);
    }

    if truncated {
        if let Some(last) = lines.last_mut() {
            if char_len(last) >= width {
                last.pop();
            }

            last.push(ELLIPSIS);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Escapes text for a single-quoted ffmpeg `drawtext` value.
pub fn ffmpeg_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
        .replace('%', "\\%")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

/// Escapes multi-line text, keeping line breaks as ffmpeg `\n`.
pub fn drawtext_text(s: &str) -> String {
    s.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .map(ffmpeg_escape)
        .collect::<Vec<_>>()
        .join("\\n")
}

/// Quotes a font path for use inside a filter graph.
pub fn quote_fontfile(path: &str) -> String {
    let escaped = path.replace('\\', "\\\\").replace(':', "\\:");

    format!("'{}'", escaped.replace('\'', "\\'"))
}
