//! Pure text transformations behind the file patch backend.
//!
//! Probes and backends share these functions, so what a probe reads back after a write is
//! exactly what the renderer meant to produce.
use crate::types::Separator;

fn is_comment(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with('#') || t.starts_with(';')
}

/// Split `line` into its key token and the remainder, or `None` for blank/comment lines.
fn key_token(line: &str) -> Option<(&str, &str)> {
    if is_comment(line) {
        return None;
    }
    let t = line.trim_start();
    if t.is_empty() {
        return None;
    }
    let end = t
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(t.len());
    Some((&t[..end], &t[end..]))
}

fn value_of(rest: &str) -> String {
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest);
    rest.trim().to_string()
}

/// Whitespace-separated files (sshd_config, login.defs) take keywords in any case;
/// `key = value` files are case-sensitive.
fn same_key(token: &str, key: &str, sep: Separator) -> bool {
    match sep {
        Separator::Whitespace => token.eq_ignore_ascii_case(key),
        Separator::Equals => token == key,
    }
}

/// Value of the first uncommented line whose key token is `key`.
#[must_use]
pub fn find_setting(text: &str, key: &str, sep: Separator) -> Option<String> {
    text.lines().find_map(|l| match key_token(l) {
        Some((k, rest)) if same_key(k, key, sep) => Some(value_of(rest)),
        _ => None,
    })
}

fn render_line(key: &str, sep: Separator, value: &str) -> String {
    match sep {
        Separator::Whitespace => format!("{key} {value}"),
        Separator::Equals => format!("{key} = {value}"),
    }
}

fn join(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Set `key` to `value`, or remove every occurrence of it when `value` is `None`.
///
/// The first uncommented occurrence is rewritten in place; later duplicates are dropped so
/// that tools reading either the first or the last occurrence agree. A missing key is
/// appended at the end.
#[must_use]
pub fn render_setting(text: &str, key: &str, sep: Separator, value: Option<&str>) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut placed = false;
    for l in text.lines() {
        match key_token(l) {
            Some((k, _)) if same_key(k, key, sep) => {
                if let (Some(v), false) = (value, placed) {
                    out.push(render_line(key, sep, v));
                }
                placed = true;
            }
            _ => out.push(l.to_string()),
        }
    }
    if let (Some(v), false) = (value, placed) {
        out.push(render_line(key, sep, v));
    }
    join(&out)
}

/// All lines selected by `matches`, in file order.
#[must_use]
pub fn matching_lines(text: &str, matches: impl Fn(&str) -> bool) -> Vec<String> {
    text.lines()
        .filter(|l| matches(l))
        .map(str::to_string)
        .collect()
}

/// Replace the set of lines selected by `matches` with `wanted`.
///
/// `wanted` is inserted where the first selected line was, or appended when nothing
/// matched. Unselected lines are kept verbatim and in order.
#[must_use]
pub fn render_lines(text: &str, matches: impl Fn(&str) -> bool, wanted: &[String]) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut inserted = false;
    for l in text.lines() {
        if matches(l) {
            if !inserted {
                out.extend(wanted.iter().cloned());
                inserted = true;
            }
        } else {
            out.push(l.to_string());
        }
    }
    if !inserted {
        out.extend(wanted.iter().cloned());
    }
    join(&out)
}
