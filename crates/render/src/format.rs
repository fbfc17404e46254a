//! Cell formatting and text measurement.
//!
//! Widths are estimated from the Helvetica metrics in coarse character
//! classes. That is precise enough to truncate cells and wrap paragraphs
//! without embedding font programs.

use reports::{Scalar, SummaryValue};

/// Thousands separators on an unsigned digit string.
fn group_digits(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `1234567` → `1,234,567`
pub fn format_int(n: i64) -> String {
    let grouped = group_digits(&n.unsigned_abs().to_string());
    if n < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// `1234.5` → `1,234.50`
pub fn format_decimal(n: f64) -> String {
    if !n.is_finite() {
        return "N/A".to_owned();
    }
    let fixed = format!("{:.2}", n.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let negative = n < 0.0 && fixed != "0.00";
    format!(
        "{}{}.{}",
        if negative { "-" } else { "" },
        group_digits(int_part),
        frac_part
    )
}

/// Detail-table cell text. Null renders blank.
pub fn format_scalar(value: &Scalar) -> String {
    match value {
        Scalar::Null => String::new(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Int(n) => format_int(*n),
        Scalar::Float(n) => format_decimal(*n),
        Scalar::Text(s) => s.clone(),
    }
}

/// Summary-table cell text.
pub fn format_summary(value: &SummaryValue) -> String {
    match value {
        SummaryValue::Number(n) => format_decimal(*n),
        SummaryValue::Count(n) => format_int(i64::try_from(*n).unwrap_or(i64::MAX)),
        SummaryValue::NotAvailable => "N/A".to_owned(),
        SummaryValue::Groups(groups) => match groups.first() {
            Some(top) => format!("{} ({})", top.value, format_int(top.count as i64)),
            None => "N/A".to_owned(),
        },
    }
}

/// Advance width of `c` in Helvetica, in ems.
fn char_width(c: char) -> f32 {
    match c {
        'i' | 'j' | 'l' | '\'' | '|' | '!' | '.' | ',' | ':' | ';' => 0.278,
        ' ' | 'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '/' | '-' => 0.333,
        'm' | 'M' | 'W' => 0.833,
        'w' => 0.722,
        '0'..='9' => 0.556,
        'A'..='Z' => 0.667,
        'a'..='z' => 0.556,
        _ => 0.6,
    }
}

/// Estimated width of `text` set at `size` points.
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().map(char_width).sum::<f32>() * size
}

/// Cut `text` so it fits in `max_width`, marking the cut with `...`.
pub fn truncate_to_width(text: &str, max_width: f32, size: f32) -> String {
    if text_width(text, size) <= max_width {
        return text.to_owned();
    }
    let ellipsis = "...";
    let budget = max_width - text_width(ellipsis, size);
    let mut out = String::new();
    let mut used = 0.0;
    for c in text.chars() {
        let w = char_width(c) * size;
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push_str(ellipsis);
    out
}

/// Greedy word wrap. Words longer than a line are truncated.
pub fn wrap(text: &str, max_width: f32, size: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.to_owned()
        } else {
            format!("{line} {word}")
        };
        if text_width(&candidate, size) <= max_width {
            line = candidate;
            continue;
        }
        if !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        line = truncate_to_width(word, max_width, size);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Encode for the standard fonts' WinAnsiEncoding. Characters outside it
/// become `?`; control characters become spaces.
pub fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '\u{20ac}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            c if c.is_control() => b' ',
            _ => b'?',
        })
        .collect()
}
