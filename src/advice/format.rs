//! Normalisation of free-text recommendations into fixed bullet sections.
//!
//! The pipeline is purely textual: strip markup, unify dashes and bullet
//! markers, collapse blank runs, then bucket lines under the known Vietnamese
//! headings. Heading matching is a case-insensitive prefix test against
//! [`SectionKind::ORDER`]; the first heading that matches wins. Only
//! unmarked lines can be headings: `1. Tóm tắt AI` is a bullet in the
//! current section.

use super::domain::{FormattedAdvice, Section, SectionKind};

/// Uniform bullet glyph used in cleaned and rendered text.
pub const BULLET: char = '•';

const DASHES: [char; 7] = [
    '\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2015}', '\u{2212}',
];
const BULLET_MARKERS: [char; 7] = ['-', '*', '+', '•', '●', '▪', '·'];

fn strip_markup(line: &str) -> String {
    let line = line.replace("**", "").replace("__", "").replace('`', "");
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        trimmed.trim_start_matches('#').trim_start().to_string()
    } else {
        line
    }
}

fn normalize_dashes(line: &str) -> String {
    line.chars()
        .map(|c| if DASHES.contains(&c) { '-' } else { c })
        .collect()
}

/// Text after a leading bullet marker, if the line carries one.
///
/// Markers must be followed by whitespace or end the line, so `-5` or `1.5`
/// stay ordinary text.
fn split_bullet(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let first = trimmed.chars().next()?;

    let after_marker = if BULLET_MARKERS.contains(&first) {
        &trimmed[first.len_utf8()..]
    } else if first.is_ascii_digit() {
        let digits = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        if digits > 2 {
            return None;
        }
        let rest = &trimmed[digits..];
        rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?
    } else {
        return None;
    };

    match after_marker.chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() => Some(after_marker.trim()),
        Some(_) => None,
    }
}

/// Case-insensitive `strip_prefix` that respects char boundaries.
fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut rest = text.char_indices();
    for expected in prefix.chars() {
        let (_, actual) = rest.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    match rest.next() {
        Some((idx, _)) => Some(&text[idx..]),
        None => Some(""),
    }
}

fn match_heading(line: &str) -> Option<(SectionKind, &str)> {
    let line = line.trim();
    SectionKind::ORDER.iter().find_map(|kind| {
        strip_prefix_ci(line, kind.heading()).map(|rest| {
            let rest = rest.trim_start_matches(|c: char| c == ':' || c == '-' || c.is_whitespace());
            (*kind, rest.trim_end())
        })
    })
}

/// Clean raw provider text: markup stripped, dashes and bullets unified,
/// blank-line runs collapsed to a single empty line.
pub fn clean_text(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in raw.lines() {
        let line = normalize_dashes(&strip_markup(line));
        let line = match split_bullet(&line) {
            Some("") => String::new(),
            Some(text) => format!("{BULLET} {text}"),
            None => line.trim_end().to_string(),
        };

        let blank = line.trim().is_empty();
        let prev_blank = lines.last().map_or(true, |l| l.is_empty());
        if blank && prev_blank {
            continue;
        }
        lines.push(if blank { String::new() } else { line });
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Split provider text into the fixed sections, in fixed order.
pub fn format_advice(raw: &str) -> FormattedAdvice {
    let cleaned = clean_text(raw);
    let mut buckets: Vec<Vec<String>> = vec![Vec::new(); SectionKind::ORDER.len()];
    let mut current = 0;

    for line in cleaned.lines().filter(|l| !l.trim().is_empty()) {
        if let Some(text) = split_bullet(line) {
            if !text.is_empty() {
                buckets[current].push(text.to_string());
            }
            continue;
        }
        match match_heading(line) {
            Some((kind, rest)) => {
                current = SectionKind::ORDER
                    .iter()
                    .position(|k| *k == kind)
                    .unwrap_or(0);
                if !rest.is_empty() {
                    buckets[current].push(rest.to_string());
                }
            }
            None => buckets[current].push(line.trim().to_string()),
        }
    }

    let sections = SectionKind::ORDER
        .iter()
        .zip(buckets)
        .filter(|(_, bullets)| !bullets.is_empty())
        .map(|(kind, bullets)| Section {
            kind: *kind,
            heading: kind.heading(),
            bullets,
        })
        .collect();
    FormattedAdvice { sections }
}

impl FormattedAdvice {
    /// Plain-text layout: heading line, `• bullet` lines, blank line between sections.
    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(|section| {
                let mut block = section.heading.to_string();
                for bullet in &section.bullets {
                    block.push('\n');
                    block.push(BULLET);
                    block.push(' ');
                    block.push_str(bullet);
                }
                block
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
