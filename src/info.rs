//! INFO-level notices: broken links, pages missing from nav, and friends.
//!
//! These are not build failures, but they are what people usually want to
//! clean up after the warnings are gone. Single-line signatures live in an
//! ordered table; the missing-nav notice is a header followed by a bulleted
//! list and is handled separately.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

use crate::models::{InfoCategory, InfoMessage};

struct Signature {
    category: InfoCategory,
    pattern: Regex,
    extract: fn(InfoCategory, &Captures) -> InfoMessage,
}

fn link_notice(category: InfoCategory, caps: &Captures) -> InfoMessage {
    InfoMessage {
        category,
        file: caps[1].to_string(),
        target: Some(caps[2].to_string()),
        suggestion: caps.get(3).map(|m| m.as_str().to_string()),
    }
}

fn file_notice(category: InfoCategory, caps: &Captures) -> InfoMessage {
    InfoMessage::new(category, &caps[1])
}

static SIGNATURES: Lazy<Vec<Signature>> = Lazy::new(|| {
    let table: [(InfoCategory, &str, fn(InfoCategory, &Captures) -> InfoMessage); 4] = [
        (
            InfoCategory::BrokenLink,
            r"Doc file '([^']+)' contains a link '([^']+)', but the target (?:'[^']+' )?is not found",
            link_notice,
        ),
        (
            InfoCategory::AbsoluteLink,
            r"Doc file '([^']+)' contains an absolute link '([^']+)', it was left as is\.(?: Did you mean '([^']+)'\?)?",
            link_notice,
        ),
        (
            InfoCategory::UnrecognizedLink,
            r"Doc file '([^']+)' contains an unrecognized relative link '([^']+)', it was left as is\.(?: Did you mean '([^']+)'\?)?",
            link_notice,
        ),
        (
            InfoCategory::NoGitLogs,
            r"\[git-revision-date-localized-plugin\] '([^']+)' has no git logs",
            file_notice,
        ),
    ];
    table
        .into_iter()
        .map(|(category, pattern, extract)| Signature {
            category,
            pattern: Regex::new(pattern).expect("built-in pattern must compile"),
            extract,
        })
        .collect()
});

static MISSING_NAV_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"The following pages exist in the docs directory, but are not included in the .nav. configuration:")
        .expect("built-in pattern must compile")
});

static NAV_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*-\s+(\S.*)$").expect("built-in pattern must compile"));

/// Match a single line against the one-line notice signatures.
pub fn parse_info_line(line: &str) -> Option<InfoMessage> {
    SIGNATURES.iter().find_map(|sig| {
        sig.pattern
            .captures(line)
            .map(|caps| (sig.extract)(sig.category, &caps))
    })
}

/// Extract every notice from a window of lines, in order of appearance.
pub fn parse_info_messages(lines: &[String]) -> Vec<InfoMessage> {
    let mut messages = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = &lines[i];

        if MISSING_NAV_HEADER.is_match(line) {
            i += 1;
            while i < lines.len() {
                match NAV_LIST_ITEM.captures(&lines[i]) {
                    Some(caps) => {
                        messages.push(InfoMessage::new(
                            InfoCategory::MissingNav,
                            caps[1].trim(),
                        ));
                        i += 1;
                    }
                    None => break,
                }
            }
            continue;
        }

        if let Some(message) = parse_info_line(line) {
            messages.push(message);
        }
        i += 1;
    }

    messages
}

/// Group notices by category, preserving the order within each group.
pub fn group_info_messages(messages: &[InfoMessage]) -> BTreeMap<InfoCategory, Vec<InfoMessage>> {
    let mut groups: BTreeMap<InfoCategory, Vec<InfoMessage>> = BTreeMap::new();
    for message in messages {
        groups
            .entry(message.category)
            .or_default()
            .push(message.clone());
    }
    groups
}
