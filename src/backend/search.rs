use regex::{Regex, RegexBuilder};

use crate::model::Entry;

/// Performable entries whose title fuzzily matches `pattern`, in menu order.
/// Submenus are searched through, never matched themselves.
pub fn search<'a>(entries: &'a [Entry], pattern: &str) -> Vec<&'a Entry> {
    let mut found = Vec::new();
    if pattern.is_empty() {
        return found;
    }

    let regex = match fuzzy_regex(pattern) {
        Ok(regex) => regex,
        Err(e) => {
            log::error!("Cannot build search pattern for {:?}: {}", pattern, e);
            return found;
        }
    };
    collect(entries, &regex, &mut found);
    found
}

pub fn matches(title: &str, pattern: &str) -> bool {
    fuzzy_regex(pattern)
        .map(|regex| regex.is_match(title))
        .unwrap_or(false)
}

fn collect<'a>(entries: &'a [Entry], regex: &Regex, found: &mut Vec<&'a Entry>) {
    for entry in entries {
        if let Some(children) = entry.children() {
            collect(children, regex, found);
            continue;
        }
        if entry.is_performable() && regex.is_match(entry.title()) {
            found.push(entry);
        }
    }
}

/// Every pattern character must appear in order, either right after a word
/// boundary or anywhere further on. Non-alphanumerics become `\x{..}` literals.
fn fuzzy_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut source = String::from("(?s)");
    for c in pattern.chars() {
        let literal = if c.is_alphanumeric() {
            c.to_string()
        } else {
            format!(r"\x{{{:x}}}", c as u32)
        };
        source.push_str(&format!("(?:.*\\b{0}|.*{0})", literal));
    }
    RegexBuilder::new(&source).case_insensitive(true).build()
}
