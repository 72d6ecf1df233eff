//! Epytext: `@param name: description` and `@return: description` tags.

use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

use super::{first_line_where, join_words, Convention, DocstringParser};

static RE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@param\s+\*{0,2}(\w+)\s*:\s*(.*)$").unwrap());

static RE_RETURN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@returns?\s*:\s*(.*)$").unwrap());

pub struct EpytextParser;

impl DocstringParser for EpytextParser {
    fn convention(&self) -> Convention {
        Convention::Epytext
    }

    fn summary_line(&self, doc: &str) -> Option<String> {
        first_line_where(doc, |line| !line.starts_with('@'))
    }

    fn documented_args(&self, doc: &str) -> IndexMap<String, String> {
        tagged(doc, &RE_PARAM, '@')
            .into_iter()
            .filter_map(|(name, text)| name.map(|name| (name, text)))
            .collect()
    }

    fn documented_return(&self, doc: &str) -> Option<String> {
        tagged(doc, &RE_RETURN, '@')
            .into_iter()
            .map(|(_, text)| text)
            .next()
    }
}

/// Lines matching `tag` together with their untagged continuation lines.
///
/// The first capture group, when the pattern has two, is the tag's name; the
/// last group opens the description.
pub(super) fn tagged(doc: &str, tag: &Regex, marker: char) -> Vec<(Option<String>, String)> {
    let mut found: Vec<(Option<String>, String)> = Vec::new();
    let mut open = false;
    for line in doc.lines().map(str::trim) {
        if let Some(caps) = tag.captures(line) {
            let groups = caps.len() - 1;
            let name = (groups > 1).then(|| caps[1].to_string());
            let text = caps.get(groups).map_or("", |m| m.as_str()).trim().to_string();
            found.push((name, text));
            open = true;
        } else if line.is_empty() || line.starts_with(marker) {
            open = false;
        } else if open {
            if let Some((_, text)) = found.last_mut() {
                *text = join_words([text.as_str(), line]);
            }
        }
    }
    found
}
