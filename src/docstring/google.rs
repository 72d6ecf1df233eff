//! Google style: indented `Args:` / `Returns:` sections.
//!
//! ```text
//! Summary line.
//!
//! Args:
//!     name (type): description that may contain: colons
//!         and continue on deeper-indented lines
//!
//! Returns:
//!     type: description
//! ```

use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

use super::{first_line_where, indent_of, join_words, Convention, DocstringParser};

const ARG_HEADERS: [&str; 3] = ["Args:", "Arguments:", "Parameters:"];
const RETURN_HEADERS: [&str; 3] = ["Returns:", "Return:", "Yields:"];

static RE_TYPE_BRACKET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(.*?\)").unwrap());

static RE_SECTION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Za-z ]*:$").unwrap());

static RE_TYPED_RETURN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][\w.]*(?:\[[^\]]*\])?\s*:\s*(.*)$").unwrap()
});

pub struct GoogleParser;

impl DocstringParser for GoogleParser {
    fn convention(&self) -> Convention {
        Convention::Google
    }

    fn summary_line(&self, doc: &str) -> Option<String> {
        first_line_where(doc, |_| true)
    }

    fn documented_args(&self, doc: &str) -> IndexMap<String, String> {
        let mut args: IndexMap<String, String> = IndexMap::new();
        let Some(section) = section(doc, &ARG_HEADERS) else {
            return args;
        };

        let mut current: Option<String> = None;
        let base = section.first().map_or(0, |line| indent_of(line));
        for line in section {
            let entry = indent_of(line) <= base;
            match (entry, line.split_once(':')) {
                (true, Some((name, description))) => {
                    let name = RE_TYPE_BRACKET.replace_all(name, "").trim().to_string();
                    args.insert(name.clone(), description.trim().to_string());
                    current = Some(name);
                }
                _ => {
                    if let Some(text) = current.as_ref().and_then(|name| args.get_mut(name)) {
                        *text = join_words([text.as_str(), line]);
                    }
                }
            }
        }
        args
    }

    fn documented_return(&self, doc: &str) -> Option<String> {
        let section = section(doc, &RETURN_HEADERS)?;
        let text = join_words(section.iter().copied());
        let text = match RE_TYPED_RETURN.captures(&text) {
            Some(caps) => caps[1].to_string(),
            None => text,
        };
        (!text.is_empty()).then_some(text)
    }
}

/// Non-blank lines of the first section whose header line equals one of
/// `headers`.
///
/// An indented section ends at the first line indented no deeper than its
/// header. Entries written flush with the header run until a blank line or
/// the next header.
fn section<'d>(doc: &'d str, headers: &[&str]) -> Option<Vec<&'d str>> {
    let mut lines = doc.lines();
    let header = lines.by_ref().find(|line| headers.contains(&line.trim()))?;
    let header_indent = indent_of(header);
    let mut body = lines.skip_while(|line| line.trim().is_empty()).peekable();
    let flush = body.peek().is_some_and(|line| indent_of(line) == header_indent);
    Some(if flush {
        body.take_while(|line| !line.trim().is_empty() && !RE_SECTION_HEADER.is_match(line.trim()))
            .collect()
    } else {
        body.filter(|line| !line.trim().is_empty())
            .take_while(|line| indent_of(line) > header_indent)
            .collect()
    })
}
