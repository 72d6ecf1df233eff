//! reStructuredText (Sphinx) field lists: `:param [type] name: description`.

use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

use super::epytext::tagged;
use super::{first_line_where, Convention, DocstringParser};

// `:param int count: ...` carries an inline type before the name
static RE_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^:param\s+(?:[^:]*\s)?\*{0,2}(\w+)\s*:\s*(.*)$").unwrap()
});

static RE_RETURN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:returns?\s*:\s*(.*)$").unwrap());

pub struct RestParser;

impl DocstringParser for RestParser {
    fn convention(&self) -> Convention {
        Convention::Rest
    }

    fn summary_line(&self, doc: &str) -> Option<String> {
        first_line_where(doc, |line| !line.starts_with(':'))
    }

    fn documented_args(&self, doc: &str) -> IndexMap<String, String> {
        tagged(doc, &RE_PARAM, ':')
            .into_iter()
            .filter_map(|(name, text)| name.map(|name| (name, text)))
            .collect()
    }

    fn documented_return(&self, doc: &str) -> Option<String> {
        tagged(doc, &RE_RETURN, ':')
            .into_iter()
            .map(|(_, text)| text)
            .next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "Send a message.

:param recipient: Address to deliver to.
:param int retries: How often to retry:
    0 disables retries.
:type recipient: str
:returns: Delivery receipt.
:rtype: Receipt";

    #[test]
    fn summary_skips_fields() {
        assert_eq!(RestParser.summary_line(DOC).as_deref(), Some("Send a message."));
    }

    #[test]
    fn typed_params_drop_the_type() {
        let args = RestParser.documented_args(DOC);
        assert_eq!(args["recipient"], "Address to deliver to.");
        assert_eq!(args["retries"], "How often to retry: 0 disables retries.");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn returns_field() {
        assert_eq!(
            RestParser.documented_return(DOC).as_deref(),
            Some("Delivery receipt.")
        );
        assert_eq!(RestParser.documented_return(":rtype: int"), None);
    }
}
