//! NumPy style: underlined `Parameters` / `Returns` sections.
//!
//! ```text
//! Parameters
//! ----------
//! name : type
//!     description
//! ```

use indexmap::IndexMap;

use super::{indent_of, is_rule, join_words, Convention, DocstringParser};

pub struct NumpyParser;

impl DocstringParser for NumpyParser {
    fn convention(&self) -> Convention {
        Convention::Numpydoc
    }

    fn summary_line(&self, doc: &str) -> Option<String> {
        let lines: Vec<&str> = doc.lines().collect();
        let headers: Vec<usize> = (0..lines.len()).filter(|&i| is_header(&lines, i)).collect();
        lines
            .iter()
            .enumerate()
            .find(|(i, line)| !line.trim().is_empty() && !is_rule(line) && !headers.contains(i))
            .map(|(_, line)| line.trim().to_string())
    }

    fn documented_args(&self, doc: &str) -> IndexMap<String, String> {
        let mut args = IndexMap::new();
        for (head, body) in entries(doc, "Parameters") {
            let names = head.split_once(':').map_or(head, |(names, _)| names);
            let description = join_words(body.iter().copied());
            for name in names.split(',') {
                let name = name.trim().trim_start_matches('*');
                if !name.is_empty() {
                    args.insert(name.to_string(), description.clone());
                }
            }
        }
        args
    }

    fn documented_return(&self, doc: &str) -> Option<String> {
        let (head, body) = entries(doc, "Returns").into_iter().next()?;
        // a lone line is the description itself; otherwise it names the type
        let text = if body.is_empty() {
            head.to_string()
        } else {
            join_words(body.iter().copied())
        };
        (!text.is_empty()).then_some(text)
    }
}

/// A line that is exactly a section word followed by a dash rule.
fn is_header(lines: &[&str], i: usize) -> bool {
    let word = lines[i].trim();
    !word.is_empty()
        && !is_rule(word)
        && lines.get(i + 1).is_some_and(|next| is_rule(next))
}

/// `(entry line, description lines)` pairs of the section titled `title`.
///
/// Entry lines sit at the section's base indentation; deeper lines describe
/// the entry above them. The section ends at the next header.
fn entries<'d>(doc: &'d str, title: &str) -> Vec<(&'d str, Vec<&'d str>)> {
    let lines: Vec<&str> = doc.lines().collect();
    let Some(start) = (0..lines.len()).find(|&i| lines[i].trim() == title && is_header(&lines, i))
    else {
        return Vec::new();
    };

    let mut found: Vec<(&str, Vec<&str>)> = Vec::new();
    let mut base: Option<usize> = None;
    for i in start + 2..lines.len() {
        let line = lines[i];
        if line.trim().is_empty() {
            continue;
        }
        if is_header(&lines, i) {
            break;
        }
        let indent = indent_of(line);
        let level = *base.get_or_insert(indent);
        if indent < level {
            break;
        }
        if indent == level {
            found.push((line.trim(), Vec::new()));
        } else if let Some((_, body)) = found.last_mut() {
            body.push(line.trim());
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "Train a model.

Parameters
----------
epochs : int
    Number of passes over the data.
    Must be positive.
lr, momentum : float
    Optimiser settings.
verbose : bool
Returns
-------
float
    Final validation loss.

Notes
-----
Parameters are validated first.";

    #[test]
    fn summary_ignores_section_headers() {
        assert_eq!(NumpyParser.summary_line(DOC).as_deref(), Some("Train a model."));
        assert_eq!(
            NumpyParser
                .summary_line("Parameters\n----------\nx : int\n")
                .as_deref(),
            Some("x : int")
        );
    }

    #[test]
    fn parameters_section() {
        let args = NumpyParser.documented_args(DOC);
        assert_eq!(
            args["epochs"],
            "Number of passes over the data. Must be positive."
        );
        assert_eq!(args["lr"], "Optimiser settings.");
        assert_eq!(args["momentum"], "Optimiser settings.");
        assert_eq!(args["verbose"], "");
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn header_word_without_rule_is_text() {
        let doc = "Summary.\n\nParameters\nare described elsewhere.";
        assert!(NumpyParser.documented_args(doc).is_empty());
    }

    #[test]
    fn header_word_inside_a_description_does_not_open_a_section() {
        let doc = "Summary.\n\nParameters\n----------\nx : int\n    See Returns below.\n";
        let args = NumpyParser.documented_args(doc);
        assert_eq!(args["x"], "See Returns below.");
        assert_eq!(NumpyParser.documented_return(doc), None);
    }

    #[test]
    fn returns_section_prefers_description() {
        assert_eq!(
            NumpyParser.documented_return(DOC).as_deref(),
            Some("Final validation loss.")
        );
        assert_eq!(
            NumpyParser
                .documented_return("S.\n\nReturns\n-------\nthe answer")
                .as_deref(),
            Some("the answer")
        );
    }
}
