//! Minimal element scanner for Jenkins `config.xml` documents
//!
//! Job configurations are edited in place: we locate the direct children of
//! an element by byte range and splice new text in, leaving everything we
//! do not touch byte-for-byte intact.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<(/)?([A-Za-z_][\w.:\-]*)(?:\s+[^>]*?)?\s*(/)?>").unwrap()
});

/// An element located in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Node {
    pub name: String,
    /// Whole element, from `<` of the start tag to `>` of the end tag
    pub span: Range<usize>,
    /// Content between the tags, `None` for `<empty/>` elements
    pub inner: Option<Range<usize>>,
}

impl Node {
    pub fn text<'a>(&self, doc: &'a str) -> &'a str {
        self.inner.as_ref().map_or("", |inner| &doc[inner.clone()])
    }
}

/// Position just after the end of a markup construct starting at `pos`,
/// for constructs that are not elements
fn skip_special(doc: &str, pos: usize) -> Option<Result<usize, String>> {
    let rest = &doc[pos..];
    let (opener, closer) = if rest.starts_with("<!--") {
        ("<!--", "-->")
    } else if rest.starts_with("<![CDATA[") {
        ("<![CDATA[", "]]>")
    } else if rest.starts_with("<?") {
        ("<?", "?>")
    } else if rest.starts_with("<!") {
        ("<!", ">")
    } else {
        return None;
    };
    Some(
        rest[opener.len()..]
            .find(closer)
            .map(|end| pos + opener.len() + end + closer.len())
            .ok_or_else(|| format!("unterminated '{opener}' at byte {pos}")),
    )
}

/// Direct child elements found in `doc[range]`
pub(crate) fn children(doc: &str, range: Range<usize>) -> Result<Vec<Node>, String> {
    let mut nodes = Vec::new();
    let mut stack: Vec<(String, usize, usize)> = Vec::new();
    let mut pos = range.start;

    while let Some(offset) = doc[pos..range.end].find('<') {
        let start = pos + offset;
        if let Some(skipped) = skip_special(doc, start) {
            pos = skipped?;
            continue;
        }

        let caps = TAG
            .captures(&doc[start..range.end])
            .ok_or_else(|| format!("malformed tag at byte {start}"))?;
        let end = start + caps[0].len();
        let name = caps[2].to_string();
        let closing = caps.get(1).is_some();
        let self_closing = caps.get(3).is_some();

        if closing {
            let (open_name, open_start, inner_start) = stack
                .pop()
                .ok_or_else(|| format!("unexpected </{name}> at byte {start}"))?;
            if open_name != name {
                return Err(format!("</{name}> closes <{open_name}> at byte {start}"));
            }
            if stack.is_empty() {
                nodes.push(Node {
                    name,
                    span: open_start..end,
                    inner: Some(inner_start..start),
                });
            }
        } else if self_closing {
            if stack.is_empty() {
                nodes.push(Node {
                    name,
                    span: start..end,
                    inner: None,
                });
            }
        } else {
            stack.push((name, start, end));
        }
        pos = end;
    }

    match stack.pop() {
        Some((name, _, _)) => Err(format!("<{name}> is never closed")),
        None => Ok(nodes),
    }
}

/// The single root element of a document
pub(crate) fn root(doc: &str) -> Result<Node, String> {
    let mut nodes = children(doc, 0..doc.len())?;
    match nodes.len() {
        1 => Ok(nodes.remove(0)),
        0 => Err("document has no root element".to_string()),
        n => Err(format!("document has {n} root elements")),
    }
}

/// First direct child of `parent` called `name`
pub(crate) fn child(doc: &str, parent: &Node, name: &str) -> Result<Option<Node>, String> {
    let Some(inner) = parent.inner.clone() else {
        return Ok(None);
    };
    Ok(children(doc, inner)?.into_iter().find(|n| n.name == name))
}

pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn unescape(text: &str) -> String {
    static ENTITY: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"&(amp|lt|gt|quot|apos|#[0-9]+|#x[0-9A-Fa-f]+);").unwrap());

    if let Some(cdata) = text
        .trim()
        .strip_prefix("<![CDATA[")
        .and_then(|t| t.strip_suffix("]]>"))
    {
        return cdata.to_string();
    }

    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            match entity {
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                _ => {
                    let code = match entity.strip_prefix("#x") {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => entity[1..].parse().ok(),
                    };
                    code.and_then(char::from_u32)
                        .map_or_else(|| caps[0].to_string(), |c| c.to_string())
                }
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "<?xml version='1.1' encoding='UTF-8'?>\n\
        <project>\n  <description>a &amp; b</description>\n  <!-- <disabled> -->\n  \
        <disabled>false</disabled>\n  <properties>\n    <p><description>nested</description></p>\n  \
        </properties>\n  <builders/>\n</project>";

    #[test]
    fn test_root_and_direct_children() {
        let root = root(DOC).unwrap();
        assert_eq!(root.name, "project");

        let names: Vec<_> = children(DOC, root.inner.clone().unwrap())
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["description", "disabled", "properties", "builders"]);
    }

    #[test]
    fn test_child_ignores_nested_elements() {
        let root = root(DOC).unwrap();
        let description = child(DOC, &root, "description").unwrap().unwrap();
        assert_eq!(unescape(description.text(DOC)), "a & b");

        let builders = child(DOC, &root, "builders").unwrap().unwrap();
        assert_eq!(builders.inner, None);
    }

    #[test]
    fn test_unbalanced_document_is_rejected() {
        assert!(root("<project><description></project>").is_err());
        assert!(root("<project>").is_err());
        assert!(root("<a/><b/>").is_err());
    }

    #[test]
    fn test_escape_unescape() {
        let script = "if [ \"$A\" -lt 3 ] && true; then echo '<ok>'; fi";
        assert_eq!(unescape(&escape(script)), script);
        assert_eq!(unescape("&#65;&#x42;"), "AB");
        assert_eq!(unescape("<![CDATA[a < b]]>"), "a < b");
    }
}
