//! Plain text extraction from parsed messages
//!
//! Multipart messages are flattened to their leaf parts. Plain text leaves
//! win over HTML leaves; HTML is reduced to its visible text. The result is
//! always whitespace-normalized.

use std::collections::HashSet;

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};

/// Parse a raw RFC822 blob as delivered by the server
pub fn parse_message(raw: &[u8]) -> Option<Message<'_>> {
    MessageParser::default().parse(raw)
}

/// Renderable body text of a message, never failing on malformed input.
///
/// Decoding is lossy: mail-parser replaces bytes that are invalid in the
/// declared charset with U+FFFD, and those replacement characters are
/// removed from the result.
pub fn extract_text(message: &Message<'_>) -> String {
    let Some(root) = message.parts.first() else {
        return String::new();
    };

    let (body, is_html) = match &root.body {
        PartType::Multipart(_) => {
            let mut plain = Vec::new();
            let mut html = Vec::new();
            collect_leaves(message, root, &mut plain, &mut html);
            if !plain.is_empty() {
                (plain.concat(), false)
            } else {
                (html.concat(), true)
            }
        }
        PartType::Text(text) => (text.to_string(), false),
        PartType::Html(html) => (html.to_string(), true),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            (String::from_utf8_lossy(bytes).into_owned(), false)
        }
        PartType::Message(_) => (String::new(), false),
    };

    let text = if is_html { html_to_text(&body) } else { body };
    normalize_whitespace(&text.replace('\u{FFFD}', ""))
}

fn collect_leaves<'a>(
    message: &'a Message<'_>,
    part: &'a MessagePart<'_>,
    plain: &mut Vec<&'a str>,
    html: &mut Vec<&'a str>,
) {
    match &part.body {
        PartType::Multipart(children) => {
            for id in children {
                if let Some(child) = message.parts.get(*id as usize) {
                    collect_leaves(message, child, plain, html);
                }
            }
        }
        PartType::Text(text) if is_plain_text(part) => plain.push(text.as_ref()),
        PartType::Html(text) => html.push(text.as_ref()),
        _ => {}
    }
}

/// Parts without a Content-Type default to text/plain
fn is_plain_text(part: &MessagePart<'_>) -> bool {
    match part.content_type() {
        None => true,
        Some(ct) => {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct.subtype().map_or(true, |s| s.eq_ignore_ascii_case("plain"))
        }
    }
}

/// Tags that start a new line when rendered
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "footer", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre", "section", "table", "td", "th", "tr",
    "ul",
];

/// Visible text of an HTML fragment: tags dropped, script and style removed.
///
/// Block boundaries and line breaks become whitespace so adjacent blocks do
/// not run together.
pub fn html_to_text(html: &str) -> String {
    let cleaned = ammonia::Builder::empty()
        .clean_content_tags(HashSet::from(["script", "style", "title"]))
        .clean(&separate_blocks(html))
        .to_string();

    // The serializer escapes these in text nodes; undo it, `&amp;` last
    cleaned
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

/// Insert a newline before every opening or closing block tag
fn separate_blocks(html: &str) -> String {
    let mut out = String::with_capacity(html.len() + html.len() / 8);
    for (i, c) in html.char_indices() {
        if c == '<' && is_block_tag(&html[i + 1..]) {
            out.push('\n');
        }
        out.push(c);
    }
    out
}

/// `rest` starts just after a `<`
fn is_block_tag(rest: &str) -> bool {
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    let end = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let name = &rest[..end];
    BLOCK_TAGS.iter().any(|tag| tag.eq_ignore_ascii_case(name))
}

/// Collapse whitespace runs to one space and trim both ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
