//! Line view of a manifest: byte spans of `image:` scalars inside container lists.
//!
//! An indentation-aware scanner over block-style YAML. It recognises
//! `containers:` / `initContainers:` keys, the `- ` items beneath them, and
//! the `name` / `image` keys at each item's own indentation. Nested keys
//! deeper than the item are skipped, so a `name:` inside `env:` or `ports:`
//! never counts.
//!
//! The scanner does not try to be a YAML parser. Anything it cannot rewrite
//! in place (block scalars, aliases, flow collections, escapes) is reported
//! as [`ImageField::Unsupported`] and the structural cross-check in
//! [`crate::patcher`] refuses to touch the document.

use std::ops::Range;

/// How the image scalar is written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
}

/// Location of an inline image value. `range` excludes any quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageSpan {
    pub range: Range<usize>,
    pub style: ScalarStyle,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ImageField {
    Inline(ImageSpan),
    Unsupported(&'static str),
}

/// One `- ` item under a container list, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct ContainerEntry {
    /// Zero-based document index, counted the way the YAML parser counts.
    pub document: usize,
    pub name: Option<String>,
    pub image: Option<ImageField>,
}

struct Item {
    key_indent: Option<usize>,
    entry: ContainerEntry,
}

struct List {
    key_indent: usize,
    item_indent: Option<usize>,
    current: Option<Item>,
}

/// Scan `content` and return every container list item, named or not.
pub(crate) fn scan(content: &str) -> Vec<ContainerEntry> {
    let mut entries = Vec::new();
    let mut list: Option<List> = None;
    let mut offset = 0;
    let mut document = 0;
    let mut started = false;

    for raw in content.split_inclusive('\n') {
        let start = offset;
        offset += raw.len();
        let text = raw.trim_end_matches('\n').trim_end_matches('\r');

        let trimmed = text.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || text.starts_with('%') {
            continue;
        }
        if text.starts_with("---") {
            close_list(&mut list, &mut entries);
            // A leading separator opens the first document rather than a second one.
            if started {
                document += 1;
            }
            started = true;
            continue;
        }
        if text.starts_with("...") {
            close_list(&mut list, &mut entries);
            continue;
        }
        started = true;

        let indent = text.len() - trimmed.len();

        if let Some(current) = list.as_mut() {
            if feed_list(current, text, start, indent, document, &mut entries) {
                continue;
            }
            close_list(&mut list, &mut entries);
        }

        if opens_container_list(trimmed) {
            list = Some(List {
                key_indent: indent,
                item_indent: None,
                current: None,
            });
        }
    }

    close_list(&mut list, &mut entries);
    entries
}

/// Feed one line to an open list. Returns `false` when the line ends the list.
fn feed_list(
    list: &mut List,
    text: &str,
    line_start: usize,
    indent: usize,
    document: usize,
    entries: &mut Vec<ContainerEntry>,
) -> bool {
    let rest = &text[indent..];
    let is_dash = rest == "-" || rest.starts_with("- ");

    let item_indent = match list.item_indent {
        Some(item_indent) => item_indent,
        None if is_dash && indent >= list.key_indent => {
            list.item_indent = Some(indent);
            indent
        }
        None => return false,
    };

    if indent < item_indent {
        return false;
    }

    if indent == item_indent {
        if !is_dash {
            return false;
        }
        if let Some(done) = list.current.take() {
            entries.push(done.entry);
        }
        let after_dash = &rest[1..];
        let body = after_dash.trim_start();
        let mut item = Item {
            key_indent: None,
            entry: ContainerEntry {
                document,
                ..ContainerEntry::default()
            },
        };
        if !body.is_empty() && !body.starts_with('#') {
            let key_indent = indent + 1 + (after_dash.len() - body.len());
            item.key_indent = Some(key_indent);
            record_key(&mut item.entry, body, line_start + key_indent);
        }
        list.current = Some(item);
        return true;
    }

    if let Some(item) = list.current.as_mut() {
        let key_indent = *item.key_indent.get_or_insert(indent);
        if indent == key_indent {
            record_key(&mut item.entry, rest, line_start + indent);
        }
    }
    true
}

fn close_list(list: &mut Option<List>, entries: &mut Vec<ContainerEntry>) {
    if let Some(mut done) = list.take() {
        if let Some(item) = done.current.take() {
            entries.push(item.entry);
        }
    }
}

fn opens_container_list(trimmed: &str) -> bool {
    match split_key(trimmed) {
        Some((key, value_at)) => {
            let value = trimmed[value_at..].trim_start();
            matches!(key, "containers" | "initContainers")
                && (value.is_empty() || value.starts_with('#'))
        }
        None => false,
    }
}

/// Record `name` / `image` from a `key: value` line at item indentation.
/// `abs` is the byte offset of `line` within the whole document.
fn record_key(entry: &mut ContainerEntry, line: &str, abs: usize) {
    let Some((key, value_at)) = split_key(line) else {
        return;
    };
    match key {
        "name" => {
            if let ImageField::Inline(span) = parse_scalar(&line[value_at..], abs + value_at) {
                entry.name = Some(span.value);
            }
        }
        "image" => entry.image = Some(parse_scalar(&line[value_at..], abs + value_at)),
        _ => {}
    }
}

/// Split `key: value`; returns the unquoted key and the byte index just past
/// the colon.
fn split_key(line: &str) -> Option<(&str, usize)> {
    let bytes = line.as_bytes();
    let colon = (0..bytes.len()).find(|&i| {
        bytes[i] == b':' && (i + 1 == bytes.len() || bytes[i + 1] == b' ' || bytes[i + 1] == b'\t')
    })?;
    let key = line[..colon].trim().trim_matches(|c| c == '"' || c == '\'');
    Some((key, colon + 1))
}

fn parse_scalar(value_part: &str, abs: usize) -> ImageField {
    let v = value_part.trim_start_matches([' ', '\t']);
    let base = abs + (value_part.len() - v.len());

    let Some(first) = v.chars().next() else {
        return ImageField::Unsupported("value continues on following lines");
    };

    match first {
        '#' => ImageField::Unsupported("value continues on following lines"),
        '|' | '>' => ImageField::Unsupported("block scalar"),
        '&' | '*' => ImageField::Unsupported("anchor or alias"),
        '{' | '[' => ImageField::Unsupported("flow collection"),
        '!' => ImageField::Unsupported("tagged value"),
        '"' => parse_double_quoted(v, base),
        '\'' => parse_single_quoted(v, base),
        _ => {
            let end = plain_end(v);
            ImageField::Inline(ImageSpan {
                range: base..base + end,
                style: ScalarStyle::Plain,
                value: v[..end].to_owned(),
            })
        }
    }
}

fn parse_double_quoted(v: &str, base: usize) -> ImageField {
    let bytes = v.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => return ImageField::Unsupported("escape sequence in quoted value"),
            b'"' => {
                if !only_comment_follows(&v[i + 1..]) {
                    return ImageField::Unsupported("trailing content after quoted value");
                }
                return ImageField::Inline(ImageSpan {
                    range: base + 1..base + i,
                    style: ScalarStyle::DoubleQuoted,
                    value: v[1..i].to_owned(),
                });
            }
            _ => i += 1,
        }
    }
    ImageField::Unsupported("multi-line quoted value")
}

fn parse_single_quoted(v: &str, base: usize) -> ImageField {
    let bytes = v.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                return ImageField::Unsupported("escaped quote in quoted value");
            }
            if !only_comment_follows(&v[i + 1..]) {
                return ImageField::Unsupported("trailing content after quoted value");
            }
            return ImageField::Inline(ImageSpan {
                range: base + 1..base + i,
                style: ScalarStyle::SingleQuoted,
                value: v[1..i].to_owned(),
            });
        }
        i += 1;
    }
    ImageField::Unsupported("multi-line quoted value")
}

fn only_comment_follows(rest: &str) -> bool {
    let rest = rest.trim_start_matches([' ', '\t']);
    rest.is_empty() || rest.starts_with('#')
}

/// Length of a plain scalar: up to a ` #` comment, trailing blanks trimmed.
fn plain_end(v: &str) -> usize {
    let bytes = v.as_bytes();
    let cut = (1..bytes.len())
        .find(|&i| bytes[i] == b'#' && (bytes[i - 1] == b' ' || bytes[i - 1] == b'\t'))
        .unwrap_or(bytes.len());
    v[..cut].trim_end_matches([' ', '\t']).len()
}
