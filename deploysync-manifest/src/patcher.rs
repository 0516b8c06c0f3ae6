//! Manifest patcher: rewrite exactly one image field, byte-for-byte elsewhere.
//!
//! ## Protocol
//!
//! 1. Parse the document (all YAML documents in the file) and collect every
//!    container named by the selector, tagged with its workload.
//! 2. Scan the raw text for container list items and their `image:` spans.
//! 3. Apply the workload filter to the parsed view and require exactly one
//!    match.
//! 4. Cross-check the document holding that match: both views must list the
//!    same containers with the same images, in the same order. Disagreement
//!    means the layout is outside what can be rewritten in place; refuse
//!    rather than guess. Other documents are not consulted.
//! 5. Splice the new value into the span, keeping the quoting style.
//! 6. Re-parse the result and verify the selected container now carries the
//!    target image and nothing else moved.

use deploysync_core::{ImageReference, ManifestDocument, PatchResult};

use crate::error::PatchError;
use crate::locate::{self, ContainerEntry, ImageField, ImageSpan, ScalarStyle};
use crate::structure::{self, StructuralMatch};

/// Compute the patch for `document` so its selected container runs `target`.
///
/// Pure: safe to call repeatedly, including on freshly re-fetched content.
pub fn patch(
    document: &ManifestDocument,
    target: &ImageReference,
) -> Result<PatchResult, PatchError> {
    let selector = &document.selector;
    let layout_err = |reason: String| PatchError::UnsupportedLayout {
        selector: selector.to_string(),
        path: document.file_path.clone(),
        reason,
    };

    let structural = parse_structure(document)?;
    let scanned: Vec<ContainerEntry> = locate::scan(&document.raw_content)
        .into_iter()
        .filter(|entry| entry.name.as_deref() == Some(selector.container.as_str()))
        .collect();
    let selected: Vec<usize> = structural
        .iter()
        .enumerate()
        .filter(|(_, m)| match &selector.workload {
            Some(workload) => m.workload.as_deref() == Some(workload.as_str()),
            None => true,
        })
        .map(|(i, _)| i)
        .collect();

    let index = match selected.as_slice() {
        [] => {
            return Err(PatchError::SelectorNotFound {
                selector: selector.to_string(),
                path: document.file_path.clone(),
            })
        }
        [only] => *only,
        many => {
            return Err(PatchError::SelectorAmbiguous {
                selector: selector.to_string(),
                path: document.file_path.clone(),
                count: many.len(),
            })
        }
    };

    let chosen = &structural[index];
    let parsed_in_doc: Vec<&StructuralMatch> =
        structural.iter().filter(|m| m.document == chosen.document).collect();
    let scanned_in_doc: Vec<&ContainerEntry> =
        scanned.iter().filter(|e| e.document == chosen.document).collect();
    cross_check(&parsed_in_doc, &scanned_in_doc).map_err(layout_err)?;
    let position = structural[..index]
        .iter()
        .filter(|m| m.document == chosen.document)
        .count();

    let span = match &scanned_in_doc[position].image {
        None => {
            return Err(PatchError::MissingImageField {
                selector: selector.to_string(),
                path: document.file_path.clone(),
            })
        }
        Some(ImageField::Unsupported(reason)) => return Err(layout_err((*reason).to_owned())),
        Some(ImageField::Inline(span)) => span,
    };

    let wanted = target.to_string();
    if span.value == wanted {
        return Ok(PatchResult {
            changed: false,
            new_content: document.raw_content.clone(),
            previous_image: span.value.clone(),
        });
    }

    if span.style == ScalarStyle::Plain && !plain_safe(&wanted) {
        return Err(layout_err(format!("'{wanted}' cannot be written as a plain scalar")));
    }

    let new_content = splice(&document.raw_content, span, &wanted);
    verify(document, &new_content, &structural, index, &wanted).map_err(layout_err)?;

    Ok(PatchResult {
        changed: true,
        new_content,
        previous_image: span.value.clone(),
    })
}

fn parse_structure(document: &ManifestDocument) -> Result<Vec<StructuralMatch>, PatchError> {
    structure::find_containers(&document.raw_content, &document.selector.container).map_err(
        |source| PatchError::InvalidYaml {
            path: document.file_path.clone(),
            source,
        },
    )
}

fn cross_check(structural: &[&StructuralMatch], scanned: &[&ContainerEntry]) -> Result<(), String> {
    if structural.len() != scanned.len() {
        return Err(format!(
            "parsed {} matching container(s) but found {} in block layout",
            structural.len(),
            scanned.len()
        ));
    }
    for (parsed, entry) in structural.iter().zip(scanned.iter()) {
        let consistent = match (&parsed.image, &entry.image) {
            (None, None) => true,
            (Some(value), Some(ImageField::Inline(span))) => *value == span.value,
            (Some(_), Some(ImageField::Unsupported(_))) => true,
            _ => false,
        };
        if !consistent {
            return Err("image values differ between parsed and block layout".to_owned());
        }
    }
    Ok(())
}

/// Whether `value` reads back unchanged as an unquoted YAML scalar.
fn plain_safe(value: &str) -> bool {
    !value.is_empty()
        && !value.contains(": ")
        && !value.contains(" #")
        && !value.ends_with(':')
        && !value.starts_with(|c: char| "-?:,[]{}#&*!|>'\"%@`".contains(c) || c.is_whitespace())
}

/// Replace the span; `ImageSpan::range` already excludes quotes, so the
/// original quoting style survives untouched.
fn splice(content: &str, span: &ImageSpan, value: &str) -> String {
    let mut out = String::with_capacity(content.len() + value.len());
    out.push_str(&content[..span.range.start]);
    out.push_str(value);
    out.push_str(&content[span.range.end..]);
    out
}

fn verify(
    document: &ManifestDocument,
    new_content: &str,
    before: &[StructuralMatch],
    index: usize,
    wanted: &str,
) -> Result<(), String> {
    let after = structure::find_containers(new_content, &document.selector.container)
        .map_err(|e| format!("patched document no longer parses: {e}"))?;
    if after.len() != before.len() {
        return Err("patched document changed the number of containers".to_owned());
    }
    for (i, (old, new)) in before.iter().zip(&after).enumerate() {
        let expected = if i == index { Some(wanted) } else { old.image.as_deref() };
        if new.image.as_deref() != expected || new.workload != old.workload {
            return Err("patched document does not read back as expected".to_owned());
        }
    }
    Ok(())
}
