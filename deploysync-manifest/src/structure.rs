//! Structural view of a manifest: which containers exist, where, with what image.
//!
//! Parses every YAML document in the file with serde_yaml and walks the
//! tree. Mapping order is preserved by serde_yaml, so matches come back in
//! document order, the same order the line scanner in [`crate::locate`]
//! produces.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

/// A container entry whose `name` equals the selector's container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StructuralMatch {
    /// Zero-based index of the YAML document in the file.
    pub document: usize,
    /// `metadata.name` of the nearest enclosing resource (mapping with `kind`).
    pub workload: Option<String>,
    /// Rendered `image` value, `None` when the entry has no image key.
    pub image: Option<String>,
}

const CONTAINER_LISTS: &[&str] = &["containers", "initContainers"];

/// Find every container named `container` across all documents in `content`.
pub(crate) fn find_containers(
    content: &str,
    container: &str,
) -> Result<Vec<StructuralMatch>, serde_yaml::Error> {
    let mut found = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let value = Value::deserialize(document)?;
        let mut search = Search {
            document: index,
            container,
            found: &mut found,
        };
        search.walk(&value, None);
    }
    Ok(found)
}

struct Search<'a> {
    document: usize,
    container: &'a str,
    found: &'a mut Vec<StructuralMatch>,
}

impl Search<'_> {
    fn walk(&mut self, value: &Value, workload: Option<&str>) {
        match value {
            Value::Mapping(map) => {
                let workload = resource_name(map).or(workload);
                for (key, child) in map {
                    let is_list = key
                        .as_str()
                        .is_some_and(|k| CONTAINER_LISTS.contains(&k));
                    match child {
                        Value::Sequence(items) if is_list => self.collect(items, workload),
                        _ => self.walk(child, workload),
                    }
                }
            }
            Value::Sequence(items) => {
                for item in items {
                    self.walk(item, workload);
                }
            }
            Value::Tagged(tagged) => self.walk(&tagged.value, workload),
            _ => {}
        }
    }

    fn collect(&mut self, items: &[Value], workload: Option<&str>) {
        for item in items {
            let Some(entry) = item.as_mapping() else {
                continue;
            };
            if entry.get("name").and_then(Value::as_str) != Some(self.container) {
                continue;
            }
            self.found.push(StructuralMatch {
                document: self.document,
                workload: workload.map(str::to_owned),
                image: entry.get("image").map(render_scalar),
            });
        }
    }
}

fn resource_name(map: &Mapping) -> Option<&str> {
    if !map.contains_key("kind") {
        return None;
    }
    map.get("metadata")?.get("name")?.as_str()
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim_end()
            .to_owned(),
    }
}
