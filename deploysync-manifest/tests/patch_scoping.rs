//! Selector scoping across multi-container and multi-document manifests.

use std::path::PathBuf;

use deploysync_core::{resolver, ContainerSelector, ImageReference, ManifestDocument};
use deploysync_manifest::{patch, unified_diff, PatchError};
use rstest::rstest;

const MULTI: &str = "\
# api stack, managed by deploysync
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  labels:
    app: web   # keep
spec:
  replicas: 3
  template:
    spec:
      initContainers:
        - name: migrate
          image: ghcr.io/org/web:old
      containers:
        - name: sidecar
          image: 'envoyproxy/envoy:v1.29.1'
        - name: api
          image: ghcr.io/org/web:old   # bumped by CI
          env:
            - name: image
              value: not-an-image
        - name: metrics
          image: \"prom/statsd-exporter:v0.26.0\"
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: worker
spec:
  template:
    spec:
      containers:
      - name: api
        image: ghcr.io/org/web:old
";

fn doc(content: &str, selector: &str) -> ManifestDocument {
    ManifestDocument {
        file_path: PathBuf::from("apps/web/deployment.yaml"),
        raw_content: content.to_owned(),
        selector: selector.parse::<ContainerSelector>().expect("selector"),
    }
}

fn target() -> ImageReference {
    resolver::resolve("ghcr.io", "org/web", "1a2b3c4d").expect("image")
}

fn changed_lines(before: &str, after: &str) -> Vec<(usize, String, String)> {
    before
        .lines()
        .zip(after.lines())
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, (a, b))| (i, a.to_owned(), b.to_owned()))
        .collect()
}

#[test]
fn bare_container_name_matching_two_workloads_is_ambiguous() {
    let err = patch(&doc(MULTI, "api"), &target()).unwrap_err();
    match err {
        PatchError::SelectorAmbiguous { count, .. } => assert_eq!(count, 2),
        other => panic!("expected ambiguity, got {other}"),
    }
}

#[rstest]
#[case("web/api", "          image: ghcr.io/org/web:1a2b3c4d   # bumped by CI")]
#[case("worker/api", "        image: ghcr.io/org/web:1a2b3c4d")]
#[case("migrate", "          image: ghcr.io/org/web:1a2b3c4d")]
fn qualified_selector_touches_exactly_one_line(#[case] selector: &str, #[case] expected: &str) {
    let result = patch(&doc(MULTI, selector), &target()).expect("patch");
    assert!(result.changed);
    assert_eq!(result.previous_image, "ghcr.io/org/web:old");
    assert_eq!(result.new_content.len(), MULTI.len() + "1a2b3c4d".len() - "old".len());

    let changes = changed_lines(MULTI, &result.new_content);
    assert_eq!(changes.len(), 1, "changes: {changes:?}");
    assert_eq!(changes[0].2, expected);
}

#[test]
fn sibling_containers_keep_their_quoting_and_values() {
    let result = patch(&doc(MULTI, "web/api"), &target()).expect("patch");
    assert!(result
        .new_content
        .contains("image: 'envoyproxy/envoy:v1.29.1'"));
    assert!(result
        .new_content
        .contains("image: \"prom/statsd-exporter:v0.26.0\""));
    assert!(result.new_content.contains("value: not-an-image"));
    assert!(result.new_content.contains("app: web   # keep"));
}

#[rstest]
#[case("sidecar", "envoyproxy/envoy:v1.29.1")]
#[case("metrics", "prom/statsd-exporter:v0.26.0")]
fn quoted_images_stay_quoted(#[case] selector: &str, #[case] previous: &str) {
    let result = patch(&doc(MULTI, selector), &target()).expect("patch");
    assert_eq!(result.previous_image, previous);
    let changes = changed_lines(MULTI, &result.new_content);
    assert_eq!(changes.len(), 1);
    let line = &changes[0].2;
    let quote = if selector == "sidecar" { '\'' } else { '"' };
    assert!(
        line.ends_with(&format!("{quote}ghcr.io/org/web:1a2b3c4d{quote}")),
        "line: {line}"
    );
}

#[test]
fn workload_without_that_container_is_not_found() {
    let err = patch(&doc(MULTI, "worker/sidecar"), &target()).unwrap_err();
    assert!(matches!(err, PatchError::SelectorNotFound { .. }), "got: {err}");
}

#[test]
fn deploy_example_rewrites_the_quoted_image() {
    let before = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: example03
spec:
  template:
    spec:
      containers:
        - name: api
          image: \"registry.example.com:8443/example03:old999\"
";
    let image = resolver::resolve("registry.example.com:8443", "example03", "abc1234")
        .expect("image");
    let result = patch(&doc(before, "api"), &image).expect("patch");

    assert!(result
        .new_content
        .contains("image: \"registry.example.com:8443/example03:abc1234\""));
    assert_eq!(changed_lines(before, &result.new_content).len(), 1);

    let diff = unified_diff(
        &PathBuf::from("apps/web/deployment.yaml"),
        before,
        &result.new_content,
    );
    assert!(diff.contains("-          image: \"registry.example.com:8443/example03:old999\""));
    assert!(diff.contains("+          image: \"registry.example.com:8443/example03:abc1234\""));

    let again = patch(&doc(&result.new_content, "api"), &image).expect("rerun");
    assert!(!again.changed);
    assert_eq!(again.new_content, result.new_content);
}
