//! `$ref` helpers shared by the bundler and the reference graph builder

use serde_json::Value;

/// Visit every `$ref` string in a tree, in document order
///
/// Only string values of a `$ref` key count; a schema property that happens to
/// be named `$ref` holds an object and is walked like any other node.
pub fn visit_refs<'a, F>(node: &'a Value, visit: &mut F)
where
    F: FnMut(&'a str),
{
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                match value {
                    Value::String(reference) if key == "$ref" => visit(reference),
                    _ => visit_refs(value, visit),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                visit_refs(item, visit);
            }
        }
        _ => {}
    }
}

/// Collect every `$ref` string in a tree
pub fn collect_refs(node: &Value) -> Vec<&str> {
    let mut refs = Vec::new();
    visit_refs(node, &mut |reference| refs.push(reference));
    refs
}

/// Split a reference into its document part and its fragment
///
/// `other.yaml#/Pet` gives `("other.yaml", "/Pet")`, `#/a` gives `("", "/a")`.
pub fn split_ref(reference: &str) -> (&str, &str) {
    match reference.split_once('#') {
        Some((document, fragment)) => (document, fragment),
        None => (reference, ""),
    }
}

/// Whether a reference points into the document that contains it
pub fn is_local(reference: &str) -> bool {
    reference.starts_with('#')
}

/// Resolve a URI fragment (JSON pointer, possibly percent-encoded) in a tree
pub fn resolve_pointer<'a>(root: &'a Value, fragment: &str) -> Option<&'a Value> {
    if fragment.is_empty() {
        return Some(root);
    }
    root.pointer(&percent_decode(fragment))
}

/// Follow a local `$ref` object one level, returning the node itself otherwise
pub fn follow_local<'a>(root: &'a Value, node: &'a Value) -> &'a Value {
    match node.get("$ref").and_then(Value::as_str) {
        Some(reference) if is_local(reference) => {
            let (_, fragment) = split_ref(reference);
            resolve_pointer(root, fragment).unwrap_or(node)
        }
        _ => node,
    }
}

/// Decode a single JSON pointer token (`~1` is `/`, `~0` is `~`)
pub fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Decode a pointer token taken from a URI fragment: percent escapes first,
/// then `~1`/`~0`
pub fn decode_token(token: &str) -> String {
    unescape_token(&percent_decode(token))
}

fn percent_decode(input: &str) -> String {
    if !input.contains('%') {
        return input.to_string();
    }

    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}
