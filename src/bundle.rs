//! Reference bundling
//!
//! External `$ref`s (anything with a document part, such as
//! `common.yaml#/Error` or `https://host/pet.json`) are loaded once each and
//! inlined at every place they are used. Local `#/...` references are kept,
//! so named schemas remain shared, but each one must resolve inside the
//! bundled tree. Running the bundler on its own output changes nothing.
//!
//! An external target that refers back to itself cannot be inlined. It is
//! given a name in the schema container (`components/schemas` or
//! `definitions`) and the recursion becomes a local reference to that entry.
//! A root container entry that is nothing but such a reference lends its own
//! name. Chains of bare references that loop without ever reaching content
//! are still an error.

use crate::error::{IngestError, Result};
use crate::fetch::SpecFetcher;
use crate::parsers::ParserRegistry;
use crate::refs::{self, resolve_pointer, split_ref};
use crate::validate::SpecFamily;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use url::Url;

/// Upper bound on distinct external documents pulled into one bundle
pub const MAX_EXTERNAL_DOCUMENTS: usize = 128;

/// Loads the text of an external document
#[async_trait]
pub trait ExternalLoader: Send + Sync {
    async fn load(&self, location: &Url) -> Result<String>;
}

/// Loads `http(s)://` documents with the fetcher and `file://` documents from disk
pub struct LocationLoader {
    fetcher: SpecFetcher,
}

impl LocationLoader {
    pub fn new(fetcher: SpecFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ExternalLoader for LocationLoader {
    async fn load(&self, location: &Url) -> Result<String> {
        match location.scheme() {
            "http" | "https" => Ok(self.fetcher.fetch(location).await?.text),
            "file" => {
                let path = location
                    .to_file_path()
                    .map_err(|_| IngestError::bundle(format!("invalid file location {}", location)))?;
                tokio::fs::read_to_string(&path).await.map_err(|e| {
                    IngestError::bundle(format!("cannot read {}: {}", path.display(), e))
                })
            }
            other => Err(IngestError::bundle(format!(
                "unsupported reference scheme `{}` in {}",
                other, location
            ))),
        }
    }
}

/// Bundle a validated tree
///
/// `base` is the location of the root document; without one, any external
/// reference fails.
pub async fn bundle(
    root: &Value,
    base: Option<&Url>,
    loader: &dyn ExternalLoader,
    parsers: &ParserRegistry,
) -> Result<Value> {
    let documents = load_external_documents(root, base, loader, parsers).await?;
    if !documents.is_empty() {
        tracing::debug!(documents = documents.len(), "Loaded external documents");
    }

    let family = container_family(root);
    let mut inliner = Inliner::new(root, base, &documents, family)?;
    let mut tree = root.clone();
    inliner.inline(&mut tree, None)?;

    if !inliner.hoisted.is_empty() {
        tracing::debug!(
            count = inliner.hoisted.len(),
            "Hoisting recursive external schemas"
        );
        let container = container_mut(&mut tree, family)?;
        for (name, value) in inliner.hoisted {
            container.insert(name, value);
        }
    }

    check_local_refs(&tree)?;
    Ok(tree)
}

/// Family whose schema container receives hoisted entries; `openapi` wins
fn container_family(root: &Value) -> SpecFamily {
    if root.get("openapi").is_none() && root.get("swagger").is_some() {
        SpecFamily::Swagger2
    } else {
        SpecFamily::OpenApi3
    }
}

/// The schema container of `tree`, created when absent
fn container_mut(tree: &mut Value, family: SpecFamily) -> Result<&mut Map<String, Value>> {
    let pointer = family.schema_container_pointer();
    let not_an_object =
        || IngestError::bundle(format!("cannot hoist schemas: `{}` is not an object", pointer));

    let mut node = tree;
    for token in pointer.split('/').skip(1) {
        node = node
            .as_object_mut()
            .ok_or_else(not_an_object)?
            .entry(token.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    node.as_object_mut().ok_or_else(not_an_object)
}

/// Container entry name for a hoisted target, limited to the characters
/// OpenAPI 3.0 allows in component names
fn hoisted_name(target: &Target) -> String {
    let token = target
        .fragment
        .rsplit('/')
        .find(|token| !token.is_empty())
        .map(refs::decode_token)
        .or_else(|| {
            Path::new(target.location.path())
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_owned)
        })
        .unwrap_or_default();

    let name: String = token
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        "Schema".to_string()
    } else {
        name
    }
}

/// Location of the document a reference points into, `None` for local refs
fn external_location(reference: &str, base: Option<&Url>) -> Result<Option<Url>> {
    let (document, _) = split_ref(reference);
    if document.is_empty() {
        return Ok(None);
    }

    let base = base.ok_or_else(|| {
        IngestError::bundle(format!(
            "external reference `{}` cannot be resolved without a base location",
            reference
        ))
    })?;
    let mut location = base
        .join(document)
        .map_err(|e| IngestError::bundle(format!("invalid reference `{}`: {}", reference, e)))?;
    location.set_fragment(None);
    Ok(Some(location))
}

async fn load_external_documents(
    root: &Value,
    base: Option<&Url>,
    loader: &dyn ExternalLoader,
    parsers: &ParserRegistry,
) -> Result<HashMap<Url, Value>> {
    let mut documents: HashMap<Url, Value> = HashMap::new();
    let mut pending: Vec<Url> = Vec::new();

    for reference in refs::collect_refs(root) {
        if let Some(location) = external_location(reference, base)? {
            pending.push(location);
        }
    }

    while let Some(location) = pending.pop() {
        if documents.contains_key(&location) {
            continue;
        }
        if documents.len() >= MAX_EXTERNAL_DOCUMENTS {
            return Err(IngestError::bundle(format!(
                "more than {} external documents referenced",
                MAX_EXTERNAL_DOCUMENTS
            )));
        }

        tracing::debug!(location = %location, "Loading external document");
        let text = loader.load(&location).await.map_err(|e| match e {
            IngestError::Bundle(_) => e,
            other => IngestError::bundle(format!("cannot load {}: {}", location, other)),
        })?;

        let hint = Path::new(location.path())
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        let document = parsers
            .parse_any(&text, hint.as_deref())
            .map_err(|e| IngestError::bundle(format!("cannot parse {}: {}", location, e)))?;

        for reference in refs::collect_refs(&document) {
            if let Some(next) = external_location(reference, Some(&location))? {
                if !documents.contains_key(&next) {
                    pending.push(next);
                }
            }
        }
        documents.insert(location, document);
    }

    Ok(documents)
}

/// A resolved external reference target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Target {
    location: Url,
    fragment: String,
}

/// A target being expanded
struct Frame {
    target: Target,
    /// The target's content is itself a bare `$ref`
    alias: bool,
}

struct Inliner<'a> {
    root_base: Option<&'a Url>,
    documents: &'a HashMap<Url, Value>,
    ref_prefix: &'static str,
    stack: Vec<Frame>,
    /// Container names of targets that need one
    names: HashMap<Target, String>,
    /// Targets named by a root container entry; that entry is their home
    rooted: HashSet<Target>,
    taken: HashSet<String>,
    hoisted: IndexMap<String, Value>,
}

impl<'a> Inliner<'a> {
    fn new(
        root: &Value,
        root_base: Option<&'a Url>,
        documents: &'a HashMap<Url, Value>,
        family: SpecFamily,
    ) -> Result<Self> {
        let mut inliner = Self {
            root_base,
            documents,
            ref_prefix: family.schema_ref_prefix(),
            stack: Vec::new(),
            names: HashMap::new(),
            rooted: HashSet::new(),
            taken: HashSet::new(),
            hoisted: IndexMap::new(),
        };

        let container = root
            .pointer(family.schema_container_pointer())
            .and_then(Value::as_object);
        for (name, entry) in container.into_iter().flatten() {
            inliner.taken.insert(name.clone());
            let reference = entry.get("$ref").and_then(Value::as_str);
            let bare = entry.as_object().map_or(false, |map| map.len() == 1);
            if let (Some(reference), true) = (reference, bare) {
                if let Some(target) = inliner.target(reference, None)? {
                    if !inliner.names.contains_key(&target) {
                        inliner.names.insert(target.clone(), name.clone());
                        inliner.rooted.insert(target);
                    }
                }
            }
        }
        Ok(inliner)
    }

    /// Replace external references under `node`
    ///
    /// `current` is the external document `node` came from, `None` for the
    /// root document. Local references inside an external document point
    /// into that document, so they are treated as external too.
    fn inline(&mut self, node: &mut Value, current: Option<&Url>) -> Result<()> {
        match node {
            Value::Object(map) => {
                let reference = map.get("$ref").and_then(Value::as_str).map(str::to_owned);
                if let Some(reference) = reference {
                    if let Some(target) = self.target(&reference, current)? {
                        *node = self.expand(&reference, target)?;
                    }
                    return Ok(());
                }
                for value in map.values_mut() {
                    self.inline(value, current)?;
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.inline(item, current)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn target(&self, reference: &str, current: Option<&Url>) -> Result<Option<Target>> {
        let (document, fragment) = split_ref(reference);
        let location = match (document.is_empty(), current) {
            (true, None) => return Ok(None),
            (true, Some(current)) => current.clone(),
            (false, _) => match external_location(reference, current.or(self.root_base))? {
                Some(location) => location,
                None => return Ok(None),
            },
        };
        Ok(Some(Target {
            location,
            fragment: fragment.to_string(),
        }))
    }

    fn expand(&mut self, reference: &str, target: Target) -> Result<Value> {
        if let Some(pos) = self.stack.iter().position(|frame| frame.target == target) {
            if self.stack[pos..].iter().all(|frame| frame.alias) {
                return Err(IngestError::bundle(format!(
                    "circular external reference `{}` ({}#{})",
                    reference, target.location, target.fragment
                )));
            }
            let name = self.name_for(&target);
            return Ok(self.local_ref(&name));
        }
        if let Some(name) = self.names.get(&target) {
            if self.hoisted.contains_key(name) {
                return Ok(self.local_ref(name));
            }
        }

        let document = self.documents.get(&target.location).ok_or_else(|| {
            IngestError::bundle(format!("document {} was not loaded", target.location))
        })?;
        let mut replacement = resolve_pointer(document, &target.fragment)
            .cloned()
            .ok_or_else(|| {
                IngestError::bundle(format!(
                    "`{}` does not exist in {}",
                    target.fragment, target.location
                ))
            })?;

        let location = target.location.clone();
        let alias = replacement.get("$ref").and_then(Value::as_str).is_some();
        self.stack.push(Frame {
            target: target.clone(),
            alias,
        });
        let result = self.inline(&mut replacement, Some(&location));
        self.stack.pop();
        result?;

        // Recursion was cut while expanding: the content lives in the container
        if !self.rooted.contains(&target) {
            if let Some(name) = self.names.get(&target).cloned() {
                self.hoisted.insert(name.clone(), replacement);
                return Ok(self.local_ref(&name));
            }
        }

        Ok(replacement)
    }

    fn name_for(&mut self, target: &Target) -> String {
        if let Some(name) = self.names.get(target) {
            return name.clone();
        }

        let base = hoisted_name(target);
        let mut name = base.clone();
        let mut n = 2;
        while self.taken.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        self.taken.insert(name.clone());
        self.names.insert(target.clone(), name.clone());
        name
    }

    fn local_ref(&self, name: &str) -> Value {
        serde_json::json!({ "$ref": format!("{}{}", self.ref_prefix, name) })
    }
}

/// Every local reference must point at something in the tree
fn check_local_refs(tree: &Value) -> Result<()> {
    let mut dangling: Vec<&str> = Vec::new();
    refs::visit_refs(tree, &mut |reference| {
        let (_, fragment) = split_ref(reference);
        if resolve_pointer(tree, fragment).is_none() && !dangling.contains(&reference) {
            dangling.push(reference);
        }
    });

    if dangling.is_empty() {
        Ok(())
    } else {
        Err(IngestError::bundle(format!(
            "unresolved reference(s): {}",
            dangling.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Serves documents from memory and counts loads
    struct MemoryLoader {
        files: HashMap<String, String>,
        loads: Mutex<Vec<String>>,
    }

    impl MemoryLoader {
        fn new(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                loads: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ExternalLoader for MemoryLoader {
        async fn load(&self, location: &Url) -> Result<String> {
            self.loads.lock().push(location.to_string());
            self.files
                .get(location.as_str())
                .cloned()
                .ok_or_else(|| IngestError::bundle(format!("404 {}", location)))
        }
    }

    fn base() -> Url {
        Url::parse("https://specs.example.com/api/openapi.yaml").unwrap()
    }

    #[tokio::test]
    async fn test_local_refs_are_kept() {
        let doc = json!({
            "paths": { "/a": { "$ref": "#/x-shared" } },
            "x-shared": { "get": {} }
        });
        let loader = MemoryLoader::new(&[]);
        let bundled = bundle(&doc, None, &loader, &ParserRegistry::new())
            .await
            .unwrap();
        assert_eq!(bundled, doc);
    }

    #[tokio::test]
    async fn test_dangling_local_ref_fails() {
        let doc = json!({ "a": { "$ref": "#/components/schemas/Missing" } });
        let loader = MemoryLoader::new(&[]);
        let err = bundle(&doc, None, &loader, &ParserRegistry::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("#/components/schemas/Missing"));
    }

    #[tokio::test]
    async fn test_external_refs_are_inlined() {
        let doc = json!({
            "components": {
                "schemas": {
                    "Pet": { "$ref": "models/pet.yaml" },
                    "Error": { "$ref": "common.json#/Error" }
                }
            }
        });
        let loader = MemoryLoader::new(&[
            (
                "https://specs.example.com/api/models/pet.yaml",
                "type: object\nproperties:\n  tag:\n    $ref: '#/definitions/Tag'\ndefinitions:\n  Tag:\n    type: string\n",
            ),
            (
                "https://specs.example.com/api/common.json",
                r#"{"Error": {"type": "object", "properties": {"code": {"type": "integer"}}}}"#,
            ),
        ]);

        let bundled = bundle(&doc, Some(&base()), &loader, &ParserRegistry::new())
            .await
            .unwrap();

        assert_eq!(
            bundled["components"]["schemas"]["Pet"]["properties"]["tag"],
            json!({ "type": "string" })
        );
        assert_eq!(
            bundled["components"]["schemas"]["Error"]["properties"]["code"]["type"],
            "integer"
        );
        assert!(refs::collect_refs(&bundled).is_empty());
        assert_eq!(loader.loads.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_each_document_loaded_once() {
        let doc = json!({
            "a": { "$ref": "common.json#/A" },
            "b": { "$ref": "common.json#/B" }
        });
        let loader = MemoryLoader::new(&[(
            "https://specs.example.com/api/common.json",
            r#"{"A": {"type": "string"}, "B": {"type": "integer"}}"#,
        )]);
        bundle(&doc, Some(&base()), &loader, &ParserRegistry::new())
            .await
            .unwrap();
        assert_eq!(loader.loads.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_external_without_base_fails() {
        let doc = json!({ "a": { "$ref": "common.json#/A" } });
        let loader = MemoryLoader::new(&[]);
        let err = bundle(&doc, None, &loader, &ParserRegistry::new())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Bundle(_)));
        assert!(err.to_string().contains("without a base location"));
    }

    #[tokio::test]
    async fn test_unreachable_document_fails() {
        let doc = json!({ "a": { "$ref": "missing.yaml" } });
        let loader = MemoryLoader::new(&[]);
        let err = bundle(&doc, Some(&base()), &loader, &ParserRegistry::new())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Bundle(_)));
    }

    #[tokio::test]
    async fn test_recursive_external_schema_is_hoisted() {
        let doc = json!({
            "openapi": "3.0.3",
            "a": { "$ref": "node.yaml" },
            "b": { "$ref": "node.yaml" },
            "components": { "schemas": { "node": { "type": "string" } } }
        });
        let loader = MemoryLoader::new(&[(
            "https://specs.example.com/api/node.yaml",
            "type: object\nproperties:\n  next:\n    $ref: 'node.yaml'\n",
        )]);
        let bundled = bundle(&doc, Some(&base()), &loader, &ParserRegistry::new())
            .await
            .unwrap();

        // `node` is taken, so the hoisted entry gets a suffix
        let schemas = &bundled["components"]["schemas"];
        assert_eq!(schemas["node"], json!({ "type": "string" }));
        assert_eq!(
            schemas["node_2"]["properties"]["next"],
            json!({ "$ref": "#/components/schemas/node_2" })
        );
        assert_eq!(bundled["a"], json!({ "$ref": "#/components/schemas/node_2" }));
        assert_eq!(bundled["b"], bundled["a"]);
    }

    #[tokio::test]
    async fn test_recursive_schema_keeps_its_root_name() {
        let doc = json!({
            "swagger": "2.0",
            "paths": {},
            "definitions": {
                "Node": { "$ref": "schemas/node.yaml#/Node" },
                "Tree": { "properties": { "root": { "$ref": "schemas/node.yaml#/Node" } } }
            }
        });
        let loader = MemoryLoader::new(&[(
            "https://specs.example.com/api/schemas/node.yaml",
            "Node:\n  type: object\n  properties:\n    children:\n      type: array\n      items:\n        $ref: '#/Node'\n",
        )]);
        let bundled = bundle(&doc, Some(&base()), &loader, &ParserRegistry::new())
            .await
            .unwrap();

        let definitions = bundled["definitions"].as_object().unwrap();
        assert_eq!(definitions.keys().collect::<Vec<_>>(), vec!["Node", "Tree"]);
        assert_eq!(
            definitions["Node"]["properties"]["children"]["items"],
            json!({ "$ref": "#/definitions/Node" })
        );
        assert_eq!(
            definitions["Tree"]["properties"]["root"]["properties"]["children"]["items"],
            json!({ "$ref": "#/definitions/Node" })
        );
    }

    #[tokio::test]
    async fn test_mutually_recursive_external_schemas() {
        let doc = json!({ "a": { "$ref": "a.yaml" } });
        let loader = MemoryLoader::new(&[
            (
                "https://specs.example.com/api/a.yaml",
                "properties:\n  b:\n    $ref: 'b.yaml'\n",
            ),
            (
                "https://specs.example.com/api/b.yaml",
                "properties:\n  a:\n    $ref: 'a.yaml'\n",
            ),
        ]);
        let bundled = bundle(&doc, Some(&base()), &loader, &ParserRegistry::new())
            .await
            .unwrap();

        assert_eq!(bundled["a"], json!({ "$ref": "#/components/schemas/a" }));
        assert_eq!(
            bundled["components"]["schemas"]["a"]["properties"]["b"]["properties"]["a"],
            json!({ "$ref": "#/components/schemas/a" })
        );
        assert!(refs::collect_refs(&bundled).iter().all(|r| refs::is_local(r)));
    }

    #[tokio::test]
    async fn test_circular_bare_refs_fail() {
        let doc = json!({ "a": { "$ref": "a.yaml" } });
        let loader = MemoryLoader::new(&[
            ("https://specs.example.com/api/a.yaml", "$ref: 'b.yaml'\n"),
            ("https://specs.example.com/api/b.yaml", "$ref: 'a.yaml'\n"),
        ]);
        let err = bundle(&doc, Some(&base()), &loader, &ParserRegistry::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("circular"));
    }

    #[test]
    fn test_hoisted_names() {
        let target = |location: &str, fragment: &str| Target {
            location: Url::parse(location).unwrap(),
            fragment: fragment.to_string(),
        };
        assert_eq!(hoisted_name(&target("https://h/a/node.yaml", "")), "node");
        assert_eq!(hoisted_name(&target("https://h/m.yaml", "/defs/Pet%20Info")), "Pet_Info");
        assert_eq!(hoisted_name(&target("https://h/m.yaml", "/defs/a~1b/")), "a_b");
        assert_eq!(hoisted_name(&target("https://h/", "")), "Schema");
    }

    #[tokio::test]
    async fn test_bundling_is_idempotent() {
        let doc = json!({
            "components": {
                "schemas": {
                    "Pet": { "$ref": "pet.json" },
                    "Pets": { "type": "array", "items": { "$ref": "#/components/schemas/Pet" } }
                }
            }
        });
        let loader = MemoryLoader::new(&[(
            "https://specs.example.com/api/pet.json",
            r#"{"type": "object"}"#,
        )]);
        let parsers = ParserRegistry::new();
        let once = bundle(&doc, Some(&base()), &loader, &parsers).await.unwrap();
        let twice = bundle(&once, Some(&base()), &loader, &parsers).await.unwrap();
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_hoisted_bundle_is_idempotent() {
        let doc = json!({ "swagger": "2.0", "a": { "$ref": "node.yaml" } });
        let loader = MemoryLoader::new(&[(
            "https://specs.example.com/api/node.yaml",
            "properties:\n  next:\n    $ref: '#'\n",
        )]);
        let parsers = ParserRegistry::new();
        let once = bundle(&doc, Some(&base()), &loader, &parsers).await.unwrap();
        assert_eq!(once["a"], json!({ "$ref": "#/definitions/node" }));

        let twice = bundle(&once, Some(&base()), &loader, &parsers).await.unwrap();
        assert_eq!(once, twice);
    }
}
