//! Schema model consumed by the store
//!
//! A [`Specification`] is a read-only tree of [`SpecificationElement`]s. The
//! root element's properties are the managed domains (entities). The store
//! reads it for one thing: finding which paths hold references to other
//! documents, and which target entities each of them may name.
//!
//! Specifications are produced upstream; the builder constructors here mirror
//! the shapes an upstream schema parser emits and are what tests use.
//!
//! ```
//! use chronodoc_core::specification::{Specification, SpecificationElement as E};
//!
//! let spec = Specification::with_managed(vec![
//!     E::managed("Address", vec![E::string("city")]),
//!     E::managed("Person", vec![
//!         E::string("firstname"),
//!         E::reference("home", ["Address"]),
//!     ]),
//! ]);
//!
//! let refs = spec.reference_paths("Person");
//! assert_eq!(refs.len(), 1);
//! assert_eq!(refs[0].path.to_string(), "$.home");
//! ```

use crate::json::JsonPath;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Role of an element in the schema tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElementType {
    /// The single root of the tree
    Root,
    /// A managed domain (top-level entity)
    Managed,
    /// A value embedded in its parent document
    Embedded,
    /// A reference to another document
    Ref,
}

/// JSON type an element may take
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    /// JSON string
    String,
    /// JSON number
    Number,
    /// JSON boolean
    Boolean,
    /// JSON object
    Object,
    /// JSON array
    Array,
}

/// One node of the schema tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificationElement {
    name: String,
    element_type: ElementType,
    json_types: BTreeSet<JsonType>,
    #[serde(default)]
    ref_types: BTreeSet<String>,
    #[serde(default)]
    properties: BTreeMap<String, SpecificationElement>,
    #[serde(default)]
    items: Option<Box<SpecificationElement>>,
    #[serde(default)]
    required: BTreeSet<String>,
}

impl SpecificationElement {
    fn leaf(name: impl Into<String>, element_type: ElementType, json_type: JsonType) -> Self {
        SpecificationElement {
            name: name.into(),
            element_type,
            json_types: BTreeSet::from([json_type]),
            ref_types: BTreeSet::new(),
            properties: BTreeMap::new(),
            items: None,
            required: BTreeSet::new(),
        }
    }

    fn with_properties(
        name: impl Into<String>,
        element_type: ElementType,
        properties: Vec<SpecificationElement>,
    ) -> Self {
        let mut element = SpecificationElement::leaf(name, element_type, JsonType::Object);
        element.properties = properties
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        element
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// Embedded string property
    pub fn string(name: impl Into<String>) -> Self {
        SpecificationElement::leaf(name, ElementType::Embedded, JsonType::String)
    }

    /// Embedded number property
    pub fn number(name: impl Into<String>) -> Self {
        SpecificationElement::leaf(name, ElementType::Embedded, JsonType::Number)
    }

    /// Embedded boolean property
    pub fn boolean(name: impl Into<String>) -> Self {
        SpecificationElement::leaf(name, ElementType::Embedded, JsonType::Boolean)
    }

    /// Embedded array whose elements follow `items`
    pub fn array(name: impl Into<String>, items: SpecificationElement) -> Self {
        let mut element = SpecificationElement::leaf(name, ElementType::Embedded, JsonType::Array);
        element.items = Some(Box::new(items));
        element
    }

    /// Single reference to a document of one of `ref_types`
    pub fn reference<I, S>(name: impl Into<String>, ref_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut element = SpecificationElement::leaf(name, ElementType::Ref, JsonType::String);
        element.ref_types = ref_types.into_iter().map(Into::into).collect();
        element
    }

    /// Array of references to documents of `ref_types`
    pub fn array_reference<I, S>(name: impl Into<String>, ref_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut element = SpecificationElement::leaf(name, ElementType::Ref, JsonType::Array);
        element.ref_types = ref_types.into_iter().map(Into::into).collect();
        element.items = Some(Box::new(SpecificationElement::string("items")));
        element
    }

    /// Embedded object with the given properties
    pub fn object(name: impl Into<String>, properties: Vec<SpecificationElement>) -> Self {
        SpecificationElement::with_properties(name, ElementType::Embedded, properties)
    }

    /// Managed domain (entity) with the given properties
    pub fn managed(name: impl Into<String>, properties: Vec<SpecificationElement>) -> Self {
        SpecificationElement::with_properties(name, ElementType::Managed, properties)
    }

    /// Mark properties as required
    pub fn with_required<I, S>(mut self, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(required.into_iter().map(Into::into));
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Property name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role in the tree
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// JSON types this element accepts
    pub fn json_types(&self) -> &BTreeSet<JsonType> {
        &self.json_types
    }

    /// Entities a reference may target (empty for non-references)
    pub fn ref_types(&self) -> &BTreeSet<String> {
        &self.ref_types
    }

    /// Child elements of an object element
    pub fn properties(&self) -> &BTreeMap<String, SpecificationElement> {
        &self.properties
    }

    /// Element type of array members
    pub fn items(&self) -> Option<&SpecificationElement> {
        self.items.as_deref()
    }

    /// Names of required properties
    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }

    /// True if this element accepts `json_type`
    pub fn accepts(&self, json_type: JsonType) -> bool {
        self.json_types.contains(&json_type)
    }
}

/// A reference-valued location inside an entity's documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePath {
    /// Schema path; ends in `[]` for arrays of references
    pub path: JsonPath,
    /// Entities the reference may target
    pub ref_types: BTreeSet<String>,
}

/// Read-only schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    root: SpecificationElement,
}

impl Specification {
    /// Wrap an existing root element
    pub fn new(root: SpecificationElement) -> Self {
        Specification { root }
    }

    /// Build a specification whose root holds the given managed domains
    pub fn with_managed(managed: Vec<SpecificationElement>) -> Self {
        Specification {
            root: SpecificationElement::with_properties("root", ElementType::Root, managed),
        }
    }

    /// The root element
    pub fn root_element(&self) -> &SpecificationElement {
        &self.root
    }

    /// Names of all managed domains, sorted
    pub fn managed_domains(&self) -> BTreeSet<&str> {
        self.root.properties.keys().map(String::as_str).collect()
    }

    /// Root element of one managed domain
    pub fn element(&self, entity: &str) -> Option<&SpecificationElement> {
        self.root.properties.get(entity)
    }

    /// Every reference-valued schema path of `entity`
    ///
    /// Empty when the entity is unknown or holds no references. Reference
    /// elements are not descended into.
    pub fn reference_paths(&self, entity: &str) -> Vec<ReferencePath> {
        let mut out = Vec::new();
        if let Some(element) = self.element(entity) {
            for child in element.properties.values() {
                collect_references(child, JsonPath::root().key(child.name.clone()), &mut out);
            }
        }
        out
    }
}

fn collect_references(
    element: &SpecificationElement,
    path: JsonPath,
    out: &mut Vec<ReferencePath>,
) {
    if element.element_type == ElementType::Ref {
        let path = if element.accepts(JsonType::Array) {
            path.any_index()
        } else {
            path
        };
        out.push(ReferencePath {
            path,
            ref_types: element.ref_types.clone(),
        });
        return;
    }
    for child in element.properties.values() {
        collect_references(child, path.clone().key(child.name.clone()), out);
    }
    if let Some(items) = element.items() {
        collect_references(items, path.any_index(), out);
    }
}
