use crate::location::Location;
use crate::patch::{decode_buffer, encode_buffer, DocumentChange, Patch, PatchEvent, Setter};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Maximum number of binding rounds a single mutation may trigger.
pub const MAX_CASCADE_ROUNDS: usize = 32;

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Unique id within the document.
    pub id: String,
    /// Type name, e.g. `"MultiSelect"`.
    pub kind: String,
    /// JSON attributes.
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Binary attributes, base64 encoded when serialized.
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        with = "binary_attributes"
    )]
    pub binary: BTreeMap<String, Vec<u8>>,
}

impl Model {
    /// Create a model without attributes.
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            attributes: Map::new(),
            binary: BTreeMap::new(),
        }
    }

    /// Set an attribute while building the model.
    pub fn with(mut self, attr: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(attr.into(), value);
        self
    }

    /// Get an attribute value.
    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.attributes.get(attr)
    }
}

mod binary_attributes {
    use super::{decode_buffer, encode_buffer};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, Vec<u8>>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let encoded: BTreeMap<&String, String> =
            map.iter().map(|(k, v)| (k, encode_buffer(v))).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<BTreeMap<String, Vec<u8>>, D::Error> {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(k, v)| {
                decode_buffer(&v)
                    .map(|data| (k, data))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

/// Handle returned by [`Document::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

type Subscriber = Box<dyn FnMut(&DocumentChange) + Send>;
type BindingFn = Box<dyn FnMut(&Document) -> Patch + Send>;

struct Binding {
    model: String,
    attrs: Vec<String>,
    callback: BindingFn,
}

impl Binding {
    fn watches(&self, model: &str, attr: &str) -> bool {
        self.model == model && self.attrs.iter().any(|a| a == attr)
    }
}

#[derive(Serialize, Deserialize)]
struct DocumentSnapshot {
    id: String,
    title: String,
    roots: Vec<String>,
    models: Vec<Model>,
}

/// Initial render payload for the host.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPayload {
    /// Serialized documents keyed by document id.
    pub docs_json: String,
    /// Which roots of which document to render.
    pub render_items: Value,
    /// Root model ids.
    pub root_ids: Vec<String>,
}

/// In-memory state tree of an interactive application.
pub struct Document {
    id: String,
    title: String,
    roots: Vec<String>,
    models: BTreeMap<String, Model>,
    location: Option<Location>,
    bindings: Vec<Binding>,
    subscribers: BTreeMap<u64, Subscriber>,
    next_subscription: u64,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("roots", &self.roots)
            .field("models", &self.models)
            .field("location", &self.location)
            .field("bindings", &self.bindings.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new("")
    }
}

impl Document {
    /// Create an empty document with a random id.
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_id(hex::encode(rand::random::<[u8; 8]>()), title)
    }

    /// Create an empty document with the given id.
    pub fn with_id(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            roots: Vec::new(),
            models: BTreeMap::new(),
            location: None,
            bindings: Vec::new(),
            subscribers: BTreeMap::new(),
            next_subscription: 1,
        }
    }

    /// Document id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Document title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Root model ids in render order.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Look up a model.
    pub fn model(&self, id: &str) -> Option<&Model> {
        self.models.get(id)
    }

    /// All models, ordered by id.
    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    /// Look up a JSON attribute.
    pub fn attr(&self, model: &str, attr: &str) -> Option<&Value> {
        self.models.get(model).and_then(|m| m.get(attr))
    }

    /// Look up a binary attribute.
    pub fn binary(&self, model: &str, attr: &str) -> Option<&[u8]> {
        self.models
            .get(model)
            .and_then(|m| m.binary.get(attr))
            .map(Vec::as_slice)
    }

    /// Navigation state, if the application uses it.
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Mutable navigation state, if the application uses it.
    pub fn location_mut(&mut self) -> Option<&mut Location> {
        self.location.as_mut()
    }

    /// Give the document a (read-only) location.
    pub fn enable_location(&mut self) -> &mut Location {
        self.location.get_or_insert_with(Location::new)
    }

    /// Add a root model.
    pub fn add_root(&mut self, model: Model) -> Result<()> {
        self.mutate(Patch::new().added(model, true), None)
    }

    /// Add a non-root model.
    pub fn add_model(&mut self, model: Model) -> Result<()> {
        self.mutate(Patch::new().added(model, false), None)
    }

    /// Remove a root model.
    pub fn remove_root(&mut self, id: &str) -> Result<()> {
        let patch = Patch {
            events: vec![PatchEvent::RootRemoved {
                model: id.to_string(),
            }],
            buffers: Vec::new(),
        };
        self.mutate(patch, None)
    }

    /// Set a JSON attribute.
    pub fn set(&mut self, model: &str, attr: &str, value: Value) -> Result<()> {
        self.mutate(Patch::new().changed(model, attr, value), None)
    }

    /// Set a binary attribute.
    pub fn set_binary(&mut self, model: &str, attr: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        self.mutate(Patch::new().binary(model, attr, data), None)
    }

    /// Apply a patch received from elsewhere.
    ///
    /// The patch is validated as a whole first; nothing is applied when any
    /// event is invalid.
    pub fn apply_patch(&mut self, patch: &Patch, setter: Option<Setter>) -> Result<()> {
        self.mutate(patch.clone(), setter)
    }

    /// Run `callback` whenever one of `attrs` of `model` changes.
    ///
    /// The returned patch is applied as a local change.
    pub fn bind<F>(&mut self, model: impl Into<String>, attrs: &[&str], callback: F)
    where
        F: FnMut(&Document) -> Patch + Send + 'static,
    {
        self.bindings.push(Binding {
            model: model.into(),
            attrs: attrs.iter().map(|a| a.to_string()).collect(),
            callback: Box::new(callback),
        });
    }

    /// Observe completed mutations.
    pub fn subscribe<F>(&mut self, on_mutate: F) -> SubscriptionHandle
    where
        F: FnMut(&DocumentChange) + Send + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription = self.next_subscription.saturating_add(1);
        self.subscribers.insert(id, Box::new(on_mutate));
        SubscriptionHandle(id)
    }

    /// Stop observing mutations.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.subscribers.remove(&handle.0).is_some()
    }

    /// Serialize the document tree.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Rebuild a document tree; bindings and subscriptions are not carried.
    pub fn from_json(data: &str) -> Result<Self> {
        let snapshot: DocumentSnapshot = serde_json::from_str(data)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Build the initial render payload.
    pub fn render_payload(&self) -> Result<RenderPayload> {
        let mut docs = Map::new();
        docs.insert(self.id.clone(), serde_json::to_value(self.snapshot())?);

        let roots: Map<String, Value> = self
            .roots
            .iter()
            .map(|id| (id.clone(), Value::String(format!("element-{}", id))))
            .collect();

        Ok(RenderPayload {
            docs_json: serde_json::to_string(&docs)?,
            render_items: json!([{ "docid": self.id, "roots": roots }]),
            root_ids: self.roots.clone(),
        })
    }

    /// Rebuild the document referenced by the first render item.
    pub fn from_render(docs_json: &str, render_items: &Value) -> Result<Self> {
        let docid = render_items
            .get(0)
            .and_then(|item| item.get("docid"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidRender("render item without docid".to_string()))?;

        let mut docs: BTreeMap<String, DocumentSnapshot> = serde_json::from_str(docs_json)?;
        let mut snapshot = docs
            .remove(docid)
            .ok_or_else(|| Error::InvalidRender(format!("document {} not in docs_json", docid)))?;
        snapshot.id = docid.to_string();
        Ok(Self::from_snapshot(snapshot))
    }

    fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            id: self.id.clone(),
            title: self.title.clone(),
            roots: self.roots.clone(),
            models: self.models.values().cloned().collect(),
        }
    }

    fn from_snapshot(snapshot: DocumentSnapshot) -> Self {
        let mut document = Self::with_id(snapshot.id, snapshot.title);
        document.roots = snapshot.roots;
        document.models = snapshot
            .models
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();
        document
    }

    fn mutate(&mut self, patch: Patch, setter: Option<Setter>) -> Result<()> {
        self.validate(&patch)?;
        let mut direct = self.apply(patch);
        let mut follow_up = Patch::new();
        let result = self.cascade(&direct, &mut follow_up);

        if setter.is_none() {
            direct.extend(follow_up);
            self.notify(direct, None);
        } else {
            self.notify(direct, setter);
            self.notify(follow_up, None);
        }
        result
    }

    fn cascade(&mut self, direct: &Patch, follow_up: &mut Patch) -> Result<()> {
        let mut triggered = self.triggered_bindings(direct);
        let mut rounds = 0;

        while !triggered.is_empty() {
            rounds += 1;
            if rounds > MAX_CASCADE_ROUNDS {
                return Err(Error::CascadeLimit(MAX_CASCADE_ROUNDS));
            }
            let produced = self.run_bindings(&triggered);
            self.validate(&produced)?;
            let effective = self.apply(produced);
            triggered = self.triggered_bindings(&effective);
            follow_up.extend(effective);
        }
        Ok(())
    }

    fn validate(&self, patch: &Patch) -> Result<()> {
        let mut added: HashSet<&str> = HashSet::new();
        let mut removed: HashSet<&str> = HashSet::new();
        let exists = |id: &str, added: &HashSet<&str>, removed: &HashSet<&str>| {
            (self.models.contains_key(id) || added.contains(id)) && !removed.contains(id)
        };

        for event in &patch.events {
            match event {
                PatchEvent::ModelAdded { model, .. } => {
                    if exists(&model.id, &added, &removed) {
                        return Err(Error::DuplicateModel(model.id.clone()));
                    }
                    removed.remove(model.id.as_str());
                    added.insert(&model.id);
                }
                PatchEvent::ModelChanged { model, .. } => {
                    if !exists(model, &added, &removed) {
                        return Err(Error::UnknownModel(model.clone()));
                    }
                }
                PatchEvent::BinaryChanged { model, buffer, .. } => {
                    if !exists(model, &added, &removed) {
                        return Err(Error::UnknownModel(model.clone()));
                    }
                    if *buffer >= patch.buffers.len() {
                        return Err(Error::MissingBuffer(*buffer));
                    }
                }
                PatchEvent::RootRemoved { model } => {
                    if !exists(model, &added, &removed) {
                        return Err(Error::UnknownModel(model.clone()));
                    }
                    removed.insert(model);
                }
            }
        }
        Ok(())
    }

    /// Apply a validated patch and return the events that changed something.
    fn apply(&mut self, patch: Patch) -> Patch {
        let mut effective = Patch::new();

        for event in patch.events {
            match event {
                PatchEvent::ModelChanged { model, attr, new } => {
                    let Some(target) = self.models.get_mut(&model) else {
                        continue;
                    };
                    if target.attributes.get(&attr) == Some(&new) {
                        continue;
                    }
                    target.attributes.insert(attr.clone(), new.clone());
                    effective = effective.changed(model, attr, new);
                }
                PatchEvent::BinaryChanged {
                    model,
                    attr,
                    buffer,
                } => {
                    let (Some(target), Some(data)) =
                        (self.models.get_mut(&model), patch.buffers.get(buffer))
                    else {
                        continue;
                    };
                    if target.binary.get(&attr) == Some(data) {
                        continue;
                    }
                    target.binary.insert(attr.clone(), data.clone());
                    effective = effective.binary(model, attr, data.clone());
                }
                PatchEvent::ModelAdded { model, root } => {
                    if root {
                        self.roots.push(model.id.clone());
                    }
                    self.models.insert(model.id.clone(), model.clone());
                    effective = effective.added(model, root);
                }
                PatchEvent::RootRemoved { model } => {
                    self.roots.retain(|r| r != &model);
                    if self.models.remove(&model).is_some() {
                        effective.events.push(PatchEvent::RootRemoved { model });
                    }
                }
            }
        }
        effective
    }

    fn triggered_bindings(&self, patch: &Patch) -> Vec<usize> {
        self.bindings
            .iter()
            .enumerate()
            .filter(|(_, binding)| {
                patch
                    .events
                    .iter()
                    .filter_map(PatchEvent::target)
                    .any(|(model, attr)| binding.watches(model, attr))
            })
            .map(|(index, _)| index)
            .collect()
    }

    fn run_bindings(&mut self, triggered: &[usize]) -> Patch {
        let mut bindings = std::mem::take(&mut self.bindings);
        let mut produced = Patch::new();
        for index in triggered {
            if let Some(binding) = bindings.get_mut(*index) {
                produced.extend((binding.callback)(self));
            }
        }
        self.bindings = bindings;
        produced
    }

    fn notify(&mut self, patch: Patch, setter: Option<Setter>) {
        if patch.is_empty() {
            return;
        }
        let change = DocumentChange { patch, setter };
        for subscriber in self.subscribers.values_mut() {
            subscriber(&change);
        }
    }
}
