//! In-memory page model
//!
//! A small element tree with attributes, inline styles and a separate table
//! of "computed" styles standing in for stylesheet-derived values. Pages are
//! built from [`NodeSpec`] trees, either in code or from a JSON fixture.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use super::selector::{Matchable, Selector};
use super::{Dom, NodeId, Scope};

/// Declarative element description used to build pages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
    pub tag: String,
    pub id: Option<String>,
    pub class: Vec<String>,
    pub attrs: BTreeMap<String, String>,
    /// Inline `style` declarations
    pub style: BTreeMap<String, String>,
    /// Values reported by `computed_style` when no inline value is set
    pub computed: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.class.push(class.to_string());
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_style(mut self, property: &str, value: &str) -> Self {
        self.style.insert(property.to_string(), value.to_string());
        self
    }

    pub fn with_computed(mut self, property: &str, value: &str) -> Self {
        self.computed.insert(property.to_string(), value.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// JSON page fixture: computed root/body layout plus the body's children
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageFixture {
    pub root_computed: BTreeMap<String, String>,
    pub body_computed: BTreeMap<String, String>,
    pub body: Vec<NodeSpec>,
}

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    attrs: BTreeMap<String, String>,
    inline: BTreeMap<String, String>,
    computed: BTreeMap<String, String>,
    text: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl NodeData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            inline: BTreeMap::new(),
            computed: BTreeMap::new(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
        }
    }
}

impl Matchable for NodeData {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn id(&self) -> Option<&str> {
        self.attrs.get("id").map(String::as_str)
    }

    fn has_class(&self, class: &str) -> bool {
        self.attrs
            .get("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }
}

#[derive(Debug)]
struct Tree {
    nodes: Vec<NodeData>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
}

impl Tree {
    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(data);
        self.nodes.len() - 1
    }

    fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node].parent.take() {
            self.nodes[parent].children.retain(|&c| c != node);
        }
    }

    fn build(&mut self, spec: &NodeSpec) -> NodeId {
        let mut data = NodeData::new(&spec.tag);
        data.attrs = spec.attrs.clone();
        if let Some(id) = &spec.id {
            data.attrs.insert("id".to_string(), id.clone());
        }
        if !spec.class.is_empty() {
            data.attrs.insert("class".to_string(), spec.class.join(" "));
        }
        data.inline = spec.style.clone();
        data.computed = spec.computed.clone();
        data.text = spec.text.clone();

        let node = self.push(data);
        for child in &spec.children {
            let child = self.build(child);
            self.append(node, child);
        }
        node
    }

    fn clone_subtree(&mut self, node: NodeId) -> NodeId {
        let mut data = self.nodes[node].clone();
        let children = std::mem::take(&mut data.children);
        data.parent = None;
        let copy = self.push(data);
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.append(copy, child_copy);
        }
        copy
    }

    /// Pre-order traversal of the attached tree
    fn document_order(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            order.push(node);
            stack.extend(self.nodes[node].children.iter().rev());
        }
        order
    }

    fn ancestors(&self, node: NodeId) -> impl Iterator<Item = &NodeData> + '_ {
        std::iter::successors(self.nodes[node].parent, |&n| self.nodes[n].parent)
            .map(|n| &self.nodes[n])
    }

    fn text(&self, node: NodeId, out: &mut String) {
        out.push_str(&self.nodes[node].text);
        for &child in &self.nodes[node].children {
            self.text(child, out);
        }
    }
}

/// Thread-safe in-memory [`Dom`]
#[derive(Debug)]
pub struct MemoryDom {
    tree: Mutex<Tree>,
}

impl MemoryDom {
    /// `<html><head/><body>children</body></html>`
    pub fn from_body(children: Vec<NodeSpec>) -> Self {
        Self::from_fixture(PageFixture {
            body: children,
            ..Default::default()
        })
    }

    pub fn from_fixture(fixture: PageFixture) -> Self {
        let mut tree = Tree {
            nodes: Vec::new(),
            root: 0,
            head: 0,
            body: 0,
        };
        let mut root = NodeData::new("html");
        root.computed = fixture.root_computed;
        tree.root = tree.push(root);
        tree.head = tree.push(NodeData::new("head"));
        let mut body = NodeData::new("body");
        body.computed = fixture.body_computed;
        tree.body = tree.push(body);
        tree.append(tree.root, tree.head);
        tree.append(tree.root, tree.body);

        for spec in &fixture.body {
            let node = tree.build(spec);
            tree.append(tree.body, node);
        }
        Self {
            tree: Mutex::new(tree),
        }
    }

    /// Load a [`PageFixture`] JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context(format!("Failed to read page fixture {}", path.display()))?;
        let fixture: PageFixture = serde_json::from_str(&contents)
            .context(format!("Failed to parse page fixture {}", path.display()))?;
        Ok(Self::from_fixture(fixture))
    }

    /// Set a stylesheet-derived value
    pub fn set_computed_style(&self, node: NodeId, property: &str, value: &str) {
        self.lock().nodes[node]
            .computed
            .insert(property.to_string(), value.to_string());
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.lock().nodes[node].children.clone()
    }

    pub fn tag(&self, node: NodeId) -> String {
        self.lock().nodes[node].tag.clone()
    }

    /// Number of elements attached to the document
    pub fn connected_count(&self) -> usize {
        self.lock().document_order().len()
    }

    /// Nodes ever allocated, attached or not; detached nodes are not reclaimed
    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }

    /// All inline declarations of `node`
    pub fn inline_styles(&self, node: NodeId) -> BTreeMap<String, String> {
        self.lock().nodes[node].inline.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Dom for MemoryDom {
    fn query(&self, selector: &str) -> Option<NodeId> {
        let Some(parsed) = Selector::parse(selector) else {
            warn!(selector, "Unsupported selector");
            return None;
        };
        let tree = self.lock();
        tree.document_order()
            .into_iter()
            .find(|&node| parsed.matches(&tree.nodes[node], tree.ancestors(node)))
    }

    fn first_descendant(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        let tree = self.lock();
        let mut stack: Vec<NodeId> = tree.nodes[node].children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            if tree.nodes[current].tag.eq_ignore_ascii_case(tag) {
                return Some(current);
            }
            stack.extend(tree.nodes[current].children.iter().rev());
        }
        None
    }

    fn scope(&self, scope: Scope) -> NodeId {
        let tree = self.lock();
        match scope {
            Scope::Root => tree.root,
            Scope::Body => tree.body,
        }
    }

    fn head(&self) -> NodeId {
        self.lock().head
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.lock().nodes[node].attrs.get(name).cloned()
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        self.lock().nodes[node]
            .attrs
            .insert(name.to_string(), value.to_string());
    }

    fn remove_attribute(&self, node: NodeId, name: &str) {
        self.lock().nodes[node].attrs.remove(name);
    }

    fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.lock().text(node, &mut out);
        out
    }

    fn set_text(&self, node: NodeId, text: &str) {
        let mut tree = self.lock();
        let children = std::mem::take(&mut tree.nodes[node].children);
        for child in children {
            tree.nodes[child].parent = None;
        }
        tree.nodes[node].text = text.to_string();
    }

    fn inline_style(&self, node: NodeId, property: &str) -> Option<String> {
        self.lock().nodes[node].inline.get(property).cloned()
    }

    fn set_inline_style(&self, node: NodeId, property: &str, value: Option<&str>) {
        let mut tree = self.lock();
        let inline = &mut tree.nodes[node].inline;
        match value {
            Some(value) => {
                inline.insert(property.to_string(), value.to_string());
            }
            None => {
                inline.remove(property);
            }
        }
    }

    fn computed_style(&self, node: NodeId, property: &str) -> Option<String> {
        let tree = self.lock();
        let data = &tree.nodes[node];
        data.inline
            .get(property)
            .or_else(|| data.computed.get(property))
            .cloned()
    }

    fn create_element(&self, tag: &str, id: Option<&str>) -> NodeId {
        let mut data = NodeData::new(tag);
        if let Some(id) = id {
            data.attrs.insert("id".to_string(), id.to_string());
        }
        self.lock().push(data)
    }

    fn append_child(&self, parent: NodeId, child: NodeId) {
        self.lock().append(parent, child);
    }

    fn deep_clone(&self, node: NodeId) -> NodeId {
        self.lock().clone_subtree(node)
    }

    fn remove(&self, node: NodeId) {
        self.lock().detach(node);
    }

    fn is_connected(&self, node: NodeId) -> bool {
        let tree = self.lock();
        let mut current = node;
        loop {
            if current == tree.root {
                return true;
            }
            match tree.nodes[current].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }
}
