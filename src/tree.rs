//! The Query Tree: one node per distinct field path touched by a query.
//!
//! The planner grows the tree while resolving paths; the materializer walks
//! it to decide which values to emit. Nodes live in an arena owned by
//! [`QueryTree`] and refer to each other through [`NodeId`]s, so a node's
//! parent link is a plain index rather than a back-pointer.
//!
//! ```text
//! project
//!     name [SELECT]
//!     owner -> user [SELECT|WHERE]
//!         login [SELECT]
//!         company [WHERE]
//! ```

use std::fmt;

use crate::catalog::Cardinality;

/// Index of a [`TreeNode`] in its [`QueryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// The clause that referenced a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Select,
    GroupBy,
    OrderBy,
    Where,
}

impl Command {
    const ALL: [Command; 4] = [
        Command::Select,
        Command::GroupBy,
        Command::OrderBy,
        Command::Where,
    ];

    fn bit(self) -> u8 {
        match self {
            Command::Select => 1,
            Command::GroupBy => 1 << 1,
            Command::OrderBy => 1 << 2,
            Command::Where => 1 << 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Select => "SELECT",
            Command::GroupBy => "GROUPBY",
            Command::OrderBy => "ORDERBY",
            Command::Where => "WHERE",
        }
    }
}

/// A small set of [`Command`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandSet(u8);

impl CommandSet {
    pub fn insert(&mut self, command: Command) {
        self.0 |= command.bit();
    }

    pub fn contains(self, command: Command) -> bool {
        self.0 & command.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Command> {
        Command::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl fmt::Display for CommandSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Command::name).collect();
        write!(f, "{}", names.join("|"))
    }
}

/// A terminal plain field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub name: String,
    pub commands: CommandSet,
}

/// An entity reached from the root, directly or through relations.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Relation name used to reach this node (the model name for the root).
    pub name: String,
    /// Entity the node's rows belong to.
    pub entity: String,
    /// Set when the entity was already joined under its own name.
    pub alias: Option<String>,
    /// How the parent reaches this node. `None` for the root.
    pub cardinality: Option<Cardinality>,
    /// Junction field leading to the real target, for many-to-many nodes.
    pub shadow_field: Option<String>,
    pub commands: CommandSet,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    fields: Vec<FieldNode>,
}

impl TreeNode {
    pub fn new(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            alias: None,
            cardinality: None,
            shadow_field: None,
            commands: CommandSet::default(),
            parent: None,
            children: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    pub fn with_shadow_field(mut self, field: impl Into<String>) -> Self {
        self.shadow_field = Some(field.into());
        self
    }

    /// The name this node's entity is referenced by in the compiled query.
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.entity)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn fields(&self) -> &[FieldNode] {
        &self.fields
    }

    /// Whether the parent reaches more than one row through this node.
    pub fn is_collection(&self) -> bool {
        matches!(
            self.cardinality,
            Some(Cardinality::OneToMany | Cardinality::ManyToMany)
        )
    }
}

/// An item produced by [`QueryTree::iter`].
#[derive(Debug, Clone, Copy)]
pub enum TreeItem<'a> {
    Node(NodeId, &'a TreeNode),
    /// A field together with the node that owns it.
    Field(NodeId, &'a FieldNode),
}

/// Arena holding every node of one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTree {
    nodes: Vec<TreeNode>,
}

impl QueryTree {
    /// A tree whose root is the queried model.
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            nodes: vec![TreeNode::new(model.clone(), model)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn field_count(&self) -> usize {
        self.nodes.iter().map(|n| n.fields.len()).sum()
    }

    /// Attach `node` under `parent` and return its id.
    pub fn add_child(&mut self, parent: NodeId, mut node: TreeNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Attach a field under `parent` and return it for tagging.
    pub fn add_field(&mut self, parent: NodeId, name: impl Into<String>) -> &mut FieldNode {
        let fields = &mut self.nodes[parent.0].fields;
        fields.push(FieldNode {
            name: name.into(),
            commands: CommandSet::default(),
        });
        let last = fields.len() - 1;
        &mut fields[last]
    }

    /// Child reached through relation `name`.
    pub fn get_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|&child| self.node(child).name == name)
    }

    pub fn get_field(&self, parent: NodeId, name: &str) -> Option<&FieldNode> {
        self.node(parent).fields.iter().find(|f| f.name == name)
    }

    pub fn get_field_mut(&mut self, parent: NodeId, name: &str) -> Option<&mut FieldNode> {
        self.node_mut(parent)
            .fields
            .iter_mut()
            .find(|f| f.name == name)
    }

    /// Pre-order walk: each node, then its fields, then its children.
    pub fn iter(&self) -> impl Iterator<Item = TreeItem<'_>> {
        let mut items = Vec::new();
        self.collect(self.root(), &mut items);
        items.into_iter()
    }

    fn collect<'a>(&'a self, id: NodeId, out: &mut Vec<TreeItem<'a>>) {
        let node = self.node(id);
        out.push(TreeItem::Node(id, node));
        out.extend(node.fields.iter().map(|f| TreeItem::Field(id, f)));
        for &child in &node.children {
            self.collect(child, out);
        }
    }

    fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.node(parent).parent;
        }
        depth
    }
}

impl fmt::Display for QueryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in self.iter() {
            match item {
                TreeItem::Node(id, node) => {
                    let depth = self.depth(id);
                    write!(f, "{}", "    ".repeat(depth))?;
                    if node.parent.is_none() {
                        write!(f, "{}", node.name)?;
                    } else {
                        write!(f, "{} -> {}", node.name, node.entity)?;
                    }
                    if let Some(alias) = &node.alias {
                        write!(f, " AS {}", alias)?;
                    }
                    if let Some(shadow) = &node.shadow_field {
                        write!(f, " via {}", shadow)?;
                    }
                    if !node.commands.is_empty() {
                        write!(f, " [{}]", node.commands)?;
                    }
                    writeln!(f)?;
                }
                TreeItem::Field(owner, field) => {
                    let depth = self.depth(owner) + 1;
                    write!(f, "{}{}", "    ".repeat(depth), field.name)?;
                    if !field.commands.is_empty() {
                        write!(f, " [{}]", field.commands)?;
                    }
                    writeln!(f)?;
                }
            }
        }
        Ok(())
    }
}
