//! The Group / Script / Step tree, represented as an arena of nodes
//! addressed by index. Parent links are plain `NodeId`s — never a second
//! owning edge — so there is no `Rc<RefCell<_>>` anywhere in the tree.

use crate::artifact::LinkType;
use crate::dependency::Dependency;
use crate::error::{CoreError, CoreResult};

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepFlags {
    pub always: bool,
    pub sudo: bool,
}

#[derive(Debug)]
pub struct GroupData {
    pub name: String,
    pub parent: Option<NodeId>,
    /// Sorted by name; a Group's children may be other Groups or Scripts.
    pub children: Vec<NodeId>,
}

#[derive(Debug)]
pub struct ScriptData {
    pub name: String,
    pub parent: Option<NodeId>,
    /// Declaration order, not sorted.
    pub steps: Vec<NodeId>,
}

#[derive(Debug)]
pub struct StepData {
    pub name: String,
    pub parent: NodeId,
    pub artifacts: Vec<(String, LinkType)>,
    pub dependencies: Vec<Dependency>,
    pub completed: bool,
    pub flags: StepFlags,
}

#[derive(Debug)]
pub enum Node {
    Group(GroupData),
    Script(ScriptData),
    Step(StepData),
}

/// Owns every unit. The root Group is index 0 and contributes nothing to
/// canonical paths.
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    pub fn new(root_name: impl Into<String>) -> Self {
        let root = Node::Group(GroupData {
            name: root_name.into(),
            parent: None,
            children: Vec::new(),
        });
        Self {
            nodes: vec![root],
            root: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn name(&self, id: NodeId) -> &str {
        match &self.nodes[id] {
            Node::Group(g) => &g.name,
            Node::Script(s) => &s.name,
            Node::Step(s) => &s.name,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        match &self.nodes[id] {
            Node::Group(g) => g.parent,
            Node::Script(s) => s.parent,
            Node::Step(s) => Some(s.parent),
        }
    }

    pub fn group_children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id] {
            Node::Group(g) => &g.children,
            _ => panic!("not a group"),
        }
    }

    pub fn script_steps(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id] {
            Node::Script(s) => &s.steps,
            _ => panic!("not a script"),
        }
    }

    pub fn add_group(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let name = name.into();
        let id = self.nodes.len();
        self.nodes.push(Node::Group(GroupData {
            name: name.clone(),
            parent: Some(parent),
            children: Vec::new(),
        }));
        self.insert_sorted_child(parent, &name, id);
        id
    }

    pub fn add_script(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let name = name.into();
        let id = self.nodes.len();
        self.nodes.push(Node::Script(ScriptData {
            name: name.clone(),
            parent: Some(parent),
            steps: Vec::new(),
        }));
        self.insert_sorted_child(parent, &name, id);
        id
    }

    pub fn add_step(
        &mut self,
        script: NodeId,
        name: impl Into<String>,
        artifacts: Vec<(String, LinkType)>,
        dependencies: Vec<Dependency>,
        flags: StepFlags,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::Step(StepData {
            name: name.into(),
            parent: script,
            artifacts,
            dependencies,
            completed: false,
            flags,
        }));
        match &mut self.nodes[script] {
            Node::Script(s) => s.steps.push(id),
            _ => panic!("not a script"),
        }
        id
    }

    fn insert_sorted_child(&mut self, parent: NodeId, name: &str, id: NodeId) {
        match &mut self.nodes[parent] {
            Node::Group(g) => {
                let pos = g
                    .children
                    .binary_search_by(|&c| match &self.nodes[c] {
                        Node::Group(x) => x.name.as_str().cmp(name),
                        Node::Script(x) => x.name.as_str().cmp(name),
                        Node::Step(_) => unreachable!("groups never own steps directly"),
                    })
                    .unwrap_or_else(|e| e);
                g.children.insert(pos, id);
            }
            _ => panic!("not a group"),
        }
    }

    /// Binary search a Group's sorted children by name.
    pub fn find_child(&self, group: NodeId, name: &str) -> Option<NodeId> {
        let children = self.group_children(group);
        children
            .binary_search_by(|&c| self.name(c).cmp(name))
            .ok()
            .map(|i| children[i])
    }

    /// Ancestor-to-node name segments, root excluded. Does not cross from a
    /// Step into its Script (steps are formatted separately).
    fn group_script_segments(&self, id: NodeId) -> Vec<NodeId> {
        let mut segs = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == self.root {
                break;
            }
            segs.push(c);
            cur = self.parent(c);
        }
        segs.reverse();
        segs
    }

    /// Slash-joined porcelain path for a Group or Script; for a Step,
    /// `<script-path> <step-name>`.
    pub fn canonical_path(&self, id: NodeId) -> String {
        match &self.nodes[id] {
            Node::Step(s) => format!("{} {}", self.canonical_path(s.parent), s.name),
            _ => self
                .group_script_segments(id)
                .iter()
                .map(|&n| self.name(n))
                .collect::<Vec<_>>()
                .join("/"),
        }
    }

    /// Same as `canonical_path` but every Script segment has `.swd`
    /// appended (the form used to actually invoke the file).
    pub fn exec_path(&self, id: NodeId) -> String {
        match &self.nodes[id] {
            Node::Step(s) => format!("{} {}", self.exec_path(s.parent), s.name),
            _ => self
                .group_script_segments(id)
                .iter()
                .map(|&n| match &self.nodes[n] {
                    Node::Script(sc) => format!("{}.swd", sc.name),
                    _ => self.name(n).to_string(),
                })
                .collect::<Vec<_>>()
                .join("/"),
        }
    }

    /// `FindUnit`: consume `path` left to right, `/` descending Group →
    /// child and a single trailing ` ` descending Script → Step.
    pub fn find_unit(&self, path: &str) -> CoreResult<NodeId> {
        self.find_unit_from(self.root, path)
    }

    fn unknown(path: &str) -> CoreError {
        CoreError::UnknownUnit {
            path: path.to_string(),
        }
    }

    fn find_unit_from(&self, group: NodeId, path: &str) -> CoreResult<NodeId> {
        if path.is_empty() {
            return Err(Self::unknown(path));
        }
        let slash = path.find('/');
        let space = path.find(' ');

        match (slash, space) {
            (Some(si), Some(pi)) if pi < si => self.descend_to_step(group, path, pi),
            (_, Some(pi)) if slash.is_none() => self.descend_to_step(group, path, pi),
            (Some(si), _) => {
                let name = &path[..si];
                let rest = &path[si + 1..];
                let child = self.find_child(group, name).ok_or_else(|| Self::unknown(path))?;
                match self.node(child) {
                    Node::Group(_) => {
                        if rest.is_empty() {
                            Ok(child)
                        } else {
                            self.find_unit_from(child, rest)
                        }
                    }
                    Node::Script(_) if rest.is_empty() => Ok(child),
                    _ => Err(Self::unknown(path)),
                }
            }
            (None, None) => self.find_child(group, path).ok_or_else(|| Self::unknown(path)),
        }
    }

    fn descend_to_step(&self, group: NodeId, path: &str, space_idx: usize) -> CoreResult<NodeId> {
        let script_name = &path[..space_idx];
        let rest = &path[space_idx + 1..];
        if rest.is_empty() || rest.contains('/') || rest.contains(' ') {
            return Err(Self::unknown(path));
        }
        let child = self
            .find_child(group, script_name)
            .ok_or_else(|| Self::unknown(path))?;
        match self.node(child) {
            Node::Script(s) => s
                .steps
                .iter()
                .find(|&&sid| self.name(sid) == rest)
                .copied()
                .ok_or_else(|| Self::unknown(path)),
            _ => Err(Self::unknown(path)),
        }
    }

    pub fn is_completed(&self, step: NodeId) -> bool {
        match &self.nodes[step] {
            Node::Step(s) => s.completed,
            _ => panic!("not a step"),
        }
    }

    fn set_completed(&mut self, step: NodeId, value: bool) {
        match &mut self.nodes[step] {
            Node::Step(s) => s.completed = value,
            _ => panic!("not a step"),
        }
    }

    /// Mark `step` completed. Every earlier step in the same script must
    /// already be completed, or this is a fatal out-of-order error. Every
    /// later step's completion is cleared (rerunning a step invalidates
    /// what followed).
    pub fn complete_step(&mut self, step: NodeId) -> CoreResult<()> {
        let script = self.parent(step).expect("step has a parent script");
        let steps = self.script_steps(script).to_vec();
        let idx = steps.iter().position(|&id| id == step).expect("step belongs to its script");
        for &earlier in &steps[..idx] {
            if !self.is_completed(earlier) {
                return Err(CoreError::OutOfOrderCompletion {
                    step_path: self.canonical_path(step),
                });
            }
        }
        self.set_completed(step, true);
        for &later in &steps[idx + 1..] {
            self.set_completed(later, false);
        }
        Ok(())
    }

    /// Clear `step`'s completion and every step after it.
    pub fn undo_step(&mut self, step: NodeId) {
        let script = self.parent(step).expect("step has a parent script");
        let steps = self.script_steps(script).to_vec();
        let idx = steps.iter().position(|&id| id == step).expect("step belongs to its script");
        for &later in &steps[idx..] {
            self.set_completed(later, false);
        }
    }

    pub fn undo_all(&mut self, script: NodeId) {
        let steps = self.script_steps(script).to_vec();
        for &s in &steps {
            self.set_completed(s, false);
        }
    }

    /// All Step ids reachable under `root`, in pre-order.
    pub fn all_steps_under(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_steps(root, &mut out);
        out
    }

    fn collect_steps(&self, id: NodeId, out: &mut Vec<NodeId>) {
        match &self.nodes[id] {
            Node::Group(g) => {
                for &c in &g.children {
                    self.collect_steps(c, out);
                }
            }
            Node::Script(s) => out.extend(s.steps.iter().copied()),
            Node::Step(_) => out.push(id),
        }
    }
}
