//! Parent/child process forest rooted at selected processes.
//!
//! Nodes live in an arena owned by the [`Tree`]; children are stored as
//! arena indices. Only edges whose parent exists in the input are linked, so
//! a process whose parent already exited is simply unreachable.

use crate::process::Pid;
use ahash::{AHashMap as HashMap, AHashSet as HashSet};

/// One process in the forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: Pid,
    pub parent: Pid,
    children: Vec<usize>,
}

impl Node {
    fn new(id: Pid, parent: Pid) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena-backed process forest.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    index: HashMap<Pid, usize>,
    roots: Vec<usize>,
}

impl Tree {
    /// Builds the forest.
    ///
    /// `roots` and `nodes` are `(pid, ppid)` pairs. Roots are never attached
    /// below their own parent, so a root nested under another root is
    /// traversed once, from itself. Duplicate pids keep their first entry.
    pub fn new(roots: &[(Pid, Pid)], nodes: &[(Pid, Pid)]) -> Self {
        let mut tree = Tree::default();

        for &(id, parent) in roots {
            if tree.index.contains_key(&id) {
                continue;
            }
            let idx = tree.insert(id, parent);
            tree.roots.push(idx);
        }
        let root_count = tree.nodes.len();

        for &(id, parent) in nodes {
            if !tree.index.contains_key(&id) {
                tree.insert(id, parent);
            }
        }

        // Link every non-root under its parent when the parent is known.
        for idx in root_count..tree.nodes.len() {
            let parent = tree.nodes[idx].parent;
            if parent == tree.nodes[idx].id {
                continue;
            }
            if let Some(&pidx) = tree.index.get(&parent) {
                tree.nodes[pidx].children.push(idx);
            }
        }

        tree
    }

    fn insert(&mut self, id: Pid, parent: Pid) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node::new(id, parent));
        self.index.insert(id, idx);
        idx
    }

    /// Root pids in construction order.
    pub fn roots(&self) -> impl Iterator<Item = Pid> + '_ {
        self.roots.iter().map(|&i| self.nodes[i].id)
    }

    pub fn get(&self, id: Pid) -> Option<&Node> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Direct children of `id`.
    pub fn children(&self, id: Pid) -> Vec<Pid> {
        self.get(id)
            .map(|n| n.children.iter().map(|&c| self.nodes[c].id).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order traversal of every root, concatenated.
    ///
    /// A pid is emitted at most once even if malformed input made it
    /// reachable twice.
    pub fn traverse(&self) -> Vec<Pid> {
        self.walk(&self.roots)
            .into_iter()
            .map(|(idx, _)| self.nodes[idx].id)
            .collect()
    }

    /// Pre-order traversal of the subtree at `root`; empty if unknown.
    pub fn traverse_from(&self, root: Pid) -> Vec<Pid> {
        match self.index.get(&root) {
            Some(&idx) => self
                .walk(&[idx])
                .into_iter()
                .map(|(i, _)| self.nodes[i].id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Like [`Tree::traverse`], with the depth of each pid below its root.
    pub fn traverse_with_depth(&self) -> Vec<(Pid, usize)> {
        self.walk(&self.roots)
            .into_iter()
            .map(|(idx, depth)| (self.nodes[idx].id, depth))
            .collect()
    }

    fn walk(&self, starts: &[usize]) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let mut seen: HashSet<usize> = HashSet::new();

        for &start in starts {
            let mut stack = vec![(start, 0usize)];
            while let Some((idx, depth)) = stack.pop() {
                if !seen.insert(idx) {
                    continue;
                }
                out.push((idx, depth));
                // Reverse so the first child is visited first.
                for &child in self.nodes[idx].children.iter().rev() {
                    stack.push((child, depth + 1));
                }
            }
        }
        out
    }
}
