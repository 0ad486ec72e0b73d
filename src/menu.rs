use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::MenuStore;
use crate::types::{MenuNodeId, RoleName, RoleSet};

/// Role name that sees the whole tree unfiltered, with role lists attached.
pub const DEFAULT_PRIVILEGED_ROLE: &str = "super_admin";

const DEFAULT_MAX_DEPTH: usize = 16;

/// One navigation node as persisted.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MenuNode {
    /// Node identifier.
    pub id: MenuNodeId,
    /// Display name; secondary sort key after `sequence`.
    pub name: String,
    /// Navigation path.
    pub path: String,
    /// Optional icon name.
    pub icon: Option<String>,
    /// Parent node; `None` marks a root.
    pub parent: Option<MenuNodeId>,
    /// Primary sort key among siblings.
    pub sequence: i32,
    /// Inactive nodes are hidden from non-privileged callers.
    pub active: bool,
    /// Free-text description.
    pub description: Option<String>,
    /// Roles granted visibility.
    pub roles: RoleSet,
}

impl MenuNode {
    /// Creates an active root node with a generated id.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: MenuNodeId::from_string(Uuid::new_v4().to_string()),
            name: name.into(),
            path: path.into(),
            icon: None,
            parent: None,
            sequence: 0,
            active: true,
            description: None,
            roles: RoleSet::new(),
        }
    }

    /// Sets the icon.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Sets the parent.
    pub fn with_parent(mut self, parent: MenuNodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Sets the sibling sort key.
    pub fn with_sequence(mut self, sequence: i32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// One node of the assembled response tree.
///
/// `roles` is populated only for privileged callers and omitted from the
/// serialized output otherwise.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MenuTreeNode {
    /// Node identifier.
    pub id: MenuNodeId,
    /// Display name.
    pub name: String,
    /// Navigation path.
    pub path: String,
    /// Optional icon name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Parent node id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<MenuNodeId>,
    /// Sibling sort key.
    pub sequence: i32,
    /// Active flag.
    pub active: bool,
    /// Free-text description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Child nodes in display order.
    pub children: Vec<MenuTreeNode>,
    /// Granted roles; privileged callers only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<RoleSet>,
}

impl MenuTreeNode {
    fn from_node(node: MenuNode, include_roles: bool) -> Self {
        Self {
            id: node.id,
            name: node.name,
            path: node.path,
            icon: node.icon,
            parent: node.parent,
            sequence: node.sequence,
            active: node.active,
            description: node.description,
            children: Vec::new(),
            roles: include_roles.then_some(node.roles),
        }
    }
}

/// Role-filtered hierarchical navigation over a pluggable store.
///
/// Traversal is iterative with an explicit stack, a visited set, and a depth
/// bound, so malformed parent chains surface as [`Error::MenuCycleDetected`]
/// or [`Error::MenuDepthExceeded`] instead of unbounded recursion.
#[derive(Debug)]
pub struct MenuTree<M> {
    store: M,
    privileged_role: RoleName,
    max_depth: usize,
}

impl<M> MenuTree<M>
where
    M: MenuStore,
{
    /// Creates a tree over the given store.
    pub fn new(store: M) -> Self {
        Self {
            store,
            privileged_role: RoleName::from_string(DEFAULT_PRIVILEGED_ROLE.to_string()),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Overrides the privileged role name (default `super_admin`).
    pub fn with_privileged_role(mut self, role: RoleName) -> Self {
        self.privileged_role = role;
        self
    }

    /// Overrides the maximum tree depth (default 16).
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Builds the ordered forest visible to the given roles.
    ///
    /// Non-privileged callers see active nodes whose grants intersect their
    /// roles; a node below a filtered parent stays unreachable even when its
    /// own grants would permit it. The privileged role sees everything, with
    /// per-node role lists attached.
    pub async fn build_for_roles(&self, roles: &RoleSet) -> Result<Vec<MenuTreeNode>> {
        let privileged = roles.contains(self.privileged_role.as_str());

        let roots = self.visible_children(None, roles, privileged).await?;
        let root_ids: Vec<MenuNodeId> = roots.iter().map(|node| node.id.clone()).collect();

        let mut visited: HashSet<MenuNodeId> = HashSet::new();
        let mut order: Vec<MenuNode> = Vec::new();
        let mut child_ids: HashMap<MenuNodeId, Vec<MenuNodeId>> = HashMap::new();

        let mut stack: Vec<(MenuNode, usize)> = Vec::new();
        for node in roots.into_iter().rev() {
            stack.push((node, 1));
        }

        while let Some((node, depth)) = stack.pop() {
            if !visited.insert(node.id.clone()) {
                return Err(Error::MenuCycleDetected { node: node.id });
            }

            let children = self
                .visible_children(Some(&node.id), roles, privileged)
                .await?;
            if !children.is_empty() && depth + 1 > self.max_depth {
                return Err(Error::MenuDepthExceeded {
                    node: children[0].id.clone(),
                    max_depth: self.max_depth,
                });
            }
            child_ids.insert(
                node.id.clone(),
                children.iter().map(|child| child.id.clone()).collect(),
            );
            for child in children.into_iter().rev() {
                stack.push((child, depth + 1));
            }
            order.push(node);
        }

        // Children always appear after their parent in DFS order, so a
        // reverse pass can assemble each subtree before its parent needs it.
        let mut built: HashMap<MenuNodeId, MenuTreeNode> = HashMap::new();
        for node in order.into_iter().rev() {
            let ids = child_ids.remove(&node.id).unwrap_or_default();
            let mut tree = MenuTreeNode::from_node(node, privileged);
            for id in ids {
                if let Some(child) = built.remove(&id) {
                    tree.children.push(child);
                }
            }
            built.insert(tree.id.clone(), tree);
        }

        Ok(root_ids
            .into_iter()
            .filter_map(|id| built.remove(&id))
            .collect())
    }

    /// Lists every accessible node without assembling parent/child links.
    ///
    /// This bypasses the reachability property of [`Self::build_for_roles`]:
    /// a node under a filtered parent still shows up here.
    pub async fn flat_for_roles(&self, roles: &RoleSet) -> Result<Vec<MenuTreeNode>> {
        let privileged = roles.contains(self.privileged_role.as_str());
        let mut nodes = self.store.list_nodes().await.map_err(Error::from)?;
        if !privileged {
            nodes.retain(|node| node.active && node.roles.intersects(roles));
        }
        sort_siblings(&mut nodes);
        Ok(nodes
            .into_iter()
            .map(|node| MenuTreeNode::from_node(node, privileged))
            .collect())
    }

    /// Checks that putting `node` under `candidate_parent` keeps the parent
    /// relation acyclic.
    ///
    /// Walks the ancestor chain upward from the candidate; reappearance of
    /// `node` (or of any already-seen ancestor) is a cycle, and chains longer
    /// than the depth bound are rejected outright.
    pub async fn validate_parent_assignment(
        &self,
        candidate_parent: &MenuNodeId,
        node: &MenuNodeId,
    ) -> Result<()> {
        if candidate_parent == node {
            return Err(Error::MenuCycleDetected { node: node.clone() });
        }

        let mut visited: HashSet<MenuNodeId> = HashSet::new();
        let mut current = candidate_parent.clone();
        loop {
            if !visited.insert(current.clone()) {
                return Err(Error::MenuCycleDetected { node: current });
            }
            if visited.len() > self.max_depth {
                return Err(Error::MenuDepthExceeded {
                    node: current,
                    max_depth: self.max_depth,
                });
            }
            let Some(record) = self.store.node(&current).await.map_err(Error::from)? else {
                return Ok(());
            };
            match record.parent {
                None => return Ok(()),
                Some(parent) if parent == *node => {
                    return Err(Error::MenuCycleDetected { node: node.clone() });
                }
                Some(parent) => current = parent,
            }
        }
    }

    /// Returns one node.
    pub async fn node(&self, id: &MenuNodeId) -> Result<MenuNode> {
        self.store
            .node(id)
            .await
            .map_err(Error::from)?
            .ok_or_else(|| Error::NodeNotFound { node: id.clone() })
    }

    /// Creates a node; the named parent must exist.
    pub async fn create(&self, node: MenuNode) -> Result<MenuNode> {
        if let Some(parent) = &node.parent {
            if self.store.node(parent).await.map_err(Error::from)?.is_none() {
                return Err(Error::ParentNotFound {
                    node: parent.clone(),
                });
            }
        }
        self.store
            .insert_node(node.clone())
            .await
            .map_err(Error::from)?;
        Ok(node)
    }

    /// Replaces a node's fields; role grants are preserved.
    ///
    /// A parent change is validated for existence and acyclicity before
    /// anything is written.
    pub async fn update(&self, node: MenuNode) -> Result<MenuNode> {
        if self
            .store
            .node(&node.id)
            .await
            .map_err(Error::from)?
            .is_none()
        {
            return Err(Error::NodeNotFound { node: node.id });
        }

        if let Some(parent) = &node.parent {
            if self.store.node(parent).await.map_err(Error::from)?.is_none() {
                return Err(Error::ParentNotFound {
                    node: parent.clone(),
                });
            }
            self.validate_parent_assignment(parent, &node.id).await?;
        }

        let id = node.id.clone();
        if !self.store.update_node(node).await.map_err(Error::from)? {
            return Err(Error::NodeNotFound { node: id });
        }
        self.node(&id).await
    }

    /// Deletes a childless node.
    pub async fn delete(&self, id: &MenuNodeId) -> Result<()> {
        let children = self
            .store
            .children_of(Some(id))
            .await
            .map_err(Error::from)?;
        if !children.is_empty() {
            return Err(Error::NodeHasChildren { node: id.clone() });
        }
        if !self.store.remove_node(id).await.map_err(Error::from)? {
            return Err(Error::NodeNotFound { node: id.clone() });
        }
        Ok(())
    }

    /// Grants a role visibility on a node.
    pub async fn assign_role(&self, id: &MenuNodeId, role: RoleName) -> Result<()> {
        if !self
            .store
            .grant_role(id, role)
            .await
            .map_err(Error::from)?
        {
            return Err(Error::NodeNotFound { node: id.clone() });
        }
        Ok(())
    }

    /// Removes a role's visibility from a node.
    pub async fn remove_role(&self, id: &MenuNodeId, role: &RoleName) -> Result<()> {
        if !self
            .store
            .revoke_role(id, role)
            .await
            .map_err(Error::from)?
        {
            return Err(Error::NodeNotFound { node: id.clone() });
        }
        Ok(())
    }

    async fn visible_children(
        &self,
        parent: Option<&MenuNodeId>,
        roles: &RoleSet,
        privileged: bool,
    ) -> Result<Vec<MenuNode>> {
        let mut children = self
            .store
            .children_of(parent)
            .await
            .map_err(Error::from)?;
        if !privileged {
            children.retain(|node| node.active && node.roles.intersects(roles));
        }
        sort_siblings(&mut children);
        Ok(children)
    }
}

fn sort_siblings(nodes: &mut [MenuNode]) {
    nodes.sort_by(|a, b| {
        a.sequence
            .cmp(&b.sequence)
            .then_with(|| a.name.cmp(&b.name))
    });
}
