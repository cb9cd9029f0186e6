use serde::{Deserialize, Serialize};

use crate::error::TreeScopeError;

/// Depth limit applied when a descriptor does not set one.
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Static configuration describing how a SeaORM model points at its parents.
#[derive(Clone, Debug)]
pub struct TreeScopeConfig {
    entity_name: String,
    roles: Vec<ParentRole>,
    max_depth: usize,
    ancestor_order: Option<AncestorOrder>,
    order_column: Option<String>,
}

impl TreeScopeConfig {
    /// Create a new configuration for the given logical entity name.
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            roles: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            ancestor_order: None,
            order_column: None,
        }
    }

    /// Merge options produced by [`TreeScopeOptions`].
    pub(crate) fn apply_options(mut self, options: TreeScopeOptions) -> Self {
        self.roles.extend(options.roles);
        if let Some(max_depth) = options.max_depth {
            self.max_depth = max_depth;
        }
        if let Some(order) = options.ancestor_order {
            self.ancestor_order = Some(order);
        }
        if let Some(column) = options.order_column {
            self.order_column = Some(column);
        }
        self
    }

    /// Human-readable name of the entity, used in error messages.
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Parent roles in declaration order.
    pub fn roles(&self) -> &[ParentRole] {
        &self.roles
    }

    /// Position of the named role in declaration order.
    pub fn role_index(&self, name: &str) -> Result<usize, TreeScopeError> {
        self.roles
            .iter()
            .position(|role| role.name() == name)
            .ok_or_else(|| TreeScopeError::UnknownRole(name.to_owned()))
    }

    /// Maximum number of generations a traversal may visit.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Presentation order for ancestor chains.
    ///
    /// Single-role hierarchies default to [`AncestorOrder::RootFirst`]; hierarchies
    /// with several roles default to [`AncestorOrder::NearestFirst`].
    pub fn ancestor_order(&self) -> AncestorOrder {
        match self.ancestor_order {
            Some(order) => order,
            None if self.roles.len() > 1 => AncestorOrder::NearestFirst,
            None => AncestorOrder::RootFirst,
        }
    }

    /// Custom column used ahead of the primary key for storage ordering.
    pub fn order_column(&self) -> Option<&str> {
        self.order_column.as_deref()
    }

    /// Check the descriptor is usable before any scope is bound to it.
    pub fn validate(&self) -> Result<(), TreeScopeError> {
        if self.roles.is_empty() {
            return Err(TreeScopeError::invalid_descriptor(format!(
                "{} declares no parent roles",
                self.entity_name
            )));
        }
        if self.max_depth == 0 {
            return Err(TreeScopeError::invalid_descriptor(
                "max_depth must be at least 1",
            ));
        }
        for (index, role) in self.roles.iter().enumerate() {
            if role.name().is_empty() || role.column().is_empty() {
                return Err(TreeScopeError::invalid_descriptor(format!(
                    "role #{index} of {} has an empty name or column",
                    self.entity_name
                )));
            }
            if self.roles[..index].iter().any(|other| other.name() == role.name()) {
                return Err(TreeScopeError::invalid_descriptor(format!(
                    "role `{}` is declared twice on {}",
                    role.name(),
                    self.entity_name
                )));
            }
        }
        Ok(())
    }
}

/// A named parent slot backed by a nullable foreign-key column.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParentRole {
    name: String,
    column: String,
}

impl ParentRole {
    pub fn new(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column(&self) -> &str {
        &self.column
    }
}

/// Builder-style options consumed by the derive macro.
#[derive(Clone, Debug, Default)]
pub struct TreeScopeOptions {
    roles: Vec<ParentRole>,
    max_depth: Option<usize>,
    ancestor_order: Option<AncestorOrder>,
    order_column: Option<String>,
}

impl TreeScopeOptions {
    pub fn role(mut self, name: impl Into<String>, column: impl Into<String>) -> Self {
        self.roles.push(ParentRole::new(name, column));
        self
    }

    pub fn max_depth(mut self, value: usize) -> Self {
        self.max_depth = Some(value);
        self
    }

    pub fn ancestor_order(mut self, order: AncestorOrder) -> Self {
        self.ancestor_order = Some(order);
        self
    }

    pub fn order_column(mut self, value: impl Into<String>) -> Self {
        self.order_column = Some(value.into());
        self
    }

    pub fn apply(self, base: TreeScopeConfig) -> TreeScopeConfig {
        base.apply_options(self)
    }
}

/// How an ancestor chain is presented once its generations are known.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AncestorOrder {
    /// Farthest generation first, nearest parent last.
    RootFirst,
    /// Direct parents first, then grandparents, and so on.
    NearestFirst,
    /// Whatever the storage default ordering yields.
    Storage,
}

/// Subset of a descriptor's roles that a traversal follows.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RoleSelection {
    indices: Vec<usize>,
}

impl RoleSelection {
    /// Every role, in declaration order.
    pub fn all(config: &TreeScopeConfig) -> Self {
        Self {
            indices: (0..config.roles().len()).collect(),
        }
    }

    /// The named roles, kept in declaration order regardless of argument order.
    pub fn named<S: AsRef<str>>(
        config: &TreeScopeConfig,
        names: &[S],
    ) -> Result<Self, TreeScopeError> {
        let mut indices = names
            .iter()
            .map(|name| config.role_index(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        indices.sort_unstable();
        indices.dedup();
        Ok(Self { indices })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    /// Pick the selected entries out of a role-ordered slice.
    pub fn pick<'a, T>(&'a self, per_role: &'a [T]) -> impl Iterator<Item = &'a T> + 'a {
        self.indices.iter().filter_map(move |&index| per_role.get(index))
    }
}
