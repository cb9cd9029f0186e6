use sea_orm::ConnectionTrait;
use tracing::debug;

use crate::config::RoleSelection;
use crate::error::TreeScopeError;
use crate::query::ScopedQuery;
use crate::repository::{TreeScopeRepository, BUILTIN_ACCESSORS};
use crate::traits::TreeScopeModel;

/// Direction a named scope walks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScopeKind {
    Ancestors,
    Descendants,
}

impl ScopeKind {
    /// Declaration name used in conflict messages.
    pub fn declaration(self) -> &'static str {
        match self {
            ScopeKind::Ancestors => "has_ancestors",
            ScopeKind::Descendants => "has_descendants",
        }
    }
}

/// A named accessor bound to one closure direction.
#[derive(Clone, Debug)]
pub struct ScopeDeclaration {
    name: String,
    kind: ScopeKind,
    roles: RoleSelection,
}

impl ScopeDeclaration {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn roles(&self) -> &RoleSelection {
        &self.roles
    }
}

/// Named ancestor and descendant scopes for a model type.
///
/// Built once when the model is set up:
///
/// ```ignore
/// let scopes = TreeScopes::<employee::Model>::new()?
///     .has_ancestors("managers")?
///     .has_descendants("managed")?;
/// let managed = scopes.scope(&db, &barry, "managed").await?.all(&db).await?;
/// ```
///
/// A name is refused when the repository, the model's fields, a parent role or
/// an earlier declaration already answers to it.
#[derive(Debug)]
pub struct TreeScopes<M>
where
    M: TreeScopeModel,
{
    declarations: Vec<ScopeDeclaration>,
    repository: TreeScopeRepository<M>,
}

impl<M> TreeScopes<M>
where
    M: TreeScopeModel,
{
    pub fn new() -> Result<Self, TreeScopeError> {
        M::tree_scope_config().validate()?;
        Ok(Self {
            declarations: Vec::new(),
            repository: TreeScopeRepository::new(),
        })
    }

    pub fn has_ancestors(self, name: impl Into<String>) -> Result<Self, TreeScopeError> {
        let roles = RoleSelection::all(M::tree_scope_config());
        self.declare(name.into(), ScopeKind::Ancestors, roles)
    }

    /// Ancestor scope following only the named roles.
    pub fn has_ancestors_via<S: AsRef<str>>(
        self,
        name: impl Into<String>,
        roles: &[S],
    ) -> Result<Self, TreeScopeError> {
        let roles = RoleSelection::named(M::tree_scope_config(), roles)?;
        self.declare(name.into(), ScopeKind::Ancestors, roles)
    }

    pub fn has_descendants(self, name: impl Into<String>) -> Result<Self, TreeScopeError> {
        let roles = RoleSelection::all(M::tree_scope_config());
        self.declare(name.into(), ScopeKind::Descendants, roles)
    }

    /// Descendant scope following only the named roles.
    pub fn has_descendants_via<S: AsRef<str>>(
        self,
        name: impl Into<String>,
        roles: &[S],
    ) -> Result<Self, TreeScopeError> {
        let roles = RoleSelection::named(M::tree_scope_config(), roles)?;
        self.declare(name.into(), ScopeKind::Descendants, roles)
    }

    fn declare(
        mut self,
        name: String,
        kind: ScopeKind,
        roles: RoleSelection,
    ) -> Result<Self, TreeScopeError> {
        let config = M::tree_scope_config();
        if name.is_empty() {
            return Err(TreeScopeError::invalid_descriptor(format!(
                "{} scope on {} needs a name",
                kind.declaration(),
                config.entity_name()
            )));
        }
        if roles.indices().is_empty() {
            return Err(TreeScopeError::invalid_descriptor(format!(
                "{name} on {} follows no parent roles",
                config.entity_name()
            )));
        }
        if self.responds_to(&name) {
            return Err(TreeScopeError::NamingConflict {
                entity: config.entity_name().to_owned(),
                name,
                kind: kind.declaration(),
            });
        }

        debug!(entity = config.entity_name(), %name, ?kind, "declared tree scope");
        self.declarations.push(ScopeDeclaration { name, kind, roles });
        Ok(self)
    }

    /// True when `name` is already taken on the model.
    pub fn responds_to(&self, name: &str) -> bool {
        BUILTIN_ACCESSORS.contains(&name)
            || M::member_names().contains(&name)
            || M::tree_scope_config()
                .roles()
                .iter()
                .any(|role| role.name() == name)
            || self.declaration(name).is_some()
    }

    pub fn declaration(&self, name: &str) -> Option<&ScopeDeclaration> {
        self.declarations
            .iter()
            .find(|declaration| declaration.name == name)
    }

    pub fn declarations(&self) -> &[ScopeDeclaration] {
        &self.declarations
    }

    pub fn repository(&self) -> &TreeScopeRepository<M> {
        &self.repository
    }

    /// Resolve a declared scope for `model`.
    pub async fn scope<C>(
        &self,
        conn: &C,
        model: &M,
        name: &str,
    ) -> Result<ScopedQuery<M>, TreeScopeError>
    where
        C: ConnectionTrait + Sync,
    {
        let declaration = self
            .declaration(name)
            .ok_or_else(|| TreeScopeError::UnknownScope(name.to_owned()))?;

        match declaration.kind {
            ScopeKind::Ancestors => {
                self.repository
                    .ancestors_via(conn, model, &declaration.roles)
                    .await
            }
            ScopeKind::Descendants => {
                self.repository
                    .descendants_via(conn, model, &declaration.roles)
                    .await
            }
        }
    }
}
