use std::marker::PhantomData;

use sea_orm::{ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::debug;

use crate::closure::{self, Generations};
use crate::config::{AncestorOrder, RoleSelection, TreeScopeConfig};
use crate::error::TreeScopeError;
use crate::links::EntityLinks;
use crate::query::ScopedQuery;
use crate::traits::TreeScopeModel;

/// Accessor names the repository itself answers to.
pub const BUILTIN_ACCESSORS: &[&str] = &[
    "id",
    "parent",
    "parents",
    "children",
    "direct_children",
    "ancestors",
    "descendants",
    "roots",
    "self_and_ancestors",
    "self_and_descendants",
    "siblings",
    "is_ancestor_of",
    "is_descendant_of",
];

/// Repository exposing the hierarchy queries for a given model.
#[derive(Debug, Default)]
pub struct TreeScopeRepository<M>
where
    M: TreeScopeModel,
{
    _marker: PhantomData<M>,
}

impl<M> TreeScopeRepository<M>
where
    M: TreeScopeModel,
{
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    fn config(&self) -> &'static TreeScopeConfig {
        M::tree_scope_config()
    }

    /// Role-ordered, non-null parent ids of `model`, read without a round trip.
    pub fn parent_ids(&self, model: &M, roles: &RoleSelection) -> Vec<M::Id> {
        roles.pick(&model.parent_ids()).flatten().cloned().collect()
    }

    /// The parent in `role`, or the first set role when `role` is `None`.
    pub async fn parent<C>(
        &self,
        conn: &C,
        model: &M,
        role: Option<&str>,
    ) -> Result<Option<M>, TreeScopeError>
    where
        C: ConnectionTrait,
    {
        let parents = model.parent_ids();
        let target = match role {
            Some(name) => {
                let index = self.config().role_index(name)?;
                parents.get(index).cloned().flatten()
            }
            None => parents.into_iter().flatten().next(),
        };

        match target {
            Some(parent_id) => {
                let parent = M::Entity::find()
                    .filter(M::id_column().eq(M::id_to_value(&parent_id)))
                    .one(conn)
                    .await?;
                Ok(parent)
            }
            None => Ok(None),
        }
    }

    /// Every direct parent in role order.
    pub async fn parents<C>(&self, conn: &C, model: &M) -> Result<Vec<M>, TreeScopeError>
    where
        C: ConnectionTrait,
    {
        let mut ids = self.parent_ids(model, &RoleSelection::all(self.config()));
        let mut seen = std::collections::HashSet::new();
        ids.retain(|id| seen.insert(id.clone()));
        ScopedQuery::from_ids(ids).all(conn).await
    }

    /// Rows naming `model` as parent in any role.
    pub fn direct_children(&self, model: &M) -> ScopedQuery<M> {
        self.direct_children_via(model, &RoleSelection::all(self.config()))
    }

    /// Rows naming `model` as parent in one of the selected roles.
    pub fn direct_children_via(&self, model: &M, roles: &RoleSelection) -> ScopedQuery<M> {
        if roles.indices().is_empty() {
            return ScopedQuery::from_ids(Vec::new());
        }
        let columns = M::parent_columns();
        let id = M::id_to_value(&model.id());
        let mut condition = Condition::any();
        for column in roles.pick(&columns) {
            condition = condition.add(column.eq(id.clone()));
        }
        ScopedQuery::matching(condition)
    }

    /// Rows with no parent in any role.
    pub fn roots(&self) -> ScopedQuery<M> {
        let condition = M::parent_columns()
            .into_iter()
            .fold(Condition::all(), |condition, column| {
                condition.add(column.is_null())
            });
        ScopedQuery::matching(condition)
    }

    /// Rows sharing at least one parent with `model`, excluding `model`.
    pub fn siblings(&self, model: &M) -> ScopedQuery<M> {
        let columns = M::parent_columns();
        let mut condition = Condition::any();
        let mut any_parent = false;
        for (column, parent) in columns.iter().zip(model.parent_ids()) {
            if let Some(parent) = parent {
                condition = condition.add(column.eq(M::id_to_value(&parent)));
                any_parent = true;
            }
        }
        if !any_parent {
            return ScopedQuery::from_ids(Vec::new());
        }
        ScopedQuery::matching(
            Condition::all()
                .add(condition)
                .add(M::id_column().ne(M::id_to_value(&model.id()))),
        )
    }

    pub async fn ancestors<C>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<ScopedQuery<M>, TreeScopeError>
    where
        C: ConnectionTrait + Sync,
    {
        self.ancestors_via(conn, model, &RoleSelection::all(self.config()))
            .await
    }

    /// Ancestors reachable through the selected roles only.
    pub async fn ancestors_via<C>(
        &self,
        conn: &C,
        model: &M,
        roles: &RoleSelection,
    ) -> Result<ScopedQuery<M>, TreeScopeError>
    where
        C: ConnectionTrait + Sync,
    {
        let generations = self.ancestor_generations(conn, model, roles).await?;
        Ok(self.ancestor_scope(generations, None))
    }

    pub async fn descendants<C>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<ScopedQuery<M>, TreeScopeError>
    where
        C: ConnectionTrait + Sync,
    {
        self.descendants_via(conn, model, &RoleSelection::all(self.config()))
            .await
    }

    /// Descendants reachable through the selected roles only.
    pub async fn descendants_via<C>(
        &self,
        conn: &C,
        model: &M,
        roles: &RoleSelection,
    ) -> Result<ScopedQuery<M>, TreeScopeError>
    where
        C: ConnectionTrait + Sync,
    {
        let generations = self.descendant_generations(conn, model, roles).await?;
        Ok(ScopedQuery::from_ids(generations.nearest_first()))
    }

    /// `model` together with its ancestors, placed at the near end of the chain.
    pub async fn self_and_ancestors<C>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<ScopedQuery<M>, TreeScopeError>
    where
        C: ConnectionTrait + Sync,
    {
        let roles = RoleSelection::all(self.config());
        let generations = self.ancestor_generations(conn, model, &roles).await?;
        Ok(self.ancestor_scope(generations, Some(model.id())))
    }

    pub async fn self_and_descendants<C>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<ScopedQuery<M>, TreeScopeError>
    where
        C: ConnectionTrait + Sync,
    {
        let roles = RoleSelection::all(self.config());
        let generations = self.descendant_generations(conn, model, &roles).await?;
        let mut ids = Vec::with_capacity(generations.len() + 1);
        ids.push(model.id());
        ids.extend(generations.nearest_first());
        Ok(ScopedQuery::from_ids(ids))
    }

    /// True when `ancestor` appears in the ancestor chain of `model`.
    pub async fn is_ancestor_of<C>(
        &self,
        conn: &C,
        ancestor: &M,
        model: &M,
    ) -> Result<bool, TreeScopeError>
    where
        C: ConnectionTrait + Sync,
    {
        let roles = RoleSelection::all(self.config());
        let generations = self.ancestor_generations(conn, model, &roles).await?;
        Ok(generations.contains(&ancestor.id()))
    }

    /// True when `descendant` appears in the descendant set of `model`.
    pub async fn is_descendant_of<C>(
        &self,
        conn: &C,
        descendant: &M,
        model: &M,
    ) -> Result<bool, TreeScopeError>
    where
        C: ConnectionTrait + Sync,
    {
        self.is_ancestor_of(conn, model, descendant).await
    }

    async fn ancestor_generations<C>(
        &self,
        conn: &C,
        model: &M,
        roles: &RoleSelection,
    ) -> Result<Generations<M::Id>, TreeScopeError>
    where
        C: ConnectionTrait + Sync,
    {
        let links = EntityLinks::<M, C>::new(conn);
        let origin = model.id();
        let direct = self.parent_ids(model, roles);
        closure::ancestor_generations(&links, &origin, direct, roles, self.config().max_depth())
            .await
    }

    async fn descendant_generations<C>(
        &self,
        conn: &C,
        model: &M,
        roles: &RoleSelection,
    ) -> Result<Generations<M::Id>, TreeScopeError>
    where
        C: ConnectionTrait + Sync,
    {
        let links = EntityLinks::<M, C>::new(conn);
        let origin = model.id();
        closure::descendant_generations(&links, &origin, roles, self.config().max_depth()).await
    }

    fn ancestor_scope(
        &self,
        generations: Generations<M::Id>,
        origin: Option<M::Id>,
    ) -> ScopedQuery<M> {
        let order = self.config().ancestor_order();
        debug!(
            entity = self.config().entity_name(),
            ?order,
            total = generations.len(),
            "building ancestor scope"
        );
        match order {
            AncestorOrder::RootFirst => {
                let mut ids = generations.root_first();
                ids.extend(origin);
                ScopedQuery::from_ids(ids)
            }
            AncestorOrder::NearestFirst => {
                let mut ids: Vec<_> = origin.into_iter().collect();
                ids.extend(generations.nearest_first());
                ScopedQuery::from_ids(ids)
            }
            AncestorOrder::Storage => {
                let mut ids: Vec<_> = origin.into_iter().collect();
                ids.extend(generations.nearest_first());
                ScopedQuery::from_ids_in_storage_order(ids)
            }
        }
    }
}
