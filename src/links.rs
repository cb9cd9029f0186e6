use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::str::FromStr;

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, ModelTrait, Order, QueryFilter,
    QueryOrder, Value,
};
use tracing::trace;

use crate::config::RoleSelection;
use crate::error::TreeScopeError;
use crate::traits::TreeScopeModel;

/// Most ids bound into a single `IN (...)` list.
pub(crate) const ID_CHUNK: usize = 1000;

pub(crate) type ColumnOf<M> = <<M as TreeScopeModel>::Entity as EntityTrait>::Column;

/// A child row together with the parents it names in the selected roles.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChildLink<Id> {
    pub id: Id,
    pub parents: Vec<Id>,
}

/// Bulk read access to parent links.
///
/// The closure engine only talks to this port, so a traversal costs one lookup
/// per generation. Adapters may split very wide generations into several
/// round trips but must return a single merged answer.
#[async_trait]
pub trait LinkSource: Send + Sync {
    type Id: Clone + Eq + Hash + Debug + Send + Sync;

    /// Parents of each id, one entry per input id in input order.
    ///
    /// Entries follow role declaration order restricted to `roles`; unset roles
    /// and unknown ids contribute nothing.
    async fn parents_of(
        &self,
        ids: &[Self::Id],
        roles: &RoleSelection,
    ) -> Result<Vec<Vec<Self::Id>>, TreeScopeError>;

    /// Every row naming one of `ids` in a selected role, once each, in storage order.
    async fn children_of(
        &self,
        ids: &[Self::Id],
        roles: &RoleSelection,
    ) -> Result<Vec<ChildLink<Self::Id>>, TreeScopeError>;
}

/// [`LinkSource`] backed by a SeaORM connection.
pub struct EntityLinks<'c, M, C> {
    conn: &'c C,
    _marker: PhantomData<fn() -> M>,
}

impl<'c, M, C> EntityLinks<'c, M, C>
where
    M: TreeScopeModel,
    C: ConnectionTrait,
{
    pub fn new(conn: &'c C) -> Self {
        Self {
            conn,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<'c, M, C> LinkSource for EntityLinks<'c, M, C>
where
    M: TreeScopeModel,
    C: ConnectionTrait + Sync,
{
    type Id = M::Id;

    async fn parents_of(
        &self,
        ids: &[M::Id],
        roles: &RoleSelection,
    ) -> Result<Vec<Vec<M::Id>>, TreeScopeError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: HashMap<M::Id, Vec<Option<M::Id>>> = HashMap::new();
        for chunk in ids.chunks(ID_CHUNK) {
            let values = chunk.iter().map(M::id_to_value).collect::<Vec<_>>();
            let rows = M::Entity::find()
                .filter(M::id_column().is_in(values))
                .all(self.conn)
                .await?;
            trace!(requested = chunk.len(), found = rows.len(), "loaded parent rows");
            by_id.extend(rows.iter().map(|row| (row.id(), row.parent_ids())));
        }

        Ok(ids
            .iter()
            .map(|id| match by_id.get(id) {
                Some(parents) => roles.pick(parents).flatten().cloned().collect(),
                None => Vec::new(),
            })
            .collect())
    }

    async fn children_of(
        &self,
        ids: &[M::Id],
        roles: &RoleSelection,
    ) -> Result<Vec<ChildLink<M::Id>>, TreeScopeError> {
        let selected = roles.indices().len();
        if ids.is_empty() || selected == 0 {
            return Ok(Vec::new());
        }

        // Every selected column binds the whole chunk.
        let chunk_size = (ID_CHUNK / selected).max(1);
        let columns = M::parent_columns();
        let mut rows = Vec::new();
        let mut chunks = 0;
        for chunk in ids.chunks(chunk_size) {
            let values = chunk.iter().map(M::id_to_value).collect::<Vec<_>>();
            let mut condition = Condition::any();
            for column in roles.pick(&columns) {
                condition = condition.add(column.is_in(values.clone()));
            }

            let query = storage_order::<M, _>(M::Entity::find().filter(condition));
            let found = query.all(self.conn).await?;
            trace!(parents = chunk.len(), children = found.len(), "loaded child rows");
            rows.extend(found);
            chunks += 1;
        }

        if chunks > 1 {
            let keys = storage_keys::<M>();
            rows.sort_by(|a, b| compare_rows(a, b, &keys));
        }

        // A row naming parents from two chunks comes back twice.
        let mut seen = HashSet::new();
        Ok(rows
            .iter()
            .filter(|row| seen.insert(row.id()))
            .map(|row| ChildLink {
                id: row.id(),
                parents: roles.pick(&row.parent_ids()).flatten().cloned().collect(),
            })
            .collect())
    }
}

/// Apply the storage default ordering: the configured column, then the primary key.
pub(crate) fn storage_order<M, Q>(mut query: Q) -> Q
where
    M: TreeScopeModel,
    Q: QueryOrder,
{
    if let Some(column) = M::tree_scope_config().order_column() {
        query = query.order_by_asc(Expr::cust(column.to_owned()));
    }
    query.order_by_asc(M::id_column())
}

/// The storage default ordering as column keys, for merging chunked results.
///
/// An ordering column that is not one of the entity's columns is skipped here.
pub(crate) fn storage_keys<M>() -> Vec<(ColumnOf<M>, Order)>
where
    M: TreeScopeModel,
{
    let mut keys = Vec::with_capacity(2);
    if let Some(column) = M::tree_scope_config().order_column() {
        if let Ok(column) = <ColumnOf<M> as FromStr>::from_str(column) {
            keys.push((column, Order::Asc));
        }
    }
    keys.push((M::id_column(), Order::Asc));
    keys
}

/// Column values of `row` for each key, in key order.
pub(crate) fn key_values<M>(row: &M, keys: &[(ColumnOf<M>, Order)]) -> Vec<Value>
where
    M: TreeScopeModel,
{
    keys.iter()
        .map(|(column, _)| model_get::<M::Entity>(row, *column))
        .collect()
}

/// Compare two rows the way `ORDER BY keys` would. Nulls sort first.
pub(crate) fn compare_rows<M>(a: &M, b: &M, keys: &[(ColumnOf<M>, Order)]) -> Ordering
where
    M: TreeScopeModel,
{
    for (column, order) in keys {
        let left = model_get::<M::Entity>(a, *column);
        let right = model_get::<M::Entity>(b, *column);
        let ordering = match order {
            Order::Desc => compare_values(&left, &right).reverse(),
            _ => compare_values(&left, &right),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn model_get<E: EntityTrait>(row: &E::Model, column: E::Column) -> Value {
    row.get(column)
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::TinyInt(a), Value::TinyInt(b)) => a.cmp(b),
        (Value::SmallInt(a), Value::SmallInt(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::BigInt(a), Value::BigInt(b)) => a.cmp(b),
        (Value::TinyUnsigned(a), Value::TinyUnsigned(b)) => a.cmp(b),
        (Value::SmallUnsigned(a), Value::SmallUnsigned(b)) => a.cmp(b),
        (Value::Unsigned(a), Value::Unsigned(b)) => a.cmp(b),
        (Value::BigUnsigned(a), Value::BigUnsigned(b)) => a.cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Char(a), Value::Char(b)) => a.cmp(b),
        (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}
