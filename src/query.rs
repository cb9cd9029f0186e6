use std::collections::{HashMap, HashSet};

use sea_orm::sea_query::IntoCondition;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
};

use crate::error::TreeScopeError;
use crate::links::{
    compare_rows, key_values, storage_keys, storage_order, ColumnOf, ID_CHUNK,
};
use crate::traits::TreeScopeModel;

/// Rows a scope starts from before any caller filter applies.
#[derive(Clone, Debug)]
enum Base<Id> {
    /// A precomputed closure. `positional` keeps the closure's own order.
    Ids { ids: Vec<Id>, positional: bool },
    /// Rows matching a condition, in storage order.
    Matching(Condition),
}

/// A chainable scope over tree rows.
///
/// Nothing is read until [`all`](Self::all), [`one`](Self::one) or
/// [`count`](Self::count) runs, and each of those issues a single query no
/// matter how many filters were chained; closures wider than one `IN (...)`
/// list are fetched in chunks and merged. Without an explicit ordering the rows
/// come back in the scope's own order, so filtering keeps relative order. With
/// one, rows tied on every ordering column keep their closure order.
pub struct ScopedQuery<M>
where
    M: TreeScopeModel,
{
    base: Base<M::Id>,
    condition: Condition,
    orderings: Vec<(ColumnOf<M>, Order)>,
    limit: Option<u64>,
}

impl<M> Clone for ScopedQuery<M>
where
    M: TreeScopeModel,
{
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            condition: self.condition.clone(),
            orderings: self.orderings.clone(),
            limit: self.limit,
        }
    }
}

impl<M> std::fmt::Debug for ScopedQuery<M>
where
    M: TreeScopeModel,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedQuery")
            .field("base", &self.base)
            .field("condition", &self.condition)
            .field("orderings", &self.orderings.len())
            .field("limit", &self.limit)
            .finish()
    }
}

impl<M> ScopedQuery<M>
where
    M: TreeScopeModel,
{
    /// Scope over a closure, returned in the given order.
    pub fn from_ids(ids: Vec<M::Id>) -> Self {
        Self::with_base(Base::Ids {
            ids,
            positional: true,
        })
    }

    /// Scope over a closure, returned in storage order.
    pub fn from_ids_in_storage_order(ids: Vec<M::Id>) -> Self {
        Self::with_base(Base::Ids {
            ids,
            positional: false,
        })
    }

    /// Scope over every row matching `condition`, in storage order.
    pub fn matching(condition: Condition) -> Self {
        Self::with_base(Base::Matching(condition))
    }

    fn with_base(base: Base<M::Id>) -> Self {
        Self {
            base,
            condition: Condition::all(),
            orderings: Vec::new(),
            limit: None,
        }
    }

    /// The closure ids this scope was built from, if it was built from ids.
    pub fn ids(&self) -> Option<&[M::Id]> {
        match &self.base {
            Base::Ids { ids, .. } => Some(ids),
            Base::Matching(_) => None,
        }
    }

    /// True when the scope is known to be empty without a round trip.
    pub fn is_empty(&self) -> bool {
        matches!(&self.base, Base::Ids { ids, .. } if ids.is_empty())
    }

    /// Narrow the scope; repeated calls are combined with `AND`.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: IntoCondition,
    {
        self.condition = self.condition.add(filter.into_condition());
        self
    }

    pub fn order_by_asc(mut self, column: ColumnOf<M>) -> Self {
        self.orderings.push((column, Order::Asc));
        self
    }

    pub fn order_by_desc(mut self, column: ColumnOf<M>) -> Self {
        self.orderings.push((column, Order::Desc));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub async fn all<C>(&self, conn: &C) -> Result<Vec<M>, TreeScopeError>
    where
        C: ConnectionTrait,
    {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let positional = self.positional();
        let bases = self.bases();
        let chunked = bases.len() > 1;
        let mut rows = Vec::new();
        for base in bases {
            let mut query = self.select(base);
            if self.orderings.is_empty() {
                if !positional {
                    query = storage_order::<M, _>(query);
                }
            } else {
                for (column, order) in &self.orderings {
                    query = query.order_by(*column, order.clone());
                }
            }
            // Ties on a positional base are settled after the fetch.
            if !positional {
                if let Some(limit) = self.limit {
                    query = query.limit(limit);
                }
            }
            rows.extend(query.all(conn).await?);
        }

        let keys = self.sort_keys(positional);
        if chunked && !keys.is_empty() {
            rows.sort_by(|a, b| compare_rows(a, b, &keys));
        }

        if positional {
            if let Base::Ids { ids, .. } = &self.base {
                settle_ties(&mut rows, &keys, ids);
            }
        }
        if let Some(limit) = self.limit {
            rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        Ok(rows)
    }

    pub async fn one<C>(&self, conn: &C) -> Result<Option<M>, TreeScopeError>
    where
        C: ConnectionTrait,
    {
        let rows = self.clone().limit(1).all(conn).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn count<C>(&self, conn: &C) -> Result<u64, TreeScopeError>
    where
        C: ConnectionTrait,
    {
        if self.is_empty() {
            return Ok(0);
        }
        let mut total = 0;
        for base in self.bases() {
            total += self.select(base).count(conn).await?;
        }
        Ok(match self.limit {
            Some(limit) => total.min(limit),
            None => total,
        })
    }

    // Closure order decides between rows the ordering keys leave tied.
    fn positional(&self) -> bool {
        matches!(self.base, Base::Ids { positional: true, .. })
    }

    fn sort_keys(&self, positional: bool) -> Vec<(ColumnOf<M>, Order)> {
        if !self.orderings.is_empty() {
            self.orderings.clone()
        } else if positional {
            Vec::new()
        } else {
            storage_keys::<M>()
        }
    }

    // One base condition per id chunk, or the scope's own condition.
    fn bases(&self) -> Vec<Condition> {
        match &self.base {
            Base::Ids { ids, .. } => {
                let mut seen = HashSet::new();
                let unique: Vec<&M::Id> = ids.iter().filter(|id| seen.insert(*id)).collect();
                unique
                    .chunks(ID_CHUNK)
                    .map(|chunk| {
                        let values = chunk
                            .iter()
                            .map(|id| M::id_to_value(id))
                            .collect::<Vec<_>>();
                        Condition::all().add(M::id_column().is_in(values))
                    })
                    .collect()
            }
            Base::Matching(condition) => vec![condition.clone()],
        }
    }

    fn select(&self, base: Condition) -> Select<M::Entity> {
        M::Entity::find()
            .filter(base)
            .filter(self.condition.clone())
    }
}

/// Within each run of rows sharing their key values, restore closure order.
fn settle_ties<M>(rows: &mut [M], keys: &[(ColumnOf<M>, Order)], ids: &[M::Id])
where
    M: TreeScopeModel,
{
    let mut positions: HashMap<&M::Id, usize> = HashMap::with_capacity(ids.len());
    for (position, id) in ids.iter().enumerate() {
        positions.entry(id).or_insert(position);
    }
    let position = |row: &M| positions.get(&row.id()).copied().unwrap_or(usize::MAX);

    let mut start = 0;
    while start < rows.len() {
        let run = key_values(&rows[start], keys);
        let mut end = start + 1;
        while end < rows.len() && key_values(&rows[end], keys) == run {
            end += 1;
        }
        rows[start..end].sort_by_key(|row| position(row));
        start = end;
    }
}
