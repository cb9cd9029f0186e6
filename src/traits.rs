use std::fmt::Debug;
use std::hash::Hash;

use sea_orm::{EntityTrait, FromQueryResult, Value};

use crate::config::TreeScopeConfig;

/// Trait implemented by SeaORM `Model` types whose rows point at parent rows.
///
/// Implementations are normally provided by the `#[derive(TreeScopeModel)]` macro.
pub trait TreeScopeModel: Clone + Send + Sync + 'static + FromQueryResult {
    type Entity: EntityTrait<Model = Self>;
    type Id: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    fn tree_scope_config() -> &'static TreeScopeConfig;

    fn id(&self) -> Self::Id;

    /// Parent references in role declaration order; `None` where a role is unset.
    fn parent_ids(&self) -> Vec<Option<Self::Id>>;

    fn id_to_value(id: &Self::Id) -> Value;

    fn id_column() -> <Self::Entity as EntityTrait>::Column;

    /// Foreign-key columns in role declaration order.
    fn parent_columns() -> Vec<<Self::Entity as EntityTrait>::Column>;

    /// Names already taken on the model, checked before a scope name is accepted.
    fn member_names() -> &'static [&'static str];
}
