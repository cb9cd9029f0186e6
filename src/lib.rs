//! Ancestor and descendant scopes for SeaORM models.
//!
//! Models whose rows point at parent rows through one or more nullable foreign
//! keys (`manager_id`, or `father_id` and `mother_id`) get parent, child,
//! ancestor and descendant queries. Closures are walked one generation per
//! query and handed back as [`ScopedQuery`] values that can be filtered and
//! ordered further before anything is materialised. Nothing is stored beyond the
//! model's own foreign keys, so the hierarchy always reflects current rows.

pub mod closure;
pub mod config;
pub mod error;
pub mod links;
pub mod query;
pub mod repository;
pub mod scopes;
pub mod traits;

pub mod prelude {
    //! Convenient re-exports for consumers.
    pub use crate::config::{
        AncestorOrder, ParentRole, RoleSelection, TreeScopeConfig, TreeScopeOptions,
    };
    pub use crate::query::ScopedQuery;
    pub use crate::repository::TreeScopeRepository;
    pub use crate::scopes::{ScopeKind, TreeScopes};
    pub use crate::traits::TreeScopeModel;
}

pub use closure::Generations;
pub use config::{
    AncestorOrder, ParentRole, RoleSelection, TreeScopeConfig, TreeScopeOptions,
    DEFAULT_MAX_DEPTH,
};
pub use error::TreeScopeError;
pub use links::{ChildLink, EntityLinks, LinkSource};
pub use query::ScopedQuery;
pub use recursive_tree_scopes_macros::TreeScopeModel as TreeScopeModelDerive;
#[doc(hidden)]
pub use recursive_tree_scopes_macros::TreeScopeModel;
pub use repository::{TreeScopeRepository, BUILTIN_ACCESSORS};
pub use scopes::{ScopeDeclaration, ScopeKind, TreeScopes};
pub use traits::TreeScopeModel;
