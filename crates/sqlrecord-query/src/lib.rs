//! Dynamic SQL query builders for sqlrecord.
//!
//! `sqlrecord-query` is the **query construction layer**. Builders are plain
//! values assembled at runtime from table and column names; each renders to
//! SQL plus bound parameters for a [`Dialect`](sqlrecord_core::Dialect).
//!
//! - [`Select`] with DISTINCT, aliased columns, joins, WHERE/HAVING groups,
//!   GROUP BY, ORDER BY, LIMIT and OFFSET
//! - [`Insert`], [`Update`], [`Delete`]
//! - [`Query`], a SELECT/UPDATE/DELETE chosen at runtime, for replaying
//!   recorded builder calls once the statement kind is known

pub mod builder;
pub mod clause;
pub mod expr;
pub mod join;
pub mod query;
pub mod select;

pub use builder::{Delete, Insert, Update};
pub use clause::{Condition, Conditions, OrderBy, OrderDirection};
pub use expr::{Expr, Logic, Op};
pub use join::{Join, JoinType};
pub use query::{Query, QueryKind};
pub use select::Select;
