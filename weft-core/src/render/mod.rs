//! Render Tree
//!
//! Renderables and the structural directives that compose them. Every
//! directive anchors itself with one trailing empty text node (its marker)
//! and mounts children before it, so a directive's whole span can be moved
//! or torn down without the parent tracking individual children.
//!
//! # Directives
//!
//! - [`Text`] / [`Fragment`]: leaf text and ordered sequences.
//! - [`Conditional`]: first-true-wins branch chains.
//! - [`Each`]: identity-keyed lists with move-based reconciliation.
//! - [`Keyed`]: force-re-create on key change.
//! - [`Await`]: pending/settled/error projection of a promise.
//! - [`Boundary`]: contains a child's mount failure behind a fallback.

mod awaiting;
mod boundary;
mod conditional;
mod each;
mod fragment;
mod keyed;
mod renderable;

pub use awaiting::Await;
pub use boundary::Boundary;
pub use conditional::{Condition, Conditional};
pub use each::Each;
pub use fragment::{Child, Fragment, Text};
pub use keyed::Keyed;
pub use renderable::{Disposable, Disposables, RenderError, RenderResult, Renderable};
