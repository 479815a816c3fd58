//! Weft Core
//!
//! This crate provides the core runtime for the Weft reactive UI framework.
//! It implements:
//!
//! - Reactive stores (settable atoms, derived aggregates, promises)
//! - A renderable lifecycle (mount / move / unmount) over an abstract host
//! - Structural directives (conditionals, identity-keyed lists, keyed
//!   remounts, async boundaries, error boundaries)
//!
//! The runtime is host-agnostic: anything implementing the [`host::Host`]
//! trait (four primitive node operations) can back a render tree. An
//! in-memory host is included for embedding and testing.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `store`: Reactive state containers and change propagation
//! - `host`: The host-tree abstraction and the in-memory reference host
//! - `render`: Renderables and the structural directives
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::host::MemoryHost;
//! use weft_core::render::{Condition, Conditional, Renderable, Text};
//! use weft_core::store::AtomStore;
//!
//! let host = std::sync::Arc::new(MemoryHost::new());
//! let shared: weft_core::host::SharedHost = host.clone();
//!
//! // A store drives which branch is visible.
//! let logged_in = AtomStore::new(false);
//!
//! let view = Conditional::when(
//!     Condition::store(logged_in.clone()),
//!     Text::literal("welcome back"),
//! )
//! .or_else(Text::literal("please sign in"));
//!
//! view.mount(&shared, host.root(), None)?;
//!
//! // Updating the store swaps the mounted branch.
//! logged_in.set(true);
//! ```

pub mod host;
pub mod render;
pub mod store;
