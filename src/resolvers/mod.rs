//! Resolver composition: generated CRUD handlers, caller overrides and the
//! guard applied to every handler before installation

pub mod builder;
pub mod compose;
pub mod generated;
pub mod registry;
pub mod wrap;

pub use builder::GraphBuilder;
pub use compose::compose;
pub use generated::{GeneratedResolver, generate};
pub use registry::{Handler, HandlerRegistry, RegistryNode, Resolver, ResolverMap, resolver_fn};
pub use wrap::wrap;
