mod cross_reference;
mod history;
mod list_repositories;
mod node_registry;
mod repository_store;
mod tree_resolver;

pub use cross_reference::*;
pub use history::*;
pub use list_repositories::*;
pub use node_registry::*;
pub use repository_store::*;
pub use tree_resolver::*;
