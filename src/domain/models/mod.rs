mod blame;
mod commit;
mod definition;
mod language;
mod node_id;
mod repository;
mod revision;
mod tree;

pub use blame::*;
pub use commit::*;
pub use definition::*;
pub use language::*;
pub use node_id::*;
pub use repository::*;
pub use revision::*;
pub use tree::*;
