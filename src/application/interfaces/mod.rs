mod code_intelligence;
mod repository_directory;
mod vcs_backend;

pub use code_intelligence::*;
pub use repository_directory::*;
pub use vcs_backend::*;
