mod git_vcs_backend;
mod github_repository_directory;
mod http_code_intelligence;
mod in_memory_vcs_backend;
mod mock_code_intelligence;
mod static_repository_directory;

pub use git_vcs_backend::*;
pub use github_repository_directory::*;
pub use http_code_intelligence::*;
pub use in_memory_vcs_backend::*;
pub use mock_code_intelligence::*;
pub use static_repository_directory::*;
