pub mod list_repositories_controller;
pub mod query_controller;
pub mod schema_controller;

pub use list_repositories_controller::ListRepositoriesController;
pub use query_controller::QueryController;
pub use schema_controller::SchemaController;
