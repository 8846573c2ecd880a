use anyhow::Result;

use crate::Commands;

use super::container::Container;
use super::controller::{ListRepositoriesController, QueryController, SchemaController};

pub struct Router<'a> {
    query_controller: QueryController<'a>,
    schema_controller: SchemaController<'a>,
    list_repositories_controller: ListRepositoriesController<'a>,
}

impl<'a> Router<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self {
            query_controller: QueryController::new(container),
            schema_controller: SchemaController::new(container),
            list_repositories_controller: ListRepositoriesController::new(container),
        }
    }

    pub async fn route(&self, command: Commands) -> Result<String> {
        match command {
            Commands::Query {
                query,
                variables,
                operation,
            } => {
                self.query_controller
                    .query(query, variables, operation)
                    .await
            }
            Commands::Schema => self.schema_controller.schema(),
            Commands::List => self.list_repositories_controller.list().await,
        }
    }
}
