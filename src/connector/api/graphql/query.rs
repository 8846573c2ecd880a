//! Query root and the `Root` entry object.

use async_graphql::{Context, Object, Result, ID};
use tracing::warn;

use super::context::scope;
use super::schema::{Node, RemoteRepository, Repository};
use crate::domain;

pub struct Query;

#[Object]
impl Query {
    async fn root(&self) -> Root {
        Root
    }

    /// Look up a `Repository` or `Commit` by its global id.
    async fn node(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Node>> {
        let (services, scope) = scope(ctx)?;
        let key = format!("node:{}", id.as_str());
        let node = scope
            .optional(key, || services.nodes.node(id.as_str()))
            .await?;
        Ok(node.map(Node::from))
    }
}

pub struct Root;

#[Object]
impl Root {
    async fn repository(&self, ctx: &Context<'_>, uri: String) -> Result<Option<Repository>> {
        let (services, scope) = scope(ctx)?;
        let key = format!("repository:{}", uri);
        let repo = scope
            .optional(key, || services.store.repository(&uri))
            .await?;
        Ok(repo.map(Repository))
    }

    /// Repositories the discovery service lists for the configured account.
    async fn remote_repositories(&self, ctx: &Context<'_>) -> Result<Vec<RemoteRepository>> {
        let (services, scope) = scope(ctx)?;
        let listing = scope
            .value("remoteRepositories".to_string(), || {
                services.directory.repositories()
            })
            .await;
        Ok(discovered(ctx, listing))
    }

    async fn remote_starred_repositories(
        &self,
        ctx: &Context<'_>,
    ) -> Result<Vec<RemoteRepository>> {
        let (services, scope) = scope(ctx)?;
        let listing = scope
            .value("remoteStarredRepositories".to_string(), || {
                services.directory.starred_repositories()
            })
            .await;
        Ok(discovered(ctx, listing))
    }
}

/// A failed listing still resolves to an empty list; the failure is
/// reported as an error at the field's path.
fn discovered(
    ctx: &Context<'_>,
    listing: Result<Vec<domain::RemoteRepository>>,
) -> Vec<RemoteRepository> {
    match listing {
        Ok(remotes) => remotes.into_iter().map(RemoteRepository::from).collect(),
        Err(e) => {
            warn!(field = %ctx.item.node.name.node, "repository discovery failed: {}", e.message);
            let error = e.into_server_error(ctx.item.pos);
            ctx.add_error(ctx.set_error_path(error));
            Vec::new()
        }
    }
}
