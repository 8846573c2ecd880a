//! Data shared by resolvers: the application services (one per schema) and
//! the scope of a single query (memoized results and cancellation).

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use async_graphql::{Context, Error, ErrorExtensions, Result};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::application::{
    CrossReferenceResolver, HistoryResolver, NodeRegistry, RepositoryDirectory, RepositoryStore,
    TreeResolver,
};
use crate::domain::DomainError;

pub const NULL_ON_NON_NULL_FIELD: &str = "NULL_ON_NON_NULL_FIELD";
pub const CANCELLED: &str = "CANCELLED";

impl ErrorExtensions for DomainError {
    fn extend(&self) -> Error {
        Error::new(self.to_string()).extend_with(|_, e| e.set("code", self.code()))
    }
}

/// Application services the resolvers dispatch to.
pub struct GraphServices {
    pub store: Arc<RepositoryStore>,
    pub trees: Arc<TreeResolver>,
    pub history: Arc<HistoryResolver>,
    pub references: Arc<CrossReferenceResolver>,
    pub nodes: Arc<NodeRegistry>,
    pub directory: Arc<dyn RepositoryDirectory>,
}

impl GraphServices {
    pub fn new(
        store: Arc<RepositoryStore>,
        trees: Arc<TreeResolver>,
        history: Arc<HistoryResolver>,
        references: Arc<CrossReferenceResolver>,
        nodes: Arc<NodeRegistry>,
        directory: Arc<dyn RepositoryDirectory>,
    ) -> Self {
        Self {
            store,
            trees,
            history,
            references,
            nodes,
            directory,
        }
    }
}

type MemoCell = Arc<OnceCell<Box<dyn Any + Send + Sync>>>;

/// Per-query state. Every backend-bound field goes through [`QueryScope`]
/// so that it runs at most once per query for a given parent and argument
/// set, and gives up as soon as the query is cancelled.
pub struct QueryScope {
    cancel: CancellationToken,
    memo: Mutex<HashMap<String, MemoCell>>,
}

impl QueryScope {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a non-null field. An absent entity cannot be represented, so
    /// it is reported as `NULL_ON_NON_NULL_FIELD`.
    pub async fn value<T, F, Fut>(&self, key: String, resolve: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, DomainError>> + Send,
    {
        self.memoized(key, || async move {
            resolve().await.map_err(|e| {
                if e.is_not_found() {
                    Error::new(format!("non-null field resolved to null: {}", e))
                        .extend_with(|_, x| x.set("code", NULL_ON_NON_NULL_FIELD))
                } else {
                    e.extend()
                }
            })
        })
        .await
    }

    /// Resolve a nullable field; an absent entity reads as `null`.
    pub async fn optional<T, F, Fut>(&self, key: String, resolve: F) -> Result<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Option<T>, DomainError>> + Send,
    {
        self.memoized(key, || async move {
            match resolve().await {
                Err(e) if e.is_not_found() => Ok(None),
                other => other.map_err(|e| e.extend()),
            }
        })
        .await
    }

    async fn memoized<T, F, Fut>(&self, key: String, resolve: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }

        let cell = {
            let mut memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(memo.entry(key).or_default())
        };
        let work = cell.get_or_init(|| async move {
            Box::new(resolve().await) as Box<dyn Any + Send + Sync>
        });

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(cancelled()),
            value = work => value
                .downcast_ref::<Result<T>>()
                .cloned()
                .unwrap_or_else(|| Err(Error::new("memoized field has a different type"))),
        }
    }
}

fn cancelled() -> Error {
    Error::new("field resolution was cancelled").extend_with(|_, e| e.set("code", CANCELLED))
}

/// Services and the current query scope.
pub fn scope<'a>(ctx: &Context<'a>) -> Result<(&'a GraphServices, &'a QueryScope)> {
    Ok((ctx.data::<GraphServices>()?, ctx.data::<QueryScope>()?))
}
