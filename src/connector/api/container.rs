use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::application::{
    CodeIntelligence, CrossReferenceResolver, HistoryResolver, ListRepositoriesUseCase,
    NodeRegistry, RepositoryDirectory, RepositoryStore, TreeResolver, VcsBackend,
};
use crate::connector::adapter::{
    GitVcsBackend, GithubRepositoryDirectory, HttpCodeIntelligence, StaticRepositoryDirectory,
};

use super::graphql::{GraphServices, QueryEngine};

pub const DEFAULT_CLONE_URL: &str = "https://{uri}";

#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Root holding local clones, laid out as `<root>/<uri>`.
    pub repos_dir: String,
    /// Repositories that may be cloned on demand.
    pub repositories: Vec<String>,
    pub clone_url: String,
    pub code_intel_url: Option<String>,
    pub code_intel_timeout: Duration,
    pub query_timeout: Option<Duration>,
    pub revision_cache_ttl: Duration,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            repos_dir: "~/.repograph/repos".to_string(),
            repositories: Vec::new(),
            clone_url: DEFAULT_CLONE_URL.to_string(),
            code_intel_url: None,
            code_intel_timeout: Duration::from_millis(2000),
            query_timeout: None,
            revision_cache_ttl: Duration::from_secs(30),
        }
    }
}

pub struct Container {
    store: Arc<RepositoryStore>,
    engine: Arc<QueryEngine>,
    config: ContainerConfig,
}

impl Container {
    /// Wire the git backend under `repos_dir` together with the optional
    /// code-intelligence endpoint and the GitHub directory from the
    /// environment.
    pub fn new(config: ContainerConfig) -> Result<Self> {
        let root = PathBuf::from(&config.repos_dir);
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create repos dir {}", root.display()))?;

        let backend = Arc::new(
            GitVcsBackend::new(&root, config.clone_url.clone())
                .with_repositories(config.repositories.iter().cloned()),
        );
        debug!("Using git storage at {}", root.display());

        let capability: Option<Arc<dyn CodeIntelligence>> = match config.code_intel_url.as_deref()
        {
            Some(url) => {
                info!("Using code intelligence at {}", url);
                Some(Arc::new(HttpCodeIntelligence::new(url)))
            }
            None => HttpCodeIntelligence::from_env().map(|c| {
                info!("Using code intelligence at {}", c.url());
                Arc::new(c) as Arc<dyn CodeIntelligence>
            }),
        };

        let directory: Arc<dyn RepositoryDirectory> = match GithubRepositoryDirectory::from_env() {
            Some(github) => {
                debug!("Repository discovery enabled");
                Arc::new(github)
            }
            None => {
                debug!("GITHUB_TOKEN not set; discovery listings are empty");
                Arc::new(StaticRepositoryDirectory::empty())
            }
        };

        Ok(Self::with_services(config, backend, capability, directory))
    }

    /// Wire the engine over explicit services.
    pub fn with_services(
        config: ContainerConfig,
        backend: Arc<dyn VcsBackend>,
        capability: Option<Arc<dyn CodeIntelligence>>,
        directory: Arc<dyn RepositoryDirectory>,
    ) -> Self {
        let store = Arc::new(RepositoryStore::new(
            backend.clone(),
            config.revision_cache_ttl,
        ));
        let trees = Arc::new(TreeResolver::new(backend.clone()));
        let history = Arc::new(HistoryResolver::new(backend, trees.clone()));
        let references = Arc::new(CrossReferenceResolver::new(
            capability,
            config.code_intel_timeout,
        ));
        let nodes = Arc::new(NodeRegistry::new(store.clone()));

        let services =
            GraphServices::new(store.clone(), trees, history, references, nodes, directory);
        let engine = Arc::new(QueryEngine::new(services).with_timeout(config.query_timeout));

        Self {
            store,
            engine,
            config,
        }
    }

    pub fn engine(&self) -> Arc<QueryEngine> {
        self.engine.clone()
    }

    pub fn store(&self) -> Arc<RepositoryStore> {
        self.store.clone()
    }

    pub fn list_use_case(&self) -> ListRepositoriesUseCase {
        ListRepositoriesUseCase::new(self.store.clone())
    }

    pub fn repos_dir(&self) -> &str {
        &self.config.repos_dir
    }
}
