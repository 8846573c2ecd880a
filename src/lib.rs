pub mod application;
pub mod cli;
pub mod connector;
pub mod domain;

pub use cli::Commands;

pub use application::{
    CodeIntelligence, CrossReferenceResolver, HistoryResolver, ListRepositoriesUseCase,
    NodeRegistry, RepositoryDirectory, RepositoryStore, TreeResolver, VcsBackend,
};

pub use connector::{
    CommitSpec, Container, ContainerConfig, GitVcsBackend, GithubRepositoryDirectory,
    HttpCodeIntelligence, InMemoryVcsBackend, MockCodeIntelligence, QueryEngine, Request,
    Response, ResponseError, Router, StaticRepositoryDirectory,
};

pub use domain::{
    Commit, CommitState, DomainError, NodeId, RemoteRepository, Repository,
};
