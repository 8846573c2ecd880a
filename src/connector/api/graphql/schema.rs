//! Object types of the repository graph.
//!
//! Each type wraps its domain value. Fields that reach a backend go through
//! the query scope so they run once per query for the same parent and
//! arguments.

use async_graphql::{Context, Interface, Object, Result, SimpleObject, ID};

use super::context::scope;
use crate::application::NodeRegistry;
use crate::domain;

/// An object with a global identifier.
#[derive(Interface)]
#[graphql(field(name = "id", ty = "ID"))]
pub enum Node {
    Repository(Repository),
    Commit(Commit),
}

impl From<crate::application::Node> for Node {
    fn from(node: crate::application::Node) -> Self {
        match node {
            crate::application::Node::Repository(repo) => Node::Repository(Repository(repo)),
            crate::application::Node::Commit(commit) => Node::Commit(Commit(commit)),
        }
    }
}

pub struct Repository(pub domain::Repository);

#[Object]
impl Repository {
    async fn id(&self) -> ID {
        ID(NodeRegistry::repository_id(&self.0))
    }

    async fn uri(&self) -> &str {
        self.0.uri()
    }

    async fn description(&self) -> &str {
        self.0.description()
    }

    /// The commit `rev` names. While the repository is still being fetched
    /// the state reports `cloneInProgress` instead.
    async fn commit(&self, ctx: &Context<'_>, rev: String) -> Result<CommitState> {
        let (services, scope) = scope(ctx)?;
        let key = format!("commit:{}:{}", self.0.uri(), rev);
        let state = scope
            .value(key, || services.store.commit_state(&self.0, &rev))
            .await?;
        Ok(CommitState(state))
    }

    /// The head of the default branch.
    async fn latest(&self, ctx: &Context<'_>) -> Result<CommitState> {
        let (services, scope) = scope(ctx)?;
        let key = format!("latest:{}", self.0.uri());
        let state = scope.value(key, || services.store.latest(&self.0)).await?;
        Ok(CommitState(state))
    }

    async fn default_branch(&self) -> &str {
        self.0.default_branch()
    }

    async fn branches(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        let (services, scope) = scope(ctx)?;
        let key = format!("branches:{}", self.0.uri());
        scope.value(key, || services.store.branches(&self.0)).await
    }

    async fn tags(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        let (services, scope) = scope(ctx)?;
        let key = format!("tags:{}", self.0.uri());
        scope.value(key, || services.store.tags(&self.0)).await
    }
}

pub struct CommitState(domain::CommitState);

#[Object]
impl CommitState {
    async fn commit(&self) -> Option<Commit> {
        self.0.commit().cloned().map(Commit)
    }

    async fn clone_in_progress(&self) -> bool {
        self.0.clone_in_progress()
    }
}

pub struct Commit(pub domain::Commit);

impl Commit {
    fn key(&self) -> String {
        format!("{}@{}", self.0.repository_uri(), self.0.sha1())
    }
}

#[Object]
impl Commit {
    async fn id(&self) -> ID {
        ID(NodeRegistry::commit_id(&self.0))
    }

    async fn sha1(&self) -> &str {
        self.0.sha1()
    }

    /// The tree rooted at `path`. With `recursive`, `files` lists every file
    /// below it.
    async fn tree(
        &self,
        ctx: &Context<'_>,
        #[graphql(default_with = "Some(String::new())")] path: Option<String>,
        #[graphql(default_with = "Some(false)")] recursive: Option<bool>,
    ) -> Result<Option<Tree>> {
        let (services, scope) = scope(ctx)?;
        let path = path.unwrap_or_default();
        let recursive = recursive.unwrap_or(false);
        let key = format!("tree:{}:{}:{}", self.key(), path, recursive);
        let tree = scope
            .optional(key, || services.trees.tree(&self.0, &path, recursive))
            .await?;
        Ok(tree.map(Tree))
    }

    async fn file(&self, ctx: &Context<'_>, path: String) -> Result<Option<File>> {
        let (services, scope) = scope(ctx)?;
        let key = format!("file:{}:{}", self.key(), path);
        let file = scope
            .optional(key, || services.trees.file(&self.0, &path))
            .await?;
        Ok(file.map(File))
    }

    /// Languages detected from the file extensions in the commit.
    async fn languages(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        let (services, scope) = scope(ctx)?;
        let key = format!("languages:{}", self.key());
        let languages = scope
            .value(key, || services.store.languages(&self.0))
            .await?;
        Ok(languages.as_ref().clone())
    }
}

pub struct Tree(domain::Tree);

impl Tree {
    fn key(&self) -> String {
        format!(
            "{}@{}:{}:{}",
            self.0.commit.repository_uri(),
            self.0.commit.sha1(),
            self.0.path,
            self.0.recursive
        )
    }
}

#[Object]
impl Tree {
    async fn directories(&self, ctx: &Context<'_>) -> Result<Vec<Option<Directory>>> {
        let (services, scope) = scope(ctx)?;
        let key = format!("directories:{}", self.key());
        let dirs = scope
            .value(key, || services.trees.directories(&self.0))
            .await?;
        Ok(dirs.into_iter().map(|dir| Some(Directory(dir))).collect())
    }

    async fn files(&self, ctx: &Context<'_>) -> Result<Vec<Option<File>>> {
        let (services, scope) = scope(ctx)?;
        let key = format!("files:{}", self.key());
        let files = scope.value(key, || services.trees.files(&self.0)).await?;
        Ok(files.into_iter().map(|file| Some(File(file))).collect())
    }
}

pub struct Directory(domain::Directory);

#[Object]
impl Directory {
    async fn name(&self) -> &str {
        &self.0.name
    }

    async fn tree(&self) -> Tree {
        Tree(self.0.tree())
    }
}

pub struct File(domain::File);

impl File {
    fn key(&self) -> String {
        format!(
            "{}@{}:{}",
            self.0.commit.repository_uri(),
            self.0.commit.sha1(),
            self.0.path
        )
    }
}

#[Object]
impl File {
    async fn name(&self) -> &str {
        &self.0.name
    }

    async fn content(&self, ctx: &Context<'_>) -> Result<String> {
        let (services, scope) = scope(ctx)?;
        let key = format!("content:{}", self.key());
        scope.value(key, || services.trees.content(&self.0)).await
    }

    /// Line attribution for `startLine..=endLine` (1-based, inclusive).
    async fn blame(
        &self,
        ctx: &Context<'_>,
        start_line: i32,
        end_line: i32,
    ) -> Result<Vec<Hunk>> {
        let (services, scope) = scope(ctx)?;
        let key = format!("blame:{}:{}:{}", self.key(), start_line, end_line);
        let hunks = scope
            .value(key, || {
                services
                    .history
                    .blame(&self.0, start_line.into(), end_line.into())
            })
            .await?;
        Ok(hunks.into_iter().map(Hunk::from).collect())
    }

    /// Commits that touched the file, newest first.
    async fn commits(&self, ctx: &Context<'_>) -> Result<Vec<CommitInfo>> {
        let (services, scope) = scope(ctx)?;
        let key = format!("commits:{}", self.key());
        let commits = scope
            .value(key, || services.history.commits(&self.0))
            .await?;
        Ok(commits.into_iter().map(CommitInfo::from).collect())
    }

    /// Where the symbol at `line`:`column` (1-based) is defined, if the
    /// code intelligence service knows.
    async fn definition(
        &self,
        ctx: &Context<'_>,
        line: i32,
        column: i32,
        language: String,
    ) -> Result<Option<Definition>> {
        let (services, scope) = scope(ctx)?;
        let key = format!(
            "definition:{}:{}:{}:{}",
            self.key(),
            line,
            column,
            language
        );
        let definition = scope
            .optional(key, || {
                services
                    .references
                    .definition(&self.0, line.into(), column.into(), &language)
            })
            .await?;
        Ok(definition.map(Definition::from))
    }
}

#[derive(SimpleObject)]
pub struct Hunk {
    start_line: u32,
    end_line: u32,
    start_byte: u32,
    end_byte: u32,
    rev: String,
    author: Option<Signature>,
    message: String,
}

impl From<domain::Hunk> for Hunk {
    fn from(hunk: domain::Hunk) -> Self {
        Self {
            start_line: hunk.start_line,
            end_line: hunk.end_line,
            start_byte: hunk.start_byte,
            end_byte: hunk.end_byte,
            rev: hunk.rev,
            author: hunk.author.map(Signature::from),
            message: hunk.message,
        }
    }
}

#[derive(SimpleObject)]
pub struct CommitInfo {
    rev: String,
    author: Option<Signature>,
    committer: Option<Signature>,
    message: String,
}

impl From<domain::CommitInfo> for CommitInfo {
    fn from(info: domain::CommitInfo) -> Self {
        Self {
            rev: info.rev,
            author: info.author.map(Signature::from),
            committer: info.committer.map(Signature::from),
            message: info.message,
        }
    }
}

#[derive(SimpleObject)]
pub struct Signature {
    person: Option<Person>,
    /// RFC 3339 timestamp.
    date: String,
}

impl From<domain::Signature> for Signature {
    fn from(signature: domain::Signature) -> Self {
        Self {
            person: signature.person.map(Person),
            date: signature.date,
        }
    }
}

pub struct Person(domain::Person);

#[Object]
impl Person {
    async fn name(&self) -> &str {
        &self.0.name
    }

    async fn email(&self) -> &str {
        &self.0.email
    }

    /// Hex SHA-256 of the trimmed, lower-cased email.
    async fn gravatar_hash(&self) -> String {
        self.0.gravatar_hash()
    }
}

#[derive(SimpleObject)]
pub struct Definition {
    global_references: Vec<RefFields>,
}

impl From<domain::Definition> for Definition {
    fn from(definition: domain::Definition) -> Self {
        Self {
            global_references: definition
                .global_references
                .into_iter()
                .map(RefFields::from)
                .collect(),
        }
    }
}

#[derive(SimpleObject)]
pub struct RefFields {
    ref_location: Option<RefLocation>,
    uri: Option<Uri>,
}

impl From<domain::RefFields> for RefFields {
    fn from(fields: domain::RefFields) -> Self {
        Self {
            ref_location: fields.ref_location.map(RefLocation::from),
            uri: fields.uri.map(Uri::from),
        }
    }
}

#[derive(SimpleObject)]
pub struct RefLocation {
    start_line_number: u32,
    start_column: u32,
    end_line_number: u32,
    end_column: u32,
}

impl From<domain::RefLocation> for RefLocation {
    fn from(location: domain::RefLocation) -> Self {
        Self {
            start_line_number: location.start_line_number,
            start_column: location.start_column,
            end_line_number: location.end_line_number,
            end_column: location.end_column,
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "URI")]
pub struct Uri {
    host: String,
    fragment: String,
    path: String,
    query: String,
    scheme: String,
}

impl From<domain::Uri> for Uri {
    fn from(uri: domain::Uri) -> Self {
        Self {
            host: uri.host,
            fragment: uri.fragment,
            path: uri.path,
            query: uri.query,
            scheme: uri.scheme,
        }
    }
}

/// A repository known to the discovery service.
#[derive(SimpleObject)]
pub struct RemoteRepository {
    uri: String,
    description: String,
    language: String,
    fork: bool,
    private: bool,
    created_at: String,
    pushed_at: String,
}

impl From<domain::RemoteRepository> for RemoteRepository {
    fn from(remote: domain::RemoteRepository) -> Self {
        Self {
            uri: remote.uri,
            description: remote.description,
            language: remote.language,
            fork: remote.fork,
            private: remote.private,
            created_at: remote.created_at,
            pushed_at: remote.pushed_at,
        }
    }
}
