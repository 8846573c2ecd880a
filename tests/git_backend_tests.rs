//! Tests of the libgit2 backend against on-disk fixtures.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use git2::{RepositoryInitOptions, Signature, Time};
use serde_json::{json, Value};
use tempfile::TempDir;

use repograph::application::CloneStatus;
use repograph::{
    Container, ContainerConfig, GitVcsBackend, ListRepositoriesUseCase, Request, Response,
    StaticRepositoryDirectory, VcsBackend,
};

const URI: &str = "github.com/acme/widgets";

fn init_repo(path: &Path) -> git2::Repository {
    fs::create_dir_all(path).unwrap();
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    git2::Repository::init_opts(path, &opts).unwrap()
}

fn commit_files(
    repo: &git2::Repository,
    files: &[(&str, &str)],
    message: &str,
    author: &str,
    time: i64,
) -> String {
    let workdir = repo.workdir().unwrap().to_path_buf();
    let mut index = repo.index().unwrap();
    for (path, content) in files {
        let full = workdir.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(&full, content).unwrap();
        index.add_path(Path::new(path)).unwrap();
    }
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let email = format!("{}@example.com", author.to_lowercase());
    let sig = Signature::new(author, &email, &Time::new(time, 0)).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
        .to_string()
}

struct Fixture {
    dir: TempDir,
    _repo: git2::Repository,
    first: String,
    second: String,
}

/// A working copy at `<root>/github.com/acme/widgets` with two commits.
fn fixture_at(root: &Path) -> (git2::Repository, String, String) {
    let repo = init_repo(&root.join(URI));
    let first = commit_files(
        &repo,
        &[("README.md", "# Widgets\n"), ("src/lib.rs", "fn a() {}\nfn b() {}\n")],
        "initial import",
        "Alice",
        1_600_000_000,
    );
    let second = commit_files(
        &repo,
        &[
            ("src/lib.rs", "fn a() {}\nfn b() {}\nfn c() {}\n"),
            ("src/util/mod.rs", "pub mod x;\n"),
        ],
        "add c",
        "Bob",
        1_600_000_100,
    );
    (repo, first, second)
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let (repo, first, second) = fixture_at(dir.path());
    Fixture {
        dir,
        _repo: repo,
        first,
        second,
    }
}

impl Fixture {
    fn root(&self) -> &Path {
        self.dir.path()
    }
}

fn container(backend: GitVcsBackend) -> Container {
    Container::with_services(
        ContainerConfig::default(),
        Arc::new(backend),
        None,
        Arc::new(StaticRepositoryDirectory::empty()),
    )
}

async fn run(container: &Container, query: &str) -> Response {
    container.engine().execute(Request::new(query)).await
}

fn at<'a>(response: &'a Response, pointer: &str) -> &'a Value {
    response
        .pointer(pointer)
        .unwrap_or_else(|| panic!("no value at {} in {:?}", pointer, response))
}

#[tokio::test]
async fn test_reads_through_libgit2() {
    let fx = fixture();
    let container = container(GitVcsBackend::new(fx.root(), "unused/{uri}"));

    let query = format!(
        r#"{{ root {{ repository(uri: "{}") {{
            defaultBranch branches description
            latest {{ commit {{
                sha1 languages
                tree(path: "src") {{ directories {{ name }} files {{ name }} }}
                file(path: "src/lib.rs") {{
                    content
                    commits {{ rev author {{ date person {{ name }} }} }}
                    blame(startLine: 1, endLine: 3) {{ startLine endLine startByte endByte rev }}
                }}
            }} }}
        }} }} }}"#,
        URI
    );
    let response = run(&container, &query).await;
    assert!(response.is_ok(), "{:?}", response.errors);

    assert_eq!(at(&response, "/root/repository/defaultBranch"), "main");
    assert_eq!(at(&response, "/root/repository/branches"), &json!(["main"]));
    assert_eq!(at(&response, "/root/repository/description"), "");

    let commit = at(&response, "/root/repository/latest/commit");
    assert_eq!(commit["sha1"], fx.second.as_str());
    assert_eq!(commit["languages"], json!(["Markdown", "Rust"]));
    assert_eq!(
        commit["tree"],
        json!({ "directories": [{ "name": "util" }], "files": [{ "name": "lib.rs" }] })
    );

    let file = &commit["file"];
    assert_eq!(file["content"], "fn a() {}\nfn b() {}\nfn c() {}\n");
    assert_eq!(
        file["commits"],
        json!([
            { "rev": fx.second, "author": { "date": "2020-09-13T12:28:20Z", "person": { "name": "Bob" } } },
            { "rev": fx.first, "author": { "date": "2020-09-13T12:26:40Z", "person": { "name": "Alice" } } },
        ])
    );
    assert_eq!(
        file["blame"],
        json!([
            { "startLine": 1, "endLine": 2, "startByte": 0, "endByte": 20, "rev": fx.first },
            { "startLine": 3, "endLine": 3, "startByte": 20, "endByte": 30, "rev": fx.second },
        ])
    );
}

#[tokio::test]
async fn test_recursive_tree_names_are_relative() {
    let fx = fixture();
    let container = container(GitVcsBackend::new(fx.root(), "unused/{uri}"));

    let query = format!(
        r#"{{ root {{ repository(uri: "{}") {{ commit(rev: "{}") {{ commit {{
            tree(path: "src", recursive: true) {{ directories {{ name }} files {{ name }} }}
        }} }} }} }} }}"#,
        URI, fx.second
    );
    let response = run(&container, &query).await;
    assert!(response.is_ok(), "{:?}", response.errors);

    let tree = at(&response, "/root/repository/commit/commit/tree");
    let mut files: Vec<&str> = tree["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    files.sort();
    assert_eq!(files, ["lib.rs", "util/mod.rs"]);
    assert_eq!(tree["directories"], json!([{ "name": "util" }]));
}

#[tokio::test]
async fn test_unsafe_uris_are_unknown() {
    let fx = fixture();
    let container = container(GitVcsBackend::new(fx.root(), "unused/{uri}"));

    for uri in ["../widgets", "/etc", "github.com//acme", ""] {
        let query = format!(r#"{{ root {{ repository(uri: "{}") {{ uri }} }} }}"#, uri);
        let response = run(&container, &query).await;
        assert!(response.is_ok(), "{}: {:?}", uri, response.errors);
        assert_eq!(at(&response, "/root/repository"), &Value::Null, "{}", uri);
    }
}

#[tokio::test]
async fn test_list_repositories_scans_root() {
    let fx = fixture();
    let backend = GitVcsBackend::new(fx.root(), "unused/{uri}")
        .with_repositories(vec!["github.com/acme/pending".to_string()]);
    let container = container(backend);

    let repos = container.list_use_case().execute().await.unwrap();
    let summary: Vec<(String, String)> = repos
        .iter()
        .map(|r| (r.uri().to_string(), r.default_branch().to_string()))
        .collect();
    assert_eq!(
        summary,
        [
            ("github.com/acme/pending".to_string(), String::new()),
            (URI.to_string(), "main".to_string()),
        ]
    );

    let use_case = ListRepositoriesUseCase::new(container.store());
    assert!(use_case.get_by_uri(URI).await.unwrap().is_some());
    assert!(use_case.get_by_uri("github.com/acme/none").await.unwrap().is_none());
}

#[tokio::test]
async fn test_clones_registered_repository_on_demand() {
    let source = TempDir::new().unwrap();
    let (upstream, _, second) = fixture_at(source.path());
    let target = TempDir::new().unwrap();

    let template = format!("{}/{{uri}}", source.path().display());
    let backend = GitVcsBackend::new(target.path(), template).with_repositories(vec![URI.to_string()]);
    assert_eq!(backend.clone_status(URI).await.unwrap(), CloneStatus::NotCloned);
    let container = container(backend);

    let query = format!(
        r#"{{ root {{ repository(uri: "{}") {{ latest {{ cloneInProgress commit {{ sha1 }} }} }} }} }}"#,
        URI
    );
    let response = run(&container, &query).await;
    assert_eq!(
        at(&response, "/root/repository/latest"),
        &json!({ "cloneInProgress": true, "commit": null })
    );

    container.store().wait_for_fetch(URI).await;
    assert!(target.path().join(URI).join("HEAD").is_file());

    let response = run(&container, &query).await;
    assert!(response.is_ok(), "{:?}", response.errors);
    assert_eq!(
        at(&response, "/root/repository/latest"),
        &json!({ "cloneInProgress": false, "commit": { "sha1": second } })
    );

    // A hash only upstream has triggers a refresh of the local copy.
    let third = commit_files(&upstream, &[("later.txt", "x\n")], "later", "Carol", 1_600_000_200);
    let by_hash = format!(
        r#"{{ root {{ repository(uri: "{}") {{ commit(rev: "{}") {{ cloneInProgress commit {{ sha1 }} }} }} }} }}"#,
        URI, third
    );
    let response = run(&container, &by_hash).await;
    assert_eq!(at(&response, "/root/repository/commit/cloneInProgress"), true);

    container.store().wait_for_fetch(URI).await;
    let response = run(&container, &by_hash).await;
    assert_eq!(
        at(&response, "/root/repository/commit"),
        &json!({ "cloneInProgress": false, "commit": { "sha1": third } })
    );
}
