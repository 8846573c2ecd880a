use anyhow::Result;

use crate::Repository;

use super::super::Container;

pub struct ListRepositoriesController<'a> {
    container: &'a Container,
}

impl<'a> ListRepositoriesController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn list(&self) -> Result<String> {
        let use_case = self.container.list_use_case();
        let repos = use_case.execute().await?;
        Ok(self.format_repository_list(&repos))
    }

    fn format_repository_list(&self, repos: &[Repository]) -> String {
        if repos.is_empty() {
            return format!(
                "No repositories found under {}.",
                self.container.repos_dir()
            );
        }

        let mut output = "Repositories:\n\n".to_string();
        for repo in repos {
            output.push_str(&format!("  {}\n", repo.uri()));
            let branch = if repo.default_branch().is_empty() {
                "(not cloned)"
            } else {
                repo.default_branch()
            };
            output.push_str(&format!("    Default branch: {}\n", branch));
            if !repo.description().is_empty() {
                output.push_str(&format!("    Description: {}\n", repo.description()));
            }
            output.push('\n');
        }

        output
    }
}
