//! In-memory repository for tests and offline runs

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{DirEntry, RepositoryError, RepositoryProxy};

type Files = BTreeMap<String, Vec<u8>>;

/// Operations that can be made to fail with a transport-level error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateBranch,
    GetDirectory,
    ReadFile,
    UpdateFile,
    PullRequest,
}

/// A pull request opened against the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRecord {
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: String,
    pub url: String,
}

#[derive(Default)]
struct State {
    branches: HashMap<String, Files>,
    pulls: Vec<PullRequestRecord>,
    commits: Vec<(String, String, String)>,
}

/// Repository whose branches live in a map of path to bytes
pub struct MemoryRepository {
    slug: String,
    default_branch: String,
    state: Mutex<State>,
    fail_points: Mutex<HashSet<FailPoint>>,
    directory_calls: AtomicUsize,
}

impl MemoryRepository {
    /// Empty repository with a single `main` branch
    pub fn new(slug: impl Into<String>) -> Self {
        let mut state = State::default();
        state.branches.insert("main".to_string(), Files::new());
        Self {
            slug: slug.into(),
            default_branch: "main".to_string(),
            state: Mutex::new(state),
            fail_points: Mutex::new(HashSet::new()),
            directory_calls: AtomicUsize::new(0),
        }
    }

    /// Add a text file to the default branch
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.with_bytes(path, content.as_bytes())
    }

    /// Add raw bytes to the default branch
    pub fn with_bytes(self, path: &str, bytes: &[u8]) -> Self {
        {
            let mut state = self.lock();
            if let Some(files) = state.branches.get_mut(&self.default_branch) {
                files.insert(path.trim_matches('/').to_string(), bytes.to_vec());
            }
        }
        self
    }

    /// Make an operation fail with a server error
    pub fn fail_on(self, point: FailPoint) -> Self {
        self.fail_points
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(point);
        self
    }

    /// Text of a file on a branch, if present
    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        self.lock()
            .branches
            .get(branch)
            .and_then(|files| files.get(path))
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn branches(&self) -> BTreeSet<String> {
        self.lock().branches.keys().cloned().collect()
    }

    pub fn pull_requests(&self) -> Vec<PullRequestRecord> {
        self.lock().pulls.clone()
    }

    /// `(branch, path, message)` of every commit, in order
    pub fn commits(&self) -> Vec<(String, String, String)> {
        self.lock().commits.clone()
    }

    /// Number of `get_directory` calls served
    pub fn directory_calls(&self) -> usize {
        self.directory_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self, point: FailPoint) -> Result<(), RepositoryError> {
        if self
            .fail_points
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&point)
        {
            return Err(RepositoryError::Api {
                status: 500,
                message: format!("injected failure at {:?}", point),
            });
        }
        Ok(())
    }
}

fn branch_files<'a>(state: &'a State, branch: &str) -> Result<&'a Files, RepositoryError> {
    state.branches.get(branch).ok_or_else(|| RepositoryError::NotFound {
        path: format!("branch {}", branch),
    })
}

#[async_trait]
impl RepositoryProxy for MemoryRepository {
    async fn default_branch(&self) -> Result<String, RepositoryError> {
        Ok(self.default_branch.clone())
    }

    async fn create_branch(&self, base: &str, branch: &str) -> Result<(), RepositoryError> {
        self.check(FailPoint::CreateBranch)?;
        let mut state = self.lock();
        if state.branches.contains_key(branch) {
            return Err(RepositoryError::Conflict(format!("branch {} already exists", branch)));
        }
        let files = branch_files(&state, base)?.clone();
        state.branches.insert(branch.to_string(), files);
        Ok(())
    }

    async fn get_directory(&self, branch: &str, path: &str) -> Result<Vec<DirEntry>, RepositoryError> {
        self.directory_calls.fetch_add(1, Ordering::SeqCst);
        self.check(FailPoint::GetDirectory)?;
        let state = self.lock();
        let files = branch_files(&state, branch)?;

        let dir = path.trim_matches('/');
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir)
        };

        let mut entries: BTreeMap<String, bool> = BTreeMap::new();
        for file in files.keys() {
            if let Some(rest) = file.strip_prefix(&prefix) {
                match rest.split_once('/') {
                    Some((child, _)) => entries.insert(child.to_string(), true),
                    None => entries.insert(rest.to_string(), false),
                };
            }
        }

        if entries.is_empty() && !dir.is_empty() {
            return Err(RepositoryError::NotFound {
                path: dir.to_string(),
            });
        }

        Ok(entries
            .into_iter()
            .map(|(name, is_dir)| DirEntry { name, is_dir })
            .collect())
    }

    async fn read_file(&self, branch: &str, path: &str) -> Result<String, RepositoryError> {
        self.check(FailPoint::ReadFile)?;
        let state = self.lock();
        let bytes = branch_files(&state, branch)?
            .get(path)
            .ok_or_else(|| RepositoryError::NotFound {
                path: path.to_string(),
            })?;

        if bytes.contains(&0) {
            return Err(RepositoryError::BinaryContent {
                path: path.to_string(),
            });
        }
        String::from_utf8(bytes.clone()).map_err(|_| RepositoryError::BinaryContent {
            path: path.to_string(),
        })
    }

    async fn update_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<String, RepositoryError> {
        self.check(FailPoint::UpdateFile)?;
        let mut state = self.lock();
        let files = state
            .branches
            .get_mut(branch)
            .ok_or_else(|| RepositoryError::NotFound {
                path: format!("branch {}", branch),
            })?;
        files.insert(path.to_string(), content.as_bytes().to_vec());
        state
            .commits
            .push((branch.to_string(), path.to_string(), message.to_string()));
        Ok(format!("{:040x}", state.commits.len()))
    }

    async fn create_pull_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<String, RepositoryError> {
        self.check(FailPoint::PullRequest)?;
        let mut state = self.lock();
        branch_files(&state, head)?;
        branch_files(&state, base)?;

        let url = format!("https://github.com/{}/pull/{}", self.slug, state.pulls.len() + 1);
        state.pulls.push(PullRequestRecord {
            head: head.to_string(),
            base: base.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            url: url.clone(),
        });
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> MemoryRepository {
        MemoryRepository::new("acme/widgets")
            .with_file("README.md", "# Widgets\n")
            .with_file("src/main.rs", "fn main() {}\n")
            .with_file("src/util/mod.rs", "")
    }

    #[tokio::test]
    async fn test_listing_root_and_subdir() {
        let repo = repo();
        let root = repo.get_directory("main", "").await.unwrap();
        assert_eq!(root, vec![DirEntry::file("README.md"), DirEntry::dir("src")]);

        let src = repo.get_directory("main", "src").await.unwrap();
        assert_eq!(src, vec![DirEntry::file("main.rs"), DirEntry::dir("util")]);
        assert_eq!(repo.directory_calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let result = repo().get_directory("main", "docs").await;
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_branch_isolation() {
        let repo = repo();
        repo.create_branch("main", "feature").await.unwrap();
        repo.update_file("feature", "README.md", "changed", "edit").await.unwrap();

        assert_eq!(repo.file("feature", "README.md").as_deref(), Some("changed"));
        assert_eq!(repo.file("main", "README.md").as_deref(), Some("# Widgets\n"));
        assert_eq!(repo.commits().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_branch_conflicts() {
        let repo = repo();
        repo.create_branch("main", "feature").await.unwrap();
        let again = repo.create_branch("main", "feature").await;
        assert!(matches!(again, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_binary_file() {
        let repo = repo().with_bytes("logo.png", &[0x89, 0x50, 0x00, 0x47]);
        let result = repo.read_file("main", "logo.png").await;
        assert!(matches!(result, Err(RepositoryError::BinaryContent { .. })));
    }

    #[tokio::test]
    async fn test_pull_request_recorded() {
        let repo = repo();
        repo.create_branch("main", "feature").await.unwrap();
        let url = repo
            .create_pull_request("feature", "main", "title", "body")
            .await
            .unwrap();
        assert_eq!(url, "https://github.com/acme/widgets/pull/1");
        assert_eq!(repo.pull_requests()[0].head, "feature");
    }

    #[tokio::test]
    async fn test_fail_point() {
        let repo = repo().fail_on(FailPoint::UpdateFile);
        let result = repo.update_file("main", "a.txt", "x", "m").await;
        assert!(matches!(result, Err(RepositoryError::Api { status: 500, .. })));
    }
}
