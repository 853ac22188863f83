//! Tests for the source module.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::*;
use crate::context::AppContext;
use crate::error::{Error, Result};

fn create_test_resolver() -> SourceResolver {
    SourceResolver::new(AppContext::new(
        PathBuf::from("/home/tester"),
        PathBuf::from("/tmp/project"),
    ))
}

/// Writes a fixed set of files instead of touching the network.
#[derive(Debug, Default)]
struct FakeFetcher {
    files: Vec<(&'static str, &'static str)>,
    fail: bool,
    fetched: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch(&self, source: &ParsedSource, dest: &Path) -> Result<()> {
        self.fetched
            .lock()
            .expect("lock should not be poisoned")
            .push(dest.to_path_buf());
        if self.fail {
            return Err(Error::source_resolution(&source.original, "network down"));
        }
        for (rel, content) in &self.files {
            let path = dest.join(rel);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .expect("create_dir_all should succeed");
            }
            tokio::fs::write(&path, content)
                .await
                .expect("write should succeed");
        }
        Ok(())
    }
}

fn fake_resolver(fetcher: Arc<FakeFetcher>) -> SourceResolver {
    SourceResolver::with_fetcher(
        AppContext::new(PathBuf::from("/home/tester"), PathBuf::from("/tmp/project")),
        fetcher,
    )
}

mod local_source_tests {
    use super::*;

    #[test]
    fn resolve_local_absolute_path() {
        let parsed = create_test_resolver()
            .parse("local:/absolute/path/to/skill")
            .expect("parse should succeed");

        assert_eq!(parsed.source_type, SourceType::Local);
        assert_eq!(
            parsed.local_path,
            Some(PathBuf::from("/absolute/path/to/skill"))
        );
    }

    #[test]
    fn resolve_local_relative_path() {
        let parsed = create_test_resolver()
            .parse("./skills/my-skill")
            .expect("parse should succeed");

        assert_eq!(parsed.source_type, SourceType::Local);
        assert_eq!(
            parsed.local_path,
            Some(PathBuf::from("/tmp/project/skills/my-skill"))
        );
        assert_eq!(parsed.original, "./skills/my-skill");
    }

    #[test]
    fn resolve_local_prefix_without_dot() {
        let parsed = create_test_resolver()
            .parse("local:skills/my-skill")
            .expect("parse should succeed");

        assert_eq!(
            parsed.local_path,
            Some(PathBuf::from("/tmp/project/skills/my-skill"))
        );
    }

    #[test]
    fn resolve_home_relative_path() {
        let parsed = create_test_resolver()
            .parse("~/agents/reviewer.md")
            .expect("parse should succeed");

        assert_eq!(
            parsed.local_path,
            Some(PathBuf::from("/home/tester/agents/reviewer.md"))
        );
    }

    #[test]
    fn dot_is_the_project_root() {
        let parsed = create_test_resolver()
            .parse(".")
            .expect("parse should succeed");
        assert_eq!(parsed.source_type, SourceType::Local);
        assert_eq!(parsed.local_path, Some(PathBuf::from("/tmp/project")));
    }

    #[tokio::test]
    async fn materialize_missing_local_path_fails() {
        let err = create_test_resolver()
            .resolve("/definitely/not/here")
            .await
            .expect_err("missing path should fail");
        assert!(matches!(err, Error::SourceResolution { .. }));
    }

    #[tokio::test]
    async fn materialize_existing_local_path_is_not_temporary() {
        let dir = tempfile::tempdir().expect("tempdir should succeed");
        let source = dir.path().display().to_string();

        let materialized = create_test_resolver()
            .resolve(&source)
            .await
            .expect("resolve should succeed");

        assert!(!materialized.is_temporary());
        assert_eq!(materialized.source().local_path.as_deref(), Some(dir.path()));
        assert!(dir.path().exists());
    }
}

mod git_source_tests {
    use super::*;

    #[test]
    fn shorthand_owner_repo() {
        let parsed = create_test_resolver()
            .parse("acme/agent-kit")
            .expect("parse should succeed");

        assert_eq!(parsed.source_type, SourceType::Shorthand);
        assert_eq!(parsed.url, "https://github.com/acme/agent-kit");
        assert_eq!(parsed.reference, None);
    }

    #[test]
    fn shorthand_with_ref() {
        let parsed = create_test_resolver()
            .parse("acme/agent-kit@v2")
            .expect("parse should succeed");

        assert_eq!(parsed.source_type, SourceType::Shorthand);
        assert_eq!(parsed.reference.as_deref(), Some("v2"));
    }

    #[test]
    fn github_prefix_with_subdir() {
        let parsed = create_test_resolver()
            .parse("github:acme/agent-kit@main/skills")
            .expect("parse should succeed");

        assert_eq!(parsed.source_type, SourceType::Shorthand);
        assert_eq!(parsed.reference.as_deref(), Some("main"));
        assert_eq!(parsed.subdir.as_deref(), Some("skills"));
    }

    #[test]
    fn github_https_url_is_git() {
        let parsed = create_test_resolver()
            .parse("https://github.com/acme/agent-kit")
            .expect("parse should succeed");

        assert_eq!(parsed.source_type, SourceType::Git);
        assert_eq!(parsed.url, "https://github.com/acme/agent-kit");
    }

    #[test]
    fn github_tree_url_carries_ref_and_subdir() {
        let parsed = create_test_resolver()
            .parse("https://github.com/acme/agent-kit/tree/dev/hooks")
            .expect("parse should succeed");

        assert_eq!(parsed.source_type, SourceType::Git);
        assert_eq!(parsed.url, "https://github.com/acme/agent-kit");
        assert_eq!(parsed.reference.as_deref(), Some("dev"));
        assert_eq!(parsed.subdir.as_deref(), Some("hooks"));
    }

    #[test]
    fn ssh_and_dot_git_urls_are_git() {
        let resolver = create_test_resolver();
        for input in [
            "git@github.com:acme/agent-kit.git",
            "ssh://git@example.com/acme/kit",
            "https://git.example.com/acme/kit.git",
            "git:https://example.com/acme/kit",
        ] {
            let parsed = resolver.parse(input).expect("parse should succeed");
            assert_eq!(parsed.source_type, SourceType::Git, "{input}");
        }
    }

    #[test]
    fn git_prefix_is_stripped() {
        let parsed = create_test_resolver()
            .parse("git:https://example.com/acme/kit")
            .expect("parse should succeed");
        assert_eq!(parsed.url, "https://example.com/acme/kit");
        assert_eq!(parsed.original, "git:https://example.com/acme/kit");
    }
}

mod url_source_tests {
    use super::*;

    #[test]
    fn other_https_url_is_url() {
        let parsed = create_test_resolver()
            .parse("https://example.com/hooks/format.json")
            .expect("parse should succeed");

        assert_eq!(parsed.source_type, SourceType::Url);
        assert_eq!(parsed.url, "https://example.com/hooks/format.json");
        assert!(parsed.source_type.is_remote());
    }
}

mod invalid_source_tests {
    use super::*;

    #[test]
    fn empty_source_is_rejected() {
        let err = create_test_resolver()
            .parse("   ")
            .expect_err("empty source should fail");
        assert!(matches!(err, Error::SourceResolution { .. }));
    }

    #[test]
    fn bare_word_is_rejected() {
        let err = create_test_resolver()
            .parse("not-a-source")
            .expect_err("bare word should fail");
        assert!(matches!(err, Error::SourceResolution { .. }));
    }

    #[test]
    fn too_many_segments_is_rejected() {
        assert!(create_test_resolver().parse("a/b/c").is_err());
    }
}

mod materialize_tests {
    use super::*;

    #[tokio::test]
    async fn remote_source_is_fetched_into_temp_dir() {
        let fetcher = Arc::new(FakeFetcher {
            files: vec![("skills/pdf/SKILL.md", "---\nname: pdf\n---\n")],
            ..Default::default()
        });
        let resolver = fake_resolver(fetcher.clone());

        let materialized = resolver
            .resolve("acme/agent-kit")
            .await
            .expect("resolve should succeed");

        assert!(materialized.is_temporary());
        let root = materialized
            .source()
            .local_path
            .clone()
            .expect("materialized source should have a path");
        assert!(root.join("skills/pdf/SKILL.md").exists());

        materialized.cleanup().expect("cleanup should succeed");
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn subdir_is_applied_after_fetch() {
        let fetcher = Arc::new(FakeFetcher {
            files: vec![("skills/pdf/SKILL.md", "---\nname: pdf\n---\n")],
            ..Default::default()
        });
        let resolver = fake_resolver(fetcher);

        let materialized = resolver
            .resolve("github:acme/agent-kit@main/skills")
            .await
            .expect("resolve should succeed");

        let root = materialized
            .source()
            .local_path
            .clone()
            .expect("materialized source should have a path");
        assert!(root.ends_with("skills"));
        assert!(root.join("pdf/SKILL.md").exists());
    }

    #[tokio::test]
    async fn missing_subdir_fails_and_cleans_up() {
        let fetcher = Arc::new(FakeFetcher::default());
        let resolver = fake_resolver(fetcher.clone());

        let err = resolver
            .resolve("github:acme/agent-kit@main/nope")
            .await
            .expect_err("missing subdir should fail");
        assert!(matches!(err, Error::SourceResolution { .. }));

        let fetched = fetcher.fetched.lock().expect("lock").clone();
        assert_eq!(fetched.len(), 1);
        assert!(!fetched[0].exists());
    }

    #[tokio::test]
    async fn fetch_failure_cleans_up_temp_dir() {
        let fetcher = Arc::new(FakeFetcher {
            fail: true,
            ..Default::default()
        });
        let resolver = fake_resolver(fetcher.clone());

        let err = resolver
            .resolve("https://example.com/hook.json")
            .await
            .expect_err("fetch failure should propagate");
        assert!(matches!(err, Error::SourceResolution { .. }));

        let fetched = fetcher.fetched.lock().expect("lock").clone();
        assert!(!fetched[0].exists());
    }
}
