// resolver.rs - Locating policy documents on local storage.
//
// A policy is named with a dotted identifier such as "example.chwall". The
// dots become path separators and a fixed suffix is appended:
//
//   example.chwall → example/chwall-security_policy.xml
//
// The relative path is tried under each search root in order (current
// directory first, then the system policy directory). The first root where
// the file exists wins. A name never escapes its root: leading separators
// are dropped, so "/tmp/x" is looked up as "tmp/x-security_policy.xml".

use std::path::{Path, PathBuf, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};

use crate::error::PolicyError;

/// Suffix appended to every policy file name.
pub const POLICY_FILE_SUFFIX: &str = "-security_policy.xml";

/// System-wide directory holding installed ACM policies.
pub const SYSTEM_POLICY_DIR: &str = "/etc/xen/acm-security/policies";

/// A policy document read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDocument {
    /// Where the document was found.
    pub path: PathBuf,
    pub content: Vec<u8>,
}

/// Anything that can turn a policy name into its XML document.
///
/// [`PolicyResolver`] is the filesystem implementation; tests substitute
/// their own.
pub trait PolicySource {
    fn load(&self, policy_name: &str) -> Result<PolicyDocument, PolicyError>;
}

/// Filesystem policy lookup over an ordered list of search roots.
#[derive(Debug, Clone)]
pub struct PolicyResolver {
    roots: Vec<PathBuf>,
}

impl PolicyResolver {
    /// Search the current directory, then `system_dir`.
    pub fn new(system_dir: impl Into<PathBuf>) -> Self {
        Self::with_roots(vec![PathBuf::from("."), system_dir.into()])
    }

    /// Search exactly these roots, in order.
    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Relative path of a policy file, before any root is applied.
    pub fn candidate(policy_name: &str) -> PathBuf {
        let relative = policy_name.replace('.', MAIN_SEPARATOR_STR) + POLICY_FILE_SUFFIX;
        PathBuf::from(relative.trim_start_matches(['/', MAIN_SEPARATOR]))
    }

    /// First existing policy file under the search roots, if any.
    pub fn locate(&self, policy_name: &str) -> Option<PathBuf> {
        let relative = Self::candidate(policy_name);
        self.roots
            .iter()
            .map(|root| root.join(&relative))
            .inspect(|path| tracing::debug!("Checking for policy file {}", path.display()))
            .find(|path| path.exists())
    }

    /// Locate and read a policy document.
    pub fn resolve(&self, policy_name: &str) -> Result<PolicyDocument, PolicyError> {
        let Some(path) = self.locate(policy_name) else {
            return Err(self.file_access(policy_name, None));
        };

        let content =
            std::fs::read(&path).map_err(|e| self.file_access(policy_name, Some(e)))?;

        tracing::info!(
            "Read policy '{}' from {} ({} bytes)",
            policy_name,
            path.display(),
            content.len()
        );
        Ok(PolicyDocument { path, content })
    }

    fn file_access(&self, policy_name: &str, source: Option<std::io::Error>) -> PolicyError {
        PolicyError::FileAccess {
            policy_name: policy_name.to_string(),
            roots: self.roots.clone(),
            source,
        }
    }
}

impl Default for PolicyResolver {
    fn default() -> Self {
        Self::new(SYSTEM_POLICY_DIR)
    }
}

impl PolicySource for PolicyResolver {
    fn load(&self, policy_name: &str) -> Result<PolicyDocument, PolicyError> {
        self.resolve(policy_name)
    }
}

/// Convenience for callers holding a path to a single root.
pub fn policy_path(root: &Path, policy_name: &str) -> PathBuf {
    root.join(PolicyResolver::candidate(policy_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_policy(root: &Path, name: &str, body: &str) -> PathBuf {
        let path = policy_path(root, name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn dots_become_directories() {
        assert_eq!(
            PolicyResolver::candidate("example.chwall"),
            Path::new("example").join("chwall-security_policy.xml")
        );
        assert_eq!(
            PolicyResolver::candidate("plain"),
            PathBuf::from("plain-security_policy.xml")
        );
        assert_eq!(
            PolicyResolver::candidate("a.b.c"),
            Path::new("a").join("b").join("c-security_policy.xml")
        );
    }

    #[test]
    fn empty_segments_are_kept() {
        assert_eq!(
            PolicyResolver::candidate("example."),
            Path::new("example").join("-security_policy.xml")
        );
    }

    #[test]
    fn absolute_names_stay_under_each_root() {
        assert_eq!(
            PolicyResolver::candidate("/tmp/x"),
            Path::new("tmp").join("x-security_policy.xml")
        );

        let root = tempdir().unwrap();
        let expected = root.path().join("tmp").join("x-security_policy.xml");
        fs::create_dir_all(expected.parent().unwrap()).unwrap();
        fs::write(&expected, "<rooted/>").unwrap();

        let resolver = PolicyResolver::with_roots(vec![root.path().into()]);
        let doc = resolver.resolve("/tmp/x").unwrap();
        assert_eq!(doc.path, expected);
        assert_eq!(doc.content, b"<rooted/>");
    }

    #[test]
    fn default_roots_are_cwd_then_system_dir() {
        let resolver = PolicyResolver::default();
        assert_eq!(
            resolver.roots(),
            &[PathBuf::from("."), PathBuf::from(SYSTEM_POLICY_DIR)]
        );
    }

    #[test]
    fn first_root_wins_when_both_exist() {
        let local = tempdir().unwrap();
        let system = tempdir().unwrap();
        write_policy(local.path(), "example.chwall", "<local/>");
        write_policy(system.path(), "example.chwall", "<system/>");

        let resolver =
            PolicyResolver::with_roots(vec![local.path().into(), system.path().into()]);
        let doc = resolver.resolve("example.chwall").unwrap();

        assert_eq!(doc.content, b"<local/>");
        assert!(doc.path.starts_with(local.path()));
    }

    #[test]
    fn falls_back_to_second_root() {
        let local = tempdir().unwrap();
        let system = tempdir().unwrap();
        let expected = write_policy(system.path(), "example.chwall", "<system/>");

        let resolver =
            PolicyResolver::with_roots(vec![local.path().into(), system.path().into()]);

        assert_eq!(resolver.locate("example.chwall"), Some(expected));
        assert_eq!(
            resolver.resolve("example.chwall").unwrap().content,
            b"<system/>"
        );
    }

    #[test]
    fn missing_everywhere_names_both_roots() {
        let local = tempdir().unwrap();
        let system = tempdir().unwrap();
        let resolver =
            PolicyResolver::with_roots(vec![local.path().into(), system.path().into()]);

        let err = resolver.resolve("nope.nothing").unwrap_err();
        match &err {
            PolicyError::FileAccess { roots, source, .. } => {
                assert_eq!(roots.len(), 2);
                assert!(source.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.contains(&local.path().display().to_string()));
        assert!(msg.contains(&system.path().display().to_string()));
    }

    #[test]
    fn unreadable_candidate_is_a_file_access_error() {
        let local = tempdir().unwrap();
        // A directory with the policy file's name exists but cannot be read as a file.
        fs::create_dir_all(policy_path(local.path(), "example.chwall")).unwrap();

        let resolver = PolicyResolver::with_roots(vec![local.path().into()]);
        let err = resolver.resolve("example.chwall").unwrap_err();
        assert!(matches!(
            err,
            PolicyError::FileAccess {
                source: Some(_),
                ..
            }
        ));
    }
}
