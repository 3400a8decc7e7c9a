//! Translation between local file names and the debugged process's view of
//! the filesystem.

/// Scheme marking files that live on a remote execution server.
pub const REMOTE_SCHEME: &str = "remote:";

/// Maps file names between this host and the debug client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PathTranslator {
    /// Both sides see the same paths.
    #[default]
    Identity,
    /// A local directory is mounted at a different location remotely.
    Prefix(PrefixRewrite),
    /// Local names carry the [`REMOTE_SCHEME`] prefix.
    RemoteServer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRewrite {
    remote_prefix: String,
    local_prefix: String,
    remote_windows: bool,
}

impl PrefixRewrite {
    pub fn new(
        remote_prefix: impl Into<String>,
        local_prefix: impl Into<String>,
        remote_windows: bool,
    ) -> Self {
        Self {
            remote_prefix: trim_separators(remote_prefix.into()),
            local_prefix: trim_separators(local_prefix.into()),
            remote_windows,
        }
    }

    pub fn remote_prefix(&self) -> &str {
        &self.remote_prefix
    }

    pub fn local_prefix(&self) -> &str {
        &self.local_prefix
    }

    fn to_remote(&self, local: &str) -> Option<String> {
        let rest = strip_prefix(local, &self.local_prefix, false)?;
        let rest = if self.remote_windows {
            rest.replace('/', "\\")
        } else {
            rest.to_string()
        };
        Some(format!("{}{rest}", self.remote_prefix))
    }

    fn to_local(&self, remote: &str) -> Option<String> {
        let rest = strip_prefix(remote, &self.remote_prefix, self.remote_windows)?;
        let rest = if self.remote_windows {
            rest.replace('\\', "/")
        } else {
            rest.to_string()
        };
        Some(format!("{}{rest}", self.local_prefix))
    }
}

fn trim_separators(mut prefix: String) -> String {
    while prefix.ends_with(['/', '\\']) {
        prefix.pop();
    }
    prefix
}

fn fold(b: u8) -> u8 {
    if b == b'\\' { b'/' } else { b.to_ascii_lowercase() }
}

/// Strip `prefix` from `path` when it ends on a path component boundary.
fn strip_prefix<'a>(path: &'a str, prefix: &str, windows: bool) -> Option<&'a str> {
    let head = path.get(..prefix.len())?;
    let rest = &path[prefix.len()..];

    let matches = if windows {
        head.bytes().zip(prefix.bytes()).all(|(a, b)| fold(a) == fold(b))
    } else {
        head == prefix
    };
    if !matches {
        return None;
    }

    let boundary = rest.is_empty()
        || rest.starts_with('/')
        || (windows && rest.starts_with('\\'));
    boundary.then_some(rest)
}

impl PathTranslator {
    pub fn prefix(
        remote_prefix: impl Into<String>,
        local_prefix: impl Into<String>,
        remote_windows: bool,
    ) -> Self {
        PathTranslator::Prefix(PrefixRewrite::new(
            remote_prefix,
            local_prefix,
            remote_windows,
        ))
    }

    /// Translate a local file name for the debug client.
    pub fn to_remote(&self, local: &str) -> String {
        match self {
            PathTranslator::Identity => local.to_string(),
            PathTranslator::Prefix(rewrite) => {
                rewrite.to_remote(local).unwrap_or_else(|| local.to_string())
            }
            PathTranslator::RemoteServer => local
                .strip_prefix(REMOTE_SCHEME)
                .unwrap_or(local)
                .to_string(),
        }
    }

    /// Translate a file name reported by the debug client.
    pub fn to_local(&self, remote: &str) -> String {
        match self {
            PathTranslator::Identity => remote.to_string(),
            PathTranslator::Prefix(rewrite) => {
                rewrite.to_local(remote).unwrap_or_else(|| remote.to_string())
            }
            PathTranslator::RemoteServer if remote.is_empty() => String::new(),
            PathTranslator::RemoteServer => format!("{REMOTE_SCHEME}{remote}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity() {
        let t = PathTranslator::Identity;
        assert_eq!(t.to_remote("/a/b.py"), "/a/b.py");
        assert_eq!(t.to_local("/a/b.py"), "/a/b.py");
    }

    #[test]
    fn prefix_rewrite_both_directions() {
        let t = PathTranslator::prefix("/srv/app", "/home/me/app/", false);

        assert_eq!(t.to_remote("/home/me/app/pkg/mod.py"), "/srv/app/pkg/mod.py");
        assert_eq!(t.to_local("/srv/app/pkg/mod.py"), "/home/me/app/pkg/mod.py");
        assert_eq!(t.to_remote("/home/me/app"), "/srv/app");
    }

    #[test]
    fn prefix_only_on_component_boundary() {
        let t = PathTranslator::prefix("/srv/app", "/home/me/app", false);

        assert_eq!(t.to_remote("/home/me/application/x.py"), "/home/me/application/x.py");
        assert_eq!(t.to_local("/srv/apple/x.py"), "/srv/apple/x.py");
    }

    #[test]
    fn unrelated_paths_pass_through() {
        let t = PathTranslator::prefix("/srv/app", "/home/me/app", false);
        assert_eq!(t.to_local("/usr/lib/python3/os.py"), "/usr/lib/python3/os.py");
        assert_eq!(t.to_remote("/tmp/x.py"), "/tmp/x.py");
    }

    #[test]
    fn windows_remote_folds_case_and_separators() {
        let t = PathTranslator::prefix(r"C:\Work\App", "/home/me/app", true);

        assert_eq!(t.to_remote("/home/me/app/pkg/mod.py"), r"C:\Work\App\pkg\mod.py");
        assert_eq!(t.to_local(r"c:\work\app\pkg\mod.py"), "/home/me/app/pkg/mod.py");
        assert_eq!(t.to_local("C:/WORK/APP/pkg/mod.py"), "/home/me/app/pkg/mod.py");
        assert_eq!(t.to_local(r"C:\Work\Apple\x.py"), r"C:\Work\Apple\x.py");
    }

    #[test]
    fn prefix_round_trip() {
        let t = PathTranslator::prefix(r"D:\srv", "/opt/src", true);
        for local in ["/opt/src", "/opt/src/a.py", "/opt/src/deep/er/b.py"] {
            assert_eq!(t.to_local(&t.to_remote(local)), local);
        }
        for remote in [r"D:\srv", r"D:\srv\a.py", r"D:\srv\deep\b.py"] {
            assert_eq!(t.to_remote(&t.to_local(remote)), remote);
        }
    }

    #[test]
    fn remote_server_scheme() {
        let t = PathTranslator::RemoteServer;

        assert_eq!(t.to_remote("remote:/srv/a.py"), "/srv/a.py");
        assert_eq!(t.to_local("/srv/a.py"), "remote:/srv/a.py");
        assert_eq!(t.to_local(&t.to_remote("remote:/srv/a.py")), "remote:/srv/a.py");
        assert_eq!(t.to_local(""), "");
    }
}
