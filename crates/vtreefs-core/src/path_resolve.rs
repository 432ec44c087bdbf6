//! Path resolution over the inode arena.
//!
//! Walks a path one component at a time from a starting directory,
//! checking search permission on every directory it passes through,
//! handling `.` and `..`, giving the provider a chance to materialize each
//! child, and expanding symbolic links in place.
//!
//! Reference counting: the caller hands the resolver one reference on the
//! start inode. On `Resolution::Found` the caller owns one reference on the
//! result instead. On redirects and errors every reference taken during the
//! walk has been dropped again, the one on the start inode included.

use tracing::trace;
use vtreefs_types::{make_error_msg, InodeNo, Result, VtreeCode};

use crate::arena::InodeArena;
use crate::config::VtreeConfig;
use crate::provider::Provider;
use crate::types::Credentials;

/// Bounds enforced while walking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveLimits {
    pub max_name_len: usize,
    pub max_path_len: usize,
    pub max_symlinks: u32,
}

impl From<&VtreeConfig> for ResolveLimits {
    fn from(config: &VtreeConfig) -> Self {
        Self {
            max_name_len: config.max_name_len,
            max_path_len: config.max_path_len,
            max_symlinks: config.max_symlinks,
        }
    }
}

/// Outcome of a successful walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The path names this inode. The caller holds one reference on it.
    Found(InodeNo),
    /// A `..` tried to climb above the tree root. Resolution should go on
    /// in the enclosing namespace with `path[offset..]`, which starts at
    /// that `..`.
    LeaveBoundary {
        path: String,
        offset: usize,
        symlinks: u32,
    },
    /// An absolute symlink target was reached. `path` is the target with
    /// the unresolved remainder appended; the caller restarts from its
    /// own root.
    Symlink { path: String, symlinks: u32 },
}

pub struct PathResolver<'a, P: Provider> {
    provider: &'a mut P,
    arena: &'a mut InodeArena<P::Handle>,
    creds: &'a Credentials,
    limits: ResolveLimits,
    symlinks: u32,
}

impl<'a, P: Provider> PathResolver<'a, P> {
    pub fn new(
        provider: &'a mut P,
        arena: &'a mut InodeArena<P::Handle>,
        creds: &'a Credentials,
        limits: ResolveLimits,
    ) -> Self {
        Self {
            provider,
            arena,
            creds,
            limits,
            symlinks: 0,
        }
    }

    /// Symlinks already traversed by earlier rounds of the same lookup.
    pub fn with_symlinks(mut self, symlinks: u32) -> Self {
        self.symlinks = symlinks;
        self
    }

    /// Resolve `path` relative to `start`.
    ///
    /// `boundary` is the inode `..` may not climb above (a changed root);
    /// `..` there stays put. `follow_last` decides whether a symlink in
    /// the final component is expanded or returned as is. Leading slashes
    /// are ignored: the path is always relative to `start`.
    pub fn resolve(
        &mut self,
        start: InodeNo,
        path: &str,
        boundary: Option<InodeNo>,
        follow_last: bool,
    ) -> Result<Resolution> {
        let mut cur = start;
        let res = self.walk(&mut cur, path, boundary, follow_last);
        if !matches!(res, Ok(Resolution::Found(_))) {
            self.arena.release(cur);
        }
        res
    }

    /// The walk itself. `cur` always names the inode the walk holds a
    /// reference on.
    fn walk(
        &mut self,
        cur: &mut InodeNo,
        path: &str,
        boundary: Option<InodeNo>,
        follow_last: bool,
    ) -> Result<Resolution> {
        if path.len() > self.limits.max_path_len {
            return make_error_msg(VtreeCode::NAME_TOO_LONG, "path too long");
        }
        let mut path = path.to_owned();
        let mut pos = 0;

        while pos < path.len() {
            let (start, end) = next_component(&path, pos);
            if start == end {
                // Trailing slashes: nothing is searched, but the node
                // must be a directory.
                if !self.arena.get(*cur)?.is_dir() {
                    return make_error_msg(VtreeCode::NOT_DIRECTORY, format!("inode {cur}"));
                }
                break;
            }
            self.check_search(*cur)?;

            if end - start > self.limits.max_name_len {
                return make_error_msg(
                    VtreeCode::NAME_TOO_LONG,
                    format!("component at offset {start} is {} bytes", end - start),
                );
            }
            pos = end;

            match &path[start..end] {
                "." => {}
                ".." => {
                    if Some(*cur) == boundary {
                        continue;
                    }
                    if *cur == self.arena.root() {
                        trace!(offset = start, "path leaves the tree");
                        return Ok(Resolution::LeaveBoundary {
                            path,
                            offset: start,
                            symlinks: self.symlinks,
                        });
                    }
                    let Some(parent) = self.arena.parent(*cur)? else {
                        return make_error_msg(VtreeCode::NOT_FOUND, "directory was removed");
                    };
                    self.arena.add_ref(parent);
                    self.arena.release(*cur);
                    *cur = parent;
                }
                name => {
                    self.provider.lookup(self.arena, *cur, name)?;
                    let Some(child) = self.arena.lookup_by_name(*cur, name) else {
                        return make_error_msg(VtreeCode::NOT_FOUND, format!("{name:?} not found"));
                    };
                    self.arena.add_ref(child);

                    let is_symlink = self.arena.get(child)?.is_symlink();
                    if is_symlink && (pos < path.len() || follow_last) {
                        let target = self.follow(child);
                        self.arena.release(child);
                        let target = target?;

                        let expanded = format!("{target}{}", &path[pos..]);
                        if expanded.len() > self.limits.max_path_len {
                            return make_error_msg(
                                VtreeCode::NAME_TOO_LONG,
                                "symlink expansion too long",
                            );
                        }
                        if expanded.starts_with('/') {
                            return Ok(Resolution::Symlink {
                                path: expanded,
                                symlinks: self.symlinks,
                            });
                        }
                        // Relative targets continue from the link's directory.
                        path = expanded;
                        pos = 0;
                        continue;
                    }

                    self.arena.release(*cur);
                    *cur = child;
                }
            }
        }

        Ok(Resolution::Found(*cur))
    }

    fn check_search(&self, ino: InodeNo) -> Result<()> {
        let node = self.arena.get(ino)?;
        if !node.is_dir() {
            return make_error_msg(VtreeCode::NOT_DIRECTORY, format!("inode {ino}"));
        }
        if !self.creds.can_search(node.stat()) {
            return make_error_msg(VtreeCode::ACCESS_DENIED, format!("search on inode {ino}"));
        }
        Ok(())
    }

    /// Count one more symlink and read its target.
    fn follow(&mut self, link: InodeNo) -> Result<String> {
        self.symlinks += 1;
        if self.symlinks >= self.limits.max_symlinks {
            return make_error_msg(
                VtreeCode::TOO_MANY_LINKS,
                format!("{} symlinks traversed", self.symlinks),
            );
        }
        let target = self.provider.readlink(self.arena, link)?;
        if target.is_empty() {
            return make_error_msg(VtreeCode::NOT_FOUND, format!("symlink {link} is empty"));
        }
        trace!(%link, %target, "following symlink");
        Ok(target)
    }
}

/// Byte range of the component at or after `pos`, skipping separators.
/// Empty when only separators remain.
fn next_component(path: &str, pos: usize) -> (usize, usize) {
    let bytes = path.as_bytes();
    let mut start = pos;
    while start < bytes.len() && bytes[start] == b'/' {
        start += 1;
    }
    let end = bytes[start..]
        .iter()
        .position(|&b| b == b'/')
        .map_or(bytes.len(), |n| start + n);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_arena, MockProvider};
    use crate::types::InodeStat;
    use vtreefs_types::{Gid, StatusCode, Uid};

    const LIMITS: ResolveLimits = ResolveLimits {
        max_name_len: 16,
        max_path_len: 64,
        max_symlinks: 4,
    };

    struct Fixture {
        provider: MockProvider,
        arena: InodeArena<u32>,
        creds: Credentials,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                provider: MockProvider::new(),
                arena: new_arena(64),
                creds: Credentials::root(),
            }
        }

        fn root(&self) -> InodeNo {
            self.arena.root()
        }

        /// Acquire `start` and resolve, as a lookup request does.
        fn resolve_from(
            &mut self,
            start: InodeNo,
            path: &str,
            boundary: Option<InodeNo>,
            follow_last: bool,
        ) -> Result<Resolution> {
            self.arena.acquire(start).unwrap();
            PathResolver::new(&mut self.provider, &mut self.arena, &self.creds, LIMITS)
                .resolve(start, path, boundary, follow_last)
        }

        fn resolve(&mut self, path: &str) -> Result<Resolution> {
            let root = self.root();
            self.resolve_from(root, path, None, true)
        }

        fn refs(&self, ino: InodeNo) -> u32 {
            self.arena.get(ino).unwrap().ref_count()
        }

        fn dir(&mut self, parent: InodeNo, name: &str) -> InodeNo {
            self.provider.add_dir(&mut self.arena, parent, name, None)
        }

        fn file(&mut self, parent: InodeNo, name: &str) -> InodeNo {
            self.provider
                .add_file(&mut self.arena, parent, name, None, b"data")
        }

        fn link(&mut self, parent: InodeNo, name: &str, target: &str) -> InodeNo {
            self.provider
                .add_symlink(&mut self.arena, parent, name, target)
        }
    }

    #[test]
    fn test_resolve_nested() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let a = fx.provider.add_dir(&mut fx.arena, root, "a", Some(0));
        let b = fx.file(a, "b");

        assert_eq!(fx.resolve("a/b").unwrap(), Resolution::Found(b));
        assert_eq!(fx.refs(b), 1);
        assert_eq!(fx.refs(a), 0);
        assert_eq!(fx.refs(root), 0);
        fx.arena.check_consistency().unwrap();
    }

    #[test]
    fn test_dot_and_slashes() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let a = fx.dir(root, "a");

        assert_eq!(fx.resolve("").unwrap(), Resolution::Found(root));
        assert_eq!(fx.resolve(".").unwrap(), Resolution::Found(root));
        assert_eq!(fx.resolve("./.").unwrap(), Resolution::Found(root));
        assert_eq!(fx.resolve("//a//").unwrap(), Resolution::Found(a));
        assert_eq!(fx.resolve("a/./.").unwrap(), Resolution::Found(a));
        // Each Found result holds exactly one new reference.
        assert_eq!(fx.refs(root), 3);
        assert_eq!(fx.refs(a), 2);
    }

    #[test]
    fn test_trailing_slash_on_file() {
        let mut fx = Fixture::new();
        let root = fx.root();
        fx.file(root, "f");
        let err = fx.resolve("f/").unwrap_err();
        assert_eq!(err.code(), VtreeCode::NOT_DIRECTORY);
        assert_eq!(fx.refs(root), 0);
    }

    #[test]
    fn test_dotdot() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let a = fx.dir(root, "a");
        let b = fx.dir(a, "b");
        let f = fx.file(a, "f");

        assert_eq!(fx.resolve("a/b/../f").unwrap(), Resolution::Found(f));
        assert_eq!(fx.refs(b), 0);
        assert_eq!(fx.refs(a), 0);

        // `..` at the boundary stays there.
        let res = fx.resolve_from(b, "../../..", Some(a), true).unwrap();
        assert_eq!(res, Resolution::Found(a));
    }

    #[test]
    fn test_dotdot_leaves_tree() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let a = fx.dir(root, "a");

        let res = fx.resolve("a/../../etc/passwd").unwrap();
        let Resolution::LeaveBoundary { path, offset, symlinks } = res else {
            panic!("expected LeaveBoundary, got {res:?}");
        };
        assert_eq!(&path[offset..], "../etc/passwd");
        assert_eq!(symlinks, 0);
        assert_eq!(fx.refs(root), 0);
        assert_eq!(fx.refs(a), 0);
    }

    #[test]
    fn test_not_found_releases_references() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let a = fx.dir(root, "a");
        let err = fx.resolve("a/missing").unwrap_err();
        assert_eq!(err.code(), VtreeCode::NOT_FOUND);
        assert_eq!(fx.refs(a), 0);
        assert_eq!(fx.refs(root), 0);
    }

    #[test]
    fn test_relative_symlink() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let a = fx.dir(root, "a");
        let f = fx.file(a, "f");
        let l = fx.link(root, "l", "a");

        assert_eq!(fx.resolve("l/f").unwrap(), Resolution::Found(f));
        assert_eq!(fx.refs(l), 0);
        // Not followed when last and follow_last is off.
        assert_eq!(
            fx.resolve_from(root, "l", None, false).unwrap(),
            Resolution::Found(l)
        );
        // Followed when last and follow_last is on.
        assert_eq!(fx.resolve("l").unwrap(), Resolution::Found(a));
        assert_eq!(fx.provider.readlinks, 2);
    }

    #[test]
    fn test_absolute_symlink_redirects() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let a = fx.dir(root, "a");
        fx.link(a, "abs", "/usr/lib");

        let res = fx.resolve("a/abs/x").unwrap();
        assert_eq!(
            res,
            Resolution::Symlink {
                path: "/usr/lib/x".into(),
                symlinks: 1,
            }
        );
        assert_eq!(fx.refs(a), 0);
        assert_eq!(fx.refs(root), 0);
    }

    #[test]
    fn test_symlink_limit() {
        // s1 -> s2 -> ... -> s{n} -> dir
        fn chain(n: u32) -> Result<Resolution> {
            let mut fx = Fixture::new();
            let root = fx.root();
            fx.dir(root, "dir");
            for i in 1..=n {
                let target = if i == n { "dir".to_string() } else { format!("s{}", i + 1) };
                fx.link(root, &format!("s{i}"), &target);
            }
            fx.resolve("s1")
        }

        assert!(matches!(chain(LIMITS.max_symlinks - 1), Ok(Resolution::Found(_))));
        let err = chain(LIMITS.max_symlinks).unwrap_err();
        assert_eq!(err.code(), VtreeCode::TOO_MANY_LINKS);
    }

    #[test]
    fn test_symlink_loop() {
        let mut fx = Fixture::new();
        let root = fx.root();
        fx.link(root, "x", "y");
        fx.link(root, "y", "x");
        let err = fx.resolve("x").unwrap_err();
        assert_eq!(err.code(), VtreeCode::TOO_MANY_LINKS);
        assert_eq!(fx.refs(root), 0);
        fx.arena.check_consistency().unwrap();
    }

    #[test]
    fn test_empty_symlink_target() {
        let mut fx = Fixture::new();
        let root = fx.root();
        fx.link(root, "e", "");
        assert_eq!(fx.resolve("e").unwrap_err().code(), VtreeCode::NOT_FOUND);
    }

    #[test]
    fn test_name_and_path_limits() {
        let mut fx = Fixture::new();
        let long = "n".repeat(LIMITS.max_name_len + 1);
        assert_eq!(fx.resolve(&long).unwrap_err().code(), VtreeCode::NAME_TOO_LONG);

        let deep = "a/".repeat(LIMITS.max_path_len);
        assert_eq!(fx.resolve(&deep).unwrap_err().code(), VtreeCode::NAME_TOO_LONG);

        let root = fx.root();
        let pad = "p".repeat(LIMITS.max_name_len);
        fx.link(root, "big", &format!("{pad}/{pad}/{pad}/{pad}"));
        let err = fx.resolve("big/tail").unwrap_err();
        assert_eq!(err.code(), VtreeCode::NAME_TOO_LONG);
        assert_eq!(fx.refs(root), 0);
    }

    #[test]
    fn test_search_permission() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let locked = fx
            .arena
            .create(
                root,
                "locked",
                None,
                InodeStat::directory(0o700).owned_by(Uid(1), Gid(1)),
                0,
                900,
            )
            .unwrap();
        fx.file(locked, "secret");

        fx.creds = Credentials::new(Uid(2), Gid(2), vec![]);
        let err = fx.resolve("locked/secret").unwrap_err();
        assert_eq!(err.code(), VtreeCode::ACCESS_DENIED);
        assert_eq!(fx.refs(locked), 0);

        // The final component itself needs no search permission.
        assert_eq!(fx.resolve("locked").unwrap(), Resolution::Found(locked));
        assert_eq!(fx.resolve("locked//").unwrap(), Resolution::Found(locked));
        let err = fx.resolve("locked/.").unwrap_err();
        assert_eq!(err.code(), VtreeCode::ACCESS_DENIED);

        fx.creds = Credentials::new(Uid(1), Gid(2), vec![]);
        assert!(matches!(fx.resolve("locked/secret"), Ok(Resolution::Found(_))));
    }

    #[test]
    fn test_lazy_lookup_hook() {
        let mut fx = Fixture::new();
        let root = fx.root();
        fx.provider.lazy.push((root, "late".into()));

        let Resolution::Found(late) = fx.resolve("late").unwrap() else {
            panic!("expected Found");
        };
        assert_eq!(fx.arena.get(late).unwrap().name(), "late");
        assert_eq!(fx.provider.lookups, 1);

        fx.provider.busy.push("slow".into());
        let err = fx.resolve("slow").unwrap_err();
        assert_eq!(err.code(), VtreeCode::BUSY);
        assert_eq!(fx.refs(root), 0);
    }

    #[test]
    fn test_unknown_start_is_invalid() {
        let mut fx = Fixture::new();
        let err = fx.arena.acquire(InodeNo(40)).unwrap_err();
        assert_eq!(err.code(), StatusCode::INVALID_ARG);
    }

    #[test]
    fn test_next_component() {
        assert_eq!(next_component("abc/def", 0), (0, 3));
        assert_eq!(next_component("abc/def", 3), (4, 7));
        assert_eq!(next_component("//x", 0), (2, 3));
        assert_eq!(next_component("a//", 1), (3, 3));
    }
}
