/*!
 * Tree Operations
 * Recursive mkdir, rm and cp
 */

use super::ops::Callback;
use super::promises::Promises;
use super::Fs;
use crate::core::limits::{COPYFILE_EXCL, DEFAULT_DIR_MODE};
use crate::core::{FsError, FsResult};
use crate::decode::DirentType;
use futures::future::{FutureExt, LocalBoxFuture};
use nix::errno::Errno;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Options for `mkdir`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MkdirOptions {
    /// Create missing ancestors and accept an existing directory
    pub recursive: bool,
    pub mode: u32,
}

impl MkdirOptions {
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    fn single(mode: u32) -> Self {
        Self {
            recursive: false,
            mode,
        }
    }
}

impl Default for MkdirOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            mode: DEFAULT_DIR_MODE,
        }
    }
}

/// Options for `rm`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RmOptions {
    /// Remove directories and their contents
    pub recursive: bool,
    /// A missing path is not an error
    pub force: bool,
}

/// Options for `cp`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpOptions {
    /// Copy directories and their contents
    pub recursive: bool,
    /// Overwrite existing files; otherwise an existing file fails with EEXIST
    pub force: bool,
}

impl Default for CpOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            force: true,
        }
    }
}

/// Parent to create before retrying, or `None` when there is nothing left to climb
fn parent_to_create(path: &Path) -> Option<&Path> {
    let parent = path.parent()?;
    if parent.as_os_str().is_empty() || parent == Path::new("/") || parent == Path::new(".") {
        return None;
    }
    Some(parent)
}

fn errno_error(fs: &Fs, errno: Errno, path: &Path) -> FsError {
    fs.errnos().error(-(errno as i32)).with_path(path)
}

impl Fs {
    pub(super) fn mkdirp(&self, path: PathBuf, mode: u32, cb: impl FnOnce(FsResult<()>) + 'static) {
        self.mkdirp_boxed(path, mode, Box::new(cb));
    }

    fn mkdirp_boxed(&self, path: PathBuf, mode: u32, cb: Callback<()>) {
        let fs = self.clone();
        self.mkdir(path.clone(), MkdirOptions::single(mode), move |r| {
            let err = match r {
                Ok(()) => return cb(Ok(())),
                Err(e) => e,
            };

            if !err.is_not_found() {
                // Already there: fine only if it is a directory
                return fs.stat(&path, move |st| match st {
                    Err(e) => cb(Err(e)),
                    Ok(st) if st.is_directory() => cb(Ok(())),
                    Ok(_) => cb(Err(err)),
                });
            }

            let Some(parent) = parent_to_create(&path).map(Path::to_path_buf) else {
                return cb(Err(err));
            };
            let retry = fs.clone();
            fs.mkdirp_boxed(
                parent,
                mode,
                Box::new(move |r| match r {
                    Err(e) => cb(Err(e)),
                    Ok(()) => retry.mkdir(path, MkdirOptions::single(mode), cb),
                }),
            );
        });
    }

    pub(super) fn mkdirp_sync(&self, path: &Path, mode: u32) -> FsResult<()> {
        let err = match self.mkdir_sync(path, MkdirOptions::single(mode)) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if !err.is_not_found() {
            let st = self.stat_sync(path)?;
            return if st.is_directory() { Ok(()) } else { Err(err) };
        }

        match parent_to_create(path) {
            None => Err(err),
            Some(parent) => {
                self.mkdirp_sync(parent, mode)?;
                self.mkdir_sync(path, MkdirOptions::single(mode))
            }
        }
    }

    /// Remove a file, symlink or (with `recursive`) a directory tree
    pub fn rm(&self, path: impl AsRef<Path>, options: RmOptions, cb: impl FnOnce(FsResult<()>) + 'static) {
        let fut = remove(self.promises(), path.as_ref().to_path_buf(), options);
        self.spawn_callback(fut, cb);
    }

    /// Copy a file, symlink or (with `recursive`) a directory tree
    pub fn cp(
        &self,
        src: impl AsRef<Path>,
        dst: impl AsRef<Path>,
        options: CpOptions,
        cb: impl FnOnce(FsResult<()>) + 'static,
    ) {
        let fut = copy(
            self.promises(),
            src.as_ref().to_path_buf(),
            dst.as_ref().to_path_buf(),
            options,
        );
        self.spawn_callback(fut, cb);
    }

    pub fn rm_sync(&self, path: impl AsRef<Path>, options: RmOptions) -> FsResult<()> {
        let path = path.as_ref();
        let st = match self.lstat_sync(path) {
            Ok(st) => st,
            Err(e) if options.force && e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };

        if !st.is_directory() {
            return self.unlink_sync(path);
        }
        if !options.recursive {
            return Err(errno_error(self, Errno::EISDIR, path));
        }
        for entry in self.readdir_with_types_sync(path)? {
            self.rm_sync(entry.path(), options)?;
        }
        self.rmdir_sync(path)
    }

    pub fn cp_sync(&self, src: impl AsRef<Path>, dst: impl AsRef<Path>, options: CpOptions) -> FsResult<()> {
        let (src, dst) = (src.as_ref(), dst.as_ref());
        let st = self.lstat_sync(src)?;

        match st.kind() {
            DirentType::Dir => {
                if !options.recursive {
                    return Err(errno_error(self, Errno::EISDIR, src));
                }
                self.mkdirp_sync(dst, st.permissions())?;
                for entry in self.readdir_with_types_sync(src)? {
                    self.cp_sync(entry.path(), dst.join(&entry.name), options)?;
                }
                Ok(())
            }
            DirentType::Symlink => {
                let target = self.readlink_sync(src)?;
                if options.force && self.lstat_sync(dst).is_ok() {
                    self.unlink_sync(dst)?;
                }
                self.symlink_sync(target, dst)
            }
            _ => self.copy_file_sync(src, dst, copy_flags(options)),
        }
    }

    /// Run `fut` as a local task and hand its result to `cb`
    fn spawn_callback<T: 'static>(
        &self,
        fut: LocalBoxFuture<'static, FsResult<T>>,
        cb: impl FnOnce(FsResult<T>) + 'static,
    ) {
        let slot = Rc::new(RefCell::new(Some(Box::new(cb) as Callback<T>)));
        let task_slot = slot.clone();
        let spawned = self.spawn(async move {
            let result = fut.await;
            if let Some(cb) = task_slot.borrow_mut().take() {
                cb(result);
            }
        });
        if let Err(e) = spawned {
            if let Some(cb) = slot.borrow_mut().take() {
                cb(Err(e));
            }
        }
    }
}

fn copy_flags(options: CpOptions) -> u32 {
    if options.force {
        0
    } else {
        COPYFILE_EXCL
    }
}

fn remove(p: Promises, path: PathBuf, options: RmOptions) -> LocalBoxFuture<'static, FsResult<()>> {
    async move {
        let st = match p.lstat(&path).await {
            Ok(st) => st,
            Err(e) if options.force && e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };

        if !st.is_directory() {
            return p.unlink(&path).await;
        }
        if !options.recursive {
            return Err(errno_error(p.fs(), Errno::EISDIR, &path));
        }
        for entry in p.readdir_with_types(&path).await? {
            remove(p.clone(), entry.path(), options).await?;
        }
        p.rmdir(&path).await
    }
    .boxed_local()
}

fn copy(p: Promises, src: PathBuf, dst: PathBuf, options: CpOptions) -> LocalBoxFuture<'static, FsResult<()>> {
    async move {
        let st = p.lstat(&src).await?;

        match st.kind() {
            DirentType::Dir => {
                if !options.recursive {
                    return Err(errno_error(p.fs(), Errno::EISDIR, &src));
                }
                p.mkdir(&dst, MkdirOptions::recursive().with_mode(st.permissions()))
                    .await?;
                for entry in p.readdir_with_types(&src).await? {
                    let to = dst.join(&entry.name);
                    copy(p.clone(), entry.path(), to, options).await?;
                }
                Ok(())
            }
            DirentType::Symlink => {
                let target = p.readlink(&src).await?;
                if options.force && p.lstat(&dst).await.is_ok() {
                    p.unlink(&dst).await?;
                }
                p.symlink(target, &dst).await
            }
            _ => p.copy_file(&src, &dst, copy_flags(options)).await,
        }
    }
    .boxed_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FsConfig;
    use tempfile::TempDir;

    fn fs() -> Fs {
        Fs::builder().with_config(FsConfig::minimal()).build().unwrap()
    }

    #[test]
    fn test_parent_to_create() {
        assert_eq!(parent_to_create(Path::new("/a/b")), Some(Path::new("/a")));
        assert_eq!(parent_to_create(Path::new("/a")), None);
        assert_eq!(parent_to_create(Path::new("a")), None);
        assert_eq!(parent_to_create(Path::new("./a")), None);
        assert_eq!(parent_to_create(Path::new("/")), None);
    }

    #[test]
    fn test_mkdirp_over_file_reports_original_error() {
        let fs = fs();
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"").unwrap();

        let err = fs.mkdir_sync(&file, MkdirOptions::recursive()).unwrap_err();
        assert!(err.is_already_exists());

        let seen = Rc::new(RefCell::new(None));
        let out = seen.clone();
        fs.mkdir(&file, MkdirOptions::recursive(), move |r| *out.borrow_mut() = Some(r));
        fs.run().unwrap();
        assert!(seen.borrow_mut().take().unwrap().unwrap_err().is_already_exists());
    }

    #[test]
    fn test_mkdirp_below_file_fails() {
        let fs = fs();
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"").unwrap();

        let err = fs
            .mkdir_sync(file.join("a/b"), MkdirOptions::recursive())
            .unwrap_err();
        assert_eq!(err.code(), Some("ENOTDIR"));
    }

    #[test]
    fn test_rm_sync_tree_and_force() {
        let fs = fs();
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root");
        std::fs::create_dir_all(root.join("a/b")).unwrap();
        std::fs::write(root.join("a/b/f"), b"x").unwrap();
        std::os::unix::fs::symlink("nowhere", root.join("a/dangling")).unwrap();

        let err = fs.rm_sync(&root, RmOptions::default()).unwrap_err();
        assert_eq!(err.code(), Some("EISDIR"));

        fs.rm_sync(&root, RmOptions { recursive: true, force: false }).unwrap();
        assert!(!root.exists());

        assert!(fs.rm_sync(&root, RmOptions::default()).unwrap_err().is_not_found());
        fs.rm_sync(&root, RmOptions { recursive: false, force: true }).unwrap();
    }

    #[test]
    fn test_cp_async_tree() {
        let fs = fs();
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("top"), b"1").unwrap();
        std::fs::write(src.join("nested/leaf"), b"2").unwrap();
        std::os::unix::fs::symlink("top", src.join("link")).unwrap();

        let dst = dir.path().join("dst");
        let seen = Rc::new(RefCell::new(None));
        let out = seen.clone();
        fs.cp(&src, &dst, CpOptions { recursive: true, force: true }, move |r| {
            *out.borrow_mut() = Some(r)
        });
        fs.run().unwrap();

        seen.borrow_mut().take().unwrap().unwrap();
        assert_eq!(std::fs::read(dst.join("top")).unwrap(), b"1");
        assert_eq!(std::fs::read(dst.join("nested/leaf")).unwrap(), b"2");
        assert_eq!(std::fs::read_link(dst.join("link")).unwrap(), PathBuf::from("top"));
    }

    #[test]
    fn test_cp_without_force_keeps_existing() {
        let fs = fs();
        let dir = TempDir::new().unwrap();
        let (src, dst) = (dir.path().join("a"), dir.path().join("b"));
        std::fs::write(&src, b"new").unwrap();
        std::fs::write(&dst, b"old").unwrap();

        let options = CpOptions { recursive: false, force: false };
        assert!(fs.cp_sync(&src, &dst, options).unwrap_err().is_already_exists());
        assert_eq!(std::fs::read(&dst).unwrap(), b"old");
    }
}
