//! 요청 파일 경로 해석 및 열기
//!
//! 요청 파일명은 항상 루트 디렉터리 기준으로 해석됨.
//! 경로 검사는 순수하게 문자열(lexical) 단위로 수행하고,
//! 루트를 벗어나는 요청은 파일시스템에 접근하기 전에 거부

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::fs::File;

/// 파일 열기 실패 분류
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenError {
    #[error("파일 없음")]
    NotFound,

    #[error("접근 거부")]
    AccessDenied,
}

/// 루트 디렉터리 기준 경로 해석기
#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
}

impl Resolver {
    /// 새 해석기 생성 (루트는 절대 경로로 정규화)
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            root: std::fs::canonicalize(root)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 요청 파일명을 루트 아래 경로로 변환
    ///
    /// 절대 경로는 루트 기준 상대 경로로 취급하고, 그 선두의 `..`는
    /// `/` 위로 올라갈 수 없으므로 버림 (`/../a` == `/a`).
    /// 상대 경로의 `..`가 루트 위로 올라가면 `AccessDenied`
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, OpenError> {
        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
        let mut rooted = false;

        for component in Path::new(requested).components() {
            match component {
                Component::Normal(part) => parts.push(part),
                Component::ParentDir => {
                    if parts.pop().is_none() && !rooted {
                        return Err(OpenError::AccessDenied);
                    }
                }
                Component::RootDir | Component::Prefix(_) => rooted = true,
                Component::CurDir => {}
            }
        }

        let mut path = self.root.clone();
        path.extend(parts);
        Ok(path)
    }

    /// 경로 해석 후 읽기 전용으로 열기
    pub async fn open(&self, requested: &str) -> Result<File, OpenError> {
        let path = self.resolve(requested)?;
        Self::open_path(&path).await
    }

    /// 이미 해석된 경로 열기 (디렉터리는 `AccessDenied`)
    pub async fn open_path(path: &Path) -> Result<File, OpenError> {
        let file = File::open(path).await.map_err(classify)?;
        let metadata = file.metadata().await.map_err(classify)?;
        if metadata.is_dir() {
            return Err(OpenError::AccessDenied);
        }

        Ok(file)
    }
}

fn classify(err: io::Error) -> OpenError {
    match err.kind() {
        io::ErrorKind::NotFound => OpenError::NotFound,
        _ => OpenError::AccessDenied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> (tempfile::TempDir, Resolver) {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Resolver::new(dir.path()).unwrap();
        (dir, resolver)
    }

    #[test]
    fn test_resolve_inside_root() {
        let (_dir, resolver) = resolver();

        assert_eq!(
            resolver.resolve("boot/kernel.img").unwrap(),
            resolver.root().join("boot").join("kernel.img")
        );
        assert_eq!(
            resolver.resolve("./a/../b.txt").unwrap(),
            resolver.root().join("b.txt")
        );
        // 절대 경로도 루트 기준
        assert_eq!(
            resolver.resolve("/etc/passwd").unwrap(),
            resolver.root().join("etc").join("passwd")
        );
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let (_dir, resolver) = resolver();

        assert_eq!(
            resolver.resolve("../../etc/passwd"),
            Err(OpenError::AccessDenied)
        );
        assert_eq!(resolver.resolve("a/../../b"), Err(OpenError::AccessDenied));
    }

    #[test]
    fn test_resolve_rooted_parent_is_clamped() {
        let (_dir, resolver) = resolver();

        assert_eq!(
            resolver.resolve("/../secret").unwrap(),
            resolver.root().join("secret")
        );
        assert_eq!(
            resolver.resolve("/a/../../b/c").unwrap(),
            resolver.root().join("b").join("c")
        );
    }

    #[tokio::test]
    async fn test_open_classification() {
        let (dir, resolver) = resolver();
        std::fs::write(dir.path().join("hello.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        assert!(resolver.open("hello.txt").await.is_ok());
        assert_eq!(
            resolver.open("missing.txt").await.err(),
            Some(OpenError::NotFound)
        );
        assert_eq!(
            resolver.open("sub").await.err(),
            Some(OpenError::AccessDenied)
        );
        assert_eq!(
            resolver.open("../outside.txt").await.err(),
            Some(OpenError::AccessDenied)
        );
    }
}
