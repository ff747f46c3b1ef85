use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Local directory that downloaded artifacts are staged in.
///
/// A managed directory is removed when the value is dropped, on success and
/// failure alike. A provided directory belongs to the operator and is kept.
pub enum Staging {
    Provided(PathBuf),
    Managed(TempDir),
}

impl Staging {
    /// Use an operator-supplied directory, which must already exist.
    pub fn provided(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(anyhow!(
                "download directory {} does not exist",
                path.display()
            ));
        }
        let root = path
            .canonicalize()
            .with_context(|| format!("resolve download directory {}", path.display()))?;
        Ok(Staging::Provided(root))
    }

    /// Staging for the `--dlpath` option: the given directory, or a managed one.
    pub fn for_dlpath(dlpath: Option<&Path>) -> Result<Self> {
        match dlpath {
            Some(path) => Self::provided(path),
            None => Self::managed(),
        }
    }

    pub fn managed() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("okify-")
            .tempdir()
            .context("create staging directory")?;
        Ok(Staging::Managed(dir))
    }

    pub fn root(&self) -> &Path {
        match self {
            Staging::Provided(path) => path,
            Staging::Managed(dir) => dir.path(),
        }
    }

    /// Fresh per-unit directory so same-named artifacts never collide.
    pub fn unit_dir(&self, index: usize) -> Result<PathBuf> {
        let dir = self.root().join(format!("unit-{:03}", index + 1));
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managed_staging_is_removed_on_drop() {
        let staging = Staging::managed().expect("managed staging");
        let root = staging.root().to_path_buf();
        let unit = staging.unit_dir(0).expect("unit dir");
        fs::write(unit.join("a.fits"), b"data").expect("stage");
        assert!(root.join("unit-001/a.fits").is_file());

        drop(staging);
        assert!(!root.exists());
    }

    #[test]
    fn provided_staging_must_exist_and_is_kept() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing");
        assert!(Staging::provided(&missing).is_err());

        let staging = Staging::for_dlpath(Some(dir.path())).expect("provided staging");
        assert!(matches!(staging, Staging::Provided(_)));
        let unit = staging.unit_dir(4).expect("unit dir");
        assert!(unit.ends_with("unit-005"));
        drop(staging);
        assert!(unit.is_dir());
    }
}
