use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A private temporary copy of one generated test artifact, staged for
/// patching. The backing directory is removed on drop, on every exit
/// path including timeout and panic.
pub struct StagedArtifact {
    path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl StagedArtifact {
    /// Copy `source` into a fresh temp dir under its package-relative
    /// path, so the artifact compiles with its declared package.
    pub fn create(source: &Path, rel_path: &Path, session_id: &str) -> io::Result<StagedArtifact> {
        let temp_dir = tempfile::Builder::new()
            .prefix(&format!("exeval-{}-", session_id))
            .tempdir()?;
        let staged = temp_dir.path().join(rel_path);
        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, &staged)?;
        Ok(StagedArtifact {
            path: staged,
            _temp_dir: temp_dir,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> io::Result<String> {
        fs::read_to_string(&self.path)
    }

    pub fn write(&self, content: &str) -> io::Result<()> {
        fs::write(&self.path, content)
    }
}

pub fn generate_session_id() -> String {
    format!("{:08x}", fastrand::u32(..))
}

/// One project checkout. Mutants are patched into it strictly one at a
/// time: the checkout is reset before each attempt, so two concurrent
/// patches would interleave and corrupt results. Workers that want
/// parallelism must each hold their own checkout.
pub struct Checkout {
    root: PathBuf,
    reset_cmd: Option<String>,
}

impl Checkout {
    pub fn new(root: PathBuf, reset_cmd: Option<String>) -> Checkout {
        Checkout { root, reset_cmd }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Restore the checkout to its pristine revision. Checkout
    /// versioning itself is an external collaborator; this only shells
    /// out to the configured reset command.
    pub fn reset(&self) -> io::Result<()> {
        let Some(cmd) = &self.reset_cmd else {
            return Ok(());
        };
        let (program, args) = split_command(cmd);
        let status = Command::new(&program)
            .args(&args)
            .current_dir(&self.root)
            .status()?;
        if !status.success() {
            return Err(io::Error::other(format!(
                "reset command failed with {} in {}",
                status,
                self.root.display()
            )));
        }
        Ok(())
    }

    pub fn source_file(&self, rel: &Path) -> PathBuf {
        self.root.join(rel)
    }
}

pub fn split_command(cmd: &str) -> (String, Vec<String>) {
    let parts: Vec<&str> = cmd.split_whitespace().collect();
    if parts.len() > 1 {
        (
            parts[0].to_string(),
            parts[1..].iter().map(|s| s.to_string()).collect(),
        )
    } else {
        (cmd.to_string(), vec![])
    }
}

/// Package-relative path of a Java source file: `x/y/Class.java` for a
/// file declaring `package x.y;`, or just `Class.java` for the default
/// package.
pub fn package_relative_path(java_file: &Path) -> io::Result<PathBuf> {
    let file_name = java_file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    let content = fs::read_to_string(java_file)?;
    for line in content.lines() {
        let line = line.trim();
        if let Some(decl) = line.strip_prefix("package ") {
            let package = decl.trim_end_matches(';').trim();
            let mut path: PathBuf = package.split('.').collect();
            path.push(&file_name);
            return Ok(path);
        }
    }
    Ok(PathBuf::from(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn staged_artifact_cleans_up_on_drop() {
        let src_dir = TempDir::new().unwrap();
        let src = src_dir.path().join("Foo.java");
        fs::write(&src, "class Foo {}").unwrap();

        let staged_path;
        {
            let staged =
                StagedArtifact::create(&src, Path::new("com/example/Foo.java"), "abc").unwrap();
            staged_path = staged.path().to_path_buf();
            assert!(staged_path.exists());
            assert!(staged_path.ends_with("com/example/Foo.java"));
        }
        assert!(!staged_path.exists());
    }

    #[test]
    fn staged_artifact_roundtrips_content() {
        let src_dir = TempDir::new().unwrap();
        let src = src_dir.path().join("Foo.java");
        fs::write(&src, "original").unwrap();

        let staged = StagedArtifact::create(&src, Path::new("Foo.java"), "abc").unwrap();
        assert_eq!(staged.read().unwrap(), "original");
        staged.write("patched").unwrap();
        assert_eq!(staged.read().unwrap(), "patched");
        // The original is never touched.
        assert_eq!(fs::read_to_string(&src).unwrap(), "original");
    }

    #[test]
    fn package_relative_path_reads_declaration() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("Bar.java");
        fs::write(&file, "// header\npackage com.example.util;\n\nclass Bar {}\n").unwrap();

        let rel = package_relative_path(&file).unwrap();
        assert_eq!(rel, PathBuf::from("com/example/util/Bar.java"));
    }

    #[test]
    fn package_relative_path_default_package() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("Baz.java");
        fs::write(&file, "class Baz {}\n").unwrap();

        let rel = package_relative_path(&file).unwrap();
        assert_eq!(rel, PathBuf::from("Baz.java"));
    }

    #[test]
    fn checkout_reset_without_command_is_noop() {
        let dir = TempDir::new().unwrap();
        let checkout = Checkout::new(dir.path().to_path_buf(), None);
        checkout.reset().unwrap();
    }

    #[test]
    fn split_command_separates_program_and_args() {
        let (program, args) = split_command("git checkout .");
        assert_eq!(program, "git");
        assert_eq!(args, vec!["checkout".to_string(), ".".to_string()]);

        let (program, args) = split_command("make");
        assert_eq!(program, "make");
        assert!(args.is_empty());
    }
}
