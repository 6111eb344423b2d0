use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;
use tar::Archive;
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;

use crate::config::AssetConfig;
use crate::error::BootstrapError;
use crate::repository::Repository;
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Plain,
    Gzip,
    Xz,
}

impl Compression {
    fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(Compression::Gzip)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Ok(Compression::Xz)
        } else if name.ends_with(".tar") {
            Ok(Compression::Plain)
        } else {
            Err(BootstrapError::UnsupportedArchive {
                path: path.to_path_buf(),
            }
            .into())
        }
    }
}

/// Pull the LFS pack archives and unpack the primary one.
///
/// Returns `Ok(None)` without invoking anything when the primary archive is
/// not present in the checkout; otherwise the number of entries unpacked.
pub fn materialize(repo: &Repository, assets: &AssetConfig) -> Result<Option<usize>> {
    let archive = repo.path(&assets.archive);
    if !archive.is_file() {
        debug!(archive = %archive.display(), "no pack archive, skipping");
        return Ok(None);
    }
    let compression = Compression::from_path(&archive)?;

    // Must exist before the pull starts
    let destination = match &assets.destination {
        Some(relative) => repo.path(relative),
        None => repo.git_path("lfs")?,
    };
    fs::create_dir_all(&destination)
        .with_context(|| format!("Failed to create directory {:?}", destination))?;

    pull(repo, assets)?;

    if let Some(expected) = &assets.sha256 {
        verify_checksum(&archive, expected)?;
    }

    let total = count_entries(&archive, compression)?;
    let mut counter = ui::Counter::new("Extracting", total);
    let unpacked = extract(&archive, compression, &destination, &mut |_| counter.increment())?;
    counter.finish();

    info!(unpacked, total, destination = %destination.display(), "pack archive extracted");
    Ok(Some(unpacked))
}

fn pull(repo: &Repository, assets: &AssetConfig) -> Result<()> {
    let transfers = format!("lfs.concurrenttransfers={}", assets.transfer_jobs);
    repo.stream(
        [
            "-c",
            transfers.as_str(),
            "lfs",
            "pull",
            "--include",
            assets.include.as_str(),
        ],
        &mut |line| ui::detail(line),
    )
}

fn open(path: &Path, compression: Compression) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("Failed to open archive {:?}", path))?;
    let reader = BufReader::new(file);
    Ok(match compression {
        Compression::Plain => Box::new(reader),
        Compression::Gzip => Box::new(GzDecoder::new(reader)),
        Compression::Xz => Box::new(XzDecoder::new(reader)),
    })
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).with_context(|| format!("Failed to hash {:?}", path))?;
    Ok(hex::encode(hasher.finalize()))
}

fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(BootstrapError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_lowercase(),
            actual,
        }
        .into());
    }
    debug!(archive = %path.display(), "checksum verified");
    Ok(())
}

/// Walk the archive once so progress can be reported against a real total.
fn count_entries(path: &Path, compression: Compression) -> Result<usize> {
    let mut archive = Archive::new(open(path, compression)?);
    let mut total = 0;
    for entry in archive
        .entries()
        .with_context(|| format!("Failed to read archive {:?}", path))?
    {
        entry.with_context(|| format!("Corrupt entry in archive {:?}", path))?;
        total += 1;
    }
    Ok(total)
}

fn extract(
    path: &Path,
    compression: Compression,
    destination: &Path,
    on_entry: &mut dyn FnMut(&Path),
) -> Result<usize> {
    let mut archive = Archive::new(open(path, compression)?);
    let mut unpacked = 0;
    for entry in archive
        .entries()
        .with_context(|| format!("Failed to read archive {:?}", path))?
    {
        let mut entry = entry.with_context(|| format!("Corrupt entry in archive {:?}", path))?;
        let entry_path = entry
            .path()
            .with_context(|| format!("Invalid entry path in archive {:?}", path))?
            .into_owned();

        let written = entry
            .unpack_in(destination)
            .with_context(|| format!("Failed to extract {:?}", entry_path))?;
        if written {
            unpacked += 1;
        } else {
            warn!(entry = %entry_path.display(), "skipped archive entry outside the destination");
        }
        on_entry(&entry_path);
    }
    Ok(unpacked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeRunner;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    const PULL: &str = "git -c lfs.concurrenttransfers=8 lfs pull --include lfs-pack/*";
    const GIT_PATH: &str = "git rev-parse --git-path lfs";

    fn runner_with_git_dir() -> FakeRunner {
        let mut runner = FakeRunner::new();
        runner.respond(GIT_PATH, 0, ".git/lfs\n");
        runner
    }

    fn write_archive<W: Write>(writer: W, files: &[(&str, &[u8])]) -> W {
        let mut builder = tar::Builder::new(writer);
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip_pack(root: &Path, relative: &str, files: &[(&str, &[u8])]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let encoder = GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
        write_archive(encoder, files).finish().unwrap();
    }

    fn sample_objects() -> Vec<(&'static str, &'static [u8])> {
        vec![
            ("objects/ab/cd/abcd1234", b"first blob".as_slice()),
            ("objects/ef/01/ef015678", b"second blob".as_slice()),
            ("objects/12/34/12349abc", b"third blob".as_slice()),
        ]
    }

    #[test]
    fn test_absent_archive_is_skipped_without_invocations() {
        let temp = TempDir::new().unwrap();
        let runner = FakeRunner::new();
        let repo = Repository::new(temp.path(), &runner);

        let result = materialize(&repo, &AssetConfig::default()).unwrap();
        assert_eq!(result, None);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_pulls_then_extracts_every_entry() {
        let temp = TempDir::new().unwrap();
        gzip_pack(temp.path(), "lfs-pack/lfs-objects.tar.gz", &sample_objects());
        let runner = runner_with_git_dir();
        let repo = Repository::new(temp.path(), &runner);

        let result = materialize(&repo, &AssetConfig::default()).unwrap();
        assert_eq!(result, Some(3));
        assert_eq!(runner.calls(), vec![GIT_PATH, PULL]);

        let extracted = temp.path().join(".git/lfs/objects/ef/01/ef015678");
        assert_eq!(fs::read(extracted).unwrap(), b"second blob");
    }

    #[test]
    fn test_progress_reports_true_total() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("pack.tar");
        fs::write(&archive, write_archive(Vec::new(), &sample_objects())).unwrap();

        let total = count_entries(&archive, Compression::Plain).unwrap();
        assert_eq!(total, 3);

        let out = temp.path().join("out");
        fs::create_dir(&out).unwrap();
        let mut seen = Vec::new();
        let unpacked = extract(
            &archive,
            Compression::Plain,
            &out,
            &mut |path| seen.push(path.to_path_buf()),
        )
        .unwrap();
        assert_eq!(unpacked, total);
        assert_eq!(seen.len(), total);
        assert_eq!(seen[0], Path::new("objects/ab/cd/abcd1234"));
    }

    #[test]
    fn test_xz_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("pack.tar.xz");
        let encoder = xz2::write::XzEncoder::new(File::create(&archive).unwrap(), 6);
        write_archive(encoder, &sample_objects()).finish().unwrap();

        assert_eq!(Compression::from_path(&archive).unwrap(), Compression::Xz);
        assert_eq!(count_entries(&archive, Compression::Xz).unwrap(), 3);
    }

    #[test]
    fn test_failed_pull_is_fatal() {
        let temp = TempDir::new().unwrap();
        gzip_pack(temp.path(), "lfs-pack/lfs-objects.tar.gz", &sample_objects());
        let mut runner = runner_with_git_dir();
        runner.respond(PULL, 2, "");
        let repo = Repository::new(temp.path(), &runner);

        let err = materialize(&repo, &AssetConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BootstrapError>(),
            Some(BootstrapError::CommandFailed { code: 2, .. })
        ));
        assert!(!temp.path().join(".git/lfs/objects").exists());
    }

    #[test]
    fn test_pull_output_is_streamed() {
        let temp = TempDir::new().unwrap();
        gzip_pack(temp.path(), "lfs-pack/lfs-objects.tar.gz", &sample_objects());
        let mut runner = runner_with_git_dir();
        runner.stream_lines(PULL, &["Downloading LFS objects: 100% (2/2)"]);
        let repo = Repository::new(temp.path(), &runner);

        assert_eq!(materialize(&repo, &AssetConfig::default()).unwrap(), Some(3));
    }

    #[test]
    fn test_checksum_verified() {
        let temp = TempDir::new().unwrap();
        gzip_pack(temp.path(), "lfs-pack/lfs-objects.tar.gz", &sample_objects());
        let archive = temp.path().join("lfs-pack/lfs-objects.tar.gz");
        let runner = runner_with_git_dir();
        let repo = Repository::new(temp.path(), &runner);

        let good = AssetConfig {
            sha256: Some(sha256_file(&archive).unwrap().to_uppercase()),
            ..AssetConfig::default()
        };
        assert_eq!(materialize(&repo, &good).unwrap(), Some(3));

        let bad = AssetConfig {
            sha256: Some("0".repeat(64)),
            ..AssetConfig::default()
        };
        let err = materialize(&repo, &bad).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BootstrapError>(),
            Some(BootstrapError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_linked_worktree_extracts_into_common_git_dir() {
        let temp = TempDir::new().unwrap();
        let checkout = temp.path().join("feature");
        let git_dir = temp.path().join("main/.git/worktrees/feature");
        fs::create_dir_all(&git_dir).unwrap();
        fs::create_dir_all(&checkout).unwrap();
        fs::write(
            checkout.join(".git"),
            format!("gitdir: {}\n", git_dir.display()),
        )
        .unwrap();
        gzip_pack(&checkout, "lfs-pack/lfs-objects.tar.gz", &sample_objects());

        let mut runner = FakeRunner::new();
        runner.respond(GIT_PATH, 0, &format!("{}\n", git_dir.join("lfs").display()));
        let repo = Repository::new(&checkout, &runner);

        assert_eq!(materialize(&repo, &AssetConfig::default()).unwrap(), Some(3));
        assert_eq!(runner.calls(), vec![GIT_PATH.to_string(), PULL.to_string()]);
        assert_eq!(
            fs::read(git_dir.join("lfs/objects/ab/cd/abcd1234")).unwrap(),
            b"first blob"
        );
        assert!(checkout.join(".git").is_file());
    }

    #[test]
    fn test_configured_destination_skips_lookup() {
        let temp = TempDir::new().unwrap();
        gzip_pack(temp.path(), "lfs-pack/lfs-objects.tar.gz", &sample_objects());
        let runner = FakeRunner::new();
        let repo = Repository::new(temp.path(), &runner);
        let assets = AssetConfig {
            destination: Some("cache/lfs".into()),
            ..AssetConfig::default()
        };

        assert_eq!(materialize(&repo, &assets).unwrap(), Some(3));
        assert_eq!(runner.calls(), vec![PULL]);
        assert!(temp.path().join("cache/lfs/objects/12/34/12349abc").is_file());
    }

    #[test]
    fn test_unwritable_destination_fails_before_pull() {
        let temp = TempDir::new().unwrap();
        gzip_pack(temp.path(), "lfs-pack/lfs-objects.tar.gz", &sample_objects());
        fs::write(temp.path().join("blocker"), b"").unwrap();
        let runner = FakeRunner::new();
        let repo = Repository::new(temp.path(), &runner);
        let assets = AssetConfig {
            destination: Some("blocker/lfs".into()),
            ..AssetConfig::default()
        };

        assert!(materialize(&repo, &assets).is_err());
        assert!(!runner.called(PULL));
    }

    #[test]
    fn test_unsupported_format_fails_before_pull() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("lfs-pack")).unwrap();
        fs::write(temp.path().join("lfs-pack/objects.zip"), b"PK").unwrap();
        let runner = FakeRunner::new();
        let repo = Repository::new(temp.path(), &runner);
        let assets = AssetConfig {
            archive: "lfs-pack/objects.zip".into(),
            ..AssetConfig::default()
        };

        let err = materialize(&repo, &assets).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BootstrapError>(),
            Some(BootstrapError::UnsupportedArchive { .. })
        ));
        assert!(runner.calls().is_empty());
    }
}
