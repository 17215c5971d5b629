//! Independent readback verification
//!
//! Re-reads every source file from disk and hashes each replica with the
//! same algorithms; the in-memory digest computed during copy is never
//! trusted here. Fail-fast: the first disagreement on the primary algorithm
//! (or MD5 in dual-hash mode) aborts with `Mismatch`.

use std::fs;
use std::path::Path;

use tracing::{debug, instrument};

use crate::common::hash::{hash_file, HashResult};
use crate::common::{CancelFlag, HashAlgorithm};
use crate::error::{Error, Result};
use crate::metadata;
use crate::offload::copier::walk_source;
use crate::offload::types::FileRes;
use crate::offload::{file_name_string, mtime_utc, rel_path_string, single_file_dest, Offloader};

#[instrument(skip_all, fields(source = %o.source.display()))]
pub(crate) fn run_verify(o: &mut Offloader, cancel: &CancelFlag) -> Result<()> {
    let info = fs::metadata(&o.source).map_err(|e| Error::io(&o.source, e))?;
    if info.is_dir() {
        verify_tree(o, cancel)
    } else {
        verify_single(o, cancel)
    }
}

fn verify_tree(o: &mut Offloader, cancel: &CancelFlag) -> Result<()> {
    let algorithms = o.config.hash_algorithms();
    let source = o.source.clone();

    for entry in walk_source(&source) {
        let entry = entry?;
        cancel.check()?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry.path().strip_prefix(&source).unwrap_or(entry.path());
        let rel_path = rel_path_string(rel);

        let src_hash = hash_file(entry.path(), &algorithms)?;
        for dest_root in &o.destinations {
            let dest_path = dest_root.join(rel);
            check_replica(o, &rel_path, &dest_path, &src_hash, &algorithms)?;
        }

        let meta = entry
            .metadata()
            .map_err(|e| Error::io(entry.path(), std::io::Error::other(e)))?;
        push_file_res(o, entry.path(), rel_path, meta.len(), mtime_utc(&meta), src_hash);
    }

    debug!(files = o.files.len(), "verification complete");
    Ok(())
}

fn verify_single(o: &mut Offloader, cancel: &CancelFlag) -> Result<()> {
    cancel.check()?;
    let algorithms = o.config.hash_algorithms();
    let rel_path = file_name_string(&o.source);

    let src_hash = hash_file(&o.source, &algorithms)?;
    for dest_root in &o.destinations {
        let dest_path = single_file_dest(dest_root, &o.source);
        check_replica(o, &rel_path, &dest_path, &src_hash, &algorithms)?;
    }

    let info = fs::metadata(&o.source).map_err(|e| Error::io(&o.source, e))?;
    let source = o.source.clone();
    push_file_res(o, &source, rel_path, info.len(), mtime_utc(&info), src_hash);
    Ok(())
}

/// Hash one replica and compare against the source readback
fn check_replica(
    o: &Offloader,
    rel_path: &str,
    dest_path: &Path,
    src_hash: &HashResult,
    algorithms: &[HashAlgorithm],
) -> Result<()> {
    let dest_hash = hash_file(dest_path, algorithms)?;

    let primary = if o.config.dual_hash {
        HashAlgorithm::Xxhash64
    } else {
        o.config.algorithm
    };
    if src_hash.primary(primary) != dest_hash.primary(primary) {
        debug!(
            file = rel_path,
            dest = %dest_path.display(),
            stored = src_hash.primary(primary),
            computed = dest_hash.primary(primary),
            "digest mismatch"
        );
        return Err(Error::Mismatch {
            rel_path: rel_path.to_string(),
            dest: dest_path.to_path_buf(),
        });
    }
    if o.config.dual_hash && src_hash.md5 != dest_hash.md5 {
        return Err(Error::Mismatch {
            rel_path: rel_path.to_string(),
            dest: dest_path.to_path_buf(),
        });
    }
    Ok(())
}

/// Append the per-file record; metadata comes from the copy-time cache or a
/// best-effort re-extraction on cache miss
fn push_file_res(
    o: &mut Offloader,
    source_path: &Path,
    rel_path: String,
    size: u64,
    mtime: chrono::DateTime<chrono::Utc>,
    hash: HashResult,
) {
    let cached = o.metadata_cache.lock().unwrap().remove(&rel_path);
    let metadata =
        cached.or_else(|| metadata::extract(source_path, o.config.metadata_mode));

    o.files.push(FileRes { rel_path, size, mtime, hash, metadata });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::metadata::MetadataMode;
    use crossbeam_channel::bounded;
    use std::path::PathBuf;

    fn offload_and_verify(src: &Path, dests: &[PathBuf]) -> (Offloader, Result<()>) {
        let config = Config {
            source: src.to_path_buf(),
            destinations: dests.to_vec(),
            algorithm: crate::common::HashAlgorithm::Md5,
            metadata_mode: MetadataMode::Off,
            ..Config::default()
        };
        let mut o = Offloader::new(config);
        let (tx, _rx) = bounded(1024);
        o.copy(&CancelFlag::new(), tx).unwrap();
        let result = o.verify(&CancelFlag::new());
        (o, result)
    }

    #[test]
    fn verify_passes_and_records_source_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("card");
        fs::create_dir_all(src.join("A001")).unwrap();
        fs::write(src.join("A001/clip.mov"), b"test").unwrap();
        let dst = dir.path().join("backup");

        let (o, result) = offload_and_verify(&src, &[dst]);
        result.unwrap();

        assert_eq!(o.files.len(), 1);
        let file = &o.files[0];
        assert_eq!(file.rel_path, "A001/clip.mov");
        assert_eq!(file.size, 4);
        assert_eq!(file.hash.md5, "098f6bcd4621d373cade4e832627b4f6");

        // Property: the stored hash equals a fresh readback of the source
        let fresh = hash_file(&src.join("A001/clip.mov"), &[crate::common::HashAlgorithm::Md5])
            .unwrap();
        assert_eq!(file.hash, fresh);
    }

    #[test]
    fn corrupted_replica_fails_with_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("card");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("clip.mov"), b"original payload").unwrap();
        let good = dir.path().join("backup1");
        let bad = dir.path().join("backup2");

        let config = Config {
            source: src.clone(),
            destinations: vec![good, bad.clone()],
            algorithm: crate::common::HashAlgorithm::Md5,
            metadata_mode: MetadataMode::Off,
            ..Config::default()
        };
        let mut o = Offloader::new(config);
        let (tx, _rx) = bounded(1024);
        o.copy(&CancelFlag::new(), tx).unwrap();

        // Flip one byte between copy and verify
        let mut bytes = fs::read(bad.join("clip.mov")).unwrap();
        bytes[3] ^= 0xFF;
        fs::write(bad.join("clip.mov"), &bytes).unwrap();

        match o.verify(&CancelFlag::new()) {
            Err(Error::Mismatch { rel_path, dest }) => {
                assert_eq!(rel_path, "clip.mov");
                assert_eq!(dest, bad.join("clip.mov"));
            }
            other => panic!("expected mismatch, got {:?}", other.map(|_| ())),
        }
        // Fail-fast: nothing is recorded for the failing file
        assert!(o.files.is_empty());
    }

    #[test]
    fn dual_hash_checks_md5_as_well() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("card");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("clip.mov"), b"dual hashed contents").unwrap();
        let dst = dir.path().join("backup");

        let config = Config {
            source: src.clone(),
            destinations: vec![dst],
            dual_hash: true,
            metadata_mode: MetadataMode::Off,
            ..Config::default()
        };
        let mut o = Offloader::new(config);
        let (tx, _rx) = bounded(1024);
        o.copy(&CancelFlag::new(), tx).unwrap();
        o.verify(&CancelFlag::new()).unwrap();

        let file = &o.files[0];
        assert!(!file.hash.xxhash64.is_empty());
        assert!(!file.hash.md5.is_empty());
        assert!(file.hash.sha256.is_empty());
    }

    #[test]
    fn missing_replica_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("card");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("clip.mov"), b"payload").unwrap();
        let dst = dir.path().join("backup");

        let config = Config {
            source: src.clone(),
            destinations: vec![dst.clone()],
            metadata_mode: MetadataMode::Off,
            ..Config::default()
        };
        let mut o = Offloader::new(config);
        let (tx, _rx) = bounded(1024);
        o.copy(&CancelFlag::new(), tx).unwrap();
        fs::remove_file(dst.join("clip.mov")).unwrap();

        assert!(matches!(o.verify(&CancelFlag::new()), Err(Error::Io { .. })));
    }

    #[test]
    fn verify_honors_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("card");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("clip.mov"), b"payload").unwrap();
        let dst = dir.path().join("backup");

        let config = Config {
            source: src.clone(),
            destinations: vec![dst],
            metadata_mode: MetadataMode::Off,
            ..Config::default()
        };
        let mut o = Offloader::new(config);
        let (tx, _rx) = bounded(1024);
        o.copy(&CancelFlag::new(), tx).unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(matches!(o.verify(&cancel), Err(Error::Cancelled)));
    }
}
