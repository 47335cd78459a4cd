use std::fs;
use std::path::{Path, PathBuf};

use extdata::link::{error_path, link_path};
use extdata::{DataEntity, Entity, LinkData, Manager};
use extdata_verify::Sha256Hasher;
use tempfile::{TempDir, tempdir};

const PKG_A: &str = "example.com/bundles/a";
const PKG_B: &str = "example.com/bundles/b";

fn dest(root: &Path, pkg: &str, name: &str) -> PathBuf {
    root.join(DataEntity::new(pkg, [name]).data_dir()).join(name)
}

fn write_link(root: &Path, pkg: &str, name: &str, link: &LinkData) -> PathBuf {
    let dest = dest(root, pkg, name);
    fs::create_dir_all(dest.parent().unwrap()).unwrap();
    fs::write(link_path(&dest), link.to_json().unwrap()).unwrap();
    dest
}

fn link_for(url: &str, content: &[u8]) -> LinkData {
    LinkData::fixed(url, content.len() as u64, Sha256Hasher::hex_digest(content))
}

fn setup() -> TempDir {
    let dir = tempdir().unwrap();
    write_link(dir.path(), PKG_A, "f1", &link_for("gs://b/f1", b"one"));
    write_link(dir.path(), PKG_A, "f2", &link_for("gs://b/f2", b"two"));
    write_link(dir.path(), PKG_B, "f1", &link_for("gs://b/f1", b"one"));
    dir
}

#[test]
fn test_missing_root_is_empty() {
    let dir = tempdir().unwrap();
    let manager = Manager::new(dir.path().join("nope"), "").unwrap();
    assert!(manager.known_destinations().is_empty());
    assert!(manager.purgeable().is_empty());
}

#[test]
fn test_scan_finds_link_sidecars() {
    let dir = setup();
    fs::write(dest(dir.path(), PKG_A, "plain.txt"), "not external").unwrap();

    let manager = Manager::new(dir.path(), "").unwrap();
    let mut expected = vec![
        dest(dir.path(), PKG_A, "f1"),
        dest(dir.path(), PKG_A, "f2"),
        dest(dir.path(), PKG_B, "f1"),
    ];
    expected.sort();
    assert_eq!(manager.known_destinations(), expected.as_slice());
}

#[test]
fn test_jobs_deduplicated_and_sorted() {
    let dir = setup();
    let manager = Manager::new(dir.path(), "").unwrap();
    let entities = [
        DataEntity::new(PKG_B, ["f1"]),
        DataEntity::new(PKG_A, ["f2", "f1", "ordinary.txt"]),
    ];

    let (jobs, release) = manager.prepare_downloads(&entities);
    let urls: Vec<&str> = jobs.iter().map(|j| j.link.computed_url()).collect();
    assert_eq!(urls, ["gs://b/f1", "gs://b/f2"]);

    let mut f1_dests = vec![dest(dir.path(), PKG_A, "f1"), dest(dir.path(), PKG_B, "f1")];
    f1_dests.sort();
    assert_eq!(jobs[0].dests, f1_dests);
    assert_eq!(jobs[1].dests, [dest(dir.path(), PKG_A, "f2")]);
    release.release();
}

#[test]
fn test_valid_files_are_not_refetched() {
    let dir = setup();
    fs::write(dest(dir.path(), PKG_A, "f1"), "one").unwrap();
    let manager = Manager::new(dir.path(), "").unwrap();

    let (jobs, _release) = manager.prepare_downloads(&[DataEntity::new(PKG_A, ["f1"])]);
    assert!(jobs.is_empty());
    assert!(dest(dir.path(), PKG_A, "f1").exists());
}

#[test]
fn test_stale_files_are_deleted() {
    let dir = setup();
    let wrong_size = dest(dir.path(), PKG_A, "f1");
    let wrong_hash = dest(dir.path(), PKG_A, "f2");
    fs::write(&wrong_size, "one!").unwrap();
    fs::write(&wrong_hash, "owt").unwrap();
    let manager = Manager::new(dir.path(), "").unwrap();

    let (jobs, _release) = manager.prepare_downloads(&[DataEntity::new(PKG_A, ["f1", "f2"])]);
    assert_eq!(jobs.len(), 2);
    assert!(!wrong_size.exists());
    assert!(!wrong_hash.exists());
}

#[test]
fn test_prepare_is_idempotent() {
    let dir = setup();
    let manager = Manager::new(dir.path(), "").unwrap();
    let entities = [DataEntity::new(PKG_A, ["f1", "f2"])];

    let (first, r1) = manager.prepare_downloads(&entities);
    let (second, r2) = manager.prepare_downloads(&entities);
    assert_eq!(first, second);
    r1.release();
    r2.release();
}

#[test]
fn test_refcount_controls_purgeable() {
    let dir = setup();
    for (pkg, name, content) in [(PKG_A, "f1", "one"), (PKG_A, "f2", "two"), (PKG_B, "f1", "one")] {
        fs::write(dest(dir.path(), pkg, name), content).unwrap();
    }
    let manager = Manager::new(dir.path(), "").unwrap();
    let a_f1 = dest(dir.path(), PKG_A, "f1");
    assert_eq!(manager.purgeable().len(), 3);

    let (_, r1) = manager.prepare_downloads(&[DataEntity::new(PKG_A, ["f1"])]);
    let (_, r2) = manager.prepare_downloads(&[DataEntity::new(PKG_A, ["f1"])]);
    assert!(!manager.purgeable().contains(&a_f1));
    assert_eq!(manager.purgeable().len(), 2);

    r1.release();
    assert!(!manager.purgeable().contains(&a_f1));

    drop(r2);
    assert!(manager.purgeable().contains(&a_f1));
    assert_eq!(manager.purgeable().len(), 3);
}

#[test]
fn test_missing_files_are_not_purgeable() {
    let dir = setup();
    fs::write(dest(dir.path(), PKG_A, "f2"), "two").unwrap();
    let manager = Manager::new(dir.path(), "").unwrap();
    assert_eq!(manager.purgeable(), [dest(dir.path(), PKG_A, "f2")]);
}

#[test]
fn test_broken_link_gets_error_file() {
    let dir = setup();
    let broken = dest(dir.path(), PKG_A, "broken");
    fs::write(link_path(&broken), "{ not json").unwrap();
    let invalid = write_link(dir.path(), PKG_A, "invalid", &LinkData::fixed("gs://b/x", 1, "abc"));
    let manager = Manager::new(dir.path(), "").unwrap();
    let entities = [DataEntity::new(PKG_A, ["broken", "invalid", "f1"])];

    let (jobs, _release) = manager.prepare_downloads(&entities);
    assert_eq!(jobs.len(), 1);
    assert!(error_path(&broken).exists());
    assert!(
        fs::read_to_string(error_path(&invalid))
            .unwrap()
            .contains("sha256sum must be 64 hex digits")
    );
    assert_eq!(manager.failures(&entities).len(), 2);
}

#[test]
fn test_artifact_without_artifacts_url() {
    let dir = tempdir().unwrap();
    let art = write_link(dir.path(), PKG_A, "bin", &LinkData::artifact("bin.tar"));

    let manager = Manager::new(dir.path(), "").unwrap();
    let (jobs, _release) = manager.prepare_downloads(&[DataEntity::new(PKG_A, ["bin"])]);
    assert!(jobs.is_empty());
    assert!(error_path(&art).exists());

    let manager = Manager::new(dir.path(), "gs://builds/7/").unwrap();
    let (jobs, _release) = manager.prepare_downloads(&[DataEntity::new(PKG_A, ["bin"])]);
    assert_eq!(jobs[0].link.computed_url(), "gs://builds/7/bin.tar");
    // A successful prepare clears the old error file.
    assert!(!error_path(&art).exists());
}

#[test]
fn test_conflicting_links_keep_reference() {
    let dir = setup();
    let conflicting = write_link(dir.path(), PKG_B, "f1", &link_for("gs://b/f1", b"uno"));
    fs::write(&conflicting, "stale").unwrap();
    let manager = Manager::new(dir.path(), "").unwrap();
    let entities = [DataEntity::new(PKG_A, ["f1"]), DataEntity::new(PKG_B, ["f1"])];

    let (jobs, release) = manager.prepare_downloads(&entities);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].dests, [dest(dir.path(), PKG_A, "f1")]);
    assert!(
        fs::read_to_string(error_path(&conflicting))
            .unwrap()
            .contains("conflicting")
    );

    // Still held, even though it was dropped from the job.
    fs::write(&conflicting, "uno").unwrap();
    assert!(!manager.purgeable().contains(&conflicting));
    release.release();
    assert!(manager.purgeable().contains(&conflicting));
}

/// Lists purgeable files every time its data files are enumerated.
struct Watcher<'a> {
    manager: &'a Manager,
    data:    Vec<String>,
    seen:    std::cell::RefCell<Vec<Vec<PathBuf>>>,
}

impl Entity for Watcher<'_> {
    fn package(&self) -> &str { PKG_A }

    fn data(&self) -> &[String] {
        self.seen.borrow_mut().push(self.manager.purgeable());
        &self.data
    }
}

#[test]
fn test_purgeable_is_available_while_preparing() {
    let dir = setup();
    fs::write(dest(dir.path(), PKG_A, "f1"), "one").unwrap();
    let manager = Manager::new(dir.path(), "").unwrap();
    let watcher = Watcher {
        manager: &manager,
        data:    vec!["f1".to_string(), "f2".to_string()],
        seen:    Default::default(),
    };

    let (jobs, release) = manager.prepare_downloads(std::slice::from_ref(&watcher));
    assert_eq!(jobs.len(), 1);
    assert_eq!(
        watcher.seen.borrow().as_slice(),
        [vec![dest(dir.path(), PKG_A, "f1")]]
    );
    assert!(manager.purgeable().is_empty());
    release.release();
}
