use anyhow::Result;
use std::fs;
use std::os::unix::fs as unix_fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use toolpin::symlink::{is_current, publish};

// Mock store entry with a single executable
fn create_mock_entry(store: &Path, name: &str, version: &str) -> Result<PathBuf> {
    let entry = store.join(format!("{name}_{version}"));
    fs::create_dir_all(&entry)?;
    fs::write(entry.join(name), format!("#!/bin/sh\necho {version}\n"))?;
    Ok(PathBuf::from(format!("{name}_{version}")).join(name))
}

#[test]
fn test_publish_creates_bin_dir() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let bin = temp_dir.path().join("nested/.bin");
    let store = bin.join(".store");
    let versioned = create_mock_entry(&store, "jq", "1.7.1")?;

    let link = publish("jq", &versioned, &bin, &store)?;

    assert!(link.symlink_metadata()?.is_symlink());
    assert_eq!(fs::read_to_string(&link)?, "#!/bin/sh\necho 1.7.1\n");
    Ok(())
}

#[test]
fn test_republish_switches_version() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let bin = temp_dir.path().join(".bin");
    let store = bin.join(".store");
    let old = create_mock_entry(&store, "jq", "1.6")?;
    let new = create_mock_entry(&store, "jq", "1.7.1")?;

    publish("jq", &old, &bin, &store)?;
    assert!(is_current("jq", &old, &bin, &store)?);

    publish("jq", &new, &bin, &store)?;
    assert!(is_current("jq", &new, &bin, &store)?);
    assert!(!is_current("jq", &old, &bin, &store)?);
    assert_eq!(
        fs::read_link(bin.join("jq"))?,
        PathBuf::from(".store/jq_1.7.1/jq")
    );

    // Old version stays in the store
    assert!(store.join(&old).exists());
    Ok(())
}

#[test]
fn test_dangling_link_is_replaced() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let bin = temp_dir.path().join(".bin");
    let store = bin.join(".store");
    fs::create_dir_all(&bin)?;
    unix_fs::symlink(".store/jq_0.1/jq", bin.join("jq"))?;

    let versioned = create_mock_entry(&store, "jq", "1.7.1")?;
    assert!(!is_current("jq", &versioned, &bin, &store)?);

    publish("jq", &versioned, &bin, &store)?;
    assert!(is_current("jq", &versioned, &bin, &store)?);
    Ok(())
}

#[test]
fn test_regular_file_is_replaced() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let bin = temp_dir.path().join(".bin");
    let store = bin.join(".store");
    fs::create_dir_all(&bin)?;
    fs::write(bin.join("jq"), "stale copy")?;

    let versioned = create_mock_entry(&store, "jq", "1.7.1")?;
    assert!(!is_current("jq", &versioned, &bin, &store)?);

    publish("jq", &versioned, &bin, &store)?;
    assert!(bin.join("jq").symlink_metadata()?.is_symlink());
    Ok(())
}

#[test]
fn test_store_outside_bin_dir_uses_absolute_target() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let bin = temp_dir.path().join(".bin");
    let store = temp_dir.path().join("cache/store");
    let versioned = create_mock_entry(&store, "jq", "1.7.1")?;

    publish("jq", &versioned, &bin, &store)?;

    let target = fs::read_link(bin.join("jq"))?;
    assert!(target.is_absolute());
    assert_eq!(target, store.join("jq_1.7.1/jq"));
    assert!(is_current("jq", &versioned, &bin, &store)?);
    Ok(())
}

#[test]
fn test_links_for_different_tools_are_independent() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let bin = temp_dir.path().join(".bin");
    let store = bin.join(".store");
    let jq = create_mock_entry(&store, "jq", "1.7.1")?;
    let yq = create_mock_entry(&store, "yq", "4.44.1")?;

    publish("jq", &jq, &bin, &store)?;
    publish("yq", &yq, &bin, &store)?;

    assert!(is_current("jq", &jq, &bin, &store)?);
    assert!(is_current("yq", &yq, &bin, &store)?);
    assert_eq!(fs::read_to_string(bin.join("yq"))?, "#!/bin/sh\necho 4.44.1\n");
    Ok(())
}
