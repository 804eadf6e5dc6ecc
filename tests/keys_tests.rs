//! SSH key-pair persistence behaviour.

use camino::Utf8PathBuf;
use ocimachine::SshKeyPair;

fn temp_key_path() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir should create");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("machines/node-1/id_ed25519"))
        .expect("temp path should be UTF-8");
    (dir, path)
}

#[test]
fn writes_both_halves_and_creates_parent_directories() {
    let (_guard, path) = temp_key_path();
    let pair = SshKeyPair::generate().expect("key generation should succeed");
    pair.write_to(&path).expect("write should succeed");

    let private = std::fs::read_to_string(&path).expect("private key should exist");
    assert!(private.contains("OPENSSH PRIVATE KEY"));

    let public_path = format!("{path}.pub");
    let public = std::fs::read_to_string(&public_path).expect("public key should exist");
    assert!(public.starts_with("ssh-ed25519 "));
    assert_eq!(public.trim_end(), pair.authorized_key().trim_end());
}

#[cfg(unix)]
#[test]
fn private_key_is_owner_read_write_only() {
    use std::os::unix::fs::PermissionsExt as _;

    let (_guard, path) = temp_key_path();
    let pair = SshKeyPair::generate().expect("key generation should succeed");
    pair.write_to(&path).expect("write should succeed");

    let mode = std::fs::metadata(&path)
        .expect("private key should exist")
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(mode, 0o600, "unexpected mode {mode:o}");
}
