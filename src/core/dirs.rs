use std::path::PathBuf;

/// `~/.ssh/known_hosts`, or a relative `.ssh/known_hosts` when no home is known
pub fn default_known_hosts_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".ssh")
        .join("known_hosts")
}

/// Default location of the working clone
pub fn default_clone_path() -> PathBuf {
    PathBuf::from("./repo/")
}
