use crate::save::TableSnapshot;
use ng_core::{RESOURCE_PROBLEM, SourceError, TableBackend};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Directories searched after `PATH`; CGI environments rarely include sbin
const SBIN_DIRS: &[&str] = &["/usr/local/sbin", "/usr/sbin", "/sbin"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    #[default]
    Ipv4,
    Ipv6,
}

impl Family {
    pub fn save_binary(self) -> &'static str {
        match self {
            Family::Ipv4 => "iptables-save",
            Family::Ipv6 => "ip6tables-save",
        }
    }
}

/// Table backend that snapshots a table with `iptables-save -c`
#[derive(Debug, Clone)]
pub struct IptablesSave {
    family: Family,
    binary: PathBuf,
}

impl IptablesSave {
    pub fn new(family: Family) -> Self {
        Self {
            family,
            binary: PathBuf::from(family.save_binary()),
        }
    }

    /// Use a specific save tool instead of the family default
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }
}

impl TableBackend for IptablesSave {
    type Table = TableSnapshot;

    fn init(&mut self) -> Result<(), SourceError> {
        let found = locate(&self.binary, std::env::var_os("PATH")).ok_or_else(|| {
            SourceError::Setup(format!(
                "failed to initialize xtables: {} not found in PATH or {}",
                self.binary.display(),
                SBIN_DIRS.join(", ")
            ))
        })?;
        debug!(binary = %found.display(), family = ?self.family, "save tool located");
        self.binary = found;
        Ok(())
    }

    async fn open(&self, table: &str) -> Result<TableSnapshot, SourceError> {
        validate_table_name(table)?;

        debug!(binary = %self.binary.display(), table, "running save tool");
        let output = Command::new(&self.binary)
            .arg("-c")
            .arg("-t")
            .arg(table)
            .output()
            .await
            .map_err(|e| spawn_error(&self.binary, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&self.binary, output.status.code(), &stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        TableSnapshot::parse(table, &stdout)
    }
}

/// Resolve the save tool. Paths are taken as given; bare names are searched
/// in `search_path` and then in the sbin directories.
pub fn locate(binary: &Path, search_path: Option<OsString>) -> Option<PathBuf> {
    if binary.components().count() > 1 {
        return binary.is_file().then(|| binary.to_path_buf());
    }

    let path_dirs = search_path
        .as_deref()
        .map(|p| std::env::split_paths(p).collect::<Vec<_>>())
        .unwrap_or_default();

    path_dirs
        .into_iter()
        .chain(SBIN_DIRS.iter().map(PathBuf::from))
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

/// Table names go straight onto the command line, so keep them to what
/// the kernel accepts
fn validate_table_name(table: &str) -> Result<(), SourceError> {
    let valid = !table.is_empty()
        && table.len() <= 32
        && !table.starts_with('-')
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(SourceError::Other(format!("invalid table name '{}'", table)))
    }
}

fn spawn_error(binary: &Path, err: std::io::Error) -> SourceError {
    match err.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            SourceError::Setup(format!(
                "failed to initialize xtables: cannot run {}: {}",
                binary.display(),
                err
            ))
        }
        _ => SourceError::Other(format!("failed to run {}: {}", binary.display(), err)),
    }
}

/// Turn a failed save run into a backend error
pub fn classify_failure(binary: &Path, code: Option<i32>, stderr: &str) -> SourceError {
    let message = stderr.trim();
    let message = if message.is_empty() {
        match code {
            Some(code) => format!("{} exited with status {}", binary.display(), code),
            None => format!("{} was killed by a signal", binary.display()),
        }
    } else {
        message.to_string()
    };

    let lower = message.to_ascii_lowercase();
    let busy = code == Some(RESOURCE_PROBLEM)
        || lower.contains("temporarily unavailable")
        || lower.contains("resource busy")
        || lower.contains("holding the xtables lock");

    if busy {
        SourceError::Busy(message)
    } else if lower.contains("invalid argument") {
        SourceError::Other(format!("{}. Run `dmesg' for more information.", message))
    } else {
        SourceError::Other(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    #[rstest]
    #[case(Some(4), "", true)]
    #[case(Some(1), "iptables-save: Resource temporarily unavailable", true)]
    #[case(
        Some(1),
        "Another app is currently holding the xtables lock. Perhaps you want to use the -w option?",
        true
    )]
    #[case(Some(1), "iptables-save: Table does not exist (do you need to insmod?)", false)]
    #[case(Some(1), "Permission denied (you must be root)", false)]
    #[case(None, "", false)]
    fn failure_classification(#[case] code: Option<i32>, #[case] stderr: &str, #[case] busy: bool) {
        let err = classify_failure(Path::new("iptables-save"), code, stderr);
        assert_eq!(err.is_transient(), busy, "{:?}", err);
    }

    #[test]
    fn invalid_argument_carries_dmesg_hint() {
        let err = classify_failure(Path::new("iptables-save"), Some(1), "iptables-save: Invalid argument\n");
        assert_eq!(
            err.to_string(),
            "iptables-save: Invalid argument. Run `dmesg' for more information."
        );
    }

    #[test]
    fn silent_failure_names_the_tool() {
        let err = classify_failure(Path::new("/usr/sbin/iptables-save"), Some(2), "  \n");
        assert_eq!(
            err,
            SourceError::Other("/usr/sbin/iptables-save exited with status 2".into())
        );
    }

    #[rstest]
    #[case("filter", true)]
    #[case("nat", true)]
    #[case("security", true)]
    #[case("", false)]
    #[case("-h", false)]
    #[case("filter; rm", false)]
    #[case("a_very_long_table_name_that_is_not_valid", false)]
    fn table_names(#[case] table: &str, #[case] ok: bool) {
        assert_eq!(validate_table_name(table).is_ok(), ok);
    }

    #[test]
    fn family_picks_save_tool() {
        assert_eq!(Family::Ipv4.save_binary(), "iptables-save");
        assert_eq!(Family::Ipv6.save_binary(), "ip6tables-save");
        assert_eq!(Family::default(), Family::Ipv4);
        let family: Family = serde_yaml::from_str("ipv6").unwrap();
        assert_eq!(family, Family::Ipv6);
    }

    #[test]
    fn locate_searches_path_then_keeps_explicit_paths() {
        let dir = std::env::temp_dir().join(format!("ng-ipt-locate-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let tool = dir.join("fake-save");
        fs::write(&tool, "#!/bin/sh\n").unwrap();

        let found = locate(Path::new("fake-save"), Some(dir.clone().into_os_string()));
        assert_eq!(found.as_deref(), Some(tool.as_path()));

        assert_eq!(locate(&tool, None).as_deref(), Some(tool.as_path()));
        assert_eq!(locate(&dir.join("missing"), None), None);
        assert_eq!(locate(Path::new("ng-ipt-no-such-tool"), Some(dir.clone().into_os_string())), None);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn init_fails_for_missing_tool() {
        let mut backend = IptablesSave::new(Family::Ipv4).with_binary("/nonexistent/iptables-save");
        let err = backend.init().unwrap_err();
        assert!(matches!(err, SourceError::Setup(_)));
    }

    #[tokio::test]
    async fn open_rejects_bad_table_names_before_running_anything() {
        let backend = IptablesSave::new(Family::Ipv4).with_binary("/nonexistent/iptables-save");
        let err = backend.open("--help").await.unwrap_err();
        assert_eq!(err, SourceError::Other("invalid table name '--help'".into()));
    }

    #[tokio::test]
    async fn spawn_failure_is_a_setup_error() {
        let backend = IptablesSave::new(Family::Ipv4).with_binary("/nonexistent/iptables-save");
        let err = backend.open("filter").await.unwrap_err();
        assert!(matches!(err, SourceError::Setup(_)), "{:?}", err);
    }
}
