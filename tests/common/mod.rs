//! Scripted stand-ins for the Claude CLI, shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use claude_relay::messenger::{Messenger, MessengerConfig};
use tempfile::TempDir;

/// Fake executables, written once per test binary so no script is being
/// written while another test forks.
pub struct Scripts {
    dir: TempDir,
}

const SCRIPTS: &[(&str, &str)] = &[
    (
        "success",
        r#"printf '%s\n' '{"response": "Hello from fake claude", "session_id": "s-1", "metadata": {"model": "fake"}}'"#,
    ),
    (
        "chunked",
        r#"printf '{"respo'; sleep 0.05; printf 'nse": "chunked '; sleep 0.05; printf 'ok"}\n'"#,
    ),
    ("stderr_args", r#"printf '%s\n' "$@" >&2; exit 1"#),
    ("fails", "echo 'Error: invalid API key' >&2; exit 1"),
    ("exit2", "exit 2"),
    ("not_json", "echo 'not json'"),
    ("missing_field", r#"echo '{"session_id": "x"}'"#),
    ("advisory_stderr", r#"echo 'warning: slow network' >&2; echo '{"response": "fine"}'"#),
    ("slow", "exec sleep 10"),
    ("ignores_sigterm", "trap '' TERM; echo ready; exec sleep 10"),
];

impl Scripts {
    fn create() -> Self {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        for (name, body) in SCRIPTS {
            let path = dir.path().join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let unexecutable = dir.path().join("not_executable");
        std::fs::write(&unexecutable, "#!/bin/sh\necho hi\n").unwrap();
        std::fs::set_permissions(&unexecutable, std::fs::Permissions::from_mode(0o644)).unwrap();

        Self { dir }
    }

    /// Path of the script called `name`.
    pub fn path(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        assert!(path.exists(), "unknown script {name}");
        path
    }

    /// A path inside the fixture directory that does not exist.
    pub fn missing(&self) -> PathBuf {
        self.dir.path().join("no-such-claude")
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

pub fn scripts() -> &'static Scripts {
    static SCRIPTS_DIR: OnceLock<Scripts> = OnceLock::new();
    SCRIPTS_DIR.get_or_init(Scripts::create)
}

pub fn config_for(binary: &Path) -> MessengerConfig {
    MessengerConfig {
        binary: binary.to_string_lossy().into_owned(),
        default_timeout: Duration::from_secs(10),
        terminate_grace: Duration::from_millis(500),
        ..MessengerConfig::default()
    }
}

/// Messenger running the fixture script `name`.
pub fn messenger(name: &str) -> Messenger {
    Messenger::new(&config_for(&scripts().path(name)))
}
