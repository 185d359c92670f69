//! `app_start` action: launch an application without waiting for it

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::params::{ParamError, ParamReader};
use super::{Executor, Outcome};
use crate::config::{Action, Params};
use crate::platform::{LaunchRequest, ProcessLauncher};

pub const ACTION_TYPE: &str = "app_start";

/// Characters Windows does not allow in paths
#[cfg(windows)]
const FORBIDDEN_PATH_CHARS: &[char] = &['<', '>', '"', '|', '?', '*'];
#[cfg(not(windows))]
const FORBIDDEN_PATH_CHARS: &[char] = &[];

/// Short names accepted in place of a program path
pub fn app_aliases() -> &'static [(&'static str, &'static str)] {
    if cfg!(windows) {
        &[
            ("notepad", "notepad.exe"),
            ("calculator", "calc.exe"),
            ("explorer", "explorer.exe"),
            ("cmd", "cmd.exe"),
            ("powershell", "powershell.exe"),
            ("obs", "C:\\Program Files\\obs-studio\\bin\\64bit\\obs64.exe"),
        ]
    } else if cfg!(target_os = "linux") {
        &[
            ("calculator", "gnome-calculator"),
            ("terminal", "gnome-terminal"),
            ("chrome", "google-chrome"),
            ("editor", "gedit"),
        ]
    } else {
        &[]
    }
}

fn resolve_alias(program: &str) -> String {
    app_aliases()
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(program))
        .map(|(_, target)| target.to_string())
        .unwrap_or_else(|| program.to_string())
}

fn check_path(name: &'static str, path: &str) -> Result<(), ParamError> {
    let invalid = |reason: &str| ParamError::Invalid {
        name,
        reason: format!("{} ({:?})", reason, path),
    };

    if path.contains('\0') {
        return Err(invalid("path contains a NUL byte"));
    }
    if let Some(c) = path.chars().find(|c| FORBIDDEN_PATH_CHARS.contains(c)) {
        return Err(invalid(&format!("path contains forbidden character '{}'", c)));
    }
    let path = Path::new(path);
    if path.is_absolute() && path.components().any(|c| c == Component::ParentDir) {
        return Err(invalid("absolute path must not contain '..'"));
    }
    Ok(())
}

/// Decode `app_start` parameters into a launch request.
///
/// `path` may be an alias from [`app_aliases`]; `args` may be a list or a
/// comma-separated string.
pub fn decode(params: &Params) -> Result<LaunchRequest, ParamError> {
    let p = ParamReader::new(params);

    let path = p.required_str("path")?.trim();
    check_path("path", path)?;

    let args = p.string_list("args")?.unwrap_or_default();

    let working_dir = match p.str("working_dir")?.map(str::trim) {
        Some(dir) if !dir.is_empty() => {
            check_path("working_dir", dir)?;
            Some(PathBuf::from(dir))
        }
        _ => None,
    };

    Ok(LaunchRequest {
        program: resolve_alias(path),
        args,
        working_dir,
    })
}

/// Executes `app_start` actions
pub struct AppStartExecutor {
    launcher: Arc<dyn ProcessLauncher>,
}

impl AppStartExecutor {
    pub fn new(launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self { launcher }
    }
}

#[async_trait]
impl Executor for AppStartExecutor {
    fn name(&self) -> &str {
        ACTION_TYPE
    }

    async fn execute(&self, action: &Action) -> Result<Outcome> {
        let request = decode(&action.parameters)?;
        let pid = self.launcher.launch(&request).await?;
        info!("🚀 Started {} (pid {})", request.program, pid);
        Ok(Outcome::Spawned { pid })
    }

    async fn validate(&self, action: &Action) -> Result<(), ParamError> {
        decode(&action.parameters).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{ConsoleCall, ConsolePlatform};

    fn app(path: &str) -> Action {
        Action::new(ACTION_TYPE).with_param("path", path)
    }

    #[test]
    fn test_args_as_list_or_string() {
        let from_list = decode(&app("/usr/bin/vlc").with_param("args", vec!["--fullscreen", "a.mp4"]).parameters).unwrap();
        let from_csv = decode(&app("/usr/bin/vlc").with_param("args", "--fullscreen, a.mp4").parameters).unwrap();
        assert_eq!(from_list, from_csv);
        assert_eq!(from_list.args, vec!["--fullscreen", "a.mp4"]);
        assert_eq!(from_list.working_dir, None);
    }

    #[test]
    fn test_path_rules() {
        assert_eq!(decode(&Action::new(ACTION_TYPE).parameters), Err(ParamError::Missing("path")));
        assert_eq!(decode(&app("   ").parameters), Err(ParamError::Empty("path")));
        assert!(matches!(decode(&app("bad\0name").parameters), Err(ParamError::Invalid { name: "path", .. })));
        assert!(decode(&app("../scripts/run.sh").parameters).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_absolute_parent_traversal_rejected() {
        assert!(matches!(
            decode(&app("/usr/bin/../../etc/passwd").parameters),
            Err(ParamError::Invalid { name: "path", .. })
        ));
        assert!(matches!(
            decode(&app("/usr/bin/true").with_param("working_dir", "/tmp/../etc").parameters),
            Err(ParamError::Invalid { name: "working_dir", .. })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_alias_resolution() {
        assert_eq!(decode(&app("Terminal").parameters).unwrap().program, "gnome-terminal");
        assert_eq!(decode(&app("/opt/app").parameters).unwrap().program, "/opt/app");
    }

    #[tokio::test]
    async fn test_execute_reports_pid() {
        let console = Arc::new(ConsolePlatform::new());
        let executor = AppStartExecutor::new(console.clone());

        let outcome = executor
            .execute(&app("/usr/bin/gedit").with_param("args", "notes.txt").with_param("working_dir", ""))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Spawned { pid } if pid > 0));
        assert_eq!(
            console.calls(),
            vec![ConsoleCall::Launch {
                program: "/usr/bin/gedit".to_string(),
                args: vec!["notes.txt".to_string()],
            }]
        );
    }
}
