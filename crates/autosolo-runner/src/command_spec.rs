use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

/// A host command described as a program plus discrete arguments.
///
/// Device-side shell commands (for example `input tap 10 20`) are still passed
/// to `adb` as separate argv elements; the host never evaluates them through
/// `sh -c` or `cmd /C`.
///
/// ```rust
/// use autosolo_runner::CommandSpec;
///
/// let cmd = CommandSpec::new("adb")
///     .args(["-s", "127.0.0.1:5555"])
///     .args(["shell", "input", "tap", "540", "960"]);
///
/// assert_eq!(cmd.args.len(), 7);
/// assert_eq!(cmd.display(), "adb -s 127.0.0.1:5555 shell input tap 540 960");
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// The program to execute
    pub program: OsString,
    /// Arguments as discrete elements
    pub args: Vec<OsString>,
    /// Optional working directory
    pub cwd: Option<PathBuf>,
    /// Optional environment overrides
    pub env: Option<HashMap<OsString, OsString>>,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `arg` only when `value` is present.
    ///
    /// Used for optional selectors such as `-s <serial>`.
    #[must_use]
    pub fn arg_pair_if(self, flag: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.arg(flag).arg(value),
            None => self,
        }
    }

    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set an environment variable (e.g. `ANDROID_ADB_SERVER_PORT`).
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Program name, lossily converted for logs and error messages.
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Space-joined rendering for logs. Not meant to be re-parsed.
    #[must_use]
    pub fn display(&self) -> String {
        let mut rendered = self.program_name();
        for arg in &self.args {
            rendered.push(' ');
            rendered.push_str(&arg.to_string_lossy());
        }
        rendered
    }

    /// Build a `std::process::Command` using argv-style APIs only.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        if let Some(ref env) = self.env {
            for (key, value) in env {
                cmd.env(key, value);
            }
        }

        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_new() {
        let cmd = CommandSpec::new("adb");
        assert_eq!(cmd.program, OsString::from("adb"));
        assert!(cmd.args.is_empty());
        assert!(cmd.cwd.is_none());
        assert!(cmd.env.is_none());
    }

    #[test]
    fn test_arg_pair_if_present() {
        let cmd = CommandSpec::new("adb")
            .arg_pair_if("-s", Some("emulator-5554"))
            .arg("devices");
        assert_eq!(
            cmd.args,
            vec![
                OsString::from("-s"),
                OsString::from("emulator-5554"),
                OsString::from("devices")
            ]
        );
    }

    #[test]
    fn test_arg_pair_if_absent() {
        let cmd = CommandSpec::new("adb").arg_pair_if("-s", None).arg("devices");
        assert_eq!(cmd.args, vec![OsString::from("devices")]);
    }

    #[test]
    fn test_shell_metacharacters_stay_single_arguments() {
        let cmd = CommandSpec::new("adb").args(["shell", "echo ok; reboot"]);
        assert_eq!(cmd.args.len(), 2);
        assert_eq!(cmd.args[1], OsString::from("echo ok; reboot"));
    }

    #[test]
    fn test_display_joins_arguments() {
        let cmd = CommandSpec::new("ldconsole").args(["quit", "--index", "0"]);
        assert_eq!(cmd.display(), "ldconsole quit --index 0");
    }

    #[test]
    fn test_env_and_cwd() {
        let cmd = CommandSpec::new("adb")
            .env("ANDROID_ADB_SERVER_PORT", "5038")
            .cwd("/tmp");
        let env = cmd.env.as_ref().unwrap();
        assert_eq!(
            env.get(&OsString::from("ANDROID_ADB_SERVER_PORT")),
            Some(&OsString::from("5038"))
        );
        assert_eq!(cmd.cwd, Some(PathBuf::from("/tmp")));
    }
}
