use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn argv(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "kebab-case")]
pub struct InvokerConfig {
    /// Directory where submission is compiled and run
    #[serde(default = "InvokerConfig::default_sandbox_dir")]
    pub sandbox_dir: PathBuf,
    /// Root of test data; files of problem `P` live in `<testdata-dir>/P`
    #[serde(default = "InvokerConfig::default_testdata_dir")]
    pub testdata_dir: PathBuf,
    /// Sandbox writes stat log here
    #[serde(default = "InvokerConfig::default_run_log_path")]
    pub run_log_path: PathBuf,
    /// Scratch file for output of the program being judged
    #[serde(default = "InvokerConfig::default_user_output_path")]
    pub user_output_path: PathBuf,
    /// Journal with compiler diagnostics
    #[serde(default = "InvokerConfig::default_compile_log_path")]
    pub compile_log_path: PathBuf,
    /// Name of the source file inside sandbox dir
    #[serde(default = "InvokerConfig::default_source_file_name")]
    pub source_file_name: String,
    /// Compiled program, relative to sandbox dir
    #[serde(default = "InvokerConfig::default_program_path")]
    pub program_path: String,
    /// Address space limit of the compiler, in bytes
    #[serde(default = "InvokerConfig::default_compile_memory_limit")]
    pub compile_memory_limit: u64,
    /// Compiler diagnostics are truncated to this size
    #[serde(default = "InvokerConfig::default_compile_output_limit")]
    pub compile_output_limit: u64,
    /// Output larger than this is OLE
    #[serde(default = "InvokerConfig::default_user_output_limit")]
    pub user_output_limit: u64,
    #[serde(default = "InvokerConfig::default_checker_output_limit")]
    pub checker_output_limit: u64,
    /// If set, every child is killed after this period
    #[serde(default)]
    pub hard_timeout_ms: Option<u64>,
    #[serde(default = "InvokerConfig::default_checker_source_path")]
    pub checker_source_path: PathBuf,
    #[serde(default = "InvokerConfig::default_checker_exe_path")]
    pub checker_exe_path: PathBuf,
    #[serde(default)]
    pub commands: Commands,
}

impl InvokerConfig {
    fn default_sandbox_dir() -> PathBuf {
        "/run/shm/judge".into()
    }

    fn default_testdata_dir() -> PathBuf {
        "testdata".into()
    }

    fn default_run_log_path() -> PathBuf {
        "/run/shm/sandbox.log".into()
    }

    fn default_user_output_path() -> PathBuf {
        "/tmp/test".into()
    }

    fn default_compile_log_path() -> PathBuf {
        "/run/shm/compile.log".into()
    }

    fn default_source_file_name() -> String {
        "test-file.cpp".to_string()
    }

    fn default_program_path() -> String {
        "./program".to_string()
    }

    fn default_compile_memory_limit() -> u64 {
        128 * 1024 * 1024
    }

    fn default_compile_output_limit() -> u64 {
        8 * 1024
    }

    fn default_user_output_limit() -> u64 {
        64 * 1024 * 1024
    }

    fn default_checker_output_limit() -> u64 {
        64 * 1024
    }

    fn default_checker_source_path() -> PathBuf {
        "/tmp/special.cpp".into()
    }

    fn default_checker_exe_path() -> PathBuf {
        "/run/shm/checker".into()
    }

    pub fn hard_timeout(&self) -> Option<std::time::Duration> {
        self.hard_timeout_ms.map(std::time::Duration::from_millis)
    }

    pub fn load(path: &Path) -> anyhow::Result<InvokerConfig> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        // empty file is valid config
        if data.trim().is_empty() {
            return Ok(InvokerConfig::default());
        }
        serde_yaml::from_str(&data)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }
}

impl Default for InvokerConfig {
    fn default() -> Self {
        InvokerConfig {
            sandbox_dir: Self::default_sandbox_dir(),
            testdata_dir: Self::default_testdata_dir(),
            run_log_path: Self::default_run_log_path(),
            user_output_path: Self::default_user_output_path(),
            compile_log_path: Self::default_compile_log_path(),
            source_file_name: Self::default_source_file_name(),
            program_path: Self::default_program_path(),
            compile_memory_limit: Self::default_compile_memory_limit(),
            compile_output_limit: Self::default_compile_output_limit(),
            user_output_limit: Self::default_user_output_limit(),
            checker_output_limit: Self::default_checker_output_limit(),
            hard_timeout_ms: None,
            checker_source_path: Self::default_checker_source_path(),
            checker_exe_path: Self::default_checker_exe_path(),
            commands: Commands::default(),
        }
    }
}

/// Argv templates. See `interpolate` for syntax.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "kebab-case")]
pub struct Commands {
    /// Keys: `Source`, `Output`, `Cwd`
    #[serde(default = "Commands::default_compile")]
    pub compile: Vec<String>,
    /// Keys: `Source`, `Output`
    #[serde(default = "Commands::default_compile_checker")]
    pub compile_checker: Vec<String>,
    /// Keys: `Cwd`, `TimeLimitSec`, `MemLimitBytes`, `LogFd`, `FdCloseFrom`, `Program`
    #[serde(default = "Commands::default_sandbox")]
    pub sandbox: Vec<String>,
    #[serde(default = "Commands::default_builtin_checker")]
    pub builtin_checker: Vec<String>,
    /// Keys: `CheckerExe`
    #[serde(default = "Commands::default_special_checker")]
    pub special_checker: Vec<String>,
}

impl Commands {
    fn default_compile() -> Vec<String> {
        argv(&[
            "g++",
            "-Wall",
            "-O2",
            "-fdiagnostics-color=always",
            "-o",
            "$(Output)",
            "$(Source)",
        ])
    }

    fn default_compile_checker() -> Vec<String> {
        argv(&[
            "g++",
            "-O2",
            "-fdiagnostics-color=always",
            "-o",
            "$(Output)",
            "$(Source)",
            "-Iinclude",
        ])
    }

    fn default_sandbox() -> Vec<String> {
        // sudo closes fds above 2 unless told otherwise
        argv(&[
            "sudo",
            "-C",
            "$(FdCloseFrom)",
            "-u",
            "nobody",
            "--",
            "nsjail",
            "-C",
            "nsjail.cfg",
            "-D",
            "$(Cwd)",
            "-t",
            "$(TimeLimitSec)",
            "--cgroup_mem_max",
            "$(MemLimitBytes)",
            "--log_fd",
            "$(LogFd)",
            "--",
            "$(Program)",
        ])
    }

    fn default_builtin_checker() -> Vec<String> {
        argv(&["tolerant-diff"])
    }

    fn default_special_checker() -> Vec<String> {
        argv(&["special-judge", "$(CheckerExe)"])
    }
}

impl Default for Commands {
    fn default() -> Self {
        Commands {
            compile: Self::default_compile(),
            compile_checker: Self::default_compile_checker(),
            sandbox: Self::default_sandbox(),
            builtin_checker: Self::default_builtin_checker(),
            special_checker: Self::default_special_checker(),
        }
    }
}
