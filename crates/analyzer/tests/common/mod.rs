//! Common test utilities for CLI integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Isolated home directory holding `.reddit-analyzer/`
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub data_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let data_dir = temp_dir.path().join(".reddit-analyzer");

        Ok(Self { temp_dir, data_dir })
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    /// Command with HOME pointed at the temp dir and no OPENAI_* leakage
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_analyzer"));
        cmd.env("HOME", self.temp_dir.path());
        for name in [
            "OPENAI_API_KEY",
            "OPENAI_API_BASE",
            "OPENAI_MODEL",
            "OPENAI_MAX_TOKENS",
            "OPENAI_TEMPERATURE",
            "OPENAI_TIMEOUT_SECONDS",
        ] {
            cmd.env_remove(name);
        }
        cmd
    }

    pub fn write_config(&self, config: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::write(self.config_file(), config)?;
        Ok(())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
