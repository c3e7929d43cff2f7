//! Fake transcoder programs for tests.
//!
//! Each fake is a shell script in a temporary directory, run as
//! `/bin/sh <script> <args...>` so no executable bit is needed. The scripts
//! ignore the argument contract unless they record it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use crate::config::TranscoderConfig;

const SUCCESS_SCRIPT: &str = r#"printf 'Input #0, mp3, from input:\n' >&2
printf 'size=     128kB time=00:00:02.00 bitrate= 128.0kbits/s speed=1.00x\r' >&2
printf 'size=     256kB time=00:00:05.00 bitrate= 128.0kbits/s speed=1.02x\n' >&2
exit 0
"#;

const FAILURE_SCRIPT: &str = r#"printf 'input.mp3: Invalid data found when processing input\n' >&2
exit 1
"#;

// Dies from the signal itself, so no exit code is reported.
const HANGING_SCRIPT: &str = "exec sleep 30\n";

// Reports readiness as a progress line once the trap is in place.
const TRAPPING_SCRIPT: &str = r#"trap 'exit 255' TERM
printf 'size=       0kB time=00:00:00.00 bitrate=N/A speed=N/A\n' >&2
while :; do sleep 0.1; done
"#;

/// Owner of the temporary directory holding fake transcoder scripts.
#[derive(Debug)]
pub struct FakeTranscoder {
    dir: TempDir,
}

impl FakeTranscoder {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Prints two progress lines and exits 0.
    pub fn succeeding(&self) -> io::Result<TranscoderConfig> {
        self.config("succeed.sh", SUCCESS_SCRIPT)
    }

    /// Prints one diagnostic line and exits 1.
    pub fn failing(&self) -> io::Result<TranscoderConfig> {
        self.config("fail.sh", FAILURE_SCRIPT)
    }

    /// Runs until killed by a signal.
    pub fn hanging(&self) -> io::Result<TranscoderConfig> {
        self.config("hang.sh", HANGING_SCRIPT)
    }

    /// Runs until SIGTERM, then exits with code 255.
    pub fn trapping(&self) -> io::Result<TranscoderConfig> {
        self.config("trap.sh", TRAPPING_SCRIPT)
    }

    /// Writes its arguments one per line to the returned file, then exits 0.
    pub fn recording(&self) -> io::Result<(TranscoderConfig, PathBuf)> {
        let args_file = self.dir.path().join("args.txt");
        let script = format!("printf '%s\\n' \"$@\" > '{}'\n", args_file.display());
        Ok((self.config("record.sh", &script)?, args_file))
    }

    /// Config running an arbitrary script body.
    pub fn config(&self, name: &str, body: &str) -> io::Result<TranscoderConfig> {
        let script = self.dir.path().join(name);
        fs::write(&script, body)?;

        Ok(TranscoderConfig {
            program: PathBuf::from("/bin/sh"),
            launcher_args: vec![script.to_string_lossy().into_owned()],
            stderr_drain_timeout: Duration::from_millis(500),
            ..Default::default()
        })
    }
}
