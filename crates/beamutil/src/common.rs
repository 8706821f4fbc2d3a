use fs4::FileExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

pub const BEAMAKE_JSON: &str = "beamake.json";

pub const DOT_BEAMAKE: &str = ".beamake";
pub const GRAPH_FILE: &str = "depgraph";
pub const BEAMAKE_LOCK: &str = ".beamake-lock";

pub const ERL_EXT: &str = "erl";
pub const HRL_EXT: &str = "hrl";
pub const BEAM_EXT: &str = "beam";
pub const XRL_EXT: &str = "xrl";
pub const YRL_EXT: &str = "yrl";
pub const MIB_EXT: &str = "mib";
pub const MIB_BIN_EXT: &str = "bin";

pub const DEFAULT_SOURCE_DIR: &str = "src";
pub const DEFAULT_OUTPUT_DIR: &str = "ebin";
pub const INCLUDE_DIR: &str = "include";
pub const MIB_OUTPUT_DIR: &str = "priv/mibs";

pub const IGNORE_DIRS: &[&str] = &["ebin", DOT_BEAMAKE, ".git", "_build"];

/// The build variants the driver knows how to run. Test commands compile a
/// copy of the sources into their own directory with extra options merged in
/// from the per-command config keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BuildCommand {
    #[default]
    Compile,
    Eunit,
    Ct,
}

impl BuildCommand {
    pub fn is_test(self) -> bool {
        !matches!(self, Self::Compile)
    }

    /// Directory (relative to the project root) that a test command compiles
    /// into, after copying the sources there.
    pub fn to_dir_name(self) -> Option<&'static str> {
        match self {
            Self::Compile => None,
            Self::Eunit => Some(".eunit"),
            Self::Ct => Some(".ct"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildOpt {
    pub project_dir: PathBuf,
    pub command: BuildCommand,
    pub quiet: bool,
    pub verbose: bool,
    pub dry_run: bool,
}

pub fn dot_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(DOT_BEAMAKE)
}

pub fn graph_file(project_dir: &Path) -> PathBuf {
    dot_dir(project_dir).join(GRAPH_FILE)
}

/// Last-modified time in nanoseconds since the epoch; `0` means the file
/// does not exist (or its mtime is unreadable, which we treat the same way).
pub fn mtime_of(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

pub struct FileLock {
    _file: std::fs::File,
}

impl FileLock {
    pub fn lock(path: &std::path::Path) -> std::io::Result<Self> {
        let file = match std::fs::File::create(path.join(BEAMAKE_LOCK)) {
            Ok(f) => f,
            Err(e) => return Err(e),
        };
        match file.try_lock_exclusive() {
            Ok(_) => Ok(FileLock { _file: file }),
            Err(_) => {
                println!("Blocking waiting for file lock ...");
                // Move console cursor up by one line to overprint the above tip
                print!("\x1b[1A");
                file.lock_exclusive()
                    .map_err(|e| std::io::Error::new(e.kind(), "failed to lock project dir"))?;
                Ok(FileLock { _file: file })
            }
        }
    }
}
