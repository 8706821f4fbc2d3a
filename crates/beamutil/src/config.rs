// beamake: An incremental build driver for BEAM modules.
// Copyright (C) 2024 International Digital Economy Academy
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// For inquiries, you can contact us via e-mail at jichuruanjian@idea.edu.cn.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::common::{BEAMAKE_JSON, BuildCommand, DEFAULT_OUTPUT_DIR, DEFAULT_SOURCE_DIR};

/// A conditional macro definition: when `regex` matches the platform string
/// (`<release>-<arch>-<wordsize>`), the named macro is defined.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlatformDefine {
    Name(String, String),
    Value(String, String, String),
}

impl PlatformDefine {
    pub fn pattern(&self) -> &str {
        match self {
            Self::Name(re, _) => re,
            Self::Value(re, _, _) => re,
        }
    }

    pub fn to_define(&self) -> String {
        match self {
            Self::Name(_, name) => name.clone(),
            Self::Value(_, name, value) => format!("{name}={value}"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub compiler_options: Vec<String>,
    pub defines: Vec<String>,
    pub platform_defines: Vec<PlatformDefine>,
    pub include_dirs: Vec<PathBuf>,
    pub source_dirs: Vec<PathBuf>,
    pub output_dir: Option<PathBuf>,

    pub erl_first_files: Vec<PathBuf>,
    pub xrl_first_files: Vec<PathBuf>,
    pub yrl_first_files: Vec<PathBuf>,
    pub mib_first_files: Vec<PathBuf>,

    pub xrl_opts: Vec<String>,
    pub yrl_opts: Vec<String>,
    pub mib_opts: Vec<String>,

    pub eunit_compile_opts: Vec<String>,
    pub eunit_first_files: Vec<PathBuf>,
    pub ct_compile_opts: Vec<String>,
    pub ct_first_files: Vec<PathBuf>,
}

impl ProjectConfig {
    /// Read `beamake.json` from the project root. A missing file is not an
    /// error; every field has a default.
    pub fn load(project_dir: &Path) -> anyhow::Result<ProjectConfig> {
        let path = project_dir.join(BEAMAKE_JSON);
        if !path.exists() {
            return Ok(ProjectConfig::default());
        }
        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        serde_json_lenient::from_reader(reader)
            .context(format!("failed to parse {}", path.display()))
    }

    pub fn source_dirs(&self) -> Vec<PathBuf> {
        if self.source_dirs.is_empty() {
            vec![PathBuf::from(DEFAULT_SOURCE_DIR)]
        } else {
            self.source_dirs.clone()
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }

    /// Compiler options for a command: the base options plus the command's
    /// own, with `no_debug_info` filtered out of test builds (test builds
    /// always carry debug info).
    pub fn compile_opts_for(&self, command: BuildCommand) -> Vec<String> {
        let extra: &[String] = match command {
            BuildCommand::Compile => &[],
            BuildCommand::Eunit => &self.eunit_compile_opts,
            BuildCommand::Ct => &self.ct_compile_opts,
        };
        let mut opts: Vec<String> = self
            .compiler_options
            .iter()
            .chain(extra.iter())
            .cloned()
            .collect();
        if command.is_test() {
            opts.retain(|o| o != "no_debug_info");
            if !opts.iter().any(|o| o == "debug_info") {
                opts.push("debug_info".to_string());
            }
        }
        opts
    }

    /// The ordered priority list for a command: `erl_first_files` plus the
    /// command's own first files.
    pub fn first_files_for(&self, command: BuildCommand) -> Vec<PathBuf> {
        let extra: &[PathBuf] = match command {
            BuildCommand::Compile => &[],
            BuildCommand::Eunit => &self.eunit_first_files,
            BuildCommand::Ct => &self.ct_first_files,
        };
        self.erl_first_files
            .iter()
            .chain(extra.iter())
            .cloned()
            .collect()
    }

    /// Macro definitions for a command: unconditional defines, platform
    /// defines whose regex matches `platform`, and `TEST` for test builds.
    pub fn defines_for(&self, command: BuildCommand, platform: &str) -> anyhow::Result<Vec<String>> {
        let mut defines = self.defines.clone();
        for pd in &self.platform_defines {
            let re = regex::Regex::new(pd.pattern())
                .context(format!("invalid platform_defines regex `{}`", pd.pattern()))?;
            if re.is_match(platform) {
                defines.push(pd.to_define());
            }
        }
        if command.is_test() && !defines.iter().any(|d| d == "TEST" || d.starts_with("TEST=")) {
            defines.push("TEST".to_string());
        }
        Ok(defines)
    }
}

/// The string platform defines are matched against. The release component
/// comes from the toolchain environment when it exports one.
pub fn platform_id() -> String {
    let release = std::env::var("OTP_RELEASE").unwrap_or_else(|_| "unknown".to_string());
    format!("{}-{}-{}", release, std::env::consts::ARCH, usize::BITS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    fn write_config(dir: &Path, text: &str) {
        std::fs::write(dir.join(BEAMAKE_JSON), text).unwrap();
    }

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ProjectConfig::load(dir.path()).unwrap();
        assert!(cfg.compiler_options.is_empty());
        assert_eq!(cfg.output_dir(), PathBuf::from("ebin"));
        assert_eq!(cfg.source_dirs(), vec![PathBuf::from("src")]);
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            r#"{
                "compiler_options": ["debug_info", "no_debug_info"],
                "include_dirs": ["inc1"],
                "erl_first_files": ["src/first.erl"],
                "eunit_compile_opts": ["nowarn_unused_vars"],
                "platform_defines": [
                    ["linux", "ON_LINUX"],
                    ["never-matches-anything", "NOPE", "1"]
                ]
            }"#,
        );
        let cfg = ProjectConfig::load(dir.path()).unwrap();
        expect![[r#"
            [
                "inc1",
            ]
        "#]]
        .assert_debug_eq(&cfg.include_dirs);
        assert_eq!(cfg.erl_first_files, vec![PathBuf::from("src/first.erl")]);
    }

    #[test]
    fn test_test_builds_force_debug_info() {
        let cfg = ProjectConfig {
            compiler_options: vec!["no_debug_info".into(), "nowarn_shadow_vars".into()],
            ..Default::default()
        };
        expect![[r#"
            [
                "nowarn_shadow_vars",
                "debug_info",
            ]
        "#]]
        .assert_debug_eq(&cfg.compile_opts_for(BuildCommand::Eunit));
        // the plain build keeps what the user wrote
        assert_eq!(
            cfg.compile_opts_for(BuildCommand::Compile),
            vec!["no_debug_info".to_string(), "nowarn_shadow_vars".to_string()]
        );
    }

    #[test]
    fn test_platform_defines() {
        let cfg = ProjectConfig {
            platform_defines: vec![
                PlatformDefine::Name("^24-".into(), "MODERN".into()),
                PlatformDefine::Value("x86_64".into(), "WORD".into(), "64".into()),
            ],
            ..Default::default()
        };
        let defines = cfg.defines_for(BuildCommand::Compile, "24-x86_64-64").unwrap();
        assert_eq!(defines, vec!["MODERN".to_string(), "WORD=64".to_string()]);
        let defines = cfg.defines_for(BuildCommand::Compile, "23-arm-32").unwrap();
        assert!(defines.is_empty());
    }

    #[test]
    fn test_test_define_added_once() {
        let cfg = ProjectConfig {
            defines: vec!["TEST".into()],
            ..Default::default()
        };
        let defines = cfg.defines_for(BuildCommand::Eunit, "x").unwrap();
        assert_eq!(defines, vec!["TEST".to_string()]);
    }

    #[test]
    fn test_first_files_for_command() {
        let cfg = ProjectConfig {
            erl_first_files: vec!["src/a.erl".into()],
            eunit_first_files: vec!["src/b.erl".into()],
            ..Default::default()
        };
        assert_eq!(
            cfg.first_files_for(BuildCommand::Eunit),
            vec![PathBuf::from("src/a.erl"), PathBuf::from("src/b.erl")]
        );
        assert_eq!(
            cfg.first_files_for(BuildCommand::Compile),
            vec![PathBuf::from("src/a.erl")]
        );
    }
}
