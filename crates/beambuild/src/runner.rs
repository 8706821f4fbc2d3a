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
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

use beamutil::common::{BEAM_EXT, BuildOpt, INCLUDE_DIR, mtime_of};
use beamutil::path::target_for;
use beamutil::render::{Diagnostic, Severity, parse_compiler_output};

use crate::graph::DepGraph;

#[derive(Debug, Clone, Default)]
pub struct CompileOpts {
    pub out_dir: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub defines: Vec<String>,
    pub code_paths: Vec<PathBuf>,
    /// Raw options handed through to the compiler.
    pub raw: Vec<String>,
}

#[derive(Debug)]
pub enum CompileOutcome {
    Ok,
    Warnings(Vec<Diagnostic>),
    Errors {
        errors: Vec<Diagnostic>,
        warnings: Vec<Diagnostic>,
    },
}

/// The underlying language compiler, as a black box.
pub trait Compiler {
    fn compile(&self, source: &Path, opts: &CompileOpts) -> anyhow::Result<CompileOutcome>;

    /// Run an auxiliary generator over one file (lexer/parser/MIB sources
    /// share the toolchain binary).
    fn generate(&self, source: &Path, target: &Path, opts: &[String]) -> anyhow::Result<()>;

    /// The invocation a dry run prints for this source.
    fn render_command(&self, source: &Path, opts: &CompileOpts) -> String;
}

/// Shells out to an `erlc`-style binary.
pub struct ErlcCompiler {
    pub binary: PathBuf,
}

impl Default for ErlcCompiler {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("erlc"),
        }
    }
}

impl ErlcCompiler {
    fn args(&self, source: &Path, opts: &CompileOpts) -> Vec<String> {
        let mut args = vec!["-o".to_string(), opts.out_dir.display().to_string()];
        args.push("-I".to_string());
        args.push(INCLUDE_DIR.to_string());
        for dir in &opts.include_dirs {
            args.push("-I".to_string());
            args.push(dir.display().to_string());
        }
        for def in &opts.defines {
            args.push(format!("-D{def}"));
        }
        for pa in &opts.code_paths {
            args.push("-pa".to_string());
            args.push(pa.display().to_string());
        }
        for opt in &opts.raw {
            if opt.starts_with('-') || opt.starts_with('+') {
                args.push(opt.clone());
            } else {
                args.push(format!("+{opt}"));
            }
        }
        args.push(source.display().to_string());
        args
    }
}

impl Compiler for ErlcCompiler {
    fn compile(&self, source: &Path, opts: &CompileOpts) -> anyhow::Result<CompileOutcome> {
        let output = Command::new(&self.binary)
            .args(self.args(source, opts))
            .output()
            .context(format!(
                "failed to execute `{}` for `{}`",
                self.binary.display(),
                source.display()
            ))?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let diagnostics = parse_compiler_output(&text);
        let (errors, warnings): (Vec<_>, Vec<_>) = diagnostics
            .into_iter()
            .partition(|d| d.severity == Severity::Error);
        if !output.status.success() {
            Ok(CompileOutcome::Errors { errors, warnings })
        } else if !warnings.is_empty() {
            Ok(CompileOutcome::Warnings(warnings))
        } else {
            Ok(CompileOutcome::Ok)
        }
    }

    fn generate(&self, source: &Path, target: &Path, opts: &[String]) -> anyhow::Result<()> {
        let out_dir = target.parent().unwrap_or(Path::new("."));
        let mut args = vec!["-o".to_string(), out_dir.display().to_string()];
        for opt in opts {
            if opt.starts_with('-') || opt.starts_with('+') {
                args.push(opt.clone());
            } else {
                args.push(format!("+{opt}"));
            }
        }
        args.push(source.display().to_string());
        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .context(format!(
                "failed to execute `{}` for `{}`",
                self.binary.display(),
                source.display()
            ))?;
        if !output.status.success() {
            for d in parse_compiler_output(&String::from_utf8_lossy(&output.stderr)) {
                d.render();
            }
            anyhow::bail!("failed to generate from `{}`", source.display());
        }
        Ok(())
    }

    fn render_command(&self, source: &Path, opts: &CompileOpts) -> String {
        let mut cmd = vec![self.binary.display().to_string()];
        cmd.extend(self.args(source, opts));
        cmd.join(" ")
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to compile `{0}`")]
    CompileFailed(PathBuf),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Default)]
pub struct RunStats {
    pub compiled: usize,
    pub up_to_date: usize,
}

/// Whether `target` is older than the source or any file the source
/// transitively depends on. Live mtimes only; the graph supplies the parent
/// set, never the timestamps. A missing target has mtime `0` and is always
/// out of date.
pub fn needs_compile(graph: &DepGraph, source: &Path, target: &Path) -> bool {
    let target_mtime = mtime_of(target);
    if target_mtime < mtime_of(source) {
        return true;
    }
    graph
        .parents_of(source)
        .iter()
        .any(|p| target_mtime < mtime_of(p))
}

/// Compile the plan in order, stopping at the first failing source.
pub fn run_plan(
    plan: &[PathBuf],
    graph: &DepGraph,
    opt: &BuildOpt,
    base: &CompileOpts,
    compiler: &dyn Compiler,
) -> Result<RunStats, BuildError> {
    let mut stats = RunStats::default();
    for source in plan {
        let target = target_for(source, &base.out_dir, BEAM_EXT);
        let target_dir = target.parent().unwrap_or(&base.out_dir);
        std::fs::create_dir_all(target_dir)
            .context(format!("failed to create `{}`", target_dir.display()))?;
        let opts = CompileOpts {
            out_dir: target_dir.to_path_buf(),
            ..base.clone()
        };

        if opt.dry_run {
            println!("{}", compiler.render_command(source, &opts));
            continue;
        }
        if !needs_compile(graph, source, &target) {
            tracing::debug!("`{}` is up to date", source.display());
            stats.up_to_date += 1;
            continue;
        }

        if opt.verbose {
            eprintln!("{} {}", "Compiling".bright_green().bold(), source.display());
        }
        match compiler.compile(source, &opts)? {
            CompileOutcome::Ok => stats.compiled += 1,
            CompileOutcome::Warnings(warnings) => {
                for w in &warnings {
                    w.render();
                }
                stats.compiled += 1;
            }
            CompileOutcome::Errors { errors, warnings } => {
                for d in warnings.iter().chain(errors.iter()) {
                    d.render();
                }
                return Err(BuildError::CompileFailed(source.clone()));
            }
        }
    }
    Ok(stats)
}

pub fn render_result(stats: &RunStats, quiet: bool) {
    if quiet {
        return;
    }
    if stats.compiled == 0 {
        println!("{} beamake: no work to do", "Finished.".bright_green().bold());
    } else {
        println!(
            "{} beamake: compiled {} module{}, now up to date",
            "Finished.".bright_green().bold(),
            stats.compiled,
            if stats.compiled == 1 { "" } else { "s" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn set_mtime(p: &Path, secs: u64) {
        let f = std::fs::File::options().write(true).open(p).unwrap();
        f.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_needs_compile_when_target_missing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.erl");
        std::fs::write(&src, "").unwrap();
        let g = DepGraph::new();
        assert!(needs_compile(&g, &src, &dir.path().join("a.beam")));
    }

    #[test]
    fn test_needs_compile_reads_live_parent_mtimes() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.erl");
        let hrl = dir.path().join("a.hrl");
        let target = dir.path().join("a.beam");
        for f in [&src, &hrl, &target] {
            std::fs::write(f, "").unwrap();
        }
        set_mtime(&src, 1_000);
        set_mtime(&hrl, 1_000);
        set_mtime(&target, 2_000);

        let mut g = DepGraph::new();
        // stored timestamps are stale on purpose; they must not matter
        g.add_vertex(src.clone(), 1);
        g.add_vertex(hrl.clone(), 1);
        g.add_edge(&src, &hrl);
        assert!(!needs_compile(&g, &src, &target));

        set_mtime(&hrl, 3_000);
        assert!(needs_compile(&g, &src, &target));
    }

    #[test]
    fn test_erlc_argument_shape() {
        let c = ErlcCompiler::default();
        let opts = CompileOpts {
            out_dir: PathBuf::from("ebin"),
            include_dirs: vec![PathBuf::from("inc")],
            defines: vec!["TEST".into(), "VSN=1".into()],
            code_paths: vec![PathBuf::from("ebin")],
            raw: vec!["debug_info".into(), "-Werror".into()],
        };
        assert_eq!(
            c.render_command(Path::new("src/a.erl"), &opts),
            "erlc -o ebin -I include -I inc -DTEST -DVSN=1 -pa ebin +debug_info -Werror src/a.erl"
        );
    }
}
