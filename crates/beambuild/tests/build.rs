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

//! End-to-end build scenarios against a temporary project tree and a
//! recording stand-in for the compiler.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use beambuild::entry;
use beambuild::graph;
use beambuild::resolve::NoLibraries;
use beambuild::runner::{CompileOpts, CompileOutcome, Compiler};
use beamutil::common::{BuildCommand, BuildOpt, graph_file};
use beamutil::config::ProjectConfig;

/// Records every invocation and fabricates the target file, like a compiler
/// that always succeeds.
#[derive(Default)]
struct FakeCompiler {
    invoked: RefCell<Vec<PathBuf>>,
    opts_seen: RefCell<Vec<CompileOpts>>,
}

impl Compiler for FakeCompiler {
    fn compile(&self, source: &Path, opts: &CompileOpts) -> anyhow::Result<CompileOutcome> {
        self.invoked.borrow_mut().push(source.to_path_buf());
        self.opts_seen.borrow_mut().push(opts.clone());
        let stem = source.file_stem().unwrap().to_str().unwrap();
        fs::write(opts.out_dir.join(format!("{stem}.beam")), "beam")?;
        Ok(CompileOutcome::Ok)
    }

    fn generate(&self, _source: &Path, target: &Path, _opts: &[String]) -> anyhow::Result<()> {
        fs::write(target, "generated")?;
        Ok(())
    }

    fn render_command(&self, source: &Path, _opts: &CompileOpts) -> String {
        format!("compile {}", source.display())
    }
}

struct TestProject {
    _tmp: tempfile::TempDir,
    root: PathBuf,
}

const OLD: u64 = 1_000;
const FUTURE: u64 = 4_000_000_000;

impl TestProject {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(tmp.path()).unwrap();
        Self { _tmp: tmp, root }
    }

    /// Write a file with an old mtime, so targets built "now" are newer.
    fn write(&self, rel: &str, text: &str) -> PathBuf {
        let p = self.root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(&p, text).unwrap();
        self.set_mtime(rel, OLD);
        p
    }

    fn set_mtime(&self, rel: &str, secs: u64) {
        let f = fs::File::options()
            .write(true)
            .open(self.root.join(rel))
            .unwrap();
        f.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn build(&self, config: &ProjectConfig, command: BuildCommand) -> (anyhow::Result<i32>, Vec<PathBuf>) {
        let opt = BuildOpt {
            project_dir: self.root.clone(),
            command,
            quiet: true,
            verbose: false,
            dry_run: false,
        };
        let compiler = FakeCompiler::default();
        let result = entry::run_build(config, &opt, &compiler, &NoLibraries);
        (result, compiler.invoked.into_inner())
    }

    fn src(&self, name: &str) -> PathBuf {
        self.root.join("src").join(name)
    }
}

#[test]
fn test_transform_compiles_before_its_user() {
    let p = TestProject::new();
    p.write("src/a.erl", "-module(a).\n-compile({parse_transform, t}).\n");
    p.write("src/b.erl", "-module(b).\n");
    p.write("src/t.erl", "-module(t).\n");

    let (result, invoked) = p.build(&ProjectConfig::default(), BuildCommand::Compile);
    assert_eq!(result.unwrap(), 0);
    assert_eq!(invoked.len(), 3);
    let pos = |n: &str| invoked.iter().position(|i| *i == p.src(n)).unwrap();
    assert!(pos("t.erl") < pos("a.erl"));
    assert!(p.root.join("ebin/a.beam").is_file());
}

#[test]
fn test_second_run_does_no_work() {
    let p = TestProject::new();
    p.write("src/a.erl", "-module(a).\n-include(\"a.hrl\").\n");
    p.write("src/b.erl", "-module(b).\n");
    p.write("include/a.hrl", "-define(A, 1).\n");

    let cfg = ProjectConfig::default();
    let (result, invoked) = p.build(&cfg, BuildCommand::Compile);
    assert_eq!(result.unwrap(), 0);
    assert_eq!(invoked.len(), 2);

    let (result, invoked) = p.build(&cfg, BuildCommand::Compile);
    assert_eq!(result.unwrap(), 0);
    assert!(invoked.is_empty(), "second run recompiled {invoked:?}");
}

#[test]
fn test_touched_header_recompiles_exactly_its_dependents() {
    let p = TestProject::new();
    p.write("src/a.erl", "-module(a).\n-include(\"a.hrl\").\n");
    p.write("src/b.erl", "-module(b).\n");
    p.write("include/a.hrl", "-define(A, 1).\n");

    let cfg = ProjectConfig::default();
    p.build(&cfg, BuildCommand::Compile).0.unwrap();

    p.set_mtime("include/a.hrl", FUTURE);
    let (result, invoked) = p.build(&cfg, BuildCommand::Compile);
    assert_eq!(result.unwrap(), 0);
    assert_eq!(invoked, vec![p.src("a.erl")]);
}

#[test]
fn test_vanished_header_leaves_the_graph() {
    let p = TestProject::new();
    p.write("src/a.erl", "-module(a).\n-include(\"a.hrl\").\n");
    let hrl = p.write("include/a.hrl", "-define(A, 1).\n");

    let cfg = ProjectConfig::default();
    p.build(&cfg, BuildCommand::Compile).0.unwrap();

    fs::remove_file(&hrl).unwrap();
    p.write("src/a.erl", "-module(a).\n");
    p.set_mtime("src/a.erl", FUTURE);

    let (result, invoked) = p.build(&cfg, BuildCommand::Compile);
    assert_eq!(result.unwrap(), 0);
    assert_eq!(invoked, vec![p.src("a.erl")]);

    let loaded = graph::load(&graph_file(&p.root), &[]);
    assert!(!loaded.is_empty());
    assert!(!loaded.contains(&hrl));
}

#[test]
fn test_changed_include_roots_rebuild_cache_but_not_targets() {
    let p = TestProject::new();
    p.write("src/a.erl", "-module(a).\n-include(\"x.hrl\").\n");
    p.write("inc1/x.hrl", "-define(X, 1).\n");
    fs::create_dir_all(p.root.join("inc2")).unwrap();

    let cfg1 = ProjectConfig {
        include_dirs: vec!["inc1".into()],
        ..Default::default()
    };
    let (result, invoked) = p.build(&cfg1, BuildCommand::Compile);
    assert_eq!(result.unwrap(), 0);
    assert_eq!(invoked.len(), 1);

    let cfg2 = ProjectConfig {
        include_dirs: vec!["inc1".into(), "inc2".into()],
        ..Default::default()
    };
    let (result, invoked) = p.build(&cfg2, BuildCommand::Compile);
    assert_eq!(result.unwrap(), 0);
    assert!(invoked.is_empty(), "include-root change forced {invoked:?}");

    // the cache was rebuilt under the new roots
    let roots = vec![p.root.join("inc1"), p.root.join("inc2")];
    let loaded = graph::load(&graph_file(&p.root), &roots);
    assert!(loaded.contains(&p.src("a.erl")));
    assert!(loaded.contains(&p.root.join("inc1/x.hrl")));
}

#[test]
fn test_missing_first_file_aborts_before_compiling() {
    let p = TestProject::new();
    p.write("src/a.erl", "-module(a).\n");

    let cfg = ProjectConfig {
        erl_first_files: vec!["src/does_not_exist.erl".into()],
        ..Default::default()
    };
    let (result, invoked) = p.build(&cfg, BuildCommand::Compile);
    let err = result.unwrap_err();
    assert!(err.to_string().contains("does_not_exist.erl"), "{err}");
    assert!(invoked.is_empty());
}

#[test]
fn test_cyclic_includes_build_and_stay_quiet() {
    let p = TestProject::new();
    p.write("src/c.erl", "-module(c).\n-include(\"a.hrl\").\n");
    p.write("include/a.hrl", "-include(\"b.hrl\").\n");
    p.write("include/b.hrl", "-include(\"a.hrl\").\n");

    let cfg = ProjectConfig::default();
    let (result, invoked) = p.build(&cfg, BuildCommand::Compile);
    assert_eq!(result.unwrap(), 0);
    assert_eq!(invoked, vec![p.src("c.erl")]);

    let loaded = graph::load(&graph_file(&p.root), &[]);
    let a = p.root.join("include/a.hrl");
    let b = p.root.join("include/b.hrl");
    assert!(loaded.has_edge(&a, &b));
    assert!(loaded.has_edge(&b, &a));

    let (result, invoked) = p.build(&cfg, BuildCommand::Compile);
    assert_eq!(result.unwrap(), 0);
    assert!(invoked.is_empty());
}

#[test]
fn test_explicit_first_files_lead_the_plan() {
    let p = TestProject::new();
    p.write("src/a.erl", "-module(a).\n");
    p.write("src/z.erl", "-module(z).\n");

    let cfg = ProjectConfig {
        erl_first_files: vec!["src/z.erl".into()],
        ..Default::default()
    };
    let (result, invoked) = p.build(&cfg, BuildCommand::Compile);
    assert_eq!(result.unwrap(), 0);
    assert_eq!(invoked, vec![p.src("z.erl"), p.src("a.erl")]);
}

#[test]
fn test_eunit_build_copies_sources_and_defines_test() {
    let p = TestProject::new();
    p.write("src/a.erl", "-module(a).\n");

    let opt = BuildOpt {
        project_dir: p.root.clone(),
        command: BuildCommand::Eunit,
        quiet: true,
        verbose: false,
        dry_run: false,
    };
    let compiler = FakeCompiler::default();
    let result = entry::run_build(&ProjectConfig::default(), &opt, &compiler, &NoLibraries);
    assert_eq!(result.unwrap(), 0);

    let invoked = compiler.invoked.into_inner();
    assert_eq!(invoked, vec![p.root.join(".eunit/a.erl")]);
    let opts = compiler.opts_seen.into_inner();
    assert!(opts[0].defines.iter().any(|d| d == "TEST"));
    assert!(opts[0].raw.iter().any(|o| o == "debug_info"));
    assert!(p.root.join(".eunit/a.beam").is_file());
}

#[test]
fn test_dry_run_compiles_nothing() {
    let p = TestProject::new();
    p.write("src/a.erl", "-module(a).\n");

    let opt = BuildOpt {
        project_dir: p.root.clone(),
        command: BuildCommand::Compile,
        quiet: true,
        verbose: false,
        dry_run: true,
    };
    let compiler = FakeCompiler::default();
    let result = entry::run_build(&ProjectConfig::default(), &opt, &compiler, &NoLibraries);
    assert_eq!(result.unwrap(), 0);
    assert!(compiler.invoked.into_inner().is_empty());
    assert!(!p.root.join("ebin/a.beam").exists());
}

#[test]
fn test_generated_lexer_feeds_the_build() {
    let p = TestProject::new();
    p.write("src/scan.xrl", "Definitions.\n");
    p.write("src/a.erl", "-module(a).\n");

    let cfg = ProjectConfig::default();
    let (result, invoked) = p.build(&cfg, BuildCommand::Compile);
    assert_eq!(result.unwrap(), 0);
    // the generated module compiles along with the handwritten one
    assert!(p.src("scan.erl").is_file());
    assert!(invoked.contains(&p.src("scan.erl")));
    assert!(invoked.contains(&p.src("a.erl")));
}
