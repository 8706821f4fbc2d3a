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

use std::io::IsTerminal;

use clap::Parser;
use colored::Colorize;

mod cli;

/// Logging goes to stderr, filtered by `RUST_LOG` (default: warnings only).
fn init_tracing() {
    let log_env_set = std::env::var("RUST_LOG").is_ok();
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing::Level::WARN.into())
        .from_env_lossy();

    let fmt = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);
    if log_env_set {
        fmt.compact().init();
    } else {
        fmt.with_target(false).without_time().init();
    }
}

pub fn main() {
    init_tracing();

    let cli = cli::BeamakeCli::parse();
    let flags = cli.flags;
    let code = match cli::run(cli.subcommand, flags) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:?}", "error".red().bold(), e);
            1
        }
    };
    std::process::exit(code);
}
