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

use colored::Colorize;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// One diagnostic line from the compiler, in the usual
/// `file:line: [Warning:] message` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: String,
    pub line: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    pub fn render(&self) {
        let location = match self.line {
            Some(line) => format!("{}:{}", self.file, line),
            None => self.file.clone(),
        };
        match self.severity {
            Severity::Warning => {
                eprintln!("{}: {}: {}", location, "Warning".yellow().bold(), self.message)
            }
            Severity::Error => {
                eprintln!("{}: {}: {}", location, "error".red().bold(), self.message)
            }
        }
    }
}

/// Split compiler output into diagnostics. Lines that do not carry a
/// `file:line:` prefix become file-less errors so nothing the compiler said
/// is dropped.
pub fn parse_compiler_output(output: &str) -> Vec<Diagnostic> {
    output
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Diagnostic {
    // `/path/to/foo.erl:12: Warning: unused variable 'X'`
    let mut parts = line.splitn(3, ':');
    if let (Some(file), Some(lineno), Some(rest)) = (parts.next(), parts.next(), parts.next())
        && let Ok(lineno) = lineno.trim().parse::<u32>()
    {
        let rest = rest.trim_start();
        let (severity, message) = match rest.strip_prefix("Warning:") {
            Some(msg) => (Severity::Warning, msg.trim_start()),
            None => (Severity::Error, rest),
        };
        return Diagnostic {
            severity,
            file: file.to_string(),
            line: Some(lineno),
            message: message.to_string(),
        };
    }
    Diagnostic {
        severity: Severity::Error,
        file: String::new(),
        line: None,
        message: line.to_string(),
    }
}
