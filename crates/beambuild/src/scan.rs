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

//! Attribute scanning: extract the file references a module declares without
//! following any of them. This is discovery, not validation; forms the
//! scanner cannot make sense of are skipped, the real compiler reports
//! syntax errors.

use std::path::Path;

/// A raw reference extracted from a top-level attribute, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// `-include("...")` or `-file("...", Line)`: a path as written.
    Path(String),
    /// `-include_lib("...")`: a library-relative path.
    LibPath(String),
    /// `-behaviour(M)`, `-import(M, ...)`, `-compile({parse_transform, M})`,
    /// `-compile({core_transform, M})`: a module name.
    Module(String),
}

pub fn scan_file(path: &Path) -> anyhow::Result<Vec<SourceRef>> {
    let text = std::fs::read_to_string(path)?;
    Ok(scan_source(&text))
}

/// Pure scan over the file contents, in declaration order.
pub fn scan_source(text: &str) -> Vec<SourceRef> {
    let mut refs = vec![];
    for form in forms(text) {
        scan_form(&form, &mut refs);
    }
    refs
}

/// Split source text into top-level forms, stripping comments. A form ends
/// at a `.` outside strings that is followed by whitespace or end of input.
fn forms(text: &str) -> Vec<String> {
    let mut out = vec![];
    let mut cur = String::new();
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        match c {
            '%' if !in_string => {
                // comment runs to end of line
                for c in chars.by_ref() {
                    if c == '\n' {
                        cur.push('\n');
                        break;
                    }
                }
            }
            '"' => {
                in_string = !in_string;
                cur.push(c);
            }
            '\\' if in_string => {
                cur.push(c);
                if let Some(esc) = chars.next() {
                    cur.push(esc);
                }
            }
            '$' if !in_string => {
                // character literal; the next char (or escape) is opaque
                cur.push(c);
                if let Some(lit) = chars.next() {
                    cur.push(lit);
                    if lit == '\\' && let Some(esc) = chars.next() {
                        cur.push(esc);
                    }
                }
            }
            '.' if !in_string => {
                if chars.peek().is_none_or(|n| n.is_whitespace()) {
                    out.push(std::mem::take(&mut cur));
                } else {
                    cur.push(c);
                }
            }
            _ => cur.push(c),
        }
    }
    if !cur.trim().is_empty() {
        out.push(cur);
    }
    out
}

fn scan_form(form: &str, refs: &mut Vec<SourceRef>) {
    let form = form.trim_start();
    let Some(rest) = form.strip_prefix('-') else {
        return;
    };
    let rest = rest.trim_start();
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    let Some(body) = attr_body(rest) else {
        return;
    };
    match name.as_str() {
        "include" => {
            if let Some(p) = first_quoted(body) {
                refs.push(SourceRef::Path(p));
            }
        }
        "include_lib" => {
            if let Some(p) = first_quoted(body) {
                refs.push(SourceRef::LibPath(p));
            }
        }
        "behaviour" | "behavior" => {
            if let Some(m) = leading_atom(body) {
                refs.push(SourceRef::Module(m));
            }
        }
        "import" => {
            if let Some(m) = leading_atom(body) {
                refs.push(SourceRef::Module(m));
            }
        }
        "file" => {
            if let Some(p) = first_quoted(body) {
                refs.push(SourceRef::Path(p));
            }
        }
        "compile" => {
            for m in transforms(body) {
                refs.push(SourceRef::Module(m));
            }
        }
        _ => {}
    }
}

/// The text between the attribute's outer parentheses.
fn attr_body(s: &str) -> Option<&str> {
    let open = s.find('(')?;
    let close = s.rfind(')')?;
    if close <= open {
        return None;
    }
    Some(&s[open + 1..close])
}

fn first_quoted(s: &str) -> Option<String> {
    let open = s.find('"')?;
    let rest = &s[open + 1..];
    let close = rest.find('"')?;
    Some(rest[..close].to_string())
}

fn is_atom_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '@'
}

/// An atom at the start of `s` (after whitespace), quoted or bare. Quoted
/// atoms may carry dotted namespace names.
fn leading_atom(s: &str) -> Option<String> {
    let s = s.trim_start();
    if let Some(rest) = s.strip_prefix('\'') {
        let close = rest.find('\'')?;
        return Some(rest[..close].to_string());
    }
    let atom: String = s.chars().take_while(|c| is_atom_char(*c)).collect();
    if atom.is_empty() { None } else { Some(atom) }
}

/// Modules named in `{parse_transform, M}` / `{core_transform, M}` tuples,
/// whether the compile attribute carries one tuple or a list of them.
fn transforms(body: &str) -> Vec<String> {
    let mut out = vec![];
    for (i, _) in body.match_indices('{') {
        let inner = &body[i + 1..];
        let Some(kind) = leading_atom(inner) else {
            continue;
        };
        if kind != "parse_transform" && kind != "core_transform" {
            continue;
        }
        let after = inner.trim_start()[kind.len()..].trim_start();
        let Some(after) = after.strip_prefix(',') else {
            continue;
        };
        if let Some(m) = leading_atom(after) {
            out.push(m);
        }
    }
    out
}
