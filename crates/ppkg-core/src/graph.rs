//! Transitive dependency closure and graph emission.
//!
//! The closure is built iteratively with an explicit worklist: recursing
//! over deep dependency chains would risk the call stack, and an owned-name
//! stack makes the ownership story simple. Popped names either already live
//! in the visited map (dropped) or move into it after lookup.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::extract::rename_or_copy;
use crate::formula::Formula;
use crate::paths::Paths;
use crate::process::{self, ProcessStatus};
use crate::resolver::Resolver;

/// ASCII-art rendering service for the `box` output format.
pub const BOX_RENDER_URL: &str = "https://dot-to-ascii.ggerganov.com/dot-to-ascii.php";

/// The resolved dependency closure of one root package.
#[derive(Debug)]
pub struct DepGraph {
    /// `(package, direct deps)` in resolution order; leaves have no entry.
    adjacency: Vec<(String, Vec<String>)>,
    /// Every resolved formula, keyed by package name.
    formulas: HashMap<String, Formula>,
    /// Visitation order.
    order: Vec<String>,
}

impl DepGraph {
    /// Resolve the transitive closure of `root`.
    ///
    /// Self-dependence is a hard error. Longer cycles are absorbed by the
    /// visited set and terminate the traversal without an error.
    pub fn build(resolver: &Resolver<'_>, root: &str) -> Result<Self> {
        let mut visited: HashMap<String, Formula> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        let mut adjacency: Vec<(String, Vec<String>)> = Vec::new();
        let mut stack: Vec<String> = vec![root.to_string()];

        while let Some(package) = stack.pop() {
            if visited.contains_key(&package) {
                continue;
            }

            let formula = resolver.lookup(&package)?;
            let deps: Vec<String> = formula.dependencies().map(str::to_string).collect();

            for dep in &deps {
                if *dep == package {
                    return Err(Error::SelfDependency(package));
                }
                stack.push(dep.clone());
            }

            debug!(package = %package, deps = deps.len(), "resolved");
            if !deps.is_empty() {
                adjacency.push((package.clone(), deps));
            }
            order.push(package.clone());
            visited.insert(package, formula);
        }

        Ok(DepGraph {
            adjacency,
            formulas: visited,
            order,
        })
    }

    /// True when at least one package in the closure has dependencies.
    pub fn has_edges(&self) -> bool {
        !self.adjacency.is_empty()
    }

    /// Package names in visitation order.
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn formula(&self, package: &str) -> Option<&Formula> {
        self.formulas.get(package)
    }

    /// The adjacency list in DOT syntax.
    pub fn to_dot(&self) -> String {
        let mut body = String::new();
        for (package, deps) in &self.adjacency {
            body.push_str(&format!("    \"{package}\" -> {{"));
            for dep in deps {
                body.push_str(&format!(" \"{dep}\""));
            }
            body.push_str(" }\n");
        }
        format!("digraph G {{\n{body}}}")
    }
}

/// Output formats for `depends`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    Dot,
    Box,
    Svg,
    Png,
}

impl RenderFormat {
    pub fn extension(self) -> &'static str {
        match self {
            RenderFormat::Dot => "dot",
            RenderFormat::Box => "box",
            RenderFormat::Svg => "svg",
            RenderFormat::Png => "png",
        }
    }
}

/// Resolve the user-facing output file name.
///
/// No path (or `.`) places `<pkg>-dependencies.<ext>` in the working
/// directory, `..` in the parent, a trailing `/` in that directory; any
/// other path is used verbatim as the file name.
pub fn output_file_path(
    package: &str,
    format: RenderFormat,
    output_path: Option<&str>,
) -> PathBuf {
    let default_name = format!("{package}-dependencies.{}", format.extension());
    match output_path {
        None | Some("") | Some(".") => PathBuf::from(default_name),
        Some("..") => PathBuf::from("..").join(default_name),
        Some(dir) if dir.ends_with('/') => PathBuf::from(dir).join(default_name),
        Some(file) => PathBuf::from(file),
    }
}

/// Render `graph` in `format`.
///
/// Returns `Ok(Some(text))` when the result belongs on stdout (dot or box
/// art without an output path) and `Ok(None)` when a file was written. An
/// edge-free graph renders to nothing.
pub fn render(
    paths: &Paths,
    package: &str,
    graph: &DepGraph,
    format: RenderFormat,
    output_path: Option<&str>,
) -> Result<Option<String>> {
    if !graph.has_edges() {
        return Ok(None);
    }

    let dot = graph.to_dot();

    match (format, output_path) {
        (RenderFormat::Dot, None) => return Ok(Some(dot)),
        (RenderFormat::Box, None) => return Ok(Some(fetch_box_art(&dot)?)),
        _ => {}
    }

    let session = paths.prepare_session()?;
    let out = output_file_path(package, format, output_path);

    match format {
        RenderFormat::Dot => {
            let dot_file = session.join("dependencies.dot");
            fs::write(&dot_file, &dot).map_err(|e| Error::io(&dot_file, e))?;
            rename_or_copy(&dot_file, &out)?;
        }
        RenderFormat::Box => {
            let box_file = session.join("dependencies.box");
            let art = fetch_box_art(&dot)?;
            fs::write(&box_file, art).map_err(|e| Error::io(&box_file, e))?;
            rename_or_copy(&box_file, &out)?;
        }
        RenderFormat::Svg | RenderFormat::Png => {
            let dot_file = session.join("dependencies.dot");
            fs::write(&dot_file, &dot).map_err(|e| Error::io(&dot_file, e))?;

            let tmp_file = session.join("dependencies.tmp");
            let dot_tool = which::which("dot").map_err(|_| {
                Error::io(
                    Path::new("dot"),
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "executable not found in PATH",
                    ),
                )
            })?;
            let type_flag = match format {
                RenderFormat::Png => "-Tpng",
                _ => "-Tsvg",
            };
            let status = process::spawn_and_wait(
                &dot_tool,
                [
                    std::ffi::OsStr::new(type_flag),
                    std::ffi::OsStr::new("-o"),
                    tmp_file.as_os_str(),
                    dot_file.as_os_str(),
                ],
                None,
            )
            .map_err(|e| Error::io(&dot_tool, e))?;
            if status != ProcessStatus::Exited(0) {
                return Err(Error::Subprocess {
                    program: "dot".to_string(),
                    status,
                });
            }
            rename_or_copy(&tmp_file, &out)?;
        }
    }

    Ok(None)
}

fn fetch_box_art(dot: &str) -> Result<String> {
    let response = reqwest::blocking::Client::new()
        .get(BOX_RENDER_URL)
        .query(&[("boxart", "1"), ("src", dot)])
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Network {
            url: BOX_RENDER_URL.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.text()?)
}
