//! `ppkg depends`

use ppkg_core::{DepGraph, Paths, RenderFormat, Resolver, Result, graph};

pub fn depends(
    package: &str,
    format: RenderFormat,
    output: Option<&str>,
    platform: Option<&str>,
) -> Result<()> {
    let paths = Paths::resolve()?;
    let resolver = Resolver::new(&paths, platform);
    let dep_graph = DepGraph::build(&resolver, package)?;

    if let Some(text) = graph::render(&paths, package, &dep_graph, format, output)? {
        println!("{text}");
    }
    Ok(())
}
