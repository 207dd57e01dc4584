//! Manage persisted ignored-path globs

use crate::config::IgnoredPaths;
use anyhow::Result;
use console::style;

pub fn add(glob: &str) -> Result<()> {
    let mut paths = IgnoredPaths::load()?;
    if paths.add(glob) {
        paths.save()?;
        println!("{} {}", style("Ignoring").green(), glob.trim());
    } else {
        println!("Already ignored: {}", glob.trim());
    }
    Ok(())
}

pub fn remove(glob: &str) -> Result<()> {
    let mut paths = IgnoredPaths::load()?;
    if paths.remove(glob) {
        paths.save()?;
        println!("{} {}", style("Removed").yellow(), glob.trim());
    } else {
        anyhow::bail!("Not in the ignore list: {}", glob.trim());
    }
    Ok(())
}

pub fn list() -> Result<()> {
    let paths = IgnoredPaths::load()?;

    if paths.is_empty() {
        println!("No ignored paths.");
        println!();
        println!("Add one with: wirepeek ignore add '/health*'");
        return Ok(());
    }

    for glob in paths.globs() {
        println!("{}", glob);
    }
    Ok(())
}

pub fn clear() -> Result<()> {
    let mut paths = IgnoredPaths::load()?;
    let count = paths.globs().len();
    paths.clear();
    paths.save()?;
    println!("Cleared {} ignored path(s).", count);
    Ok(())
}
