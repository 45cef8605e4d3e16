use anyhow::Result;

use crate::config::Config;
use crate::connector_fs::scan_directories;

pub fn list_sources(config: &Config) -> Result<()> {
    let scans = scan_directories(&config.ingest.directories, &config.ingest.include_globs)?;

    println!("{:<40} {:<10} FILES", "DIRECTORY", "STATUS");
    for scan in &scans {
        let status = if scan.exists { "OK" } else { "MISSING" };
        println!(
            "{:<40} {:<10} {}",
            scan.directory.display(),
            status,
            scan.files.len()
        );
    }
    println!();
    println!("include globs: {}", config.ingest.include_globs.join(", "));

    Ok(())
}
