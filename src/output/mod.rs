//! Output module for rendering the cached sitemap
//!
//! This module handles:
//! - Writing sitemap-protocol XML documents (with pagination)
//! - Building and printing the status report
//! - Writing rendered documents to the configured output file

mod status;
mod xml;

pub use status::{print_status, SitemapStatus};
pub use xml::{page_count, XmlRenderer, SITEMAP_NAMESPACE};

use crate::config::Config;
use std::path::{Path, PathBuf};

/// Path the rendered sitemap is written to (`directory/filename`)
pub fn output_path(config: &Config) -> PathBuf {
    Path::new(&config.output.directory).join(&config.output.filename)
}

/// Writes a rendered document, creating the output directory if needed
///
/// The document goes to a temporary sibling first and is renamed into
/// place, so readers never see a half-written file.
pub fn write_document(path: &Path, xml: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, xml)?;
    std::fs::rename(&tmp, path)?;

    tracing::debug!("Wrote {} bytes to {}", xml.len(), path.display());
    Ok(())
}
