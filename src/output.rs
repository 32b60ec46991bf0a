//! JSON rendering for reports.

use anyhow::Context;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::path::Path;
use tracing::info;

/// Render `value` as JSON indented by four spaces.
pub fn render<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

/// Print `value` to stdout and, when `save_to` is set, also write it there.
pub fn emit<T: Serialize + ?Sized>(value: &T, save_to: Option<&Path>) -> anyhow::Result<()> {
    let rendered = render(value)?;
    println!("{}", rendered);

    if let Some(path) = save_to {
        save(&rendered, path)?;
    }

    Ok(())
}

/// Write `value` to `path` without printing it.
pub fn write_file<T: Serialize + ?Sized>(value: &T, path: &Path) -> anyhow::Result<()> {
    save(&render(value)?, path)
}

fn save(rendered: &str, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }

    std::fs::write(path, format!("{}\n", rendered))
        .with_context(|| format!("writing results to {}", path.display()))?;

    info!(path = %path.display(), "Results saved");
    Ok(())
}
