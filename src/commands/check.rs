use crate::bootstrap::preflight;
use crate::{ui, BootstrapConfig, SystemRunner};
use anyhow::Result;
use std::path::Path;

pub fn execute(start: &Path, config: &BootstrapConfig) -> Result<()> {
    let report = preflight(&SystemRunner, config, start)?;

    ui::success(
        "Ready",
        format!(
            "{} can be bootstrapped (default branch '{}')",
            report.root.display(),
            config.default_branch
        ),
    );
    Ok(())
}
