use crate::{BootstrapConfig, Bootstrapper, StdinPrompter, SystemRunner};
use anyhow::Result;
use std::path::Path;

pub fn execute(start: &Path, config: &BootstrapConfig) -> Result<()> {
    let runner = SystemRunner;
    let mut prompter = StdinPrompter;
    Bootstrapper::new(&runner, &mut prompter, config).run(start)?;
    Ok(())
}
