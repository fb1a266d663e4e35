use std::fmt;

use anyhow::Result;
use rne_profiles::PageProfile;
use serde::Serialize;

use super::context::CliContext;

#[derive(Debug, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub build_date: &'static str,
    pub git_hash: &'static str,
    pub git_branch: &'static str,
    pub profile: PageProfile,
    pub monitoring_on_load: bool,
    pub suppress_all: bool,
    pub menu_hooking: bool,
    pub bus_capacity: usize,
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ReadNoEvil Engine Information")?;
        writeln!(f, "=============================")?;
        writeln!(f, "Version: {}", self.version)?;
        writeln!(f, "Build Date: {}", self.build_date)?;
        writeln!(f, "Git Commit: {} ({})", self.git_hash, self.git_branch)?;
        writeln!(f)?;
        writeln!(f, "Configuration:")?;
        writeln!(f, "- Profile: {}", self.profile)?;
        writeln!(f, "- Monitoring on load: {}", self.monitoring_on_load)?;
        writeln!(f, "- Suppress all: {}", self.suppress_all)?;
        writeln!(f, "- Menu hooking: {}", self.menu_hooking)?;
        write!(f, "- Bus capacity: {}", self.bus_capacity)
    }
}

pub fn cmd_info(ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let info = BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        build_date: env!("BUILD_DATE"),
        git_hash: env!("GIT_HASH"),
        git_branch: env!("GIT_BRANCH"),
        profile: config.engine.profile,
        monitoring_on_load: config.engine.monitoring,
        suppress_all: config.engine.suppress_all,
        menu_hooking: config.engine.menu_hooking,
        bus_capacity: config.bus.capacity,
    };
    println!("{}", ctx.output().render(&info)?);
    Ok(())
}
