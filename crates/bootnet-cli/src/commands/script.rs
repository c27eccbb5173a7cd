//! `bootnet script`

use super::ConfigArgs;
use anyhow::Result;
use bootnet_protocol::BootstrapPlan;
use clap::Args;

/// Arguments for printing a startup script
#[derive(Args, Debug, Clone)]
pub struct ScriptArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Validator whose script to print
    #[arg(long)]
    pub validator: String,
}

/// Render the plain script, with a shebang, for one validator
pub fn render(args: &ScriptArgs) -> Result<String> {
    let network = args.config.load()?;
    let plan = BootstrapPlan::for_validator(&network, &args.validator)?;
    Ok(format!(
        "#!/usr/bin/env bash\n{}",
        bootnet_render::render_script(&plan)?
    ))
}

/// Print the script to stdout
pub fn run(args: &ScriptArgs) -> Result<()> {
    print!("{}", render(args)?);
    Ok(())
}
