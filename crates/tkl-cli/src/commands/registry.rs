//! Registry document commands: init, export.

use super::Context;
use anyhow::Result;
use std::path::PathBuf;
use tkl_store::InitOptions;

pub fn init(ctx: &Context, opts: InitOptions) -> Result<()> {
    let reg = tkl_store::init_registry(&ctx.registry_path, &opts)?;
    println!("registry={}", ctx.registry_path.display());
    println!("version={}", reg.version);
    Ok(())
}

pub fn export(ctx: &Context, out: Option<PathBuf>) -> Result<()> {
    let out = out.unwrap_or_else(|| ctx.assets_dir.clone());
    let reg = tkl_store::load_registry(&ctx.registry_path)?;
    let n = tkl_store::export_assets(&reg, &out)?;
    println!("exported={} dir={}", n, out.display());
    Ok(())
}
