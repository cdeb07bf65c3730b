use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use swagger_sync::release::{
    BuildDescriptor, BuildTarget, DEFAULT_APP_CONFIG_PATH, DEFAULT_DESCRIPTOR_PATH,
    DEFAULT_PACKAGE_PATH, patch_bundler_config, read_package_version, set_app_version,
};
use tracing::info;

#[derive(Debug, Clone, Args)]
pub struct BumpVersionArgs {
    #[arg(long, env = "APP_VERSION")]
    pub app_version: String,

    #[arg(long, env = "APP_FILE_PATH", default_value = DEFAULT_APP_CONFIG_PATH)]
    pub app_file_path: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct PrepareBuildArgs {
    /// Origin the assets are served from
    #[arg(long, env = "APP_DOMAIN")]
    pub app_domain: String,

    /// Path the app index is served under
    #[arg(long, env = "APP_PATH")]
    pub app_path: String,

    #[arg(long, env = "APP_BUILD_VERSION")]
    pub app_build_version: String,

    #[arg(long, env = "APP_ENV")]
    pub app_env: String,

    /// Bundler config whose public path placeholder is replaced
    #[arg(long, env = "WEBPACK_FILE_PATH")]
    pub webpack_file_path: PathBuf,

    /// Placeholder text in the bundler config
    #[arg(long, env = "WEBPACK_REPLACE_KEY")]
    pub webpack_replace_key: String,

    #[arg(long, env = "PACKAGE_FILE_PATH", default_value = DEFAULT_PACKAGE_PATH)]
    pub package_file_path: PathBuf,

    /// Where the build descriptor is written
    #[arg(long, env = "CICD_FILE_PATH", default_value = DEFAULT_DESCRIPTOR_PATH)]
    pub output: PathBuf,
}

pub fn bump_version(args: &BumpVersionArgs) -> Result<()> {
    set_app_version(&args.app_file_path, &args.app_version)
        .with_context(|| format!("failed to bump version in {}", args.app_file_path.display()))
}

pub fn prepare_build(args: &PrepareBuildArgs) -> Result<BuildDescriptor> {
    let version = read_package_version(&args.package_file_path)?;

    let descriptor = BuildDescriptor::new(
        &BuildTarget {
            domain: args.app_domain.clone(),
            path: args.app_path.clone(),
            build_version: args.app_build_version.clone(),
            env: args.app_env.clone(),
        },
        &version,
    );

    patch_bundler_config(
        &args.webpack_file_path,
        &args.webpack_replace_key,
        &descriptor.public_path,
    )?;
    descriptor
        .write(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    info!(
        public_path = %descriptor.public_path,
        asset_path = %descriptor.asset_path,
        output = %args.output.display(),
        "build prepared"
    );
    Ok(descriptor)
}
