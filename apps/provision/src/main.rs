//! provision - Turn disk images into machine images
//!
//! The CLI drives a provisioner with a progress tracker and renders the
//! tracker tree live while the provisioner runs.

mod cli;
mod display;
mod error;
mod logging;
mod progress;

use crate::cli::{Cli, Commands, GlobalArgs};
use crate::display::{CommandResult, OutputRenderer};
use crate::error::CliError;
use crate::progress::ProgressRenderer;
use clap::Parser;
use provision_config::{ColorChoice, Config};
use provision_progress::Tracker;
use provision_provisioner::{ImageSource, LocalProvisioner, Provisioner};
use std::path::Path;
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if json_mode {
            println!("{}", e.to_json());
        } else {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    // 1. File config (or defaults)
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;

    // 2. Environment variables
    config.merge_env()?;

    // 3. CLI flags (highest precedence)
    apply_cli_config(&mut config, &cli.global, &cli.command);
    config.validate()?;

    logging::init_tracing(
        cli.global.json,
        cli.global.debug,
        &config.logging.filter,
        &config.log_dir(),
    );
    info!("Starting provision v{}", env!("CARGO_PKG_VERSION"));

    let colors = colors_enabled(config.display.color);
    console::set_colors_enabled(colors);
    console::set_colors_enabled_stderr(colors);

    let provisioner = LocalProvisioner::new(config.store_path())
        .with_chunk_size(config.provision.chunk_size)
        .with_verify(config.provision.verify);

    let result = match cli.command {
        Commands::Image { file, name, .. } => {
            let name = image_name(&file, name)?;
            let report = provision_image(&provisioner, &config, &file, &name, cli.global.json).await?;
            CommandResult::Provisioned(report)
        }
        Commands::List => CommandResult::ImageList(provisioner.list().await?),
        Commands::Status { name } => CommandResult::ImageInfo(provisioner.manifest(&name).await?),
    };

    OutputRenderer::new(cli.global.json).render_result(&result)?;
    info!("Command completed successfully");
    Ok(())
}

/// Provision `file` while rendering the tracker tree
async fn provision_image(
    provisioner: &LocalProvisioner,
    config: &Config,
    file: &Path,
    name: &str,
    json_mode: bool,
) -> Result<provision_provisioner::ProvisionReport, CliError> {
    let source = ImageSource::from_file(file).await?;
    let tracker = Tracker::new();

    let work = async {
        let result = provisioner.provision(name, source, &tracker).await;
        // Provisioners close the tracker themselves; this only guards the display
        if !tracker.is_finished() {
            match &result {
                Ok(_) => tracker.complete(),
                Err(e) => tracker.fail(e.clone()),
            }
        }
        result
    };

    let result = if json_mode {
        work.await
    } else {
        let mut renderer = ProgressRenderer::new(&config.display)?;
        let (result, _) = tokio::join!(work, renderer.run(&tracker, config.refresh_interval()));
        result
    };
    result.map_err(CliError::from)
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &GlobalArgs, command: &Commands) {
    if let Some(color) = global.color {
        config.display.color = color.into();
    }
    if let Some(store) = &global.store {
        config.provision.store_path = Some(store.clone());
    }

    if let Commands::Image {
        no_verify,
        chunk_size,
        ..
    } = command
    {
        if *no_verify {
            config.provision.verify = false;
        }
        if let Some(chunk_size) = chunk_size {
            config.provision.chunk_size = *chunk_size;
        }
    }
}

fn colors_enabled(choice: ColorChoice) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => console::Term::stderr().features().colors_supported(),
    }
}

/// Image name from `--name`, or the file stem of the source image
fn image_name(file: &Path, name: Option<String>) -> Result<String, CliError> {
    if let Some(name) = name {
        return Ok(name);
    }
    file.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            CliError::InvalidArguments(format!(
                "cannot derive an image name from {}, pass --name",
                file.display()
            ))
        })
}
