use clap::Parser;
use kernimg::build_orchestration::{BuildOrchestrator, BuildRequest};
use kernimg::configuration::config::{CliArgs, Config};
use kernimg::container_management::runtime_from_config;
use log::{error, info};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = CliArgs::parse();

    let config = Config::load(&args).unwrap_or_else(|e| {
        error!("Unable to load configuration: {}", e);
        std::process::exit(1);
    });
    info!("Configuration loaded (runtime: {})", config.runtime);

    // One client for the whole process, shared by reference with the orchestrator.
    let runtime = runtime_from_config(&config).unwrap_or_else(|e| {
        error!("Unable to set up the container runtime: {}", e);
        std::process::exit(1);
    });

    let orchestrator = BuildOrchestrator::from_config(runtime, &config);
    let request = BuildRequest::new(&args.kernel, &args.cmdline);

    match orchestrator.build_bootable_image(&request).await {
        Ok(result) if args.json => match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Unable to serialize build result: {}", e);
                std::process::exit(1);
            }
        },
        Ok(result) => println!("{}", result.image_path.display()),
        Err(e) => {
            error!("Build failed: {}", e);
            std::process::exit(1);
        }
    }
}
