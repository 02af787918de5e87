use anyhow::{bail, Context};
use clap::ArgMatches;
use picsave_cli::cli::{batch_options, command, download_options, load_config, sources};
use picsave_cli::NativeHost;
use picsave_core::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = command().get_matches();
    init_tracing(matches.get_flag("json"));

    let config = load_config(&matches)?;
    match matches.subcommand() {
        Some(("get", args)) => run_get(args, config).await,
        Some(("zip", args)) => run_zip(args, config).await,
        _ => Ok(()),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn native_host(args: &ArgMatches) -> anyhow::Result<Arc<NativeHost>> {
    let out = args
        .get_one::<PathBuf>("out")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let host = NativeHost::new(out, None).context("creating native host")?;
    Ok(Arc::new(host))
}

async fn run_get(args: &ArgMatches, config: DownloaderConfig) -> anyhow::Result<()> {
    let host = native_host(args)?;
    let options = download_options(args, &config);
    let batch = batch_options(args, &config);
    let downloader = ImageDownloader::with_config(Arc::clone(&host) as Arc<dyn Host>, config);

    let results = downloader
        .download_images(&sources(args), &options, batch)
        .await;

    let mut failed = 0;
    for result in &results {
        match result {
            Settled::Fulfilled(name) => println!("{name}"),
            Settled::Rejected(_) => failed += 1,
        }
    }
    if failed > 0 {
        bail!("{} of {} images could not be saved", failed, results.len());
    }
    Ok(())
}

async fn run_zip(args: &ArgMatches, config: DownloaderConfig) -> anyhow::Result<()> {
    let host = native_host(args)?;
    let options = download_options(args, &config);
    let batch = batch_options(args, &config);
    let name = args
        .get_one::<String>("name")
        .context("archive name is required")?;
    let downloader = Arc::new(ImageDownloader::with_config(
        Arc::clone(&host) as Arc<dyn Host>,
        config,
    ));

    let store = ArchiveStore::new(name);
    let results = store
        .add_images(&downloader, sources(args), &options, batch)
        .await?;

    let failed = results.iter().filter(|r| r.is_rejected()).count();
    for result in &results {
        if let Settled::Rejected(e) = result {
            tracing::warn!("Skipped image: {}", e);
        }
    }
    if store.is_empty() {
        bail!("none of {} images could be added to '{}'", results.len(), name);
    }

    let filename = store.download(None, &*host).await?;
    println!("{filename}");
    if failed > 0 {
        bail!("{} of {} images were left out of {}", failed, results.len(), filename);
    }
    Ok(())
}
