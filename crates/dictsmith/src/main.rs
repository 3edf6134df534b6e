use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use bidict_corpus::WhatlangClassifier;
use dictsmith::builder::{SourceCorpus, build_all};
use dictsmith::fetch::CorpusFetcher;
use dictsmith::manifest::{BuildJob, load_manifest};

const DEFAULT_MANIFEST: &str = "sources.json";
const DEFAULT_OUT_DIR: &str = ".";
const DEFAULT_CACHE_DIR: &str = "corpus_cache";
const DEFAULT_DEADLINE_SECS: u64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config();
    info!("using manifest at {}", config.manifest_path.display());
    info!("writing dictionaries to {}", config.out_dir.display());
    match &config.cache_dir {
        Some(dir) => info!("corpus cache at {}", dir.display()),
        None => info!("corpus cache disabled"),
    }
    info!("batch deadline: {}s", config.deadline.as_secs());

    let jobs = load_manifest(&config.manifest_path)
        .with_context(|| format!("loading manifest {}", config.manifest_path.display()))?;
    info!("{} dictionaries requested", jobs.len());

    let fetcher = CorpusFetcher::new(config.cache_dir.clone());
    let mut batch = Vec::with_capacity(jobs.len());
    for BuildJob { pair, sources } in jobs {
        let mut corpora = Vec::with_capacity(sources.len());
        for url in sources {
            let bytes = fetcher
                .fetch(&url)
                .await
                .with_context(|| format!("fetching {url}"))?;
            corpora.push(SourceCorpus { origin: url, bytes });
        }
        batch.push((pair, corpora));
    }

    let start = Instant::now();
    let dictionaries = build_all(batch, Arc::new(WhatlangClassifier), config.deadline).await?;
    info!("batch built in {} ms", start.elapsed().as_millis());

    std::fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("creating {}", config.out_dir.display()))?;
    for dict in &dictionaries {
        let path = config.out_dir.join(format!("{}.dic", dict.pair()));
        dict.export(&path)
            .with_context(|| format!("exporting {}", path.display()))?;
        info!("{}: {} words -> {}", dict.pair(), dict.len(), path.display());
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct Config {
    manifest_path: PathBuf,
    out_dir: PathBuf,
    cache_dir: Option<PathBuf>,
    deadline: Duration,
}

fn load_config() -> Config {
    let mut no_cache = false;
    let mut cli_manifest: Option<PathBuf> = None;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--no-cache" => no_cache = true,
            "--manifest" => {
                if let Some(path) = args.next() {
                    cli_manifest = Some(PathBuf::from(path));
                }
            }
            _ => {
                if let Some(path) = arg.strip_prefix("--manifest=") {
                    cli_manifest = Some(PathBuf::from(path));
                }
            }
        }
    }

    let manifest_path = cli_manifest
        .or_else(|| env::var("DICTSMITH_MANIFEST").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST));
    let out_dir = env::var("DICTSMITH_OUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUT_DIR));
    let cache_dir = if no_cache {
        None
    } else {
        Some(
            env::var("DICTSMITH_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_DIR)),
        )
    };
    let deadline = env::var("DICTSMITH_DEADLINE_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_DEADLINE_SECS));

    Config {
        manifest_path,
        out_dir,
        cache_dir,
        deadline,
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}
