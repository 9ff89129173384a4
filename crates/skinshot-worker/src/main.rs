use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use skinshot_engine::logging::{LoggingConfig, init_logging};
use skinshot_engine::render::RendererLimits;
use skinshot_proto::{Outcome, RenderJob, RenderMode, ResponseFrame};
use skinshot_worker::stream::read_delivery;
use skinshot_worker::{
    DefaultSkinResolver, Delivery, LocalTransport, RenderWorker, SkinResolver, StreamTransport,
    WorkerConfig, WorkerPool,
};

#[derive(Parser, Debug)]
#[command(name = "skinshot-worker", about = "Headless player skin renderer")]
struct Cli {
    /// Identity written into every response frame.
    #[arg(long, env = "SKINSHOT_NAME", default_value = "skinshot")]
    name: String,

    /// Largest accepted output width for 3D modes.
    #[arg(long, default_value_t = 512)]
    max_width: u32,

    /// Largest accepted output height for 3D modes.
    #[arg(long, default_value_t = 512)]
    max_height: u32,

    /// Create the GPU context when a worker starts instead of on its first 3D job.
    #[arg(long)]
    eager_gpu: bool,

    /// Log filter in env_logger syntax. Falls back to RUST_LOG.
    #[arg(long)]
    log: Option<String>,

    /// Standard-arm skin PNG for jobs without a skin. Built-in placeholders
    /// are used when the default skins are not given.
    #[arg(long, requires = "default_slim_skin")]
    default_skin: Option<PathBuf>,

    /// Slim-arm skin PNG for jobs without a skin.
    #[arg(long, requires = "default_skin")]
    default_slim_skin: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read length-prefixed request frames from stdin and write response
    /// records to stdout until stdin closes.
    Serve {
        #[arg(long, default_value_t = 1)]
        workers: usize,
    },
    /// Render one job and write the PNG.
    Render {
        /// A compressed request frame. Takes precedence over --skin.
        #[arg(long, conflicts_with = "skin")]
        job: Option<PathBuf>,

        /// A skin PNG to render with the options below.
        #[arg(long)]
        skin: Option<PathBuf>,

        #[arg(long, default_value = "full", value_parser = parse_mode)]
        mode: RenderMode,

        #[arg(long, default_value_t = 256)]
        width: u16,

        #[arg(long, default_value_t = 256)]
        height: u16,

        #[arg(long, default_value_t = 1)]
        supersampling: u8,

        /// Where the PNG is written.
        #[arg(long)]
        out: PathBuf,
    },
}

fn parse_mode(name: &str) -> Result<RenderMode, String> {
    RenderMode::ALL
        .into_iter()
        .find(|m| m.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            let names: Vec<_> = RenderMode::ALL.iter().map(|m| m.name()).collect();
            format!("unknown mode {name:?}, expected one of {}", names.join(", "))
        })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LoggingConfig { filter: cli.log.clone(), ..Default::default() });

    let config = WorkerConfig {
        name: cli.name,
        limits: RendererLimits { max_width: cli.max_width, max_height: cli.max_height },
        eager_gpu: cli.eager_gpu,
        ..Default::default()
    };

    let resolver: Arc<dyn SkinResolver> = match (&cli.default_skin, &cli.default_slim_skin) {
        (Some(standard), Some(slim)) => Arc::new(DefaultSkinResolver::from_files(standard, slim)?),
        _ => Arc::new(DefaultSkinResolver::builtin()?),
    };

    match cli.command {
        Command::Serve { workers } => serve(config, resolver, workers),
        Command::Render { job, skin, mode, width, height, supersampling, out } => {
            let body = match (job, skin) {
                (Some(path), _) => std::fs::read(&path)
                    .with_context(|| format!("reading job {}", path.display()))?,
                (None, Some(path)) => {
                    let png = std::fs::read(&path)
                        .with_context(|| format!("reading skin {}", path.display()))?;
                    RenderJob::new(mode, width, height, supersampling, png).encode()?
                }
                (None, None) => bail!("either --job or --skin is required"),
            };
            render_once(config, resolver, body, &out)
        }
    }
}

fn serve(config: WorkerConfig, resolver: Arc<dyn SkinResolver>, workers: usize) -> Result<()> {
    let transport = Arc::new(StreamTransport::new(io::stdout()));
    let pool = WorkerPool::new(workers, config, transport.clone(), resolver)?;

    let mut input = BufReader::new(io::stdin().lock());
    let mut tag = 0u64;
    loop {
        tag += 1;
        match read_delivery(&mut input, tag) {
            Ok(Some(delivery)) => {
                if pool.process(delivery).is_err() {
                    log::error!("no render worker is running, stopping");
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                log::error!("bad request stream: {e}");
                break;
            }
        }
    }

    pool.shutdown();
    log::info!("served {} job(s)", transport.acked());
    Ok(())
}

fn render_once(
    config: WorkerConfig,
    resolver: Arc<dyn SkinResolver>,
    body: Vec<u8>,
    out: &Path,
) -> Result<()> {
    let transport = Arc::new(LocalTransport::new());
    let worker = RenderWorker::spawn(0, config, transport.clone(), resolver)?;
    let delivery = Delivery {
        body,
        reply_to: "cli".to_string(),
        correlation_id: None,
        delivery_tag: 1,
    };
    if worker.process(delivery).is_err() {
        bail!("render worker stopped before taking the job");
    }
    worker.shutdown();

    let Some(published) = transport.published().pop() else {
        bail!("render worker produced no response");
    };
    let frame = ResponseFrame::decode(&published.body)?;
    match frame.outcome {
        Outcome::Success => {
            std::fs::write(out, &frame.payload)
                .with_context(|| format!("writing {}", out.display()))?;
            log::info!("wrote {}", out.display());
            Ok(())
        }
        Outcome::Failure => {
            bail!("render failed: {}", String::from_utf8_lossy(&frame.payload))
        }
    }
}
