use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use imageproc::image::RgbaImage;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use std::fs;
use std::path::{Path, PathBuf};

use fbsurface::{release, ChannelOrder, DecoderConfig, Surface, SurfaceDecoder};

#[derive(Parser, Debug)]
#[command(name = "fbsurface")]
#[command(about = "Decode PNG resources into framebuffer-ready pixel surfaces", long_about = None)]
#[command(version)]
struct Cli {
    /// PNG files to decode
    #[arg(value_name = "INPUT", required = true)]
    input: Vec<PathBuf>,

    /// Channel order of the output pixels (overrides the config file)
    #[arg(long, value_enum)]
    order: Option<ChannelOrderArg>,

    /// Refuse surfaces whose header + pixels exceed this many bytes
    #[arg(long, value_name = "BYTES")]
    max_bytes: Option<usize>,

    /// Decoder config file (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write each surface block (header + pixels) to DIR/<stem>.surface
    #[arg(long, value_name = "DIR")]
    raw_out: Option<PathBuf>,

    /// Re-encode each surface as PNG into DIR, for eyeballing the result
    #[arg(long, value_name = "DIR")]
    export: Option<PathBuf>,

    /// the number of threads to use for decoding
    /// defaults to the number of logical CPUs
    #[arg(short)]
    threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, default_value_t)]
    verbose: bool,

    /// Quiet mode (no log output)
    #[arg(short, long, default_value_t)]
    quiet: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ChannelOrderArg {
    Rgba,
    Bgra,
}

impl From<ChannelOrderArg> for ChannelOrder {
    fn from(arg: ChannelOrderArg) -> Self {
        match arg {
            ChannelOrderArg::Rgba => ChannelOrder::Rgba,
            ChannelOrderArg::Bgra => ChannelOrder::Bgra,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet)?;

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure the thread pool")?;
    }

    let config = build_config(&cli)?;
    let order = config.channel_order;
    debug!("decoder config: {:?}", config);

    for dir in [&cli.raw_out, &cli.export].into_iter().flatten() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    info!("Decoding {} files", cli.input.len());
    let decoder = SurfaceDecoder::new(config);
    let results = decoder.decode_batch(&cli.input);

    let mut failed = 0;
    for (path, result) in cli.input.iter().zip(results) {
        let surface = match result {
            Ok(surface) => surface,
            Err(e) => {
                failed += 1;
                println!("{}: {}", path.display(), e);
                continue;
            }
        };

        println!(
            "{}: {}x{} stride={} format={} bytes={}",
            path.display(),
            surface.width(),
            surface.height(),
            surface.stride(),
            surface.format(),
            surface.data().len()
        );

        if let Some(dir) = &cli.raw_out {
            write_block(dir, path, &surface)?;
        }
        if let Some(dir) = &cli.export {
            export_png(dir, path, &surface, order)?;
        }

        let mut handle = Some(surface);
        release(&mut handle);
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} files failed to decode", cli.input.len());
    }

    Ok(())
}

fn setup_logging(verbose: bool, quiet: bool) -> Result<()> {
    if quiet {
        return Ok(());
    }

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // the decoder logs through `log`; forward those records into tracing
    tracing_log::LogTracer::init().context("Failed to bridge log records")?;

    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install the tracing subscriber")?;

    Ok(())
}

fn build_config(cli: &Cli) -> Result<DecoderConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => DecoderConfig::default(),
    };

    if let Some(order) = cli.order {
        config.channel_order = order.into();
    }

    if let Some(limit) = cli.max_bytes {
        if limit == 0 {
            anyhow::bail!("--max-bytes must be greater than 0");
        }
        config.max_surface_bytes = Some(limit);
    }

    Ok(config)
}

fn load_config(path: &Path) -> Result<DecoderConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config {}", path.display()))
}

fn output_path(dir: &Path, input: &Path, extension: &str) -> PathBuf {
    // with_extension() on the stem would eat anything after its last inner dot
    let mut file_name = input
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    file_name.push('.');
    file_name.push_str(extension);
    dir.join(file_name)
}

#[instrument(skip(surface))]
fn write_block(dir: &Path, input: &Path, surface: &Surface) -> Result<()> {
    let path = output_path(dir, input, "surface");
    fs::write(&path, surface.to_block())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("wrote {}", path.display());
    Ok(())
}

#[instrument(skip(surface))]
fn export_png(dir: &Path, input: &Path, surface: &Surface, order: ChannelOrder) -> Result<()> {
    let mut pixels = surface.data().to_vec();
    if order == ChannelOrder::Bgra {
        for px in pixels.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }

    let image = RgbaImage::from_raw(surface.width(), surface.height(), pixels)
        .context("Surface payload does not match its dimensions")?;

    let path = output_path(dir, input, "png");
    if path == input {
        warn!("refusing to overwrite input {}", input.display());
        return Ok(());
    }

    image
        .save(&path)
        .with_context(|| format!("Failed to export {}", path.display()))?;
    debug!("exported {}", path.display());
    Ok(())
}

#[test]
fn output_path_keeps_inner_dots() {
    assert_eq!(
        output_path(Path::new("out"), Path::new("icons/ic.back.v2.png"), "surface"),
        PathBuf::from("out/ic.back.v2.surface")
    );
}

#[test]
fn flags_override_config() {
    let cli = Cli::parse_from(["fbsurface", "--order", "bgra", "--max-bytes", "4096", "a.png"]);
    let config = build_config(&cli).unwrap();
    assert_eq!(config.channel_order, ChannelOrder::Bgra);
    assert_eq!(config.max_surface_bytes, Some(4096));
}
