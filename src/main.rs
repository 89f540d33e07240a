use clap::{Parser, Subcommand};
use gemprice_api::{RestApi, ServerConfig};
use gemprice_predict::{read_requests, FieldInput, InputFormat, PredictRequest, PredictionContext};
use gemprice_storage::ArtifactStore;
use gemprice_vision::{ExtractorConfig, ImageFeatureExtractor, Normalization};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Gemstone price prediction service
#[derive(Parser, Debug)]
#[command(name = "gemprice")]
#[command(about = "Serve tabular and multimodal gemstone price predictions", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory holding the fitted pipelines and regressors
    #[arg(short, long, global = true, default_value = "./artifacts")]
    artifacts_dir: PathBuf,

    /// Address to bind the HTTP API to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// HTTP API port
    #[arg(long, default_value_t = 5000)]
    http_port: u16,

    /// ResNet-50 weights (safetensors); without them image embeddings are all zeros
    #[arg(long)]
    backbone_weights: Option<PathBuf>,

    /// Channel normalization expected by the backbone weights (caffe or torch)
    #[arg(long, default_value = "torch")]
    normalization: Normalization,

    /// Square input resolution of the backbone
    #[arg(long, default_value_t = 224)]
    image_size: u32,

    /// HTTP worker threads (defaults to the number of CPUs)
    #[arg(long)]
    workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: Level,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Serve the HTTP API (the default)
    Serve,
    /// Price every diamond in a JSON or CSV file with the tabular model
    Predict {
        /// Input file; JSON rows, JSON columns, or CSV with a header row
        #[arg(short, long)]
        input: PathBuf,

        /// Input format (json or csv), inferred from the extension when omitted
        #[arg(long)]
        format: Option<InputFormat>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command.take() {
        Some(Command::Predict { input, format }) => predict_batch(&args, &input, format),
        Some(Command::Serve) | None => serve(args).await,
    }
}

fn load_context(args: &Args, extractor: Arc<ImageFeatureExtractor>) -> anyhow::Result<Arc<PredictionContext>> {
    let store = ArtifactStore::open(&args.artifacts_dir)?;
    match PredictionContext::load(&store, extractor) {
        Ok(ctx) => Ok(Arc::new(ctx)),
        Err(e) => {
            error!("Failed to load prediction artifacts: {}", e);
            Err(e.into())
        }
    }
}

fn predict_batch(args: &Args, input: &Path, format: Option<InputFormat>) -> anyhow::Result<()> {
    let extractor = Arc::new(ImageFeatureExtractor::degraded(
        ExtractorConfig::default(),
        "image features are not used for tabular batch prediction",
    ));
    let ctx = load_context(args, extractor)?;

    let requests = read_requests(input, format)?;
    let summaries: Vec<String> = requests.iter().map(describe).collect();
    let predictions = ctx.predict_tabular_batch(requests)?;

    for (i, (summary, prediction)) in summaries.iter().zip(&predictions).enumerate() {
        println!("Diamond {} ({}): Predicted Price = ${:.2}", i + 1, summary, prediction.predicted_price);
    }
    Ok(())
}

fn describe(request: &PredictRequest) -> String {
    let show = |value: &Option<FieldInput>| match value {
        Some(FieldInput::Number(n)) => n.to_string(),
        Some(FieldInput::Text(s)) => s.clone(),
        None => "-".to_string(),
    };
    format!(
        "Weight: {}, Cut: {}, Colour: {}",
        show(&request.weight),
        show(&request.cut),
        show(&request.colour)
    )
}

async fn serve(args: Args) -> anyhow::Result<()> {
    info!("Starting gemprice v{}", env!("CARGO_PKG_VERSION"));
    info!("Artifacts directory: {:?}", args.artifacts_dir);
    info!("HTTP API: {}:{}", args.host, args.http_port);

    let extractor = Arc::new(ImageFeatureExtractor::new(ExtractorConfig {
        weights: args.backbone_weights.clone(),
        image_size: args.image_size,
        normalization: args.normalization,
        ..Default::default()
    }));
    if extractor.is_degraded() {
        warn!("Image feature extractor is degraded, multimodal predictions will use zero embeddings");
    }

    let ctx = load_context(&args, extractor)?;
    info!("Prediction context loaded");

    let config = ServerConfig {
        host: args.host.clone(),
        port: args.http_port,
        workers: args.workers,
        ..Default::default()
    };

    let http_handle = std::thread::spawn(move || {
        info!("Starting HTTP server on {}:{}", config.host, config.port);
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(ctx, config).await {
                error!("HTTP server error: {}", e);
            }
        })
    });

    info!("gemprice started successfully");
    info!("Health: http://localhost:{}/health", args.http_port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    Ok(())
}
