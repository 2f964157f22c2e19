//! fidreg CLI — command-line interface for fiducial landmark registration.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use fidreg::{
    ArtifactStore, CorrespondenceMethod, MemoryStore, PrecomputedDetector, Registrar,
    RegistrationConfig, RegistrationInputs, RegistrationMode, Transform, VolumeId,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "fidreg")]
#[command(about = "Register reference fiducial landmarks to fiducials detected in an image volume")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a reference landmark file against a detection file.
    Register(CliRegisterArgs),

    /// Print the clusters and centroids of a landmark file.
    Cluster(CliClusterArgs),

    /// Print the default configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct CliRegisterArgs {
    /// Reference landmarks (.fcsv or .json).
    #[arg(long)]
    reference: PathBuf,

    /// Landmarks detected in the volume (.fcsv or .json).
    #[arg(long)]
    detections: PathBuf,

    /// Identifier recorded for the volume the detections came from.
    #[arg(long, default_value = "volume")]
    volume: String,

    /// Configuration JSON; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cluster seed proximity threshold (spatial units).
    #[arg(long)]
    threshold: Option<f64>,

    /// Rule pairing reference clusters with detected clusters.
    #[arg(long, value_enum)]
    correspondence: Option<CorrespondenceArg>,

    /// Skip clustering and the coarse fit; refine from identity.
    #[arg(long)]
    direct: bool,

    /// ICP iteration cap.
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Path to write the registration outcome (JSON). Printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Path to write the reference landmarks mapped into the volume frame.
    #[arg(long)]
    aligned: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliClusterArgs {
    /// Landmark file (.fcsv or .json).
    #[arg(long)]
    points: PathBuf,

    /// Cluster seed proximity threshold (spatial units).
    #[arg(long, default_value_t = fidreg::cluster::DEFAULT_CLUSTER_THRESHOLD)]
    threshold: f64,

    /// Order centroids by ascending cluster size instead of discovery order.
    #[arg(long)]
    by_size: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CorrespondenceArg {
    SizeOrder,
    DiscoveryOrder,
    NearestCentroid,
}

impl From<CorrespondenceArg> for CorrespondenceMethod {
    fn from(arg: CorrespondenceArg) -> Self {
        match arg {
            CorrespondenceArg::SizeOrder => Self::SizeOrder,
            CorrespondenceArg::DiscoveryOrder => Self::DiscoveryOrder,
            CorrespondenceArg::NearestCentroid => Self::NearestCentroid,
        }
    }
}

impl CliRegisterArgs {
    fn to_config(&self) -> CliResult<RegistrationConfig> {
        let mut config = match &self.config {
            Some(path) => RegistrationConfig::from_json_file(path)?,
            None => RegistrationConfig::default(),
        };
        if let Some(threshold) = self.threshold {
            config.cluster.threshold = threshold;
        }
        if let Some(method) = self.correspondence {
            config.correspondence = method.into();
        }
        if self.direct {
            config.mode = RegistrationMode::Direct;
        }
        if let Some(n) = self.max_iterations {
            config.icp.max_iterations = n;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Register(args) => run_register(&args),
        Commands::Cluster(args) => run_cluster(&args),
        Commands::DefaultConfig => run_default_config(),
    }
}

// ── register ───────────────────────────────────────────────────────────

fn run_register(args: &CliRegisterArgs) -> CliResult<()> {
    let config = args.to_config()?;

    tracing::info!("Loading reference landmarks: {}", args.reference.display());
    let reference = fidreg::io::load_point_set(&args.reference)?;
    tracing::info!("Loading detections: {}", args.detections.display());
    let detected = fidreg::io::load_point_set(&args.detections)?;

    let volume = VolumeId::new(args.volume.clone());
    let detector = PrecomputedDetector::new().with_result(volume.clone(), detected);

    let mut store = MemoryStore::new();
    let reference_id = store.add_point_set("reference", reference.clone());
    let output_id = store.add_transform("FiducialRegistration", Transform::identity());

    let registrar = Registrar::with_config(detector, config);
    let outcome = registrar.register(
        &mut store,
        &RegistrationInputs {
            volume: Some(volume),
            reference: Some(reference_id),
            output: Some(output_id),
        },
    )?;

    let json = serde_json::to_string_pretty(&outcome)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, &json)?;
            tracing::info!("Outcome written to {}", path.display());
        }
        None => println!("{json}"),
    }

    if let Some(path) = &args.aligned {
        let aligned = outcome.transform.apply_all(reference.as_slice());
        fidreg::io::save_point_set(path, &aligned.into())?;
        tracing::info!("Aligned reference landmarks written to {}", path.display());
    }
    Ok(())
}

// ── cluster ────────────────────────────────────────────────────────────

fn run_cluster(args: &CliClusterArgs) -> CliResult<()> {
    if !args.threshold.is_finite() || args.threshold <= 0.0 {
        return Err(format!("threshold must be finite and > 0 (got {})", args.threshold).into());
    }
    let points = fidreg::io::load_point_set(&args.points)?;
    let clusters = fidreg::cluster_points(points.as_slice(), args.threshold);
    let mut centroids = fidreg::centroids_of(points.as_slice(), &clusters);
    if args.by_size {
        centroids = centroids.sorted_by_size();
    }

    println!(
        "{} points, {} clusters (threshold {})",
        points.len(),
        clusters.len(),
        args.threshold
    );
    for (k, c) in clusters.iter().enumerate() {
        println!("  cluster {:>3}: seed {:>4}, members {:?}", k, c.seed(), c.members());
    }
    println!("{}", serde_json::to_string_pretty(&centroids)?);
    Ok(())
}

// ── default-config ─────────────────────────────────────────────────────

fn run_default_config() -> CliResult<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&RegistrationConfig::default())?
    );
    Ok(())
}
