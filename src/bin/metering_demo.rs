use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use ark_grumpkin::Projective as Curve;
use clap::Parser;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{fmt::time::Uptime, EnvFilter};

use zk_metering::chaum_pedersen::prove_partial_share;
use zk_metering::elgamal::{combine_single, encrypt_single, keygen, keygen_threshold, DiscreteLogTable};
use zk_metering::pet::PetEvaluation;
use zk_metering::protocol::{
    aggregate_reports, anonymize_identities, ord_comparison, verify_reports, BulletinBoard,
    Registration, SignedReport,
};
use zk_metering::ProtocolConfig;

const LOG_TARGET: &str = "bin::metering_demo";
const DEFAULT_FILTER: &str = "metering_demo=info,zk_metering=info";

#[derive(Debug, Parser)]
#[command(name = "metering_demo")]
#[command(about = "Run one privacy-preserving metering round end to end", long_about = None)]
struct Args {
    /// JSON protocol configuration; defaults apply to missing fields
    #[arg(long, env = "METERING_CONFIG")]
    config: Option<PathBuf>,

    /// Number of meters taking part
    #[arg(long, default_value_t = 4)]
    meters: usize,

    /// Readings, one per meter (comma-separated); random when omitted
    #[arg(long, value_delimiter = ',')]
    readings: Vec<u64>,

    /// Target the aggregate is tested against; defaults to the true total
    #[arg(long)]
    target: Option<u64>,

    /// Baseline for the plaintext consumption comparison
    #[arg(long, default_value_t = 1_000)]
    baseline: u64,

    /// Seed the demo RNG to make the run reproducible
    #[arg(long)]
    rng_seed: Option<u64>,

    /// Toggle structured (JSON) tracing output
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct RoundSummary {
    meters: usize,
    rejected_registrations: Vec<usize>,
    rejected_reports: Vec<usize>,
    target: u64,
    target_met: bool,
    total: u64,
    below_baseline: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json)?;
    let config = load_config(args.config.as_deref())?;
    let summary = run_round(&config, &args)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("failed to encode round summary")?
    );
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<ProtocolConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            ProtocolConfig::from_json(&raw)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => ProtocolConfig::default(),
    };
    config.validate().context("invalid protocol configuration")?;
    info!(
        target: LOG_TARGET,
        threshold = config.threshold,
        parties = config.parties,
        "loaded protocol configuration"
    );
    Ok(config)
}

fn run_round(config: &ProtocolConfig, args: &Args) -> Result<RoundSummary> {
    if args.meters == 0 {
        bail!("at least one meter is required");
    }
    if !args.readings.is_empty() && args.readings.len() != args.meters {
        bail!(
            "expected {} readings (one per meter), received {}",
            args.meters,
            args.readings.len()
        );
    }

    let mut rng = match args.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let params = config.public_parameters::<Curve>();

    // trusted setup
    let (setup, shares) = keygen_threshold(&params, config.threshold, config.parties, &mut rng)
        .context("threshold key generation failed")?;

    // registration
    let meters: Vec<_> = (0..args.meters).map(|_| keygen(&params, &mut rng)).collect();
    let mut registrations = BulletinBoard::new(format!("{}/registrations", config.shuffle_context));
    for (i, meter) in meters.iter().enumerate() {
        registrations.publish(Registration::new(&params, format!("meter-{i}"), meter, &mut rng));
    }

    // anonymization
    let anonymized = anonymize_identities(&params, config, registrations.entries(), &mut rng)
        .context("identity shuffle failed")?;
    if !anonymized.verify(&params, config)? {
        bail!("identity shuffle proof did not verify");
    }
    info!(target: LOG_TARGET, keys = anonymized.outputs.len(), "published anonymized identities");

    // reporting
    let readings: Vec<u64> = if args.readings.is_empty() {
        (0..args.meters).map(|_| rng.gen_range(0..500)).collect()
    } else {
        args.readings.clone()
    };
    let mut reports = BulletinBoard::new(format!("{}/reports", config.shuffle_context));
    for (timestamp, (meter, reading)) in meters.iter().zip(&readings).enumerate() {
        let report = SignedReport::create(
            &params,
            config,
            meter,
            &setup.public_key,
            timestamp as u64,
            *reading,
            &mut rng,
        )
        .with_context(|| format!("meter {timestamp} could not file its report"))?;
        reports.publish(report);
    }
    let checked = verify_reports(&params, reports.entries());
    if !checked.is_valid() {
        warn!(target: LOG_TARGET, failed = ?checked.failed, "some reports carry bad signatures");
    }

    // aggregation and PET against the target
    let total_ct = aggregate_reports(reports.entries()).context("aggregation failed")?;
    let true_total = total_readings(&readings)?;
    let target = args.target.unwrap_or(true_total);
    let target_ct = encrypt_single(&params, &setup.public_key, target, &mut rng);
    let evaluation = PetEvaluation::evaluate(&params, total_ct, vec![target_ct], &mut rng)?;

    let holders = &shares[..config.threshold];
    let share_proofs: Vec<Vec<_>> = holders
        .iter()
        .map(|share| {
            evaluation
                .blinded
                .iter()
                .map(|ct| prove_partial_share(&params, ct, share, &mut rng))
                .collect()
        })
        .collect();
    let outcome = evaluation
        .decide(&params, &setup, &share_proofs)
        .context("PET decision aborted")?;
    let target_met = *outcome
        .first()
        .ok_or_else(|| anyhow!("PET returned no outcome"))?;
    info!(target: LOG_TARGET, target, target_met, "PET decided");

    // plaintext total for the placeholder baseline comparison
    let partials: Vec<_> = holders
        .iter()
        .map(|share| share.partial_decrypt_single(&total_ct))
        .collect();
    let total_point = combine_single(&setup, &partials, &total_ct)?;
    let table = DiscreteLogTable::new(&params, config.discrete_log_bound)
        .context("discrete-log table construction failed")?;
    let total = table
        .lookup(&total_point)
        .context("aggregate exceeds the discrete-log bound")?;

    Ok(RoundSummary {
        meters: args.meters,
        rejected_registrations: anonymized.rejected,
        rejected_reports: checked.failed,
        target,
        target_met,
        total,
        below_baseline: ord_comparison(total, args.baseline),
    })
}

fn total_readings(readings: &[u64]) -> Result<u64> {
    readings
        .iter()
        .try_fold(0u64, |acc, reading| acc.checked_add(*reading))
        .ok_or_else(|| anyhow!("readings overflow a 64-bit total"))
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_timer(Uptime::default())
        .with_writer(std::io::stderr);
    if json {
        builder
            .json()
            .try_init()
            .map_err(|err| anyhow!("failed to initialize tracing subscriber: {err}"))?;
    } else {
        builder
            .try_init()
            .map_err(|err| anyhow!("failed to initialize tracing subscriber: {err}"))?;
    }
    Ok(())
}
