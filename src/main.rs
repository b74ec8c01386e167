use kiosk_enroll::{
    common::{Config, DevMode},
    core::{FrameSize, QualityGate},
    service::{CredentialToken, LocalBackend},
    simulation::{Scenario, ScriptedAnalyzer, SyntheticCamera},
    storage::EnrollmentStore,
    workflow::{Collaborators, EnrollmentWorkflow, SessionOutcome, WorkflowPhase, WorkflowView},
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "kiosk-enroll")]
#[command(about = "Kiosk face enrollment pipeline")]
struct Cli {
    /// Enable development mode (saves data locally for testing)
    #[arg(long, global = true)]
    dev: bool,

    /// Config file to load instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one enrollment session against a synthetic camera
    Simulate {
        /// Card token to tap
        #[arg(short, long)]
        card: String,
        /// steady, too-far, smiling or jittery
        #[arg(short, long, default_value = "steady")]
        scenario: Scenario,
        /// Confirm re-enrollment if the card holder is already enrolled
        #[arg(long)]
        reenroll: bool,
        /// Give up and cancel after this many seconds
        #[arg(long, default_value = "20")]
        timeout_secs: u64,
    },
    /// Validate the config and print the effective thresholds
    CheckConfig,
    /// Delete a stored enrollment
    Forget {
        #[arg(short, long)]
        id: String,
    },
    /// Show a stored enrollment
    Show {
        #[arg(short, long)]
        id: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on mode
    setup_logging(cli.dev);

    let dev_mode = DevMode::new(cli.dev)?;
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate { card, scenario, reenroll, timeout_secs } => {
            let store = open_store(&config, &dev_mode)?;
            simulate(config, store, &dev_mode, card, scenario, reenroll, timeout_secs).await?;
        }
        Commands::CheckConfig => print_config(&config),
        Commands::Forget { id } => {
            let store = open_store(&config, &dev_mode)?;
            if store.delete(&id)? {
                println!("✅ Removed enrollment for {}", id);
            } else {
                println!("No enrollment stored for {}", id);
            }
        }
        Commands::Show { id } => {
            let store = open_store(&config, &dev_mode)?;
            let record = store.get(&id)?;
            println!("Identity:   {} ({})", record.identity.name, record.identity.username);
            println!("Enrolled:   {}", record.enrolled_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("Descriptor: {} values", record.descriptor.len());
            println!("Stored in:  {}", store.data_dir().display());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load_from_path(path)?),
        None => match Config::load() {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("{}; using built-in defaults", e);
                Ok(Config::default())
            }
        },
    }
}

fn open_store(config: &Config, dev_mode: &DevMode) -> Result<EnrollmentStore> {
    let store = match &config.storage.data_dir {
        Some(dir) => EnrollmentStore::new_with_path(dir.clone())?,
        None => EnrollmentStore::new_with_dev_mode(dev_mode)?,
    };
    Ok(store)
}

async fn simulate(
    config: Config,
    store: EnrollmentStore,
    dev_mode: &DevMode,
    card: String,
    scenario: Scenario,
    reenroll: bool,
    timeout_secs: u64,
) -> Result<()> {
    println!("Simulating enrollment ({} scenario)", scenario);

    let frame = FrameSize::new(640, 480);
    let deps = Collaborators {
        backend: Arc::new(LocalBackend::new(store, &config.cards, dev_mode.telemetry_dir())),
        analyzer: Arc::new(ScriptedAnalyzer::with_model_delay(scenario, 3)),
        video: Arc::new(SyntheticCamera::new(frame, 5)),
        quality: Arc::new(QualityGate::new(&config.quality)),
    };

    let (workflow, handle) = EnrollmentWorkflow::new(config, deps);
    let session = tokio::spawn(workflow.run());
    let mut views = handle.subscribe();
    handle.tap_credential(CredentialToken::new(card));

    let deadline = tokio::time::sleep(Duration::from_secs(timeout_secs));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                print_view(&view);
                match view.phase {
                    WorkflowPhase::ExistingEnrollmentConflict if reenroll => handle.confirm_reenroll(),
                    WorkflowPhase::ExistingEnrollmentConflict => {
                        println!("Already enrolled; pass --reenroll to replace it");
                        handle.decline_reenroll();
                    }
                    WorkflowPhase::Error => handle.cancel(),
                    _ => {}
                }
            }
            _ = &mut deadline => {
                println!("⚠️  No capture after {}s, cancelling", timeout_secs);
                handle.cancel();
                break;
            }
        }
    }

    let report = session.await?;
    match &report.outcome {
        SessionOutcome::Enrolled(identity) => {
            println!("✅ Enrolled {} ({})", identity.name, identity.username);
        }
        SessionOutcome::Cancelled => println!("❌ Cancelled"),
        SessionOutcome::Closed => println!("❌ Closed"),
    }
    let path: Vec<String> = report.history.iter().map(|p| p.to_string()).collect();
    println!("Path: {}", path.join(" -> "));

    Ok(())
}

fn print_view(view: &WorkflowView) {
    match (view.phase, &view.guidance, &view.error) {
        (_, _, Some(error)) => println!("[{}] {}", view.phase, error),
        (WorkflowPhase::Scanning, Some(guidance), _) => {
            println!("[{}] {} ({:.0}%)", view.phase, guidance, view.hold_progress * 100.0)
        }
        _ => println!("[{}]", view.phase),
    }
}

fn print_config(config: &Config) {
    let p = &config.position;
    let h = &config.hold_still;
    let w = &config.warmup;
    println!("✅ Config is valid\n");
    println!("Face size ratio:   {:.2} - {:.2}", p.min_face_ratio, p.max_face_ratio);
    println!("Center offset:     < {:.2}", p.max_center_offset);
    println!("Max yaw / pitch:   {}° / {}°", p.max_yaw_degrees, p.max_pitch_degrees);
    println!("Circle:            {:.2} x {:.2}", p.circle_ratio, p.inner_circle_factor);
    println!("Hold still:        {} good ticks every {} ms, {} bad tolerated",
        h.required_good_ticks, h.tick_interval_ms, h.bad_tick_tolerance);
    println!("Min quality:       {:.2}", config.quality.min_capture_quality);
    println!("Warm-up:           camera {} / models {} polls every {} ms",
        w.camera_poll_budget, w.model_poll_budget, w.poll_interval_ms);
    println!("Cards:             {}", config.cards.len());
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }
}
