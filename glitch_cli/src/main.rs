use glitch_core::config::GlitchConfig;
use glitch_core::corruptor::{CorruptRequest, Corruptor, Outcome};
use glitch_core::disk::DiskSession;
use glitch_core::host::Host;
use glitch_core::logging;
use glitch_core::mutator::Mode;
use glitch_core::target::Target;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::info;
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, value_parser)]
    config: Option<PathBuf>,
    /// Overrides the seed from the config file.
    #[clap(long)]
    seed: Option<u64>,
    /// Print the result as JSON.
    #[clap(long)]
    json: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Corrupt the ROM found in a directory, in place.
    Rom {
        #[clap(long)]
        dir: PathBuf,
        #[clap(short, long, default_value = "byteinject")]
        mode: String,
        #[clap(short = 'n', long, default_value_t = 16.0)]
        count: f64,
    },
    /// Corrupt a save-state file as a CPU snapshot.
    State {
        #[clap(short, long)]
        input: PathBuf,
        #[clap(short, long)]
        output: PathBuf,
        #[clap(short, long, default_value = "bitflip")]
        mode: String,
        #[clap(short = 'n', long, default_value_t = 64.0)]
        count: f64,
        /// Mutation passes applied before the state is written once.
        #[clap(long, default_value_t = 1)]
        times: usize,
    },
    /// List the corruption modes and which targets accept them.
    Modes,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<GlitchConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {path:?}");
            GlitchConfig::load_from_file(path)
        }
        None => {
            let default_path = PathBuf::from("glitch.toml");
            if default_path.exists() {
                info!("No config file specified, loading default: {default_path:?}");
                GlitchConfig::load_from_file(&default_path)
            } else {
                info!("No config file and no glitch.toml, using built-in defaults");
                Ok(GlitchConfig::default())
            }
        }
    }
}

fn list_modes(as_json: bool) -> anyhow::Result<()> {
    let rows: Vec<(Mode, Vec<Target>)> = Mode::ALL
        .into_iter()
        .map(|mode| {
            let targets = Target::ALL
                .into_iter()
                .filter(|target| target.allows(mode))
                .collect();
            (mode, targets)
        })
        .collect();
    if as_json {
        let value: Vec<_> = rows
            .iter()
            .map(|(mode, targets)| json!({ "mode": mode, "targets": targets }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    for (mode, targets) in rows {
        let names: Vec<&str> = targets.iter().map(|t| t.name()).collect();
        println!("{:<14} {}", mode.name(), names.join(", "));
    }
    Ok(())
}

fn corrupt_rom(
    corruptor: &mut Corruptor,
    dir: &Path,
    mode: &str,
    count: f64,
    as_json: bool,
) -> anyhow::Result<()> {
    if !dir.is_dir() {
        bail!("{dir:?} is not a directory");
    }
    let mut session = DiskSession::rom_dir(dir);
    let mut host = Host::none().with_session(&mut session);
    let request = CorruptRequest::new(mode, count).target("rom");

    let Outcome::RomRewritten(report) = corruptor.corrupt(&mut host, &request) else {
        bail!("no ROM in {dir:?} could be corrupted");
    };
    if !report.written {
        bail!("failed to write the corrupted ROM back to {}", report.path);
    }
    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{}: {} rows corrupted with {} ({} -> {})",
            report.path,
            report.rows.len(),
            report.mode,
            report.digest_before,
            report.digest_after
        );
    }
    Ok(())
}

fn corrupt_state(
    corruptor: &mut Corruptor,
    input: &Path,
    output: &Path,
    mode: &str,
    count: f64,
    times: usize,
    as_json: bool,
) -> anyhow::Result<()> {
    let mut session = DiskSession::state_files(input, output);
    let mut host = Host::none().with_session(&mut session);
    let request = CorruptRequest::new(mode, count).target("cpu");

    let pending = match corruptor.corrupt_batch(&mut host, &request, times) {
        Outcome::PendingReload(pending) => pending,
        other => bail!("could not corrupt state from {input:?}: {other:?}"),
    };
    let len = pending.state().len();
    std::thread::sleep(pending.delay());
    if !corruptor.complete(&mut host, pending) {
        bail!("failed to write corrupted state to {output:?}");
    }

    let mode = Target::Cpu.resolve_mode(mode);
    let count = corruptor.governor().safe_count(count, len);
    if as_json {
        let summary = json!({
            "input": input,
            "output": output,
            "mode": mode,
            "count": count,
            "passes": times.max(1),
            "bytes": len,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{output:?}: {len} bytes, {mode} x{count}, {} pass(es)",
            times.max(1)
        );
    }
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    logging::init();

    let mut config = load_config(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    config.validate()?;
    log::debug!("Effective configuration: {config:#?}");

    let mut corruptor = Corruptor::new(config);
    match cli.command {
        Command::Modes => list_modes(cli.json),
        Command::Rom { dir, mode, count } => {
            corrupt_rom(&mut corruptor, &dir, &mode, count, cli.json)
        }
        Command::State {
            input,
            output,
            mode,
            count,
            times,
        } => corrupt_state(
            &mut corruptor,
            &input,
            &output,
            &mode,
            count,
            times,
            cli.json,
        ),
    }
}
