//! kvcheck binary — drive a full verification scenario against kvdb.
//!
//! Brings the server up, populates it with randomized records, restarts it,
//! verifies every record survived byte-for-byte, deletes everything, and
//! exits 0 only if every phase finished with zero failures. Fatal harness
//! errors (server never ready, lifecycle command failed) exit with 2.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kvcheck::{
    render, CliStore, ClientConfig, FailurePolicy, Lifecycle, LifecycleConfig, Result,
    ScenarioConfig, ScenarioRunner, ServerGuard, ServerLifecycle, SizeBounds, Verdict,
};

const DEFAULT_CLIENT: &str = "kvdb_cli";
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5001;
const DEFAULT_COUNT: usize = 1000;
const DEFAULT_KEY_MIN: usize = 500;
const DEFAULT_KEY_MAX: usize = 1024;
const DEFAULT_VALUE_MIN: usize = 1024 * 40;
const DEFAULT_VALUE_MAX: usize = 1024 * 50;
const DEFAULT_START_CMD: &str = "docker-compose up -d server";
const DEFAULT_STOP_CMD: &str = "docker-compose stop";

/// Build the complete CLI command tree.
fn build_cli() -> Command {
    Command::new("kvcheck")
        .about("Randomized correctness and durability harness for kvdb")
        .arg(
            Arg::new("client")
                .long("client")
                .help("Path to the kvdb_cli binary (default: kvdb_cli)"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .help("Server hostname (default: localhost)"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_parser(value_parser!(u16))
                .help("Server port (default: 5001)"),
        )
        .arg(
            Arg::new("count")
                .long("count")
                .value_parser(value_parser!(usize))
                .help("Number of records to insert (default: 1000)"),
        )
        .arg(
            Arg::new("key-min")
                .long("key-min")
                .value_parser(value_parser!(usize))
                .help("Minimum key length in bytes, inclusive (default: 500)"),
        )
        .arg(
            Arg::new("key-max")
                .long("key-max")
                .value_parser(value_parser!(usize))
                .help("Maximum key length in bytes, exclusive (default: 1024)"),
        )
        .arg(
            Arg::new("value-min")
                .long("value-min")
                .value_parser(value_parser!(usize))
                .help("Minimum value length in bytes, inclusive (default: 40 KiB)"),
        )
        .arg(
            Arg::new("value-max")
                .long("value-max")
                .value_parser(value_parser!(usize))
                .help("Maximum value length in bytes, exclusive (default: 50 KiB)"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .help("Workload seed; omit for a random seed (always logged)"),
        )
        .arg(
            Arg::new("start-cmd")
                .long("start-cmd")
                .help("Command that starts the server (default: docker-compose up -d server)"),
        )
        .arg(
            Arg::new("stop-cmd")
                .long("stop-cmd")
                .help("Command that stops the server (default: docker-compose stop)"),
        )
        .arg(
            Arg::new("settle-ms")
                .long("settle-ms")
                .value_parser(value_parser!(u64))
                .help("Delay after server start before the first probe (default: 500)"),
        )
        .arg(
            Arg::new("ready-timeout-secs")
                .long("ready-timeout-secs")
                .value_parser(value_parser!(u64))
                .help("Budget for the server to answer a probe (default: 30)"),
        )
        .arg(
            Arg::new("op-timeout-secs")
                .long("op-timeout-secs")
                .value_parser(value_parser!(u64))
                .help("Deadline per client invocation (default: 120)"),
        )
        .arg(
            Arg::new("stop-on-failure")
                .long("stop-on-failure")
                .action(ArgAction::SetTrue)
                .help("Abort population on the first failed insert"),
        )
}

struct HarnessConfig {
    client: ClientConfig,
    lifecycle: LifecycleConfig,
    scenario: ScenarioConfig,
}

fn matches_to_config(matches: &ArgMatches) -> Result<HarnessConfig> {
    let client = ClientConfig {
        program: matches
            .get_one::<String>("client")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CLIENT)),
        host: matches
            .get_one::<String>("host")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: matches.get_one::<u16>("port").copied().unwrap_or(DEFAULT_PORT),
        op_timeout: Duration::from_secs(
            matches
                .get_one::<u64>("op-timeout-secs")
                .copied()
                .unwrap_or(120),
        ),
    };

    let lifecycle = LifecycleConfig {
        start: split_command(
            matches
                .get_one::<String>("start-cmd")
                .map(String::as_str)
                .unwrap_or(DEFAULT_START_CMD),
        ),
        stop: split_command(
            matches
                .get_one::<String>("stop-cmd")
                .map(String::as_str)
                .unwrap_or(DEFAULT_STOP_CMD),
        ),
        settle: Duration::from_millis(
            matches.get_one::<u64>("settle-ms").copied().unwrap_or(500),
        ),
        ready_timeout: Duration::from_secs(
            matches
                .get_one::<u64>("ready-timeout-secs")
                .copied()
                .unwrap_or(30),
        ),
        poll_interval: Duration::from_millis(250),
    };
    lifecycle.validate()?;

    let scenario = ScenarioConfig {
        records: matches
            .get_one::<usize>("count")
            .copied()
            .unwrap_or(DEFAULT_COUNT),
        key_len: SizeBounds::new(
            matches
                .get_one::<usize>("key-min")
                .copied()
                .unwrap_or(DEFAULT_KEY_MIN),
            matches
                .get_one::<usize>("key-max")
                .copied()
                .unwrap_or(DEFAULT_KEY_MAX),
        )?,
        value_len: SizeBounds::new(
            matches
                .get_one::<usize>("value-min")
                .copied()
                .unwrap_or(DEFAULT_VALUE_MIN),
            matches
                .get_one::<usize>("value-max")
                .copied()
                .unwrap_or(DEFAULT_VALUE_MAX),
        )?,
        seed: matches
            .get_one::<u64>("seed")
            .copied()
            .unwrap_or_else(rand::random),
        failure_policy: if matches.get_flag("stop-on-failure") {
            FailurePolicy::StopOnFirst
        } else {
            FailurePolicy::ContinueThrough
        },
    };
    scenario.validate()?;

    Ok(HarnessConfig {
        client,
        lifecycle,
        scenario,
    })
}

/// Whitespace-split a lifecycle command into argv. No shell is involved.
fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

fn run(matches: &ArgMatches) -> Result<i32> {
    let config = matches_to_config(matches)?;
    info!(
        target: "kvcheck",
        seed = config.scenario.seed,
        records = config.scenario.records,
        "starting run"
    );

    let lifecycle = ServerLifecycle::new(config.lifecycle)?;
    let mut store = CliStore::new(config.client);

    let guard = ServerGuard::start(&lifecycle)?;
    lifecycle.await_ready(&mut store)?;

    let tallies = ScenarioRunner::new(&mut store, &lifecycle, &config.scenario).run()?;

    // Stop the server before reporting; the guard would do it anyway, but
    // the report should describe a finished run.
    drop(guard);

    print!("{}", render(&tallies, config.scenario.seed));
    Ok(Verdict::of(&tallies).exit_code())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let matches = build_cli().get_matches();
    let code = match run(&matches) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("kvcheck: {e}");
            2
        }
    };
    process::exit(code);
}
