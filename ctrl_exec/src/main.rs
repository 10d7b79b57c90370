//! Lane follower log replay executable.
//!
//! # Architecture
//!
//! The replay stands in for the simulation or hardware driver. It feeds a
//! recorded vehicle state log through the lane follower, one row per control
//! cycle:
//!
//!     - Initialise the session, logging and parameters
//!     - Build, initialise and reset the controller
//!     - Main loop, per recorded state:
//!         - Step the controller
//!         - On an invalid state, apply the fail-safe zero command
//!         - Archive the command and diagnostics
//!         - Track lap completions
//!     - Report lap statistics
//!
//! The software root is taken from the `LANE_CTRL_SW_ROOT` environment
//! variable. Parameters are loaded from `$LANE_CTRL_SW_ROOT/params` and
//! sessions are written to `$LANE_CTRL_SW_ROOT/sessions`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use ctrl_lib::{
    lane_follower::{LaneFollower, LaneFollowerError, LaneFollowerParams},
    replay::{LapTimer, OutputRecord, StateRecord},
    vehicle::ActuationCommand
};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    module::Controller,
    session::Session
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Replay recorded vehicle states through the lane follower.
#[derive(Debug, StructOpt)]
#[structopt(name = "ctrl_exec")]
struct Opt {
    /// CSV log of vehicle states, with columns t_s, v_long_ms, x_tran_m,
    /// e_psi_rad and lap_num
    #[structopt(parse(from_os_str))]
    states: PathBuf,

    /// Parameter file, relative to the params directory
    #[structopt(short, long, default_value = "lane_follower.toml")]
    params: String,

    /// Pace each cycle to the controller period
    #[structopt(long)]
    realtime: bool,

    /// Log debug and trace messages from the controller
    #[structopt(short, long)]
    verbose: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<()> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("ctrl_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    let target_levels: &[(&'static str, LevelFilter)] = if opt.verbose {
        &[("ctrl_lib", LevelFilter::Trace), ("ctrl_exec", LevelFilter::Debug)]
    }
    else {
        &[]
    };
    logger_init(LevelFilter::Info, target_levels, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Lane Follower Replay\n");
    info!("Session directory: {:?}", session.session_root);
    debug!("CLI arguments: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let params: LaneFollowerParams = util::params::load(&opt.params)
        .wrap_err("Could not load lane follower params")?;
    session.save("params.json", &params)
        .wrap_err("Could not save the parameters to the session")?;

    info!("Parameters loaded from \"{}\"", opt.params);

    // ---- INITIALISE CONTROLLER ----

    let mut controller = LaneFollower::new(params)
        .wrap_err("Failed to create the LaneFollower")?;
    controller.initialize(())
        .wrap_err("Failed to initialise the LaneFollower")?;
    controller.reset();

    // The period has been checked by the controller
    let cycle_period = Duration::from_secs_f64(controller.params().dt_s);

    info!("LaneFollower init complete");

    let mut arch_output = Archiver::from_path(&session, "lane_follower/output.csv")
        .wrap_err("Failed to create the output archive")?;

    // ---- OPEN STATE LOG ----

    let mut reader = csv::Reader::from_path(&opt.states)
        .wrap_err_with(|| format!("Could not open the state log {:?}", opt.states))?;

    // ---- MAIN LOOP ----

    info!("Begining replay\n");

    let mut lap_timer = LapTimer::new();
    let mut num_cycles: u64 = 0;
    let mut num_rejected: u64 = 0;

    for record in reader.deserialize() {
        let cycle_start_instant = Instant::now();

        let record: StateRecord = record
            .wrap_err_with(|| format!("Could not read state log row {}", num_cycles + 1))?;
        let mut state = record.to_vehicle_state();

        // ---- CONTROL ----

        let output = match controller.step(&mut state) {
            Ok(cmd) => OutputRecord::from_cycle(record.t_s, cmd, &controller.report()),
            Err(e @ LaneFollowerError::InvalidState(_)) => {
                // Fail-safe: command nothing this cycle
                warn!("Cycle {} at t = {:.3} s: {}, commanding zero", num_cycles, record.t_s, e);
                state.u = ActuationCommand::ZERO;
                num_rejected += 1;
                OutputRecord::fail_safe(record.t_s, state.u)
            },
            Err(e) => return Err(e).wrap_err("LaneFollower processing failed")
        };

        arch_output.serialise(output)
            .wrap_err("Failed to archive the output")?;

        // ---- LAP TRACKING ----

        if let Some(lap_time_s) = lap_timer.update(record.lap_num, record.t_s) {
            info!("Lap {} completed in {:.2} s", lap_timer.lap_times_s().len(), lap_time_s);
        }

        // ---- CYCLE MANAGEMENT ----

        num_cycles += 1;

        if opt.realtime {
            let cycle_dur = Instant::now() - cycle_start_instant;

            match cycle_period.checked_sub(cycle_dur) {
                Some(d) => thread::sleep(d),
                None => warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                )
            }
        }
    }

    // ---- SHUTDOWN ----

    info!("Replayed {} cycles ({} rejected)", num_cycles, num_rejected);

    match lap_timer.stats() {
        Some((mean_s, std_s)) => info!(
            "Average lap time: {:.1} s. Std: {:.1} s. ({} laps)",
            mean_s, std_s, lap_timer.lap_times_s().len()
        ),
        None => info!("No complete laps in the state log")
    }

    info!("End of execution");

    Ok(())
}
