//! Navigation executable entry point.
//!
//! # Architecture
//!
//! The executable runs the navigation core against the simulated platform:
//!
//!     - Initialise the session, logger and modules
//!     - Start the background threads:
//!         - Sensor: feeds obstacle clusters from the simulation into the
//!           local planner's cache
//!         - Local nav: periodically checks the path ahead of the rover and
//!           interrupts navigation when an obstacle is close
//!     - Main loop, once per cycle:
//!         - Pass due script commands to navigation
//!         - Step the navigation state machine
//!     - Once the script has finished and navigation is idle, stop the
//!       threads and save the executed trajectory into the session.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, error, info, trace};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use structopt::StructOpt;

// Internal
use comms_if::pubsub::latest;
use nav_lib::{
    local_nav::{LocalNavNode, LocalPlanner},
    motion_ctrl::{NavCtrl, Platform},
    sim::{SharedSim, SimRover},
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    script_interpreter::{PendingCmds, ScriptInterpreter},
    session::Session,
    time::seconds_to_std,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Period of the simulated obstacle sensor.
const SENSOR_PERIOD_S: f64 = 0.2;

/// Script run when none is given, relative to the software root.
const DEFAULT_SCRIPT: &str = "scripts/demo.nav";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "nav_exec", about = "Local navigation on a simulated rover")]
struct Opt {
    /// Navigation command script to run, defaults to the demo script
    #[structopt(short, long, parse(from_os_str))]
    script: Option<PathBuf>,

    /// Minimum level to log at, one of info, debug or trace
    #[structopt(long, default_value = "debug")]
    log_level: LevelFilter,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("nav_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(opt.log_level, &session).wrap_err("Failed to initialise logging")?;

    info!("SkyNav Navigation Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD SCRIPT ----

    let script_path = match opt.script {
        Some(p) => p,
        None => host::get_skynav_sw_root()
            .wrap_err("Software root is not set, cannot find the default script")?
            .join(DEFAULT_SCRIPT),
    };

    info!("Loading script from {:?}", script_path);

    let mut script = ScriptInterpreter::new(&script_path).wrap_err("Failed to load script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} commands\n",
        script.get_duration(),
        script.get_num_cmds()
    );

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let sim = SharedSim::new(SimRover::init("sim.toml").wrap_err("Failed to initialise the simulation")?);
    info!("Simulation init complete");

    let planner = LocalPlanner::init("local_nav.toml").wrap_err("Failed to initialise LocalPlanner")?;
    info!("LocalPlanner init complete");

    let mut nav = NavCtrl::init("motion_ctrl.toml").wrap_err("Failed to initialise NavCtrl")?;
    info!("NavCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- START THREADS ----

    let stop = Arc::new(AtomicBool::new(false));

    let sensor_jh = {
        let sim = sim.clone();
        let planner = planner.clone();
        let stop = stop.clone();

        thread::Builder::new()
            .name("sensor".into())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    planner.update_obstacles(sim.sense_obstacles());
                    thread::sleep(seconds_to_std(SENSOR_PERIOD_S));
                }
            })
            .wrap_err("Failed to start the sensor thread")?
    };

    let node_jh = {
        let node = LocalNavNode::new(planner.clone(), &nav);
        let period_s = planner.params().check_period_s;
        let mut loc = sim.clone();
        let stop = stop.clone();

        thread::Builder::new()
            .name("local_nav".into())
            .spawn(move || node.run(&mut loc, period_s, &stop))
            .wrap_err("Failed to start the local nav thread")?
    };

    info!("Background threads started");

    // ---- MAIN LOOP ----

    let handle = nav.handle();
    let outlines = planner.subscribe_outlines();
    let mut platform = sim.clone();
    let mut checker = planner.clone();
    let cycle_period_s = nav.params().cycle_period_s;

    info!("Beginning main loop\n");

    let result = loop {
        match script.get_pending_cmds(platform.elapsed_s()) {
            PendingCmds::None => (),
            PendingCmds::Some(cmds) => {
                for cmd in cmds {
                    info!("Script command: {:?}", cmd);
                    handle.send(cmd);
                }
            }
            PendingCmds::EndOfScript => {
                if nav.is_idle() {
                    info!("End of script reached and navigation is idle, stopping");
                    break Ok(());
                }
            }
        }

        if let Err(e) = nav.step(&mut platform, &mut checker) {
            break Err(e);
        }

        if let Some(o) = latest(&outlines) {
            debug!("Tracking {} obstacle outline(s)", o.len());
        }

        match serde_json::to_string(&nav.get_tm()) {
            Ok(tm) => trace!("NavTm: {}", tm),
            Err(e) => error!("Could not serialise the NavTm: {}", e),
        }

        platform.sleep(cycle_period_s);
    };

    // ---- SHUTDOWN ----

    stop.store(true, Ordering::Relaxed);

    match node_jh.join() {
        Ok(Ok(())) => (),
        Ok(Err(e)) => error!("Local nav thread stopped early: {}", e),
        Err(_) => error!("Local nav thread panicked"),
    }

    if sensor_jh.join().is_err() {
        error!("Sensor thread panicked");
    }

    let trajectory = sim.trajectory();
    let traj_path = session
        .save_json("trajectory.json", &trajectory)
        .wrap_err("Failed to save the trajectory")?;
    info!("{} trajectory samples saved to {:?}", trajectory.len(), traj_path);

    result.wrap_err("Navigation failed")?;

    info!("End of execution");

    Ok(())
}
