use std::io::{self, BufRead, ErrorKind, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use env_logger::Env;

use stopwatch::error::Result;
use stopwatch::ui::{self, Controls};
use stopwatch::{
    format_stopwatch, ui_context, MonotonicClock, Settings, StopwatchError, StopwatchView,
    TimerEngine, TimerObserver,
};

const APP_NAME: &str = "Stopwatch";

#[derive(Parser, Debug)]
#[command(name = "stopwatch", version, about = "Terminal stopwatch with laps")]
struct Args {
    /// Settings file (TOML)
    #[arg(long, default_value = "stopwatch.toml")]
    config: PathBuf,

    /// Write the effective settings to the config file and exit
    #[arg(long)]
    write_config: bool,
}

/// Redraws the time line in place from the view's latest state.
struct TerminalDisplay {
    view: Arc<StopwatchView>,
}

impl TimerObserver for TerminalDisplay {
    fn on_tick(&self, _elapsed_ms: u64) {
        let mut out = io::stdout().lock();
        let _ = write!(out, "{}", ui::draw_time_line(&self.view.snapshot()));
        let _ = out.flush();
    }

    fn on_state_changed(&self, running: bool, paused: bool) {
        let state = self.view.snapshot();
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{}", ui::draw_time_line(&state));
        let _ = writeln!(out, "  {}", Controls::from_flags(running, paused).footer());
    }
}

/// Returns `false` when the user asked to quit.
fn handle_key(key: char, engine: &TimerEngine, view: &StopwatchView) -> bool {
    let controls = Controls::from_flags(engine.is_running(), engine.is_paused());
    match key {
        '\n' => {
            if controls.pause {
                view.press_pause(engine);
            } else {
                view.press_start(engine);
            }
        }
        's' if controls.start => view.press_start(engine),
        'p' if controls.pause => view.press_pause(engine),
        'x' if controls.stop => view.press_stop(engine),
        'l' if controls.lap => {
            if let Some(split) = view.press_lap(engine) {
                let n = view.snapshot().laps.len();
                println!("\nLap {:2}: {}", n, format_stopwatch(split));
            }
        }
        'v' => println!("\n{}", ui::draw_laps(&view.snapshot())),
        'h' => println!("\n{}", ui::HELP_TEXT),
        'q' => return false,
        _ => log::debug!("ignored key {:?}", key),
    }
    true
}

fn run(settings: &Settings) -> Result<()> {
    let (ui, ui_loop) = ui_context();
    let engine = TimerEngine::with_config(
        ui,
        Arc::new(MonotonicClock::new()),
        settings.engine_config(),
    )?;

    let view = Arc::new(StopwatchView::new(settings.sync_ceiling_ms));
    let display = Arc::new(TerminalDisplay {
        view: Arc::clone(&view),
    });
    // The view must hear each notification before the display redraws from it
    engine.register_observer(&view);
    let display_id = engine.register_observer(&display);

    let ui_thread = ui_loop.spawn("stopwatch-ui")?;
    println!("{}\n{}", APP_NAME.to_uppercase(), ui::HELP_TEXT);

    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("failed to read input: {}", e);
                break;
            }
        };
        let key = line.trim().chars().next().unwrap_or('\n');
        if !handle_key(key, &engine, &view) {
            break;
        }
    }

    if let Some(id) = display_id {
        engine.unregister_observer(id);
    }
    engine.shutdown();
    drop(engine);
    if ui_thread.join().is_err() {
        log::error!("presentation thread panicked");
    }
    log::info!("{} exiting", APP_NAME);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let loaded = Settings::load(&args.config);
    let settings = loaded.as_ref().cloned().unwrap_or_default();
    env_logger::Builder::from_env(
        Env::new()
            .filter("STOPWATCH_LOG")
            .default_filter_or(settings.log_level.as_str()),
    )
    .init();

    match loaded {
        Ok(_) => log::info!("settings loaded from {}", args.config.display()),
        Err(StopwatchError::ReadSettings { ref source, .. })
            if source.kind() == ErrorKind::NotFound =>
        {
            log::debug!("no settings at {}, using defaults", args.config.display());
        }
        Err(e) => log::warn!("Failed to load settings: {}", e),
    }

    if args.write_config {
        return match settings.save(&args.config) {
            Ok(()) => {
                println!("wrote {}", args.config.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("Failed to save settings: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
