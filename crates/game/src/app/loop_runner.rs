use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use super::bootstrap::{self, AppWiring};

const TICK_INTERVAL: Duration = Duration::from_millis(250);

pub(crate) fn run() -> ExitCode {
    let app = match bootstrap::build_app() {
        Ok(app) => app,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };
    let lines = match spawn_stdin_reader() {
        Ok(lines) => lines,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    let stdout = io::stdout();
    if let Err(err) = run_loop(app, &lines, &mut stdout.lock()) {
        error!(error = %err, "console_output_failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn spawn_stdin_reader() -> io::Result<Receiver<String>> {
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if sender.send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "stdin_read_failed");
                        break;
                    }
                }
            }
        })?;
    Ok(receiver)
}

/// Runs until `quit` or until the input channel closes. Pending background
/// writes are flushed when the session is dropped on the way out.
pub(crate) fn run_loop(
    app: AppWiring,
    lines: &Receiver<String>,
    out: &mut impl Write,
) -> io::Result<()> {
    let AppWiring {
        mut session,
        autosave_interval,
    } = app;
    let mut next_autosave = autosave_interval.map(|interval| Instant::now() + interval);
    writeln!(out, "type 'help' for commands")?;

    loop {
        match lines.recv_timeout(TICK_INTERVAL) {
            Ok(line) => print_lines(out, session.handle_line(&line, Instant::now()))?,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("input_closed");
                break;
            }
        }

        let now = Instant::now();
        if let (Some(interval), Some(due)) = (autosave_interval, next_autosave) {
            if now >= due {
                print_lines(out, session.autosave(now))?;
                next_autosave = Some(now + interval);
            }
        }
        print_lines(out, session.tick(now))?;

        if session.quit_requested() {
            break;
        }
    }

    info!(entities = session.world().entity_count(), "shutdown");
    Ok(())
}

fn print_lines(out: &mut impl Write, lines: Vec<String>) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()
}
