use crate::config::{self, Dirs, Overrides};
use anyhow::{Context, Result};
use etude_core::{
    CaptureEngine, Command, Event, PracticeCore, SendOutcome, SessionError, SessionManager,
};
use etude_domain_score::resolve_name;
use etude_infra_http::{HttpAssistantService, HttpDataService};
use etude_infra_midi_midir::MidirMidiInputPort;
use etude_ports::types::{NotationSystem, Section};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};

const TICK_INTERVAL: Duration = Duration::from_millis(5);

const HELP: &str = "\
commands:
  send                  score the current attempt and send it
  clear                 discard the current attempt
  section <name>        intro | verse | chorus | bridge | outro
  notation <system>     letter | solfege
  key <pitch> [vel]     tap a key without hardware
  held                  show held notes
  devices               list MIDI inputs
  chat <text>           talk to the tutor
  history               show the tutor thread
  progress              session statistics
  diag <dir>            write a diagnostics bundle
  end                   end the practice session
  quit";

pub async fn run(dirs: &Dirs, overrides: Overrides) -> Result<()> {
    let resolved = config::resolve(dirs, overrides)?;

    let mut core = PracticeCore::with_settings(
        Box::new(MidirMidiInputPort::default()),
        Some(Box::new(dirs.storage())),
        resolved.settings.clone(),
    );
    core.start_capture()?;
    let engine = core.engine().clone();
    let printer = tokio::spawn(print_events(engine.subscribe()));

    let session = if resolved.offline {
        None
    } else {
        let data = HttpDataService::new(&resolved.settings.data_service_url, resolved.timeout)?;
        let assistant =
            HttpAssistantService::new(&resolved.settings.assistant_service_url, resolved.timeout)?;
        let manager = Arc::new(
            SessionManager::new(Arc::new(data), Arc::new(assistant), Arc::new(dirs.storage()))
                .with_bus(engine.bus().clone()),
        );
        core.attach_session(manager.clone());
        Some(manager)
    };

    if let Some(session) = session.as_ref() {
        match resolved.user.clone() {
            Some(user) => match session.start(user, resolved.reference.clone()).await {
                Ok(phase) => tracing::info!(?phase, "practice session ready"),
                Err(err) => eprintln!("could not start session: {}", err),
            },
            None => eprintln!("no user configured; pass --user to send performances"),
        }
    }

    let core = Arc::new(Mutex::new(core));
    let running = Arc::new(AtomicBool::new(true));
    let ticker = {
        let core = core.clone();
        let running = running.clone();
        thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                core.lock().tick();
                thread::sleep(TICK_INTERVAL);
            }
        })
    };

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        if matches!(verb, "quit" | "exit") {
            break;
        }
        if let Err(err) = dispatch(verb, rest, &core, &engine, session.as_deref()).await {
            eprintln!("error: {:#}", err);
        }
    }

    running.store(false, Ordering::Relaxed);
    let _ = ticker.join();
    core.lock().shutdown();
    printer.abort();
    Ok(())
}

async fn dispatch(
    verb: &str,
    rest: &str,
    core: &Mutex<PracticeCore>,
    engine: &CaptureEngine,
    session: Option<&SessionManager>,
) -> Result<()> {
    match verb {
        "help" => println!("{}", HELP),
        "send" => {
            let session = require(session)?;
            let section = core.lock().section();
            match session.send_performance(engine, section).await? {
                SendOutcome::Scored(scored) => {
                    if let Some(analysis) = scored.analysis.as_ref() {
                        for line in &analysis.feedback {
                            println!("tutor: {}", line);
                        }
                    }
                }
                SendOutcome::Discarded => println!("session ended; result discarded"),
            }
        }
        "clear" => core.lock().handle_command(Command::ClearPerformance)?,
        "section" => {
            let section = rest.parse::<Section>().map_err(anyhow::Error::msg)?;
            core.lock().handle_command(Command::SetSection { section })?;
        }
        "notation" => {
            let system = match rest {
                "letter" => NotationSystem::Letter,
                "solfege" => NotationSystem::Solfege,
                other => anyhow::bail!("unknown notation: {}", other),
            };
            core.lock().handle_command(Command::SetNotation { system })?;
        }
        "key" => {
            let mut args = rest.split_whitespace();
            let pitch: u8 = args.next().context("missing pitch")?.parse()?;
            let velocity: u8 = args.next().map(str::parse::<u8>).transpose()?.unwrap_or(90);
            let mut core = core.lock();
            for down in [true, false] {
                core.handle_command(Command::VirtualKey {
                    pitch,
                    velocity,
                    down,
                })?;
            }
        }
        "held" => {
            let notation = engine.notation();
            let names: Vec<String> = engine
                .active_notes()
                .into_iter()
                .filter_map(|pitch| resolve_name(pitch, notation).ok())
                .collect();
            println!("held: {}", names.join(" "));
        }
        "devices" => core.lock().handle_command(Command::ListMidiInputs)?,
        "chat" => {
            let reply = require(session)?.send_message(rest).await?;
            println!("tutor: {}", reply.to_line());
        }
        "history" => {
            for message in require(session)?.thread_history().await? {
                println!("[{}] {}", message.role, message.content);
            }
        }
        "progress" => {
            let progress = require(session)?.progress().await?;
            println!("{}", serde_json::to_string_pretty(&progress)?);
        }
        "diag" => {
            let path = if rest.is_empty() { "etude-diagnostics" } else { rest };
            core.lock().handle_command(Command::ExportDiagnostics {
                path: path.to_string(),
            })?;
            println!("diagnostics written to {}", path);
        }
        "end" => require(session)?.end().await?,
        other => anyhow::bail!("unknown command `{}` (try `help`)", other),
    }
    Ok(())
}

fn require(session: Option<&SessionManager>) -> Result<&SessionManager> {
    session.ok_or_else(|| SessionError::NoSession.into())
}

async fn print_events(mut rx: broadcast::Receiver<Event>) {
    loop {
        match rx.recv().await {
            Ok(event) => print_event(&event),
            Err(RecvError::Lagged(missed)) => tracing::debug!(missed, "event printer fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_event(event: &Event) {
    match event {
        Event::NoteAccepted { note, name } => {
            println!("{:<5} vel {:>3}  {:>7} ms", name, note.velocity, note.timestamp)
        }
        Event::InputAttached { device_id } => println!("input attached: {}", device_id),
        Event::InputDetached { device_id } => println!("input detached: {}", device_id),
        Event::CaptureUnavailable { reason } => {
            println!("MIDI capture unavailable ({}); use `key <pitch>` to play", reason)
        }
        Event::MidiInputsUpdated { devices } => {
            for device in devices {
                println!("  {}\t{}", device.id, device.name);
            }
        }
        Event::SectionChanged { section } => println!("section: {}", section),
        Event::PerformanceCleared => println!("attempt cleared"),
        Event::SessionStateUpdated { phase } => println!("session: {:?}", phase),
        Event::PerformanceScored {
            section, result, ..
        } => {
            let accuracy = result
                .accuracy
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{}: overall {} (accuracy {}, timing {}, dynamics {}) [{:?}]",
                section, result.overall_score, accuracy, result.timing, result.dynamics, result.mood
            );
            for line in &result.feedback {
                println!("  {}", line);
            }
        }
        Event::SettingsUpdated { .. } | Event::ActiveNotesUpdated { .. } => {}
    }
}
