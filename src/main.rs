use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use songforge::audio::host::{CpalHost, HostTransport};
use songforge::config::{PersistedState, Settings};
use songforge::kernel::job::JobParams;
use songforge::library::DiskLibrary;
use songforge::services::suno::{GenerationClient, Model, SunoClient};
use songforge::Orchestrator;

const HELP: &str = "commands: key <api-key> | generate <prompt> | cover <prompt> | vocals <prompt> | test \
| play | stop | segments | select <n> | trim <n> <start> [end] | rename <n> <name> | remove <n> \
| model <0-4> | status | quit";

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = Settings::from_env();
    tracing::info!("SongForge starting (library at {})", settings.library_dir.display());

    let client = SunoClient::new(&settings.api_base_url, &settings.upload_base_url, settings.request_timeout());
    let library = Arc::new(DiskLibrary::new(settings.library_dir.clone()));
    let (orchestrator, processor) =
        songforge::session::assemble(client, &settings, library, tokio::runtime::Handle::current());

    let state_path = state_file(&settings.library_dir);
    let mut restored = load_state(&state_path);
    if let Ok(key) = std::env::var("SONGFORGE_API_KEY") {
        restored.api_key = key;
    }
    orchestrator.restore_state(&restored);
    if !restored.api_key.is_empty() && orchestrator.check_connection().await {
        tracing::info!("Suno: connected");
    }

    let transport = Arc::new(HostTransport::new());
    // The host keeps the streams alive; dropping it stops audio.
    let _host = CpalHost::start(processor, transport.clone())?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    // None until the user picks one; each request type keeps its own default.
    let mut model: Option<Model> = None;
    println!("{HELP}");

    loop {
        tokio::select! {
            _ = orchestrator.completion_ready() => {
                if let Some(Err(e)) = orchestrator.complete_pending() {
                    println!("error: {e}");
                }
                println!("{}", orchestrator.status_text());
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if !handle_command(&orchestrator, &transport, &mut model, line).await {
                    break;
                }
            }
        }
    }

    orchestrator.shutdown().await;
    save_state(&state_path, &orchestrator.persisted_state());
    tracing::info!("SongForge stopped");
    Ok(())
}

/// The key lives next to the generations folder, not inside it.
fn state_file(library_dir: &Path) -> PathBuf {
    library_dir
        .parent()
        .unwrap_or(library_dir)
        .join("state.json")
}

fn load_state(path: &Path) -> PersistedState {
    match std::fs::read(path) {
        Ok(bytes) => PersistedState::from_bytes(&bytes),
        Err(_) => PersistedState::default(),
    }
}

fn save_state(path: &Path, state: &PersistedState) {
    let result = path
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|_| std::fs::write(path, state.to_bytes()));
    if let Err(e) = result {
        tracing::warn!("Could not save state to {}: {}", path.display(), e);
    }
}

/// Returns false when the user asked to quit.
async fn handle_command<C: GenerationClient>(
    orchestrator: &Orchestrator<C>,
    transport: &HostTransport,
    model: &mut Option<Model>,
    line: &str,
) -> bool {
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    let chosen = *model;
    let params = move |p: JobParams| p.with_model(chosen);
    let started = match cmd {
        "quit" | "exit" => return false,
        "key" => {
            orchestrator.set_api_key(rest);
            let ok = orchestrator.check_connection().await;
            println!("{}", if ok { "Suno: connected" } else { "Suno: key rejected" });
            None
        }
        "model" => {
            let picked = Model::from_index(rest.parse().unwrap_or(usize::MAX));
            *model = Some(picked);
            println!("model {}", picked.as_str());
            None
        }
        "generate" => Some(orchestrator.start_generate(params(JobParams::prompt(rest)))),
        "cover" => Some(orchestrator.start_cover(params(JobParams::prompt(rest)))),
        "vocals" => Some(orchestrator.start_add_vocals(params(JobParams::add_vocals(rest)))),
        "test" => Some(orchestrator.start_test_api()),
        "play" => {
            transport.set_playing(true);
            None
        }
        "stop" => {
            transport.set_playing(false);
            None
        }
        "segments" => {
            let selected = orchestrator.segments().selected_index();
            for (i, seg) in orchestrator.segments().list().iter().enumerate() {
                let mark = if Some(i) == selected { '*' } else { ' ' };
                println!("{mark}{i}: {} {:.2}s", seg.name, seg.duration_seconds);
            }
            None
        }
        "select" => {
            if !orchestrator.select_segment(rest.parse().ok()) {
                println!("no such segment");
            }
            None
        }
        "trim" => {
            let args: Vec<i64> = rest.split_whitespace().filter_map(|a| a.parse().ok()).collect();
            match args.as_slice() {
                [i, start, tail @ ..] if *i >= 0 => {
                    orchestrator.set_trim(*i as usize, *start, tail.first().copied());
                }
                _ => println!("usage: trim <n> <start> [end]"),
            }
            None
        }
        "rename" => {
            let (index, name) = rest.split_once(' ').unwrap_or((rest, ""));
            if let Ok(i) = index.parse() {
                orchestrator.rename_segment(i, name);
            }
            None
        }
        "remove" => {
            if let Ok(i) = rest.parse() {
                orchestrator.remove_segment(i);
            }
            None
        }
        "status" => {
            let snap = orchestrator.snapshot();
            let bpm = snap.host_bpm.map(|b| format!("{b:.1}")).unwrap_or_else(|| "-".to_string());
            println!(
                "{:?} | {} | connected={} | bpm={} | segments={}",
                snap.state,
                snap.status_text,
                snap.connected,
                bpm,
                snap.segments.len()
            );
            None
        }
        _ => {
            println!("{HELP}");
            None
        }
    };

    match started {
        Some(Ok(id)) => println!("job {id} started"),
        Some(Err(e)) => println!("not started: {e}"),
        None => {}
    }
    true
}
