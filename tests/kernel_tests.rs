use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;

use songforge::config::{default_config_path, PersistedState, Settings};
use songforge::kernel::error::JobError;
use songforge::kernel::job::{Job, JobKind, JobParams};
use songforge::kernel::orchestrator::OrchestratorConfig;
use songforge::kernel::state::{JobState, JobStateCell};
use songforge::kernel::status::{StatusBoard, INITIAL_STATUS};
use songforge::services::suno::client::parse_record_info;
use songforge::services::suno::{Model, SubmitRequest, TaskPhase, TaskStatus};

#[test]
fn test_state_cell_lifecycle() {
    let cell = JobStateCell::new();
    assert_eq!(cell.load(), JobState::Idle);

    assert_eq!(cell.try_begin(), Ok(JobState::Idle));
    assert_eq!(cell.load(), JobState::Submitting);
    assert_eq!(cell.try_begin(), Err(JobState::Submitting));

    assert!(cell.mark_running());
    assert!(cell.mark_running());
    assert_eq!(cell.try_begin(), Err(JobState::Running));

    assert!(cell.finish(JobState::Succeeded));
    assert!(!cell.finish(JobState::Failed));
    assert_eq!(cell.load(), JobState::Succeeded);

    assert_eq!(cell.try_begin(), Ok(JobState::Succeeded));
    assert!(cell.finish(JobState::Failed));
    assert_eq!(cell.try_begin(), Ok(JobState::Failed));
}

#[test]
fn test_state_cell_transition_is_compare_and_swap() {
    let cell = JobStateCell::new();
    assert!(!cell.transition(JobState::Running, JobState::Failed));
    assert_eq!(cell.load(), JobState::Idle);
    assert!(!cell.mark_running());

    assert!(JobState::Submitting.is_busy());
    assert!(JobState::Running.is_busy());
    assert!(!JobState::Failed.is_busy());
}

#[test]
fn test_only_one_concurrent_begin_wins() {
    let cell = std::sync::Arc::new(JobStateCell::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cell = cell.clone();
            std::thread::spawn(move || cell.try_begin().is_ok())
        })
        .collect();
    let wins = handles.into_iter().map(|h| h.join().unwrap()).filter(|&w| w).count();
    assert_eq!(wins, 1);
}

#[test]
fn test_status_board_tracks_errors() {
    let board = StatusBoard::new();
    assert_eq!(board.text(), INITIAL_STATUS);
    assert_eq!(board.last_error(), None);
    assert!(!board.is_connected());

    board.fail(&JobError::Remote("content policy".into()));
    assert_eq!(board.text(), "content policy");
    assert_eq!(board.last_error().as_deref(), Some("content policy"));

    board.set_status("Generating…");
    assert_eq!(board.last_error().as_deref(), Some("content policy"));

    board.begin("Submitting…");
    assert_eq!(board.text(), "Submitting…");
    assert_eq!(board.last_error(), None);

    board.set_connected(true);
    assert!(board.is_connected());
}

#[test]
fn test_error_messages_read_well() {
    assert_eq!(JobError::Configuration.to_string(), "No API key");
    assert_eq!(
        JobError::NoAudio("empty response".into()).to_string(),
        "No audio received: empty response"
    );
    assert!(JobError::Timeout(Duration::from_secs(900)).to_string().contains("900"));
}

#[test]
fn test_task_status_tokens() {
    let status = |s: &str| TaskStatus {
        status: s.to_string(),
        ..TaskStatus::default()
    };
    assert_eq!(status("SUCCESS").phase(), TaskPhase::Succeeded);
    assert_eq!(status("success").phase(), TaskPhase::Succeeded);
    assert_eq!(status("CREATE_TASK_FAILED").phase(), TaskPhase::Failed);
    assert_eq!(status("GENERATE_AUDIO_FAILED").phase(), TaskPhase::Failed);
    assert_eq!(status("SENSITIVE_WORD_ERROR").phase(), TaskPhase::Failed);
    assert_eq!(status("PENDING").phase(), TaskPhase::Pending);
    assert_eq!(status("FIRST_SUCCESS").phase(), TaskPhase::Pending);
    assert_eq!(status("").phase(), TaskPhase::Pending);

    let failed = TaskStatus {
        status: "CREATE_TASK_FAILED".into(),
        error_message: Some("quota exceeded".into()),
        ..TaskStatus::default()
    };
    assert_eq!(failed.failure_message(), "quota exceeded");
    assert_eq!(status("CREATE_TASK_FAILED").failure_message(), "CREATE_TASK_FAILED");
}

#[test]
fn test_record_info_collects_nested_audio_urls() {
    let body = json!({
        "code": 200,
        "msg": "success",
        "data": {
            "taskId": "t-42",
            "status": "SUCCESS",
            "errorMessage": null,
            "response": {
                "sunoData": [
                    { "id": "a", "audioUrl": "https://cdn/a.mp3" },
                    { "id": "b", "audioUrl": "" },
                    { "id": "c", "audioUrl": "https://cdn/c.mp3" }
                ]
            }
        }
    });

    let status = parse_record_info(&body, "fallback");
    assert_eq!(status.task_id, "t-42");
    assert_eq!(status.phase(), TaskPhase::Succeeded);
    assert_eq!(status.error_message, None);
    assert_eq!(status.audio_urls, vec!["https://cdn/a.mp3", "https://cdn/c.mp3"]);
}

#[test]
fn test_record_info_without_data() {
    let status = parse_record_info(&json!({ "code": 200, "data": {} }), "t-1");
    assert_eq!(status.task_id, "t-1");
    assert_eq!(status.phase(), TaskPhase::Pending);
    assert!(status.audio_urls.is_empty());

    let failed = parse_record_info(
        &json!({ "data": { "status": "CREATE_TASK_FAILED", "errorMessage": "bad prompt" } }),
        "t-2",
    );
    assert_eq!(failed.phase(), TaskPhase::Failed);
    assert_eq!(failed.failure_message(), "bad prompt");
}

#[test]
fn test_generate_request_body() {
    let job = Job::new(JobKind::Generate, JobParams::prompt("lofi beat"), None, false);
    assert_eq!(job.params.title, "songforge");

    let request = job.request(None);
    assert_eq!(request.path(), "/api/v1/generate");
    let body = request.to_json();
    assert_eq!(body["prompt"], "lofi beat");
    assert_eq!(body["customMode"], false);
    assert_eq!(body["instrumental"], true);
    assert_eq!(body["model"], "V4_5ALL");
    assert!(body["callBackUrl"].as_str().unwrap().starts_with("https://"));
    assert!(body.get("uploadUrl").is_none());
    assert!(body.get("negativeTags").is_none());
}

#[test]
fn test_cover_and_vocals_requests_carry_upload() {
    let cover = Job::new(JobKind::Cover, JobParams::prompt("jazz"), None, false);
    let request = cover.request(Some("https://files/recorded.wav".into()));
    assert!(matches!(request, SubmitRequest::UploadCover(_)));
    assert_eq!(request.path(), "/api/v1/generate/upload-cover");
    assert_eq!(request.to_json()["uploadUrl"], "https://files/recorded.wav");
    assert_eq!(request.to_json()["title"], "songforge_cover");

    let mut params = JobParams::add_vocals("sing about rain");
    params.title = "rain".into();
    let vocals = Job::new(JobKind::AddVocals, params, None, false);
    let body = vocals.request(Some("https://files/instrumental.wav".into())).to_json();
    assert_eq!(body["uploadUrl"], "https://files/instrumental.wav");
    assert_eq!(body["title"], "rain");
    assert_eq!(body["model"], "V4_5PLUS");
    assert_eq!(body["weirdnessConstraint"], 0.72);
    assert_eq!(body["negativeTags"], "");

    assert_eq!(JobKind::Cover.upload_name(), "recorded.wav");
    assert_eq!(JobKind::AddVocals.upload_name(), "instrumental.wav");
    assert!(!JobKind::Generate.needs_segment());
}

#[test]
fn test_model_index_falls_back_to_default() {
    assert_eq!(Model::from_index(0), Model::V4);
    assert_eq!(Model::from_index(4).as_str(), "V5");
    assert_eq!(Model::from_index(17), Model::V45All);
}

#[test]
fn test_settings_defaults_and_overrides() {
    let defaults = Settings::default();
    assert_eq!(defaults.poll_interval(), Duration::from_millis(800));
    assert_eq!(defaults.max_poll_duration(), Duration::from_secs(900));
    assert_eq!(defaults.max_poll_errors, 5);

    let env: HashMap<&str, &str> = [
        ("SONGFORGE_API_BASE", "http://localhost:9000"),
        ("SONGFORGE_POLL_INTERVAL_MS", "25"),
        ("SONGFORGE_MAX_POLL_ERRORS", "not-a-number"),
        ("SONGFORGE_LIBRARY_DIR", "/tmp/songs"),
    ]
    .into_iter()
    .collect();
    let settings = Settings::from_lookup(|key| env.get(key).map(|v| v.to_string()));

    assert_eq!(settings.api_base_url, "http://localhost:9000");
    assert_eq!(settings.upload_base_url, defaults.upload_base_url);
    assert_eq!(settings.poll_interval(), Duration::from_millis(25));
    assert_eq!(settings.max_poll_errors, 5);
    assert_eq!(settings.library_dir, std::path::PathBuf::from("/tmp/songs"));

    let config = OrchestratorConfig::from(&Settings {
        max_poll_errors: 0,
        ..settings
    });
    assert_eq!(config.poll_interval, Duration::from_millis(25));
    assert_eq!(config.max_poll_errors, 1);
}

#[test]
fn test_persisted_state_restores_only_key() {
    let state = PersistedState {
        api_key: "sk-123".into(),
    };
    assert_eq!(PersistedState::from_bytes(&state.to_bytes()), state);
    assert_eq!(PersistedState::from_bytes(b""), PersistedState::default());
    assert_eq!(PersistedState::from_bytes(b"{not json"), PersistedState::default());
    assert_eq!(
        PersistedState::from_bytes(br#"{"api_key":"k","volume":3}"#).api_key,
        "k"
    );
}

#[test]
fn test_disk_library_writes_audio_and_sidecar() {
    use songforge::library::{DiskLibrary, Library, LibraryRecord};

    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("generations");
    let library = DiskLibrary::new(&dir);
    let record = LibraryRecord {
        prompt: "rainy day",
        bytes: b"RIFF....WAVE",
        sample_rate: 44_100.0,
        channels: 2,
    };

    let path = library.save(&record).unwrap();
    assert_eq!(path.parent(), Some(dir.as_path()));
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("suno_") && name.ends_with(".wav"));
    assert_eq!(std::fs::read(&path).unwrap(), b"RIFF....WAVE");

    let sidecar: serde_json::Value =
        serde_json::from_slice(&std::fs::read(path.with_extension("json")).unwrap()).unwrap();
    assert_eq!(sidecar["prompt"], "rainy day");
    assert_eq!(sidecar["channels"], 2);
    assert!(sidecar.get("bytes").is_none());
}

#[test]
fn test_settings_file_fills_in_missing_keys() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("settings.json");
    std::fs::write(&path, r#"{ "poll_interval_ms": 250, "api_base_url": "http://localhost:9000" }"#).unwrap();

    let settings = Settings::load(&path);
    assert_eq!(settings.poll_interval(), Duration::from_millis(250));
    assert_eq!(settings.api_base_url, "http://localhost:9000");
    assert_eq!(settings.max_poll_errors, Settings::default().max_poll_errors);

    // The environment still wins over the file.
    let settings = settings.with_overrides(|key| (key == "SONGFORGE_POLL_INTERVAL_MS").then(|| "40".to_string()));
    assert_eq!(settings.poll_interval_ms, 40);
    assert_eq!(settings.api_base_url, "http://localhost:9000");
}

#[test]
fn test_unusable_settings_file_falls_back_to_defaults() {
    let temp = tempfile::tempdir().unwrap();
    assert_eq!(Settings::load(&temp.path().join("absent.json")), Settings::default());

    let path = temp.path().join("broken.json");
    std::fs::write(&path, "{ poll_interval_ms: ").unwrap();
    assert_eq!(Settings::load(&path), Settings::default());

    assert!(default_config_path().ends_with("songforge/settings.json"));
}

#[test]
fn test_settings_save_then_load() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("nested").join("settings.json");
    let settings = Settings {
        max_poll_secs: 60,
        library_dir: temp.path().join("songs"),
        ..Settings::default()
    };

    settings.save(&path).unwrap();
    assert_eq!(Settings::load(&path), settings);
}

#[test]
fn test_vocals_model_follows_explicit_choice_only() {
    let params = JobParams::add_vocals("sing").with_model(None);
    assert_eq!(params.model, Model::V45Plus);

    let params = JobParams::add_vocals("sing").with_model(Some(Model::V5));
    assert_eq!(params.model, Model::V5);
    let body = Job::new(JobKind::AddVocals, params, None, false)
        .request(Some("https://files/instrumental.wav".into()))
        .to_json();
    assert_eq!(body["model"], "V5");

    assert_eq!(JobParams::prompt("x").with_model(None).model, Model::default());
}
