use uuid::Uuid;

use crate::audio::segment::Segment;
use crate::services::suno::types::{AddVocalsRequest, GenerateRequest, Model, SubmitRequest, CALLBACK_PLACEHOLDER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Generate,
    Cover,
    AddVocals,
}

impl JobKind {
    /// Cover and AddVocals transform a recorded segment.
    pub fn needs_segment(self) -> bool {
        !matches!(self, JobKind::Generate)
    }

    pub fn default_title(self) -> &'static str {
        match self {
            JobKind::Generate => "songforge",
            JobKind::Cover => "songforge_cover",
            JobKind::AddVocals => "songforge_vocals",
        }
    }

    pub fn upload_name(self) -> &'static str {
        match self {
            JobKind::AddVocals => "instrumental.wav",
            _ => "recorded.wav",
        }
    }

    pub fn running_message(self) -> &'static str {
        match self {
            JobKind::Generate => "Generating…",
            JobKind::Cover => "Generating cover…",
            JobKind::AddVocals => "Adding vocals…",
        }
    }

    pub fn missing_segment_message(self) -> &'static str {
        match self {
            JobKind::AddVocals => "Select a recorded segment first (DAW Play then Stop to capture instrumental).",
            _ => "Select a recorded segment first (DAW Play then Stop to capture).",
        }
    }
}

/// What the user typed and picked in the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct JobParams {
    pub prompt: String,
    pub style: String,
    pub title: String,
    pub custom_mode: bool,
    pub instrumental: bool,
    pub model: Model,
    pub negative_tags: String,
    pub vocal_gender: Option<String>,
    pub style_weight: f64,
    pub weirdness_constraint: f64,
    pub audio_weight: f64,
}

impl Default for JobParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            style: String::new(),
            title: String::new(),
            custom_mode: false,
            instrumental: true,
            model: Model::default(),
            negative_tags: String::new(),
            vocal_gender: None,
            style_weight: 0.65,
            weirdness_constraint: 0.65,
            audio_weight: 0.65,
        }
    }
}

impl JobParams {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Defaults the add-vocals endpoint expects.
    pub fn add_vocals(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: Model::V45Plus,
            style_weight: 0.61,
            weirdness_constraint: 0.72,
            audio_weight: 0.65,
            ..Self::default()
        }
    }

    /// Applies a model the user picked; `None` keeps the request's own default.
    pub fn with_model(self, model: Option<Model>) -> Self {
        match model {
            Some(model) => Self { model, ..self },
            None => self,
        }
    }

    /// Fixed minimal request used by the API test.
    pub fn api_test() -> Self {
        Self {
            prompt: "test".to_string(),
            style: "instrumental".to_string(),
            title: "api_test".to_string(),
            ..Self::default()
        }
    }
}

/// One request to the remote service, alive for exactly one worker run.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub params: JobParams,
    /// Snapshot of the selected segment, for Cover/AddVocals.
    pub source: Option<Segment>,
    /// Test results are played but never written to the library.
    pub ephemeral: bool,
}

impl Job {
    pub fn new(kind: JobKind, mut params: JobParams, source: Option<Segment>, ephemeral: bool) -> Self {
        if params.title.trim().is_empty() {
            params.title = kind.default_title().to_string();
        }
        Self {
            id: Uuid::new_v4(),
            kind,
            params,
            source,
            ephemeral,
        }
    }

    /// Builds the submit body. `upload_url` is the uploaded segment for Cover/AddVocals.
    pub fn request(&self, upload_url: Option<String>) -> SubmitRequest {
        let p = &self.params;
        match self.kind {
            JobKind::AddVocals => SubmitRequest::AddVocals(AddVocalsRequest {
                upload_url: upload_url.unwrap_or_default(),
                prompt: p.prompt.clone(),
                title: p.title.clone(),
                negative_tags: p.negative_tags.clone(),
                style: p.style.clone(),
                call_back_url: CALLBACK_PLACEHOLDER.to_string(),
                vocal_gender: p.vocal_gender.clone(),
                style_weight: p.style_weight,
                weirdness_constraint: p.weirdness_constraint,
                audio_weight: p.audio_weight,
                model: p.model,
            }),
            kind => {
                let body = GenerateRequest {
                    custom_mode: p.custom_mode,
                    instrumental: p.instrumental,
                    model: p.model,
                    call_back_url: CALLBACK_PLACEHOLDER.to_string(),
                    upload_url,
                    prompt: p.prompt.clone(),
                    style: p.style.clone(),
                    title: p.title.clone(),
                    negative_tags: p.negative_tags.clone(),
                    vocal_gender: p.vocal_gender.clone(),
                    style_weight: p.style_weight,
                    weirdness_constraint: p.weirdness_constraint,
                    audio_weight: p.audio_weight,
                };
                if kind == JobKind::Cover {
                    SubmitRequest::UploadCover(body)
                } else {
                    SubmitRequest::Generate(body)
                }
            }
        }
    }
}
