//! Creative modes: the static configuration that decides which prompts a
//! run fans out.
//!
//! A [`Mode`] is either single-image (one prompt, keyed by the mode id) or
//! multi-image (an ordered list of key/prompt pairs, one generated image
//! per key). Multi-image modes may carry album metadata used when the
//! completed set is composed into a collage page.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{GenerationTask, ImageData, TaskKey};

/// Maximum length of a mode id.
const MAX_MODE_ID_LEN: usize = 64;

/// Decade themes used by the time-travel mode, in display order.
pub const DECADES: &[&str] = &["1950s", "1960s", "1970s", "1980s", "1990s", "2000s"];

/// Magazine themes used by the magazine-cover mode, in display order.
pub const MAGAZINES: &[&str] = &[
    "Vogue",
    "Time",
    "Rolling Stone",
    "National Geographic",
    "Wired",
    "Life",
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A creative transformation the user can pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub kind: ModeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<AlbumInfo>,
}

/// Whether a mode produces one image or a keyed set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ModeKind {
    Single { prompt: String },
    Multi { prompts: Vec<KeyedPrompt> },
}

/// One entry of a multi-image mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedPrompt {
    pub key: TaskKey,
    pub prompt: String,
}

/// Titles and output filename for the composed album page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumInfo {
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    /// Download filename; defaults to `<mode-id>-album.jpg`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl Mode {
    pub fn is_multi(&self) -> bool {
        matches!(self.kind, ModeKind::Multi { .. })
    }

    /// Task keys in declaration order. A single-image mode has exactly one
    /// key: its own id.
    pub fn keys(&self) -> Vec<TaskKey> {
        match &self.kind {
            ModeKind::Single { .. } => vec![self.id.clone()],
            ModeKind::Multi { prompts } => prompts.iter().map(|p| p.key.clone()).collect(),
        }
    }

    /// The prompt declared for `key`, if the key belongs to this mode.
    pub fn prompt_for(&self, key: &str) -> Option<&str> {
        match &self.kind {
            ModeKind::Single { prompt } => (key == self.id).then_some(prompt.as_str()),
            ModeKind::Multi { prompts } => prompts
                .iter()
                .find(|p| p.key == key)
                .map(|p| p.prompt.as_str()),
        }
    }

    /// Build the generation task for one key.
    pub fn task_for(&self, key: &str, source: &ImageData) -> Result<GenerationTask, CoreError> {
        let prompt = self
            .prompt_for(key)
            .ok_or_else(|| CoreError::not_found("Task key", key))?;
        Ok(GenerationTask::new(key, source.clone(), prompt))
    }

    /// Build one task per key, in declaration order.
    pub fn tasks(&self, source: &ImageData) -> Vec<GenerationTask> {
        match &self.kind {
            ModeKind::Single { prompt } => {
                vec![GenerationTask::new(self.id.clone(), source.clone(), prompt)]
            }
            ModeKind::Multi { prompts } => prompts
                .iter()
                .map(|p| GenerationTask::new(p.key.clone(), source.clone(), &p.prompt))
                .collect(),
        }
    }

    /// Album title and subtitle, falling back to the mode title.
    pub fn album_titles(&self) -> (String, String) {
        match &self.album {
            Some(info) => (info.title.clone(), info.subtitle.clone()),
            None => (self.title.clone(), String::new()),
        }
    }

    pub fn album_filename(&self) -> String {
        self.album
            .as_ref()
            .and_then(|info| info.filename.clone())
            .unwrap_or_else(|| crate::naming::album_filename(&self.id))
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a single mode definition.
///
/// Rules:
/// - The id must be non-empty, at most `MAX_MODE_ID_LEN` characters, and
///   contain only lowercase alphanumerics and hyphens.
/// - Every prompt must be non-blank.
/// - A multi-image mode must declare at least one key, and keys must be
///   non-blank and unique.
pub fn validate_mode(mode: &Mode) -> Result<(), CoreError> {
    if mode.id.is_empty() {
        return Err(CoreError::Validation("Mode id must not be empty".into()));
    }
    if mode.id.len() > MAX_MODE_ID_LEN {
        return Err(CoreError::Validation(format!(
            "Mode id must not exceed {MAX_MODE_ID_LEN} characters"
        )));
    }
    if !mode
        .id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(CoreError::Validation(format!(
            "Mode id '{}' may only contain lowercase letters, digits, and hyphens",
            mode.id
        )));
    }

    match &mode.kind {
        ModeKind::Single { prompt } => {
            if prompt.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "Mode '{}' has an empty prompt",
                    mode.id
                )));
            }
        }
        ModeKind::Multi { prompts } => {
            if prompts.is_empty() {
                return Err(CoreError::Validation(format!(
                    "Multi-image mode '{}' must declare at least one key",
                    mode.id
                )));
            }
            let mut seen = HashSet::new();
            for entry in prompts {
                if entry.key.trim().is_empty() {
                    return Err(CoreError::Validation(format!(
                        "Mode '{}' has an empty key",
                        mode.id
                    )));
                }
                if entry.prompt.trim().is_empty() {
                    return Err(CoreError::Validation(format!(
                        "Mode '{}' has an empty prompt for key '{}'",
                        mode.id, entry.key
                    )));
                }
                if !seen.insert(entry.key.as_str()) {
                    return Err(CoreError::Validation(format!(
                        "Mode '{}' declares key '{}' more than once",
                        mode.id, entry.key
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Validate every mode and reject duplicate ids.
pub fn validate_catalog(modes: &[Mode]) -> Result<(), CoreError> {
    let mut ids = HashSet::new();
    for mode in modes {
        validate_mode(mode)?;
        if !ids.insert(mode.id.as_str()) {
            return Err(CoreError::Validation(format!(
                "Duplicate mode id '{}'",
                mode.id
            )));
        }
    }
    Ok(())
}

/// Parse and validate a JSON catalog (an array of modes).
pub fn parse_catalog(json: &str) -> Result<Vec<Mode>, CoreError> {
    let modes: Vec<Mode> = serde_json::from_str(json)
        .map_err(|e| CoreError::Validation(format!("Invalid mode catalog: {e}")))?;
    validate_catalog(&modes)?;
    Ok(modes)
}

/// Look up a mode by id.
pub fn find_mode<'a>(modes: &'a [Mode], id: &str) -> Result<&'a Mode, CoreError> {
    modes
        .iter()
        .find(|m| m.id == id)
        .ok_or_else(|| CoreError::not_found("Mode", id))
}

// ---------------------------------------------------------------------------
// Built-in catalog
// ---------------------------------------------------------------------------

fn single(id: &str, title: &str, description: &str, prompt: &str) -> Mode {
    Mode {
        id: id.into(),
        title: title.into(),
        description: description.into(),
        kind: ModeKind::Single {
            prompt: prompt.into(),
        },
        album: None,
    }
}

fn decade_prompt(decade: &str) -> String {
    format!(
        "Reimagine the person in this photo in the style of the {decade}. This includes \
         the clothing, hairstyle, photo quality, and overall aesthetic of that decade. \
         The output must be a clear, photorealistic photograph."
    )
}

fn magazine_prompt(magazine: &str) -> String {
    format!(
        "Turn the person in this photo into the cover star of a {magazine} magazine issue. \
         Match the magazine's signature cover photography, lighting, and typography layout. \
         Keep the person's face recognisable and the result photorealistic."
    )
}

/// The modes shipped with the studio.
pub fn builtin_catalog() -> Vec<Mode> {
    vec![
        Mode {
            id: "time-travel".into(),
            title: "Polaroid Time Travel".into(),
            description: "See yourself across the decades.".into(),
            kind: ModeKind::Multi {
                prompts: DECADES
                    .iter()
                    .map(|d| KeyedPrompt {
                        key: (*d).to_string(),
                        prompt: decade_prompt(d),
                    })
                    .collect(),
            },
            album: Some(AlbumInfo {
                title: "Time Travel".into(),
                subtitle: "Six decades, one face".into(),
                filename: Some("past-forward-album.jpg".into()),
            }),
        },
        Mode {
            id: "magazine-cover".into(),
            title: "Cover Star".into(),
            description: "Land on the cover of six iconic magazines.".into(),
            kind: ModeKind::Multi {
                prompts: MAGAZINES
                    .iter()
                    .map(|m| KeyedPrompt {
                        key: (*m).to_string(),
                        prompt: magazine_prompt(m),
                    })
                    .collect(),
            },
            album: Some(AlbumInfo {
                title: "Cover Star".into(),
                subtitle: "On the newsstand".into(),
                filename: None,
            }),
        },
        single(
            "portrait-art",
            "Monochrome Portrait",
            "A high-resolution black and white art portrait.",
            "Using the uploaded photo, create a high-resolution black and white editorial art \
             portrait. The background is a soft gradient from mid grey to near white. Fine film \
             grain gives an analogue texture. The face emerges partly from shadow on the right \
             side of the frame, caught between breaths rather than posed, lit by one gentle \
             directional light. Leave generous negative space. No text, no logos.",
        ),
        single(
            "knitted-doll",
            "Knitted Doll",
            "Turn your photo into a cute crocheted doll.",
            "A close-up, professionally composed photo of a hand-crocheted yarn doll held gently \
             in two hands. The doll is a cute chibi version of the person in the uploaded photo, \
             with rich detail and vivid contrasting colours. The background is softly blurred: a \
             warm wooden table indoors with natural window light.",
        ),
        single(
            "davinci-sketch",
            "Da Vinci Sketch",
            "Render your photo as a Leonardo da Vinci study.",
            "Convert this photo into a Leonardo da Vinci style hand-drawn study sketch.",
        ),
        single(
            "double-exposure",
            "Double Exposure",
            "Blend your portrait with a city skyline silhouette.",
            "Using the person in the uploaded photo, show only their side profile and blend it \
             with a city skyline silhouette as a double exposure. Black and white with light \
             washes of colour, perfectly overlapped, pure white outside the figure, film grain, \
             surreal and atmospheric.",
        ),
        single(
            "black-gold",
            "Black Gold Studio",
            "A mysterious profile silhouette traced by light on pure black.",
            "Using the person in the uploaded photo: pure black background, side-on composition, \
             an artistic and mysterious silhouette. Hair strands catch a front-side light. The \
             pose is calm with the head slightly lowered. High contrast, only the black \
             background and warm-toned silhouette, shot at eye level from a distance.",
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
