use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ocr::default_languages;
use crate::providers::{DEFAULT_BASE_URL, DEFAULT_MODEL};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

/// Base64 inflates a camera photo by a third, so the request limit sits well
/// above typical phone image sizes.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_addr: String,
    pub secure_cookie: bool,
    pub max_upload_bytes: usize,
    pub ocr_languages: Vec<String>,
    pub ocr_psm: u32,
    pub model_base_url: String,
    pub model_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:3000".to_string(),
            secure_cookie: false,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            ocr_languages: default_languages(),
            ocr_psm: 6,
            model_base_url: DEFAULT_BASE_URL.to_string(),
            model_name: DEFAULT_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    server: Option<ServerSettings>,
    ocr: Option<OcrSettings>,
    model: Option<ModelSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
    secure_cookie: Option<bool>,
    max_upload_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    languages: Option<Vec<String>>,
    psm: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelSettings {
    base_url: Option<String>,
    name: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            settings.merge(read_settings_file(&path)?);
        }
    }
    Ok(settings)
}

fn read_settings_file(path: &Path) -> Result<SettingsFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse settings: {}", path.display()))
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        let present = |value: Option<String>| value.filter(|value| !value.trim().is_empty());
        if let Some(server) = incoming.server {
            if let Some(addr) = present(server.addr) {
                self.server_addr = addr;
            }
            if let Some(secure) = server.secure_cookie {
                self.secure_cookie = secure;
            }
            if let Some(limit) = server.max_upload_bytes.filter(|limit| *limit > 0) {
                self.max_upload_bytes = limit;
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(languages) = ocr.languages {
                let languages = languages
                    .into_iter()
                    .map(|lang| lang.trim().to_string())
                    .filter(|lang| !lang.is_empty())
                    .collect::<Vec<_>>();
                if !languages.is_empty() {
                    self.ocr_languages = languages;
                }
            }
            if let Some(psm) = ocr.psm {
                self.ocr_psm = psm;
            }
        }
        if let Some(model) = incoming.model {
            if let Some(base_url) = present(model.base_url) {
                self.model_base_url = base_url;
            }
            if let Some(name) = present(model.name) {
                self.model_name = name;
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".riddle-solver"))
        }
    })
}
