use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::ReportKind;
use crate::error::ReportError;
use crate::google::Permission;
use crate::layout::ReportLayout;
use crate::templates::builtin_layout;

pub const CONFIG_FILE: &str = "ds-report.json";
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_ACCESS_TOKEN";
pub const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";
pub const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
const DEFAULT_PACE_MS: u64 = 1000;
const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub templates: BTreeMap<String, TemplateEntry>,
    #[serde(default)]
    pub share: Option<Permission>,
    #[serde(default)]
    pub pace_ms: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub sheets_base_url: Option<String>,
    #[serde(default)]
    pub drive_base_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TemplateEntry {
    Shorthand(String),
    Detailed(TemplateEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TemplateEntryObject {
    pub file_id: String,
    /// JSON layout file; the built-in layout is used when absent.
    #[serde(default)]
    pub layout: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRequest {
    pub file_id: String,
    pub layout: Option<Utf8PathBuf>,
}

impl TemplateRequest {
    pub fn layout(&self, kind: ReportKind) -> Result<ReportLayout, ReportError> {
        match &self.layout {
            Some(path) => ReportLayout::load(path),
            None => Ok(builtin_layout(kind)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub pace: Duration,
    pub max_retries: u32,
    pub access_token: Option<String>,
    pub sheets_base_url: String,
    pub drive_base_url: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            pace: Duration::from_millis(DEFAULT_PACE_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            access_token: None,
            sheets_base_url: SHEETS_BASE_URL.to_string(),
            drive_base_url: DRIVE_BASE_URL.to_string(),
        }
    }
}

impl ApiSettings {
    /// `GOOGLE_ACCESS_TOKEN` wins over the config file.
    pub fn access_token(&self) -> Result<String, ReportError> {
        std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .or_else(|| {
                self.access_token
                    .clone()
                    .filter(|token| !token.trim().is_empty())
            })
            .ok_or(ReportError::MissingAccessToken)
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub folder_id: Option<String>,
    pub templates: BTreeMap<ReportKind, TemplateRequest>,
    pub share: Option<Permission>,
    pub api: ApiSettings,
}

impl ResolvedConfig {
    pub fn template(&self, kind: ReportKind) -> Result<&TemplateRequest, ReportError> {
        self.templates
            .get(&kind)
            .ok_or_else(|| ReportError::MissingTemplate(kind.to_string()))
    }

    pub fn folder_id(&self) -> Result<&str, ReportError> {
        self.folder_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ReportError::ConfigParse("folder_id is required".to_string()))
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, else `ds-report.json` in the current directory, else the
    /// per-user config file.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, ReportError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => Self::default_path().ok_or(ReportError::MissingConfig)?,
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ReportError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ReportError::ConfigParse(err.to_string()))?;

        let base_dir = config_path
            .parent()
            .and_then(|dir| Utf8PathBuf::from_path_buf(dir.to_path_buf()).ok());
        Self::resolve_config_in(config, base_dir.as_deref())
    }

    pub fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("org", "dataseer", "ds-report")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
            .filter(|path| path.exists())
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ReportError> {
        Self::resolve_config_in(config, None)
    }

    /// Relative layout paths are taken from `base_dir` when given.
    pub fn resolve_config_in(
        config: Config,
        base_dir: Option<&Utf8Path>,
    ) -> Result<ResolvedConfig, ReportError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let templates = config
            .templates
            .into_iter()
            .map(|(kind, entry)| {
                let kind: ReportKind = kind.parse()?;
                let request = match entry {
                    TemplateEntry::Shorthand(file_id) => TemplateRequest {
                        file_id,
                        layout: None,
                    },
                    TemplateEntry::Detailed(obj) => TemplateRequest {
                        file_id: obj.file_id,
                        layout: obj.layout.map(|layout| {
                            let path = Utf8PathBuf::from(layout);
                            match base_dir {
                                Some(dir) if path.is_relative() => dir.join(path),
                                _ => path,
                            }
                        }),
                    },
                };
                if request.file_id.trim().is_empty() {
                    return Err(ReportError::MissingTemplate(kind.to_string()));
                }
                Ok((kind, request))
            })
            .collect::<Result<BTreeMap<_, _>, ReportError>>()?;

        let defaults = ApiSettings::default();
        let api = ApiSettings {
            pace: config
                .pace_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.pace),
            max_retries: config.max_retries.unwrap_or(defaults.max_retries),
            access_token: config.access_token,
            sheets_base_url: config.sheets_base_url.unwrap_or(defaults.sheets_base_url),
            drive_base_url: config.drive_base_url.unwrap_or(defaults.drive_base_url),
        };

        Ok(ResolvedConfig {
            schema_version,
            folder_id: config.folder_id,
            templates,
            share: config.share,
            api,
        })
    }
}
