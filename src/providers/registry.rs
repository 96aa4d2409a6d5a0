// src/providers/registry.rs
//! Static (platform, model) lookup with two-level enablement.

use serde::Serialize;
use std::sync::Arc;

use super::{ModelHandle, Platform};
use crate::config::AppConfig;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown platform '{platform}'")]
    UnknownPlatform { platform: String },
    #[error("unknown model '{model}' for platform '{platform}'")]
    UnknownModel { platform: String, model: String },
    #[error("platform '{platform}' is disabled")]
    PlatformDisabled { platform: String },
    #[error("model '{model}' on platform '{platform}' is disabled")]
    ModelDisabled { platform: String, model: String },
}

impl RegistryError {
    pub fn is_unknown(&self) -> bool {
        matches!(
            self,
            RegistryError::UnknownPlatform { .. } | RegistryError::UnknownModel { .. }
        )
    }

    pub fn is_disabled(&self) -> bool {
        !self.is_unknown()
    }
}

/// Entry for the model picker.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModelListing {
    /// `<platform>__<model>`, the combined selector older clients send.
    pub value: String,
    pub platform: String,
    pub model: String,
    pub label: String,
    pub enabled: bool,
}

#[derive(Clone)]
pub struct ProviderRegistry {
    config: Arc<AppConfig>,
}

impl ProviderRegistry {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    pub fn resolve(&self, platform: &str, model: &str) -> Result<ModelHandle, RegistryError> {
        let pcfg = self
            .config
            .platforms
            .get(platform)
            .ok_or_else(|| RegistryError::UnknownPlatform {
                platform: platform.to_string(),
            })?;
        let kind = Platform::parse(platform).ok_or_else(|| RegistryError::UnknownPlatform {
            platform: platform.to_string(),
        })?;
        let mcfg = pcfg
            .models
            .get(model)
            .ok_or_else(|| RegistryError::UnknownModel {
                platform: platform.to_string(),
                model: model.to_string(),
            })?;
        if !pcfg.enabled {
            return Err(RegistryError::PlatformDisabled {
                platform: platform.to_string(),
            });
        }
        if !mcfg.enabled {
            return Err(RegistryError::ModelDisabled {
                platform: platform.to_string(),
                model: model.to_string(),
            });
        }
        Ok(ModelHandle {
            platform: kind,
            model: model.to_string(),
            api_model: mcfg.api_model.clone(),
            label: mcfg.label.clone(),
            max_output_tokens: mcfg.max_output_tokens,
            retry: pcfg.retry.policy(),
        })
    }

    /// Every configured pair; `enabled` is the effective (platform AND model) flag.
    pub fn list(&self) -> Vec<ModelListing> {
        let mut out = Vec::new();
        for (pname, pcfg) in &self.config.platforms {
            for (mname, mcfg) in &pcfg.models {
                out.push(ModelListing {
                    value: format!("{pname}__{mname}"),
                    platform: pname.clone(),
                    model: mname.clone(),
                    label: mcfg.label.clone(),
                    enabled: pcfg.enabled && mcfg.enabled,
                });
            }
        }
        out
    }
}

/// Split the legacy `<platform>__<model>` selector.
pub fn split_selector(selector: &str) -> Option<(&str, &str)> {
    let (p, m) = selector.split_once("__")?;
    if p.is_empty() || m.is_empty() {
        None
    } else {
        Some((p, m))
    }
}
