//! Locators for the decoder's core runtime and execution module.
//!
//! Both placeholders are fixed at build time. Empty means the decoder fetches
//! its assets from its default host at runtime; a `data:` URI means the build
//! is self-contained.

use crate::error::{PipelineError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

const CORE_PLACEHOLDER: &str = match option_env!("VITALSTREAM_DECODER_CORE") {
    Some(value) => value,
    None => "",
};

const MODULE_PLACEHOLDER: &str = match option_env!("VITALSTREAM_DECODER_MODULE") {
    Some(value) => value,
    None => "",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    /// Assets are fetched lazily from a host
    #[default]
    Hosted,
    /// Assets are embedded as data URIs
    Embedded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocator {
    /// Let the decoder resolve the asset from its default host
    Runtime,
    Remote(String),
    Embedded(String),
}

impl AssetLocator {
    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded(_))
    }
}

/// Resolved locators handed to the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderAssets {
    pub core: AssetLocator,
    pub module: AssetLocator,
}

#[derive(Debug, Clone)]
pub struct AssetResolver {
    core: String,
    module: String,
}

impl AssetResolver {
    /// Resolver over the placeholders baked in at build time
    pub fn from_build() -> Self {
        Self::with_placeholders(CORE_PLACEHOLDER, MODULE_PLACEHOLDER)
    }

    pub fn with_placeholders(core: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            core: core.into(),
            module: module.into(),
        }
    }

    /// Resolver whose placeholders embed the given asset bytes
    pub fn embed(core: &[u8], module: &[u8]) -> Self {
        Self::with_placeholders(
            format!("data:application/javascript;base64,{}", STANDARD.encode(core)),
            format!("data:application/wasm;base64,{}", STANDARD.encode(module)),
        )
    }

    pub fn resolve(&self, mode: BuildMode) -> Result<DecoderAssets> {
        Ok(DecoderAssets {
            core: resolve_one("core", &self.core, mode)?,
            module: resolve_one("module", &self.module, mode)?,
        })
    }
}

impl Default for AssetResolver {
    fn default() -> Self {
        Self::from_build()
    }
}

fn resolve_one(name: &str, placeholder: &str, mode: BuildMode) -> Result<AssetLocator> {
    match mode {
        BuildMode::Hosted if placeholder.is_empty() => Ok(AssetLocator::Runtime),
        BuildMode::Hosted => Ok(AssetLocator::Remote(placeholder.to_string())),
        BuildMode::Embedded if placeholder.starts_with("data:") => {
            Ok(AssetLocator::Embedded(placeholder.to_string()))
        }
        BuildMode::Embedded => Err(PipelineError::ResourceUnavailable(format!(
            "decoder {} asset is not embedded in this build",
            name
        ))),
    }
}
