use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::foundation::core::{LayerId, VideoFormat};
use crate::foundation::error::{PlayoutError, PlayoutResult};
use crate::processor::headless::HeadlessOpts;
use crate::producer::frame_producer::ProducerId;
use crate::producer::registry::{FactoryContext, ProducerRegistry};
use crate::renderer::device::{RenderDevice, RenderDeviceOpts};
use crate::renderer::layer::LoadMode;

/// One load performed when a session starts.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerLoad {
    /// Target layer.
    pub layer: LayerId,
    /// Producer parameters, matched against the registry.
    pub params: Vec<String>,
    /// Load mode.
    #[serde(default)]
    pub mode: LoadMode,
}

/// JSON session configuration for a render device on the headless backend.
///
/// ```json
/// { "format": "720p5000", "pace": true,
///   "layers": [ { "layer": 10, "params": ["#FF0000FF"], "mode": "auto_play" } ] }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Video format preset name.
    #[serde(default = "default_format")]
    pub format: String,
    /// Render fan-out threads.
    #[serde(default)]
    pub threads: Option<usize>,
    /// Pace output at the format's frame rate.
    #[serde(default = "default_pace")]
    pub pace: bool,
    /// Composites kept by the headless backend.
    #[serde(default = "default_history")]
    pub history: usize,
    /// Folder passed to template-driven producers.
    #[serde(default = "default_template_folder")]
    pub template_folder: PathBuf,
    /// Loads applied in order at start-up.
    #[serde(default)]
    pub layers: Vec<LayerLoad>,
}

fn default_format() -> String {
    "pal".to_string()
}

fn default_pace() -> bool {
    true
}

fn default_history() -> usize {
    8
}

fn default_template_folder() -> PathBuf {
    PathBuf::from("templates")
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            threads: None,
            pace: default_pace(),
            history: default_history(),
            template_folder: default_template_folder(),
            layers: Vec::new(),
        }
    }
}

impl DeviceConfig {
    /// Parse a configuration from a JSON string.
    pub fn from_json_str(s: &str) -> PlayoutResult<Self> {
        serde_json::from_str(s).map_err(|e| PlayoutError::config(format!("parse device config JSON: {e}")))
    }

    /// Parse a configuration from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> PlayoutResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            PlayoutError::config(format!("open device config JSON '{}': {e}", path.display()))
        })?;
        serde_json::from_reader(BufReader::new(f))
            .map_err(|e| PlayoutError::config(format!("parse device config JSON: {e}")))
    }

    /// Check the format name, thread count and layer list.
    pub fn validate(&self) -> PlayoutResult<()> {
        self.video_format()?;
        if self.threads == Some(0) {
            return Err(PlayoutError::config("'threads' must be >= 1 when set"));
        }
        if self.history == 0 {
            return Err(PlayoutError::config("'history' must be >= 1"));
        }
        let mut seen = BTreeSet::new();
        for load in &self.layers {
            if !seen.insert(load.layer) {
                return Err(PlayoutError::config(format!(
                    "layer {} is loaded more than once",
                    load.layer
                )));
            }
        }
        Ok(())
    }

    /// Resolve the format preset.
    pub fn video_format(&self) -> PlayoutResult<VideoFormat> {
        VideoFormat::from_name(&self.format)
    }

    /// Render device options.
    pub fn device_opts(&self) -> RenderDeviceOpts {
        RenderDeviceOpts {
            threads: self.threads,
        }
    }

    /// Headless backend options.
    pub fn headless_opts(&self) -> PlayoutResult<HeadlessOpts> {
        Ok(HeadlessOpts {
            format: self.video_format()?,
            pace: self.pace,
            history: self.history,
        })
    }

    /// Producer factory context.
    pub fn factory_context(&self) -> FactoryContext {
        FactoryContext {
            template_folder: self.template_folder.clone(),
        }
    }

    /// Perform the configured loads on `device`, in order.
    ///
    /// Stops at the first load whose parameters are rejected. Entries whose producer fails to
    /// initialize yield `None` and do not stop the remaining loads.
    pub fn apply(
        &self,
        device: &RenderDevice,
        registry: &ProducerRegistry,
    ) -> PlayoutResult<Vec<Option<ProducerId>>> {
        let mut ids = Vec::with_capacity(self.layers.len());
        for load in &self.layers {
            let id = device.load_params(load.layer, registry, &load.params, load.mode)?;
            info!(layer = %load.layer, params = ?load.params, mode = ?load.mode, loaded = id.is_some(), "applied layer load");
            ids.push(id);
        }
        Ok(ids)
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
