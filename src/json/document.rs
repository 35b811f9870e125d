use serde::Deserialize;
use serde_json::Value;

use super::path::stringify;

/// One particle of the `particles` section
#[derive(Debug, Clone, Deserialize)]
pub struct Particle {
    /// Instrument-assigned id, usually an integer
    #[serde(rename = "particleId", default)]
    pub particle_id: Value,

    /// Parameter groups, tagged by their `description`
    #[serde(default)]
    pub parameters: Vec<Value>,

    /// Raw waveforms, one per channel
    #[serde(rename = "pulseShapes", default)]
    pub pulse_shapes: Vec<PulseShape>,
}

impl Particle {
    /// The particle id as it appears in object ids and image file names
    pub fn key(&self) -> String {
        stringify(&self.particle_id)
    }

    /// `<sample_id>_<particleId>`
    pub fn object_id(&self, sample_id: &str) -> String {
        format!("{}_{}", sample_id, self.key())
    }
}

/// The waveform recorded on one channel
#[derive(Debug, Clone, Deserialize)]
pub struct PulseShape {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub values: Vec<f64>,
}

/// One entry of the `images` section
#[derive(Debug, Clone, Deserialize)]
pub struct ParticleImage {
    #[serde(rename = "particleId", default)]
    pub particle_id: Value,

    /// Base64-encoded image bytes
    #[serde(default)]
    pub base64: Option<String>,
}

impl ParticleImage {
    /// The particle id as it appears in image file names
    pub fn key(&self) -> String {
        stringify(&self.particle_id)
    }
}
