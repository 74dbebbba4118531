use candle_core::Device;
use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierError;

/// Compute backend used for the encoder's forward and backward passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Cpu,
    Cuda,
    Metal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub device: DeviceKind,
    /// Ordinal of the accelerator when `device` is not `cpu`
    pub ordinal: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            device: DeviceKind::Cpu,
            ordinal: 0,
        }
    }
}

impl RuntimeConfig {
    pub fn cpu() -> Self {
        Self::default()
    }
}

/// Resolves the configured backend to a candle device.
///
/// Requesting an accelerator the build does not support is an error, never a CPU fallback.
pub fn create_device(config: &RuntimeConfig) -> Result<Device, ClassifierError> {
    let device = match config.device {
        DeviceKind::Cpu => Device::Cpu,
        DeviceKind::Cuda => Device::new_cuda(config.ordinal).map_err(|e| {
            ClassifierError::ValidationError(format!("Failed to initialize CUDA device {}: {}", config.ordinal, e))
        })?,
        DeviceKind::Metal => Device::new_metal(config.ordinal).map_err(|e| {
            ClassifierError::ValidationError(format!("Failed to initialize Metal device {}: {}", config.ordinal, e))
        })?,
    };
    log::debug!("Using device {:?}", device);
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_device() {
        let device = create_device(&RuntimeConfig::cpu()).unwrap();
        assert!(device.is_cpu());
    }

    #[test]
    fn test_device_kind_serde() {
        let config: RuntimeConfig = serde_json::from_str(r#"{"device": "cuda"}"#).unwrap();
        assert_eq!(config.device, DeviceKind::Cuda);
        assert_eq!(config.ordinal, 0);
    }
}
