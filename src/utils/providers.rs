//! Execution provider parsing and discovery

use crate::{
    config::ExecutionProvider,
    error::{BgRemovalError, Result},
    processor::BackendType,
};

/// Information about an execution provider
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    pub available: bool,
    pub description: String,
}

/// Utility for parsing and listing execution providers
pub struct ExecutionProviderManager;

impl ExecutionProviderManager {
    /// Parse execution provider string in format "backend:provider"
    ///
    /// A bare backend name selects that backend's default provider.
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_invoker::utils::ExecutionProviderManager;
    /// use bgremove_invoker::{BackendType, ExecutionProvider};
    ///
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("onnx:cpu").unwrap();
    /// assert_eq!(backend, BackendType::Onnx);
    /// assert_eq!(provider, ExecutionProvider::Cpu);
    /// ```
    ///
    /// # Errors
    /// - Unknown backend or provider name
    pub fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
        let (backend, provider) = match provider_str.split_once(':') {
            Some((backend, provider)) => (backend, Some(provider)),
            None => (provider_str, None),
        };

        match backend {
            "onnx" => {
                let execution_provider = match provider.unwrap_or("auto") {
                    "auto" => ExecutionProvider::Auto,
                    "cpu" => ExecutionProvider::Cpu,
                    "cuda" => ExecutionProvider::Cuda,
                    "coreml" => ExecutionProvider::CoreMl,
                    other => {
                        return Err(BgRemovalError::invalid_config(format!(
                            "Unknown ONNX provider: {other}. Supported: auto, cpu, cuda, coreml"
                        )));
                    },
                };
                Ok((BackendType::Onnx, execution_provider))
            },
            "tract" => match provider.unwrap_or("cpu") {
                "cpu" => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
                other => Err(BgRemovalError::invalid_config(format!(
                    "Unknown Tract provider: {other}. Tract only supports 'cpu'"
                ))),
            },
            _ => Err(BgRemovalError::invalid_config(format!(
                "Unknown backend '{provider_str}'. Use backend:provider (e.g., onnx:auto, tract:cpu)"
            ))),
        }
    }

    /// Convert backend type and execution provider back to string
    #[must_use]
    pub fn provider_to_string(backend_type: BackendType, provider: ExecutionProvider) -> String {
        format!("{backend_type}:{provider}")
    }

    /// List every provider combination with its availability in this build
    #[must_use]
    pub fn list_all_providers() -> Vec<ProviderInfo> {
        let mut providers = Vec::new();

        #[cfg(feature = "onnx")]
        {
            let onnx_availability: std::collections::HashMap<String, bool> =
                crate::backends::OnnxBackend::list_providers()
                    .into_iter()
                    .map(|(name, available, _)| (name.to_lowercase(), available))
                    .collect();
            let available = |name: &str| onnx_availability.get(name).copied().unwrap_or(false);

            providers.extend([
                Self::onnx_info(ExecutionProvider::Auto, true, "ONNX Runtime with auto-selected provider"),
                Self::onnx_info(ExecutionProvider::Cpu, available("cpu"), "ONNX Runtime CPU execution"),
                Self::onnx_info(ExecutionProvider::Cuda, available("cuda"), "ONNX Runtime CUDA GPU acceleration"),
                Self::onnx_info(
                    ExecutionProvider::CoreMl,
                    available("coreml"),
                    "ONNX Runtime CoreML (Apple Silicon) acceleration",
                ),
            ]);
        }

        #[cfg(not(feature = "onnx"))]
        providers.push(Self::onnx_info(
            ExecutionProvider::Auto,
            false,
            "ONNX Runtime (feature disabled)",
        ));

        #[cfg(feature = "tract")]
        for (_, available, description) in crate::backends::TractBackend::list_providers() {
            providers.push(ProviderInfo {
                name: Self::provider_to_string(BackendType::Tract, ExecutionProvider::Cpu),
                backend_type: BackendType::Tract,
                execution_provider: ExecutionProvider::Cpu,
                available,
                description,
            });
        }

        #[cfg(not(feature = "tract"))]
        providers.push(ProviderInfo {
            name: Self::provider_to_string(BackendType::Tract, ExecutionProvider::Cpu),
            backend_type: BackendType::Tract,
            execution_provider: ExecutionProvider::Cpu,
            available: false,
            description: "Pure Rust CPU inference via Tract (feature disabled)".to_string(),
        });

        providers
    }

    fn onnx_info(provider: ExecutionProvider, available: bool, description: &str) -> ProviderInfo {
        ProviderInfo {
            name: Self::provider_to_string(BackendType::Onnx, provider),
            backend_type: BackendType::Onnx,
            execution_provider: provider,
            available,
            description: description.to_string(),
        }
    }
}
