//! Conversion of CLI arguments into an `InvokerConfig`

use super::main_impl::{Cli, CliOutputFormat};
use crate::{
    config::{AlphaMattingOptions, InvokerConfig, OutputFormat},
    models::{ModelSpec, PretrainedModel},
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use std::str::FromStr;

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build and validate the invocation configuration from parsed arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<InvokerConfig> {
        let model = match &cli.model_path {
            Some(path) => ModelSpec::external(path.clone()),
            None => ModelSpec::pretrained(
                PretrainedModel::from_str(&cli.model).context("Invalid --model")?,
            ),
        };

        let (backend_type, execution_provider) =
            ExecutionProviderManager::parse_provider_string(&cli.execution_provider)
                .context("Invalid execution provider format")?;

        let output_format = match cli.format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Webp => OutputFormat::WebP,
        };

        InvokerConfig::builder()
            .model(model)
            .backend_type(backend_type)
            .execution_provider(execution_provider)
            .alpha_matting(cli.alpha_matting)
            .matting_options(AlphaMattingOptions {
                foreground_threshold: cli.foreground_threshold,
                background_threshold: cli.background_threshold,
                erode_size: cli.erode_size,
            })
            .only_mask(cli.only_mask)
            .output_format(output_format)
            .intra_threads(cli.threads)
            .build()
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ExecutionProvider, models::ModelSource, processor::BackendType};
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["bgremove-invoker"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = CliConfigBuilder::from_cli(&parse(&[])).unwrap();
        assert!(!config.alpha_matting);
        assert_eq!(config.matting, AlphaMattingOptions::default());
        assert!(config.post_process_mask);
        assert_eq!(config.output_format, OutputFormat::Png);
        assert_eq!(config.backend_type, BackendType::Onnx);
        assert_eq!(config.execution_provider, ExecutionProvider::Auto);
    }

    #[test]
    fn test_alpha_matting_flags() {
        let cli = parse(&[
            "--alpha_matting",
            "--alpha_matting_foreground_threshold",
            "200",
            "--alpha_matting_background_threshold",
            "20",
            "--alpha_matting_erode_size",
            "5",
        ]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        assert!(config.alpha_matting);
        assert_eq!(config.matting.foreground_threshold, 200);
        assert_eq!(config.matting.background_threshold, 20);
        assert_eq!(config.matting.erode_size, 5);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let cli = parse(&[
            "--alpha_matting_foreground_threshold",
            "10",
            "--alpha_matting_background_threshold",
            "240",
        ]);
        assert!(CliConfigBuilder::from_cli(&cli).is_err());
    }

    #[test]
    fn test_model_selection() {
        let config = CliConfigBuilder::from_cli(&parse(&["-m", "u2net"])).unwrap();
        assert_eq!(config.model.source, ModelSource::Pretrained(PretrainedModel::U2Net));

        let config =
            CliConfigBuilder::from_cli(&parse(&["--model-path", "/models/custom.onnx"])).unwrap();
        assert!(matches!(config.model.source, ModelSource::External(_)));

        assert!(CliConfigBuilder::from_cli(&parse(&["-m", "no-such-model"])).is_err());
    }

    #[test]
    fn test_provider_and_format() {
        let config =
            CliConfigBuilder::from_cli(&parse(&["-e", "tract:cpu", "-f", "webp", "-t", "2"])).unwrap();
        assert_eq!(config.backend_type, BackendType::Tract);
        assert_eq!(config.output_format, OutputFormat::WebP);
        assert_eq!(config.intra_threads, 2);

        assert!(CliConfigBuilder::from_cli(&parse(&["-e", "gpu:fast"])).is_err());
    }

    #[test]
    fn test_unknown_flag_is_parse_error() {
        let err = Cli::try_parse_from(["bgremove-invoker", "--alpha-matting"]).unwrap_err();
        assert_ne!(err.exit_code(), 0);

        let help = Cli::try_parse_from(["bgremove-invoker", "--help"]).unwrap_err();
        assert_eq!(help.exit_code(), 0);
    }
}
