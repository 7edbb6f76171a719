use crate::cli::Args;
use anyhow::Result;
use usls::Config;

/// Builds the detector model configuration from the command line arguments
pub fn build_config(args: &Args) -> Result<Config> {
    let config = Config::yolo_detect()
        .with_model_ver(args.ver.try_into()?)
        .with_model_scale(args.scale.parse()?)
        .with_model_dtype(args.dtype.parse()?)
        .with_model_device(args.device.parse()?);

    Ok(config)
}
