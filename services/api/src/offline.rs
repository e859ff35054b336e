use clap::Args;
use valuation::config::AppConfig;
use valuation::engine::is_hdb_property_type;
use valuation::engine::PropertyAttributes;
use valuation::error::AppError;
use valuation::store::ModelStore;
use valuation::telemetry;

#[derive(Args, Debug)]
pub(crate) struct ValuateArgs {
    /// Path to a JSON file with the property attributes
    #[arg(long)]
    pub(crate) input: std::path::PathBuf,
}

/// One-shot valuation outside the HTTP server. The domain is chosen by
/// the same guard the pipelines apply.
pub(crate) fn run_valuate(args: ValuateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let store = ModelStore::load(&config.models);

    let raw = std::fs::read_to_string(&args.input)?;
    let attrs: PropertyAttributes = serde_json::from_str(&raw)?;

    let result = if is_hdb_property_type(&attrs.property_type) {
        store.hdb_pipeline().valuate(&attrs)
    } else {
        store.private_pipeline().valuate(&attrs)
    }
    .map_err(AppError::from)?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
