mod settings;

use config::{Config, ConfigError, Environment, File};

pub use settings::{
    BrokerSettings, LogSettings, PartialSettings, ServerSettings, Settings,
};

/// Environment variable prefix, e.g. `FRAMEBUS_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "FRAMEBUS";

/// Loads the configuration from `config/default.*`, a `.env` file and
/// `FRAMEBUS_*` environment variables, in increasing precedence, and merges
/// the result over the defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("broker.accepted_origins"),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}
