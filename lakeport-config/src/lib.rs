use envconfig::Envconfig;
use lazy_static::lazy_static;

#[derive(Debug, Envconfig)]
pub struct Config {
    #[envconfig(from = "LAKEPORT_LOG_LEVEL", default = "info")]
    pub log_level: String,
    /// Name the lake catalog is registered under in a session
    #[envconfig(from = "LAKEPORT_CATALOG_NAME", default = "lakeport")]
    pub catalog_name: String,
    #[envconfig(from = "LAKEPORT_WAREHOUSE", default = "memory://warehouse")]
    pub warehouse: String,
    /// Identifier of the catalog factory used to open the warehouse
    #[envconfig(from = "LAKEPORT_METASTORE", default = "memory")]
    pub metastore: String,
    #[envconfig(from = "LAKEPORT_DEFAULT_DATABASE", default = "default")]
    pub default_database: String,
    #[envconfig(from = "LAKEPORT_SYSTEM_NAMESPACE", default = "sys")]
    pub system_namespace: String,
    #[envconfig(from = "LAKEPORT_BATCH_SIZE", default = "8192")]
    pub batch_size: usize,
}

impl Config {
    pub fn init() -> Config {
        Config::init_from_env().expect("Failed to load config")
    }
}

lazy_static! {
    pub static ref CONFIG: Config = Config::init();
}
