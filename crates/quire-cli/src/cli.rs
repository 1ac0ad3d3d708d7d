use clap::Parser;

/// Command-line options for the `quire` server (§6 "Configuration").
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Opts {
    /// Listening port.
    #[arg(long, env = "QUIRE_PORT", default_value_t = 8092)]
    pub port: u16,

    /// Base URL of the external document-conversion renderer.
    #[arg(long, env = "QUIRE_RENDERER_BASE_URL", default_value = "http://localhost:8091")]
    pub renderer_base_url: String,

    /// Override for the `list:*` namespace TTL, in seconds.
    #[arg(long, env = "QUIRE_LIST_TTL_SECS", default_value_t = 30 * 60)]
    pub list_ttl_secs: u64,

    /// Override for the `detail:*` namespace TTL, in seconds.
    #[arg(long, env = "QUIRE_DETAIL_TTL_SECS", default_value_t = 60 * 60)]
    pub detail_ttl_secs: u64,

    /// Override for the default publication relay set (comma-separated).
    #[arg(long, env = "QUIRE_PUBLICATION_RELAYS", value_delimiter = ',')]
    pub publication_relays: Option<Vec<String>>,

    /// Override for the default article relay set (comma-separated).
    #[arg(long, env = "QUIRE_ARTICLE_RELAYS", value_delimiter = ',')]
    pub article_relays: Option<Vec<String>>,
}
