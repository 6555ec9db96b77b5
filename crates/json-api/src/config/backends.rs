//! Cache & Broker Config

use clap::Args;

/// Cache store settings.
#[derive(Debug, Args)]
pub struct CacheConfig {
    /// Redis connection string; an in-process cache is used when omitted
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,
}

/// Message broker settings.
#[derive(Debug, Args)]
pub struct BrokerConfig {
    /// AMQP connection string; an in-process broker is used when omitted
    #[arg(long, env = "AMQP_URL")]
    pub amqp_url: Option<String>,
}
