use std::{env, time::Duration as StdDuration};

use chrono::Duration;
use log::*;
use marketplace_payment_engine::{db_types::GatewayKind, splits::FeeRates, SettlementConfig};
use mpg_common::{bp_from_percent, parse_boolean_flag, Secret};

const DEFAULT_MPS_HOST: &str = "127.0.0.1";
const DEFAULT_MPS_PORT: u16 = 8360;
const DEFAULT_WEBHOOK_HEADER: &str = "x-gateway-signature";
const DEFAULT_GATEWAY_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_HOLD_PERIOD_HOURS: i64 = 7 * 24;
const DEFAULT_ESCROW_SCAN_INTERVAL_SECS: u64 = 120;
const DEFAULT_PAYOUT_PROCESS_INTERVAL_SECS: u64 = 300;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Split rates and escrow hold period applied at capture time.
    pub settlement: SettlementConfig,
    pub webhook: WebhookConfig,
    pub gateway: GatewayConfig,
    /// How often the escrow worker scans for releasable splits.
    pub escrow_scan_interval: StdDuration,
    /// How often the payout worker submits due pending payouts.
    pub payout_process_interval: StdDuration,
}

#[derive(Clone, Debug, Default)]
pub struct WebhookConfig {
    /// Shared secret the gateway signs webhook bodies with.
    pub secret: Secret<String>,
    /// Header carrying the hex HMAC signature.
    pub header: String,
    /// When false, signature checks are skipped entirely (local development only).
    pub checks: bool,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub kind: GatewayKind,
    pub base_url: String,
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub timeout: StdDuration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            kind: GatewayKind::Mock,
            base_url: "https://api.razorpay.com".to_string(),
            key_id: String::default(),
            key_secret: Secret::default(),
            timeout: StdDuration::from_millis(DEFAULT_GATEWAY_TIMEOUT_MS),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MPS_HOST.to_string(),
            port: DEFAULT_MPS_PORT,
            database_url: String::default(),
            settlement: SettlementConfig::default(),
            webhook: WebhookConfig {
                secret: Secret::default(),
                header: DEFAULT_WEBHOOK_HEADER.to_string(),
                checks: true,
            },
            gateway: GatewayConfig::default(),
            escrow_scan_interval: StdDuration::from_secs(DEFAULT_ESCROW_SCAN_INTERVAL_SECS),
            payout_process_interval: StdDuration::from_secs(DEFAULT_PAYOUT_PROCESS_INTERVAL_SECS),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MPS_HOST").ok().unwrap_or_else(|| DEFAULT_MPS_HOST.into());
        let port = env::var("MPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MPS_PORT. {e} Using the default, {DEFAULT_MPS_PORT}, instead."
                    );
                    DEFAULT_MPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MPS_PORT);
        let database_url = env::var("MPS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MPS_DATABASE_URL is not set. Please set it to the URL for the settlement database.");
            String::default()
        });
        let settlement = settlement_from_env();
        let webhook = WebhookConfig::from_env_or_default();
        let gateway = GatewayConfig::from_env_or_default();
        let escrow_scan_interval =
            StdDuration::from_secs(env_u64("MPS_ESCROW_SCAN_INTERVAL_SECS", DEFAULT_ESCROW_SCAN_INTERVAL_SECS));
        let payout_process_interval =
            StdDuration::from_secs(env_u64("MPS_PAYOUT_PROCESS_INTERVAL_SECS", DEFAULT_PAYOUT_PROCESS_INTERVAL_SECS));
        Self { host, port, database_url, settlement, webhook, gateway, escrow_scan_interval, payout_process_interval }
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let secret = env::var("MPS_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ MPS_WEBHOOK_SECRET is not set. Incoming webhook events cannot be authenticated without it.");
            String::default()
        });
        let header =
            env::var("MPS_WEBHOOK_HEADER").ok().unwrap_or_else(|| DEFAULT_WEBHOOK_HEADER.to_string()).to_lowercase();
        let checks = parse_boolean_flag(env::var("MPS_WEBHOOK_CHECKS").ok(), true);
        if !checks {
            warn!(
                "🚨️ Webhook signature checks are DISABLED. Any caller can forge settlement events. Never run \
                 production like this."
            );
        }
        Self { secret: Secret::new(secret), header, checks }
    }
}

impl GatewayConfig {
    pub fn from_env_or_default() -> Self {
        let kind = match env::var("MPS_GATEWAY").map(|s| s.to_lowercase()) {
            Ok(s) if s == "razorpay" => GatewayKind::Razorpay,
            Ok(s) if s == "mock" => GatewayKind::Mock,
            Ok(other) => {
                warn!("🪛️ Unknown gateway '{other}' in MPS_GATEWAY. Falling back to the mock provider.");
                GatewayKind::Mock
            },
            Err(_) => {
                info!("🪛️ MPS_GATEWAY is not set. Using the mock provider.");
                GatewayKind::Mock
            },
        };
        let base_url =
            env::var("MPS_GATEWAY_BASE_URL").ok().unwrap_or_else(|| "https://api.razorpay.com".to_string());
        let key_id = env::var("MPS_GATEWAY_KEY_ID").ok().unwrap_or_default();
        let key_secret = Secret::new(env::var("MPS_GATEWAY_KEY_SECRET").ok().unwrap_or_else(|| {
            if kind == GatewayKind::Razorpay {
                error!("🪛️ MPS_GATEWAY_KEY_SECRET is not set. Gateway calls will not authenticate.");
            }
            String::default()
        }));
        let timeout = StdDuration::from_millis(env_u64("MPS_GATEWAY_TIMEOUT_MS", DEFAULT_GATEWAY_TIMEOUT_MS));
        Self { kind, base_url, key_id, key_secret, timeout }
    }
}

fn settlement_from_env() -> SettlementConfig {
    let defaults = SettlementConfig::default();
    let commission_bp = env_i64("MPS_COMMISSION_BP", defaults.rates.commission_bp);
    let gst_bp = env_i64("MPS_GST_BP", defaults.rates.gst_bp);
    let tds_bp = env_i64("MPS_TDS_BP", defaults.rates.tds_bp);
    let hold_hours = env_i64("MPS_HOLD_PERIOD_HOURS", DEFAULT_HOLD_PERIOD_HOURS);
    if [commission_bp, gst_bp, tds_bp].iter().any(|bp| !(0..=bp_from_percent(100)).contains(bp)) {
        warn!("🪛️ Configured split rates fall outside [0%, 100%]; captures will be rejected until this is fixed.");
    }
    SettlementConfig {
        rates: FeeRates::new(commission_bp, gst_bp, tds_bp),
        hold_period: Duration::hours(hold_hours),
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// The subset of the configuration handlers need at request time. Kept small and free of secrets
/// so it can be cheaply shared as app data.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub gateway: GatewayKind,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { gateway: config.gateway.kind }
    }
}

fn env_u64(var: &str, default: u64) -> u64 {
    env::var(var)
        .map_err(|_| info!("🪛️ {var} is not set. Using the default value of {default}."))
        .and_then(|s| s.parse::<u64>().map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}")))
        .unwrap_or(default)
}

fn env_i64(var: &str, default: i64) -> i64 {
    env::var(var)
        .map_err(|_| info!("🪛️ {var} is not set. Using the default value of {default}."))
        .and_then(|s| s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}")))
        .unwrap_or(default)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ServerConfig::default();
        assert_eq!(config.port, DEFAULT_MPS_PORT);
        assert_eq!(config.settlement.rates.commission_bp, bp_from_percent(5));
        assert_eq!(config.settlement.rates.gst_bp, bp_from_percent(18));
        assert_eq!(config.settlement.rates.tds_bp, bp_from_percent(1));
        assert_eq!(config.settlement.hold_period, Duration::days(7));
        assert!(config.webhook.checks);
        assert_eq!(config.gateway.kind, GatewayKind::Mock);
    }
}
