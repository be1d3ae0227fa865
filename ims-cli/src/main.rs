//! IMS CLI
//!
//! Inspect and change IMS user settings and provisioned values for one phone
//! slot, backed by file stores in a state directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ims_core::{FeatureKey, PhoneId, ProvisioningBackend, SubscriptionId};
use ims_manager::{BackendFactory, CarrierConfig, ImsManager, ManagerRegistry};
use ims_store::{FileProvisioningBackend, FileSettingsStore};

/// imsctl - IMS settings and provisioning tool
#[derive(Parser)]
#[command(name = "imsctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Directory holding the settings and provisioning files
    #[arg(long, global = true, env = "IMS_STATE_DIR", default_value = ".ims")]
    state_dir: PathBuf,

    /// Carrier config JSON (defaults plus IMS_* environment overrides otherwise)
    #[arg(long, global = true, env = "IMS_CARRIER_CONFIG")]
    carrier_config: Option<PathBuf>,

    /// Phone slot
    #[arg(long, global = true, default_value = "0")]
    phone: i32,

    /// Subscription bound to the phone slot
    #[arg(long, global = true, env = "IMS_SUB_ID", default_value = "1")]
    sub: i32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every setting and provisioning state
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Read or change a user setting
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Read or change a provisioned value
    Provisioning {
        #[command(subcommand)]
        action: ProvisioningAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Read a setting
    Get { setting: Setting },
    /// Change a setting (on/off for toggles, 0-2 for modes)
    Set { setting: Setting, value: String },
}

#[derive(Subcommand)]
enum ProvisioningAction {
    /// Read a provisioned value
    Get {
        /// Feature key, by name or number
        key: FeatureKey,
        /// Read the string value instead of the integer value
        #[arg(long)]
        string: bool,
    },
    /// Change a provisioned value
    Set {
        /// Feature key, by name or number
        key: FeatureKey,
        value: String,
        /// Write the value as a string
        #[arg(long)]
        string: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Setting {
    Wfc,
    WfcRoaming,
    WfcMode,
    WfcRoamingMode,
    Vt,
    Enhanced4g,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap reads its env defaults
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "ims=debug,info"
    } else {
        "ims=info,warn"
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    if cli.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let state = State::open(&cli).await?;
    let manager = state.manager();

    let outcome = match cli.command {
        Commands::Status { json } => cmd_status(&manager, json).await,
        Commands::Settings { action } => cmd_settings(&manager, action).await,
        Commands::Provisioning { action } => cmd_provisioning(&manager, action).await,
    };

    state.flush().await?;
    outcome
}

/// File stores and the registry built on top of them.
struct State {
    settings: Arc<FileSettingsStore>,
    backend: Arc<FileProvisioningBackend>,
    registry: ManagerRegistry,
    phone_id: PhoneId,
    sub_id: SubscriptionId,
}

impl State {
    async fn open(cli: &Cli) -> Result<Self> {
        let carrier_config = match &cli.carrier_config {
            Some(path) => CarrierConfig::from_json_file(path)
                .with_context(|| format!("Failed to load carrier config {}", path.display()))?,
            None => CarrierConfig::from_env().context("Invalid IMS_* override")?,
        };

        std::fs::create_dir_all(&cli.state_dir)
            .with_context(|| format!("Failed to create {}", cli.state_dir.display()))?;

        let phone_id = PhoneId(cli.phone);
        let sub_id = SubscriptionId(cli.sub);
        if !sub_id.is_valid() {
            bail!("Invalid subscription id {}", cli.sub);
        }

        let settings = Arc::new(
            FileSettingsStore::new(cli.state_dir.join("settings.ims"))
                .await
                .context("Failed to open settings store")?,
        );
        let backend = Arc::new(
            FileProvisioningBackend::new(provisioning_path(&cli.state_dir, phone_id))
                .await
                .context("Failed to open provisioning store")?,
        );
        debug!(state_dir = %cli.state_dir.display(), %phone_id, %sub_id, "Opened state");

        let shared = backend.clone();
        let factory: BackendFactory = Arc::new(move |_: PhoneId, _: SubscriptionId| {
            shared.clone() as Arc<dyn ProvisioningBackend>
        });
        let registry = ManagerRegistry::new(settings.clone(), factory, carrier_config);

        Ok(Self {
            settings,
            backend,
            registry,
            phone_id,
            sub_id,
        })
    }

    fn manager(&self) -> Arc<ImsManager> {
        self.registry.get_or_create(self.phone_id, self.sub_id)
    }

    async fn flush(&self) -> Result<()> {
        self.settings.flush().await.context("Failed to save settings")?;
        self.backend
            .flush()
            .await
            .context("Failed to save provisioning values")?;
        Ok(())
    }
}

fn provisioning_path(state_dir: &Path, phone_id: PhoneId) -> PathBuf {
    state_dir.join(format!("provisioning-{}.ims", phone_id.0))
}

/// Show all settings and provisioning states
async fn cmd_status(manager: &ImsManager, json: bool) -> Result<()> {
    let status = manager.status().await.context("Failed to read status")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!(
        "{} {} {}",
        "📶 IMS status".cyan().bold(),
        status.phone_id,
        status.sub_id
    );

    println!("\n{}", "Settings:".yellow().bold());
    println!("   {} {}", "Enhanced 4G LTE:".dimmed(), on_off(status.enhanced_4g_lte_enabled));
    println!("   {} {}", "Wi-Fi calling:".dimmed(), on_off(status.wfc_enabled));
    println!("   {} {}", "Wi-Fi calling (roaming):".dimmed(), on_off(status.wfc_roaming_enabled));
    println!("   {} {}", "Wi-Fi calling mode:".dimmed(), mode_name(status.wfc_mode));
    println!("   {} {}", "Wi-Fi calling mode (roaming):".dimmed(), mode_name(status.wfc_roaming_mode));
    println!("   {} {}", "Video calling:".dimmed(), on_off(status.vt_enabled));

    println!("\n{}", "Provisioning:".yellow().bold());
    println!("   {} {}", "VoLTE:".dimmed(), yes_no(status.volte_provisioned));
    println!("   {} {}", "Video calling:".dimmed(), yes_no(status.vt_provisioned));
    println!("   {} {}", "Wi-Fi calling:".dimmed(), yes_no(status.wfc_provisioned));

    Ok(())
}

/// Read or change one user setting
async fn cmd_settings(manager: &ImsManager, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Get { setting } => {
            let shown = match setting {
                Setting::Wfc => on_off(manager.is_wfc_enabled_by_user().await?),
                Setting::WfcRoaming => on_off(manager.is_wfc_roaming_enabled_by_user().await?),
                Setting::WfcMode => mode_name(manager.get_wfc_mode(false).await?),
                Setting::WfcRoamingMode => mode_name(manager.get_wfc_mode(true).await?),
                Setting::Vt => on_off(manager.is_vt_enabled_by_user().await?),
                Setting::Enhanced4g => {
                    on_off(manager.is_enhanced_4g_lte_mode_setting_enabled_by_user().await?)
                }
            };
            println!("{:?}: {}", setting, shown);
        }
        SettingsAction::Set { setting, value } => {
            match setting {
                Setting::Wfc => manager.set_wfc_setting(parse_toggle(&value)?).await?,
                Setting::WfcRoaming => manager.set_wfc_roaming_setting(parse_toggle(&value)?).await?,
                Setting::WfcMode => manager.set_wfc_mode(parse_mode(&value)?, false).await?,
                Setting::WfcRoamingMode => manager.set_wfc_mode(parse_mode(&value)?, true).await?,
                Setting::Vt => manager.set_vt_setting(parse_toggle(&value)?).await?,
                Setting::Enhanced4g => {
                    manager
                        .set_enhanced_4g_lte_mode_setting(parse_toggle(&value)?)
                        .await?
                }
            }
            println!("{} {:?} = {}", "✅ Updated".green(), setting, value);
        }
    }

    Ok(())
}

/// Read or change one provisioned value
async fn cmd_provisioning(manager: &ImsManager, action: ProvisioningAction) -> Result<()> {
    let cache = manager.config_interface();

    match action {
        ProvisioningAction::Get { key, string: false } => {
            let value = cache
                .get_provisioned_int(key)
                .await
                .with_context(|| format!("Failed to read {}", key))?;
            println!("{}: {}", key, value);
        }
        ProvisioningAction::Get { key, string: true } => {
            let value = cache
                .get_provisioned_string(key)
                .await
                .with_context(|| format!("Failed to read {}", key))?;
            println!("{}: {}", key, value);
        }
        ProvisioningAction::Set { key, value, string: false } => {
            let parsed: i32 = value
                .trim()
                .parse()
                .with_context(|| format!("'{}' is not an integer (use --string)", value))?;
            cache
                .set_provisioned_int(key, parsed)
                .await
                .with_context(|| format!("Failed to write {}", key))?;
            println!("{} {} = {}", "✅ Provisioned".green(), key, parsed);
        }
        ProvisioningAction::Set { key, value, string: true } => {
            cache
                .set_provisioned_string(key, &value)
                .await
                .with_context(|| format!("Failed to write {}", key))?;
            println!("{} {} = {:?}", "✅ Provisioned".green(), key, value);
        }
    }

    Ok(())
}

fn parse_toggle(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "enabled" => Ok(true),
        "0" | "off" | "false" | "disabled" => Ok(false),
        other => bail!("Expected on or off, got '{}'", other),
    }
}

fn parse_mode(raw: &str) -> Result<i32> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "wifi-only" => Ok(ims_core::WFC_MODE_WIFI_ONLY),
        "cellular-preferred" => Ok(ims_core::WFC_MODE_CELLULAR_PREFERRED),
        "wifi-preferred" => Ok(ims_core::WFC_MODE_WIFI_PREFERRED),
        other => other
            .parse()
            .with_context(|| format!("Unknown Wi-Fi calling mode '{}'", other)),
    }
}

fn on_off(enabled: bool) -> ColoredString {
    if enabled {
        "on".green()
    } else {
        "off".red()
    }
}

fn yes_no(provisioned: bool) -> ColoredString {
    if provisioned {
        "provisioned".green()
    } else {
        "not provisioned".red()
    }
}

fn mode_name(mode: i32) -> ColoredString {
    match mode {
        ims_core::WFC_MODE_WIFI_ONLY => "wifi-only".normal(),
        ims_core::WFC_MODE_CELLULAR_PREFERRED => "cellular-preferred".normal(),
        ims_core::WFC_MODE_WIFI_PREFERRED => "wifi-preferred".normal(),
        other => format!("carrier-specific ({})", other).yellow(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toggle() {
        assert!(parse_toggle("ON").unwrap());
        assert!(!parse_toggle("0").unwrap());
        assert!(parse_toggle("maybe").is_err());
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("wifi-only").unwrap(), 0);
        assert_eq!(parse_mode("2").unwrap(), 2);
        assert!(parse_mode("lte-only").is_err());
    }

    #[test]
    fn test_cli_parses_provisioning_key_by_name() {
        let cli = Cli::try_parse_from([
            "imsctl",
            "provisioning",
            "get",
            "voice_over_wifi_setting_enabled",
        ])
        .unwrap();

        match cli.command {
            Commands::Provisioning {
                action: ProvisioningAction::Get { key, string },
            } => {
                assert_eq!(key, FeatureKey::VOICE_OVER_WIFI_SETTING_ENABLED);
                assert!(!string);
            }
            _ => panic!("expected provisioning get"),
        }
    }

    #[tokio::test]
    async fn test_state_persists_between_runs() {
        let dir = tempfile::tempdir().unwrap();
        let dir_arg = dir.path().to_str().unwrap();
        let args = ["imsctl", "--state-dir", dir_arg, "status"];

        {
            let cli = Cli::try_parse_from(args).unwrap();
            let state = State::open(&cli).await.unwrap();
            state.manager().set_wfc_setting(true).await.unwrap();
            state
                .manager()
                .config_interface()
                .set_provisioned_int(FeatureKey::VLT_SETTING_ENABLED, 0)
                .await
                .unwrap();
            state.flush().await.unwrap();
        }

        let cli = Cli::try_parse_from(args).unwrap();
        let state = State::open(&cli).await.unwrap();
        let manager = state.manager();
        assert!(manager.is_wfc_enabled_by_user().await.unwrap());
        assert_eq!(
            manager
                .config_interface()
                .get_provisioned_int(FeatureKey::VLT_SETTING_ENABLED)
                .await
                .unwrap(),
            0
        );
    }
}
