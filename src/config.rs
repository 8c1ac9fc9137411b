use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::de::Deserializer;
use serde::Deserialize;
use tracing::warn;

use crate::countries::DEFAULT_DIAL_CODE;

const CONFIG_FILE_NAME: &str = "config.toml";
const STORE_FILE_NAME: &str = "contacts.json";
pub const APP_NAME: &str = "agenda";

#[derive(Debug, Clone)]
pub struct Config {
    /// File the settings were read from (may not exist)
    pub config_path: PathBuf,
    pub store_path: PathBuf,
    pub default_country: String,
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub keys: Keys,
    pub ui: UiConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// `None` waits forever
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub colors: UiColors,
}

#[derive(Debug, Clone)]
pub struct UiColors {
    pub border: RgbColor,
    pub selection_bg: RgbColor,
    pub selection_fg: RgbColor,
    pub separator: RgbColor,
    pub status_fg: RgbColor,
    pub status_bg: RgbColor,
    pub favorite: RgbColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(CONFIG_FILE_NAME),
            store_path: default_store_path(),
            default_country: DEFAULT_DIAL_CODE.to_string(),
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            client: ClientConfig {
                base_url: "http://localhost:3000".to_string(),
                timeout: Some(Duration::from_secs(10)),
            },
            keys: Keys::default(),
            ui: UiFile::default().into(),
        }
    }
}

// =============================================================================
// Key Bindings - per context, several bindings per action
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct Keys {
    /// Keys active while the list has focus
    pub global: GlobalKeys,
    pub list: ListKeys,
    /// Keys for the confirmation popup
    pub modal: ModalKeys,
    /// Keys for the add-contact form
    pub form: FormKeys,
}

#[derive(Debug, Clone)]
pub struct GlobalKeys {
    pub quit: Vec<String>,
    pub search: Vec<String>,
    pub add: Vec<String>,
    pub reload: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ListKeys {
    pub next: Vec<String>,
    pub prev: Vec<String>,
    pub favorite: Vec<String>,
    pub delete: Vec<String>,
    pub clear_favorites: Vec<String>,
    pub clear_others: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ModalKeys {
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FormKeys {
    pub next_field: Vec<String>,
    pub prev_field: Vec<String>,
    pub submit: Vec<String>,
    pub cancel: Vec<String>,
    pub next_country: Vec<String>,
    pub prev_country: Vec<String>,
}

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|k| k.to_string()).collect()
}

impl Default for GlobalKeys {
    fn default() -> Self {
        Self {
            quit: keys(&["q"]),
            search: keys(&["/"]),
            add: keys(&["a"]),
            reload: keys(&["r", "F5"]),
        }
    }
}

impl Default for ListKeys {
    fn default() -> Self {
        Self {
            next: keys(&["j", "Down"]),
            prev: keys(&["k", "Up"]),
            favorite: keys(&["f", "Space"]),
            delete: keys(&["d", "Delete"]),
            clear_favorites: keys(&["F"]),
            clear_others: keys(&["D"]),
        }
    }
}

impl Default for ModalKeys {
    fn default() -> Self {
        Self {
            confirm: keys(&["Enter", "y"]),
            cancel: keys(&["Escape", "n", "q"]),
        }
    }
}

impl Default for FormKeys {
    fn default() -> Self {
        Self {
            next_field: keys(&["Tab", "Down"]),
            prev_field: keys(&["Backtab", "Up"]),
            submit: keys(&["Enter"]),
            cancel: keys(&["Escape"]),
            next_country: keys(&["Right"]),
            prev_country: keys(&["Left"]),
        }
    }
}

// =============================================================================
// Serde deserialization types (support both single string and array)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum KeyBinding {
    Single(String),
    Multiple(Vec<String>),
}

impl KeyBinding {
    fn into_vec(self) -> Vec<String> {
        match self {
            KeyBinding::Single(s) => vec![s],
            KeyBinding::Multiple(v) => v,
        }
    }
}

/// Take the configured binding, or keep the default.
fn bind(file: Option<KeyBinding>, default: Vec<String>) -> Vec<String> {
    file.map(KeyBinding::into_vec).unwrap_or(default)
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct KeysFile {
    global: GlobalKeysFile,
    list: ListKeysFile,
    modal: ModalKeysFile,
    form: FormKeysFile,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GlobalKeysFile {
    quit: Option<KeyBinding>,
    search: Option<KeyBinding>,
    add: Option<KeyBinding>,
    reload: Option<KeyBinding>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ListKeysFile {
    next: Option<KeyBinding>,
    prev: Option<KeyBinding>,
    favorite: Option<KeyBinding>,
    delete: Option<KeyBinding>,
    clear_favorites: Option<KeyBinding>,
    clear_others: Option<KeyBinding>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ModalKeysFile {
    confirm: Option<KeyBinding>,
    cancel: Option<KeyBinding>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FormKeysFile {
    next_field: Option<KeyBinding>,
    prev_field: Option<KeyBinding>,
    submit: Option<KeyBinding>,
    cancel: Option<KeyBinding>,
    next_country: Option<KeyBinding>,
    prev_country: Option<KeyBinding>,
}

impl From<KeysFile> for Keys {
    fn from(file: KeysFile) -> Self {
        let global = GlobalKeys::default();
        let list = ListKeys::default();
        let modal = ModalKeys::default();
        let form = FormKeys::default();
        Self {
            global: GlobalKeys {
                quit: bind(file.global.quit, global.quit),
                search: bind(file.global.search, global.search),
                add: bind(file.global.add, global.add),
                reload: bind(file.global.reload, global.reload),
            },
            list: ListKeys {
                next: bind(file.list.next, list.next),
                prev: bind(file.list.prev, list.prev),
                favorite: bind(file.list.favorite, list.favorite),
                delete: bind(file.list.delete, list.delete),
                clear_favorites: bind(file.list.clear_favorites, list.clear_favorites),
                clear_others: bind(file.list.clear_others, list.clear_others),
            },
            modal: ModalKeys {
                confirm: bind(file.modal.confirm, modal.confirm),
                cancel: bind(file.modal.cancel, modal.cancel),
            },
            form: FormKeys {
                next_field: bind(file.form.next_field, form.next_field),
                prev_field: bind(file.form.prev_field, form.prev_field),
                submit: bind(file.form.submit, form.submit),
                cancel: bind(file.form.cancel, form.cancel),
                next_country: bind(file.form.next_country, form.next_country),
                prev_country: bind(file.form.prev_country, form.prev_country),
            },
        }
    }
}

// =============================================================================
// Key binding validation
// =============================================================================

/// Canonical form for collision detection.
/// Single characters keep their case ('D' is Shift+d); key names do not.
fn normalize_binding(binding: &str) -> String {
    let trimmed = binding.trim();
    if trimmed.chars().count() == 1 {
        trimmed.to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

fn check_context_collisions(bindings: &[(&str, &[String])], context_name: &str) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();

    for (action_name, keys) in bindings {
        for key in *keys {
            let normalized = normalize_binding(key);
            if normalized.is_empty() {
                continue;
            }
            if let Some(existing_action) = seen.get(&normalized) {
                bail!(
                    "key binding collision in [keys.{}]: '{}' is bound to both '{}' and '{}'",
                    context_name,
                    key,
                    existing_action,
                    action_name
                );
            }
            seen.insert(normalized, action_name);
        }
    }

    Ok(())
}

fn validate_key_bindings(keys: &Keys) -> Result<()> {
    // Global keys are read in the same place as list keys.
    check_context_collisions(
        &[
            ("quit", &keys.global.quit),
            ("search", &keys.global.search),
            ("add", &keys.global.add),
            ("reload", &keys.global.reload),
            ("next", &keys.list.next),
            ("prev", &keys.list.prev),
            ("favorite", &keys.list.favorite),
            ("delete", &keys.list.delete),
            ("clear_favorites", &keys.list.clear_favorites),
            ("clear_others", &keys.list.clear_others),
        ],
        "global/list",
    )?;

    check_context_collisions(
        &[
            ("confirm", &keys.modal.confirm),
            ("cancel", &keys.modal.cancel),
        ],
        "modal",
    )?;

    check_context_collisions(
        &[
            ("next_field", &keys.form.next_field),
            ("prev_field", &keys.form.prev_field),
            ("submit", &keys.form.submit),
            ("cancel", &keys.form.cancel),
            ("next_country", &keys.form.next_country),
            ("prev_country", &keys.form.prev_country),
        ],
        "form",
    )?;

    Ok(())
}

// =============================================================================
// Config file structure
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    store_path: Option<PathBuf>,
    default_country: Option<String>,
    server: ServerFile,
    client: ClientFile,
    keys: KeysFile,
    ui: UiFile,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ServerFile {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ClientFile {
    base_url: Option<String>,
    /// 0 disables the timeout
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct UiFile {
    colors: UiColorsFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct UiColorsFile {
    border: RgbColor,
    selection_bg: RgbColor,
    selection_fg: RgbColor,
    separator: RgbColor,
    status_fg: RgbColor,
    status_bg: RgbColor,
    favorite: RgbColor,
}

impl Default for UiColorsFile {
    fn default() -> Self {
        Self {
            border: RgbColor::new(255, 165, 0),
            selection_bg: RgbColor::new(255, 165, 0),
            selection_fg: RgbColor::new(0, 0, 0),
            separator: RgbColor::new(255, 165, 0),
            status_fg: RgbColor::new(255, 165, 0),
            status_bg: RgbColor::new(0, 0, 0),
            favorite: RgbColor::new(250, 204, 21),
        }
    }
}

impl From<UiFile> for UiConfig {
    fn from(file: UiFile) -> Self {
        let c = file.colors;
        Self {
            colors: UiColors {
                border: c.border,
                selection_bg: c.selection_bg,
                selection_fg: c.selection_fg,
                separator: c.separator,
                status_fg: c.status_fg,
                status_bg: c.status_bg,
                favorite: c.favorite,
            },
        }
    }
}

impl ConfigFile {
    fn into_config(self, config_path: PathBuf) -> Result<Config> {
        let defaults = Config::default();

        let store_path = self
            .store_path
            .map(|p| expand_tilde(&p))
            .unwrap_or(defaults.store_path);

        let default_country = self
            .default_country
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .unwrap_or(defaults.default_country);

        let server = ServerConfig {
            host: self.server.host.unwrap_or(defaults.server.host),
            port: self.server.port.unwrap_or(defaults.server.port),
        };

        let timeout = match self.client.timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.client.timeout,
        };
        let base_url = self
            .client
            .base_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.client.base_url);

        let keys: Keys = self.keys.into();
        validate_key_bindings(&keys)?;

        Ok(Config {
            config_path,
            store_path,
            default_country,
            server,
            client: ClientConfig { base_url, timeout },
            keys,
            ui: self.ui.into(),
        })
    }
}

// =============================================================================
// Paths
// =============================================================================

/// Expand ~ to home directory in paths
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Directory for the store and the UI log.
pub fn data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.data_dir().join(APP_NAME))
}

fn default_store_path() -> PathBuf {
    data_dir()
        .map(|dir| dir.join(STORE_FILE_NAME))
        .unwrap_or_else(|_| PathBuf::from(STORE_FILE_NAME))
}

// =============================================================================
// Loading
// =============================================================================

/// Read the configuration. A missing file yields the defaults.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => expand_tilde(p),
        None => config_path()?,
    };

    if !path.exists() {
        tracing::debug!(path = %path.display(), "no configuration file, using defaults");
        return Ok(Config {
            config_path: path,
            ..Config::default()
        });
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;
    parse(&raw, path)
}

fn parse(raw: &str, path: PathBuf) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw)
        .with_context(|| format!("failed to parse {} as TOML", path.display()))?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .with_context(|| format!("failed to deserialize config from {}", path.display()))?;

    cfg_file.into_config(path)
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    warn_unknown_in(
        value,
        "",
        &["store_path", "default_country", "server", "client", "keys", "ui"],
    );

    if let Some(v) = table.get("server") {
        warn_unknown_in(v, "server.", &["host", "port"]);
    }
    if let Some(v) = table.get("client") {
        warn_unknown_in(v, "client.", &["base_url", "timeout_secs"]);
    }
    if let Some(keys_val) = table.get("keys") {
        warn_unknown_keys_section(keys_val);
    }
    if let Some(ui_val) = table.get("ui") {
        warn_unknown_in(ui_val, "ui.", &["colors"]);
        if let Some(colors) = ui_val.get("colors") {
            warn_unknown_in(
                colors,
                "ui.colors.",
                &[
                    "border",
                    "selection_bg",
                    "selection_fg",
                    "separator",
                    "status_fg",
                    "status_bg",
                    "favorite",
                ],
            );
        }
    }
}

fn warn_unknown_keys_section(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    warn_unknown_in(value, "keys.", &["global", "list", "modal", "form"]);

    if let Some(v) = table.get("global") {
        warn_unknown_in(v, "keys.global.", &["quit", "search", "add", "reload"]);
    }
    if let Some(v) = table.get("list") {
        warn_unknown_in(
            v,
            "keys.list.",
            &["next", "prev", "favorite", "delete", "clear_favorites", "clear_others"],
        );
    }
    if let Some(v) = table.get("modal") {
        warn_unknown_in(v, "keys.modal.", &["confirm", "cancel"]);
    }
    if let Some(v) = table.get("form") {
        warn_unknown_in(
            v,
            "keys.form.",
            &["next_field", "prev_field", "submit", "cancel", "next_country", "prev_country"],
        );
    }
}

fn warn_unknown_in(value: &toml::Value, prefix: &str, known: &[&str]) {
    let Some(table) = value.as_table() else {
        return;
    };
    let known_set: HashSet<&str> = known.iter().copied().collect();
    for key in table.keys() {
        if !known_set.contains(key.as_str()) {
            warn!("unknown configuration key `{}{}`", prefix, key);
        }
    }
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl<'de> serde::Deserialize<'de> for RgbColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Array([u8; 3]),
            Map { r: u8, g: u8, b: u8 },
        }

        let (r, g, b) = match Helper::deserialize(deserializer)? {
            Helper::Array([r, g, b]) => (r, g, b),
            Helper::Map { r, g, b } => (r, g, b),
        };
        Ok(RgbColor { r, g, b })
    }
}
