//! Pluggable settings storage.
//!
//! The [`SettingsBackend`] trait abstracts over where [`AppSettings`] live.
//!
//! Built-in backends:
//! * [`JsonFileBackend`]: a JSON file, written atomically (default).
//! * [`InMemoryBackend`]: nothing on disk, for tests and ephemeral runs.
//! * [`SqliteBackend`]: SQLite (requires the `sqlite-settings` Cargo feature).

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::settings::AppSettings;

// ─── Trait ────────────────────────────────────────────────────────────────────

/// Where and how proxy settings are persisted.
pub trait SettingsBackend: Send + Sync {
    /// Replace the stored settings with `settings`.
    fn save(&self, settings: &AppSettings) -> io::Result<()>;

    /// Load the stored settings, or `None` if nothing was saved yet.
    fn load(&self) -> io::Result<Option<AppSettings>>;

    /// Human-readable name of this backend (for log messages).
    fn name(&self) -> &str;
}

// ─── JsonFileBackend ──────────────────────────────────────────────────────────

/// Stores the settings as pretty-printed JSON.
///
/// Writes go to a sibling `.tmp` file which is then renamed over the
/// target, so a reader never sees a half-written file.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Default for JsonFileBackend {
    fn default() -> Self { Self::new("proxies.json") }
}

impl SettingsBackend for JsonFileBackend {
    fn save(&self, settings: &AppSettings) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(settings)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)
    }

    fn load(&self) -> io::Result<Option<AppSettings>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&self.path)?;
        let settings = serde_json::from_slice(&bytes)?;
        Ok(Some(settings))
    }

    fn name(&self) -> &str { "json-file" }
}

// ─── InMemoryBackend ─────────────────────────────────────────────────────────

/// Keeps the last saved settings in memory and counts writes.
#[derive(Default)]
pub struct InMemoryBackend {
    data:  Mutex<Option<AppSettings>>,
    saves: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `settings` already stored.
    pub fn with_settings(settings: AppSettings) -> Self {
        Self { data: Mutex::new(Some(settings)), saves: AtomicUsize::new(0) }
    }

    /// How many times [`SettingsBackend::save`] was called.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// The last saved settings.
    pub fn stored(&self) -> Option<AppSettings> {
        self.data.lock().ok().and_then(|d| d.clone())
    }
}

impl SettingsBackend for InMemoryBackend {
    fn save(&self, settings: &AppSettings) -> io::Result<()> {
        let mut lock = self.data.lock().map_err(|_| io::Error::other("settings lock poisoned"))?;
        *lock = Some(settings.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self) -> io::Result<Option<AppSettings>> {
        let lock = self.data.lock().map_err(|_| io::Error::other("settings lock poisoned"))?;
        Ok(lock.clone())
    }

    fn name(&self) -> &str { "in-memory" }
}

// ─── SqliteBackend ────────────────────────────────────────────────────────────

#[cfg(feature = "sqlite-settings")]
pub use sqlite_backend::SqliteBackend;

#[cfg(feature = "sqlite-settings")]
mod sqlite_backend {
    use super::*;
    use rusqlite::{Connection, OptionalExtension, params};

    use crate::config::{ProxyConfig, ProxyKind, ProxyMode};

    fn sql_err(e: rusqlite::Error) -> io::Error {
        io::Error::other(e)
    }

    /// SQLite-backed settings store.
    ///
    /// Creates two tables (`meta` and `proxies`) if they do not exist.
    ///
    /// Enable with the `sqlite-settings` Cargo feature:
    /// ```toml
    /// [dependencies]
    /// layer-proxy = { version = "*", features = ["sqlite-settings"] }
    /// ```
    pub struct SqliteBackend {
        path: PathBuf,
    }

    impl SqliteBackend {
        pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
            let path = path.into();
            // Open and initialise the schema immediately so errors surface early.
            let conn = Connection::open(&path).map_err(sql_err)?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS meta (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS proxies (
                    position INTEGER PRIMARY KEY,
                    kind     TEXT    NOT NULL,
                    host     TEXT    NOT NULL,
                    port     INTEGER NOT NULL,
                    user     TEXT    NOT NULL DEFAULT '',
                    password TEXT    NOT NULL DEFAULT ''
                );",
            ).map_err(sql_err)?;
            Ok(Self { path })
        }
    }

    fn kind_name(kind: ProxyKind) -> &'static str {
        match kind {
            ProxyKind::None    => "none",
            ProxyKind::Socks5  => "socks5",
            ProxyKind::Http    => "http",
            ProxyKind::Mtproto => "mtproto",
        }
    }

    fn kind_from_name(name: &str) -> ProxyKind {
        match name {
            "socks5"  => ProxyKind::Socks5,
            "http"    => ProxyKind::Http,
            "mtproto" => ProxyKind::Mtproto,
            _         => ProxyKind::None,
        }
    }

    fn mode_from_name(name: &str) -> ProxyMode {
        match name {
            "enabled"  => ProxyMode::Enabled,
            "disabled" => ProxyMode::Disabled,
            _          => ProxyMode::System,
        }
    }

    impl SettingsBackend for SqliteBackend {
        fn save(&self, settings: &AppSettings) -> io::Result<()> {
            let mut conn = Connection::open(&self.path).map_err(sql_err)?;
            let tx = conn.transaction().map_err(sql_err)?;

            let selected = match &settings.selected {
                Some(config) => serde_json::to_string(config)?,
                None => String::new(),
            };
            let meta = [
                ("mode",                settings.mode.to_string()),
                ("selected",            selected),
                ("use_proxy_for_calls", (settings.use_proxy_for_calls as u8).to_string()),
                ("try_ipv6",            (settings.try_ipv6 as u8).to_string()),
            ];
            for (key, value) in meta {
                tx.execute(
                    "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
                    params![key, value],
                ).map_err(sql_err)?;
            }

            tx.execute("DELETE FROM proxies", []).map_err(sql_err)?;
            for (position, p) in settings.proxies.iter().enumerate() {
                tx.execute(
                    "INSERT INTO proxies (position, kind, host, port, user, password)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![position as i64, kind_name(p.kind), p.host, p.port, p.user, p.password],
                ).map_err(sql_err)?;
            }
            tx.commit().map_err(sql_err)
        }

        fn load(&self) -> io::Result<Option<AppSettings>> {
            if !self.path.exists() {
                return Ok(None);
            }
            let conn = Connection::open(&self.path).map_err(sql_err)?;

            let meta = |key: &str| -> io::Result<Option<String>> {
                conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0))
                    .optional()
                    .map_err(sql_err)
            };

            let mode = match meta("mode")? {
                Some(mode) => mode_from_name(&mode),
                None => return Ok(None),
            };
            let selected = match meta("selected")?.as_deref() {
                None | Some("") => None,
                Some(json) => Some(serde_json::from_str::<ProxyConfig>(json)?),
            };
            let defaults = AppSettings::default();
            let use_proxy_for_calls = meta("use_proxy_for_calls")?
                .map_or(defaults.use_proxy_for_calls, |v| v == "1");
            let try_ipv6 = meta("try_ipv6")?.map_or(defaults.try_ipv6, |v| v == "1");

            let mut stmt = conn
                .prepare("SELECT kind, host, port, user, password FROM proxies ORDER BY position")
                .map_err(sql_err)?;
            let proxies: Vec<ProxyConfig> = stmt
                .query_map([], |row| {
                    let kind:     String = row.get(0)?;
                    let host:     String = row.get(1)?;
                    let port:     u16    = row.get(2)?;
                    let user:     String = row.get(3)?;
                    let password: String = row.get(4)?;
                    Ok(ProxyConfig { kind: kind_from_name(&kind), host, port, user, password })
                })
                .map_err(sql_err)?
                .filter_map(|r| match r {
                    Ok(proxy) => Some(proxy),
                    Err(e) => {
                        tracing::warn!("[proxy] Skipping unreadable proxy row in {}: {e}", self.path.display());
                        None
                    }
                })
                .collect();

            Ok(Some(AppSettings { proxies, selected, mode, use_proxy_for_calls, try_ipv6 }))
        }

        fn name(&self) -> &str { "sqlite" }
    }
}
