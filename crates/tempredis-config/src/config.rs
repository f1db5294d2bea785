//! The directive map handed to the supervised server.

use std::collections::BTreeMap;
use std::collections::btree_map;

use camino::Utf8PathBuf;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::defaults::{DEFAULT_BIND, DEFAULT_PORT, URL_SCHEME};
use crate::endpoint::Endpoint;

/// Directive naming the interface the server binds to.
pub const BIND_KEY: &str = "bind";
/// Directive naming the TCP port the server listens on.
pub const PORT_KEY: &str = "port";
/// Directive holding the password clients must present.
pub const PASSWORD_KEY: &str = "requirepass";
/// Directive naming the Unix domain socket the server listens on.
pub const SOCKET_KEY: &str = "unixsocket";

/// Characters escaped in the userinfo component of a connection URL.
const USERINFO: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Configuration directives fed to the server on startup.
///
/// Keys are opaque and passed through untouched. Entries are kept in key
/// order so the serialised form is deterministic, although the server does
/// not depend on ordering for any directive this crate manages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerConfig {
    entries: BTreeMap<String, String>,
}

impl ServerConfig {
    /// Creates an empty configuration; every directive takes its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the configuration with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets `key` to `value`, returning the previous value if any.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// Looks up the raw value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Reports whether `key` is explicitly configured.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of configured directives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether no directive is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the directives in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Interface the server binds to, defaulting to [`DEFAULT_BIND`].
    #[must_use]
    pub fn bind(&self) -> &str {
        self.get(BIND_KEY).unwrap_or(DEFAULT_BIND)
    }

    /// Port the server listens on, defaulting to [`DEFAULT_PORT`].
    #[must_use]
    pub fn port(&self) -> &str {
        self.get(PORT_KEY).unwrap_or(DEFAULT_PORT)
    }

    /// Password required by the server; empty when authentication is off.
    #[must_use]
    pub fn password(&self) -> &str {
        self.get(PASSWORD_KEY).unwrap_or_default()
    }

    /// Unix socket path exactly as configured.
    #[must_use]
    pub fn socket(&self) -> Option<&str> {
        self.get(SOCKET_KEY)
    }

    /// Dial-able `bind:port` address of the server.
    #[must_use]
    pub fn host(&self) -> String {
        format!("{}:{}", self.bind(), self.port())
    }

    /// Alias of [`ServerConfig::host`].
    #[must_use]
    pub fn address(&self) -> String {
        self.host()
    }

    /// Connection URL for the server.
    ///
    /// When a password is configured it is embedded with an empty username,
    /// e.g. `redis://:secret@127.0.0.1:6379`.
    #[must_use]
    pub fn url(&self) -> String {
        let password = self.password();
        if password.is_empty() {
            return format!("{URL_SCHEME}://{}", self.host());
        }
        let encoded = utf8_percent_encode(password, USERINFO);
        format!("{URL_SCHEME}://:{encoded}@{}", self.host())
    }

    /// The endpoint clients should dial: the socket when one is configured,
    /// the TCP address otherwise.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        match self.socket() {
            Some(path) => Endpoint::unix(Utf8PathBuf::from(path)),
            None => Endpoint::tcp(self.bind(), self.port()),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for ServerConfig
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = Self::new();
        config.extend(iter);
        config
    }
}

impl<K, V> Extend<(K, V)> for ServerConfig
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

impl<'a> IntoIterator for &'a ServerConfig {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ServerConfig::new();

        assert_eq!(config.host(), "127.0.0.1:6379");
        assert_eq!(config.password(), "");
        assert_eq!(config.url(), "redis://127.0.0.1:6379");
        assert_eq!(config.socket(), None);
    }

    #[test]
    fn explicit_bind_port_and_password_are_used() {
        let config = ServerConfig::new()
            .with("bind", "127.0.0.1")
            .with("port", "1234")
            .with("requirepass", "pw");

        assert_eq!(config.address(), "127.0.0.1:1234");
        assert_eq!(config.password(), "pw");
    }

    #[test]
    fn url_embeds_password_with_empty_username() {
        let config: ServerConfig = [("requirepass", "letmein")].into_iter().collect();

        assert_eq!(config.url(), "redis://:letmein@127.0.0.1:6379");
    }

    #[test]
    fn empty_password_is_not_embedded() {
        let config = ServerConfig::new().with("requirepass", "");

        assert_eq!(config.url(), "redis://127.0.0.1:6379");
    }

    #[rstest]
    #[case("p@ss:word", "redis://:p%40ss%3Aword@127.0.0.1:6379")]
    #[case("with space", "redis://:with%20space@127.0.0.1:6379")]
    #[case("100%", "redis://:100%25@127.0.0.1:6379")]
    fn url_escapes_reserved_password_characters(#[case] password: &str, #[case] expected: &str) {
        let config = ServerConfig::new().with("requirepass", password);

        assert_eq!(config.url(), expected);
    }

    #[test]
    fn socket_is_returned_verbatim() {
        let config = ServerConfig::new().with("unixsocket", "relative/redis.sock");

        assert_eq!(config.socket(), Some("relative/redis.sock"));
        assert_eq!(
            config.endpoint(),
            Endpoint::unix(Utf8PathBuf::from("relative/redis.sock"))
        );
    }

    #[test]
    fn endpoint_defaults_to_tcp() {
        let config = ServerConfig::new().with("port", "7000");

        assert_eq!(config.endpoint(), Endpoint::tcp("127.0.0.1", "7000"));
    }

    #[test]
    fn set_reports_previous_value() {
        let mut config = ServerConfig::new();

        assert_eq!(config.set("port", "1"), None);
        assert_eq!(config.set("port", "2"), Some(String::from("1")));
        assert_eq!(config.len(), 1);
        assert_eq!(config.remove("port"), Some(String::from("2")));
        assert!(config.is_empty());
    }

    #[test]
    fn deserialises_from_json_object() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"port": "11001", "databases": "8"}"#).expect("valid json");

        assert_eq!(config.port(), "11001");
        assert_eq!(config.get("databases"), Some("8"));
    }
}
