//! INI configuration for socket handlers.
//!
//! Reads a section such as
//!
//! ```ini
//! [logstash]
//! host = logs.internal
//! port = 4560
//! protocol = tls_tcp
//! tls_domain = logs.internal
//! tags = api, eu-west
//! ```
//!
//! into a [`SocketHandlerBuilder`]. The file is decoded with `encoding_rs`
//! before `rust-ini` parses it; validation of the values themselves is left
//! to the builder.

use std::{fs, io, path::Path, str::FromStr};

use encoding_rs::Encoding;
use ini::Ini;
use thiserror::Error;

use crate::{handlers::SocketHandlerBuilder, socket_handler::Protocol};

/// Errors raised while loading a socket handler configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} doesn't exist")]
    NotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{0} is an empty file")]
    Empty(String),
    #[error("unknown encoding {0}")]
    UnknownEncoding(String),
    #[error("{path} is not valid {encoding}")]
    Decode { path: String, encoding: &'static str },
    #[error("{path} is invalid: {message}")]
    Invalid { path: String, message: String },
    #[error("section [{0}] not found")]
    MissingSection(String),
    #[error("unknown key {key:?} in section [{section}]")]
    UnknownKey { section: String, key: String },
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Load `section` of the INI file at `path`.
///
/// `encoding` is the charset of the file itself (default UTF-8), not the
/// wire encoding, which is the section's `encoding` key.
pub fn load_socket_config(
    path: impl AsRef<Path>,
    section: &str,
    encoding: Option<&str>,
) -> Result<SocketHandlerBuilder, ConfigError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let bytes = read_file_bytes(path, &display)?;
    if bytes.is_empty() {
        return Err(ConfigError::Empty(display));
    }
    let text = decode_contents(&bytes, encoding, &display)?;
    parse_socket_section_at(&display, &text, section)
}

/// Parse `section` from INI text already held in memory.
pub fn parse_socket_section(text: &str, section: &str) -> Result<SocketHandlerBuilder, ConfigError> {
    parse_socket_section_at("<string>", text, section)
}

fn read_file_bytes(path: &Path, display: &str) -> Result<Vec<u8>, ConfigError> {
    fs::read(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => ConfigError::NotFound(display.to_owned()),
        _ => ConfigError::Io {
            path: display.to_owned(),
            source: err,
        },
    })
}

fn decode_contents(bytes: &[u8], label: Option<&str>, path: &str) -> Result<String, ConfigError> {
    let encoding = match label {
        Some(label) => {
            let normalized = label.trim().to_ascii_lowercase();
            Encoding::for_label(normalized.as_bytes())
                .ok_or_else(|| ConfigError::UnknownEncoding(label.to_owned()))?
        }
        None => encoding_rs::UTF_8,
    };
    let (decoded, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(ConfigError::Decode {
            path: path.to_owned(),
            encoding: encoding.name(),
        });
    }
    Ok(decoded.into_owned())
}

fn parse_socket_section_at(
    path: &str,
    text: &str,
    section: &str,
) -> Result<SocketHandlerBuilder, ConfigError> {
    let ini = Ini::load_from_str(text).map_err(|err| ConfigError::Invalid {
        path: path.to_owned(),
        message: err.to_string(),
    })?;
    let props = ini
        .section(Some(section))
        .ok_or_else(|| ConfigError::MissingSection(section.to_owned()))?;

    let mut builder = SocketHandlerBuilder::new();
    let mut tls_domain = None;
    let mut tls_insecure = None;
    for (key, value) in props.iter() {
        let value = value.trim();
        builder = match key.trim().to_ascii_lowercase().as_str() {
            "host" => builder.with_host(value),
            "port" => builder.with_port(parse_value(key, value)?),
            "protocol" => builder.with_protocol(parse_value::<Protocol>(key, value)?),
            "connect_timeout_ms" => builder.with_connect_timeout_ms(parse_value(key, value)?),
            "encoding" => builder.with_encoding(value),
            "auto_flush" => builder.with_auto_flush(parse_bool(key, value)?),
            "tags" => builder.with_tags(split_list(value)),
            "tls_domain" => {
                tls_domain = Some(value.to_owned());
                builder
            }
            "tls_insecure" => {
                tls_insecure = Some(parse_bool(key, value)?);
                builder
            }
            _ => {
                return Err(ConfigError::UnknownKey {
                    section: section.to_owned(),
                    key: key.to_owned(),
                });
            }
        };
    }
    if tls_domain.is_some() || tls_insecure.is_some() {
        builder = builder.with_tls(tls_domain, tls_insecure.unwrap_or(false));
    }
    Ok(builder)
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    value.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
        reason: err.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_owned(),
            value: value.to_owned(),
            reason: "expected a boolean".into(),
        }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}
