//! Builder for [`SocketHandler`](crate::socket_handler::SocketHandler).
//!
//! Exposes endpoint and protocol selection, TLS configuration, connect
//! timeout tuning, wire encoding and the fallback chain. Options are kept
//! raw until [`HandlerBuilderTrait::build_inner`] validates them, so the
//! builder can be filled from untrusted sources such as configuration files.

use std::{fmt, net::IpAddr, sync::Arc, time::Duration};

use encoding_rs::Encoding;

use crate::{
    diagnostics::Diagnostics,
    formatter::{Formatter, LogstashFormatter, SharedFormatter, SourceContext},
    handler::Handler,
    socket_handler::{
        Clock, DEFAULT_PORT, Protocol, SocketHandler, SocketHandlerConfig, TlsOptions,
        TransportConfig, resolve_host,
    },
};

use super::{HandlerBuildError, HandlerBuilderTrait};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct TlsConfig {
    domain: Option<String>,
    insecure: bool,
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(HandlerBuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`SocketHandler`] instances.
#[derive(Clone, Default)]
pub struct SocketHandlerBuilder {
    host: Option<String>,
    address: Option<IpAddr>,
    port: Option<u16>,
    protocol: Option<Protocol>,
    tls: Option<TlsConfig>,
    connect_timeout_ms: Option<u64>,
    encoding: Option<String>,
    auto_flush: Option<bool>,
    tags: Option<Vec<String>>,
    formatter: Option<SharedFormatter>,
    fallback: Vec<Arc<dyn Handler>>,
    diagnostics: Option<Arc<dyn Diagnostics>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SocketHandlerBuilder {
    /// Create a new builder with no endpoint configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Target `host`, resolved when the handler is built.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    option_setter!(
        #[doc = "Target an already resolved address, skipping name lookup."]
        with_address,
        address,
        IpAddr
    );
    option_setter!(with_port, port, u16);
    option_setter!(with_protocol, protocol, Protocol);
    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(
        #[doc = "Flush after every record (the default) or only on `flush`."]
        with_auto_flush,
        auto_flush,
        bool
    );

    /// Configure TLS using the provided domain and validation policy.
    pub fn with_tls(mut self, domain: Option<String>, insecure: bool) -> Self {
        self.tls = Some(TlsConfig { domain, insecure });
        self
    }

    /// Wire charset, as a WHATWG encoding label such as `utf-8` or `latin1`.
    pub fn with_encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    /// Tags attached to every event by the default logstash formatter.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_formatter<F: Formatter + 'static>(mut self, formatter: F) -> Self {
        self.formatter = Some(SharedFormatter::new(formatter));
        self
    }

    /// Append a sink to the fallback chain.
    pub fn with_fallback(mut self, sink: Arc<dyn Handler>) -> Self {
        self.fallback.push(sink);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    fn validate(&self) -> Result<(), HandlerBuildError> {
        self.validate_endpoint()?;
        self.validate_tls()?;
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if self.tags.is_some() && self.formatter.is_some() {
            return Err(HandlerBuildError::InvalidConfig(
                "tags only apply to the default formatter".into(),
            ));
        }
        Ok(())
    }

    fn validate_endpoint(&self) -> Result<(), HandlerBuildError> {
        match (&self.host, self.address) {
            (None, None) => Err(HandlerBuildError::InvalidConfig(
                "socket handler requires a host or address".into(),
            )),
            (Some(host), None) if host.trim().is_empty() => Err(
                HandlerBuildError::InvalidConfig("host must not be empty".into()),
            ),
            _ => {
                if let Some(port) = self.port {
                    ensure_positive!(port, "port")?;
                }
                Ok(())
            }
        }
    }

    fn validate_tls(&self) -> Result<(), HandlerBuildError> {
        if self.tls.is_some() && self.protocol() != Protocol::TlsTcp {
            return Err(HandlerBuildError::InvalidConfig(format!(
                "tls options require the {} protocol, not {}",
                Protocol::TlsTcp,
                self.protocol()
            )));
        }
        Ok(())
    }

    fn protocol(&self) -> Protocol {
        self.protocol.unwrap_or_default()
    }

    fn resolve_encoding(&self) -> Result<&'static Encoding, HandlerBuildError> {
        let Some(label) = &self.encoding else {
            return Ok(encoding_rs::UTF_8);
        };
        let encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            HandlerBuildError::InvalidConfig(format!("unknown encoding: {label}"))
        })?;
        // UTF-16 and the replacement encoding only decode; encoding_rs would
        // silently emit UTF-8 for them.
        if encoding.output_encoding() != encoding {
            return Err(HandlerBuildError::InvalidConfig(format!(
                "encoding {label} cannot be used for output"
            )));
        }
        Ok(encoding)
    }

    fn build_transport(&self) -> Result<TransportConfig, HandlerBuildError> {
        let port = self.port.unwrap_or(DEFAULT_PORT);
        let mut transport = match (self.address, &self.host) {
            (Some(address), host) => {
                let mut transport = TransportConfig::new(self.protocol(), address, port);
                if let Some(host) = host {
                    transport.host = host.trim().to_owned();
                }
                transport
            }
            (None, Some(host)) => {
                let host = host.trim();
                let mut transport =
                    TransportConfig::new(self.protocol(), resolve_host(host)?, port);
                transport.host = host.to_owned();
                transport
            }
            (None, None) => {
                return Err(HandlerBuildError::InvalidConfig(
                    "socket handler requires a host or address".into(),
                ));
            }
        };
        if let Some(tls) = &self.tls {
            transport.tls = TlsOptions {
                domain: tls.domain.clone().filter(|d| !d.trim().is_empty()),
                insecure_skip_verify: tls.insecure,
            };
        }
        if let Some(timeout) = self.connect_timeout_ms {
            transport.connect_timeout = Duration::from_millis(timeout);
        }
        Ok(transport)
    }

    /// Validate the options and produce the handler configuration.
    pub fn build_config(&self) -> Result<SocketHandlerConfig, HandlerBuildError> {
        self.validate()?;
        let mut config = SocketHandlerConfig::default().with_transport(self.build_transport()?);
        config.encoding = self.resolve_encoding()?;
        if let Some(auto_flush) = self.auto_flush {
            config.auto_flush = auto_flush;
        }
        Ok(config)
    }

    fn build_formatter(&self) -> SharedFormatter {
        if let Some(formatter) = &self.formatter {
            return formatter.clone();
        }
        let formatter = match &self.tags {
            Some(tags) => LogstashFormatter::with_context(SourceContext::new(
                SourceContext::global().host(),
                tags.iter().cloned(),
            )),
            None => LogstashFormatter::new(),
        };
        SharedFormatter::new(formatter)
    }
}

impl HandlerBuilderTrait for SocketHandlerBuilder {
    type Handler = SocketHandler;

    fn build_inner(&self) -> Result<Self::Handler, HandlerBuildError> {
        let config = self.build_config()?;
        let mut handler = SocketHandler::with_config(config)
            .with_shared_formatter(self.build_formatter())
            .with_fallback(self.fallback.clone());
        if let Some(diagnostics) = &self.diagnostics {
            handler = handler.with_diagnostics(Arc::clone(diagnostics));
        }
        if let Some(clock) = &self.clock {
            handler = handler.with_clock(Arc::clone(clock));
        }
        Ok(handler)
    }
}

impl fmt::Debug for SocketHandlerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketHandlerBuilder")
            .field("host", &self.host)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("tls", &self.tls)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("encoding", &self.encoding)
            .field("auto_flush", &self.auto_flush)
            .field("tags", &self.tags)
            .field("custom_formatter", &self.formatter.is_some())
            .field("fallback_sinks", &self.fallback.len())
            .finish()
    }
}
