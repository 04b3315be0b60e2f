//! Handler builders and associated traits.
//!
//! Provides a minimal builder API for constructing handlers in a
//! type‑safe manner. Each builder implements [`HandlerBuilderTrait`], which
//! validates the collected options before producing the handler.

use std::{io, sync::Arc};

use thiserror::Error;

use crate::handler::Handler;

pub mod socket_builder;

pub use socket_builder::SocketHandlerBuilder;

/// Errors that may occur while building a handler.
#[derive(Debug, Error)]
pub enum HandlerBuildError {
    /// Invalid user supplied configuration.
    #[error("invalid handler configuration: {0}")]
    InvalidConfig(String),
    /// Underlying I/O error whilst creating the handler.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Trait implemented by all handler builders.
pub trait HandlerBuilderTrait: Send + Sync {
    /// Concrete handler produced by the builder.
    type Handler: Handler + 'static;

    /// Validate the options and build the concrete handler.
    fn build_inner(&self) -> Result<Self::Handler, HandlerBuildError>;

    /// Build the handler as a shareable trait object, ready to be used as a
    /// fallback sink or registered elsewhere.
    fn build(&self) -> Result<Arc<dyn Handler>, HandlerBuildError> {
        Ok(Arc::new(self.build_inner()?))
    }
}
