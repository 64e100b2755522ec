use async_trait::async_trait;

use crate::{
    domain::{Destination, ImageRef, ProviderKind, SendOptions},
    Error, Result,
};

/// Delivery port for one provider.
///
/// Implementations perform exactly one externally visible delivery attempt per
/// `send_chunk` call (which may fan out into several provider messages) and do
/// not retry. Errors carry the destination's own description. Size limits are
/// the implementation's own settings, so each provider type configures them.
#[async_trait]
pub trait DestinationGateway: Send + Sync {
    fn provider(&self) -> ProviderKind;

    /// Normalize source markup to the subset this provider accepts.
    fn sanitize(&self, text: &str) -> String {
        text.to_string()
    }

    async fn send_chunk(
        &self,
        destination: &Destination,
        text: &str,
        image: Option<&ImageRef>,
        opts: &SendOptions,
    ) -> Result<()>;

    /// Send a small diagnostic message. Never touches drafts.
    async fn test_connection(&self, destination: &Destination) -> Result<()>;
}

/// Placeholder for providers without a delivery implementation.
#[derive(Clone, Copy, Debug)]
pub struct UnsupportedGateway {
    provider: ProviderKind,
}

impl UnsupportedGateway {
    pub fn new(provider: ProviderKind) -> Self {
        Self { provider }
    }

    fn unsupported(&self) -> Error {
        Error::Unsupported(format!("{} publishing is not available yet", self.provider))
    }
}

#[async_trait]
impl DestinationGateway for UnsupportedGateway {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn send_chunk(
        &self,
        _destination: &Destination,
        _text: &str,
        _image: Option<&ImageRef>,
        _opts: &SendOptions,
    ) -> Result<()> {
        Err(self.unsupported())
    }

    async fn test_connection(&self, _destination: &Destination) -> Result<()> {
        Err(self.unsupported())
    }
}
