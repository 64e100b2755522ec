use std::{collections::HashMap, sync::Arc};

use crate::{
    domain::ProviderKind,
    gateway::port::{DestinationGateway, UnsupportedGateway},
    Error, Result,
};

/// Gateways keyed by provider tag.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<ProviderKind, Arc<dyn DestinationGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gateway under its own provider tag, replacing any previous one.
    pub fn register(&mut self, gateway: Arc<dyn DestinationGateway>) -> &mut Self {
        self.gateways.insert(gateway.provider(), gateway);
        self
    }

    pub fn with(mut self, gateway: Arc<dyn DestinationGateway>) -> Self {
        self.register(gateway);
        self
    }

    /// Register placeholder gateways for every provider that has none.
    pub fn with_unsupported_placeholders(mut self) -> Self {
        for provider in [
            ProviderKind::Telegram,
            ProviderKind::Facebook,
            ProviderKind::WordPress,
        ] {
            self.gateways
                .entry(provider)
                .or_insert_with(|| Arc::new(UnsupportedGateway::new(provider)));
        }
        self
    }

    pub fn resolve(&self, provider: ProviderKind) -> Result<Arc<dyn DestinationGateway>> {
        self.gateways
            .get(&provider)
            .cloned()
            .ok_or_else(|| Error::Unsupported(format!("no gateway registered for {provider}")))
    }

}
