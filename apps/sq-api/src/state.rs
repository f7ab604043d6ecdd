use std::sync::Arc;

use sq_service::{Backends, SmartQuoteService};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<SmartQuoteService>,
}
impl AppState {
	/// Connects Postgres and Qdrant, creating the schema and collection when missing.
	pub async fn new(config: sq_config::Config) -> color_eyre::Result<Self> {
		let backends = Backends::connect(&config).await?;

		Ok(Self::from_service(SmartQuoteService::new(config, backends)))
	}

	pub fn from_service(service: SmartQuoteService) -> Self {
		Self { service: Arc::new(service) }
	}
}
