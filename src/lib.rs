// Library exports for testing and reusability

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use error::{AppError, Result};

use config::Config;
use services::loop_generator::LoopGenerator;
use services::overpass::{RoadAttributeClient, RoadAttributeSource};
use services::route_scoring::RouteScorer;
use services::routing::{RouteProvider, RoutingClient};
use std::sync::Arc;

// App state for sharing across the application
pub struct AppState {
    pub routing: Arc<RoutingClient>,
    pub loop_generator: LoopGenerator,
    pub route_scorer: RouteScorer,
}

impl AppState {
    /// Wire the backend clients and the services that share them
    pub fn from_config(config: &Config) -> Self {
        let routing = Arc::new(RoutingClient::new(&config.routing));
        let attributes: Arc<dyn RoadAttributeSource> =
            Arc::new(RoadAttributeClient::new(&config.attributes));
        let routes: Arc<dyn RouteProvider> = routing.clone();

        AppState {
            loop_generator: LoopGenerator::new(
                routes.clone(),
                attributes.clone(),
                config.scoring.clone(),
                config.generator.clone(),
            ),
            route_scorer: RouteScorer::new(routes, attributes, config.scoring.clone()),
            routing,
        }
    }
}
