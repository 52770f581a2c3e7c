// ItWhip Instant Ride SDK: transportation dispatch for hotel properties

pub mod analytics;
pub mod auth;
pub mod client;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod fallback;
pub mod flights;
pub mod hotels;
pub mod mock_server;
pub mod rides;
pub mod transport;

// Re-export key types for convenience
pub use analytics::{Analytics, DemandSnapshot, MissedOpportunity, RevenueReport};
pub use auth::{AccountType, AuthorizationGate, AuthorizationState};
pub use client::{ClientBuilder, InstantRideClient, VersionCheck};
pub use config::{ClientConfig, Environment};
pub use connection::{ConnectionProbe, ConnectionReport, ConnectionState, ConnectionStatus};
pub use dispatcher::{Dispatcher, RequestSpec, ResponseEnvelope, SDK_VERSION};
pub use error::{ActivationRequired, ApiError, ClientError, ErrorRoute};
pub use fallback::fallback;
pub use flights::Flights;
pub use hotels::{HotelSearchParams, Hotels};
pub use rides::{FareEstimate, RideConfirmation, RideRequest, Rides};
pub use transport::{
    install_global_transport, HttpRequest, HttpResponse, ReqwestTransport, Transport,
    TransportError,
};
