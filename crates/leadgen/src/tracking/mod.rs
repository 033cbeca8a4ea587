//! Open pixel, click redirect and delivery webhook handling.

pub mod cascade;
pub mod router;
pub mod service;
pub mod token;

#[cfg(test)]
mod tests;

pub use cascade::{
    apply_delivery, apply_engagement, CascadeEffects, DeliveryUpdate, EngagementHit,
    EngagementKind, EngagementOutcome,
};
pub use router::{tracking_router, TRANSPARENT_GIF};
pub use service::{validate_redirect, BrevoWebhook, ClientInfo, TrackingError, TrackingService};
pub use token::TrackingToken;
