//! Stripe Checkout over the REST API.

mod client;
mod params;
mod wire;

pub use client::StripeClient;
