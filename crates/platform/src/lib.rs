//! `sl-platform` — HTTP clients for the sensor platform.
//!
//! Two concerns live here, both created once at startup and shared for the
//! process lifetime:
//!
//! - [`token`] — the OAuth2 client-credentials exchange against the
//!   identity endpoint ([`IdentityClient`]) and the process-wide
//!   [`TokenCache`] that serializes refreshes so concurrent deliveries
//!   never race the identity endpoint.
//! - [`devices`] — the device API client ([`DeviceApiClient`]) that applies
//!   label mutations with bounded retry and exponential back-off.
//!
//! Both sit behind small async traits ([`TokenProvider`], [`DeviceApi`]) so
//! the gateway can be exercised end-to-end without a live platform.

pub mod devices;
pub mod token;

pub use devices::{Ack, DeviceApi, DeviceApiClient};
pub use token::{AccessToken, IdentityClient, ServiceAccount, TokenCache, TokenProvider};
