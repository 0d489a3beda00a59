//! In-process test harness: an HTTP [`TestClient`] and a channel-protocol
//! [`ChannelTestHarness`].
mod channel;
mod client;
mod cookie;

pub use channel::ChannelTestHarness;
pub use client::{RequestBuilder, TestClient, TestResponse};
pub use cookie::CookieJar;
