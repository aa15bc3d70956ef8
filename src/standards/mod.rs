//! Vendor standards
//!
//! Wire-format converters that turn vendor stream chunks into
//! [`StreamEvent`](crate::types::StreamEvent)s. Each standard sits behind its
//! own cargo feature.

#[cfg(feature = "azure")]
pub mod azure;
#[cfg(feature = "bedrock")]
pub mod bedrock;
