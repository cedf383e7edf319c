//! Capability trait: the callable behind a tool.

use anyhow::Result;
use async_trait::async_trait;

/// Something a tool can do with a single text input.
///
/// Implementations must depend only on their input and their own fixed
/// configuration, never on per-session state, so the same input gives the
/// same request upstream.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Run the capability. Network and parse failures are returned as errors.
    async fn invoke(&self, input: &str) -> Result<String>;
}

/// Adapts a plain synchronous closure into a [`Capability`].
pub struct FnCapability<F>(F);

impl<F> FnCapability<F>
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Capability for FnCapability<F>
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    async fn invoke(&self, input: &str) -> Result<String> {
        (self.0)(input)
    }
}
