//! PinCodeAllocator - generate-and-check PIN allocation
//!
//! The pre-check is optimistic: two allocators can pick the same free code
//! concurrently. The `credentials.pin_code` unique index catches that at
//! insert time and provisioning re-allocates.

use crate::error::{EngineError, EngineResult};
use crate::services::ServiceContext;
use billbank_core::PinCode;
use billbank_persistence::CredentialRepo;
use rand::Rng;
use tracing::{debug, warn};

/// Source of candidate PIN codes. Candidates are range-checked by the
/// allocator.
pub trait PinGenerator: Send + Sync {
    fn generate(&self) -> i64;
}

/// Uniform over `PinCode::MIN..=PinCode::MAX`
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPinGenerator;

impl PinGenerator for RandomPinGenerator {
    fn generate(&self) -> i64 {
        rand::thread_rng().gen_range(PinCode::MIN..=PinCode::MAX) as i64
    }
}

pub struct PinCodeAllocator<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> PinCodeAllocator<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// A code no current credential holds, or `PinAllocationExhausted`
    /// after `pin.max_attempts` collisions
    pub async fn allocate(&self) -> EngineResult<PinCode> {
        let max_attempts = self.ctx.config().pin.max_attempts;

        for attempt in 1..=max_attempts {
            let candidate = PinCode::new(self.ctx.pin_generator().generate())?;
            if !CredentialRepo::pin_exists(self.ctx.pool(), candidate).await? {
                return Ok(candidate);
            }
            debug!(attempt, "PIN collision, regenerating");
        }

        warn!(attempts = max_attempts, "PIN allocation exhausted");
        Err(EngineError::PinAllocationExhausted {
            attempts: max_attempts,
        })
    }
}
