//! API route modules.

use std::sync::Arc;

use crate::meeting::MeetingRegistry;

pub mod agents;
pub mod meetings;
pub mod observe;

/// Shared state for every route: the live meeting registry.
pub type AppState = Arc<MeetingRegistry>;
