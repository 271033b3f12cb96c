/// OpenAPI documentation generation.
pub mod documentation;
/// Match operations exposed over HTTP.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Periodic removal of stale matches.
pub mod sweeper;
