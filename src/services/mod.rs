/// OpenAPI documentation generation.
pub mod documentation;
/// Token extraction and identity verification for incoming connections.
pub mod gateway;
/// Health check service.
pub mod health_service;
/// Read-only room and player projections.
pub mod public_service;
/// Room lifecycle and question flow orchestration.
pub mod room_service;
/// Match reward persistence.
pub mod settlement_service;
/// Storage reconnection loop toggling degraded mode.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
