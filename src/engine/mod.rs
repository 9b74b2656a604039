pub mod actions;
pub mod dispatch;
pub mod eta;
pub mod geofence;
pub mod ingest;
pub mod lifecycle;
pub mod location_store;
pub mod retention;
pub mod scoring;
pub mod tracking_link;
