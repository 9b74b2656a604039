pub mod directory;
pub mod dispatch;
pub mod eta;
pub mod geofence;
pub mod location;
pub mod tracking;
