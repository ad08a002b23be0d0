// MedTrack Infrastructure - Push Adapter
// Implements: PushGateway (FCM legacy HTTP API)

pub mod fcm;

pub use fcm::{FcmConfig, FcmGateway, DEFAULT_FCM_URL};
