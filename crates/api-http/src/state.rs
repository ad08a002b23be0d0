//! Shared handler state

use crate::auth::TokenIssuer;
use crate::media::MediaStore;
use crate::rate_limiter::RateLimiter;
use medtrack_core::application::worker::constants::DEFAULT_REFILL_THRESHOLD_DAYS;
use medtrack_core::application::{
    AccountService, InsightsService, MedicationService, TrackingService,
};
use medtrack_core::port::{
    AdherenceRepository, DeviceTokenRepository, MedicationRepository, PasswordHasher,
    RefillRepository, SideEffectRepository, TimeProvider, UserRepository,
};
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_AUTH_BURST: u32 = 10;
const DEFAULT_AUTH_PER_SECOND: u32 = 1;

/// API knobs taken from the daemon settings
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub media_root: PathBuf,
    pub max_upload_bytes: usize,
    pub refill_threshold_days: i64,
    pub auth_burst: u32,
    pub auth_per_second: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            media_root: PathBuf::from(shellexpand::tilde("~/.medtrack/media").into_owned()),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            refill_threshold_days: DEFAULT_REFILL_THRESHOLD_DAYS,
            auth_burst: DEFAULT_AUTH_BURST,
            auth_per_second: DEFAULT_AUTH_PER_SECOND,
        }
    }
}

/// Adapters the API services are assembled from
#[derive(Clone)]
pub struct Ports {
    pub users: Arc<dyn UserRepository>,
    pub medications: Arc<dyn MedicationRepository>,
    pub adherence: Arc<dyn AdherenceRepository>,
    pub refills: Arc<dyn RefillRepository>,
    pub side_effects: Arc<dyn SideEffectRepository>,
    pub devices: Arc<dyn DeviceTokenRepository>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub time: Arc<dyn TimeProvider>,
}

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub medications: Arc<MedicationService>,
    pub tracking: Arc<TrackingService>,
    pub insights: Arc<InsightsService>,
    pub tokens: Arc<TokenIssuer>,
    pub media: Arc<MediaStore>,
    pub auth_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(ports: Ports, settings: &ApiSettings) -> Self {
        Self {
            accounts: Arc::new(AccountService::new(
                ports.users,
                ports.devices,
                ports.hasher,
                ports.time.clone(),
            )),
            medications: Arc::new(MedicationService::new(
                ports.medications.clone(),
                ports.refills.clone(),
                ports.time.clone(),
                settings.refill_threshold_days,
            )),
            tracking: Arc::new(TrackingService::new(
                ports.medications,
                ports.adherence.clone(),
                ports.refills,
                ports.side_effects.clone(),
                ports.time.clone(),
            )),
            insights: Arc::new(InsightsService::new(
                ports.adherence,
                ports.side_effects,
                ports.time,
            )),
            tokens: Arc::new(TokenIssuer::new(
                &settings.jwt_secret,
                settings.token_ttl_hours,
            )),
            media: Arc::new(MediaStore::new(
                settings.media_root.clone(),
                settings.max_upload_bytes,
            )),
            auth_limiter: Arc::new(RateLimiter::new(
                settings.auth_burst,
                settings.auth_per_second,
            )),
        }
    }
}
