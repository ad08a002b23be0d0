// Refill alert scanner
//
// Finds medications close to running out and enqueues one push delivery per
// device token per day. Sending is left to the push worker.

use crate::application::worker::ShutdownToken;
use crate::domain::{Medication, PushDelivery, RefillEstimate};
use crate::error::Result;
use crate::port::{
    DeviceTokenRepository, IdProvider, MedicationRepository, PushDeliveryRepository,
    RefillRepository, TimeProvider,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info};

pub const REFILL_ALERT_TITLE: &str = "Refill reminder";

/// Outcome of one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub medications_checked: usize,
    pub alerts_due: usize,
    pub enqueued: usize,
    pub duplicates: usize,
}

/// Delivery settings stamped on every enqueued alert
#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub threshold_days: i64,
    pub max_attempts: i32,
    pub retry_delay_ms: i64,
}

pub struct RefillAlertScanner {
    medications: Arc<dyn MedicationRepository>,
    refills: Arc<dyn RefillRepository>,
    devices: Arc<dyn DeviceTokenRepository>,
    deliveries: Arc<dyn PushDeliveryRepository>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    settings: AlertSettings,
}

impl RefillAlertScanner {
    pub fn new(
        medications: Arc<dyn MedicationRepository>,
        refills: Arc<dyn RefillRepository>,
        devices: Arc<dyn DeviceTokenRepository>,
        deliveries: Arc<dyn PushDeliveryRepository>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        settings: AlertSettings,
    ) -> Self {
        Self {
            medications,
            refills,
            devices,
            deliveries,
            id_provider,
            time_provider,
            settings,
        }
    }

    /// Scan all tracked medications once
    pub async fn scan(&self) -> Result<ScanReport> {
        let today = self.time_provider.today();
        let mut report = ScanReport::default();

        for medication in self.medications.list_refill_tracked().await? {
            report.medications_checked += 1;

            let last_refill = self.refills.latest_for_medication(medication.id).await?;
            let Some(estimate) =
                medication.refill_estimate(last_refill, today, self.settings.threshold_days)
            else {
                continue;
            };
            if !estimate.needs_refill {
                continue;
            }
            report.alerts_due += 1;

            for device in self.devices.list_for_user(medication.user_id).await? {
                let dedup_key = format!("refill:{}:{}:{}", medication.id, device.id, today);
                let delivery = self.build_delivery(&medication, &estimate, &device.token, dedup_key);

                if self.deliveries.enqueue(&delivery).await? {
                    report.enqueued += 1;
                    debug!(
                        delivery_id = %delivery.id,
                        medication_id = %medication.id,
                        days_left = estimate.days_left,
                        "Refill alert enqueued"
                    );
                } else {
                    report.duplicates += 1;
                }
            }
        }

        info!(
            checked = report.medications_checked,
            due = report.alerts_due,
            enqueued = report.enqueued,
            duplicates = report.duplicates,
            "Refill alert scan complete"
        );
        Ok(report)
    }

    fn build_delivery(
        &self,
        medication: &Medication,
        estimate: &RefillEstimate,
        token: &str,
        dedup_key: String,
    ) -> PushDelivery {
        let mut delivery = PushDelivery::new(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            medication.user_id,
            token,
            dedup_key,
            REFILL_ALERT_TITLE,
            refill_alert_body(&medication.name, estimate.days_left),
            json!({
                "type": "refill_alert",
                "medication_id": medication.id.to_string(),
            }),
        );
        delivery.medication_id = Some(medication.id);
        delivery.max_attempts = self.settings.max_attempts;
        delivery.retry_delay_ms = self.settings.retry_delay_ms;
        delivery
    }
}

/// Notification text for the remaining supply
pub fn refill_alert_body(name: &str, days_left: i64) -> String {
    match days_left {
        d if d < 0 => format!("You have run out of {}.", name),
        0 => format!("You'll run out of {} today.", name),
        1 => format!("You'll run out of {} in 1 day.", name),
        d => format!("You'll run out of {} in {} days.", name, d),
    }
}

/// Runs the scanner on a fixed interval, first tick immediately
pub struct RefillAlertScheduler {
    scanner: Arc<RefillAlertScanner>,
    interval: Duration,
}

impl RefillAlertScheduler {
    pub fn new(scanner: Arc<RefillAlertScanner>, interval: Duration) -> Self {
        Self { scanner, interval }
    }

    /// Scan loop (background task)
    ///
    /// Should be spawned in tokio::spawn
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Refill alert scheduler started"
        );

        let mut tick = interval(self.interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {},
                _ = shutdown.wait() => break,
            }
            if shutdown.is_shutdown() {
                break;
            }

            if let Err(e) = self.scanner.scan().await {
                error!(error = %e, "Refill alert scan failed");
            }
        }

        info!("Refill alert scheduler stopped");
    }
}
