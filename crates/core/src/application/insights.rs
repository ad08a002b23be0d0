// Insights aggregation

use crate::application::worker::constants::STREAK_PAGE_SIZE;
use crate::domain::{adherence_score, DoseStatus, Insights, StreakCounter, UserId};
use crate::error::Result;
use crate::port::time_provider::start_of_day_millis;
use crate::port::{AdherenceRepository, SideEffectRepository, TimeProvider};
use chrono::Duration;
use std::sync::Arc;
use tracing::debug;

/// Trend window for symptoms and missed doses
pub const INSIGHTS_WINDOW_DAYS: i64 = 30;

pub struct InsightsService {
    adherence: Arc<dyn AdherenceRepository>,
    side_effects: Arc<dyn SideEffectRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl InsightsService {
    pub fn new(
        adherence: Arc<dyn AdherenceRepository>,
        side_effects: Arc<dyn SideEffectRepository>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            adherence,
            side_effects,
            time_provider,
        }
    }

    pub async fn insights(&self, user_id: UserId) -> Result<Insights> {
        let today = self.time_provider.today();
        let window_start = today - Duration::days(INSIGHTS_WINDOW_DAYS);

        let total = self.adherence.count_for_user(user_id, None).await?;
        let taken = self
            .adherence
            .count_for_user(user_id, Some(DoseStatus::Taken))
            .await?;

        let symptom_trends = self
            .side_effects
            .symptom_counts_since(user_id, window_start)
            .await?;
        let missed_dose_breakdown = self
            .adherence
            .missed_reasons_since(user_id, start_of_day_millis(window_start))
            .await?;
        let current_streak = self.current_streak(user_id).await?;

        debug!(
            user_id = %user_id,
            total_logs = total,
            taken = taken,
            streak = current_streak,
            "Insights computed"
        );

        Ok(Insights {
            adherence_score: adherence_score(taken, total),
            symptom_trends,
            missed_dose_breakdown,
            current_streak,
        })
    }

    /// Walk history newest first in pages until the streak breaks
    async fn current_streak(&self, user_id: UserId) -> Result<u32> {
        let mut counter = StreakCounter::default();
        let mut offset = 0;

        loop {
            let page = self
                .adherence
                .statuses_newest_first(user_id, offset, STREAK_PAGE_SIZE)
                .await?;
            let page_len = page.len() as i64;

            for status in page {
                if !counter.push(status) {
                    return Ok(counter.count());
                }
            }

            if page_len < STREAK_PAGE_SIZE {
                return Ok(counter.count());
            }
            offset += page_len;
        }
    }
}
