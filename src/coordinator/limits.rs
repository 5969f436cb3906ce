//! Per-platform posting limits, cooldowns, and the hourly rate-limit guard

use chrono::{DateTime, Duration, Utc};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::collections::HashMap;
use std::num::NonZeroU32;

use crate::models::Platform;

/// Posting limits for one platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformLimits {
    /// Maximum posts per rolling hour
    pub hourly_limit: u32,

    /// Maximum posts per rolling day
    pub daily_limit: u32,
}

impl PlatformLimits {
    /// Built-in limits per platform
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Twitter => Self {
                hourly_limit: 15,
                daily_limit: 100,
            },
            Platform::Mastodon => Self {
                hourly_limit: 25,
                daily_limit: 200,
            },
            Platform::Bluesky => Self {
                hourly_limit: 20,
                daily_limit: 150,
            },
        }
    }
}

/// Tracks cooldown deadlines and holds a process-level hourly rate limiter
/// per platform
///
/// The rate limiters are a fast-path guard; the authoritative hourly/daily
/// accounting happens against the coordinator's posted history.
pub struct Pacer {
    cooldowns: HashMap<Platform, DateTime<Utc>>,
    limiters: HashMap<Platform, RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl Pacer {
    /// Create a pacer covering all platforms
    pub fn new() -> Self {
        let mut limiters = HashMap::new();
        for platform in Platform::all() {
            let limits = PlatformLimits::for_platform(platform);
            let rate = NonZeroU32::new(limits.hourly_limit)
                .unwrap_or_else(|| NonZeroU32::new(1).expect("1 is non-zero"));
            limiters.insert(platform, RateLimiter::direct(Quota::per_hour(rate)));
        }

        Self {
            cooldowns: HashMap::new(),
            limiters,
        }
    }

    /// Cooldown deadline for a platform, if one is active
    pub fn cooldown_until(&self, platform: Platform, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cooldowns
            .get(&platform)
            .copied()
            .filter(|deadline| *deadline > now)
    }

    /// Whether the platform is cooling down
    pub fn on_cooldown(&self, platform: Platform, now: DateTime<Utc>) -> bool {
        self.cooldown_until(platform, now).is_some()
    }

    /// Start the post-publish cooldown for a platform
    pub fn start_cooldown(&mut self, platform: Platform, now: DateTime<Utc>) {
        let deadline = now + Duration::minutes(platform.cooldown_minutes());
        self.cooldowns.insert(platform, deadline);
    }

    /// Consume one slot of the hourly rate-limit guard
    pub fn try_acquire(&self, platform: Platform) -> bool {
        self.limiters
            .get(&platform)
            .map(|limiter| limiter.check().is_ok())
            .unwrap_or(true)
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer")
            .field("cooldowns", &self.cooldowns)
            .finish()
    }
}
