//! Settings loaded from the environment (and an optional `.env` file).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::core::engine::EngineOptions;
use crate::error::ConfigError;
use crate::models::{LikePolicy, RetweetPolicy, SleepPolicy};

#[derive(Clone, Debug, PartialEq)]
pub struct FollowSettings {
    pub query: String,
    pub max_pages: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub followers_path: String,
    pub friends_path: String,
    pub ledger_path: String,
    /// Verbose logs and no pacing between remote calls.
    pub debug: bool,
    pub like_policy: LikePolicy,
    pub retweet_policy: RetweetPolicy,
    pub sleep_policy: SleepPolicy,
    pub retweet_queries: Vec<String>,
    pub banned: Vec<String>,
    pub retweet_every: Duration,
    pub follow: Option<FollowSettings>,
    pub auto_unfollow: bool,
}

impl Settings {
    /// Reads `TWBOT_*` variables, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let defaults_like = LikePolicy::default();
        let defaults_retweet = RetweetPolicy::default();
        let defaults_sleep = SleepPolicy::default();

        let like_policy = LikePolicy {
            auto: parse(&lookup, "TWBOT_LIKE_AUTO", defaults_like.auto)?,
            threshold: parse(&lookup, "TWBOT_LIKE_THRESHOLD", defaults_like.threshold)?,
        };
        let retweet_policy = RetweetPolicy {
            max_attempts: parse(&lookup, "TWBOT_RETWEET_MAX_ATTEMPTS", defaults_retweet.max_attempts)?,
            like: parse(&lookup, "TWBOT_RETWEET_LIKE", defaults_retweet.like)?,
        };
        if retweet_policy.max_attempts == 0 {
            return Err(ConfigError::Policy {
                policy: "retweet",
                reason: "max attempts must be at least 1".to_string(),
            });
        }
        let sleep_policy = SleepPolicy {
            max_rand: parse(&lookup, "TWBOT_SLEEP_MAX_RAND", defaults_sleep.max_rand)?,
            extra_chance: parse(&lookup, "TWBOT_SLEEP_CHANCE", defaults_sleep.extra_chance)?,
            extra_chance_total: parse(&lookup, "TWBOT_SLEEP_CHANCE_TOTAL", defaults_sleep.extra_chance_total)?,
            extra_min: parse(&lookup, "TWBOT_SLEEP_MIN", defaults_sleep.extra_min)?,
            extra_max: parse(&lookup, "TWBOT_SLEEP_MAX", defaults_sleep.extra_max)?,
        };
        sleep_policy.validate()?;

        let follow = match lookup("TWBOT_FOLLOW_QUERY").filter(|q| !q.trim().is_empty()) {
            Some(query) => Some(FollowSettings {
                query: query.trim().to_string(),
                max_pages: parse(&lookup, "TWBOT_FOLLOW_PAGES", 1)?,
            }),
            None => None,
        };

        Ok(Settings {
            followers_path: var("TWBOT_FOLLOWERS_PATH", "storage/followers.json"),
            friends_path: var("TWBOT_FRIENDS_PATH", "storage/friends.json"),
            ledger_path: var("TWBOT_LEDGER_PATH", "storage/tweets.json"),
            debug: parse(&lookup, "TWBOT_DEBUG", false)?,
            like_policy,
            retweet_policy,
            sleep_policy,
            retweet_queries: list(lookup("TWBOT_RETWEET_QUERIES")),
            banned: list(lookup("TWBOT_BANNED")),
            retweet_every: Duration::from_secs(parse(&lookup, "TWBOT_RETWEET_EVERY_SECS", 3600)?),
            follow,
            auto_unfollow: parse(&lookup, "TWBOT_AUTO_UNFOLLOW", false)?,
        })
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            followers_key: self.followers_path.clone(),
            friends_key: self.friends_path.clone(),
            ledger_key: self.ledger_path.clone(),
            pacing: !self.debug,
            like_policy: self.like_policy,
            retweet_policy: self.retweet_policy,
            sleep_policy: self.sleep_policy,
        }
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn list(raw: Option<String>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
