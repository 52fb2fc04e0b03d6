//! BOLO watchlist backend.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{WatchlistClient, WatchlistQuery};
use crate::domain::{Result, WatchlistMatch};
use crate::hashing::generate_id;

pub const REASON_MAKE: &str = "make on watchlist";
pub const REASON_PLATE_SUFFIX: &str = "plate suffix match";
pub const REASON_PLATE_PREFIX: &str = "plate prefix match";
pub const REASON_NO_MATCH: &str = "no match found";

/// Static watchlist rule sets and the confidence each rule reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistRules {
    pub watched_makes: Vec<String>,
    pub watched_plate_suffixes: Vec<String>,
    pub watched_plate_prefixes: Vec<String>,
    pub make_confidence: f64,
    pub suffix_confidence: f64,
    pub prefix_confidence: f64,
}

impl Default for WatchlistRules {
    fn default() -> Self {
        WatchlistRules {
            watched_makes: vec!["Honda".to_string(), "Toyota".to_string()],
            watched_plate_suffixes: vec!["7".to_string(), "99".to_string()],
            watched_plate_prefixes: vec!["ABC".to_string(), "XYZ".to_string()],
            make_confidence: 0.85,
            suffix_confidence: 0.75,
            prefix_confidence: 0.70,
        }
    }
}

/// A rule that fired, with its reason, confidence and record-id prefix.
struct RuleHit {
    reason: &'static str,
    confidence: f64,
    id_prefix: &'static str,
}

impl WatchlistRules {
    /// Evaluate rules in fixed order (make, plate suffix, plate prefix); first hit wins.
    fn evaluate(&self, make: &str, plate: Option<&str>) -> Option<RuleHit> {
        if self.watched_makes.iter().any(|m| m == make) {
            return Some(RuleHit {
                reason: REASON_MAKE,
                confidence: self.make_confidence,
                id_prefix: "BOLO-MAKE",
            });
        }

        let plate = plate?;
        if self
            .watched_plate_suffixes
            .iter()
            .any(|s| plate.ends_with(s.as_str()))
        {
            return Some(RuleHit {
                reason: REASON_PLATE_SUFFIX,
                confidence: self.suffix_confidence,
                id_prefix: "BOLO-PLATE",
            });
        }
        if self
            .watched_plate_prefixes
            .iter()
            .any(|p| plate.starts_with(p.as_str()))
        {
            return Some(RuleHit {
                reason: REASON_PLATE_PREFIX,
                confidence: self.prefix_confidence,
                id_prefix: "BOLO-PREFIX",
            });
        }
        None
    }
}

/// Rule-based watchlist; location is accepted and ignored.
#[derive(Debug, Clone, Default)]
pub struct MockWatchlist {
    rules: WatchlistRules,
}

impl MockWatchlist {
    pub fn new(rules: WatchlistRules) -> Self {
        Self { rules }
    }

    pub fn check(&self, query: &WatchlistQuery) -> WatchlistMatch {
        let plate = query.plate.as_deref();
        let result = match self.rules.evaluate(&query.make, plate) {
            Some(hit) => WatchlistMatch {
                is_match: true,
                make: Some(query.make.clone()),
                model: Some(query.model.clone()),
                year_range: Some(query.year_range.clone()),
                plate: query.plate.clone(),
                reason: hit.reason.to_string(),
                match_confidence: hit.confidence,
                bolo_record_id: Some(generate_id(hit.id_prefix)),
                timestamp: Utc::now(),
            },
            None => WatchlistMatch::no_match(REASON_NO_MATCH),
        };

        debug!(
            make = %query.make,
            plate = ?plate,
            is_match = result.is_match,
            reason = %result.reason,
            "watchlist lookup"
        );
        result
    }
}

#[async_trait]
impl WatchlistClient for MockWatchlist {
    async fn lookup(&self, query: &WatchlistQuery) -> Result<WatchlistMatch> {
        Ok(self.check(query))
    }
}
