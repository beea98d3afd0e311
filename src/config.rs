use std::path::PathBuf;
use std::time::Duration;

/// How hard a profile compresses or concentrates its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggressiveness {
    Mild,
    Aggressive,
}

impl Aggressiveness {
    /// Fractional exponent applied to the raw dominance difference.
    pub fn exponent(self) -> f64 {
        match self {
            Aggressiveness::Mild => 1.0 / 4.0,
            Aggressiveness::Aggressive => 1.0 / 3.0,
        }
    }
}

/// Which algorithm a match-weight profile runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightMethod {
    Form,
    Rating,
}

#[derive(Debug, Clone, Copy)]
pub struct MatchWeightProfile {
    pub id: u32,
    pub lookback: u32,
    pub aggressiveness: Aggressiveness,
    pub method: WeightMethod,
}

#[derive(Debug, Clone, Copy)]
pub struct CleanSheetProfile {
    pub id: u32,
    pub lookback: u32,
    pub aggressiveness: Aggressiveness,
}

const LOOKBACKS: [u32; 5] = [2, 4, 7, 10, 12];

/// 15 match-weight profiles: 5 mild form-based, 5 aggressive form-based,
/// 5 rating-based, each sweeping the same lookback windows.
pub fn match_weight_profiles() -> Vec<MatchWeightProfile> {
    let mut profiles = Vec::with_capacity(15);
    for (i, lookback) in LOOKBACKS.into_iter().enumerate() {
        profiles.push(MatchWeightProfile {
            id: i as u32 + 1,
            lookback,
            aggressiveness: Aggressiveness::Mild,
            method: WeightMethod::Form,
        });
    }
    for (i, lookback) in LOOKBACKS.into_iter().enumerate() {
        profiles.push(MatchWeightProfile {
            id: i as u32 + 6,
            lookback,
            aggressiveness: Aggressiveness::Aggressive,
            method: WeightMethod::Form,
        });
    }
    for (i, lookback) in LOOKBACKS.into_iter().enumerate() {
        profiles.push(MatchWeightProfile {
            id: i as u32 + 11,
            lookback,
            aggressiveness: Aggressiveness::Mild,
            method: WeightMethod::Rating,
        });
    }
    profiles
}

/// 10 clean-sheet profiles: 5 mild and 5 aggressive over the same windows.
pub fn clean_sheet_profiles() -> Vec<CleanSheetProfile> {
    let mut profiles = Vec::with_capacity(10);
    for (i, lookback) in LOOKBACKS.into_iter().enumerate() {
        profiles.push(CleanSheetProfile {
            id: i as u32 + 1,
            lookback,
            aggressiveness: Aggressiveness::Mild,
        });
    }
    for (i, lookback) in LOOKBACKS.into_iter().enumerate() {
        profiles.push(CleanSheetProfile {
            id: i as u32 + 6,
            lookback,
            aggressiveness: Aggressiveness::Aggressive,
        });
    }
    profiles
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub db_path: PathBuf,
    pub status_url: String,
    /// Delay between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Restrict sector analysis to externally flagged probable lineups.
    pub use_probable_lineups: bool,
    /// Weight form by opponent strength instead of the plain record.
    pub strength_adjusted: bool,
}

const DEFAULT_STATUS_URL: &str = "https://api.cartola.globo.com/mercado/status";
const DEFAULT_INTERVAL_MINUTES: u64 = 15;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE"))
        .unwrap_or(false)
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let db_path = std::env::var("MATCHWEIGHTS_DB")
            .unwrap_or_else(|_| "matchweights.db".to_string());
        let status_url = std::env::var("MATCHWEIGHTS_STATUS_URL")
            .unwrap_or_else(|_| DEFAULT_STATUS_URL.to_string());
        let minutes = env_parse("CALCULATION_INTERVAL_MINUTES", DEFAULT_INTERVAL_MINUTES);

        EngineConfig {
            db_path: PathBuf::from(db_path),
            status_url,
            interval: Duration::from_secs(minutes * 60),
            use_probable_lineups: env_flag("MATCHWEIGHTS_USE_PROBABLE_LINEUPS"),
            strength_adjusted: env_flag("MATCHWEIGHTS_STRENGTH_ADJUSTED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_weight_profiles_cover_all_methods() {
        let profiles = match_weight_profiles();
        assert_eq!(profiles.len(), 15);

        let ids: Vec<u32> = profiles.iter().map(|p| p.id).collect();
        assert_eq!(ids, (1..=15).collect::<Vec<_>>());

        assert!(profiles[..5]
            .iter()
            .all(|p| p.aggressiveness == Aggressiveness::Mild && p.method == WeightMethod::Form));
        assert!(profiles[5..10].iter().all(|p| {
            p.aggressiveness == Aggressiveness::Aggressive && p.method == WeightMethod::Form
        }));
        assert!(profiles[10..]
            .iter()
            .all(|p| p.method == WeightMethod::Rating));

        // The same lookback sweep repeats in each group.
        for group in [&profiles[..5], &profiles[5..10], &profiles[10..]] {
            let lookbacks: Vec<u32> = group.iter().map(|p| p.lookback).collect();
            assert_eq!(lookbacks, vec![2, 4, 7, 10, 12]);
        }
    }

    #[test]
    fn clean_sheet_profiles_split_by_aggressiveness() {
        let profiles = clean_sheet_profiles();
        assert_eq!(profiles.len(), 10);
        assert!(profiles[..5]
            .iter()
            .all(|p| p.aggressiveness == Aggressiveness::Mild));
        assert!(profiles[5..]
            .iter()
            .all(|p| p.aggressiveness == Aggressiveness::Aggressive));
    }

    #[test]
    fn exponents_match_aggressiveness() {
        assert!((Aggressiveness::Mild.exponent() - 0.25).abs() < 1e-12);
        assert!((Aggressiveness::Aggressive.exponent() - 1.0 / 3.0).abs() < 1e-12);
    }
}
