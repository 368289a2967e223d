//! Synthetic cohort generator.
//!
//! Produces a plausible user table for demos and tests without touching
//! real event data. Each user has a latent engagement level in [0, 1)
//! that drives browsing; browsing drives funding; funding drives copies
//! and subscriptions. Same seed, same cohort.

use crate::{
    record::UserRecord,
    rng::{CohortRng, RngBank, StreamSlot},
    schema::fields,
};

const INCOME_BANDS: &[(&str, f64)] = &[
    ("Less than $25,000", 0.18),
    ("$25,000-$49,999", 0.24),
    ("$50,000-$99,999", 0.30),
    ("$100,000-$199,999", 0.20),
    ("$200,000+", 0.08),
];

const NET_WORTH_BANDS: &[(&str, f64)] = &[
    ("Less than $10,000", 0.30),
    ("$10,000-$99,999", 0.35),
    ("$100,000-$499,999", 0.25),
    ("$500,000+", 0.10),
];

const EXPERIENCE: &[(&str, f64)] = &[
    ("0", 0.25),
    ("1-3", 0.35),
    ("3-5", 0.20),
    ("5+", 0.20),
];

const ACQUISITION: &[(&str, f64)] = &[
    ("TikTok", 0.30),
    ("Instagram", 0.25),
    ("Friend", 0.20),
    ("App Store", 0.15),
    ("Other", 0.10),
];

/// Probability a survey question was left blank.
const NONRESPONSE_RATE: f64 = 0.15;

pub struct SyntheticCohort {
    seed: u64,
}

impl SyntheticCohort {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn generate(&self, count: usize) -> Vec<UserRecord> {
        let bank = RngBank::new(self.seed);
        let mut engagement = bank.for_slot(StreamSlot::Engagement);
        let mut funding = bank.for_slot(StreamSlot::Funding);
        let mut conversion = bank.for_slot(StreamSlot::Conversion);
        let mut demographics = bank.for_slot(StreamSlot::Demographics);

        let users: Vec<UserRecord> = (0..count)
            .map(|i| {
                let user_id = format!("synthetic-{}-{i:06}", self.seed);
                generate_user(user_id, &mut engagement, &mut funding, &mut conversion, &mut demographics)
            })
            .collect();

        log::debug!("Generated {} synthetic users (seed {})", users.len(), self.seed);
        users
    }
}

fn generate_user(
    user_id: String,
    engagement: &mut CohortRng,
    funding: &mut CohortRng,
    conversion: &mut CohortRng,
    demographics: &mut CohortRng,
) -> UserRecord {
    let level = engagement.next_f64();

    let app_sessions = engagement.count(2.0 + 30.0 * level);
    let regular_pdp = engagement.count(8.0 * level * level);
    let premium_pdp = engagement.count(1.5 * level);
    let regular_creator = engagement.count(4.0 * level);
    let premium_creator = engagement.count(1.2 * level);
    let discover = engagement.count(5.0 * level);
    let leaderboard = engagement.count(3.0 * level);
    let premium_tab = engagement.count(1.0 * level);
    let paywall = engagement.count(0.8 * level);
    let stripe = engagement.count(0.3 * level);

    // Funding: linking a bank gates deposits, browsing makes deposits likelier.
    let linked = funding.chance(0.15 + 0.6 * level);
    let browse_boost = (regular_pdp.min(10) as f64) * 0.05;
    let deposited = linked && funding.chance(0.10 + browse_boost);
    let (deposits, transfers, buying_power, withdrawals, withdrawal_count) = if deposited {
        let amount = funding.pareto(50.0, 2.2).round();
        let transfers = 1 + funding.count(1.5);
        let buying_power = (amount * (0.2 + 0.8 * funding.next_f64())).round();
        let withdrawal_count = funding.count(0.4);
        let withdrawals = if withdrawal_count > 0 {
            (amount * 0.3 * funding.next_f64()).round()
        } else {
            0.0
        };
        (amount, transfers, buying_power, withdrawals, withdrawal_count)
    } else {
        (0.0, 0, 0.0, 0.0, 0)
    };

    let copies = if deposited && conversion.chance(0.3 + 0.05 * regular_creator.min(8) as f64) {
        1 + conversion.count(2.0)
    } else {
        0
    };
    let copy_starts = copies + conversion.count(0.5 * level);
    let copy_credits = conversion.next_u64_below(4);

    let subscribed = conversion.chance(0.01 + 0.05 * premium_creator.min(6) as f64 + 0.02 * paywall.min(5) as f64);
    let subscriptions = if subscribed { 1 + conversion.count(0.2) } else { 0 };
    let within_7_days = subscribed && conversion.chance(0.4);

    let mut record = UserRecord::new(user_id)
        .with_numeric(fields::TOTAL_DEPOSITS, deposits)
        .with_numeric(fields::TOTAL_COPIES, copies as f64)
        .with_numeric(fields::TOTAL_SUBSCRIPTIONS, subscriptions as f64)
        .with_numeric(fields::SUBSCRIBED_WITHIN_7_DAYS, flag(within_7_days))
        .with_numeric("has_linked_bank", flag(linked))
        .with_numeric("available_copy_credits", copy_credits as f64)
        .with_numeric("buying_power", buying_power)
        .with_numeric("total_withdrawals", withdrawals)
        .with_numeric("total_withdrawal_count", withdrawal_count as f64)
        .with_numeric(fields::REGULAR_PDP_VIEWS, regular_pdp as f64)
        .with_numeric(fields::PREMIUM_PDP_VIEWS, premium_pdp as f64)
        .with_numeric(fields::REGULAR_CREATOR_PROFILE_VIEWS, regular_creator as f64)
        .with_numeric(fields::PREMIUM_CREATOR_PROFILE_VIEWS, premium_creator as f64)
        .with_numeric("paywall_views", paywall as f64)
        .with_numeric("total_stripe_views", stripe as f64)
        .with_numeric("app_sessions", app_sessions as f64)
        .with_numeric("discover_tab_views", discover as f64)
        .with_numeric("leaderboard_tab_views", leaderboard as f64)
        .with_numeric("premium_tab_views", premium_tab as f64)
        .with_numeric("total_copy_starts", copy_starts as f64)
        .with_numeric("total_ach_transfers", transfers as f64);

    for (field, options) in [
        (fields::INCOME, INCOME_BANDS),
        (fields::NET_WORTH, NET_WORTH_BANDS),
        (fields::INVESTING_EXPERIENCE_YEARS, EXPERIENCE),
        (fields::ACQUISITION_SURVEY, ACQUISITION),
    ] {
        record = record.with_categorical(field, survey_answer(demographics, options));
    }
    record
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

fn survey_answer(rng: &mut CohortRng, options: &[(&str, f64)]) -> String {
    if rng.chance(NONRESPONSE_RATE) {
        return String::new();
    }
    let weights: Vec<f64> = options.iter().map(|(_, w)| *w).collect();
    options[rng.weighted_index(&weights)].0.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Outcome;

    #[test]
    fn same_seed_same_cohort() {
        let a = SyntheticCohort::new(99).generate(200);
        let b = SyntheticCohort::new(99).generate(200);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = SyntheticCohort::new(1).generate(200);
        let b = SyntheticCohort::new(2).generate(200);
        assert_ne!(a, b);
    }

    #[test]
    fn cohort_contains_converters_and_blanks() {
        let users = SyntheticCohort::new(42).generate(2000);
        assert_eq!(users.len(), 2000);
        assert!(users.iter().any(|u| u.converted(Outcome::Deposits)));
        assert!(users.iter().any(|u| !u.converted(Outcome::Deposits)));
        assert!(users.iter().any(|u| u.category(fields::INCOME).is_empty()));
        assert!(users.iter().all(|u| u.value("app_sessions") >= 0.0));
    }
}
