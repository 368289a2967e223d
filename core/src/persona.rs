//! Persona classifier: ordered rule cascade.
//!
//! RULES:
//!   - Rules are evaluated in table order; the first match wins.
//!   - `Unclassified` is never in the table. It is the residual, so
//!     every user receives exactly one label.
//!   - Classification reads the record only. It never mutates input.
//!
//! CANONICAL CASCADE (five tiers):
//!   1. premium            subscriptions >= 1, or subscribed within 7 days
//!   2. core               deposits > 0
//!   3. activation-target  no deposits, no copies, some PDP or creator views
//!   4. non-activated      no deposits, views or copies at all
//!   5. unclassified       everything else

use crate::{
    record::UserRecord,
    schema::fields,
    types::UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersonaLabel {
    Premium,
    Core,
    ActivationTarget,
    NonActivated,
    Unclassified,
}

impl PersonaLabel {
    pub const ALL: [PersonaLabel; 5] = [
        PersonaLabel::Premium,
        PersonaLabel::Core,
        PersonaLabel::ActivationTarget,
        PersonaLabel::NonActivated,
        PersonaLabel::Unclassified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Premium          => "premium",
            Self::Core             => "core",
            Self::ActivationTarget => "activation-target",
            Self::NonActivated     => "non-activated",
            Self::Unclassified     => "unclassified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == s)
    }
}

impl fmt::Display for PersonaLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The handful of record values the cascade looks at.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PersonaSignals {
    pub total_subscriptions: f64,
    pub subscribed_within_7_days: bool,
    pub total_deposits: f64,
    pub total_copies: f64,
    /// Regular + premium product detail page views.
    pub total_pdp_views: f64,
    /// Regular + premium creator profile views.
    pub total_creator_profile_views: f64,
}

impl PersonaSignals {
    pub fn from_record(user: &UserRecord) -> Self {
        Self {
            total_subscriptions: user.value(fields::TOTAL_SUBSCRIPTIONS),
            subscribed_within_7_days: user.value(fields::SUBSCRIBED_WITHIN_7_DAYS) > 0.0,
            total_deposits: user.value(fields::TOTAL_DEPOSITS),
            total_copies: user.value(fields::TOTAL_COPIES),
            total_pdp_views: user.value(fields::REGULAR_PDP_VIEWS) + user.value(fields::PREMIUM_PDP_VIEWS),
            total_creator_profile_views: user.value(fields::REGULAR_CREATOR_PROFILE_VIEWS)
                + user.value(fields::PREMIUM_CREATOR_PROFILE_VIEWS),
        }
    }
}

/// One row of the cascade: if `matches` holds, the user gets `label`.
#[derive(Clone, Copy)]
pub struct PersonaRule {
    pub label: PersonaLabel,
    pub matches: fn(&PersonaSignals) -> bool,
}

impl fmt::Debug for PersonaRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersonaRule").field("label", &self.label).finish()
    }
}

fn is_premium(s: &PersonaSignals) -> bool {
    s.total_subscriptions >= 1.0 || s.subscribed_within_7_days
}

fn is_core(s: &PersonaSignals) -> bool {
    s.total_deposits > 0.0
}

fn is_activation_target(s: &PersonaSignals) -> bool {
    s.total_deposits == 0.0
        && s.total_copies == 0.0
        && (s.total_pdp_views >= 1.0 || s.total_creator_profile_views >= 1.0)
}

fn is_non_activated(s: &PersonaSignals) -> bool {
    s.total_deposits == 0.0
        && s.total_pdp_views == 0.0
        && s.total_creator_profile_views == 0.0
        && s.total_copies == 0.0
}

#[derive(Debug, Clone)]
pub struct PersonaClassifier {
    rules: Vec<PersonaRule>,
}

impl Default for PersonaClassifier {
    fn default() -> Self {
        Self::canonical()
    }
}

impl PersonaClassifier {
    /// The five-tier cascade.
    pub fn canonical() -> Self {
        Self::with_rules(vec![
            PersonaRule { label: PersonaLabel::Premium,          matches: is_premium },
            PersonaRule { label: PersonaLabel::Core,             matches: is_core },
            PersonaRule { label: PersonaLabel::ActivationTarget, matches: is_activation_target },
            PersonaRule { label: PersonaLabel::NonActivated,     matches: is_non_activated },
        ])
    }

    /// A custom cascade. Any `Unclassified` rows are dropped; the residual
    /// is always implicit.
    pub fn with_rules(rules: Vec<PersonaRule>) -> Self {
        let rules = rules
            .into_iter()
            .filter(|r| r.label != PersonaLabel::Unclassified)
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[PersonaRule] {
        &self.rules
    }

    pub fn classify(&self, user: &UserRecord) -> PersonaLabel {
        self.classify_signals(&PersonaSignals::from_record(user))
    }

    pub fn classify_signals(&self, signals: &PersonaSignals) -> PersonaLabel {
        self.rules
            .iter()
            .find(|rule| (rule.matches)(signals))
            .map_or(PersonaLabel::Unclassified, |rule| rule.label)
    }

    pub fn classify_all(&self, users: &[UserRecord]) -> Vec<(UserId, PersonaLabel)> {
        users
            .iter()
            .map(|u| (u.user_id.clone(), self.classify(u)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonaShare {
    pub count: u64,
    /// Percent of all classified users, 0 to 100.
    pub percentage: f64,
}

/// Per-label counts. Every label is present, zero counts included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaDistribution {
    pub total: u64,
    pub personas: BTreeMap<PersonaLabel, PersonaShare>,
}

impl PersonaDistribution {
    pub fn from_labels<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = PersonaLabel>,
    {
        let mut counts: BTreeMap<PersonaLabel, u64> =
            PersonaLabel::ALL.iter().map(|l| (*l, 0)).collect();
        let mut total = 0u64;
        for label in labels {
            *counts.entry(label).or_insert(0) += 1;
            total += 1;
        }

        let personas = counts
            .into_iter()
            .map(|(label, count)| {
                let percentage = if total > 0 {
                    count as f64 / total as f64 * 100.0
                } else {
                    0.0
                };
                (label, PersonaShare { count, percentage })
            })
            .collect();

        Self { total, personas }
    }

    pub fn count(&self, label: PersonaLabel) -> u64 {
        self.personas.get(&label).map_or(0, |s| s.count)
    }

    pub fn share(&self, label: PersonaLabel) -> f64 {
        self.personas.get(&label).map_or(0.0, |s| s.percentage)
    }
}
