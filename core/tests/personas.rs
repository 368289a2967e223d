use driver_core::{
    persona::{PersonaClassifier, PersonaDistribution, PersonaLabel, PersonaRule, PersonaSignals},
    record::UserRecord,
    synthetic::SyntheticCohort,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn user(id: &str, fields: &[(&str, f64)]) -> UserRecord {
    fields
        .iter()
        .fold(UserRecord::new(id), |u, (f, v)| u.with_numeric(*f, *v))
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// The four canonical example users land in the four main tiers, in order.
#[test]
fn canonical_cascade_example() {
    let users = vec![
        user("a", &[("total_subscriptions", 1.0)]),
        user("b", &[("total_subscriptions", 0.0), ("total_deposits", 500.0)]),
        user(
            "c",
            &[
                ("total_subscriptions", 0.0),
                ("total_deposits", 0.0),
                ("total_copies", 0.0),
                ("regular_pdp_views", 2.0),
            ],
        ),
        user(
            "d",
            &[
                ("total_subscriptions", 0.0),
                ("total_deposits", 0.0),
                ("total_copies", 0.0),
                ("regular_pdp_views", 0.0),
            ],
        ),
    ];

    let classifier = PersonaClassifier::canonical();
    let labels: Vec<PersonaLabel> = users.iter().map(|u| classifier.classify(u)).collect();
    assert_eq!(
        labels,
        vec![
            PersonaLabel::Premium,
            PersonaLabel::Core,
            PersonaLabel::ActivationTarget,
            PersonaLabel::NonActivated,
        ]
    );
}

/// Premium wins regardless of anything else on the record.
#[test]
fn premium_overrides_every_other_signal() {
    let classifier = PersonaClassifier::canonical();
    let by_subscription = user(
        "p1",
        &[
            ("total_subscriptions", 2.0),
            ("total_deposits", 1000.0),
            ("total_copies", 3.0),
            ("regular_pdp_views", 10.0),
        ],
    );
    let by_recent_subscribe = user("p2", &[("subscribed_within_7_days", 1.0), ("total_copies", 5.0)]);

    assert_eq!(classifier.classify(&by_subscription), PersonaLabel::Premium);
    assert_eq!(classifier.classify(&by_recent_subscribe), PersonaLabel::Premium);
}

/// Premium creator profile views alone make an activation target.
#[test]
fn premium_variants_count_toward_views() {
    let classifier = PersonaClassifier::canonical();
    let u = user("v", &[("premium_creator_profile_views", 1.0)]);
    assert_eq!(classifier.classify(&u), PersonaLabel::ActivationTarget);

    let u = user("w", &[("premium_pdp_views", 3.0)]);
    assert_eq!(classifier.classify(&u), PersonaLabel::ActivationTarget);
}

/// Copies without deposits match no rule: the residual bucket catches them.
#[test]
fn copies_without_deposits_are_unclassified() {
    let classifier = PersonaClassifier::canonical();
    let u = user("x", &[("total_copies", 2.0), ("regular_pdp_views", 4.0)]);
    assert_eq!(classifier.classify(&u), PersonaLabel::Unclassified);

    let negative = user("y", &[("total_deposits", -20.0)]);
    assert_eq!(classifier.classify(&negative), PersonaLabel::Unclassified);
}

/// Fractional view counts below one neither activate nor count as zero.
#[test]
fn fractional_views_fall_through() {
    let classifier = PersonaClassifier::canonical();
    let u = user("z", &[("regular_pdp_views", 0.5)]);
    assert_eq!(classifier.classify(&u), PersonaLabel::Unclassified);
}

/// Classification is total and exclusive over a realistic cohort.
#[test]
fn labels_partition_the_cohort() {
    let users = SyntheticCohort::new(7).generate(3000);
    let classifier = PersonaClassifier::canonical();
    let labels = classifier.classify_all(&users);

    assert_eq!(labels.len(), users.len());
    for ((id, label), u) in labels.iter().zip(&users) {
        assert_eq!(id, &u.user_id);
        if u.value("total_subscriptions") >= 1.0 {
            assert_eq!(*label, PersonaLabel::Premium, "premium user {id} got {label}");
        }
    }

    let distribution = PersonaDistribution::from_labels(labels.iter().map(|(_, l)| *l));
    let summed: u64 = PersonaLabel::ALL.iter().map(|l| distribution.count(*l)).sum();
    assert_eq!(summed, users.len() as u64);
    let pct: f64 = PersonaLabel::ALL.iter().map(|l| distribution.share(*l)).sum();
    assert!((pct - 100.0).abs() < 1e-9, "percentages sum to {pct}");
}

/// Classification never touches its input.
#[test]
fn classification_is_pure() {
    let u = user("pure", &[("total_deposits", 10.0), ("regular_pdp_views", 1.0)]);
    let before = u.clone();
    let classifier = PersonaClassifier::canonical();
    let first = classifier.classify(&u);
    let second = classifier.classify(&u);
    assert_eq!(first, second);
    assert_eq!(u, before);
}

/// Rule tables are data: a custom cascade reorders tiers without code changes.
#[test]
fn custom_rule_table_is_respected() {
    fn any_deposit(s: &PersonaSignals) -> bool {
        s.total_deposits > 0.0
    }
    fn any_subscription(s: &PersonaSignals) -> bool {
        s.total_subscriptions >= 1.0
    }

    let classifier = PersonaClassifier::with_rules(vec![
        PersonaRule { label: PersonaLabel::Core, matches: any_deposit },
        PersonaRule { label: PersonaLabel::Premium, matches: any_subscription },
        PersonaRule { label: PersonaLabel::Unclassified, matches: |_| true },
    ]);
    assert_eq!(classifier.rules().len(), 2, "explicit unclassified rows are dropped");

    let both = user("b", &[("total_deposits", 5.0), ("total_subscriptions", 1.0)]);
    assert_eq!(classifier.classify(&both), PersonaLabel::Core);
    assert_eq!(classifier.classify(&user("n", &[])), PersonaLabel::Unclassified);
}

/// Every label appears in the distribution, even with zero members.
#[test]
fn empty_distribution_lists_every_label() {
    let distribution = PersonaDistribution::from_labels(Vec::new());
    assert_eq!(distribution.total, 0);
    assert_eq!(distribution.personas.len(), PersonaLabel::ALL.len());
    for label in PersonaLabel::ALL {
        assert_eq!(distribution.count(label), 0);
        assert_eq!(distribution.share(label), 0.0);
    }
}

#[test]
fn labels_serialize_kebab_case() {
    assert_eq!(
        serde_json::to_string(&PersonaLabel::ActivationTarget).unwrap(),
        "\"activation-target\""
    );
    assert_eq!(PersonaLabel::parse("non-activated"), Some(PersonaLabel::NonActivated));
    assert_eq!(PersonaLabel::parse("lower-income"), None);
}
