// Unit tests for Facial Match

use chrono::{Duration, Utc};
use facial_match::core::{
    controller::{Effect, FlowError, FlowEvent, FlowSession, Step},
    masking::{mask_name, mask_national_id, mask_sensitive_data},
    matcher::{draw_similarity, Matcher},
    payment::SessionBuilder,
    records::RecordStore,
    registration::RegistrationOracle,
};
use facial_match::models::{Category, Gender, MatchResult, Platform, Pricing, SelectionCriteria, UploadedImage};
use facial_match::services::SimulatedLatency;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

fn criteria(platform: Platform, category: Category, gender: Gender) -> SelectionCriteria {
    SelectionCriteria {
        platform,
        category,
        gender,
    }
}

fn unregistered(id: &str) -> MatchResult {
    MatchResult {
        record: RecordStore::builtin().get(id).unwrap().clone(),
        similarity: 82.5,
        has_registration: false,
    }
}

#[test]
fn test_mask_reference_values() {
    let masked = mask_sensitive_data("João Silva Santos", "123.456.789-01");
    assert!(masked.name.starts_with("João"));
    assert_eq!(masked.name, "João S**** S*****");
    assert_eq!(masked.national_id, "123.***.***-01");
}

#[test]
fn test_mask_name_token_lengths() {
    let masked = mask_name("Roberto Almeida Souza");
    let tokens: Vec<&str> = masked.split(' ').collect();
    assert_eq!(tokens, vec!["Roberto", "A******", "S****"]);
}

#[test]
fn test_mask_national_id_keeps_suffix() {
    assert_eq!(mask_national_id("321.654.987-12"), "321.***.***-12");
}

#[test]
fn test_matcher_only_returns_exact_criteria() {
    let store = Arc::new(RecordStore::builtin());
    let matcher = Matcher::with_default_threshold(store.clone());
    let mut rng = StdRng::seed_from_u64(21);

    for platform in Platform::ALL {
        for category in Category::ALL {
            for gender in Gender::ALL {
                let wanted = criteria(platform, category, gender);
                let matches = matcher.score_candidates(&wanted, &mut rng);
                let expected = store.all().iter().filter(|r| r.matches_criteria(&wanted)).count();

                assert_eq!(matches.len(), expected);
                for m in &matches {
                    assert!(m.record.matches_criteria(&wanted));
                }
            }
        }
    }
}

#[test]
fn test_matcher_async_with_zero_latency() {
    let store = Arc::new(RecordStore::builtin());
    let matcher = Matcher::new(store, 75.0, SimulatedLatency::none());
    let image = UploadedImage::new("x.png", "image/png", vec![1, 2, 3]);
    let mut rng = StdRng::seed_from_u64(5);

    let wanted = criteria(Platform::NinetyNinePop, Category::Moto, Gender::Feminino);
    let matches = tokio_test::block_on(matcher.find_matches(&wanted, &image, &mut rng));

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].record.id, "4");
}

#[test]
fn test_similarity_bounds_over_many_draws() {
    let mut rng = StdRng::seed_from_u64(1234);
    for _ in 0..10_000 {
        let s = draw_similarity(75.0, &mut rng);
        assert!((75.0..95.0).contains(&s), "similarity {} out of range", s);
    }
}

#[test]
fn test_oracle_static_flags() {
    let oracle = RegistrationOracle::new(Arc::new(RecordStore::builtin()), SimulatedLatency::none());
    let registered = tokio_test::block_on(oracle.check_registration("456.789.123-45", Platform::Abas));
    let free = tokio_test::block_on(oracle.check_registration("987.654.321-09", Platform::Uber));
    assert!(registered);
    assert!(!free);
}

#[test]
fn test_session_window_exact() {
    let builder = SessionBuilder::new(Pricing::default(), "FACIAL MATCH SYSTEM", "SAO PAULO");
    let mut rng = StdRng::seed_from_u64(0);
    let session = builder.build_session(&unregistered("2"), Utc::now(), &mut rng);

    assert_eq!(session.expires_at - session.created_at, Duration::minutes(15));
}

#[test]
fn test_two_sessions_two_order_ids() {
    let builder = SessionBuilder::new(Pricing::default(), "FACIAL MATCH SYSTEM", "SAO PAULO");
    let mut rng = StdRng::seed_from_u64(0);
    let now = Utc::now();

    let a = builder.build_session(&unregistered("1"), now, &mut rng);
    let b = builder.build_session(&unregistered("4"), now, &mut rng);

    assert_ne!(a.order_id, b.order_id);
}

#[test]
fn test_controller_walkthrough() {
    let s = FlowSession::new();
    let (s, _) = s.apply(FlowEvent::SetPlatform(Platform::Uber)).unwrap();
    let (s, _) = s.apply(FlowEvent::SetCategory(Category::Carro)).unwrap();
    let (s, _) = s.apply(FlowEvent::SetGender(Gender::Masculino)).unwrap();
    let (s, _) = s.apply(FlowEvent::Advance).unwrap();
    let (s, _) = s
        .apply(FlowEvent::AttachFile(UploadedImage::new("a.jpg", "image/jpeg", vec![9])))
        .unwrap();
    let (s, effects) = s.apply(FlowEvent::Submit).unwrap();
    assert!(matches!(effects[0], Effect::StartMatchRun { run_id: 1, .. }));

    let (s, _) = s
        .apply(FlowEvent::MatchesResolved {
            run_id: 1,
            matches: vec![unregistered("5")],
        })
        .unwrap();
    assert_eq!(s.step, Step::Results);

    let (s, effects) = s
        .apply(FlowEvent::PickMatch {
            match_id: "5".to_string(),
        })
        .unwrap();
    assert_eq!(s.step, Step::Payment);
    assert_eq!(effects.len(), 1);
}

#[test]
fn test_controller_rejects_upload_in_selection() {
    let err = FlowSession::new()
        .apply(FlowEvent::AttachFile(UploadedImage::new("a.jpg", "image/jpeg", vec![9])))
        .unwrap_err();
    assert!(matches!(err, FlowError::InvalidTransition { step: Step::Selection, .. }));
}

#[test]
fn test_controller_rejects_empty_image() {
    let mut s = FlowSession::new();
    s.step = Step::Upload;
    let err = s
        .apply(FlowEvent::AttachFile(UploadedImage::new("a.jpg", "image/jpeg", vec![])))
        .unwrap_err();
    assert_eq!(err, FlowError::EmptyUpload);
}
