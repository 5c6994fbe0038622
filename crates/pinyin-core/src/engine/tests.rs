use std::collections::HashMap;
use std::sync::Arc;

use super::*;
use crate::convert::{SpecialChars, ToneStyle};
use crate::dict::TierMap;
use crate::settings::settings;
use crate::store::{FileDictionaryStore, FileFrequencyStore, ManualClock, MemoryStore};

struct Harness {
    engine: Engine,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
}

fn test_settings() -> Settings {
    let mut s = settings().clone();
    s.cache.capacity = 8;
    s.learning.immediate_threshold = 3;
    s.learning.merge_threshold = 2;
    s.learning.merge_interval_secs = 100;
    s.learning.demotion_interval_secs = 1000;
    s
}

fn builder(store: &Arc<MemoryStore>, clock: &Arc<ManualClock>) -> EngineBuilder {
    Engine::builder()
        .settings(test_settings())
        .store(Arc::clone(store))
        .clock(clock.clone())
        .entry(Tier::Common, "银", &["yín"])
        .entry(Tier::Common, "行", &["xíng", "háng"])
        .entry(Tier::Common, "为", &["wèi", "wéi"])
        .entry(Tier::Common, "你", &["nǐ"])
        .entry(Tier::Common, "好", &["hǎo", "hào"])
        .entry(Tier::Rare, "㐁", &["tiàn"])
        .entry(Tier::Extended, "㐂", &["xǐ"])
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(10_000));
    let engine = builder(&store, &clock).build().unwrap();
    Harness {
        engine,
        store,
        clock,
    }
}

fn opts() -> ConvertOptions {
    ConvertOptions::default()
}

#[test]
fn converts_with_default_rules() {
    let h = harness();
    assert_eq!(h.engine.convert("银行", &opts()), "yín háng");
    assert_eq!(h.engine.convert("行为", &opts()), "xíng wèi");
    let numbered = ConvertOptions {
        tone: ToneStyle::Number,
        ..opts()
    };
    assert_eq!(h.engine.convert("你好", &numbered), "ni3 hao3");
    assert_eq!(
        h.engine.syllables("你好 abc", &opts()),
        vec!["nǐ", "hǎo", "abc"]
    );
    assert_eq!(h.engine.initials("银行", &opts()), "yh");
}

#[test]
fn scenario_rare_character_promotion() {
    let h = harness();
    let e = &h.engine;

    e.resolve('㐁', None);
    assert_eq!(e.tiers_of("㐁"), vec![Tier::Rare, Tier::SelfLearned]);
    assert_eq!(e.frequency("㐁"), 1);

    e.resolve('㐁', None);
    assert_eq!(e.tiers_of("㐁"), vec![Tier::Rare, Tier::SelfLearned]);

    let third = e.resolve('㐁', None);
    assert_eq!(third.source, Source::Tier(Tier::Rare));
    assert_eq!(e.tiers_of("㐁"), vec![Tier::Common]);

    let fourth = e.resolve('㐁', None);
    assert_eq!(fourth.source, Source::Tier(Tier::Common));
    assert_eq!(fourth.pronunciation, "tiàn");
}

#[test]
fn old_snapshots_are_unaffected_by_promotion() {
    let h = harness();
    let before = h.engine.snapshot();
    for _ in 0..3 {
        h.engine.resolve('㐂', None);
    }
    assert_eq!(before.tiers_of("㐂"), vec![Tier::Extended]);
    assert_eq!(h.engine.tiers_of("㐂"), vec![Tier::Common]);
}

#[test]
fn cache_skips_resolution_on_hit() {
    let h = harness();
    let e = &h.engine;
    assert_eq!(e.convert("你好", &opts()), "nǐ hǎo");
    assert_eq!(e.convert("你好", &opts()), "nǐ hǎo");
    let stats = e.cache_stats();
    assert_eq!((stats.hits, stats.misses, stats.len), (1, 1, 1));
    // only the miss fed the ledger
    assert_eq!(e.frequency("你"), 1);

    let dashed = ConvertOptions {
        separator: "-".into(),
        ..opts()
    };
    assert_eq!(e.convert("你好", &dashed), "nǐ-hǎo");
    assert_eq!(e.cache_stats().misses, 2);
}

#[test]
fn concurrent_misses_on_one_key_share_an_entry() {
    let h = harness();
    let e = &h.engine;
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| assert_eq!(e.convert("银行", &opts()), "yín háng"));
        }
    });
    let stats = e.cache_stats();
    assert_eq!(stats.len, 1);
    assert_eq!(stats.hits + stats.misses, 4);
    assert!(stats.misses >= 1);
}

#[test]
fn cache_ttl_sweep_uses_clock() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(0));
    let mut s = test_settings();
    s.cache.ttl_secs = 60;
    let e = builder(&store, &clock).settings(s).build().unwrap();
    e.convert("你好", &opts());
    clock.advance(59);
    assert_eq!(e.sweep_cache(), 0);
    clock.advance(1);
    assert_eq!(e.sweep_cache(), 1);
    assert_eq!(e.cache_stats().len, 0);
}

#[test]
fn custom_tier_wins_and_persists() {
    let h = harness();
    h.engine.set_custom("行", &["hàng"]).unwrap();
    let ctx = Context::new(None, Some('为'));
    let r = h.engine.resolve('行', Some(&ctx));
    assert_eq!(r.pronunciation, "hàng");
    assert_eq!(r.source, Source::Custom);
    assert!(h
        .store
        .tier(Tier::Custom, ToneVariant::Toned)
        .unwrap()
        .contains_key("行"));

    assert!(h.engine.remove_custom("行").unwrap());
    assert_eq!(h.engine.resolve('行', Some(&ctx)).pronunciation, "xíng");
}

#[test]
fn custom_words_in_conversion() {
    let h = harness();
    h.engine.set_custom("银行", &["yin2 hang2"]).unwrap();
    h.engine.clear_cache();
    assert_eq!(h.engine.convert("银行为", &opts()), "yín háng wèi");
    assert_eq!(h.engine.frequency("银行"), 1);
}

#[test]
fn overrides_apply_per_call() {
    let h = harness();
    let mut o = opts();
    o.overrides.insert("好".into(), vec!["hāo".into()]);
    assert_eq!(h.engine.convert("你好", &o), "nǐ hāo");
    assert_eq!(h.engine.convert("你好", &opts()), "nǐ hǎo");
    // overrides are not dictionary hits
    assert_eq!(h.engine.frequency("好"), 1);
}

#[test]
fn unusable_overrides_fall_through() {
    let h = harness();
    let mut o = opts();
    o.overrides.insert("好".into(), vec![" ".into()]);
    assert_eq!(h.engine.convert("你好", &o), "nǐ hǎo");

    o.overrides
        .insert("好".into(), vec!["hao3".into(), "hao3".into(), "HAO".into()]);
    assert_eq!(h.engine.syllables("好", &o), vec!["hǎo"]);
}

#[test]
fn merge_keeps_both_variants_in_sync() {
    let h = harness();
    let e = &h.engine;
    e.resolve('㐁', None);
    e.resolve('㐂', None);

    let r = e.merge(ToneVariant::Toned, false).unwrap();
    assert_eq!(r.merged.len(), 2);
    for key in ["㐁", "㐂"] {
        assert_eq!(e.tiers_of(key), vec![Tier::Common]);
        for v in ToneVariant::ALL {
            assert!(e.lookup(Tier::Common, v, key).is_some());
            assert!(e.lookup(Tier::SelfLearned, v, key).is_none());
        }
    }
    assert!(e.snapshot().conflicts().is_empty());
    assert_eq!(
        h.store.tier(Tier::Common, ToneVariant::Untoned).unwrap().get("㐂"),
        Some(&vec!["xi".to_string()])
    );

    // interval guard on the next scheduled run
    e.learn("龘", "dá").unwrap();
    e.learn("㸚", "lì").unwrap();
    let r = e.merge(ToneVariant::Toned, false).unwrap();
    assert_eq!(r.deferred, Some(crate::learning::Deferred::Interval));
    h.clock.advance(100);
    assert_eq!(e.merge(ToneVariant::Toned, false).unwrap().merged.len(), 2);
}

#[test]
fn persistence_failure_keeps_state_and_serves_reads() {
    let h = harness();
    let e = &h.engine;
    e.resolve('㐁', None);
    h.store.set_fail_saves(true);

    let before = e.snapshot();
    let err = e.merge(ToneVariant::Toned, true).unwrap_err();
    assert!(matches!(err, MigrationError::Persistence(_)));
    assert!(Arc::ptr_eq(&before, &e.snapshot()));
    assert_eq!(e.tiers_of("㐁"), vec![Tier::Rare, Tier::SelfLearned]);
    assert_eq!(e.convert("㐁", &opts()), "tiàn");
    assert!(e.flush().is_err());

    h.store.set_fail_saves(false);
    assert_eq!(e.merge(ToneVariant::Toned, true).unwrap().merged.len(), 1);
    assert_eq!(e.tiers_of("㐁"), vec![Tier::Common]);
}

#[test]
fn demotion_follows_clock_and_load() {
    let h = harness();
    let e = &h.engine;
    for _ in 0..50 {
        e.resolve('你', None);
    }
    e.resolve('银', None);

    assert_eq!(
        e.demote(false).unwrap().deferred,
        Some(crate::learning::Deferred::Interval)
    );
    h.clock.advance(1000);
    h.clock.set_load(Some(0.95));
    let r = e.demote(false).unwrap();
    assert!(r.backoff);
    assert!(r.deferred.is_some());

    h.clock.set_load(None);
    let r = e.demote(false).unwrap();
    assert_eq!(r.demoted, vec!["银".to_string()]);
    assert_eq!(e.tiers_of("银"), vec![Tier::Rare]);
    assert_eq!(e.tiers_of("你"), vec![Tier::Common]);
}

#[test]
fn unresolved_hanzi_go_to_the_sink_and_can_be_learned() {
    struct Fetcher;
    impl PronunciationFetcher for Fetcher {
        fn fetch(&self, key: &str) -> Option<String> {
            (key == "龘").then(|| "da2".to_string())
        }
    }

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(0));
    let pending = Arc::new(PendingLookups::new());
    let e = builder(&store, &clock)
        .not_found(pending.clone())
        .build()
        .unwrap();

    let dropped = ConvertOptions {
        special: SpecialChars::Drop,
        ..opts()
    };
    assert_eq!(e.convert("你龘㸚，", &dropped), "nǐ 龘 㸚");
    // the comma is not Chinese and is never reported
    assert_eq!(pending.len(), 2);

    assert_eq!(e.learn_pending(&pending, &Fetcher), 1);
    assert_eq!(pending.drain(), vec!["㸚".to_string()]);
    assert_eq!(e.tiers_of("龘"), vec![Tier::SelfLearned]);
    assert_eq!(e.frequency("龘"), 1);
    assert_eq!(e.resolve('龘', None).pronunciation, "dá");
}

#[test]
fn observations_queue_while_writer_is_busy() {
    let h = harness();
    let guard = h.engine.learner.lock().unwrap();
    let r = h.engine.resolve('㐁', None);
    assert_eq!(r.pronunciation, "tiàn");
    assert_eq!(h.engine.backlog.lock().unwrap().len(), 1);
    drop(guard);

    assert_eq!(h.engine.frequency("㐁"), 1);
    assert!(h.engine.backlog.lock().unwrap().is_empty());
    assert_eq!(h.engine.tiers_of("㐁"), vec![Tier::Rare, Tier::SelfLearned]);
}

#[test]
fn state_survives_reload() {
    let h = harness();
    h.engine.resolve('㐁', None);
    h.engine.resolve('你', None);
    h.engine.flush().unwrap();

    let reloaded = builder(&h.store, &h.clock).build().unwrap();
    assert_eq!(reloaded.tiers_of("㐁"), vec![Tier::Rare, Tier::SelfLearned]);
    assert_eq!(reloaded.frequency("㐁"), 1);
    assert_eq!(reloaded.frequency("你"), 1);
    // a third hit promotes across the restart
    reloaded.resolve('㐁', None);
    reloaded.resolve('㐁', None);
    assert_eq!(reloaded.tiers_of("㐁"), vec![Tier::Common]);
}

#[test]
fn file_stores_round_trip_engine_state() {
    let dir = tempfile::tempdir().unwrap();
    let build = || {
        Engine::builder()
            .settings(test_settings())
            .dictionary_store(Arc::new(FileDictionaryStore::new(dir.path())))
            .frequency_store(Arc::new(FileFrequencyStore::new(dir.path().join("ledger.pyfq"))))
            .clock(Arc::new(ManualClock::new(0)))
            .entry(Tier::Rare, "㐁", &["tiàn"])
            .build()
            .unwrap()
    };
    let e = build();
    e.set_custom("银行", &["yín háng"]).unwrap();
    for _ in 0..3 {
        e.resolve('㐁', None);
    }
    e.flush().unwrap();
    drop(e);

    let e = build();
    assert_eq!(e.tiers_of("㐁"), vec![Tier::Common]);
    assert_eq!(e.convert("银行", &ConvertOptions::default()), "yín háng");
}

#[test]
fn inconsistent_snapshot_is_healed_on_load() {
    let store = Arc::new(MemoryStore::new());
    let mut dup = TierMap::new();
    dup.insert("好".to_string(), vec!["hǎo".to_string()]);
    store.seed(Tier::Common, ToneVariant::Toned, dup.clone());
    store.seed(Tier::Rare, ToneVariant::Toned, dup);
    let e = Engine::builder().store(store).build().unwrap();
    assert_eq!(e.tiers_of("好"), vec![Tier::Common]);
    assert!(e.snapshot().conflicts().is_empty());
}

#[test]
fn bad_rule_toml_fails_the_build() {
    let err = Engine::builder()
        .rules_toml("[[rules]]\nchar = \"行\"\nkind = \"word\"\ntarget = \"行\"\npinyin = \"xíng\"\n")
        .build();
    assert!(matches!(err, Err(EngineError::Rule(_))));

    let e = Engine::builder()
        .entry(Tier::Common, "好", &["hǎo", "hào"])
        .entry(Tier::Common, "爱", &["ài"])
        .rules_toml("[[rules]]\nchar = \"好\"\nkind = \"following\"\ntarget = \"爱\"\npinyin = \"hào\"\n")
        .build()
        .unwrap();
    assert_eq!(e.convert("好爱", &ConvertOptions::default()), "hào ài");
}

#[test]
fn concurrent_readers_and_migrations_stay_consistent() {
    let h = harness();
    let e = &h.engine;
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for i in 0..50 {
                    let text = if i % 2 == 0 { "银行㐁" } else { "你好㐂" };
                    let out = e.syllables(text, &opts());
                    assert_eq!(out.len(), 3);
                }
            });
        }
        s.spawn(|| {
            for _ in 0..10 {
                e.merge(ToneVariant::Toned, true).unwrap();
                e.merge(ToneVariant::Untoned, true).unwrap();
            }
        });
    });
    e.flush().unwrap();
    assert!(e.snapshot().conflicts().is_empty());
    assert_eq!(e.tiers_of("㐁"), vec![Tier::Common]);
    assert_eq!(e.tiers_of("㐂"), vec![Tier::Common]);
    let counts: HashMap<String, u64> = h.store.counts();
    assert!(counts.contains_key("银"));
}
