use super::*;

fn map(entries: &[(&str, &[&str])]) -> TierMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
        .collect()
}

#[test]
fn test_normalize_candidates() {
    let c = normalize_candidates(["xíng", " háng ", "xíng", ""]);
    assert_eq!(c, vec!["xíng", "háng"]);
    assert!(normalize_candidates(Vec::<String>::new()).is_empty());
}

#[test]
fn test_clean_candidates() {
    assert_eq!(clean_candidates(["hao3", "hǎo", "HAO", " "]), vec!["hǎo"]);
    assert_eq!(clean_candidates(["yin2 hang2"]), vec!["yín háng"]);
    assert!(clean_candidates(["  ", "行"]).is_empty());
}

#[test]
fn test_untoned_candidates_collapse() {
    let toned = vec!["xíng".to_string(), "xìng".to_string(), "háng".to_string()];
    assert_eq!(untoned_candidates(&toned), vec!["xing", "hang"]);
}

#[test]
fn test_insert_and_lookup() {
    let mut s = TierSnapshot::new();
    assert!(s.insert_both(Tier::Common, "行", &["xíng", "háng"]));
    assert_eq!(
        s.get(Tier::Common, ToneVariant::Toned, "行"),
        Some(&["xíng".to_string(), "háng".to_string()][..])
    );
    assert_eq!(
        s.get(Tier::Common, ToneVariant::Untoned, "行"),
        Some(&["xing".to_string(), "hang".to_string()][..])
    );
    let (c, v) = s.lookup(Tier::Common, "行").unwrap();
    assert_eq!(v, ToneVariant::Toned);
    assert_eq!(c[0], "xíng");
}

#[test]
fn test_lookup_falls_back_to_untoned() {
    let mut s = TierSnapshot::new();
    s.insert(Tier::SelfLearned, ToneVariant::Untoned, "㐀", &["qiu"]);
    let (c, v) = s.lookup(Tier::SelfLearned, "㐀").unwrap();
    assert_eq!(v, ToneVariant::Untoned);
    assert_eq!(c, ["qiu".to_string()]);
}

#[test]
fn test_empty_candidates_never_stored() {
    let mut s = TierSnapshot::new();
    s.insert_both(Tier::Rare, "㐁", &["tiàn"]);
    assert!(!s.insert(Tier::Rare, ToneVariant::Toned, "㐁", &[" "]));
    assert!(s.get(Tier::Rare, ToneVariant::Toned, "㐁").is_none());
    assert!(!s.insert_both(Tier::Rare, "㐂", &[] as &[&str]));
    assert!(!s.contains(Tier::Rare, "㐂"));
}

#[test]
fn test_replace_normalizes() {
    let mut s = TierSnapshot::new();
    s.replace(
        Tier::Common,
        ToneVariant::Toned,
        map(&[("好", &["hǎo", "hǎo", "hào"]), ("空", &[]), ("", &["a"])]),
    );
    assert_eq!(s.len(Tier::Common, ToneVariant::Toned), 1);
    assert_eq!(s.get(Tier::Common, ToneVariant::Toned, "好").unwrap().len(), 2);
}

#[test]
fn test_derive_untoned() {
    let mut s = TierSnapshot::new();
    s.replace(Tier::Common, ToneVariant::Toned, map(&[("好", &["hǎo", "hào"])]));
    s.derive_untoned(Tier::Common);
    assert_eq!(
        s.get(Tier::Common, ToneVariant::Untoned, "好"),
        Some(&["hao".to_string()][..])
    );
}

#[test]
fn test_remove_both_variants() {
    let mut s = TierSnapshot::new();
    s.insert_both(Tier::Rare, "㐁", &["tiàn"]);
    assert!(s.remove(Tier::Rare, "㐁"));
    assert!(!s.contains(Tier::Rare, "㐁"));
    assert!(!s.remove(Tier::Rare, "㐁"));
}

#[test]
fn test_tiers_of_in_priority_order() {
    let mut s = TierSnapshot::new();
    s.insert_both(Tier::SelfLearned, "㐁", &["tiàn"]);
    s.insert_both(Tier::Rare, "㐁", &["tiàn"]);
    s.insert_both(Tier::Custom, "㐁", &["tian"]);
    assert_eq!(
        s.tiers_of("㐁"),
        vec![Tier::Custom, Tier::Rare, Tier::SelfLearned]
    );
}

#[test]
fn test_pending_self_learned_is_not_a_conflict() {
    let mut s = TierSnapshot::new();
    s.insert_both(Tier::Rare, "㐁", &["tiàn"]);
    s.insert_both(Tier::SelfLearned, "㐁", &["tiàn"]);
    s.insert_both(Tier::Custom, "好", &["hǎo"]);
    s.insert_both(Tier::Common, "好", &["hǎo"]);
    assert!(s.conflicts().is_empty());
}

#[test]
fn test_heal_keeps_higher_priority() {
    let mut s = TierSnapshot::new();
    s.insert_both(Tier::Common, "好", &["hǎo"]);
    s.insert_both(Tier::Rare, "好", &["hào"]);
    s.insert_both(Tier::SelfLearned, "好", &["hào"]);

    let conflicts = s.conflicts();
    assert_eq!(conflicts.len(), 4);
    assert!(conflicts
        .iter()
        .all(|c| c.kept == Tier::Common && c.key == "好"));

    let healed = s.heal();
    assert_eq!(healed.len(), 4);
    assert!(s.conflicts().is_empty());
    assert_eq!(s.tiers_of("好"), vec![Tier::Common]);
    assert_eq!(s.get(Tier::Common, ToneVariant::Toned, "好").unwrap()[0], "hǎo");
}

#[test]
fn test_snapshot_clone_is_isolated() {
    let mut a = TierSnapshot::new();
    a.insert_both(Tier::Common, "好", &["hǎo"]);
    let before = a.clone();
    a.remove(Tier::Common, "好");
    assert!(before.contains(Tier::Common, "好"));
    assert!(!a.contains(Tier::Common, "好"));
}

#[test]
fn test_longest_custom_key_tracks_writes() {
    let mut s = TierSnapshot::new();
    assert_eq!(s.longest_custom_key(), 0);
    s.insert_both(Tier::Custom, "好", &["hǎo"]);
    s.insert_both(Tier::Custom, "重庆市", &["chóng qìng shì"]);
    s.insert_both(Tier::Common, "长城长", &["cháng chéng cháng"]);
    assert_eq!(s.longest_custom_key(), 3);

    let before = s.clone();
    s.remove(Tier::Custom, "重庆市");
    assert_eq!(s.longest_custom_key(), 1);
    assert_eq!(before.longest_custom_key(), 3);

    s.replace(Tier::Custom, ToneVariant::Toned, map(&[("银行", &["yín háng"])]));
    assert_eq!(s.longest_custom_key(), 2);
}

#[test]
fn test_builtin_fallback() {
    assert_eq!(builtin_fallback('〇'), Some("líng"));
    assert_eq!(builtin_fallback('好'), None);
}

#[test]
fn test_tier_order() {
    assert!(Tier::Custom < Tier::Common);
    assert!(Tier::Common < Tier::Rare);
    assert!(Tier::Extended < Tier::SelfLearned);
    assert_eq!(Tier::SelfLearned.name(), "self_learned");
    assert_eq!(ToneVariant::Toned.other(), ToneVariant::Untoned);
}
