//! Property-style checks for the headline deduplicator over seeded random
//! title sets built from a small F1 vocabulary (so near-duplicates are common).

use paddock_pub_chat::analyze::{deduplicate, deduplicate_with_report, title_similarity, DedupParams};
use paddock_pub_chat::SourceItem;
use rand::{rngs::StdRng, seq::IndexedRandom, Rng, SeedableRng};

const WORDS: &[&str] = &[
    "verstappen", "norris", "leclerc", "hamilton", "piastri", "russell", "wins", "takes", "crashes",
    "fastest", "pole", "silverstone", "monza", "spa", "grand", "prix", "victory", "sponsor",
    "ferrari", "mclaren", "red", "bull", "upgrade", "penalty", "in", "at", "the", "new",
];

fn random_items(rng: &mut StdRng, n: usize) -> Vec<SourceItem> {
    let mut out: Vec<SourceItem> = Vec::with_capacity(n);
    for i in 0..n {
        // a third of the time, lightly mutate an earlier title
        let title = if i > 0 && rng.random_bool(0.33) {
            let base = &out[rng.random_range(0..out.len())].title;
            let mut words: Vec<String> = base.split(' ').map(str::to_string).collect();
            let at = rng.random_range(0..=words.len());
            words.insert(at, WORDS.choose(rng).unwrap().to_string());
            words.join(" ")
        } else {
            let len = rng.random_range(0..7);
            (0..len)
                .map(|_| *WORDS.choose(rng).unwrap())
                .collect::<Vec<_>>()
                .join(" ")
        };
        out.push(SourceItem::new(title, format!("src{}", i % 3)));
    }
    out
}

fn is_subsequence(sub: &[SourceItem], full: &[SourceItem]) -> bool {
    let mut it = full.iter();
    sub.iter().all(|s| it.any(|f| f == s))
}

#[test]
fn dedup_invariants_hold_on_random_inputs() {
    let mut rng = StdRng::seed_from_u64(42);
    for round in 0..300 {
        let n = rng.random_range(0..25);
        let items = random_items(&mut rng, n);
        let params = DedupParams::new(rng.random_range(0..12), rng.random_range(0.3..0.9));

        let once = deduplicate(&items, &params);

        assert!(once.len() <= params.max_count, "round {round}: cap");
        assert!(is_subsequence(&once, &items), "round {round}: order");
        assert_eq!(deduplicate(&once, &params), once, "round {round}: idempotence");

        for (i, a) in once.iter().enumerate() {
            for b in &once[i + 1..] {
                let s = title_similarity(&a.title, &b.title, params.metric);
                assert!(s <= params.threshold, "round {round}: {:?} vs {:?} = {s}", a.title, b.title);
            }
        }
    }
}

#[test]
fn report_accounts_for_every_input() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..100 {
        let items = random_items(&mut rng, 20);
        let r = deduplicate_with_report(&items, &DedupParams::new(6, 0.6));
        assert_eq!(r.kept.len() + r.dropped + r.unexamined, items.len());
    }
}

#[test]
fn example_headlines_collapse_to_two() {
    let items: Vec<SourceItem> = [
        "Verstappen wins Silverstone GP",
        "Max Verstappen takes Silverstone victory",
        "Ferrari announce new sponsor",
    ]
    .iter()
    .map(|t| SourceItem::new(*t, "feed"))
    .collect();
    let out = deduplicate(&items, &DedupParams::default());
    let titles: Vec<&str> = out.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Verstappen wins Silverstone GP", "Ferrari announce new sponsor"]);
}

#[test]
fn cap_of_one_keeps_first_seen() {
    let items: Vec<SourceItem> = ["Alpha", "Bravo", "Charlie"]
        .iter()
        .map(|t| SourceItem::new(*t, "feed"))
        .collect();
    let out = deduplicate(&items, &DedupParams::new(1, 0.6));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].title, "Alpha");
}

#[test]
fn blank_titles_are_never_merged() {
    let items = vec![
        SourceItem::new("", "a").with_link("https://a.test/1"),
        SourceItem::new("   ", "b").with_link("https://b.test/2"),
        SourceItem::new("", "c").with_link("https://c.test/3"),
    ];
    let out = deduplicate(&items, &DedupParams::default());
    assert_eq!(out.len(), 3);
}
