use fieldrank_core::{Document, Filters, IndexSchema, SearchIndex};
use proptest::prelude::*;

const WORDS: &[&str] = &["course", "start", "refund", "docker", "install", "join", "week", "homework", "free", "policy"];
const COURSES: &[&str] = &["de", "ml", "mlops"];

fn text() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS), 0..6).prop_map(|w| w.join(" "))
}

fn document() -> impl Strategy<Value = Document> {
    (text(), text(), prop::sample::select(COURSES)).prop_map(|(q, a, c)| {
        Document::from([("question".to_string(), q), ("answer".to_string(), a), ("course".to_string(), c.to_string())])
    })
}

fn fitted(docs: Vec<Document>) -> SearchIndex {
    let index = SearchIndex::new(IndexSchema::new(["question", "answer"], ["course"])).unwrap();
    index.fit(docs).unwrap();
    index
}

proptest! {
    #[test]
    fn hits_are_bounded_positive_and_sorted(docs in prop::collection::vec(document(), 0..20), query in text(), k in 1usize..8) {
        let index = fitted(docs);
        let hits = index.search_hits(&query, k, &Filters::new()).unwrap();
        prop_assert!(hits.len() <= k);
        prop_assert!(hits.iter().all(|h| h.score > 0.0));
        prop_assert!(hits.windows(2).all(|w| w[0].score > w[1].score || (w[0].score == w[1].score && w[0].index < w[1].index)));
    }

    #[test]
    fn search_is_repeatable(docs in prop::collection::vec(document(), 0..20), query in text()) {
        let index = fitted(docs);
        let a = index.search(&query, 5, &Filters::new()).unwrap();
        let b = index.search(&query, 5, &Filters::new()).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn filtered_hits_match_the_filter(docs in prop::collection::vec(document(), 0..20), query in text(), course in prop::sample::select(COURSES)) {
        let index = fitted(docs);
        let filters = Filters::from([("course".to_string(), course.to_string())]);
        for d in index.search(&query, 20, &filters).unwrap() {
            prop_assert_eq!(d["course"].as_str(), course);
        }
    }

    #[test]
    fn snapshot_round_trip_matches(docs in prop::collection::vec(document(), 0..12), query in text()) {
        let index = fitted(docs);
        let mut blob = Vec::new();
        index.save(&mut blob).unwrap();
        let restored = SearchIndex::new(index.schema().clone()).unwrap();
        restored.load(blob.as_slice()).unwrap();
        prop_assert_eq!(index.search_hits(&query, 5, &Filters::new()).unwrap(), restored.search_hits(&query, 5, &Filters::new()).unwrap());
    }
}
