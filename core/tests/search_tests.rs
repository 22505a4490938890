use fieldrank_core::{Document, Filters, IndexSchema, RankError, SearchIndex};

fn doc(pairs: &[(&str, &str)]) -> Document {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn filters(pairs: &[(&str, &str)]) -> Filters {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn faq() -> Vec<Document> {
    vec![
        doc(&[("question", "When does the course start?"), ("answer", "The course starts on 15 January."), ("course", "de"), ("section", "general")]),
        doc(&[("question", "What is the refund policy?"), ("answer", "Refunds are available within two weeks."), ("course", "ml"), ("section", "general")]),
        doc(&[("question", "How do I install docker?"), ("answer", "Follow the docker install guide for your system."), ("course", "de"), ("section", "setup")]),
        doc(&[("question", "Can I still join the course?"), ("answer", "Yes, you can join after the start date."), ("course", "ml"), ("section", "general")]),
        doc(&[("question", "Where are the homework deadlines?"), ("answer", "Homework deadlines are in the course calendar."), ("course", "mlops"), ("section", "homework")]),
    ]
}

fn faq_index() -> SearchIndex {
    let index = SearchIndex::new(IndexSchema::new(["question", "answer"], ["course", "section"])).unwrap();
    index.fit(faq()).unwrap();
    index
}

#[test]
fn two_document_example() {
    let corpus = vec![
        doc(&[("q", "when does the course start"), ("course", "de")]),
        doc(&[("q", "what is the refund policy"), ("course", "ml")]),
    ];
    let index = SearchIndex::new(IndexSchema::new(["q"], ["course"])).unwrap();
    index.fit(corpus.clone()).unwrap();

    let res = index.search("course start", 1, &Filters::new()).unwrap();
    assert_eq!(res, vec![corpus[0].clone()]);

    let res = index.search("course start", 1, &filters(&[("course", "ml")])).unwrap();
    assert!(res.is_empty());
}

#[test]
fn single_document_corpus_is_searchable() {
    let corpus = vec![doc(&[("q", "when does the course start"), ("course", "de")])];
    let index = SearchIndex::new(IndexSchema::new(["q"], ["course"])).unwrap();
    index.fit(corpus.clone()).unwrap();
    assert_eq!(index.search("when does the course start", 5, &Filters::new()).unwrap(), corpus);
    assert_eq!(index.search("course", 5, &filters(&[("course", "de")])).unwrap(), corpus);
}

#[test]
fn shared_terms_still_match() {
    let corpus = vec![
        doc(&[("q", "when does the course start")]),
        doc(&[("q", "is the course recorded")]),
    ];
    let index = SearchIndex::new(IndexSchema::new(["q"], Vec::<String>::new())).unwrap();
    index.fit(corpus).unwrap();
    let hits = index.search_hits("the course", 5, &Filters::new()).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.score > 0.0));
}

#[test]
fn empty_corpus_returns_nothing() {
    let index = SearchIndex::new(IndexSchema::new(["q"], ["course"])).unwrap();
    index.fit(Vec::new()).unwrap();
    assert!(index.is_empty());
    assert!(index.search("anything at all", 5, &Filters::new()).unwrap().is_empty());
    assert!(index.search("anything", 5, &filters(&[("course", "de")])).unwrap().is_empty());
}

#[test]
fn unknown_terms_return_nothing() {
    let index = faq_index();
    assert!(index.search("kubernetes helm", 5, &Filters::new()).unwrap().is_empty());
    assert!(index.search("", 5, &Filters::new()).unwrap().is_empty());
}

#[test]
fn results_are_bounded_and_positive() {
    let index = faq_index();
    for k in 1..=6 {
        let hits = index.search_hits("course join start homework docker", k, &Filters::new()).unwrap();
        assert!(hits.len() <= k);
        assert!(hits.iter().all(|h| h.score > 0.0));
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

#[test]
fn search_is_idempotent() {
    let index = faq_index();
    let f = filters(&[("section", "general")]);
    let a = index.search("can I join the course", 3, &f).unwrap();
    let b = index.search("can I join the course", 3, &f).unwrap();
    assert_eq!(a, b);
    assert!(!a.is_empty());
}

#[test]
fn filters_are_a_strict_and() {
    let index = faq_index();
    let f = filters(&[("course", "ml"), ("section", "general")]);
    let res = index.search("course refund join start", 5, &f).unwrap();
    assert!(!res.is_empty());
    for d in &res {
        assert_eq!(d["course"], "ml");
        assert_eq!(d["section"], "general");
    }

    // satisfiable alone, but no document has both
    let f = filters(&[("course", "mlops"), ("section", "general")]);
    assert!(index.search("course", 5, &f).unwrap().is_empty());
}

#[test]
fn unsatisfiable_filters_return_nothing() {
    let index = faq_index();
    assert!(index.search("course", 5, &filters(&[("course", "rust")])).unwrap().is_empty());
    // not a keyword field
    assert!(index.search("course", 5, &filters(&[("instructor", "de")])).unwrap().is_empty());
    // text fields cannot be used as filters
    assert!(index.search("course", 5, &filters(&[("question", "When does the course start?")])).unwrap().is_empty());
}

#[test]
fn missing_fields_are_empty_strings() {
    let corpus = vec![doc(&[("q", "docker install")]), doc(&[("course", "de")])];
    let index = SearchIndex::new(IndexSchema::new(["q"], ["course"])).unwrap();
    index.fit(corpus).unwrap();
    let res = index.search("docker", 5, &filters(&[("course", "")])).unwrap();
    assert_eq!(res.len(), 1);
    assert_eq!(res[0]["q"], "docker install");
}

#[test]
fn boost_moves_field_matches_up() {
    let corpus = vec![
        doc(&[("title", "pricing"), ("body", "docker docker docker setup")]),
        doc(&[("title", "docker"), ("body", "pricing plans and billing for teams")]),
        doc(&[("title", "billing"), ("body", "nothing relevant")]),
    ];
    let plain = SearchIndex::new(IndexSchema::new(["title", "body"], Vec::<String>::new())).unwrap();
    plain.fit(corpus.clone()).unwrap();
    let boosted = SearchIndex::new(IndexSchema::new(["title", "body"], Vec::<String>::new()).with_boost("title", 5.0)).unwrap();
    boosted.fit(corpus).unwrap();

    let rank_of = |hits: &[fieldrank_core::Hit], idx: usize| hits.iter().position(|h| h.index == idx).unwrap();
    let before = plain.search_hits("docker", 3, &Filters::new()).unwrap();
    let after = boosted.search_hits("docker", 3, &Filters::new()).unwrap();
    assert!(rank_of(&after, 1) <= rank_of(&before, 1));
    assert_eq!(after[0].index, 1);

    let title_only_before = before.iter().find(|h| h.index == 1).unwrap().score;
    let title_only_after = after.iter().find(|h| h.index == 1).unwrap().score;
    assert!((title_only_after - 5.0 * title_only_before).abs() < 1e-5);
}

#[test]
fn ties_break_by_corpus_order() {
    let corpus = vec![doc(&[("q", "alpha beta")]), doc(&[("q", "gamma")]), doc(&[("q", "alpha beta")])];
    let index = SearchIndex::new(IndexSchema::new(["q"], Vec::<String>::new())).unwrap();
    index.fit(corpus).unwrap();
    let hits = index.search_hits("alpha", 5, &Filters::new()).unwrap();
    let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
    assert_eq!(order, vec![0, 2]);
    assert_eq!(hits[0].score, hits[1].score);
}

#[test]
fn refit_replaces_everything() {
    let index = faq_index();
    assert_eq!(index.len(), 5);
    index.fit(vec![doc(&[("question", "brand new corpus"), ("course", "x")])]).unwrap();
    assert_eq!(index.len(), 1);
    assert!(index.search("docker", 5, &Filters::new()).unwrap().is_empty());
    assert!(index.search("course", 5, &filters(&[("course", "de")])).unwrap().is_empty());
    assert_eq!(index.document(0).unwrap()["question"], "brand new corpus");
}

#[test]
fn errors_are_distinct_from_empty_results() {
    let index = SearchIndex::new(IndexSchema::new(["q"], ["course"])).unwrap();
    assert!(matches!(index.search("q", 5, &Filters::new()), Err(RankError::NotInitialized(_))));
    index.fit(Vec::new()).unwrap();
    assert!(matches!(index.search("q", 0, &Filters::new()), Err(RankError::InvalidArgument(_))));
    assert_eq!(index.search("q", 1, &Filters::new()).unwrap(), Vec::<Document>::new());
}

#[test]
fn concurrent_searches_during_refit() {
    use std::sync::Arc;
    let index = Arc::new(faq_index());
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let res = index.search("course", 5, &Filters::new()).unwrap();
                    // every hit belongs to one coherent corpus
                    assert!(res.iter().all(|d| d.contains_key("question")));
                }
            })
        })
        .collect();
    for _ in 0..10 {
        index.fit(faq()).unwrap();
    }
    for r in readers {
        r.join().unwrap();
    }
}
