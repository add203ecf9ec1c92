use csmc_lik::{Alignment, SequenceRecord};

fn code_of(records: Vec<SequenceRecord>) -> String {
    Alignment::new(records).unwrap_err().info().code.clone()
}

#[test]
fn rejects_too_few_sequences() {
    assert_eq!(code_of(Vec::new()), "empty-alignment");
    assert_eq!(
        code_of(vec![SequenceRecord::new("a", "ACGT")]),
        "single-sequence"
    );
}

#[test]
fn rejects_unequal_lengths() {
    let err = Alignment::new(vec![
        SequenceRecord::new("a", "ACGT"),
        SequenceRecord::new("b", "ACG"),
    ])
    .unwrap_err();
    assert!(matches!(err, csmc_core::CsmcError::Input(_)));
    assert_eq!(err.info().code, "length-mismatch");
    assert_eq!(err.info().context["label"], "b");
}

#[test]
fn rejects_empty_sequences_and_duplicates() {
    assert_eq!(
        code_of(vec![SequenceRecord::new("a", ""), SequenceRecord::new("b", "")]),
        "empty-sequence"
    );
    assert_eq!(
        code_of(vec![
            SequenceRecord::new("a", "AC"),
            SequenceRecord::new("a", "GT"),
        ]),
        "duplicate-label"
    );
}

#[test]
fn rejects_unknown_symbols() {
    let err = Alignment::new(vec![
        SequenceRecord::new("a", "ACGT"),
        SequenceRecord::new("b", "AC*T"),
    ])
    .unwrap_err();
    assert_eq!(err.info().code, "invalid-character");
    assert_eq!(err.info().context["site"], "2");
}

#[test]
fn encodes_ambiguity_and_keeps_order() {
    let alignment = Alignment::new(vec![
        SequenceRecord::new("first", "AN-r"),
        SequenceRecord::new("second", "TTTT"),
    ])
    .unwrap();
    assert_eq!(alignment.tip_count(), 2);
    assert_eq!(alignment.site_count(), 4);
    assert_eq!(alignment.labels(), ["first", "second"]);
    assert_eq!(alignment.masks(0), [1, 15, 15, 5]);
    assert_eq!(alignment.masks(1), [8, 8, 8, 8]);
}

#[test]
fn digest_tracks_content() {
    let make = |seq: &str| {
        Alignment::new(vec![
            SequenceRecord::new("a", "ACGT"),
            SequenceRecord::new("b", seq),
        ])
        .unwrap()
    };
    assert_eq!(make("ACGA").digest(), make("ACGA").digest());
    assert_ne!(make("ACGA").digest(), make("ACGC").digest());
    assert_eq!(make("ACGA").digest().len(), 64);
}
