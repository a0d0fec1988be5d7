//! The logical item schema must round-trip losslessly through whatever
//! storage the caller chooses; JSON on disk is the reference case.

use std::fs;

use fluid_harness::{BankError, Item, ItemBank};

fn sample_items() -> Vec<Item> {
    vec![
        Item::new(
            "easy-1",
            "Sarah is working on the AI project.",
            "person: Sarah\nproject: AI project",
            -1.0,
            1.5,
        )
        .with_domain("extraction"),
        Item::new(
            "medium-1",
            "The Q3 optimization initiative improved efficiency by 40%.",
            "project: optimization initiative",
            0.0,
            1.8,
        ),
        Item::new("hard-1", "Invoice #INV-2024-001 from Acme Corp.", "document: INV-2024-001", 1.0, 2.0),
    ]
}

#[test]
fn items_round_trip_through_json_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bank.json");

    let original = sample_items();
    fs::write(&path, serde_json::to_string_pretty(&original).unwrap()).unwrap();

    let restored: Vec<Item> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(restored.len(), original.len());
    for (a, b) in original.iter().zip(restored.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.prompt, b.prompt);
        assert_eq!(a.answer_key, b.answer_key);
        assert_eq!(a.difficulty, b.difficulty);
        assert_eq!(a.discrimination, b.discrimination);
        assert_eq!(a.domain, b.domain);
    }

    let bank = ItemBank::from_items(restored).unwrap();
    assert_eq!(bank.len(), 3);
    assert_eq!(bank.get("easy-1").unwrap().domain.as_deref(), Some("extraction"));
}

#[test]
fn missing_domain_tag_is_optional_in_the_schema() {
    let json = r#"{
        "id": "x",
        "prompt": "p",
        "answer_key": "k",
        "difficulty": 0.5,
        "discrimination": 1.2
    }"#;
    let item: Item = serde_json::from_str(json).unwrap();
    assert_eq!(item.domain, None);

    // Absent when None, so the schema stays minimal on the way out too.
    let out = serde_json::to_string(&item).unwrap();
    assert!(!out.contains("domain"));
}

#[test]
fn from_items_applies_insertion_validation() {
    let items = vec![
        Item::new("ok", "p", "k", 0.0, 1.0),
        Item::new("bad", "p", "k", 0.0, -1.0),
    ];
    let err = ItemBank::from_items(items).unwrap_err();
    assert!(matches!(err, BankError::InvalidItemParameter { .. }));
}
