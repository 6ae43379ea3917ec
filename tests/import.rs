use std::fs;

use collectr::{
    attribute::{AttributeKind, AttributeSet},
    error::ImportError,
    import::{CollectionFileSink, ImportLimits, ImportSession, ImportSource, ItemSink},
    item::{Collection, ItemStatus},
    mapping::{MappingPlan, MappingTarget},
    parser::ImportFormat,
};
use rust_decimal::Decimal;
use serde_json::json;

mod common;
use common::{TestWorkspace, fixture_path};

fn read_fixture(name: &str) -> ImportSource {
    ImportSource::read(
        &fixture_path(name),
        &ImportLimits::default(),
        encoding_rs::UTF_8,
    )
    .expect("read fixture")
}

fn fixture_attributes() -> AttributeSet {
    AttributeSet::load(&fixture_path("attributes.yaml")).expect("load attributes")
}

fn import_error(err: anyhow::Error) -> ImportError {
    err.downcast::<ImportError>().expect("import error")
}

#[test]
fn unsupported_extension_is_rejected() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("records.xlsx", "Name\nA\n");
    let err = ImportSource::read(&path, &ImportLimits::default(), encoding_rs::UTF_8)
        .unwrap_err();
    assert_eq!(
        import_error(err),
        ImportError::UnsupportedExtension {
            extension: "xlsx".to_string()
        }
    );
}

#[test]
fn size_limit_is_checked_before_parsing() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("big.csv", &"Name\nA\n".repeat(10));
    let limits = ImportLimits {
        max_bytes: 16,
        ..ImportLimits::default()
    };
    let err = ImportSource::read(&path, &limits, encoding_rs::UTF_8).unwrap_err();
    assert_eq!(
        import_error(err),
        ImportError::FileTooLarge {
            size: 70,
            limit: 16
        }
    );
}

#[test]
fn latin1_input_is_decoded() {
    let workspace = TestWorkspace::new();
    let path = workspace.join("latin1.csv");
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode("Name;Größe\nMünze;3\n");
    fs::write(&path, bytes).expect("write latin1 file");

    let source = ImportSource::read(&path, &ImportLimits::default(), encoding_rs::WINDOWS_1252)
        .expect("read latin1");
    let session = ImportSession::parse(source, &ImportLimits::default()).expect("parse");
    assert_eq!(session.columns(), ["Name", "Größe"]);
    assert_eq!(session.records()[0]["Name"], json!("Münze"));
}

#[test]
fn csv_fixture_imports_fields_and_attributes() {
    let attributes = fixture_attributes();
    let session =
        ImportSession::parse(read_fixture("records.csv"), &ImportLimits::default()).expect("parse");
    let plan = MappingPlan::new(session.propose(attributes.as_slice())).expect("plan");
    let outcome = session.execute(&plan, attributes.as_slice()).expect("execute");

    assert_eq!(outcome.items.len(), 3);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].row, 3);
    assert!(outcome.warnings.is_empty());
    assert!(outcome.new_attributes.is_empty());

    let kind_of_blue = &outcome.items[0];
    assert_eq!(kind_of_blue.name, "Kind of Blue");
    assert_eq!(kind_of_blue.purchase_price, Some(Decimal::new(2499, 2)));
    assert_eq!(
        kind_of_blue.purchase_date.map(|d| d.to_string()),
        Some("2021-05-03".to_string())
    );
    assert_eq!(kind_of_blue.notes.as_deref(), Some("Erstpressung"));
    assert_eq!(kind_of_blue.attributes["genre"], json!(["jazz", "modal"]));
    assert_eq!(kind_of_blue.attributes["grade"], json!("VG+"));

    let abbey_road = &outcome.items[1];
    assert_eq!(abbey_road.name, "Abbey Road; Remaster");
    assert_eq!(abbey_road.notes, None);

    let blue_train = &outcome.items[2];
    assert_eq!(blue_train.purchase_price, Some(Decimal::new(129900, 2)));
    assert_eq!(blue_train.notes.as_deref(), Some("Signiert \"Coltrane\""));
}

#[test]
fn json_fixture_imports_status_and_new_attributes() {
    let session =
        ImportSession::parse(read_fixture("coins.json"), &ImportLimits::default()).expect("parse");
    let mut mappings = session.propose(&[]);
    for mapping in mappings.iter_mut().filter(|m| m.target.is_ignored()) {
        mapping.target = MappingTarget::NewAttribute;
    }
    let plan = MappingPlan::new(mappings).expect("plan");
    let outcome = session.execute(&plan, &[]).expect("execute");

    assert_eq!(outcome.items.len(), 3);
    let statuses = outcome.items.iter().map(|item| item.status).collect::<Vec<_>>();
    assert_eq!(
        statuses,
        vec![ItemStatus::InCollection, ItemStatus::Wishlist, ItemStatus::Sold]
    );
    assert_eq!(outcome.items[1].purchase_price, Some(Decimal::new(385, 1)));

    let created = outcome
        .new_attributes
        .iter()
        .map(|d| (d.name.as_str(), d.kind))
        .collect::<Vec<_>>();
    assert_eq!(
        created,
        vec![
            ("jahr", AttributeKind::Number),
            ("signiert", AttributeKind::Checkbox),
            ("prägestätte", AttributeKind::Text),
        ]
    );
    assert_eq!(outcome.items[0].attributes["jahr"], json!(1921));
    assert_eq!(outcome.items[2].attributes["jahr"], json!(1942));
    assert_eq!(outcome.items[0].attributes["signiert"], json!(false));
    assert!(!outcome.items[1].attributes.contains_key("signiert"));
}

#[test]
fn bad_cells_become_warnings_not_failures() {
    let attributes = fixture_attributes();
    let session = ImportSession::parse(
        ImportSource::from_text(
            "x.csv",
            ImportFormat::Csv,
            "Name;Kaufpreis;Signed\nA;teuer;vielleicht\nB;3;ja\n",
        ),
        &ImportLimits::default(),
    )
    .expect("parse");
    let plan = MappingPlan::new(session.propose(attributes.as_slice())).expect("plan");
    let outcome = session.execute(&plan, attributes.as_slice()).expect("execute");

    assert_eq!(outcome.items.len(), 2);
    assert_eq!(outcome.warnings.len(), 2);
    assert!(outcome.warnings.iter().all(|w| w.row == 1));
    assert_eq!(outcome.items[0].purchase_price, None);
    assert_eq!(outcome.items[1].attributes["signed"], json!(true));
}

#[test]
fn prices_with_surrounding_text_are_dropped_with_a_warning() {
    let session = ImportSession::parse(
        ImportSource::from_text(
            "x.csv",
            ImportFormat::Csv,
            "Name;Preis\nMünze;ca. 12 €\nSchein;Nr. 7\nBarren;12,50 €\n",
        ),
        &ImportLimits::default(),
    )
    .expect("parse");
    let plan = MappingPlan::new(session.propose(&[])).expect("plan");
    let outcome = session.execute(&plan, &[]).expect("execute");

    let prices = outcome
        .items
        .iter()
        .map(|item| item.purchase_price)
        .collect::<Vec<_>>();
    assert_eq!(prices, vec![None, None, Some(Decimal::new(1250, 2))]);
    let rows = outcome.warnings.iter().map(|w| w.row).collect::<Vec<_>>();
    assert_eq!(rows, vec![1, 2]);
}

#[test]
fn sink_appends_items_and_merges_new_attributes() {
    let workspace = TestWorkspace::new();
    let collection_path = workspace.join("vinyl.json");
    let attributes_path = workspace.copy_fixture("attributes.yaml");

    let session = ImportSession::parse(
        ImportSource::from_text("x.csv", ImportFormat::Csv, "Name;Label\nA;Blue Note\nB;Impulse\n"),
        &ImportLimits::default(),
    )
    .expect("parse");
    let mut mappings = session.propose(&[]);
    mappings[1].target = MappingTarget::NewAttribute;
    let plan = MappingPlan::new(mappings).expect("plan");
    let outcome = session.execute(&plan, &[]).expect("execute");

    let mut sink = CollectionFileSink::new(&collection_path, Some(attributes_path.clone()))
        .with_category(Some("jazz".to_string()));
    sink.persist(&outcome).expect("first persist");
    sink.persist(&outcome).expect("second persist");

    let collection = Collection::load(&collection_path).expect("load collection");
    assert_eq!(collection.name, "vinyl");
    assert_eq!(collection.items.len(), 4);
    assert!(
        collection
            .items
            .iter()
            .all(|item| item.category.as_deref() == Some("jazz"))
    );

    let attributes = AttributeSet::load(&attributes_path).expect("reload attributes");
    let label = attributes.get("label").expect("label attribute");
    assert_eq!(label.kind, AttributeKind::Text);
    assert_eq!(label.category.as_deref(), Some("jazz"));
    assert_eq!(
        attributes
            .as_slice()
            .iter()
            .filter(|d| d.name == "label")
            .count(),
        1
    );
}
