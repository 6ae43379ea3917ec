use collectr::{
    attribute::{AttributeDefinition, AttributeKind, AttributeSet},
    filter::{FilterSet, parse_criteria, passes_filters},
    import::{ImportLimits, ImportSession, ImportSource},
    mapping::MappingPlan,
    parser::ImportFormat,
};
use serde_json::{Map, Value, json};

mod common;
use common::fixture_path;

fn definitions() -> Vec<AttributeDefinition> {
    AttributeSet::load(&fixture_path("attributes.yaml"))
        .expect("load attributes")
        .attributes
}

fn attributes(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object literal")
}

fn filters(value: Value) -> FilterSet {
    value.as_object().cloned().expect("object literal")
}

#[test]
fn empty_filter_set_passes_everything() {
    let defs = definitions();
    assert!(passes_filters(&Map::new(), &FilterSet::new(), &defs));
    assert!(passes_filters(&attributes(json!({"year": 1959})), &FilterSet::new(), &defs));
}

#[test]
fn number_range_is_inclusive_and_requires_a_value() {
    let defs = definitions();
    let range = filters(json!({"year": {"min": 10, "max": 20}}));
    assert!(passes_filters(&attributes(json!({"year": 15})), &range, &defs));
    assert!(passes_filters(&attributes(json!({"year": 20})), &range, &defs));
    assert!(!passes_filters(&attributes(json!({"year": 25})), &range, &defs));
    assert!(!passes_filters(&Map::new(), &range, &defs));
    assert!(passes_filters(&attributes(json!({"year": "12"})), &range, &defs));
    assert!(!passes_filters(&attributes(json!({"year": "old"})), &range, &defs));
}

#[test]
fn open_number_bounds() {
    let defs = definitions();
    let min_only = filters(json!({"year": {"min": 1960, "max": ""}}));
    assert!(passes_filters(&attributes(json!({"year": 1969})), &min_only, &defs));
    assert!(!passes_filters(&attributes(json!({"year": 1959})), &min_only, &defs));

    let no_bounds = filters(json!({"year": {"min": "", "max": null}}));
    assert!(passes_filters(&Map::new(), &no_bounds, &defs));
}

#[test]
fn number_equality_without_range() {
    let defs = definitions();
    let exact = filters(json!({"year": 1959}));
    assert!(passes_filters(&attributes(json!({"year": 1959})), &exact, &defs));
    assert!(passes_filters(&attributes(json!({"year": "1959"})), &exact, &defs));
    assert!(!passes_filters(&attributes(json!({"year": 1960})), &exact, &defs));
}

#[test]
fn tags_match_any_requested_tag() {
    let defs = definitions();
    let wanted = filters(json!({"genre": ["rock", "jazz"]}));
    assert!(passes_filters(&attributes(json!({"genre": ["pop", "rock"]})), &wanted, &defs));
    assert!(passes_filters(&attributes(json!({"genre": ["jazz"]})), &wanted, &defs));
    assert!(!passes_filters(&attributes(json!({"genre": ["pop"]})), &wanted, &defs));
    assert!(!passes_filters(&Map::new(), &wanted, &defs));
    assert!(!passes_filters(&attributes(json!({"genre": "jazz"})), &wanted, &defs));

    let nothing_wanted = filters(json!({"genre": []}));
    assert!(passes_filters(&attributes(json!({"genre": ["pop"]})), &nothing_wanted, &defs));
}

#[test]
fn select_matches_scalar_or_any_of_array() {
    let defs = definitions();
    let item = attributes(json!({"grade": "NM"}));
    assert!(passes_filters(&item, &filters(json!({"grade": "NM"})), &defs));
    assert!(!passes_filters(&item, &filters(json!({"grade": "VG"})), &defs));
    assert!(passes_filters(&item, &filters(json!({"grade": ["M", "NM"]})), &defs));
    assert!(!passes_filters(&item, &filters(json!({"grade": ["VG"]})), &defs));
    assert!(passes_filters(&item, &filters(json!({"grade": []})), &defs));
}

#[test]
fn checkbox_compares_truthiness() {
    let defs = definitions();
    let unsigned = filters(json!({"signed": false}));
    assert!(passes_filters(&Map::new(), &unsigned, &defs));
    assert!(passes_filters(&attributes(json!({"signed": false})), &unsigned, &defs));
    assert!(!passes_filters(&attributes(json!({"signed": true})), &unsigned, &defs));

    let signed = filters(json!({"signed": true}));
    assert!(passes_filters(&attributes(json!({"signed": true})), &signed, &defs));
    assert!(!passes_filters(&Map::new(), &signed, &defs));
}

#[test]
fn text_is_case_insensitive_substring() {
    let defs = vec![AttributeDefinition::new("label", "Label", AttributeKind::Text)];
    let criterion = filters(json!({"label": "blue"}));
    assert!(passes_filters(&attributes(json!({"label": "Blue Note"})), &criterion, &defs));
    assert!(!passes_filters(&attributes(json!({"label": "Columbia"})), &criterion, &defs));
    assert!(!passes_filters(&attributes(json!({"label": ""})), &criterion, &defs));
    assert!(!passes_filters(&Map::new(), &criterion, &defs));
}

#[test]
fn date_range_compares_iso_strings() {
    let defs = definitions();
    let sixties = filters(json!({"released": {"from": "1960-01-01", "to": "1969-12-31"}}));
    assert!(passes_filters(&attributes(json!({"released": "1969-09-26"})), &sixties, &defs));
    assert!(!passes_filters(&attributes(json!({"released": "1959-08-17"})), &sixties, &defs));
    assert!(!passes_filters(&Map::new(), &sixties, &defs));

    let exact = filters(json!({"released": "1959-08-17"}));
    assert!(passes_filters(&attributes(json!({"released": "1959-08-17"})), &exact, &defs));
}

#[test]
fn whitespace_criterion_is_a_value() {
    let defs = definitions();
    let item = attributes(json!({"grade": "NM"}));
    assert!(!passes_filters(&item, &filters(json!({"grade": " "})), &defs));
}

#[test]
fn command_line_criteria_match_imported_values() {
    let defs = vec![
        AttributeDefinition::new("grade", "Grade", AttributeKind::Select),
        AttributeDefinition::new("genre", "Genre", AttributeKind::Tags),
        AttributeDefinition::new("released", "Released", AttributeKind::Date),
    ];
    let session = ImportSession::parse(
        ImportSource::from_text(
            "coins.csv",
            ImportFormat::Csv,
            "Name;Grade;Genre;Released\nMünze;5;80, 90;01.02.2003\n",
        ),
        &ImportLimits::default(),
    )
    .expect("parse");
    let plan = MappingPlan::new(session.propose(&defs)).expect("plan");
    let outcome = session.execute(&plan, &defs).expect("execute");
    let item = &outcome.items[0];

    for expression in ["grade=5", "grade=[5, 6]", "genre=80", "genre=[90]", "released=2003-02-01"] {
        let criteria = parse_criteria(&[expression.to_string()], &defs).expect("criteria");
        assert!(
            passes_filters(&item.attributes, &criteria, &defs),
            "{expression} should match {:?}",
            item.attributes
        );
    }
}

#[test]
fn blank_criteria_unknown_attributes_and_kinds_pass() {
    let mut defs = definitions();
    defs.push(AttributeDefinition::new("mystery", "Mystery", AttributeKind::Unknown));
    let item = attributes(json!({"grade": "NM"}));
    assert!(passes_filters(&item, &filters(json!({"grade": ""})), &defs));
    assert!(passes_filters(&item, &filters(json!({"grade": null})), &defs));
    assert!(passes_filters(&item, &filters(json!({"not_defined": "x"})), &defs));
    assert!(passes_filters(&item, &filters(json!({"mystery": "x"})), &defs));
}

#[test]
fn criteria_are_anded() {
    let defs = definitions();
    let both = filters(json!({"grade": "NM", "genre": ["rock"]}));
    assert!(passes_filters(&attributes(json!({"grade": "NM", "genre": ["rock"]})), &both, &defs));
    assert!(!passes_filters(&attributes(json!({"grade": "NM", "genre": ["pop"]})), &both, &defs));
}

#[test]
fn parse_criteria_builds_ranges_from_shorthand() {
    let defs = definitions();
    let expressions = vec![
        "year=1950..1960".to_string(),
        "released=1960-01-01..".to_string(),
        r#"genre=["rock","jazz"]"#.to_string(),
        "signed=true".to_string(),
        "grade=VG+".to_string(),
    ];
    let parsed = parse_criteria(&expressions, &defs).expect("parse criteria");
    assert_eq!(parsed["year"], json!({"min": 1950.0, "max": 1960.0}));
    assert_eq!(parsed["released"], json!({"from": "1960-01-01", "to": ""}));
    assert_eq!(parsed["genre"], json!(["rock", "jazz"]));
    assert_eq!(parsed["signed"], json!(true));
    assert_eq!(parsed["grade"], json!("VG+"));
}
