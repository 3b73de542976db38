use crawlcore::core::tools_registry::ToolRegistry;

#[test]
fn public_tool_names_resolve_to_internal() {
    let registry = ToolRegistry::load();

    let mut seen = std::collections::HashSet::new();
    for spec in registry.public_specs() {
        assert!(
            seen.insert(spec.public_name.clone()),
            "duplicate public tool name"
        );
        let internal = registry
            .resolve_incoming_tool_name(&spec.public_name)
            .expect("public name should resolve to an internal name");
        assert!(
            registry.public_tool_name_for_internal(&internal).is_some(),
            "internal tool should have a public name"
        );
    }
}

#[test]
fn crawl_website_schema_exposes_expected_fields() {
    let registry = ToolRegistry::load();
    let specs = registry.public_specs();

    let crawl = specs
        .iter()
        .find(|s| s.public_name == "crawl_website")
        .expect("expected crawl_website tool");

    let props = crawl
        .public_input_schema
        .get("properties")
        .and_then(|v| v.as_object())
        .expect("schema properties should be an object");
    assert!(
        props.contains_key("url"),
        "expected a url field on crawl_website's schema"
    );
}
