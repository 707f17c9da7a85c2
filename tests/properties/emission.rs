//! Property tests for rendered-output determinism.

use proptest::prelude::*;

use canister::{emit, parse_catalog, parse_definition, resolve, PassthroughFormatter};

const CATALOG: &str = r#"{
    "modules": {
        "github.com/acme/example": {
            "funcs": [
                {"name": "NewIDo", "results": ["github.com/acme/example.Doer"]},
                {
                    "name": "NewNamed",
                    "params": ["string"],
                    "results": ["github.com/acme/example.Doer"]
                }
            ]
        }
    }
}"#;

fn render(definition: &str) -> String {
    let def = parse_definition(definition).unwrap();
    let catalog = parse_catalog(CATALOG).unwrap();
    let container = resolve(&def, &catalog).unwrap();
    emit(&container, &PassthroughFormatter).unwrap()
}

fn service_names() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::btree_set("[A-Z][a-zA-Z0-9]{0,12}", 1..=10)
        .prop_map(|set| set.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: Rendering the same definition twice yields identical bytes,
    /// and declaration order never changes the output.
    #[test]
    fn property_emission_order_independent(mut names in service_names()) {
        let yaml = |names: &[String]| {
            let mut out = String::from("modules:\n  - github.com/acme/example\n\nservices:\n");
            for name in names {
                out.push_str(&format!("  {name}:\n    factory: example.NewIDo\n"));
            }
            out
        };

        let sorted = render(&yaml(&names));
        names.reverse();
        let reversed = render(&yaml(&names));

        prop_assert_eq!(sorted, reversed);
    }

    /// PROPERTY: Every service gets an accessor and a lowercased lookup case.
    #[test]
    fn property_every_service_reachable(names in service_names()) {
        let mut yaml = String::from("modules:\n  - github.com/acme/example\n\nservices:\n");
        for name in &names {
            yaml.push_str(&format!("  {name}:\n    factory: example.NewIDo\n"));
        }

        let source = render(&yaml);
        for name in &names {
            let accessor = format!("func (c *Container) Get{name}() ");
            let case_label = format!("case \"{}\":", name.to_lowercase());
            prop_assert!(source.contains(&accessor), "missing {}", accessor);
            prop_assert!(source.contains(&case_label), "missing {}", case_label);
        }
    }

    /// PROPERTY: String constants always come out Go-quoted, whatever they
    /// contain.
    #[test]
    fn property_string_constants_quoted(raw in "[ -~]{0,24}") {
        // `@` would turn the constant into a service reference.
        prop_assume!(!raw.starts_with('@'));

        let yaml = format!(
            "modules:\n  - github.com/acme/example\n\nservices:\n  Named:\n    factory: example.NewNamed\n    arguments:\n      - {raw:?}\n",
        );

        let def = parse_definition(&yaml).unwrap();
        let catalog = parse_catalog(CATALOG).unwrap();
        let container = resolve(&def, &catalog).unwrap();
        let source = emit(&container, &PassthroughFormatter).unwrap();

        // Printable ASCII quotes identically under Go and Rust rules.
        let call = format!("example.NewNamed({raw:?})");
        prop_assert!(source.contains(&call), "missing {}", call);
    }
}
