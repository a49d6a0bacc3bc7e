//! Schema Engine Demonstration
//!
//! Walks through the life of a validated record.
//!
//! Key concepts illustrated:
//! 1. Declaring structures and constructing instances
//! 2. Rejected assignments leave the record untouched
//! 3. In-place container edits through proxies
//! 4. Shared uniqueness index
//! 5. Plain-data round trips with version migration

use serde_json::json;
use typeshape_core::logging_facility::{init, Profile};
use typeshape_core::{
    construct, deserialize, serialize, ConstructOptions, DeserializeOptions, EngineConfig, Field,
    KeyStyle, Mapper, StructureType, UniquenessIndex, Value,
};

fn main() -> anyhow::Result<()> {
    init(Profile::Development);
    println!("=== Typeshape Demo ===\n");

    let config = EngineConfig::from_toml_str(
        r#"
        validation_mode = "collect_all"
        keep_undefined = false
        "#,
    )?;

    // ===== Part 1: Construction =====
    println!("## Part 1: Construction\n");

    let person = StructureType::builder("Person")
        .field("age", Field::positive_int())
        .field("name", Field::sized_string(8))
        .field("ssid", Field::string().unique().sensitive())
        .field("nicknames", Field::array_of(Field::string()).max_items(3))
        .required(["age", "ssid"])
        .key_style(KeyStyle::CamelCase)
        .versions(vec![Mapper::new().rename("age", "years")])
        .build()?;

    let index = UniquenessIndex::shared();
    let options = config.construct_options(Some(index.clone()));

    let mut ann = construct(
        &person,
        [
            ("age", Value::Int(34)),
            ("name", Value::from("Ann")),
            ("ssid", Value::from("123-45-6789")),
            ("nicknames", Value::List(Vec::new())),
        ],
        &options,
    )?;
    println!("✓ Constructed {}", ann);

    // ===== Part 2: Rejections =====
    println!("\n## Part 2: Rejections\n");

    if let Err(e) = ann.set("age", -1) {
        println!("✗ age = -1 rejected: {}", e);
    }
    if let Err(e) = ann.set("name", "Alexandra") {
        println!("✗ long name rejected: {}", e);
    }
    let invalid = construct(
        &person,
        [("age", Value::Int(0)), ("name", Value::from("Bartholomew"))],
        &options,
    );
    if let Err(e) = invalid {
        println!("✗ {} problems collected:", e.violations().len());
        for violation in e.violations() {
            println!("    - {}", violation);
        }
    }

    // ===== Part 3: Proxies =====
    println!("\n## Part 3: Container Proxies\n");

    {
        let mut nicknames = ann.seq_mut("nicknames")?;
        nicknames.extend(["Annie", "A"])?;
        if let Err(e) = nicknames.extend(["Nan", "Anna"]) {
            println!("✗ too many nicknames: {}", e);
        }
    }
    println!("✓ nicknames now {}", ann.get("nicknames").cloned().unwrap_or(Value::Null));

    // ===== Part 4: Uniqueness =====
    println!("\n## Part 4: Uniqueness\n");

    let duplicate = construct(
        &person,
        [("age", Value::Int(40)), ("ssid", Value::from("123-45-6789"))],
        &options,
    );
    if let Err(e) = duplicate {
        println!("✗ duplicate ssid rejected: {}", e);
    }
    println!("Index holds {} claim(s)", index.len());

    // ===== Part 5: Plain data =====
    println!("\n## Part 5: Plain Data\n");

    let plain = serialize(&ann, &config.serialize_options())?;
    println!("serialized: {}", plain);

    index.reset();
    let old_record = json!({"years": 7, "ssid": "987-65-4321"});
    let migrated = deserialize(&person, &old_record, &DeserializeOptions::default())?;
    println!(
        "✓ version 1 record migrated to version {}: {}",
        migrated.version().unwrap_or_default(),
        migrated
    );

    println!("\n=== Demo complete ===");
    Ok(())
}
