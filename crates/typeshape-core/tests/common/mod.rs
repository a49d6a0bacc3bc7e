//! Structures shared by the scenario tests

use std::sync::Arc;
use typeshape_core::{ExErrorKind, Field, Result, SchemaError, StructureType};

/// Person with a positive age (required) and a name of at most 8 chars
#[allow(dead_code)]
pub fn person() -> Arc<StructureType> {
    StructureType::builder("Person")
        .field("age", Field::positive_int())
        .field("name", Field::sized_string(8))
        .required(["age"])
        .build()
        .expect("Person declaration")
}

/// Employee whose `ssid` must be unique across instances
#[allow(dead_code)]
pub fn employee() -> Arc<StructureType> {
    StructureType::builder("Employee")
        .field("name", Field::string())
        .field("ssid", Field::string().unique())
        .required(["name", "ssid"])
        .build()
        .expect("Employee declaration")
}

/// Playlist with every kind of mutable container
#[allow(dead_code)]
pub fn playlist() -> Arc<StructureType> {
    StructureType::builder("Playlist")
        .field("title", Field::string())
        .field("tracks", Field::array_of(Field::sized_string(10)).max_items(3))
        .field(
            "ratings",
            Field::map_of(Field::string(), Field::integer().minimum(1).maximum(5)),
        )
        .field("tags", Field::set_of(Field::string()))
        .field("recent", Field::deque_of(Field::integer()).maxlen(3))
        .required(["title"])
        .build()
        .expect("Playlist declaration")
}

/// Address and a customer holding a list of them
#[allow(dead_code)]
pub fn customer() -> (Arc<StructureType>, Arc<StructureType>) {
    let address = StructureType::builder("Address")
        .field("city", Field::string())
        .field("zip", Field::string().pattern("^[0-9]{5}$"))
        .required(["city", "zip"])
        .build()
        .expect("Address declaration");
    let customer = StructureType::builder("Customer")
        .field("name", Field::string())
        .field("addresses", Field::array_of(Field::structure(&address)))
        .required(["name"])
        .build()
        .expect("Customer declaration");
    (address, customer)
}

/// Kind of the error, or a panic naming the unexpected success
#[allow(dead_code)]
pub fn kind_of<T: std::fmt::Debug>(result: Result<T>) -> ExErrorKind {
    match result {
        Ok(value) => panic!("expected an error, got {value:?}"),
        Err(e) => e.kind(),
    }
}

/// Paths of every leaf violation, rendered
#[allow(dead_code)]
pub fn violation_paths(err: &SchemaError) -> Vec<String> {
    err.violations()
        .into_iter()
        .map(SchemaError::path_string)
        .collect()
}
