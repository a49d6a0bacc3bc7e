//! Plain-data codec
//!
//! Instances travel as `serde_json::Value` trees. Serialization walks the
//! declared fields and applies the structure's mapper and key style;
//! deserialization migrates old versions, applies the inbound mapper,
//! converts raw values guided by each descriptor and then constructs.

pub mod deserialize;
pub mod mapper;
pub mod serialize;
pub mod versioning;

pub use deserialize::{deserialize, DeserializeOptions};
pub use mapper::{Directive, KeyStyle, Mapper};
pub use serialize::{serialize, serialize_trusted, value_to_plain, SerializeOptions};
pub use versioning::migrate;
