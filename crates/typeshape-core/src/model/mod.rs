pub mod combinator;
pub mod describe;
pub mod field;
pub mod instance;
pub mod shape;
pub mod structure;

pub use combinator::Combinator;
pub use field::{CustomValidator, Discriminator, Field, FieldKind};
pub use instance::{Instance, Origin};
pub use shape::{DescribeField, TypeShape};
pub use structure::{StructureBuilder, StructureType};
