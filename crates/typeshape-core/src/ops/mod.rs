pub mod construct;
pub mod proxy;
pub mod uniqueness;

pub use construct::{construct, construct_single, construct_trusted, ConstructOptions};
pub use proxy::{DequeProxy, MapProxy, Proxy, ProxyState, SeqProxy, SetProxy, StructProxy};
pub use uniqueness::UniquenessIndex;
