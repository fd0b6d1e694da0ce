/*!
Topology module

Everything between a peer's `/info` endpoint and the in-memory topology.

Structure:
- `source`: async `InfoSource` trait returning raw `/info` bodies, plus the crawl error type.
- `store`: `TopologyStore`, the accumulated node set and edge log.
- `crawl`: `CrawlController`, seeding and probing peers into the store.
*/

pub mod crawl;
pub mod source;
pub mod store;
